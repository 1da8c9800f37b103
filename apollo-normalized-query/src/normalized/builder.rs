use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::executable;
use apollo_compiler::executable::Operation;
use indexmap::IndexSet;
use tracing::debug;

use super::AstFieldKey;
use super::FieldCoordinates;
use super::MergedField;
use super::MultiIndexMap;
use super::NamedFragments;
use super::NormalizedField;
use super::NormalizedFieldId;
use super::NormalizedQuery;
use crate::JsonMap;
use crate::config::NormalizerConfig;
use crate::error::NormalizationError;
use crate::schema::QuerySchema;
use crate::utils::logging::snapshot;
use crate::values::NormalizedVariables;

/// What field collection reads from, for one normalization.
#[derive(Clone, Copy)]
pub(crate) struct FieldCollectionContext<'a> {
    pub(crate) schema: &'a QuerySchema,
    pub(crate) fragments: &'a NamedFragments,
    pub(crate) variables: &'a JsonMap,
    pub(crate) normalized_variables: Option<&'a NormalizedVariables>,
}

/// Builds the tree of one operation, filling the indexes of the query as fields are added.
pub(crate) struct QueryBuilder<'a> {
    pub(super) context: FieldCollectionContext<'a>,
    config: &'a NormalizerConfig,
    pub(super) fields: Vec<NormalizedField>,
    pub(super) merged_fields: Vec<MergedField>,
    original_field_to_normalized: MultiIndexMap<AstFieldKey, NormalizedFieldId>,
    coordinates_to_normalized: MultiIndexMap<FieldCoordinates, NormalizedFieldId>,
}

impl<'a> QueryBuilder<'a> {
    pub(crate) fn new(context: FieldCollectionContext<'a>, config: &'a NormalizerConfig) -> Self {
        Self {
            context,
            config,
            fields: Vec::new(),
            merged_fields: Vec::new(),
            original_field_to_normalized: MultiIndexMap::new(),
            coordinates_to_normalized: MultiIndexMap::new(),
        }
    }

    pub(crate) fn build(
        mut self,
        operation: &Operation,
    ) -> Result<NormalizedQuery, NormalizationError> {
        let schema = self.context.schema;
        let root_type = schema.composite_type(&operation.selection_set.ty)?;
        let possible_objects = schema.possible_runtime_types(&root_type)?;

        self.config.check_depth(1)?;
        let top_level_fields = self.collect_fields(
            std::iter::once(&operation.selection_set),
            &possible_objects,
            1,
            None,
        )?;
        for id in &top_level_fields {
            self.build_field(*id)?;
        }

        debug!(
            top_level_fields = top_level_fields.len(),
            normalized_fields = self.fields.len(),
            "normalized operation"
        );
        let query = NormalizedQuery {
            fields: self.fields,
            merged_fields: self.merged_fields,
            top_level_fields,
            original_field_to_normalized: self.original_field_to_normalized,
            coordinates_to_normalized: self.coordinates_to_normalized,
        };
        snapshot!(query, "normalized query");
        Ok(query)
    }

    /// Registers a field in the indexes, then builds its subtree.
    fn build_field(&mut self, id: NormalizedFieldId) -> Result<(), NormalizationError> {
        self.register(id);

        let schema = self.context.schema;
        let field = &self.fields[id.0];
        let type_name: &Name = field.field_type.inner_named_type();
        if !schema.is_composite(type_name) {
            return Ok(());
        }
        let depth = field.depth + 1;
        self.config.check_depth(depth)?;

        let possible_objects =
            schema.possible_runtime_types(&schema.composite_type(type_name)?)?;
        // Node clones are cheap, and free `self` for collection.
        let ast_fields: Vec<Node<executable::Field>> = self.merged_fields[id.0].fields().to_vec();
        let children = self.collect_fields(
            ast_fields.iter().map(|field| &field.selection_set),
            &possible_objects,
            depth,
            Some(id),
        )?;
        self.fields[id.0].children = children.clone();
        for child in children {
            self.build_field(child)?;
        }
        Ok(())
    }

    fn register(&mut self, id: NormalizedFieldId) {
        for ast_field in self.merged_fields[id.0].fields() {
            self.original_field_to_normalized
                .insert(AstFieldKey(ast_field.clone()), id);
        }
        for coordinates in self.fields[id.0].coordinates() {
            self.coordinates_to_normalized.insert(coordinates, id);
        }
    }

    /// Collects the fields of `selection_sets` for one parent, merging equivalent selections.
    ///
    /// The result is grouped by response key, in the order keys were first seen.
    fn collect_fields<'s>(
        &mut self,
        selection_sets: impl IntoIterator<Item = &'s executable::SelectionSet>,
        possible_objects: &IndexSet<Name>,
        depth: usize,
        parent: Option<NormalizedFieldId>,
    ) -> Result<Vec<NormalizedFieldId>, NormalizationError> {
        let mut collected = MultiIndexMap::new();
        for selection_set in selection_sets {
            self.collect_selection_set(
                selection_set,
                possible_objects,
                depth,
                parent,
                &mut collected,
            )?;
        }
        Ok(collected.into_values().collect())
    }
}
