//! Collection of the fields of one selection set, through inline fragments and fragment spreads.

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::executable;
use apollo_compiler::executable::Selection;
use indexmap::IndexSet;
use tracing::trace;

use super::MergedField;
use super::MultiIndexMap;
use super::NormalizedField;
use super::NormalizedFieldId;
use super::builder::QueryBuilder;
use super::matcher::find_matching_field;
use crate::conditions::should_include;
use crate::error::NormalizationError;
use crate::values::coerce_argument_values;
use crate::values::normalize_argument_values;

/// Normalized fields collected so far for one parent, by response key.
pub(super) type CollectedFields = MultiIndexMap<Name, NormalizedFieldId>;

impl QueryBuilder<'_> {
    pub(super) fn collect_selection_set(
        &mut self,
        selection_set: &executable::SelectionSet,
        possible_objects: &IndexSet<Name>,
        depth: usize,
        parent: Option<NormalizedFieldId>,
        collected: &mut CollectedFields,
    ) -> Result<(), NormalizationError> {
        for selection in &selection_set.selections {
            match selection {
                Selection::Field(field) => {
                    self.collect_field(field, possible_objects, depth, parent, collected)?
                }
                Selection::InlineFragment(inline_fragment) => self.collect_inline_fragment(
                    inline_fragment,
                    possible_objects,
                    depth,
                    parent,
                    collected,
                )?,
                Selection::FragmentSpread(fragment_spread) => self.collect_fragment_spread(
                    fragment_spread,
                    possible_objects,
                    depth,
                    parent,
                    collected,
                )?,
            }
        }
        Ok(())
    }

    fn collect_field(
        &mut self,
        field: &Node<executable::Field>,
        possible_objects: &IndexSet<Name>,
        depth: usize,
        parent: Option<NormalizedFieldId>,
        collected: &mut CollectedFields,
    ) -> Result<(), NormalizationError> {
        let context = self.context;
        if !should_include(&field.directives, context.variables)? {
            trace!(field = %field.name, "field excluded by directives");
            return Ok(());
        }
        let Some(type_name) = possible_objects.first() else {
            trace!(field = %field.name, "field not reachable from any object type");
            return Ok(());
        };
        let field_def = context.schema.field_definition(type_name, &field.name)?;
        let response_key = field.alias.as_ref().unwrap_or(&field.name);

        let candidates = collected
            .get_all(response_key)
            .iter()
            .map(|id| (*id, &self.fields[id.0]));
        let matching =
            find_matching_field(candidates, &field.name, &field_def.ty, &field.arguments);
        if let Some(id) = matching {
            self.fields[id.0]
                .object_type_names
                .extend(possible_objects.iter().cloned());
            self.merged_fields[id.0].push(field.clone());
            return Ok(());
        }

        let resolved_arguments = coerce_argument_values(
            context.schema.schema(),
            context.variables,
            field_def,
            &field.arguments,
        )?;
        let normalized_arguments = context
            .normalized_variables
            .map(|variables| normalize_argument_values(field_def, &field.arguments, variables));
        let id = NormalizedFieldId(self.fields.len());
        self.fields.push(NormalizedField {
            alias: field.alias.clone(),
            field_name: field.name.clone(),
            field_type: field_def.ty.clone(),
            depth,
            object_type_names: possible_objects.clone(),
            resolved_arguments,
            normalized_arguments,
            ast_arguments: field.arguments.clone(),
            parent,
            children: Vec::new(),
        });
        self.merged_fields.push(MergedField::new(field.clone()));
        collected.insert(response_key.clone(), id);
        Ok(())
    }

    fn collect_inline_fragment(
        &mut self,
        inline_fragment: &Node<executable::InlineFragment>,
        possible_objects: &IndexSet<Name>,
        depth: usize,
        parent: Option<NormalizedFieldId>,
        collected: &mut CollectedFields,
    ) -> Result<(), NormalizationError> {
        if !should_include(&inline_fragment.directives, self.context.variables)? {
            trace!("inline fragment excluded by directives");
            return Ok(());
        }
        // An empty set would mean "unrestricted" to narrowing.
        if possible_objects.is_empty() {
            return Ok(());
        }
        let narrowed = match &inline_fragment.type_condition {
            Some(type_condition) => {
                let schema = self.context.schema;
                schema.narrow(possible_objects, &schema.composite_type(type_condition)?)?
            }
            None => possible_objects.clone(),
        };
        self.collect_selection_set(
            &inline_fragment.selection_set,
            &narrowed,
            depth,
            parent,
            collected,
        )
    }

    fn collect_fragment_spread(
        &mut self,
        fragment_spread: &Node<executable::FragmentSpread>,
        possible_objects: &IndexSet<Name>,
        depth: usize,
        parent: Option<NormalizedFieldId>,
        collected: &mut CollectedFields,
    ) -> Result<(), NormalizationError> {
        let context = self.context;
        if !should_include(&fragment_spread.directives, context.variables)? {
            trace!(
                fragment = %fragment_spread.fragment_name,
                "fragment spread excluded by directives"
            );
            return Ok(());
        }
        let fragment = context
            .fragments
            .get(&fragment_spread.fragment_name)
            .ok_or_else(|| {
                NormalizationError::internal(format!(
                    "Missing fragment named {}",
                    fragment_spread.fragment_name
                ))
            })?;
        if !should_include(&fragment.directives, context.variables)? {
            trace!(fragment = %fragment.name, "fragment excluded by directives");
            return Ok(());
        }
        // As for inline fragments, an empty set must not widen back to the type condition.
        if possible_objects.is_empty() {
            return Ok(());
        }
        let type_condition = context.schema.composite_type(&fragment.selection_set.ty)?;
        let narrowed = context.schema.narrow(possible_objects, &type_condition)?;
        self.collect_selection_set(
            &fragment.selection_set,
            &narrowed,
            depth,
            parent,
            collected,
        )
    }
}
