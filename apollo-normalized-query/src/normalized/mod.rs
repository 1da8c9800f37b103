//! The normalized query tree.
//!
//! A [`NormalizedQuery`] owns every [`NormalizedField`] of the tree. Fields refer to their parent
//! and children through [`NormalizedFieldId`] handles that are only meaningful for the query that
//! produced them.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::ops::Deref;
use std::ops::Index;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Type;
use apollo_compiler::executable;
use apollo_compiler::executable::Fragment;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::FieldDefinition;
use indexmap::IndexMap;
use indexmap::IndexSet;
use itertools::Itertools;
use serde::Serialize;
use serde::Serializer;

use crate::JsonMap;
use crate::display_helpers::DisplaySlice;
use crate::display_helpers::State;
use crate::display_helpers::serialize_as_string;
use crate::display_helpers::write_indented_lines;
use crate::error::NormalizationError;
use crate::schema::QuerySchema;
use crate::utils::serde_bridge::serialize_exe_argument_nodes;
use crate::utils::serde_bridge::serialize_exe_field_nodes;
use crate::values::NormalizedInputValue;

pub(crate) mod builder;
mod collector;
pub(crate) mod matcher;
#[cfg(test)]
mod tests;

/// A simple multimap using IndexMap with Vec<V> as its value type.
/// - Preserves the insertion order of keys and values.
#[derive(Debug, Clone)]
pub(crate) struct MultiIndexMap<K, V>(IndexMap<K, Vec<V>>);

impl<K, V> Deref for MultiIndexMap<K, V> {
    type Target = IndexMap<K, Vec<V>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K, V> Default for MultiIndexMap<K, V> {
    fn default() -> Self {
        Self(IndexMap::default())
    }
}

impl<K, V> MultiIndexMap<K, V>
where
    K: Eq + Hash,
{
    pub(crate) fn new() -> Self {
        Self(IndexMap::new())
    }

    pub(crate) fn insert(&mut self, key: K, value: V) {
        self.0.entry(key).or_default().push(value);
    }

    /// All the values for `key`, in insertion order.
    pub(crate) fn get_all<Q>(&self, key: &Q) -> &[V]
    where
        Q: ?Sized + Hash + indexmap::Equivalent<K>,
    {
        self.0.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// All the values, grouped by key in key insertion order.
    pub(crate) fn into_values(self) -> impl Iterator<Item = V> {
        self.0.into_values().flatten()
    }
}

impl<K, V> Serialize for MultiIndexMap<K, V>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// A handle to a [`NormalizedField`] of a [`NormalizedQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NormalizedFieldId(usize);

impl NormalizedFieldId {
    /// The position of the field in the query's arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Fragment definitions of a document, by name.
#[derive(Debug, Clone, Default)]
pub struct NamedFragments(IndexMap<Name, Node<Fragment>>);

impl NamedFragments {
    pub fn new<'a>(fragments: impl IntoIterator<Item = (&'a Name, &'a Node<Fragment>)>) -> Self {
        Self(
            fragments
                .into_iter()
                .map(|(name, fragment)| (name.clone(), fragment.clone()))
                .collect(),
        )
    }

    pub fn from_document(document: &executable::ExecutableDocument) -> Self {
        Self::new(&document.fragments)
    }

    pub fn get(&self, name: &str) -> Option<&Node<Fragment>> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A (concrete object type, field name) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldCoordinates {
    pub type_name: Name,
    pub field_name: Name,
}

impl FieldCoordinates {
    pub fn new(type_name: Name, field_name: Name) -> Self {
        Self {
            type_name,
            field_name,
        }
    }
}

impl fmt::Display for FieldCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field_name)
    }
}

impl Serialize for FieldCoordinates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One or more AST field selections that were merged into a single normalized field, in the
/// order they were encountered.
#[derive(Debug, Clone, Serialize)]
pub struct MergedField {
    // never empty
    #[serde(serialize_with = "serialize_exe_field_nodes")]
    fields: Vec<Node<executable::Field>>,
}

impl MergedField {
    pub(crate) fn new(first: Node<executable::Field>) -> Self {
        Self {
            fields: vec![first],
        }
    }

    pub(crate) fn push(&mut self, field: Node<executable::Field>) {
        self.fields.push(field);
    }

    /// The first AST field merged into the normalized field.
    pub fn single_field(&self) -> &Node<executable::Field> {
        &self.fields[0]
    }

    pub fn name(&self) -> &Name {
        &self.single_field().name
    }

    pub fn response_key(&self) -> &Name {
        let field = self.single_field();
        field.alias.as_ref().unwrap_or(&field.name)
    }

    pub fn fields(&self) -> &[Node<executable::Field>] {
        &self.fields
    }

    /// The arguments as written on the first AST field. All merged fields have the same ones.
    pub fn arguments(&self) -> &[Node<executable::Argument>] {
        &self.single_field().arguments
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A field of the normalized tree.
///
/// A normalized field stands for every selection of `field_name` under one response key, at one
/// position of the tree, that resolves to the same return type with the same arguments. It
/// records the concrete object types these selections apply to.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedField {
    pub(crate) alias: Option<Name>,
    pub(crate) field_name: Name,
    #[serde(serialize_with = "serialize_as_string")]
    pub(crate) field_type: Type,
    pub(crate) depth: usize,
    pub(crate) object_type_names: IndexSet<Name>,
    pub(crate) resolved_arguments: JsonMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) normalized_arguments: Option<IndexMap<Name, NormalizedInputValue>>,
    #[serde(serialize_with = "serialize_exe_argument_nodes")]
    pub(crate) ast_arguments: Vec<Node<executable::Argument>>,
    pub(crate) parent: Option<NormalizedFieldId>,
    pub(crate) children: Vec<NormalizedFieldId>,
}

impl NormalizedField {
    /// The alias if there is one, or the field name.
    pub fn response_key(&self) -> &Name {
        self.alias.as_ref().unwrap_or(&self.field_name)
    }

    pub fn alias(&self) -> Option<&Name> {
        self.alias.as_ref()
    }

    pub fn field_name(&self) -> &Name {
        &self.field_name
    }

    /// The declared return type of the field.
    pub fn field_type(&self) -> &Type {
        &self.field_type
    }

    /// Nesting level of the field, starting at 1 for the fields of the operation's root type.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The concrete object types this field is selected for, in the order they were found.
    pub fn object_type_names(&self) -> &IndexSet<Name> {
        &self.object_type_names
    }

    /// Argument values, resolved against the variables of the request.
    pub fn resolved_arguments(&self) -> &JsonMap {
        &self.resolved_arguments
    }

    /// Argument values that remember whether they were written inline, came from a variable, or
    /// are defaults. Only present when the query was normalized from raw variables.
    pub fn normalized_arguments(&self) -> Option<&IndexMap<Name, NormalizedInputValue>> {
        self.normalized_arguments.as_ref()
    }

    /// The arguments as written in the operation.
    pub fn ast_arguments(&self) -> &[Node<executable::Argument>] {
        &self.ast_arguments
    }

    pub fn parent(&self) -> Option<NormalizedFieldId> {
        self.parent
    }

    pub fn children(&self) -> &[NormalizedFieldId] {
        &self.children
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    pub fn coordinates(&self) -> impl Iterator<Item = FieldCoordinates> + '_ {
        self.object_type_names
            .iter()
            .map(|type_name| FieldCoordinates::new(type_name.clone(), self.field_name.clone()))
    }

    /// The field definition on one of the object types. All of them have the same return type.
    pub fn one_field_definition<'schema>(
        &self,
        schema: &'schema QuerySchema,
    ) -> Result<&'schema Component<FieldDefinition>, NormalizationError> {
        let type_name = self.object_type_names.first().ok_or_else(|| {
            NormalizationError::internal(format!(
                "Normalized field \"{}\" has no object type",
                self.field_name
            ))
        })?;
        schema.field_definition(type_name, &self.field_name)
    }

    /// The field definition on each of the object types, in the order of
    /// [`object_type_names`](Self::object_type_names).
    pub fn field_definitions<'schema>(
        &self,
        schema: &'schema QuerySchema,
    ) -> Result<Vec<&'schema Component<FieldDefinition>>, NormalizationError> {
        self.object_type_names
            .iter()
            .map(|type_name| schema.field_definition(type_name, &self.field_name))
            .collect()
    }
}

impl fmt::Display for NormalizedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(alias) = &self.alias {
            write!(f, "{alias}: ")?;
        }
        match self.object_type_names.len() {
            1 => write!(f, "{}", self.object_type_names[0])?,
            _ => {
                let names: Vec<&Name> = self.object_type_names.iter().collect();
                write!(f, "{}", DisplaySlice(&names))?;
            }
        }
        write!(f, ".{}", self.field_name)?;
        if !self.ast_arguments.is_empty() {
            let arguments = self.ast_arguments.iter().format_with(", ", |argument, f| {
                f(&format_args!(
                    "{}: {}",
                    argument.name,
                    executable::Value::serialize(&argument.value).no_indent()
                ))
            });
            write!(f, "({arguments})")?;
        }
        Ok(())
    }
}

/// Identifies an AST field by the node it is, not by what it contains.
///
/// Two selections written identically at different places of an operation are different keys.
/// A field of a named fragment is the same key everywhere the fragment is spread.
#[derive(Clone)]
pub(crate) struct AstFieldKey(pub(crate) Node<executable::Field>);

impl PartialEq for AstFieldKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl Eq for AstFieldKey {}

impl Hash for AstFieldKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.0.as_ref(), state)
    }
}

impl fmt::Debug for AstFieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", executable::Field::serialize(&self.0).no_indent())
    }
}

/// The normalized form of an operation.
///
/// Built once by [`QueryNormalizer`](crate::QueryNormalizer), immutable afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedQuery {
    pub(crate) fields: Vec<NormalizedField>,
    pub(crate) merged_fields: Vec<MergedField>,
    pub(crate) top_level_fields: Vec<NormalizedFieldId>,
    #[serde(skip)]
    pub(crate) original_field_to_normalized: MultiIndexMap<AstFieldKey, NormalizedFieldId>,
    pub(crate) coordinates_to_normalized: MultiIndexMap<FieldCoordinates, NormalizedFieldId>,
}

impl NormalizedQuery {
    /// Returns the field for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was handed out by another query.
    pub fn field(&self, id: NormalizedFieldId) -> &NormalizedField {
        &self.fields[id.0]
    }

    pub fn top_level_fields(&self) -> &[NormalizedFieldId] {
        &self.top_level_fields
    }

    pub fn children(&self, id: NormalizedFieldId) -> &[NormalizedFieldId] {
        &self.field(id).children
    }

    pub fn parent(&self, id: NormalizedFieldId) -> Option<NormalizedFieldId> {
        self.field(id).parent
    }

    /// Children of `id` with the given response key. There can be more than one when they select
    /// different fields, or the same field with different arguments or return types.
    pub fn children_with_response_key<'a>(
        &'a self,
        id: NormalizedFieldId,
        response_key: &'a str,
    ) -> impl Iterator<Item = NormalizedFieldId> + 'a {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.field(*child).response_key() == response_key)
    }

    /// The AST fields merged into the normalized field `id`.
    pub fn merged_field(&self, id: NormalizedFieldId) -> &MergedField {
        &self.merged_fields[id.0]
    }

    /// The normalized fields an AST field of the operation, or of one of its fragments,
    /// contributed to.
    pub fn normalized_fields_for(&self, field: &Node<executable::Field>) -> &[NormalizedFieldId] {
        self.original_field_to_normalized
            .get_all(&AstFieldKey(field.clone()))
    }

    /// The normalized fields selecting `coordinates.field_name` on the object type
    /// `coordinates.type_name`.
    pub fn normalized_fields_at(&self, coordinates: &FieldCoordinates) -> &[NormalizedFieldId] {
        self.coordinates_to_normalized.get_all(coordinates)
    }

    /// Every field of the tree, depth-first, parents before their children.
    pub fn iter(&self) -> impl Iterator<Item = (NormalizedFieldId, &NormalizedField)> + '_ {
        let mut stack: Vec<NormalizedFieldId> =
            self.top_level_fields.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            let field = self.field(id);
            stack.extend(field.children.iter().rev().copied());
            Some((id, field))
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn write_field(&self, state: &mut State<'_, '_>, id: NormalizedFieldId) -> fmt::Result {
        let field = self.field(id);
        state.write(field)?;
        write_indented_lines(state, field.children.iter(), |state, child| {
            self.write_field(state, *child)
        })
    }
}

impl Index<NormalizedFieldId> for NormalizedQuery {
    type Output = NormalizedField;

    fn index(&self, id: NormalizedFieldId) -> &Self::Output {
        self.field(id)
    }
}

impl fmt::Display for NormalizedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut state = State::new(f);
        for (index, id) in self.top_level_fields.iter().enumerate() {
            if index > 0 {
                state.new_line()?;
            }
            self.write_field(&mut state, *id)?;
        }
        Ok(())
    }
}
