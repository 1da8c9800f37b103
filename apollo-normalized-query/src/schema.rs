//! Schema access for normalization, including resolution of composite types to the concrete
//! object types they denote.

use std::fmt;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::validation::Valid;
use indexmap::IndexMap;
use indexmap::IndexSet;

use crate::error::NormalizationError;

/// A composite type of the schema: the only kinds of types that can have a selection set or be
/// used as a type condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompositeType {
    Object(Name),
    Interface(Name),
    Union(Name),
}

impl CompositeType {
    pub fn type_name(&self) -> &Name {
        match self {
            CompositeType::Object(name)
            | CompositeType::Interface(name)
            | CompositeType::Union(name) => name,
        }
    }

    pub fn is_abstract(&self) -> bool {
        !matches!(self, CompositeType::Object(_))
    }
}

impl fmt::Display for CompositeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

struct QuerySchemaInner {
    schema: Valid<Schema>,
    implementers: IndexMap<Name, IndexSet<Name>>,
}

/// A validated schema, plus the interface-to-implementers map needed to resolve abstract types.
///
/// Cheap to clone, immutable, and safe to share between threads.
#[derive(Clone)]
pub struct QuerySchema(Arc<QuerySchemaInner>);

impl fmt::Debug for QuerySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySchema")
            .field("implementers", &self.0.implementers)
            .finish_non_exhaustive()
    }
}

impl QuerySchema {
    pub fn new(schema: Valid<Schema>) -> Self {
        // Implementers are recorded in schema definition order so that resolved type-sets are
        // deterministic.
        let mut implementers: IndexMap<Name, IndexSet<Name>> = IndexMap::new();
        for (type_name, ty) in &schema.types {
            let ExtendedType::Object(object) = ty else {
                continue;
            };
            for interface in &object.implements_interfaces {
                implementers
                    .entry(interface.name.clone())
                    .or_default()
                    .insert(type_name.clone());
            }
        }
        Self(Arc::new(QuerySchemaInner {
            schema,
            implementers,
        }))
    }

    pub fn parse_and_validate(
        source_text: &str,
        source_name: &str,
    ) -> Result<Self, NormalizationError> {
        let schema = Schema::parse_and_validate(source_text, source_name)?;
        Ok(Self::new(schema))
    }

    pub fn schema(&self) -> &Valid<Schema> {
        &self.0.schema
    }

    /// Looks up a type that must be composite.
    pub fn composite_type(&self, type_name: &Name) -> Result<CompositeType, NormalizationError> {
        let ty = self.0.schema.types.get(type_name).ok_or_else(|| {
            NormalizationError::internal(format!("Schema has no type \"{type_name}\""))
        })?;
        match ty {
            ExtendedType::Object(_) => Ok(CompositeType::Object(type_name.clone())),
            ExtendedType::Interface(_) => Ok(CompositeType::Interface(type_name.clone())),
            ExtendedType::Union(_) => Ok(CompositeType::Union(type_name.clone())),
            _ => Err(NormalizationError::internal(format!(
                "Type \"{type_name}\" is not a composite type"
            ))),
        }
    }

    /// Returns whether `type_name` is an object, interface or union type.
    pub fn is_composite(&self, type_name: &Name) -> bool {
        matches!(
            self.0.schema.types.get(type_name),
            Some(ExtendedType::Object(_) | ExtendedType::Interface(_) | ExtendedType::Union(_))
        )
    }

    /// The object types implementing `interface`, in schema definition order.
    pub fn implementers(&self, interface: &Name) -> impl Iterator<Item = &Name> {
        self.0
            .implementers
            .get(interface)
            .into_iter()
            .flat_map(|objects| objects.iter())
    }

    /// Resolves a composite type to the set of concrete object types it denotes.
    pub fn possible_runtime_types(
        &self,
        composite_type: &CompositeType,
    ) -> Result<IndexSet<Name>, NormalizationError> {
        Ok(match composite_type {
            CompositeType::Object(name) => IndexSet::from([name.clone()]),
            CompositeType::Interface(name) => self.implementers(name).cloned().collect(),
            CompositeType::Union(name) => {
                let union_ = self.0.schema.get_union(name).ok_or_else(|| {
                    NormalizationError::internal(format!("Schema has no union type \"{name}\""))
                })?;
                union_
                    .members
                    .iter()
                    .map(|member| member.name.clone())
                    .collect()
            }
        })
    }

    /// Narrows the current set of possible object types by a type condition.
    ///
    /// An empty `current` set means no restriction has been applied yet, in which case the
    /// resolved type condition is returned as is. Otherwise the result is the intersection, in
    /// the order of `current`.
    pub fn narrow(
        &self,
        current: &IndexSet<Name>,
        type_condition: &CompositeType,
    ) -> Result<IndexSet<Name>, NormalizationError> {
        let resolved = self.possible_runtime_types(type_condition)?;
        if current.is_empty() {
            return Ok(resolved);
        }
        Ok(current.intersection(&resolved).cloned().collect())
    }

    /// Returns the definition of a field (or meta-field such as `__typename`) of a type.
    pub fn field_definition(
        &self,
        type_name: &Name,
        field_name: &Name,
    ) -> Result<&Component<FieldDefinition>, NormalizationError> {
        self.0
            .schema
            .type_field(type_name, field_name)
            .map_err(|_| {
                NormalizationError::internal(format!(
                    "Cannot find field \"{field_name}\" on type \"{type_name}\""
                ))
            })
    }
}
