//! Coercion of variable and argument values, and their provenance-preserving normalized forms.
//!
//! Coercion follows the input coercion rules of the GraphQL specification
//! (<https://spec.graphql.org/October2021/#sec-Coercing-Variable-Values> and
//! <https://spec.graphql.org/October2021/#sec-Coercing-Field-Arguments>). The schema and the
//! document are presumed valid: anything validation would have rejected is reported as an
//! internal error.

use std::fmt;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast::Type;
use apollo_compiler::ast::Value;
use apollo_compiler::ast::VariableDefinition;
use apollo_compiler::executable::Argument;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;
use serde_json_bytes::Value as JsonValue;

use crate::JsonMap;
use crate::display_helpers::serialize_as_string;
use crate::error::NormalizationError;

/// Normalized variable values, by variable name.
pub type NormalizedVariables = IndexMap<Name, NormalizedInputValue>;

/// An argument or variable value that remembers where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedInputValue {
    /// The declared type, as written in the schema or the variable definition (`[String!]!`).
    pub type_name: String,
    pub value: NormalizedValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NormalizedValue {
    /// A literal written inline in the operation.
    Literal(#[serde(serialize_with = "serialize_as_string")] Node<Value>),
    /// A reference to a variable, with the variable's own normalized value.
    Variable {
        name: Name,
        value: Box<NormalizedValue>,
    },
    /// A variable value supplied with the request, as supplied.
    Input(JsonValue),
    /// A default value from the schema or from a variable definition.
    Default(#[serde(serialize_with = "serialize_as_string")] Node<Value>),
    List(Vec<NormalizedValue>),
    Object(IndexMap<Name, NormalizedValue>),
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedValue::Literal(value) => {
                write!(f, "{}", Value::serialize(value).no_indent())
            }
            NormalizedValue::Variable { name, value } => write!(f, "${name} = {value}"),
            NormalizedValue::Input(value) => write!(f, "{value}"),
            NormalizedValue::Default(value) => {
                write!(f, "{} (default)", Value::serialize(value).no_indent())
            }
            NormalizedValue::List(items) => write!(f, "[{}]", items.iter().format(", ")),
            NormalizedValue::Object(fields) => write!(
                f,
                "{{{}}}",
                fields.iter().format_with(", ", |(name, value), f| {
                    f(&format_args!("{name}: {value}"))
                })
            ),
        }
    }
}

/// Where a value being coerced sits, for error messages: `argument id` or
/// `input field ReviewInput.stars`.
#[derive(Clone, Copy)]
struct InputPosition<'a> {
    kind: &'static str,
    parent: Option<&'a str>,
    name: &'a str,
}

impl<'a> InputPosition<'a> {
    fn new(kind: &'static str, name: &'a str) -> Self {
        Self {
            kind,
            parent: None,
            name,
        }
    }

    fn input_field(parent: &'a str, name: &'a str) -> Self {
        Self {
            kind: "input field",
            parent: Some(parent),
            name,
        }
    }
}

impl fmt::Display for InputPosition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent {
            Some(parent) => write!(f, "{} {parent}.{}", self.kind, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Coerces raw request variables against the operation's variable definitions.
///
/// Variables that are neither supplied nor defaulted are left out of the result.
pub fn coerce_variable_values(
    schema: &Schema,
    variable_definitions: &[Node<VariableDefinition>],
    values: &JsonMap,
) -> Result<JsonMap, NormalizationError> {
    let mut coerced_values = JsonMap::new();
    for variable_def in variable_definitions {
        let name = variable_def.name.as_str();
        let position = InputPosition::new("variable", name);
        if let Some((key, value)) = values.get_key_value(name) {
            let value = coerce_variable_value(schema, position, &variable_def.ty, value)?;
            coerced_values.insert(key.clone(), value);
        } else if let Some(default) = &variable_def.default_value {
            let value = graphql_value_to_json(position, default)?;
            coerced_values.insert(name, value);
        } else if variable_def.ty.is_non_null() {
            return Err(NormalizationError::variable_coercion(format!(
                "missing value for non-null variable '{name}'"
            )));
        }
    }
    Ok(coerced_values)
}

fn coerce_variable_value(
    schema: &Schema,
    position: InputPosition<'_>,
    ty: &Type,
    value: &JsonValue,
) -> Result<JsonValue, NormalizationError> {
    if value.is_null() {
        if ty.is_non_null() {
            return Err(NormalizationError::variable_coercion(format!(
                "null value for non-null {position}"
            )));
        }
        return Ok(JsonValue::Null);
    }
    let ty_name = match ty {
        Type::List(inner) | Type::NonNullList(inner) => {
            // A single value stands for a list of one.
            return value
                .as_array()
                .map(Vec::as_slice)
                .unwrap_or(std::slice::from_ref(value))
                .iter()
                .map(|item| coerce_variable_value(schema, position, inner, item))
                .collect();
        }
        Type::Named(ty_name) | Type::NonNullNamed(ty_name) => ty_name,
    };
    let Some(ty_def) = schema.types.get(ty_name) else {
        return Err(NormalizationError::internal(format!(
            "Undefined type {ty_name} for {position}"
        )));
    };
    let coerced = match ty_def {
        ExtendedType::Object(_) | ExtendedType::Interface(_) | ExtendedType::Union(_) => {
            return Err(NormalizationError::internal(format!(
                "Non-input type {ty_name} for {position}"
            )));
        }
        ExtendedType::Scalar(_) => match ty_name.as_str() {
            "Int" => value
                .as_i64()
                .is_some_and(|value| i32::try_from(value).is_ok()),
            // Integers are valid floats.
            "Float" => value.as_f64().is_some(),
            "String" => value.is_string(),
            "Boolean" => value.is_boolean(),
            "ID" => value.is_string() || value.is_i64(),
            // Custom scalars are passed through.
            _ => true,
        },
        ExtendedType::Enum(ty_def) => value
            .as_str()
            .is_some_and(|str| ty_def.values.keys().any(|value_name| value_name == str)),
        ExtendedType::InputObject(ty_def) => {
            let Some(object) = value.as_object() else {
                return Err(NormalizationError::variable_coercion(format!(
                    "Could not coerce {position}: {value} to type {ty_name}"
                )));
            };
            if let Some(key) = object
                .keys()
                .find(|key| !ty_def.fields.contains_key(key.as_str()))
            {
                return Err(NormalizationError::variable_coercion(format!(
                    "Input object has key {} not in type {ty_name}",
                    key.as_str()
                )));
            }
            let mut object = object.clone();
            for (field_name, field_def) in &ty_def.fields {
                let field_position = InputPosition::input_field(ty_name, field_name);
                if let Some(field_value) = object.get_mut(field_name.as_str()) {
                    *field_value =
                        coerce_variable_value(schema, field_position, &field_def.ty, field_value)?;
                } else if let Some(default) = &field_def.default_value {
                    let default = graphql_value_to_json(field_position, default)?;
                    object.insert(field_name.as_str(), default);
                } else if field_def.ty.is_non_null() {
                    return Err(NormalizationError::variable_coercion(format!(
                        "Missing value for non-null input object field {ty_name}.{field_name}"
                    )));
                }
            }
            return Ok(object.into());
        }
    };
    if coerced {
        Ok(value.clone())
    } else {
        Err(NormalizationError::variable_coercion(format!(
            "Could not coerce {position}: {value} to type {ty_name}"
        )))
    }
}

/// Converts a constant GraphQL value (a default value) to JSON.
fn graphql_value_to_json(
    position: InputPosition<'_>,
    value: &Value,
) -> Result<JsonValue, NormalizationError> {
    match value {
        Value::Null => Ok(JsonValue::Null),
        Value::Variable(_) => Err(NormalizationError::internal(format!(
            "Variable in default value of {position}"
        ))),
        Value::Enum(value) => Ok(value.as_str().into()),
        Value::String(value) => Ok(value.as_str().into()),
        Value::Boolean(value) => Ok((*value).into()),
        Value::Int(value) => Ok(JsonValue::Number(value.as_str().parse().map_err(|_| {
            NormalizationError::argument_coercion(format!("Int value overflow in {position}"))
        })?)),
        Value::Float(value) => Ok(JsonValue::Number(value.as_str().parse().map_err(|_| {
            NormalizationError::argument_coercion(format!("Float value overflow in {position}"))
        })?)),
        Value::List(value) => value
            .iter()
            .map(|value| graphql_value_to_json(position, value))
            .collect(),
        Value::Object(value) => value
            .iter()
            .map(|(key, value)| Ok((key.as_str(), graphql_value_to_json(position, value)?)))
            .collect(),
    }
}

/// Resolves the arguments written on a field to runtime values, using coerced `variables`.
///
/// Arguments that are absent, or bound to an absent variable, take the definition's default
/// value when there is one and are left out otherwise.
pub fn coerce_argument_values(
    schema: &Schema,
    variables: &JsonMap,
    field_def: &FieldDefinition,
    arguments: &[Node<Argument>],
) -> Result<JsonMap, NormalizationError> {
    let mut coerced_values = JsonMap::new();
    for arg_def in &field_def.arguments {
        let arg_name = &arg_def.name;
        if let Some(arg) = arguments.iter().find(|arg| arg.name == *arg_name) {
            if let Some(var_name) = arg.value.as_variable() {
                if let Some(var_value) = variables.get(var_name.as_str()) {
                    if var_value.is_null() && arg_def.ty.is_non_null() {
                        return Err(NormalizationError::argument_coercion(format!(
                            "null value for non-nullable argument {arg_name}"
                        )));
                    }
                    coerced_values.insert(arg_name.as_str(), var_value.clone());
                    continue;
                }
            } else {
                let position = InputPosition::new("argument", arg_name);
                let coerced_value =
                    coerce_argument_value(schema, variables, position, &arg_def.ty, &arg.value)?;
                coerced_values.insert(arg_name.as_str(), coerced_value);
                continue;
            }
        }
        if let Some(default) = &arg_def.default_value {
            let value = graphql_value_to_json(InputPosition::new("argument", arg_name), default)?;
            coerced_values.insert(arg_name.as_str(), value);
            continue;
        }
        if arg_def.ty.is_non_null() {
            return Err(NormalizationError::argument_coercion(format!(
                "missing value for required argument {arg_name}"
            )));
        }
    }
    Ok(coerced_values)
}

fn coerce_argument_value(
    schema: &Schema,
    variables: &JsonMap,
    position: InputPosition<'_>,
    ty: &Type,
    value: &Node<Value>,
) -> Result<JsonValue, NormalizationError> {
    if value.is_null() {
        if ty.is_non_null() {
            return Err(NormalizationError::argument_coercion(format!(
                "null value for non-null {position}"
            )));
        }
        return Ok(JsonValue::Null);
    }
    if let Some(var_name) = value.as_variable() {
        return match variables.get(var_name.as_str()) {
            Some(var_value) if var_value.is_null() && ty.is_non_null() => {
                Err(NormalizationError::argument_coercion(format!(
                    "null variable value for non-null {position}"
                )))
            }
            Some(var_value) => Ok(var_value.clone()),
            None if ty.is_non_null() => Err(NormalizationError::argument_coercion(format!(
                "missing variable for non-null {position}"
            ))),
            None => Ok(JsonValue::Null),
        };
    }
    let ty_name = match ty {
        Type::List(inner_ty) | Type::NonNullList(inner_ty) => {
            return value
                .as_list()
                .unwrap_or(std::slice::from_ref(value))
                .iter()
                .map(|item| coerce_argument_value(schema, variables, position, inner_ty, item))
                .collect();
        }
        Type::Named(ty_name) | Type::NonNullNamed(ty_name) => ty_name,
    };
    let Some(ty_def) = schema.types.get(ty_name) else {
        return Err(NormalizationError::internal(format!(
            "Undefined type {ty_name} for {position}"
        )));
    };
    let ExtendedType::InputObject(ty_def) = ty_def else {
        // Scalars and enums were checked by validation.
        return graphql_value_to_json(position, value);
    };
    let Some(object) = value.as_object() else {
        return Err(NormalizationError::argument_coercion(format!(
            "Could not coerce {position}: {value} to type {ty_name}"
        )));
    };
    if let Some((key, _value)) = object
        .iter()
        .find(|(key, _value)| !ty_def.fields.contains_key(key))
    {
        return Err(NormalizationError::argument_coercion(format!(
            "Input object has key {key} not in type {ty_name}"
        )));
    }
    let mut coerced_object = JsonMap::new();
    for (field_name, field_def) in &ty_def.fields {
        let field_position = InputPosition::input_field(ty_name, field_name);
        let field_value = object
            .iter()
            .find(|(key, _value)| key == field_name)
            .map(|(_key, value)| value);
        if let Some(field_value) = field_value {
            // A field bound to an absent variable is treated as not written.
            let unset_variable = field_value
                .as_variable()
                .is_some_and(|var_name| !variables.contains_key(var_name.as_str()));
            if !unset_variable {
                let coerced_value = coerce_argument_value(
                    schema,
                    variables,
                    field_position,
                    &field_def.ty,
                    field_value,
                )?;
                coerced_object.insert(field_name.as_str(), coerced_value);
                continue;
            }
        }
        if let Some(default) = &field_def.default_value {
            let default = graphql_value_to_json(field_position, default)?;
            coerced_object.insert(field_name.as_str(), default);
        } else if field_def.ty.is_non_null() {
            return Err(NormalizationError::argument_coercion(format!(
                "Missing value for non-null input object field {ty_name}.{field_name}"
            )));
        }
    }
    Ok(coerced_object.into())
}

/// Records each variable as it was supplied with the request, or as its default value.
///
/// Expects `values` to have been accepted by [`coerce_variable_values`].
pub fn normalize_variable_values(
    variable_definitions: &[Node<VariableDefinition>],
    values: &JsonMap,
) -> NormalizedVariables {
    let mut normalized = NormalizedVariables::new();
    for variable_def in variable_definitions {
        let value = if let Some(value) = values.get(variable_def.name.as_str()) {
            NormalizedValue::Input(value.clone())
        } else if let Some(default) = &variable_def.default_value {
            NormalizedValue::Default(default.clone())
        } else {
            continue;
        };
        normalized.insert(
            variable_def.name.clone(),
            NormalizedInputValue {
                type_name: variable_def.ty.to_string(),
                value,
            },
        );
    }
    normalized
}

/// Builds the normalized form of the arguments written on a field.
///
/// Arguments resolve the same way as in [`coerce_argument_values`], except that the result keeps
/// track of which parts were written inline, which came from variables, and which are defaults.
pub fn normalize_argument_values(
    field_def: &FieldDefinition,
    arguments: &[Node<Argument>],
    variables: &NormalizedVariables,
) -> IndexMap<Name, NormalizedInputValue> {
    let mut normalized = IndexMap::new();
    for arg_def in &field_def.arguments {
        let written = arguments
            .iter()
            .find(|arg| arg.name == arg_def.name)
            .and_then(|arg| normalize_literal(&arg.value, variables));
        let value = match (written, &arg_def.default_value) {
            (Some(value), _) => value,
            (None, Some(default)) => NormalizedValue::Default(default.clone()),
            (None, None) => continue,
        };
        normalized.insert(
            arg_def.name.clone(),
            NormalizedInputValue {
                type_name: arg_def.ty.to_string(),
                value,
            },
        );
    }
    normalized
}

/// Returns `None` for a reference to an unset variable.
fn normalize_literal(
    value: &Node<Value>,
    variables: &NormalizedVariables,
) -> Option<NormalizedValue> {
    match value.as_ref() {
        Value::Variable(name) => variables.get(name).map(|variable| NormalizedValue::Variable {
            name: name.clone(),
            value: Box::new(variable.value.clone()),
        }),
        Value::List(items) => Some(NormalizedValue::List(
            items
                .iter()
                .map(|item| {
                    normalize_literal(item, variables)
                        .unwrap_or_else(|| NormalizedValue::Literal(Node::new(Value::Null)))
                })
                .collect(),
        )),
        Value::Object(fields) => Some(NormalizedValue::Object(
            fields
                .iter()
                .filter_map(|(name, value)| {
                    Some((name.clone(), normalize_literal(value, variables)?))
                })
                .collect(),
        )),
        _ => Some(NormalizedValue::Literal(value.clone())),
    }
}
