//! Decides whether a field selection folds into a normalized field collected earlier at the same
//! level.

use std::collections::HashMap;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Type;
use apollo_compiler::executable;

use super::NormalizedField;
use super::NormalizedFieldId;

/// Returns true if two values are the same literal.
///
/// Variables compare by name. Lists compare element-wise and must have the same length. Objects
/// compare field by field, independent of field order.
pub(crate) fn same_value(left: &executable::Value, right: &executable::Value) -> bool {
    use apollo_compiler::executable::Value;
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Enum(left), Value::Enum(right)) => left == right,
        (Value::Variable(left), Value::Variable(right)) => left == right,
        (Value::String(left), Value::String(right)) => left == right,
        (Value::Float(left), Value::Float(right)) => left == right,
        (Value::Int(left), Value::Int(right)) => left == right,
        (Value::Boolean(left), Value::Boolean(right)) => left == right,
        (Value::List(left), Value::List(right)) if left.len() == right.len() => left
            .iter()
            .zip(right.iter())
            .all(|(left, right)| same_value(left, right)),
        (Value::Object(left), Value::Object(right)) if left.len() == right.len() => {
            left.iter().all(|(key, value)| {
                right
                    .iter()
                    .find(|(other_key, _)| key == other_key)
                    .is_some_and(|(_, other_value)| same_value(value, other_value))
            })
        }
        _ => false,
    }
}

/// Returns true if two argument lists are equivalent.
///
/// The arguments and values must be the same, independent of order.
pub(crate) fn same_arguments(
    left: &[Node<executable::Argument>],
    right: &[Node<executable::Argument>],
) -> bool {
    if left.len() != right.len() {
        return false;
    }

    let right = right
        .iter()
        .map(|arg| (&arg.name, arg))
        .collect::<HashMap<_, _>>();

    left.iter().all(|arg| {
        right
            .get(&arg.name)
            .is_some_and(|right_arg| same_value(&arg.value, &right_arg.value))
    })
}

/// Finds, among the normalized fields already collected for one response key, the one a new
/// selection of `field_name` returning `field_type` with `arguments` merges into.
pub(crate) fn find_matching_field<'a>(
    candidates: impl IntoIterator<Item = (NormalizedFieldId, &'a NormalizedField)>,
    field_name: &Name,
    field_type: &Type,
    arguments: &[Node<executable::Argument>],
) -> Option<NormalizedFieldId> {
    candidates
        .into_iter()
        .find(|(_, candidate)| {
            candidate.field_name == *field_name
                && candidate.field_type == *field_type
                && same_arguments(&candidate.ast_arguments, arguments)
        })
        .map(|(id, _)| id)
}
