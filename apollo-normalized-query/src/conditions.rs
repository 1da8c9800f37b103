//! Static evaluation of `@skip` and `@include` against coerced variable values.

use apollo_compiler::executable::DirectiveList;
use apollo_compiler::executable::Value;

use crate::JsonMap;
use crate::error::NormalizationError;

/// Returns whether a selection carrying `directives` is part of the operation once `@skip` and
/// `@include` are applied.
///
/// A selection is excluded if any `@skip(if:)` evaluates to true or any `@include(if:)` evaluates
/// to false. A variable that is absent from `variables` (or null) lets the selection through.
pub(crate) fn should_include(
    directives: &DirectiveList,
    variables: &JsonMap,
) -> Result<bool, NormalizationError> {
    for directive in directives.iter() {
        let negated = match directive.name.as_str() {
            "include" => false,
            "skip" => true,
            _ => continue,
        };
        let value = directive
            .arguments
            .iter()
            .find(|argument| argument.name == "if")
            .map(|argument| &argument.value)
            .ok_or_else(|| {
                NormalizationError::internal(format!(
                    "missing if argument on @{}",
                    directive.name
                ))
            })?;
        let condition = match value.as_ref() {
            Value::Boolean(condition) => *condition,
            Value::Variable(name) => variables
                .get(name.as_str())
                .and_then(|value| value.as_bool())
                // An unset `$var` neither skips nor drops the selection.
                .unwrap_or(!negated),
            _ => {
                return Err(NormalizationError::internal(format!(
                    "expected boolean or variable `if` argument, got {value}"
                )));
            }
        };
        if condition == negated {
            return Ok(false);
        }
    }
    Ok(true)
}
