use apollo_compiler::validation::WithErrors;

/// Errors returned while building a [`NormalizedQuery`](crate::NormalizedQuery).
///
/// `Internal` errors mean the inputs broke a contract that validation would have caught (a
/// fragment spread naming a missing fragment, a type condition that is not a composite type...),
/// while the coercion variants report invalid user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    #[error(
        "An internal error has occurred, please report this bug to Apollo.\n\nDetails: {message}"
    )]
    Internal { message: String },
    #[error("Unknown operation named {name:?}")]
    UnknownOperation { name: Option<String> },
    #[error("Invalid variables: {message}")]
    VariableCoercion { message: String },
    #[error("Invalid argument value: {message}")]
    ArgumentCoercion { message: String },
    #[error("Selection processing recursion limit ({limit}) exceeded")]
    RecursionLimitExceeded { limit: usize },
    #[error("Invalid GraphQL: {message}")]
    InvalidGraphQL { message: String },
}

impl NormalizationError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub(crate) fn variable_coercion(message: impl Into<String>) -> Self {
        Self::VariableCoercion {
            message: message.into(),
        }
    }

    pub(crate) fn argument_coercion(message: impl Into<String>) -> Self {
        Self::ArgumentCoercion {
            message: message.into(),
        }
    }

    /// Whether this error is the result of a broken contract rather than of invalid input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

impl<T> From<WithErrors<T>> for NormalizationError {
    fn from(value: WithErrors<T>) -> Self {
        Self::InvalidGraphQL {
            message: value.errors.to_string(),
        }
    }
}
