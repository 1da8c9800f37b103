use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Options for [`QueryNormalizer`](crate::QueryNormalizer).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct NormalizerConfig {
    /// Maximum depth of the normalized tree.
    ///
    /// Normalization recurses once per level of field nesting. Operations are normally bounded
    /// before they reach the normalizer (by operation limits or parser limits), so no bound is
    /// applied here unless one is configured.
    ///
    /// Defaults to no limit.
    pub recursion_limit: Option<usize>,

    /// Whether normalizing with raw variables also records, on every normalized field, argument
    /// values that remember whether they came from a variable or from an inline literal.
    ///
    /// Defaults to true.
    pub normalized_arguments: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            recursion_limit: None,
            normalized_arguments: true,
        }
    }
}

impl NormalizerConfig {
    /// Returns an error if `depth` goes past the configured limit.
    pub(crate) fn check_depth(&self, depth: usize) -> Result<(), crate::NormalizationError> {
        match self.recursion_limit {
            Some(limit) if depth > limit => {
                tracing::error!("selection processing recursion limit({limit}) exceeded");
                Err(crate::NormalizationError::RecursionLimitExceeded { limit })
            }
            _ => Ok(()),
        }
    }
}
