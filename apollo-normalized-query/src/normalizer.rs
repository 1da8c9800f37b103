use apollo_compiler::ExecutableDocument;
use apollo_compiler::executable::Operation;

use crate::JsonMap;
use crate::config::NormalizerConfig;
use crate::error::NormalizationError;
use crate::normalized::NamedFragments;
use crate::normalized::NormalizedQuery;
use crate::normalized::builder::FieldCollectionContext;
use crate::normalized::builder::QueryBuilder;
use crate::schema::QuerySchema;
use crate::values::coerce_variable_values;
use crate::values::normalize_variable_values;

/// Builds [`NormalizedQuery`] trees for operations against one schema.
///
/// Operations are expected to have been validated against the schema.
#[derive(Debug, Clone)]
pub struct QueryNormalizer {
    schema: QuerySchema,
    config: NormalizerConfig,
}

impl QueryNormalizer {
    pub fn new(schema: QuerySchema, config: NormalizerConfig) -> Self {
        Self { schema, config }
    }

    pub fn schema(&self) -> &QuerySchema {
        &self.schema
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalizes the operation named `operation_name` of `document`, or its only operation when
    /// `operation_name` is `None`, with already coerced variable values.
    #[cfg_attr(
        feature = "snapshot_tracing",
        tracing::instrument(level = "trace", skip_all, name = "QueryNormalizer::normalize")
    )]
    pub fn normalize(
        &self,
        document: &ExecutableDocument,
        operation_name: Option<&str>,
        coerced_variables: &JsonMap,
    ) -> Result<NormalizedQuery, NormalizationError> {
        let operation = get_operation(document, operation_name)?;
        let fragments = NamedFragments::from_document(document);
        self.normalize_operation(operation, &fragments, coerced_variables)
    }

    /// Like [`normalize`](Self::normalize), coercing the raw variables of the request first.
    ///
    /// Unless disabled by [`NormalizerConfig::normalized_arguments`], normalized fields also get
    /// the normalized form of their arguments.
    #[cfg_attr(
        feature = "snapshot_tracing",
        tracing::instrument(
            level = "trace",
            skip_all,
            name = "QueryNormalizer::normalize_with_raw_variables"
        )
    )]
    pub fn normalize_with_raw_variables(
        &self,
        document: &ExecutableDocument,
        operation_name: Option<&str>,
        raw_variables: &JsonMap,
    ) -> Result<NormalizedQuery, NormalizationError> {
        let operation = get_operation(document, operation_name)?;
        let fragments = NamedFragments::from_document(document);
        self.normalize_operation_with_raw_variables(operation, &fragments, raw_variables)
    }

    /// Normalizes `operation`, using `fragments` to resolve its fragment spreads.
    pub fn normalize_operation(
        &self,
        operation: &Operation,
        fragments: &NamedFragments,
        coerced_variables: &JsonMap,
    ) -> Result<NormalizedQuery, NormalizationError> {
        let context = FieldCollectionContext {
            schema: &self.schema,
            fragments,
            variables: coerced_variables,
            normalized_variables: None,
        };
        QueryBuilder::new(context, &self.config).build(operation)
    }

    pub fn normalize_operation_with_raw_variables(
        &self,
        operation: &Operation,
        fragments: &NamedFragments,
        raw_variables: &JsonMap,
    ) -> Result<NormalizedQuery, NormalizationError> {
        let coerced_variables =
            coerce_variable_values(self.schema.schema(), &operation.variables, raw_variables)?;
        let normalized_variables = self
            .config
            .normalized_arguments
            .then(|| normalize_variable_values(&operation.variables, raw_variables));
        let context = FieldCollectionContext {
            schema: &self.schema,
            fragments,
            variables: &coerced_variables,
            normalized_variables: normalized_variables.as_ref(),
        };
        QueryBuilder::new(context, &self.config).build(operation)
    }
}

fn get_operation<'doc>(
    document: &'doc ExecutableDocument,
    operation_name: Option<&str>,
) -> Result<&'doc Operation, NormalizationError> {
    document
        .operations
        .get(operation_name)
        .map(|operation| operation.as_ref())
        .map_err(|_| NormalizationError::UnknownOperation {
            name: operation_name.map(str::to_owned),
        })
}

/// Normalizes an operation of `document` with already coerced variable values, using the
/// default configuration.
pub fn normalize_operation(
    schema: &QuerySchema,
    document: &ExecutableDocument,
    operation_name: Option<&str>,
    coerced_variables: &JsonMap,
) -> Result<NormalizedQuery, NormalizationError> {
    QueryNormalizer::new(schema.clone(), NormalizerConfig::default()).normalize(
        document,
        operation_name,
        coerced_variables,
    )
}

/// Normalizes an operation of `document` from the raw variables of the request, using the
/// default configuration.
pub fn normalize_operation_with_raw_variables(
    schema: &QuerySchema,
    document: &ExecutableDocument,
    operation_name: Option<&str>,
    raw_variables: &JsonMap,
) -> Result<NormalizedQuery, NormalizationError> {
    QueryNormalizer::new(schema.clone(), NormalizerConfig::default()).normalize_with_raw_variables(
        document,
        operation_name,
        raw_variables,
    )
}
