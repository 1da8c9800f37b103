/// This macro is a wrapper around `tracing::trace!` and should not be confused with our snapshot
/// testing. It adds the context external tools need to show the data structures produced while
/// normalizing an operation.
///
/// The snapshot is tagged with the type name of the value, and the value is serialized to JSON
/// with serde_json:
/// ```ignore
/// snapshot!(query, "normalized query");
/// // Generates:
/// // trace!(snapshot = "NormalizedQuery", data = "{ .. }", "normalized query");
/// ```
macro_rules! snapshot {
    ($value:expr, $msg:literal) => {
        #[cfg(feature = "snapshot_tracing")]
        tracing::trace!(
            snapshot = std::any::type_name_of_val(&$value),
            data = serde_json::to_string(&$value).unwrap_or_else(|error| format!(
                concat!("could not serialize value for snapshot \"", $msg, "\": {}"),
                error
            )),
            $msg
        );
    };
}

pub(crate) use snapshot;
