//! This module contains functions used to bridge the apollo compiler serialization methods with
//! serialization with serde.

use apollo_compiler::Node;
use apollo_compiler::executable;
use serde::Serializer;
use serde::ser::SerializeSeq;

pub(crate) fn serialize_exe_argument_nodes<S: Serializer>(
    args: &[Node<executable::Argument>],
    ser: S,
) -> Result<S::Ok, S::Error> {
    let mut ser = ser.serialize_seq(Some(args.len()))?;
    args.iter().try_for_each(|arg| {
        ser.serialize_element(&format!(
            "{}: {}",
            arg.name,
            arg.value.serialize().no_indent()
        ))
    })?;
    ser.end()
}

pub(crate) fn serialize_exe_field_nodes<S: Serializer>(
    fields: &[Node<executable::Field>],
    ser: S,
) -> Result<S::Ok, S::Error> {
    let mut ser = ser.serialize_seq(Some(fields.len()))?;
    fields.iter().try_for_each(|field| {
        ser.serialize_element(&field.serialize().no_indent().to_string())
    })?;
    ser.end()
}
