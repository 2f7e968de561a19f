use rquickjs::{Type, Value};

/// Human-readable name for the runtime type of an engine value.
///
/// Used as the source type in [`crate::ConversionError`] messages.
pub fn js_type_name(value: &Value<'_>) -> &'static str {
    match value.type_of() {
        Type::Undefined | Type::Uninitialized => "undefined",
        Type::Null => "null",
        Type::Bool => "boolean",
        Type::Int | Type::Float => "number",
        Type::String => "string",
        Type::Symbol => "Symbol",
        Type::BigInt => "BigInt",
        Type::Array => "Array",
        Type::Function | Type::Constructor => "Function",
        _ => "Object",
    }
}
