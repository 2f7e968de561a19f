//! Engine → native conversions.

use std::collections::HashMap;

use rquickjs::{Coerced, Ctx, FromJs, Function, Value};

use crate::error::{ConversionError, ConversionResult};

/// A native type that can be produced from an engine value.
///
/// Implementations must not leave an exception pending in the context
/// when they fail; failure is reported through the returned error only.
pub trait FromEngine<'js>: Sized {
    fn try_from_engine(ctx: &Ctx<'js>, value: &Value<'js>) -> ConversionResult<Self>;
}

/// Convert without touching the engine's exception state.
pub fn try_from_engine<'js, T: FromEngine<'js>>(
    ctx: &Ctx<'js>,
    value: &Value<'js>,
) -> ConversionResult<T> {
    T::try_from_engine(ctx, value)
}

/// Convert, raising a failure as a `TypeError` in the engine.
pub fn from_engine<'js, T: FromEngine<'js>>(
    ctx: &Ctx<'js>,
    value: &Value<'js>,
) -> rquickjs::Result<T> {
    T::try_from_engine(ctx, value).map_err(|e| e.throw(ctx))
}

pub(crate) fn as_number(value: &Value<'_>) -> Option<f64> {
    value
        .as_int()
        .map(f64::from)
        .or_else(|| value.as_float())
}

// ─────────────────────────────────────────────────────────────────────────────
// Scalars
// ─────────────────────────────────────────────────────────────────────────────

impl<'js> FromEngine<'js> for bool {
    fn try_from_engine(_ctx: &Ctx<'js>, value: &Value<'js>) -> ConversionResult<Self> {
        value
            .as_bool()
            .ok_or_else(|| ConversionError::new::<bool>(value))
    }
}

macro_rules! from_engine_number {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<'js> FromEngine<'js> for $ty {
                fn try_from_engine(_ctx: &Ctx<'js>, value: &Value<'js>) -> ConversionResult<Self> {
                    as_number(value)
                        .map(|n| n as $ty)
                        .ok_or_else(|| ConversionError::new::<$ty>(value))
                }
            }
        )*
    };
}

from_engine_number!(u8, i8, u16, i16, u32, i32, u64, i64, usize, isize, f32, f64);

impl<'js> FromEngine<'js> for String {
    fn try_from_engine(_ctx: &Ctx<'js>, value: &Value<'js>) -> ConversionResult<Self> {
        value
            .as_string()
            .and_then(|s| s.to_string().ok())
            .ok_or_else(|| ConversionError::new::<String>(value))
    }
}

/// A string as UTF-16 code units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Utf16String(pub Vec<u16>);

impl Utf16String {
    pub fn as_units(&self) -> &[u16] {
        &self.0
    }

    /// Decode to UTF-8, replacing unpaired surrogates.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }
}

impl From<&str> for Utf16String {
    fn from(s: &str) -> Self {
        Self(s.encode_utf16().collect())
    }
}

/// Reads every code unit so unpaired surrogates survive.
const CODE_UNITS: &str = "(s) => { \
    const units = new Array(s.length); \
    for (let i = 0; i < s.length; i++) units[i] = s.charCodeAt(i); \
    return units; \
}";

impl<'js> FromEngine<'js> for Utf16String {
    fn try_from_engine(ctx: &Ctx<'js>, value: &Value<'js>) -> ConversionResult<Self> {
        if !value.is_string() {
            return Err(ConversionError::new::<Utf16String>(value));
        }

        let units = ctx
            .eval::<Function, _>(CODE_UNITS)
            .and_then(|code_units| code_units.call::<_, Value>((value.clone(),)));
        match units {
            Ok(units) => Vec::<u16>::try_from_engine(ctx, &units)
                .map(Utf16String)
                .map_err(|_| ConversionError::new::<Utf16String>(value)),
            Err(_) => {
                let _ = ctx.catch();
                Err(ConversionError::new::<Utf16String>(value))
            }
        }
    }
}

impl<'js> FromEngine<'js> for Value<'js> {
    fn try_from_engine(_ctx: &Ctx<'js>, value: &Value<'js>) -> ConversionResult<Self> {
        Ok(value.clone())
    }
}

/// Accepts any value and discards it.
impl<'js> FromEngine<'js> for () {
    fn try_from_engine(_ctx: &Ctx<'js>, _value: &Value<'js>) -> ConversionResult<Self> {
        Ok(())
    }
}

/// The `ToString` rendering of any value, as `String(value)` would produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Displayed(pub String);

impl std::fmt::Display for Displayed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'js> FromEngine<'js> for Displayed {
    fn try_from_engine(ctx: &Ctx<'js>, value: &Value<'js>) -> ConversionResult<Self> {
        match Coerced::<String>::from_js(ctx, value.clone()) {
            Ok(s) => Ok(Displayed(s.0)),
            Err(_) => {
                // Symbols throw on coercion; leave no exception behind
                let _ = ctx.catch();
                Err(ConversionError::new::<Displayed>(value))
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Composites
// ─────────────────────────────────────────────────────────────────────────────

/// `null` and `undefined` are absent; any value that fails to convert is
/// absent as well.
impl<'js, T: FromEngine<'js>> FromEngine<'js> for Option<T> {
    fn try_from_engine(ctx: &Ctx<'js>, value: &Value<'js>) -> ConversionResult<Self> {
        if value.is_null() || value.is_undefined() {
            return Ok(None);
        }
        Ok(T::try_from_engine(ctx, value).ok())
    }
}

impl<'js, T: FromEngine<'js>> FromEngine<'js> for Vec<T> {
    fn try_from_engine(ctx: &Ctx<'js>, value: &Value<'js>) -> ConversionResult<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| ConversionError::new::<Vec<T>>(value))?;

        let mut out = Vec::with_capacity(array.len());
        for i in 0..array.len() {
            let item: Value = array
                .get(i)
                .map_err(|_| ConversionError::new::<Vec<T>>(value))?;
            out.push(T::try_from_engine(ctx, &item)?);
        }
        Ok(out)
    }
}

/// Reads the first `N` elements; the array may be longer.
impl<'js, T: FromEngine<'js>, const N: usize> FromEngine<'js> for [T; N] {
    fn try_from_engine(ctx: &Ctx<'js>, value: &Value<'js>) -> ConversionResult<Self> {
        let array = value
            .as_array()
            .filter(|a| a.len() >= N)
            .ok_or_else(|| ConversionError::new::<[T; N]>(value))?;

        let mut out = Vec::with_capacity(N);
        for i in 0..N {
            let item: Value = array
                .get(i)
                .map_err(|_| ConversionError::new::<[T; N]>(value))?;
            out.push(T::try_from_engine(ctx, &item)?);
        }
        <[T; N]>::try_from(out).map_err(|_| ConversionError::new::<[T; N]>(value))
    }
}

/// Plain objects keyed by their own enumerable string properties.
impl<'js, T: FromEngine<'js>> FromEngine<'js> for HashMap<String, T> {
    fn try_from_engine(ctx: &Ctx<'js>, value: &Value<'js>) -> ConversionResult<Self> {
        let object = value
            .as_object()
            .filter(|_| !value.is_array() && !value.is_function())
            .ok_or_else(|| ConversionError::new::<HashMap<String, T>>(value))?;

        let mut out = HashMap::new();
        for prop in object.props::<String, Value>() {
            let (key, item) = prop.map_err(|_| ConversionError::new::<HashMap<String, T>>(value))?;
            out.insert(key, T::try_from_engine(ctx, &item)?);
        }
        Ok(out)
    }
}

impl<'js> FromEngine<'js> for serde_json::Value {
    fn try_from_engine(ctx: &Ctx<'js>, value: &Value<'js>) -> ConversionResult<Self> {
        use serde_json::Value as Json;

        if value.is_null() || value.is_undefined() {
            return Ok(Json::Null);
        }
        if let Some(b) = value.as_bool() {
            return Ok(Json::Bool(b));
        }
        if let Some(i) = value.as_int() {
            return Ok(Json::from(i));
        }
        if let Some(f) = value.as_float() {
            return Ok(serde_json::Number::from_f64(f)
                .map(Json::Number)
                .unwrap_or(Json::Null));
        }
        if value.is_string() {
            return String::try_from_engine(ctx, value).map(Json::String);
        }
        if value.is_array() {
            return Vec::<Json>::try_from_engine(ctx, value).map(Json::Array);
        }
        if value.is_object() && !value.is_function() {
            let map = HashMap::<String, Json>::try_from_engine(ctx, value)?;
            return Ok(Json::Object(map.into_iter().collect()));
        }
        Err(ConversionError::new::<Json>(value))
    }
}
