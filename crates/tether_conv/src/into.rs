//! Native → engine conversions.

use std::collections::HashMap;

use rquickjs::{Array, Ctx, Function, Object, String as JsString, Value};

use crate::from::Utf16String;

/// A native value that can be handed to the engine.
pub trait IntoEngine<'js> {
    fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>>;
}

/// Convert a native value into an engine value.
pub fn to_engine<'js, T: IntoEngine<'js>>(
    ctx: &Ctx<'js>,
    value: T,
) -> rquickjs::Result<Value<'js>> {
    value.into_engine(ctx)
}

impl<'js> IntoEngine<'js> for bool {
    fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        Ok(Value::new_bool(ctx.clone(), self))
    }
}

// Integers that always fit in an engine int
macro_rules! into_engine_small_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<'js> IntoEngine<'js> for $ty {
                fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
                    Ok(Value::new_int(ctx.clone(), i32::from(self)))
                }
            }
        )*
    };
}

into_engine_small_int!(u8, i8, u16, i16, i32);

macro_rules! into_engine_wide_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<'js> IntoEngine<'js> for $ty {
                fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
                    Ok(match i32::try_from(self) {
                        Ok(small) => Value::new_int(ctx.clone(), small),
                        Err(_) => Value::new_float(ctx.clone(), self as f64),
                    })
                }
            }
        )*
    };
}

into_engine_wide_int!(u32, u64, i64, usize, isize);

impl<'js> IntoEngine<'js> for f32 {
    fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        Ok(Value::new_float(ctx.clone(), f64::from(self)))
    }
}

impl<'js> IntoEngine<'js> for f64 {
    fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        Ok(Value::new_float(ctx.clone(), self))
    }
}

impl<'js> IntoEngine<'js> for &str {
    fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        Ok(JsString::from_str(ctx.clone(), self)?.into_value())
    }
}

impl<'js> IntoEngine<'js> for String {
    fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        self.as_str().into_engine(ctx)
    }
}

/// Builds a string from code units in chunks that stay under the engine's
/// argument limit.
const FROM_CODE_UNITS: &str = "(units) => { \
    let s = ''; \
    for (let i = 0; i < units.length; i += 4096) \
        s += String.fromCharCode.apply(null, units.slice(i, i + 4096)); \
    return s; \
}";

/// Well-formed UTF-16 goes through UTF-8; anything with an unpaired
/// surrogate is assembled unit by unit in the engine.
impl<'js> IntoEngine<'js> for Utf16String {
    fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        match String::from_utf16(&self.0) {
            Ok(s) => s.into_engine(ctx),
            Err(_) => {
                let from_code_units: Function = ctx.eval(FROM_CODE_UNITS)?;
                from_code_units.call((self.0.into_engine(ctx)?,))
            }
        }
    }
}

impl<'js> IntoEngine<'js> for Value<'js> {
    fn into_engine(self, _ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        Ok(self)
    }
}

impl<'js> IntoEngine<'js> for () {
    fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        Ok(Value::new_undefined(ctx.clone()))
    }
}

/// `None` becomes `null`.
impl<'js, T: IntoEngine<'js>> IntoEngine<'js> for Option<T> {
    fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        match self {
            Some(value) => value.into_engine(ctx),
            None => Ok(Value::new_null(ctx.clone())),
        }
    }
}

fn array_from_iter<'js, T, I>(ctx: &Ctx<'js>, items: I) -> rquickjs::Result<Value<'js>>
where
    T: IntoEngine<'js>,
    I: IntoIterator<Item = T>,
{
    let array = Array::new(ctx.clone())?;
    for (i, item) in items.into_iter().enumerate() {
        array.set(i, item.into_engine(ctx)?)?;
    }
    Ok(array.into_value())
}

impl<'js, T: IntoEngine<'js>> IntoEngine<'js> for Vec<T> {
    fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        array_from_iter(ctx, self)
    }
}

impl<'js, T: IntoEngine<'js>, const N: usize> IntoEngine<'js> for [T; N] {
    fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        array_from_iter(ctx, self)
    }
}

impl<'js, T: IntoEngine<'js>> IntoEngine<'js> for HashMap<String, T> {
    fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        let object = Object::new(ctx.clone())?;
        for (key, item) in self {
            object.set(key, item.into_engine(ctx)?)?;
        }
        Ok(object.into_value())
    }
}

impl<'js> IntoEngine<'js> for serde_json::Value {
    fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        use serde_json::Value as Json;

        match self {
            Json::Null => Ok(Value::new_null(ctx.clone())),
            Json::Bool(b) => b.into_engine(ctx),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i.into_engine(ctx)
                } else {
                    n.as_f64().unwrap_or(f64::NAN).into_engine(ctx)
                }
            }
            Json::String(s) => s.into_engine(ctx),
            Json::Array(items) => array_from_iter(ctx, items),
            Json::Object(map) => {
                let object = Object::new(ctx.clone())?;
                for (key, item) in map {
                    object.set(key, item.into_engine(ctx)?)?;
                }
                Ok(object.into_value())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::from::try_from_engine;
    use rquickjs::{Context, Runtime};

    #[test]
    fn test_scalar_round_trip() {
        let runtime = Runtime::new().unwrap();
        let ctx = Context::full(&runtime).unwrap();

        ctx.with(|ctx| {
            let v = to_engine(&ctx, true).unwrap();
            assert!(try_from_engine::<bool>(&ctx, &v).unwrap());

            for n in [i32::MIN, -1, 0, 1, i32::MAX] {
                let v = to_engine(&ctx, n).unwrap();
                assert_eq!(try_from_engine::<i32>(&ctx, &v).unwrap(), n);
            }
            for n in [0u32, u32::MAX] {
                let v = to_engine(&ctx, n).unwrap();
                assert_eq!(try_from_engine::<u32>(&ctx, &v).unwrap(), n);
            }
            for n in [i64::MIN, -(1i64 << 40), 1i64 << 52] {
                let v = to_engine(&ctx, n).unwrap();
                assert_eq!(try_from_engine::<i64>(&ctx, &v).unwrap(), n);
            }
            for x in [0.0f64, -1.25, f64::MAX, f64::INFINITY] {
                let v = to_engine(&ctx, x).unwrap();
                assert_eq!(try_from_engine::<f64>(&ctx, &v).unwrap(), x);
            }
            let v = to_engine(&ctx, 1.5f32).unwrap();
            assert_eq!(try_from_engine::<f32>(&ctx, &v).unwrap(), 1.5);

            let v = to_engine(&ctx, "ünïcode").unwrap();
            assert_eq!(try_from_engine::<String>(&ctx, &v).unwrap(), "ünïcode");

            let units = Utf16String::from("𝄞 clef");
            let v = to_engine(&ctx, units.clone()).unwrap();
            assert_eq!(try_from_engine::<Utf16String>(&ctx, &v).unwrap(), units);
        });
    }

    #[test]
    fn test_utf16_keeps_unpaired_surrogates() {
        let runtime = Runtime::new().unwrap();
        let ctx = Context::full(&runtime).unwrap();

        ctx.with(|ctx| {
            let units = Utf16String(vec![0x61, 0xD800, 0x62]);
            let v = to_engine(&ctx, units.clone()).unwrap();
            ctx.globals().set("s", v.clone()).unwrap();

            let intact: bool = ctx
                .eval("s.length === 3 && s.charCodeAt(0) === 0x61 && s.charCodeAt(1) === 0xD800")
                .unwrap();
            assert!(intact);
            assert_eq!(try_from_engine::<Utf16String>(&ctx, &v).unwrap(), units);

            let long = Utf16String([0xDFFF].repeat(10_000));
            let v = to_engine(&ctx, long.clone()).unwrap();
            assert_eq!(try_from_engine::<Utf16String>(&ctx, &v).unwrap(), long);
        });
    }

    #[test]
    fn test_composites_visible_to_script() {
        let runtime = Runtime::new().unwrap();
        let ctx = Context::full(&runtime).unwrap();

        ctx.with(|ctx| {
            let globals = ctx.globals();
            globals.set("list", to_engine(&ctx, vec![1, 2, 3]).unwrap()).unwrap();
            globals.set("pair", to_engine(&ctx, ["a", "b"]).unwrap()).unwrap();
            globals.set("missing", to_engine(&ctx, None::<i32>).unwrap()).unwrap();

            let mut map = HashMap::new();
            map.insert("k".to_string(), 7);
            globals.set("map", to_engine(&ctx, map).unwrap()).unwrap();

            let json = serde_json::json!({ "nested": { "n": 2 } });
            globals.set("json", to_engine(&ctx, json).unwrap()).unwrap();

            let sum: i32 = ctx.eval("list.reduce((a, b) => a + b, 0)").unwrap();
            assert_eq!(sum, 6);
            let joined: String = ctx.eval("pair.join('-')").unwrap();
            assert_eq!(joined, "a-b");
            let is_null: bool = ctx.eval("missing === null").unwrap();
            assert!(is_null);
            let k: i32 = ctx.eval("map.k + json.nested.n").unwrap();
            assert_eq!(k, 9);
        });
    }
}
