//! Tether Conversion Layer
//!
//! Typed, bidirectional conversion between native Rust values and QuickJS
//! engine values.
//!
//! # Overview
//!
//! - [`FromEngine`] produces a native value from an engine value. The
//!   non-throwing entry point is [`try_from_engine`]; [`from_engine`]
//!   raises failures as a `TypeError` inside the engine.
//! - [`IntoEngine`] hands a native value to the engine ([`to_engine`]).
//! - Composites nest: `Option<T>`, `Vec<T>`, `[T; N]`, `HashMap<String, T>`
//!   and functions in both directions ([`Callback`], [`NativeFn`]).
//!
//! Every conversion takes the engine context explicitly; none of them is
//! usable outside of a context scope.

mod error;
mod from;
mod function;
mod into;
mod type_name;

pub use error::{CallError, ConversionError, ConversionResult};
pub use from::{Displayed, FromEngine, Utf16String, from_engine, try_from_engine};
pub use function::{Callback, NativeCallable, NativeFn};
pub use into::{IntoEngine, to_engine};
pub use type_name::js_type_name;
