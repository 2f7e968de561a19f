//! Conversion error types.

use rquickjs::{Ctx, Exception, Value};

use crate::type_name::js_type_name;

/// A value could not be converted into the requested type.
///
/// Carries the observed JavaScript type of the source value and the Rust
/// type that was asked for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Could not convert value of type {from} to {to}")]
pub struct ConversionError {
    /// JavaScript type of the value, as reported by [`js_type_name`]
    pub from: &'static str,
    /// Destination type name
    pub to: String,
}

impl ConversionError {
    /// Build an error for converting `value` into `T`.
    pub fn new<T: ?Sized>(value: &Value<'_>) -> Self {
        Self {
            from: js_type_name(value),
            to: std::any::type_name::<T>().to_string(),
        }
    }

    /// Build an error with an explicit destination name.
    pub fn named(value: &Value<'_>, to: impl Into<String>) -> Self {
        Self {
            from: js_type_name(value),
            to: to.into(),
        }
    }

    /// Raise this error as a `TypeError` in the given context.
    pub fn throw(&self, ctx: &Ctx<'_>) -> rquickjs::Error {
        Exception::throw_type(ctx, &self.to_string())
    }
}

pub type ConversionResult<T> = Result<T, ConversionError>;

/// Errors from invoking an engine function through a [`crate::Callback`].
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The engine reported a failure (a thrown exception is left pending
    /// in the context)
    #[error("Engine error: {0}")]
    Engine(#[from] rquickjs::Error),

    /// An argument or the return value could not be converted
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl CallError {
    /// Turn this error back into an engine error, throwing conversion
    /// failures as a `TypeError`.
    pub fn into_js(self, ctx: &Ctx<'_>) -> rquickjs::Error {
        match self {
            CallError::Engine(e) => e,
            CallError::Conversion(e) => e.throw(ctx),
        }
    }
}
