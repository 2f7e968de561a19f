//! Function conversions in both directions.
//!
//! [`Callback`] wraps an engine callable so native code can invoke it with
//! typed arguments and a typed result. [`NativeFn`] wraps a native closure
//! so the engine can call it; its declared `length` equals the closure's
//! arity and arguments the caller leaves out are seen as `undefined`.

use std::marker::PhantomData;

use rquickjs::function::Rest;
use rquickjs::{Ctx, Function, Value};

use crate::error::{CallError, ConversionError, ConversionResult};
use crate::from::{FromEngine, from_engine};
use crate::into::IntoEngine;

// ─────────────────────────────────────────────────────────────────────────────
// Engine → native
// ─────────────────────────────────────────────────────────────────────────────

/// An engine function viewed as a native callable `Fn(Args) -> R`.
///
/// `Args` is a tuple of argument types, e.g. `Callback<'js, (i32, String), bool>`.
pub struct Callback<'js, Args, R> {
    ctx: Ctx<'js>,
    function: Function<'js>,
    _signature: PhantomData<fn(Args) -> R>,
}

impl<'js, Args, R> Clone for Callback<'js, Args, R> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            function: self.function.clone(),
            _signature: PhantomData,
        }
    }
}

impl<'js, Args, R> Callback<'js, Args, R> {
    /// The wrapped engine function.
    pub fn function(&self) -> &Function<'js> {
        &self.function
    }
}

impl<'js, Args, R> FromEngine<'js> for Callback<'js, Args, R> {
    fn try_from_engine(ctx: &Ctx<'js>, value: &Value<'js>) -> ConversionResult<Self> {
        let function = value
            .as_function()
            .cloned()
            .ok_or_else(|| ConversionError::new::<Self>(value))?;
        Ok(Self {
            ctx: ctx.clone(),
            function,
            _signature: PhantomData,
        })
    }
}

impl<'js, Args, R> IntoEngine<'js> for Callback<'js, Args, R> {
    fn into_engine(self, _ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        Ok(self.function.into_value())
    }
}

macro_rules! impl_callback {
    ($($arg:ident),*) => {
        impl<'js, $($arg,)* R> Callback<'js, ($($arg,)*), R>
        where
            $($arg: IntoEngine<'js>,)*
            R: FromEngine<'js>,
        {
            /// Invoke the engine function.
            #[allow(non_snake_case, clippy::too_many_arguments)]
            pub fn call(&self, $($arg: $arg),*) -> Result<R, CallError> {
                let result: Value<'js> = self
                    .function
                    .call(($($arg.into_engine(&self.ctx)?,)*))?;
                Ok(R::try_from_engine(&self.ctx, &result)?)
            }
        }
    };
}

impl_callback!();
impl_callback!(A);
impl_callback!(A, B);
impl_callback!(A, B, C);
impl_callback!(A, B, C, D);

// ─────────────────────────────────────────────────────────────────────────────
// Native → engine
// ─────────────────────────────────────────────────────────────────────────────

/// A native closure callable from the engine.
///
/// `Marker` is the closure's signature as a function pointer type
/// (`fn(A, B) -> R`); it is inferred from the closure.
pub trait NativeCallable<'js, Marker>: Send + 'static {
    const ARITY: usize;

    fn invoke(&self, ctx: &Ctx<'js>, args: &[Value<'js>]) -> rquickjs::Result<Value<'js>>;
}

fn arg_or_undefined<'js, T: FromEngine<'js>>(
    ctx: &Ctx<'js>,
    args: &[Value<'js>],
    index: usize,
) -> rquickjs::Result<T> {
    match args.get(index) {
        Some(value) => from_engine(ctx, value),
        None => from_engine(ctx, &Value::new_undefined(ctx.clone())),
    }
}

macro_rules! impl_native_callable {
    ($arity:expr; $($arg:ident => $index:expr),*) => {
        impl<'js, F, R, $($arg,)*> NativeCallable<'js, fn($($arg),*) -> R> for F
        where
            F: Fn($($arg),*) -> R + Send + 'static,
            $($arg: FromEngine<'js>,)*
            R: IntoEngine<'js>,
        {
            const ARITY: usize = $arity;

            #[allow(non_snake_case, unused_variables)]
            fn invoke(&self, ctx: &Ctx<'js>, args: &[Value<'js>]) -> rquickjs::Result<Value<'js>> {
                $(let $arg = arg_or_undefined::<$arg>(ctx, args, $index)?;)*
                (self)($($arg),*).into_engine(ctx)
            }
        }
    };
}

impl_native_callable!(0;);
impl_native_callable!(1; A => 0);
impl_native_callable!(2; A => 0, B => 1);
impl_native_callable!(3; A => 0, B => 1, C => 2);
impl_native_callable!(4; A => 0, B => 1, C => 2, D => 3);

/// A native closure ready to be converted into an engine function.
pub struct NativeFn<F, Marker> {
    name: Option<String>,
    function: F,
    _marker: PhantomData<Marker>,
}

impl<F, Marker> NativeFn<F, Marker> {
    pub fn new(function: F) -> Self {
        Self {
            name: None,
            function,
            _marker: PhantomData,
        }
    }

    /// Set the function's `name` property.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl<'js, F, Marker> IntoEngine<'js> for NativeFn<F, Marker>
where
    F: NativeCallable<'js, Marker>,
{
    fn into_engine(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        let callable = self.function;
        let function = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
                callable.invoke(&ctx, &args.0)
            },
        )?;
        function.set_length(F::ARITY)?;
        if let Some(name) = self.name {
            function.set_name(name)?;
        }
        Ok(function.into_value())
    }
}
