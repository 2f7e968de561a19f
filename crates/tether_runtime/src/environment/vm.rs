//! QuickJS runtime and context owned by one environment.

use rquickjs::context::EvalOptions;
use rquickjs::{Coerced, Context, Ctx, Exception, FromJs, Runtime, Value};

use crate::config::VmConfig;
use crate::error::EngineError;

pub(crate) struct Vm {
    // Dropped before the runtime
    pub(crate) context: Context,
    _runtime: Runtime,
    strict: bool,
}

impl Vm {
    /// Create the engine. Call on the thread that will run it: the engine
    /// measures stack depth from the creating thread.
    pub fn new(config: &VmConfig) -> Result<Self, EngineError> {
        let runtime = Runtime::new().map_err(|e| EngineError::Internal(e.to_string()))?;
        if let Some(limit) = config.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(size) = config.max_stack_size {
            runtime.set_max_stack_size(size);
        }
        if let Some(threshold) = config.gc_threshold {
            runtime.set_gc_threshold(threshold);
        }

        let context = Context::full(&runtime).map_err(|e| EngineError::Internal(e.to_string()))?;

        Ok(Self {
            context,
            _runtime: runtime,
            strict: config.strict,
        })
    }

    pub fn eval_options(&self) -> EvalOptions {
        let mut options = EvalOptions::default();
        options.global = true;
        options.strict = self.strict;
        options.backtrace_barrier = false;
        options
    }

    pub fn eval<'js>(
        &self,
        ctx: &Ctx<'js>,
        source: &str,
        name: &str,
    ) -> Result<Value<'js>, EngineError> {
        tracing::trace!("[vm] Evaluating {}", name);
        ctx.eval_with_options(source, self.eval_options())
            .map_err(|e| engine_error(ctx, e, name))
    }
}

/// Convert an engine error, taking the pending exception if there is one.
pub(crate) fn engine_error(ctx: &Ctx<'_>, error: rquickjs::Error, name: &str) -> EngineError {
    if !error.is_exception() {
        return EngineError::Internal(format!("{}: {}", name, error));
    }

    let thrown = ctx.catch();
    let stack = thrown
        .as_object()
        .and_then(|obj| Exception::from_object(obj.clone()))
        .and_then(|exception| exception.stack());
    let message = match Coerced::<String>::from_js(ctx, thrown) {
        Ok(text) => text.0,
        Err(_) => {
            let _ = ctx.catch();
            "<unprintable exception>".to_string()
        }
    };

    EngineError::Script {
        name: name.to_string(),
        message,
        stack,
    }
}
