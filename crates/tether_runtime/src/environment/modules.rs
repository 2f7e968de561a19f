//! CommonJS `require` backed by the runtime's provider chain.
//!
//! Each module body runs once per environment inside
//! `function (exports, require, module, __filename, __dirname)`, with a
//! `require` bound to the module's own resolved path. A `require` cycle
//! sees the partially populated `module.exports` of the module still
//! loading.

use std::path::Path;

use rquickjs::{Ctx, Exception, Function, Object, Persistent, Value};

use super::Environment;
use crate::error::ResolveError;
use crate::ref_counted::WeakRef;
use crate::source::{Resolution, ResolveRequest};

/// A module's `module` object, kept alive across context scopes.
#[derive(Clone)]
pub(crate) struct ModuleInstance(Persistent<Object<'static>>);

// SAFETY: instances are created, cloned and restored only while the owning
// environment's context is entered, which happens on its agent thread.
// They are dropped together with the environment, before its VM.
unsafe impl Send for ModuleInstance {}
unsafe impl Sync for ModuleInstance {}

impl ModuleInstance {
    fn save<'js>(ctx: &Ctx<'js>, module: Object<'js>) -> Self {
        Self(Persistent::save(ctx, module))
    }

    fn restore<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
        self.0.clone().restore(ctx)
    }
}

fn throw_resolve(ctx: &Ctx<'_>, error: &ResolveError) -> rquickjs::Error {
    Exception::throw_message(ctx, &error.to_string())
}

/// Install the global `require`, resolving against the environment root.
pub(crate) fn install_require(ctx: &Ctx<'_>, env: WeakRef<Environment>) -> rquickjs::Result<()> {
    let require = require_function(ctx, env, String::new())?;
    ctx.globals().set("require", require)
}

fn require_function<'js>(
    ctx: &Ctx<'js>,
    env: WeakRef<Environment>,
    requester: String,
) -> rquickjs::Result<Function<'js>> {
    // Weak: the function lives inside the environment's own VM
    let function = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, specifier: String| -> rquickjs::Result<Value<'js>> {
            let Some(env) = env.upgrade() else {
                return Err(Exception::throw_internal(&ctx, "environment has been destroyed"));
            };
            require(&env, &ctx, &ResolveRequest::new(specifier, requester.clone()))
        },
    )?;
    function.set_name("require")?;
    Ok(function)
}

/// Resolve, instantiate if needed, and return `module.exports`.
pub(crate) fn require<'js>(
    env: &Environment,
    ctx: &Ctx<'js>,
    request: &ResolveRequest,
) -> rquickjs::Result<Value<'js>> {
    let resolution = env
        .resolver
        .resolve(request)
        .map_err(|e| throw_resolve(ctx, &e))?;

    let in_progress = env.loading.lock().get(&resolution.path).cloned();
    if let Some(partial) = in_progress {
        tracing::debug!(path = %resolution.path, "Cyclic require, returning partial exports");
        return partial.restore(ctx)?.get("exports");
    }

    let instance = env
        .modules
        .get_or_instantiate(&resolution.path, || instantiate(env, ctx, &resolution, request))?;
    instance.restore(ctx)?.get("exports")
}

fn instantiate<'js>(
    env: &Environment,
    ctx: &Ctx<'js>,
    resolution: &Resolution,
    request: &ResolveRequest,
) -> rquickjs::Result<ModuleInstance> {
    let path = resolution.path.as_str();
    let source = env
        .resolver
        .load_source_blocking(resolution, request, env.agent.platform())
        .map_err(|e| throw_resolve(ctx, &e))?;

    tracing::debug!(
        environment = %env.name,
        path = %path,
        provider = %resolution.provider_name(),
        "Instantiating module"
    );

    let module = Object::new(ctx.clone())?;
    let exports = Object::new(ctx.clone())?;
    module.set("exports", exports.clone())?;
    module.set("id", path)?;
    module.set("loaded", false)?;

    let instance = ModuleInstance::save(ctx, module.clone());
    env.loading.lock().insert(path.to_string(), instance.clone());
    let result = run_body(env, ctx, &source, path, &module, exports);
    env.loading.lock().remove(path);
    result?;

    module.set("loaded", true)?;
    Ok(instance)
}

fn run_body<'js>(
    env: &Environment,
    ctx: &Ctx<'js>,
    source: &str,
    path: &str,
    module: &Object<'js>,
    exports: Object<'js>,
) -> rquickjs::Result<()> {
    let wrapped = format!(
        "(function (exports, require, module, __filename, __dirname) {{{}\n}})",
        source
    );
    let body: Function = ctx.eval_with_options(wrapped, env.vm.eval_options())?;

    let require = require_function(ctx, env.self_ref.downgrade(), path.to_string())?;
    let dirname = Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    body.call::<_, ()>((exports, require, module.clone(), path, dirname))
}
