//! Environment
//!
//! A named JavaScript VM bound to exactly one [`Agent`]. The VM is only
//! entered on that agent's thread; every other caller goes through the
//! scheduling methods, which hand the task a strong reference to the
//! environment so it outlives any deferred work.

mod globals;
mod module_cache;
mod modules;
mod vm;

pub use module_cache::ModuleCache;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rquickjs::{Ctx, Value};
use tether_conv::{FromEngine, IntoEngine};

use crate::agent::{Agent, Priority};
use crate::config::VmConfig;
use crate::error::{AgentError, EnvironmentError, EnvironmentResult};
use crate::ref_counted::{Ref, RefCounted, SelfRef};
use crate::source::{ModuleResolver, ResolveRequest};

use modules::ModuleInstance;
use vm::{Vm, engine_error};

pub struct Environment {
    self_ref: SelfRef<Environment>,
    name: String,
    // Engine handles below are released before `vm`
    modules: ModuleCache<ModuleInstance>,
    loading: Mutex<HashMap<String, ModuleInstance>>,
    vm: Vm,
    entered: AtomicBool,
    agent: Ref<Agent>,
    resolver: Arc<ModuleResolver>,
}

impl RefCounted for Environment {
    fn self_ref(&self) -> &SelfRef<Self> {
        &self.self_ref
    }
}

/// Clears the re-entrancy flag even if the scoped closure panics.
struct EnteredGuard<'a>(&'a AtomicBool);

impl Drop for EnteredGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Environment {
    /// Create an environment on `agent`, building its VM on the agent's
    /// thread and installing the host globals.
    pub fn create(
        name: impl Into<String>,
        agent: Ref<Agent>,
        resolver: Arc<ModuleResolver>,
        config: &VmConfig,
    ) -> EnvironmentResult<Ref<Environment>> {
        let name = name.into();
        let vm_config = config.clone();
        let vm = agent.run_now_blocking(move || Vm::new(&vm_config))??;

        let env = Ref::create(|self_ref| Environment {
            self_ref,
            name,
            modules: ModuleCache::new(),
            loading: Mutex::new(HashMap::new()),
            vm,
            entered: AtomicBool::new(false),
            agent,
            resolver,
        });

        env.run_now_blocking(|env| env.install_globals())??;
        tracing::debug!("[environment:{}] Created on agent '{}'", env.name, env.agent.name());
        Ok(env)
    }

    fn install_globals(&self) -> EnvironmentResult<()> {
        let weak = self.self_ref.downgrade();
        self.with_context(|ctx| {
            globals::register_globals(&ctx)
                .and_then(|_| modules::install_require(&ctx, weak))
                .map_err(|e| engine_error(&ctx, e, "<globals>"))
        })??;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agent(&self) -> &Ref<Agent> {
        &self.agent
    }

    pub fn resolver(&self) -> &Arc<ModuleResolver> {
        &self.resolver
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scheduling
    // ─────────────────────────────────────────────────────────────────────────

    pub fn run_now_blocking<F, R>(&self, task: F) -> Result<R, AgentError>
    where
        F: FnOnce(&Environment) -> R + Send + 'static,
        R: Send + 'static,
    {
        let this = self.to_ref();
        self.agent.run_now_blocking(move || task(&this))
    }

    pub fn run_later<F>(&self, task: F) -> Result<(), AgentError>
    where
        F: FnOnce(&Environment) + Send + 'static,
    {
        let this = self.to_ref();
        self.agent.run_later(move || task(&this))
    }

    pub fn run_with_priority<F>(&self, task: F, priority: Priority) -> Result<(), AgentError>
    where
        F: FnOnce(&Environment) + Send + 'static,
    {
        let this = self.to_ref();
        self.agent.run_with_priority(move || task(&this), priority)
    }

    pub fn run_after<F>(&self, task: F, delay: Duration) -> Result<(), AgentError>
    where
        F: FnOnce(&Environment) + Send + 'static,
    {
        let this = self.to_ref();
        self.agent.run_after(move || task(&this), delay)
    }

    pub fn run_async<F, R>(
        &self,
        task: F,
    ) -> impl Future<Output = Result<R, AgentError>> + Send + 'static
    where
        F: FnOnce(&Environment) -> R + Send + 'static,
        R: Send + 'static,
    {
        let this = self.to_ref();
        self.agent.run_async(move || task(&this))
    }

    /// Run `task` off the agent thread. The task may not enter the VM.
    pub fn run_in_background<F, R>(&self, task: F) -> Result<tokio::task::JoinHandle<R>, AgentError>
    where
        F: FnOnce(&Environment) -> R + Send + 'static,
        R: Send + 'static,
    {
        let this = self.to_ref();
        self.agent.run_in_background(move || task(&this))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // VM access (agent thread only)
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter the VM.
    ///
    /// Fails off the agent thread, and when called from inside another
    /// `with_context` scope (a native callback already has its `Ctx`).
    pub fn with_context<F, R>(&self, f: F) -> EnvironmentResult<R>
    where
        F: for<'js> FnOnce(Ctx<'js>) -> R + Send,
        R: Send,
    {
        if !self.agent.is_current() {
            return Err(EnvironmentError::WrongThread(self.name.clone()));
        }
        if self.entered.swap(true, Ordering::SeqCst) {
            return Err(EnvironmentError::Reentrant(self.name.clone()));
        }
        let _guard = EnteredGuard(&self.entered);
        Ok(self.vm.context.with(f))
    }

    /// Evaluate a script and convert its completion value.
    pub fn evaluate_script<T>(&self, source: &str, name: &str) -> EnvironmentResult<T>
    where
        T: for<'js> FromEngine<'js> + Send,
    {
        self.with_context(|ctx| -> EnvironmentResult<T> {
            let value = self.vm.eval(&ctx, source, name)?;
            Ok(T::try_from_engine(&ctx, &value)?)
        })
        .and_then(|result| result)
    }

    pub fn get_global<T>(&self, name: &str) -> EnvironmentResult<T>
    where
        T: for<'js> FromEngine<'js> + Send,
    {
        self.with_context(|ctx| -> EnvironmentResult<T> {
            let value: Value = ctx
                .globals()
                .get(name)
                .map_err(|e| engine_error(&ctx, e, name))?;
            Ok(T::try_from_engine(&ctx, &value)?)
        })
        .and_then(|result| result)
    }

    pub fn set_global<V>(&self, name: &str, value: V) -> EnvironmentResult<()>
    where
        V: for<'js> IntoEngine<'js> + Send,
    {
        self.with_context(|ctx| -> EnvironmentResult<()> {
            value
                .into_engine(&ctx)
                .and_then(|v| ctx.globals().set(name, v))
                .map_err(|e| engine_error(&ctx, e, name))?;
            Ok(())
        })
        .and_then(|result| result)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Modules
    // ─────────────────────────────────────────────────────────────────────────

    /// `require(specifier)` from the top level, on the agent thread.
    pub fn require<T>(&self, specifier: &str) -> EnvironmentResult<T>
    where
        T: for<'js> FromEngine<'js> + Send,
    {
        let request = ResolveRequest::top_level(specifier);
        self.resolver.resolve(&request)?;

        self.with_context(|ctx| -> EnvironmentResult<T> {
            let exports = modules::require(self, &ctx, &request)
                .map_err(|e| engine_error(&ctx, e, specifier))?;
            Ok(T::try_from_engine(&ctx, &exports)?)
        })
        .and_then(|result| result)
    }

    /// Load a module graph asynchronously, then require it on the agent.
    pub fn import<T>(
        &self,
        specifier: &str,
    ) -> impl Future<Output = EnvironmentResult<T>> + Send + 'static
    where
        T: for<'js> FromEngine<'js> + Send + 'static,
    {
        let this = self.to_ref();
        let request = ResolveRequest::top_level(specifier);

        async move {
            this.resolver.prefetch(&request).await?;
            let specifier = request.path;
            this.run_async(move |env| env.require::<T>(&specifier)).await?
        }
    }

    /// Whether a module at `path` has been instantiated in this environment.
    pub fn has_module(&self, path: &str) -> bool {
        self.modules.contains(path)
    }

    pub fn loaded_modules(&self) -> Vec<String> {
        self.modules.paths()
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        tracing::debug!("[environment:{}] Dropped", self.name);
    }
}
