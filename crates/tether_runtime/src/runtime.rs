//! Runtime
//!
//! Top-level object: owns the execution platform, the source provider
//! chain, the main environment and any additional environments.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::agent::Agent;
use crate::config::{MAIN_ENVIRONMENT, RuntimeConfig};
use crate::environment::Environment;
use crate::error::{RuntimeError, RuntimeResult};
use crate::platform::ExecutionPlatform;
use crate::ref_counted::{Ref, RefCounted, SelfRef};
use crate::source::{FileSystemSourceProvider, ModuleResolver, SourceProvider};

pub struct Runtime {
    self_ref: SelfRef<Runtime>,
    config: RuntimeConfig,
    // Environments go before the platform their agents run on
    environments: DashMap<String, Ref<Environment>>,
    main: Ref<Environment>,
    resolver: Arc<ModuleResolver>,
    platform: ExecutionPlatform,
}

impl RefCounted for Runtime {
    fn self_ref(&self) -> &SelfRef<Self> {
        &self.self_ref
    }
}

fn agent_name(environment: &str) -> String {
    format!("js-{}", environment)
}

impl Runtime {
    pub fn create(config: RuntimeConfig) -> RuntimeResult<Ref<Runtime>> {
        tracing::debug!("[runtime] Creating");
        let platform = ExecutionPlatform::new(&config.platform).map_err(RuntimeError::Platform)?;

        let resolver = Arc::new(ModuleResolver::new());
        if config.modules.filesystem {
            let base_dir = match &config.modules.base_dir {
                Some(dir) => dir.clone(),
                None => std::env::current_dir()?,
            };
            resolver.add_provider(Arc::new(FileSystemSourceProvider::new(base_dir)));
        }

        let agent = Agent::spawn(agent_name(MAIN_ENVIRONMENT), platform.clone())?;
        let main = Environment::create(MAIN_ENVIRONMENT, agent, resolver.clone(), &config.vm)?;

        tracing::debug!("[runtime] Ready");
        Ok(Ref::create(|self_ref| Runtime {
            self_ref,
            config,
            environments: DashMap::new(),
            main,
            resolver,
            platform,
        }))
    }

    pub fn with_defaults() -> RuntimeResult<Ref<Runtime>> {
        Self::create(RuntimeConfig::default())
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn main_environment(&self) -> &Ref<Environment> {
        &self.main
    }

    pub fn execution_platform(&self) -> &ExecutionPlatform {
        &self.platform
    }

    pub fn resolver(&self) -> &Arc<ModuleResolver> {
        &self.resolver
    }

    /// Registered providers in resolution order.
    pub fn source_providers(&self) -> Vec<Arc<dyn SourceProvider>> {
        self.resolver.providers()
    }

    /// Append a provider. It is consulted after every provider already
    /// registered.
    pub fn add_source_provider(&self, provider: Arc<dyn SourceProvider>) {
        self.resolver.add_provider(provider);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Environments
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an environment on a new dedicated agent.
    pub fn create_environment(&self, name: &str) -> RuntimeResult<Ref<Environment>> {
        self.ensure_available(name)?;
        let agent = Agent::spawn(agent_name(name), self.platform.clone())?;
        self.insert_environment(name, agent)
    }

    /// Create an environment that shares `agent` with other environments.
    pub fn create_environment_on(
        &self,
        name: &str,
        agent: Ref<Agent>,
    ) -> RuntimeResult<Ref<Environment>> {
        self.ensure_available(name)?;
        self.insert_environment(name, agent)
    }

    fn ensure_available(&self, name: &str) -> RuntimeResult<()> {
        if name == MAIN_ENVIRONMENT || self.environments.contains_key(name) {
            return Err(RuntimeError::DuplicateEnvironment(name.to_string()));
        }
        Ok(())
    }

    fn insert_environment(&self, name: &str, agent: Ref<Agent>) -> RuntimeResult<Ref<Environment>> {
        let env = Environment::create(name, agent, self.resolver.clone(), &self.config.vm)?;
        match self.environments.entry(name.to_string()) {
            Entry::Occupied(_) => Err(RuntimeError::DuplicateEnvironment(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(env.clone());
                tracing::debug!("[runtime] Added environment '{}'", name);
                Ok(env)
            }
        }
    }

    /// Look up an environment by name, including the main environment.
    pub fn environment(&self, name: &str) -> Option<Ref<Environment>> {
        if name == MAIN_ENVIRONMENT {
            return Some(self.main.clone());
        }
        self.environments.get(name).map(|env| env.value().clone())
    }

    pub fn environment_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.environments.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names.insert(0, MAIN_ENVIRONMENT.to_string());
        names
    }

    /// Detach an environment from the runtime. It is destroyed once every
    /// outstanding reference, including queued tasks, is gone.
    pub fn remove_environment(&self, name: &str) -> RuntimeResult<Ref<Environment>> {
        if name == MAIN_ENVIRONMENT {
            return Err(RuntimeError::MainEnvironment);
        }
        self.environments
            .remove(name)
            .map(|(_, env)| env)
            .ok_or_else(|| RuntimeError::EnvironmentNotFound(name.to_string()))
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        tracing::debug!("[runtime] Shutting down {} environments", self.environments.len() + 1);
    }
}
