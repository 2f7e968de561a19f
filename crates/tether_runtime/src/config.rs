//! Runtime Configuration
//!
//! Loaded from an optional TOML file, then overridden by `TETHER_`-prefixed
//! environment variables (`TETHER_VM__MEMORY_LIMIT=1048576`).

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the environment every runtime starts with.
pub const MAIN_ENVIRONMENT: &str = "main";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub vm: VmConfig,
    pub platform: PlatformConfig,
    pub modules: ModuleConfig,
}

/// Engine limits applied to every environment's VM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Heap limit in bytes
    pub memory_limit: Option<usize>,
    /// Stack limit in bytes
    pub max_stack_size: Option<usize>,
    /// Allocation threshold that triggers a GC cycle, in bytes
    pub gc_threshold: Option<usize>,
    /// Evaluate scripts in strict mode
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub worker_threads: usize,
    pub blocking_threads: usize,
    pub thread_name: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            blocking_threads: 16,
            thread_name: "tether-platform".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Register a file system source provider
    pub filesystem: bool,
    /// Directory that top-level relative specifiers resolve against.
    /// Defaults to the current directory.
    pub base_dir: Option<PathBuf>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            filesystem: true,
            base_dir: None,
        }
    }
}

impl RuntimeConfig {
    /// Defaults merged with environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::figment(None).extract()?)
    }

    /// Defaults, then `path`, then environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment(Some(path.as_ref())).extract()?)
    }

    /// Parse a TOML document on top of the defaults, ignoring the
    /// environment.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::string(source))
            .extract()?)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("TETHER_").split("__"))
    }
}
