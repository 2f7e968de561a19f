//! Error types for the runtime.

use tether_conv::ConversionError;

/// Errors from submitting work to an [`crate::Agent`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error("Agent '{0}' is not running")]
    NotRunning(String),

    #[error("Task on agent '{0}' was dropped before completing")]
    TaskDropped(String),

    #[error("Failed to spawn agent thread: {0}")]
    SpawnFailed(String),
}

/// Errors reported by the JavaScript engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The script threw
    #[error("{name}: {message}")]
    Script {
        name: String,
        message: String,
        stack: Option<String>,
    },

    /// The engine failed for a reason other than a script exception
    #[error("Engine error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn is_script(&self) -> bool {
        matches!(self, EngineError::Script { .. })
    }
}

/// Errors from module resolution and source loading.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("Module not found: '{path}' (requested from '{requester}')")]
    NotFound { path: String, requester: String },

    #[error("Failed to load '{path}': {message}")]
    Load { path: String, message: String },
}

/// Errors from operations on an [`crate::Environment`].
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Environment '{0}' was accessed off its agent thread")]
    WrongThread(String),

    #[error("Environment '{0}' is already executing on this thread")]
    Reentrant(String),
}

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] figment::Error),
}

/// Errors from [`crate::Runtime`] management.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to start execution platform: {0}")]
    Platform(std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment already exists: {0}")]
    DuplicateEnvironment(String),

    #[error("Environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("The main environment cannot be removed")]
    MainEnvironment,
}

pub type EnvironmentResult<T> = Result<T, EnvironmentError>;
pub type RuntimeResult<T> = Result<T, RuntimeError>;
