//! Tether Runtime
//!
//! Hosts QuickJS virtual machines behind a thread-affine execution model.
//!
//! # Architecture
//!
//! - A [`Runtime`] owns an [`ExecutionPlatform`] (shared pool for background
//!   work and I/O), an ordered chain of [`SourceProvider`]s, and a set of
//!   named [`Environment`]s starting with `main`.
//! - Each environment owns one VM and is bound to one [`Agent`], a
//!   dedicated thread with a prioritized task queue. The VM is only ever
//!   entered on that thread.
//! - Long-lived objects are shared through [`Ref`]; an environment hands a
//!   strong reference to itself to every task it schedules.
//! - Values cross the native/engine boundary through `tether_conv`.

pub mod agent;
pub mod config;
pub mod environment;
pub mod error;
pub mod platform;
pub mod ref_counted;
pub mod runtime;
pub mod source;

pub use agent::{Agent, AgentState, Priority};
pub use config::{MAIN_ENVIRONMENT, ModuleConfig, PlatformConfig, RuntimeConfig, VmConfig};
pub use environment::{Environment, ModuleCache};
pub use error::{
    AgentError, ConfigError, EngineError, EnvironmentError, EnvironmentResult, ResolveError,
    RuntimeError, RuntimeResult,
};
pub use platform::ExecutionPlatform;
pub use ref_counted::{Ref, RefCounted, SelfRef, WeakRef};
pub use runtime::Runtime;
pub use source::{
    FileSystemSourceProvider, MemorySourceProvider, ModuleResolver, Resolution, ResolveRequest,
    SourceProvider,
};
