//! Module Sources
//!
//! A runtime owns an ordered chain of [`SourceProvider`]s. For a
//! [`ResolveRequest`], the first provider that handles it resolves the
//! specifier to a canonical path and later supplies the source text for
//! that path.

mod filesystem;
mod memory;
mod resolver;

pub use filesystem::FileSystemSourceProvider;
pub use memory::MemorySourceProvider;
pub use resolver::{ModuleResolver, Resolution};

use async_trait::async_trait;

use crate::error::ResolveError;

/// A module specifier and the resolved path of the module asking for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolveRequest {
    pub path: String,
    /// Empty for top-level requests
    pub requester_path: String,
}

impl ResolveRequest {
    pub fn new(path: impl Into<String>, requester_path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            requester_path: requester_path.into(),
        }
    }

    /// A request made from outside any module.
    pub fn top_level(path: impl Into<String>) -> Self {
        Self::new(path, String::new())
    }
}

/// Supplies module sources to a runtime.
///
/// `handles` and `resolve` are synchronous and must not perform I/O;
/// `source_for` may.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn handles(&self, request: &ResolveRequest) -> bool;

    /// Map the request to a canonical path.
    fn resolve(&self, request: &ResolveRequest) -> Result<String, ResolveError>;

    /// Load the source text for a path previously returned by `resolve`.
    async fn source_for(
        &self,
        resolved: &str,
        request: &ResolveRequest,
    ) -> Result<String, ResolveError>;
}
