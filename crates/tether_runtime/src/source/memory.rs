use async_trait::async_trait;
use dashmap::DashMap;

use super::{ResolveRequest, SourceProvider};
use crate::error::ResolveError;

/// Virtual modules addressed by bare name (`require("config")`).
#[derive(Default)]
pub struct MemorySourceProvider {
    modules: DashMap<String, String>,
}

impl MemorySourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    /// Register a module. Sources already loaded by a runtime stay cached.
    pub fn insert(&self, name: impl Into<String>, source: impl Into<String>) {
        self.modules.insert(name.into(), source.into());
    }
}

#[async_trait]
impl SourceProvider for MemorySourceProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn handles(&self, request: &ResolveRequest) -> bool {
        self.modules.contains_key(&request.path)
    }

    fn resolve(&self, request: &ResolveRequest) -> Result<String, ResolveError> {
        Ok(request.path.clone())
    }

    async fn source_for(
        &self,
        resolved: &str,
        request: &ResolveRequest,
    ) -> Result<String, ResolveError> {
        self.modules
            .get(resolved)
            .map(|source| source.value().clone())
            .ok_or_else(|| ResolveError::NotFound {
                path: resolved.to_string(),
                requester: request.requester_path.clone(),
            })
    }
}
