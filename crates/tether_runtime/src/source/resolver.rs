//! Provider chain with resolution and source caches.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tokio::sync::OnceCell as AsyncOnceCell;

use super::{ResolveRequest, SourceProvider};
use crate::error::ResolveError;
use crate::platform::ExecutionPlatform;

/// A resolved module: its canonical path and the provider that owns it.
#[derive(Clone)]
pub struct Resolution {
    pub path: String,
    provider: Arc<dyn SourceProvider>,
}

impl Resolution {
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("path", &self.path)
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// Ordered provider chain.
///
/// Successful resolutions are cached per `(requester_path, path)` and
/// sources per resolved path, both for the lifetime of the resolver.
/// Concurrent requests for the same key share one provider call. Failures
/// are not cached.
#[derive(Default)]
pub struct ModuleResolver {
    providers: RwLock<Vec<Arc<dyn SourceProvider>>>,
    resolutions: DashMap<(String, String), Arc<OnceCell<Resolution>>>,
    sources: DashMap<String, Arc<AsyncOnceCell<Arc<str>>>>,
}

impl ModuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider; earlier providers take precedence.
    pub fn add_provider(&self, provider: Arc<dyn SourceProvider>) {
        tracing::debug!("[resolver] Registered provider '{}'", provider.name());
        self.providers.write().push(provider);
    }

    pub fn providers(&self) -> Vec<Arc<dyn SourceProvider>> {
        self.providers.read().clone()
    }

    pub fn resolve(&self, request: &ResolveRequest) -> Result<Resolution, ResolveError> {
        let key = (request.requester_path.clone(), request.path.clone());
        let slot = self.resolutions.entry(key).or_default().clone();
        slot.get_or_try_init(|| self.resolve_uncached(request)).cloned()
    }

    fn resolve_uncached(&self, request: &ResolveRequest) -> Result<Resolution, ResolveError> {
        let provider = self
            .providers
            .read()
            .iter()
            .find(|p| p.handles(request))
            .cloned()
            .ok_or_else(|| ResolveError::NotFound {
                path: request.path.clone(),
                requester: request.requester_path.clone(),
            })?;

        let path = provider.resolve(request)?;
        tracing::trace!(
            specifier = %request.path,
            requester = %request.requester_path,
            resolved = %path,
            "Resolved via {}",
            provider.name()
        );

        Ok(Resolution { path, provider })
    }

    /// Source for a resolved module, loading it on first use.
    pub async fn load_source(
        &self,
        resolution: &Resolution,
        request: &ResolveRequest,
    ) -> Result<Arc<str>, ResolveError> {
        let slot = self.sources.entry(resolution.path.clone()).or_default().clone();
        slot.get_or_try_init(|| async {
            let source = resolution.provider.source_for(&resolution.path, request).await?;
            Ok::<_, ResolveError>(Arc::from(source))
        })
        .await
        .cloned()
    }

    pub fn cached_source(&self, path: &str) -> Option<Arc<str>> {
        self.sources.get(path).and_then(|slot| slot.get().cloned())
    }

    /// Blocking form of [`Self::load_source`] for callers on an agent thread.
    ///
    /// Returns immediately on a cache hit; otherwise waits for the load on
    /// the execution platform.
    pub fn load_source_blocking(
        self: &Arc<Self>,
        resolution: &Resolution,
        request: &ResolveRequest,
        platform: &ExecutionPlatform,
    ) -> Result<Arc<str>, ResolveError> {
        if let Some(source) = self.cached_source(&resolution.path) {
            return Ok(source);
        }

        tracing::debug!(path = %resolution.path, "Source not prefetched, loading synchronously");
        let this = self.clone();
        let resolution = resolution.clone();
        let request = request.clone();
        let path = resolution.path.clone();
        platform
            .wait(async move { this.load_source(&resolution, &request).await })
            .unwrap_or_else(|| {
                Err(ResolveError::Load {
                    path,
                    message: "execution platform shut down".to_string(),
                })
            })
    }

    /// Resolve and load `request` and, best effort, every module reachable
    /// through static `require("...")` calls in the loaded sources.
    ///
    /// Only a failure of the root request is reported.
    pub async fn prefetch(&self, request: &ResolveRequest) -> Result<Resolution, ResolveError> {
        let root = self.resolve(request)?;
        let source = self.load_source(&root, request).await?;

        let mut seen = HashSet::from([root.path.clone()]);
        let mut pending: Vec<ResolveRequest> = scan_requires(&source)
            .into_iter()
            .map(|specifier| ResolveRequest::new(specifier, root.path.clone()))
            .collect();

        while let Some(next) = pending.pop() {
            let resolution = match self.resolve(&next) {
                Ok(resolution) => resolution,
                Err(e) => {
                    tracing::debug!("Prefetch skipped: {}", e);
                    continue;
                }
            };
            if !seen.insert(resolution.path.clone()) {
                continue;
            }
            match self.load_source(&resolution, &next).await {
                Ok(source) => pending.extend(
                    scan_requires(&source)
                        .into_iter()
                        .map(|specifier| ResolveRequest::new(specifier, resolution.path.clone())),
                ),
                Err(e) => tracing::debug!("Prefetch skipped: {}", e),
            }
        }

        Ok(root)
    }
}

fn continues_identifier(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'.')
}

/// Specifiers of `require("...")` calls with a string literal argument.
pub(crate) fn scan_requires(source: &str) -> Vec<String> {
    const NEEDLE: &str = "require";

    let bytes = source.as_bytes();
    let mut found = Vec::new();
    let mut from = 0;

    while let Some(offset) = source[from..].find(NEEDLE) {
        let start = from + offset;
        from = start + NEEDLE.len();

        let preceded_by_ident = start > 0 && continues_identifier(bytes[start - 1]);
        if preceded_by_ident {
            continue;
        }

        let rest = source[from..].trim_start();
        let Some(rest) = rest.strip_prefix('(') else { continue };
        let rest = rest.trim_start();
        let Some(quote) = rest.chars().next().filter(|c| matches!(c, '"' | '\'' | '`')) else {
            continue;
        };
        let body = &rest[1..];
        let Some(end) = body.find(quote) else { continue };
        let specifier = &body[..end];
        if !specifier.contains('\\') && body[end + 1..].trim_start().starts_with(')') {
            found.push(specifier.to_string());
        }
    }

    found
}
