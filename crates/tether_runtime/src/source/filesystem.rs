//! File system provider.
//!
//! Handles relative (`./`, `../`) and absolute specifiers. Relative
//! specifiers resolve against the requesting module's directory, or the
//! provider's base directory for top-level requests.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{ResolveRequest, SourceProvider};
use crate::error::ResolveError;

pub struct FileSystemSourceProvider {
    base_dir: PathBuf,
}

impl FileSystemSourceProvider {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn directory_of(&self, requester: &str) -> PathBuf {
        let requester = Path::new(requester);
        if requester.is_absolute() {
            if let Some(parent) = requester.parent() {
                return parent.to_path_buf();
            }
        }
        self.base_dir.clone()
    }
}

/// Resolve `.` and `..` components without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[async_trait]
impl SourceProvider for FileSystemSourceProvider {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn handles(&self, request: &ResolveRequest) -> bool {
        let path = request.path.as_str();
        path.starts_with("./")
            || path.starts_with("../")
            || path == "."
            || path == ".."
            || Path::new(path).is_absolute()
    }

    fn resolve(&self, request: &ResolveRequest) -> Result<String, ResolveError> {
        let specifier = Path::new(&request.path);
        let joined = if specifier.is_absolute() {
            specifier.to_path_buf()
        } else {
            self.directory_of(&request.requester_path).join(specifier)
        };

        let mut resolved = normalize(&joined);
        if resolved.extension().is_none() {
            resolved.set_extension("js");
        }
        Ok(resolved.to_string_lossy().into_owned())
    }

    async fn source_for(
        &self,
        resolved: &str,
        request: &ResolveRequest,
    ) -> Result<String, ResolveError> {
        tracing::debug!(path = %resolved, "[filesystem] Reading module");
        tokio::fs::read_to_string(resolved).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ResolveError::NotFound {
                path: resolved.to_string(),
                requester: request.requester_path.clone(),
            },
            _ => ResolveError::Load {
                path: resolved.to_string(),
                message: e.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_handles_relative_and_absolute_only() {
        let provider = FileSystemSourceProvider::new("/base");
        assert!(provider.handles(&ResolveRequest::top_level("./a.js")));
        assert!(provider.handles(&ResolveRequest::top_level("../a")));
        assert!(provider.handles(&ResolveRequest::top_level("/abs/a.js")));
        assert!(!provider.handles(&ResolveRequest::top_level("lodash")));
    }

    #[test]
    fn test_resolve_against_requester() {
        let provider = FileSystemSourceProvider::new("/base");

        let top = provider.resolve(&ResolveRequest::top_level("./lib/main")).unwrap();
        assert_eq!(top, "/base/lib/main.js");

        let nested = provider
            .resolve(&ResolveRequest::new("../util.js", "/base/lib/main.js"))
            .unwrap();
        assert_eq!(nested, "/base/util.js");

        let absolute = provider
            .resolve(&ResolveRequest::new("/other/./x.mjs", "/base/lib/main.js"))
            .unwrap();
        assert_eq!(absolute, "/other/x.mjs");
    }

    #[tokio::test]
    async fn test_source_for_reads_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("mod.js"), "module.exports = 1;").unwrap();

        let provider = FileSystemSourceProvider::new(dir.path());
        let request = ResolveRequest::top_level("./mod");
        let resolved = provider.resolve(&request).unwrap();

        let source = provider.source_for(&resolved, &request).await.unwrap();
        assert_eq!(source, "module.exports = 1;");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let provider = FileSystemSourceProvider::new(dir.path());
        let request = ResolveRequest::top_level("./missing.js");
        let resolved = provider.resolve(&request).unwrap();

        let err = provider.source_for(&resolved, &request).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }
}
