//! Path sandboxing for the location store.
//!
//! Client-supplied paths are `/`-separated and relative to the storage root.
//! They are normalized lexically first, so `..` can never climb above the
//! root, and existing targets are canonicalized to catch symlinks that point
//! outside. Nothing is read before a path passes both checks.

use std::path::{Component, Path, PathBuf};

use super::error::PersistenceError;

#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Open (creating if needed) a sandbox rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        std::fs::create_dir_all(root.as_ref())?;
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalize a relative path into its `/`-joined segments.
    ///
    /// Rejects absolute paths, drive prefixes and any `..` that would leave
    /// the root. The empty path is the root itself.
    pub fn normalize(relative: &str) -> Result<Vec<String>, PersistenceError> {
        let cleaned = relative.trim().replace('\\', "/");
        if cleaned.starts_with('/') || cleaned.contains(':') || cleaned.contains('\0') {
            return Err(PersistenceError::invalid_path(relative));
        }

        let mut segments: Vec<String> = Vec::new();
        for component in Path::new(&cleaned).components() {
            match component {
                Component::Normal(part) => {
                    let part = part
                        .to_str()
                        .ok_or_else(|| PersistenceError::invalid_path(relative))?;
                    segments.push(part.to_string());
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if segments.pop().is_none() {
                        return Err(PersistenceError::invalid_path(relative));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PersistenceError::invalid_path(relative));
                }
            }
        }
        Ok(segments)
    }

    /// Resolve a relative path to an absolute one inside the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, PersistenceError> {
        let segments = Self::normalize(relative)?;
        let candidate = segments
            .iter()
            .fold(self.root.clone(), |path, segment| path.join(segment));

        // The nearest existing ancestor decides where the path really lands.
        if let Some(existing) = candidate.ancestors().find(|p| p.exists()) {
            let real = existing.canonicalize()?;
            if !real.starts_with(&self.root) {
                tracing::warn!(path = %relative, "Path resolves outside the storage root");
                return Err(PersistenceError::invalid_path(relative));
            }
        }
        Ok(candidate)
    }

    /// Resolve a location file path, appending `.json` when missing.
    pub fn resolve_json(&self, relative: &str) -> Result<PathBuf, PersistenceError> {
        let trimmed = relative.trim();
        if Self::normalize(trimmed)?.is_empty() {
            return Err(PersistenceError::invalid_path(relative));
        }
        if trimmed.to_ascii_lowercase().ends_with(".json") {
            self.resolve(trimmed)
        } else {
            self.resolve(&format!("{trimmed}.json"))
        }
    }

    /// Path relative to the root, `/`-separated.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}
