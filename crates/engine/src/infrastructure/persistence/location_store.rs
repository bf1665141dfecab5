//! Sandboxed JSON storage for locations.
//!
//! Every operation resolves its paths through the [`Sandbox`] before
//! touching the filesystem. Writes go to a temporary sibling first and are
//! renamed into place.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mapkeep_domain::GameSnapshot;
use mapkeep_shared::LocationsTreeNode;

use super::error::PersistenceError;
use super::json_reader::read_json;
use super::sandbox::Sandbox;
use super::tree::build_tree;

/// Pointer file recording the most recently saved/loaded location.
pub const LAST_USED_FILE: &str = "last-used.json";

#[derive(Debug, Serialize, Deserialize)]
struct LastUsed {
    path: String,
}

/// File-backed location storage rooted at one sandbox directory.
#[derive(Debug, Clone)]
pub struct LocationStore {
    sandbox: Sandbox,
}

impl LocationStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        Ok(Self {
            sandbox: Sandbox::new(root)?,
        })
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Normalized relative form of a location file path.
    pub fn location_path(&self, relative: &str) -> Result<String, PersistenceError> {
        let path = self.sandbox.resolve_json(relative)?;
        Ok(self.sandbox.relative(&path))
    }

    /// Load a location file. Returns its normalized relative path and the
    /// (full) snapshot it contains.
    pub async fn load(&self, relative: &str) -> Result<(String, GameSnapshot), PersistenceError> {
        let path = self.sandbox.resolve_json(relative)?;
        if !path.is_file() {
            return Err(PersistenceError::not_found(relative));
        }
        let document = read_json(&path).await?;
        if !document.is_object() {
            return Err(PersistenceError::InvalidLocation(format!(
                "{relative}: not a JSON object"
            )));
        }
        let snapshot = GameSnapshot::from_value(document).into_full();
        Ok((self.sandbox.relative(&path), snapshot))
    }

    /// Save a snapshot and record it as last used. Returns the relative path.
    pub async fn save(
        &self,
        relative: &str,
        snapshot: &GameSnapshot,
    ) -> Result<String, PersistenceError> {
        let saved = self.write_snapshot(relative, snapshot).await?;
        self.write_last_used(&saved).await?;
        Ok(saved)
    }

    /// Write a snapshot without touching the last-used pointer.
    pub async fn write_snapshot(
        &self,
        relative: &str,
        snapshot: &GameSnapshot,
    ) -> Result<String, PersistenceError> {
        let path = self.sandbox.resolve_json(relative)?;
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&path, &bytes).await?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Location written");
        Ok(self.sandbox.relative(&path))
    }

    pub async fn write_last_used(&self, relative: &str) -> Result<(), PersistenceError> {
        let path = self.sandbox.root().join(LAST_USED_FILE);
        let bytes = serde_json::to_vec_pretty(&LastUsed {
            path: relative.to_string(),
        })?;
        write_atomic(&path, &bytes).await
    }

    /// The last-used location, if the pointer exists and still resolves to
    /// a file inside the root.
    pub async fn last_used(&self) -> Option<String> {
        let pointer = self.sandbox.root().join(LAST_USED_FILE);
        if !pointer.is_file() {
            return None;
        }
        let value = match read_json(&pointer).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable last-used pointer");
                return None;
            }
        };
        let last: LastUsed = serde_json::from_value(value).ok()?;
        let path = self.sandbox.resolve_json(&last.path).ok()?;
        path.is_file().then(|| self.sandbox.relative(&path))
    }

    async fn clear_last_used_if(&self, relative: &str) -> Result<(), PersistenceError> {
        if self.stale_last_used().await.as_deref() == Some(relative) {
            tokio::fs::remove_file(self.sandbox.root().join(LAST_USED_FILE)).await?;
        }
        Ok(())
    }

    /// Folder tree of all valid locations.
    pub async fn build_tree(&self) -> Result<Vec<LocationsTreeNode>, PersistenceError> {
        let sandbox = self.sandbox.clone();
        tokio::task::spawn_blocking(move || build_tree(&sandbox))
            .await
            .map_err(|e| PersistenceError::Task(e.to_string()))
    }

    pub async fn create_folder(&self, relative: &str) -> Result<String, PersistenceError> {
        let path = self.non_root(relative)?;
        tokio::fs::create_dir_all(&path).await?;
        Ok(self.sandbox.relative(&path))
    }

    pub async fn delete_location(&self, relative: &str) -> Result<String, PersistenceError> {
        let path = self.sandbox.resolve_json(relative)?;
        if !path.is_file() {
            return Err(PersistenceError::not_found(relative));
        }
        let deleted = self.sandbox.relative(&path);
        tokio::fs::remove_file(&path).await?;
        self.clear_last_used_if(&deleted).await?;
        Ok(deleted)
    }

    /// Move a location file into `to_folder` (empty for the root). Returns
    /// the new relative path.
    pub async fn move_location(
        &self,
        from: &str,
        to_folder: &str,
    ) -> Result<String, PersistenceError> {
        let source = self.sandbox.resolve_json(from)?;
        if !source.is_file() {
            return Err(PersistenceError::not_found(from));
        }
        let folder = self.sandbox.resolve(to_folder)?;
        if folder.exists() && !folder.is_dir() {
            return Err(PersistenceError::invalid_path(to_folder));
        }
        let file_name = source
            .file_name()
            .ok_or_else(|| PersistenceError::invalid_path(from))?;
        let target = folder.join(file_name);
        if target == source {
            return Ok(self.sandbox.relative(&target));
        }
        if target.exists() {
            return Err(PersistenceError::AlreadyExists(self.sandbox.relative(&target)));
        }
        tokio::fs::create_dir_all(&folder).await?;
        tokio::fs::rename(&source, &target).await?;

        let (old, new) = (self.sandbox.relative(&source), self.sandbox.relative(&target));
        self.repoint_last_used(&old, &new).await?;
        Ok(new)
    }

    /// Rename a folder in place. Returns the new relative path.
    pub async fn rename_folder(
        &self,
        relative: &str,
        new_name: &str,
    ) -> Result<String, PersistenceError> {
        let new_name = validate_name(new_name)?;
        let source = self.non_root(relative)?;
        if !source.is_dir() {
            return Err(PersistenceError::not_found(relative));
        }
        let target = sibling(&source, &new_name, relative)?;
        if target.exists() {
            return Err(PersistenceError::AlreadyExists(self.sandbox.relative(&target)));
        }
        tokio::fs::rename(&source, &target).await?;

        let (old, new) = (self.sandbox.relative(&source), self.sandbox.relative(&target));
        if let Some(last) = self.stale_last_used().await {
            if let Some(rest) = last.strip_prefix(&format!("{old}/")) {
                self.write_last_used(&format!("{new}/{rest}")).await?;
            }
        }
        Ok(new)
    }

    /// Rename a location file and the `location.name` inside it.
    ///
    /// Returns the new relative path and the new display name.
    pub async fn rename_location(
        &self,
        relative: &str,
        new_name: &str,
    ) -> Result<(String, String), PersistenceError> {
        let display_name = validate_name(new_name)?;
        let display_name = display_name
            .strip_suffix(".json")
            .map(str::to_string)
            .unwrap_or(display_name);
        let source = self.sandbox.resolve_json(relative)?;
        if !source.is_file() {
            return Err(PersistenceError::not_found(relative));
        }
        let target = sibling(&source, &format!("{display_name}.json"), relative)?;
        if target != source && target.exists() {
            return Err(PersistenceError::AlreadyExists(self.sandbox.relative(&target)));
        }

        let mut document = read_json(&source).await?;
        match document.get_mut("location") {
            Some(Value::Object(location)) => {
                location.insert("name".to_string(), Value::String(display_name.clone()));
            }
            _ => {
                return Err(PersistenceError::InvalidLocation(format!(
                    "{relative}: missing location object"
                )))
            }
        }
        write_atomic(&target, &serde_json::to_vec_pretty(&document)?).await?;
        if target != source {
            tokio::fs::remove_file(&source).await?;
        }

        let (old, new) = (self.sandbox.relative(&source), self.sandbox.relative(&target));
        self.repoint_last_used(&old, &new).await?;
        Ok((new, display_name))
    }

    async fn repoint_last_used(&self, old: &str, new: &str) -> Result<(), PersistenceError> {
        if self.stale_last_used().await.as_deref() == Some(old) {
            self.write_last_used(new).await?;
        }
        Ok(())
    }

    /// Raw pointer value, even if the file it names has moved away.
    async fn stale_last_used(&self) -> Option<String> {
        let value = read_json(&self.sandbox.root().join(LAST_USED_FILE)).await.ok()?;
        serde_json::from_value::<LastUsed>(value)
            .ok()
            .map(|last| last.path)
    }

    fn non_root(&self, relative: &str) -> Result<PathBuf, PersistenceError> {
        if Sandbox::normalize(relative)?.is_empty() {
            return Err(PersistenceError::invalid_path(relative));
        }
        self.sandbox.resolve(relative)
    }
}

/// A new file or folder name: a single path segment, not hidden.
fn validate_name(name: &str) -> Result<String, PersistenceError> {
    let name = name.trim();
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', ':', '\0'])
        && !name.contains("..");
    if valid {
        Ok(name.to_string())
    } else {
        Err(PersistenceError::invalid_path(name))
    }
}

fn sibling(path: &Path, name: &str, original: &str) -> Result<PathBuf, PersistenceError> {
    path.parent()
        .map(|parent| parent.join(name))
        .ok_or_else(|| PersistenceError::invalid_path(original))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
