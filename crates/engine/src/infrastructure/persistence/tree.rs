//! Saved-locations tree listing.

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;

use mapkeep_domain::Location;
use mapkeep_shared::LocationsTreeNode;

use super::json_reader::read_json_sync;
use super::location_store::LAST_USED_FILE;
use super::sandbox::Sandbox;

/// Recursively list folders and valid location files under the root.
///
/// Folders come first, then files, each sorted by name. A file is listed
/// only if it parses and its `location` has a string id, a string name and
/// at least one level. When two files share a location id the one met later
/// in this order is skipped.
pub fn build_tree(sandbox: &Sandbox) -> Vec<LocationsTreeNode> {
    let mut seen = HashSet::new();
    walk(sandbox, sandbox.root(), &mut seen)
}

fn walk(sandbox: &Sandbox, dir: &Path, seen: &mut HashSet<String>) -> Vec<LocationsTreeNode> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "Failed to read folder");
            return Vec::new();
        }
    };

    let mut folders = Vec::new();
    let mut files = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            folders.push((name, entry.path()));
        } else if file_type.is_file()
            && name.to_ascii_lowercase().ends_with(".json")
            && !(dir == sandbox.root() && name == LAST_USED_FILE)
        {
            files.push((name, entry.path()));
        }
    }
    folders.sort();
    files.sort();

    let mut nodes = Vec::with_capacity(folders.len() + files.len());
    for (name, path) in folders {
        let children = walk(sandbox, &path, seen);
        nodes.push(LocationsTreeNode::Folder {
            name,
            path: sandbox.relative(&path),
            children,
        });
    }

    for (name, path) in files {
        let document = match read_json_sync(&path) {
            Ok(document) => document,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable location file");
                continue;
            }
        };
        let Some(location) = document.get("location").filter(|l| Location::has_valid_shape(l))
        else {
            tracing::debug!(path = %path.display(), "Skipping file without a valid location");
            continue;
        };
        let location_id = location
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let location_name = location
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if !seen.insert(location_id.clone()) {
            tracing::warn!(
                path = %path.display(),
                location_id = %location_id,
                "Duplicate location id, skipping file"
            );
            continue;
        }

        let stem = name
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or(name);
        nodes.push(LocationsTreeNode::Location {
            name: stem,
            path: sandbox.relative(&path),
            location_id,
            location_name,
        });
    }
    nodes
}
