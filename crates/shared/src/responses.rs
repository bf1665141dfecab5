//! Response DTOs carried inside server messages.

use serde::{Deserialize, Serialize};

use mapkeep_domain::Role;

/// Error classification codes sent in `error` replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Frame was not valid JSON or did not match any message shape
    ParseError,
    /// Frame exceeded the maximum message size
    MessageTooLarge,
    /// Command failed validation (no floor, bad kind, ...)
    ValidationError,
    /// Target entity does not exist
    NotFound,
    /// Fog batch would exceed the per-level cell cap
    FogCapacity,
    /// Path escapes the storage sandbox
    InvalidPath,
    /// Disk I/O or document error
    PersistenceError,
    /// Undo or redo stack is empty
    NothingToUndo,
    NothingToRedo,
    /// Authentication collaborator rejected the request
    AuthError,
    /// Connection limit reached
    ServerFull,
    InternalError,

    /// Unknown variant for forward compatibility
    #[serde(other)]
    Unknown,
}

/// One entry of the saved-locations tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LocationsTreeNode {
    Folder {
        name: String,
        /// Path relative to the storage root, `/`-separated
        path: String,
        children: Vec<LocationsTreeNode>,
    },
    Location {
        name: String,
        path: String,
        location_id: String,
        location_name: String,
    },
}

impl LocationsTreeNode {
    pub fn path(&self) -> &str {
        match self {
            LocationsTreeNode::Folder { path, .. } | LocationsTreeNode::Location { path, .. } => {
                path
            }
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, LocationsTreeNode::Folder { .. })
    }
}

/// Undo/redo stack sizes, broadcast after every stack change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoRedoState {
    pub can_undo: bool,
    pub can_redo: bool,
    pub undo_count: usize,
    pub redo_count: usize,
}

impl UndoRedoState {
    pub fn new(undo_count: usize, redo_count: usize) -> Self {
        Self {
            can_undo: undo_count > 0,
            can_redo: redo_count > 0,
            undo_count,
            redo_count,
        }
    }
}

/// Authenticated user as seen by viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    /// `master`, `dm` or `player`
    pub role: String,
    /// Connection role granted by this user's account
    pub connection_role: Role,
}
