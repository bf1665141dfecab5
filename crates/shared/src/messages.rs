//! WebSocket message types
//!
//! Both directions are JSON objects discriminated by a camelCase `type` tag.
//! Unknown tags decode to `Unknown` so older peers keep working when new
//! messages are introduced.

use serde::{Deserialize, Serialize};

use mapkeep_domain::{
    Asset, AssetId, Cell, FogMode, GameSnapshot, HistoryEvent, HistoryEventId, LevelId, MapEvent,
    Role, TokenId, TokenPatch,
};

use crate::responses::{ErrorCode, LocationsTreeNode, UndoRedoState, UserInfo};

// =============================================================================
// Client Messages (Viewer → Server)
// =============================================================================

/// Messages from a viewer to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Introduce the viewer; answered with `welcome`
    Join {
        /// Stable viewer identity used for token ownership
        #[serde(default)]
        client_id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        /// Resume an authenticated session while joining
        #[serde(default)]
        session_token: Option<String>,
    },
    /// Heartbeat
    Ping,

    // === Authentication ===
    Login {
        username: String,
        password: String,
    },
    /// Bootstrap the first (master) account
    CreateFirstUser {
        username: String,
        password: String,
        #[serde(default)]
        display_name: Option<String>,
    },
    ResumeSession {
        token: String,
    },
    Logout,
    SwitchRole {
        role: Role,
    },

    // === Tokens ===
    MoveToken {
        token_id: TokenId,
        x: i32,
        y: i32,
        /// Move across levels; defaults to the token's current level
        #[serde(default)]
        level_id: Option<LevelId>,
    },
    SpawnToken {
        token: TokenDraft,
    },
    /// Remove a token at a cell (the topmost one unless `token_id` is given)
    RemoveTokenAt {
        level_id: LevelId,
        x: i32,
        y: i32,
        #[serde(default)]
        token_id: Option<TokenId>,
    },
    UpdateToken {
        token_id: TokenId,
        patch: TokenPatch,
    },
    ToggleTokenHidden {
        token_id: TokenId,
    },
    ReorderToken {
        token_id: TokenId,
        z_index: i32,
    },

    // === Fog ===
    /// Reveal explicit cells and/or a disc around `center`
    RevealFog {
        level_id: LevelId,
        #[serde(default)]
        cells: Vec<Cell>,
        #[serde(default)]
        center: Option<Cell>,
        #[serde(default)]
        radius: Option<i32>,
    },
    ObscureFog {
        level_id: LevelId,
        #[serde(default)]
        cells: Vec<Cell>,
        #[serde(default)]
        center: Option<Cell>,
        #[serde(default)]
        radius: Option<i32>,
    },
    SetFogMode {
        mode: FogMode,
    },

    // === Assets & floors ===
    PlaceAsset {
        asset: Asset,
    },
    MoveAsset {
        asset_id: AssetId,
        x: i32,
        y: i32,
        #[serde(default)]
        level_id: Option<LevelId>,
    },
    RemoveAssetAt {
        level_id: LevelId,
        x: i32,
        y: i32,
    },
    ToggleDoor {
        asset_id: AssetId,
    },
    ToggleAssetHidden {
        asset_id: AssetId,
    },
    ReorderAsset {
        asset_id: AssetId,
        z_index: i32,
    },
    /// Paint cells with a floor kind; `null` erases them
    PaintFloor {
        level_id: LevelId,
        cells: Vec<Cell>,
        #[serde(default)]
        kind: Option<String>,
    },

    // === Persistence ===
    /// Save the current state to the active location file
    RequestSave,
    LoadSnapshot {
        snapshot: GameSnapshot,
    },
    LoadLocation {
        path: String,
    },
    SaveLocation {
        path: String,
    },
    ListLocations,
    CreateFolder {
        path: String,
    },
    DeleteLocation {
        path: String,
    },
    MoveLocation {
        from: String,
        /// Destination folder; empty for the root
        #[serde(default)]
        to_folder: String,
    },
    RenameFolder {
        path: String,
        new_name: String,
    },
    RenameLocation {
        path: String,
        new_name: String,
    },

    // === Undo/redo ===
    Undo,
    Redo,

    /// Unknown message type for forward compatibility
    ///
    /// When deserializing an unknown variant, this variant is used instead of
    /// failing. The server ignores it.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "join",
            ClientMessage::Ping => "ping",
            ClientMessage::Login { .. } => "login",
            ClientMessage::CreateFirstUser { .. } => "createFirstUser",
            ClientMessage::ResumeSession { .. } => "resumeSession",
            ClientMessage::Logout => "logout",
            ClientMessage::SwitchRole { .. } => "switchRole",
            ClientMessage::MoveToken { .. } => "moveToken",
            ClientMessage::SpawnToken { .. } => "spawnToken",
            ClientMessage::RemoveTokenAt { .. } => "removeTokenAt",
            ClientMessage::UpdateToken { .. } => "updateToken",
            ClientMessage::ToggleTokenHidden { .. } => "toggleTokenHidden",
            ClientMessage::ReorderToken { .. } => "reorderToken",
            ClientMessage::RevealFog { .. } => "revealFog",
            ClientMessage::ObscureFog { .. } => "obscureFog",
            ClientMessage::SetFogMode { .. } => "setFogMode",
            ClientMessage::PlaceAsset { .. } => "placeAsset",
            ClientMessage::MoveAsset { .. } => "moveAsset",
            ClientMessage::RemoveAssetAt { .. } => "removeAssetAt",
            ClientMessage::ToggleDoor { .. } => "toggleDoor",
            ClientMessage::ToggleAssetHidden { .. } => "toggleAssetHidden",
            ClientMessage::ReorderAsset { .. } => "reorderAsset",
            ClientMessage::PaintFloor { .. } => "paintFloor",
            ClientMessage::RequestSave => "requestSave",
            ClientMessage::LoadSnapshot { .. } => "loadSnapshot",
            ClientMessage::LoadLocation { .. } => "loadLocation",
            ClientMessage::SaveLocation { .. } => "saveLocation",
            ClientMessage::ListLocations => "listLocations",
            ClientMessage::CreateFolder { .. } => "createFolder",
            ClientMessage::DeleteLocation { .. } => "deleteLocation",
            ClientMessage::MoveLocation { .. } => "moveLocation",
            ClientMessage::RenameFolder { .. } => "renameFolder",
            ClientMessage::RenameLocation { .. } => "renameLocation",
            ClientMessage::Undo => "undo",
            ClientMessage::Redo => "redo",
            ClientMessage::Unknown => "unknown",
        }
    }
}

/// Token fields supplied with `spawnToken`.
///
/// Everything is optional: the id is generated, the level defaults to the
/// location's first level and the position to that level's spawn point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TokenId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_id: Option<LevelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(flatten)]
    pub fields: TokenPatch,
}

// =============================================================================
// Server Messages (Server → Viewer)
// =============================================================================

/// Messages from the server to a viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Reply to `join`: full state plus this connection's role
    Welcome {
        connection_id: String,
        client_id: String,
        role: Role,
        snapshot: GameSnapshot,
        undo_redo: UndoRedoState,
        /// Audit log, DMs only
        #[serde(default, skip_serializing_if = "Option::is_none")]
        history: Option<Vec<HistoryEvent>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<UserInfo>,
    },
    Pong,
    /// Batch of board events produced by one command
    StatePatch {
        events: Vec<MapEvent>,
    },
    /// Replace the whole board
    Reset {
        snapshot: GameSnapshot,
        reason: String,
    },
    LocationsTree {
        tree: Vec<LocationsTreeNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_used: Option<String>,
    },
    SavedOk {
        path: String,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
    UndoRedoState {
        #[serde(flatten)]
        state: UndoRedoState,
    },
    UndoPerformed {
        action_type: String,
        description: String,
    },
    RedoPerformed {
        action_type: String,
        description: String,
    },
    HistorySnapshot {
        events: Vec<HistoryEvent>,
    },
    HistoryEvent {
        event: HistoryEvent,
    },
    HistoryRemoved {
        ids: Vec<HistoryEventId>,
    },
    HistoryAdded {
        events: Vec<HistoryEvent>,
    },
    RoleChanged {
        role: Role,
    },
    LocationRenamed {
        old_path: String,
        new_path: String,
        name: String,
    },
    AuthOk {
        user: UserInfo,
        token: String,
    },
    AuthFailed {
        message: String,
    },
    LoggedOut,

    /// Unknown message type for forward compatibility
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }

    /// Whether this message may only be seen by DM connections.
    pub fn is_dm_only(&self) -> bool {
        matches!(
            self,
            ServerMessage::HistorySnapshot { .. }
                | ServerMessage::HistoryEvent { .. }
                | ServerMessage::HistoryRemoved { .. }
                | ServerMessage::HistoryAdded { .. }
        )
    }
}
