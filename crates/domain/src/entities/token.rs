//! Tokens - movable markers for player characters and NPCs.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::history::FieldChange;
use crate::value_objects::Cell;
use crate::{LevelId, TokenId};

/// Maximum vision/light radius in cells
pub const MAX_VISION_RADIUS: i32 = 20;
/// Maximum length of token notes in characters
pub const MAX_NOTES_LENGTH: usize = 2000;
/// Maximum length of a token name in characters
pub const MAX_TOKEN_NAME_LENGTH: usize = 100;

const HP_RANGE: (i32, i32) = (0, 9999);
const AC_RANGE: (i32, i32) = (0, 99);
const ABILITY_RANGE: (i32, i32) = (1, 30);

/// Whether a token belongs to a player or is DM-controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[default]
    Player,
    Npc,
}

impl TokenKind {
    pub fn is_npc(self) -> bool {
        matches!(self, TokenKind::Npc)
    }
}

/// How far (and how wide) a token sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vision {
    #[serde(default = "default_vision_radius")]
    pub radius: i32,
    #[serde(default = "default_vision_angle")]
    pub angle: i32,
}

fn default_vision_radius() -> i32 {
    6
}

fn default_vision_angle() -> i32 {
    360
}

impl Default for Vision {
    fn default() -> Self {
        Self {
            radius: default_vision_radius(),
            angle: default_vision_angle(),
        }
    }
}

/// Light carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenLight {
    #[serde(default)]
    pub radius: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// The six classic ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityScores {
    pub str: i32,
    pub dex: i32,
    pub con: i32,
    pub int: i32,
    pub wis: i32,
    pub cha: i32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            str: 10,
            dex: 10,
            con: 10,
            int: 10,
            wis: 10,
            cha: 10,
        }
    }
}

impl AbilityScores {
    fn clamp(&mut self) {
        for score in [
            &mut self.str,
            &mut self.dex,
            &mut self.con,
            &mut self.int,
            &mut self.wis,
            &mut self.cha,
        ] {
            *score = (*score).clamp(ABILITY_RANGE.0, ABILITY_RANGE.1);
        }
    }

    fn summary(&self) -> String {
        format!(
            "STR {} DEX {} CON {} INT {} WIS {} CHA {}",
            self.str, self.dex, self.con, self.int, self.wis, self.cha
        )
    }
}

fn default_hp() -> i32 {
    10
}

/// A token on the board.
///
/// Tokens are keyed by id only; several tokens may share a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(default)]
    pub id: TokenId,
    /// Client/user id of the owning player
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub kind: TokenKind,
    pub level_id: LevelId,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub vision: Vision,
    #[serde(default)]
    pub light: TokenLight,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_hp")]
    pub hp: i32,
    #[serde(default = "default_hp")]
    pub max_hp: i32,
    #[serde(default = "default_hp")]
    pub ac: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub stats: AbilityScores,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub dead: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Token {
    pub fn new(
        id: impl Into<TokenId>,
        kind: TokenKind,
        level_id: impl Into<LevelId>,
        x: i32,
        y: i32,
    ) -> Self {
        Self {
            id: id.into(),
            owner: None,
            kind,
            level_id: level_id.into(),
            x,
            y,
            vision: Vision::default(),
            light: TokenLight::default(),
            flags: BTreeMap::new(),
            name: String::new(),
            hp: default_hp(),
            max_hp: default_hp(),
            ac: default_hp(),
            color: None,
            stats: AbilityScores::default(),
            notes: String::new(),
            z_index: 0,
            hidden: false,
            dead: false,
            icon: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_vision_radius(mut self, radius: i32) -> Self {
        self.vision.radius = radius;
        self.normalize();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.normalize();
        self
    }

    pub fn cell(&self) -> Cell {
        Cell::new(self.x, self.y)
    }

    pub fn is_owned_by(&self, identity: &str) -> bool {
        self.owner.as_deref() == Some(identity)
    }

    /// Clamp every numeric field into its legal range and truncate text.
    pub fn normalize(&mut self) {
        self.vision.radius = self.vision.radius.clamp(0, MAX_VISION_RADIUS);
        self.vision.angle = self.vision.angle.clamp(0, 360);
        self.light.radius = self.light.radius.clamp(0, MAX_VISION_RADIUS);
        self.hp = self.hp.clamp(HP_RANGE.0, HP_RANGE.1);
        self.max_hp = self.max_hp.clamp(HP_RANGE.0, HP_RANGE.1);
        self.ac = self.ac.clamp(AC_RANGE.0, AC_RANGE.1);
        self.stats.clamp();
        truncate_chars(&mut self.notes, MAX_NOTES_LENGTH);
        truncate_chars(&mut self.name, MAX_TOKEN_NAME_LENGTH);
    }

    /// Apply a patch and report every field whose value actually changed.
    pub fn apply_patch(&mut self, patch: &TokenPatch) -> Vec<FieldChange> {
        let before = self.clone();

        if let Some(owner) = &patch.owner {
            self.owner = owner.clone();
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(hp) = patch.hp {
            self.hp = hp;
        }
        if let Some(max_hp) = patch.max_hp {
            self.max_hp = max_hp;
        }
        if let Some(ac) = patch.ac {
            self.ac = ac;
        }
        if let Some(vision) = patch.vision {
            self.vision = vision;
        }
        if let Some(light) = &patch.light {
            self.light = light.clone();
        }
        if let Some(flags) = &patch.flags {
            self.flags = flags.clone();
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(stats) = patch.stats {
            self.stats = stats;
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
        if let Some(hidden) = patch.hidden {
            self.hidden = hidden;
        }
        if let Some(dead) = patch.dead {
            self.dead = dead;
        }
        if let Some(icon) = &patch.icon {
            self.icon = icon.clone();
        }
        self.normalize();

        diff_tokens(&before, self)
    }
}

/// Field-level update for a token. Absent fields are left untouched; for
/// optional fields, `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPatch {
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TokenKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_hp: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ac: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision: Option<Vision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<TokenLight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<BTreeMap<String, bool>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<AbilityScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead: Option<bool>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub icon: Option<Option<String>>,
}

impl TokenPatch {
    /// Whether the patch touches fields only a DM may change.
    pub fn touches_privileged_fields(&self) -> bool {
        self.owner.is_some() || self.kind.is_some()
    }
}

/// Distinguish an explicit `null` (clear the field) from an absent key.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn truncate_chars(text: &mut String, max: usize) {
    if let Some((idx, _)) = text.char_indices().nth(max) {
        text.truncate(idx);
    }
}

fn show_opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "none".to_string())
}

fn show_flags(flags: &BTreeMap<String, bool>) -> String {
    let on: Vec<&str> = flags
        .iter()
        .filter(|(_, v)| **v)
        .map(|(k, _)| k.as_str())
        .collect();
    if on.is_empty() {
        "none".to_string()
    } else {
        on.join(", ")
    }
}

/// Human-readable field diff between two versions of a token.
pub fn diff_tokens(before: &Token, after: &Token) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let mut push = |label: &str, from: String, to: String| {
        if from != to {
            changes.push(FieldChange::new(label, from, to));
        }
    };

    push("Name", before.name.clone(), after.name.clone());
    push(
        "Owner",
        show_opt(&before.owner),
        show_opt(&after.owner),
    );
    push(
        "Kind",
        format!("{:?}", before.kind).to_lowercase(),
        format!("{:?}", after.kind).to_lowercase(),
    );
    push("HP", before.hp.to_string(), after.hp.to_string());
    push("Max HP", before.max_hp.to_string(), after.max_hp.to_string());
    push("AC", before.ac.to_string(), after.ac.to_string());
    push(
        "Vision",
        format!("{} ({}°)", before.vision.radius, before.vision.angle),
        format!("{} ({}°)", after.vision.radius, after.vision.angle),
    );
    push(
        "Light",
        before.light.radius.to_string(),
        after.light.radius.to_string(),
    );
    push("Flags", show_flags(&before.flags), show_flags(&after.flags));
    push("Color", show_opt(&before.color), show_opt(&after.color));
    push("Stats", before.stats.summary(), after.stats.summary());
    if before.notes != after.notes {
        push(
            "Notes",
            format!("{} chars", before.notes.chars().count()),
            format!("{} chars", after.notes.chars().count()),
        );
    }
    push("Hidden", before.hidden.to_string(), after.hidden.to_string());
    push("Dead", before.dead.to_string(), after.dead.to_string());
    push("Icon", show_opt(&before.icon), show_opt(&after.icon));
    changes
}
