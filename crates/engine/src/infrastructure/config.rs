//! Engine configuration from environment variables.
//!
//! Every value has a default so the server starts with no environment at
//! all. Unparseable values fall back to the default with a warning.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Maximum accepted size of one inbound frame (1 MiB).
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Hard admission limits and resource ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_clients: usize,
    pub max_undo: usize,
    pub max_history: usize,
    /// Revealed cells allowed per level
    pub max_fog_cells: usize,
    pub max_message_bytes: usize,
    /// Estimated footprint above which the governor sheds optional state
    pub memory_limit_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_clients: 64,
            max_undo: 50,
            max_history: 200,
            max_fog_cells: 50_000,
            max_message_bytes: MAX_MESSAGE_BYTES,
            memory_limit_bytes: 512 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,
    /// Number of consecutive ports tried, starting at `port`
    pub port_range: u16,
    /// Sandbox root for saved locations
    pub data_dir: PathBuf,
    pub limits: Limits,
    pub autosave_debounce: Duration,
    pub governor_interval: Duration,
    /// When true any connection may switch to the DM role
    pub open_roles: bool,
    pub cors_allowed_origins: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            port_range: 10,
            data_dir: PathBuf::from("./data/locations"),
            limits: Limits::default(),
            autosave_debounce: Duration::from_millis(2000),
            governor_interval: Duration::from_secs(30),
            open_roles: true,
            cors_allowed_origins: None,
        }
    }
}

impl EngineConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port_value = get("SERVER_PORT").or_else(|| get("PORT"));
        let limits = Limits {
            max_clients: parse_or(
                get("MAPKEEP_MAX_CLIENTS"),
                "MAPKEEP_MAX_CLIENTS",
                defaults.limits.max_clients,
            ),
            max_undo: parse_or(
                get("MAPKEEP_MAX_UNDO"),
                "MAPKEEP_MAX_UNDO",
                defaults.limits.max_undo,
            ),
            max_history: parse_or(
                get("MAPKEEP_MAX_HISTORY"),
                "MAPKEEP_MAX_HISTORY",
                defaults.limits.max_history,
            ),
            max_fog_cells: parse_or(
                get("MAPKEEP_MAX_FOG_CELLS"),
                "MAPKEEP_MAX_FOG_CELLS",
                defaults.limits.max_fog_cells,
            ),
            max_message_bytes: defaults.limits.max_message_bytes,
            memory_limit_bytes: parse_or::<usize>(
                get("MAPKEEP_MEMORY_LIMIT_MB"),
                "MAPKEEP_MEMORY_LIMIT_MB",
                defaults.limits.memory_limit_bytes / (1024 * 1024),
            )
            .saturating_mul(1024 * 1024),
        };

        Self {
            host: get("SERVER_HOST").unwrap_or(defaults.host),
            port: parse_or(port_value, "SERVER_PORT", defaults.port),
            port_range: parse_or(
                get("MAPKEEP_PORT_RANGE"),
                "MAPKEEP_PORT_RANGE",
                defaults.port_range,
            )
            .max(1),
            data_dir: get("MAPKEEP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            limits,
            autosave_debounce: Duration::from_millis(parse_or(
                get("MAPKEEP_AUTOSAVE_MS"),
                "MAPKEEP_AUTOSAVE_MS",
                2000,
            )),
            governor_interval: Duration::from_secs(
                parse_or(get("MAPKEEP_GOVERNOR_SECS"), "MAPKEEP_GOVERNOR_SECS", 30u64).max(1),
            ),
            open_roles: get("MAPKEEP_OPEN_ROLES")
                .map(|value| parse_bool(&value, defaults.open_roles))
                .unwrap_or(defaults.open_roles),
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS"),
        }
    }

    /// Ports to try when binding, in order.
    pub fn candidate_ports(&self) -> impl Iterator<Item = u16> {
        let start = self.port;
        (0..self.port_range).filter_map(move |offset| start.checked_add(offset))
    }
}

fn parse_or<T: FromStr + Copy>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Invalid configuration value, using default");
            default
        }),
    }
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            tracing::warn!(value, "Invalid boolean configuration value, using default");
            default
        }
    }
}
