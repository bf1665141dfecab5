//! File-backed location storage.

mod autosave;
mod error;
mod json_reader;
mod location_store;
mod sandbox;
mod tree;

pub use autosave::{spawn_autosaver, AutosaveRequest, Autosaver};
pub use error::PersistenceError;
pub use json_reader::{first_value, parse_tolerant, read_json};
pub use location_store::{LocationStore, LAST_USED_FILE};
pub use sandbox::Sandbox;
