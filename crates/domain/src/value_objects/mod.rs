//! Value objects - Immutable objects defined by their attributes

mod cell;
mod floor_kind;
mod role;

pub use cell::Cell;
pub use floor_kind::FloorKind;
pub use role::Role;
