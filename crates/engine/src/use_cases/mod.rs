//! Use cases - user story orchestration over the stores.

pub mod session;
