//! Infrastructure: configuration, ports and their adapters, persistence,
//! and the resource governor timer.

pub mod auth;
pub mod clock;
pub mod config;
pub mod governor;
pub mod persistence;
pub mod ports;
