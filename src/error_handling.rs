//! Error enums, one per subsystem.

pub mod types;
