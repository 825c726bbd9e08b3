//! Batch CSV surface used by the command-line binary.

pub mod csv;
pub mod script;
