//! `app-ingest` command implementations

pub mod commands;
pub mod error;
