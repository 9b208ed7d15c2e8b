// src/commands/mod.rs
pub mod init;
mod api;

pub use api::Dashboard;

pub use init::{InitReport, ensure_initialized, ensure_initialized_at, ensure_initialized_once};
