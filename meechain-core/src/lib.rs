//! MeeChain contributor progression and MeeBot evolution engine.
//!
//! The [`commands::Dashboard`] facade is the usual entry point: it wires the
//! persistence adapter, the profile ledger, the evolution engine and the
//! action orchestrator from a [`config::CoreConfig`].

pub mod commands;
pub mod config;
pub mod models;
pub mod services;
pub mod store;

pub use commands::Dashboard;
pub use config::CoreConfig;
