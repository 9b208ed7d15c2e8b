// src/services/mod.rs

pub mod audit;
pub mod collaborators; // chain, speech, image, mood, pinning seams
pub mod evolution;
pub mod ledger;        // XP -> level/progress
pub mod notify;
pub mod orchestrator;  // multi-step user actions
pub mod timeline;

// Public API
pub use audit::Logbook;
pub use evolution::EvolutionEngine;
pub use ledger::{LevelChange, ProfileLedger, calculate_profile};
pub use notify::{CollectingNotifier, NotificationKind, Notifier, Signal, TracingNotifier};
pub use orchestrator::{ActionError, ActionReport, Collaborators, GenesisDraft, Orchestrator, Step, StepOutcome};
pub use timeline::EventLog;
