// src/services/notify.rs
//! User-facing feedback channel.
//!
//! Two surfaces exist: the toast-style notification and the companion's
//! speech bubble. The orchestrator writes to both through [`Notifier`].

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Notification { kind: NotificationKind, message: String },
    MeeBot { message: String },
}

pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotificationKind, message: &str);
    fn meebot_says(&self, message: &str);
}

/// Writes feedback to the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        match kind {
            NotificationKind::Success => tracing::info!(target: "meechain::notify", "{message}"),
            NotificationKind::Failure => tracing::warn!(target: "meechain::notify", "{message}"),
        }
    }

    fn meebot_says(&self, message: &str) {
        tracing::info!(target: "meechain::meebot", "{message}");
    }
}

/// Keeps every signal in arrival order.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    signals: Mutex<Vec<Signal>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Latest notification text, as a UI showing one toast would display it.
    pub fn last_notification(&self) -> Option<String> {
        self.signals().into_iter().rev().find_map(|s| match s {
            Signal::Notification { message, .. } => Some(message),
            Signal::MeeBot { .. } => None,
        })
    }

    pub fn last_meebot_message(&self) -> Option<String> {
        self.signals().into_iter().rev().find_map(|s| match s {
            Signal::MeeBot { message } => Some(message),
            Signal::Notification { .. } => None,
        })
    }

    fn push(&self, signal: Signal) {
        if let Ok(mut s) = self.signals.lock() {
            s.push(signal);
        }
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        self.push(Signal::Notification {
            kind,
            message: message.to_string(),
        });
    }

    fn meebot_says(&self, message: &str) {
        self.push(Signal::MeeBot {
            message: message.to_string(),
        });
    }
}
