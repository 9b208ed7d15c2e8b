// src/services/evolution.rs
//! Evolution engine.
//!
//! Stage `n` (for `n >= 2`) takes its name and flavour text from
//! `EVOLUTION_TABLE[n - 2]`. Once the table runs out every further stage
//! reuses the last entry.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::timeline::EventLog;
use crate::models::{EvolutionStage, NewTimelineEvent, Nft, TimelineEventType};
use crate::store::{Persistence, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvolutionEntry {
    pub name: &'static str,
    pub description: &'static str,
    /// Suffix for the stage image seed.
    pub image_seed: &'static str,
}

pub const EVOLUTION_TABLE: [EvolutionEntry; 4] = [
    EvolutionEntry {
        name: "Crystal Awakening",
        description: "Gained wisdom in governance.",
        image_seed: "s2",
    },
    EvolutionEntry {
        name: "Cosmic Insight",
        description: "Radiates with cosmic energy.",
        image_seed: "s3",
    },
    EvolutionEntry {
        name: "Starlight Sentinel",
        description: "Became a guardian of the network.",
        image_seed: "s4",
    },
    EvolutionEntry {
        name: "Nebula Weaver",
        description: "Learned to shape the very fabric of the chain.",
        image_seed: "s5",
    },
];

pub fn entry_for_stage(stage: u32) -> &'static EvolutionEntry {
    let idx = (stage.saturating_sub(2) as usize).min(EVOLUTION_TABLE.len() - 1);
    &EVOLUTION_TABLE[idx]
}

/// Build the stage that would follow `nft`'s current history.
pub fn next_stage(nft: &Nft, trigger_event: &str, at: DateTime<Utc>) -> EvolutionStage {
    let stage = nft.evolution_stages.len() as u32 + 1;
    let entry = entry_for_stage(stage);
    EvolutionStage {
        stage,
        name: entry.name.to_string(),
        image_url: format!("https://picsum.photos/seed/{}-{}/500", nft.id, entry.image_seed),
        description: format!(
            "Triggered by \"{trigger_event}\", the MeeBot now {}",
            entry.description.to_lowercase()
        ),
        timestamp: at,
        trigger_event: trigger_event.to_string(),
    }
}

#[derive(Clone)]
pub struct EvolutionEngine {
    store: Arc<Persistence>,
    events: EventLog,
}

impl EvolutionEngine {
    pub fn new(store: Arc<Persistence>, events: EventLog) -> Self {
        Self { store, events }
    }

    /// Append the next stage to `nft_id` and log it.
    ///
    /// Returns `Ok(None)` when the NFT does not exist. The stage is appended
    /// inside a transaction, so concurrent triggers never reuse a number.
    pub fn trigger(&self, owner: &str, nft_id: &str, trigger_event: &str) -> Result<Option<Nft>, StoreError> {
        let evolved = self.store.transactional_update::<Nft>(owner, nft_id, |current| {
            current.map(|mut nft| {
                let stage = next_stage(&nft, trigger_event, Utc::now());
                nft.image_url = stage.image_url.clone();
                nft.evolution_stages.push(stage);
                nft
            })
        })?;

        let Some(nft) = evolved else {
            tracing::info!(owner, nft_id, "evolution skipped: nft not found");
            return Ok(None);
        };
        let Some(stage) = nft.current_stage() else {
            return Ok(Some(nft));
        };
        tracing::info!(owner, nft_id, stage = stage.stage, name = %stage.name, trigger = trigger_event, "meebot evolved");

        self.events.append(
            owner,
            NewTimelineEvent::new(
                TimelineEventType::Evolution,
                "MeeBot Evolved!",
                format!("{} reached Stage {}: {}!", nft.name, stage.stage, stage.name),
            )
            .image_url(stage.image_url.clone())
            .nft_id(nft.id.clone()),
        )?;
        Ok(Some(nft))
    }
}
