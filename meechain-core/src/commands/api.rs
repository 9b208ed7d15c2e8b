// src/commands/api.rs
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::commands::init::ensure_initialized_once;
use crate::config::CoreConfig;
use crate::models::{
    Badge, ContributorProfile, Design, DesignStatus, Mood, Nft, Proposal, TimelineEvent, VoiceLog,
};
use crate::services::audit::Logbook;
use crate::services::ledger::LevelChange;
use crate::services::orchestrator::{ActionError, ActionReport, Collaborators, GenesisDraft, Orchestrator};
use crate::store::{Entity, MemoryStore, Persistence, SqliteStore, StoreError, Subscription, fixtures};

/// One contributor's view of the engine: reads, listeners and actions.
pub struct Dashboard {
    owner: String,
    config: CoreConfig,
    store: Arc<Persistence>,
    orchestrator: Orchestrator,
}

impl Dashboard {
    /// Open the workspace named by `MEECHAIN_ROOT`, initializing it if needed.
    pub fn open_default() -> Result<Self> {
        let report = ensure_initialized_once()?;
        Self::open(report.config.clone())
    }

    /// SQLite primary with an in-memory fallback, offline collaborators.
    pub fn open(config: CoreConfig) -> Result<Self> {
        let owner = config.contributor.wallet.clone();
        let fallback = Arc::new(if config.store.seed_fixtures {
            MemoryStore::seeded(&owner).context("seeding fallback store")?
        } else {
            MemoryStore::new()
        });

        let store = match SqliteStore::from_config(&config.store) {
            Ok(primary) => {
                if config.store.seed_fixtures {
                    if let Err(e) = fixtures::seed_if_empty(&primary, &owner) {
                        warn!(error = %e, "could not seed primary store");
                    }
                }
                let p = Persistence::new(Arc::new(primary), fallback);
                if config.store.fallback_enabled { p } else { p.without_fallback() }
            }
            Err(e) if config.store.fallback_enabled => {
                warn!(path = %config.store.sqlite_path.display(), error = %e, "sqlite unavailable; serving from memory");
                Persistence::memory_only(fallback)
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("opening sqlite store at {}", config.store.sqlite_path.display())
                });
            }
        };

        let collab = Collaborators::offline(&config);
        let logbook = Arc::new(Logbook::from_config(&config.logbook));
        info!(owner = %owner, "dashboard ready");
        Ok(Self::with_parts(config, Arc::new(store), collab, logbook))
    }

    /// Memory-only dashboard seeded with the demo dataset.
    pub fn in_memory(config: CoreConfig) -> Result<Self> {
        let store = MemoryStore::seeded(&config.contributor.wallet)?;
        let collab = Collaborators::offline(&config);
        Ok(Self::with_parts(
            config,
            Arc::new(Persistence::memory_only(Arc::new(store))),
            collab,
            Arc::new(Logbook::disabled()),
        ))
    }

    pub fn with_parts(
        config: CoreConfig,
        store: Arc<Persistence>,
        collab: Collaborators,
        logbook: Arc<Logbook>,
    ) -> Self {
        let orchestrator = Orchestrator::new(store.clone(), &config, collab, logbook);
        Self {
            owner: config.contributor.wallet.clone(),
            config,
            store,
            orchestrator,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Persistence> {
        &self.store
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    // ---------- reads ----------

    pub fn profile(&self) -> Result<ContributorProfile, StoreError> {
        self.orchestrator.ledger().profile(&self.owner)
    }

    pub fn nfts(&self) -> Result<Vec<Nft>, StoreError> {
        self.store.list(&self.owner)
    }

    pub fn nft(&self, id: &str) -> Result<Option<Nft>, StoreError> {
        self.store.get(&self.owner, id)
    }

    pub fn badges(&self) -> Result<Vec<Badge>, StoreError> {
        self.store.list(&self.owner)
    }

    pub fn proposals(&self) -> Result<Vec<Proposal>, StoreError> {
        self.store.list(&self.owner)
    }

    pub fn timeline(&self, limit: Option<usize>) -> Result<Vec<TimelineEvent>, StoreError> {
        self.orchestrator.events().recent(&self.owner, limit)
    }

    pub fn designs(&self) -> Result<Vec<Design>, StoreError> {
        self.store.list(&self.owner)
    }

    pub fn voice_logs(&self) -> Result<Vec<VoiceLog>, StoreError> {
        self.store.list(&self.owner)
    }

    // ---------- listeners ----------

    /// Live snapshots of one collection, starting with the current one.
    pub fn listen<T, F>(&self, callback: F) -> Result<Subscription, StoreError>
    where
        T: Entity,
        F: Fn(Vec<T>) + Send + Sync + 'static,
    {
        self.store.listen::<T, F>(&self.owner, callback)
    }

    pub fn listen_profile<F>(&self, callback: F) -> Result<Subscription, StoreError>
    where
        F: Fn(ContributorProfile) + Send + Sync + 'static,
    {
        self.orchestrator.ledger().listen(&self.owner, callback)
    }

    // ---------- actions ----------

    pub async fn mint_random(&self) -> Result<ActionReport<Nft>, ActionError> {
        self.orchestrator.mint_random(&self.owner).await
    }

    pub async fn prepare_genesis(&self, prompt: &str, persona: &str) -> Result<ActionReport<GenesisDraft>, ActionError> {
        self.orchestrator.prepare_genesis(&self.owner, prompt, persona).await
    }

    pub async fn mint_designed(&self, draft: &GenesisDraft) -> Result<ActionReport<Nft>, ActionError> {
        self.orchestrator.mint_designed(&self.owner, draft).await
    }

    pub async fn claim_badge(&self) -> Result<ActionReport<Badge>, ActionError> {
        self.orchestrator.claim_badge(&self.owner).await
    }

    pub async fn vote(&self, proposal_id: &str, support: bool) -> Result<ActionReport<Option<Proposal>>, ActionError> {
        self.orchestrator.vote(&self.owner, proposal_id, support).await
    }

    /// Evolve a MeeBot directly, outside any action.
    pub fn evolve(&self, nft_id: &str, trigger_event: &str) -> Result<Option<Nft>, StoreError> {
        self.orchestrator.evolution().trigger(&self.owner, nft_id, trigger_event)
    }

    pub fn add_xp(&self, amount: u64) -> Result<LevelChange, StoreError> {
        self.orchestrator.ledger().add_xp(&self.owner, amount)
    }

    pub fn update_design_status(&self, design_id: &str, status: DesignStatus) -> Result<Option<Design>, StoreError> {
        self.orchestrator.update_design_status(&self.owner, design_id, status)
    }

    pub fn record_voice_log(&self, mood: Mood, quote: &str, meebot_id: Option<&str>) -> Result<VoiceLog, StoreError> {
        let log = VoiceLog {
            id: String::new(),
            timestamp: chrono::Utc::now(),
            mood,
            quote: quote.to_string(),
            network: self.config.chain.network,
            meebot_id: meebot_id.map(str::to_string),
        };
        self.store.write(&self.owner, &log)
    }

    /// Whether the fallback store has taken over `T`'s collection.
    pub fn is_degraded<T: Entity>(&self) -> bool {
        self.store.is_degraded(T::COLLECTION, &self.owner)
    }
}
