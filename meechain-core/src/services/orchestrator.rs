// src/services/orchestrator.rs
//! Action orchestrator.
//!
//! Every user action runs the same sequence of awaited steps:
//!
//! 1. submit the write to the chain and wait for confirmation
//! 2. persist the domain record
//! 3. append a timeline event
//! 4. award XP
//! 5. on level-up, evolve the most recently minted MeeBot
//!
//! Only step 1 can abort an action. Later steps log their failure, record it
//! in the returned [`ActionReport`] and the action carries on.

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::audit::{Logbook, preview};
use super::collaborators::{
    ChainError, ChainPayload, ChainWriter, ContentAddressedPinner, ImageSynth, KeywordClassifier,
    MetadataPinner, MoodClassifier, NoImageBackend, Receipt, SilentSpeech, SimulatedChain,
    SpeechSynth, coerce_mood, placeholder_image,
};
use super::evolution::EvolutionEngine;
use super::ledger::{LevelChange, ProfileLedger};
use super::notify::{NotificationKind, Notifier, TracingNotifier};
use super::timeline::EventLog;
use crate::config::{CoreConfig, RewardsConfig};
use crate::models::{
    Badge, Design, DesignStatus, Mood, NewTimelineEvent, Nft, Proposal, Rarity,
    TimelineEventType, VoiceLog,
};
use crate::store::{Persistence, StoreError};

pub const ACTIVE_CONTRIBUTOR: &str = "Active Contributor";
const ACTIVE_CONTRIBUTOR_BADGE_ID: &str = "badge-active-contributor";
const FAILURE_MESSAGE: &str = "Transaction failed. Please try again.";

pub const PERSONAS: [&str; 7] = [
    "Crystal Core",
    "Starlight Weaver",
    "Quantum Thinker",
    "Bio-Mechanic",
    "Dream Painter",
    "Chrono-Gardener",
    "Default",
];

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("transaction failed: {0}")]
    Chain(#[from] ChainError),
    #[error("badge \"{0}\" already claimed")]
    AlreadyClaimed(String),
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Submit,
    Persist,
    Timeline,
    AwardXp,
    Evolve,
    Classify,
    Render,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    /// The step had nothing to act on (e.g. the target record is missing).
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub outcome: StepOutcome,
}

/// What an action did, step by step.
#[derive(Debug)]
pub struct ActionReport<T> {
    pub action: &'static str,
    pub receipt: Option<Receipt>,
    /// The persisted record, or the unsaved one if persistence failed.
    pub record: T,
    pub steps: Vec<StepRecord>,
    /// Last XP award of the action.
    pub level: Option<LevelChange>,
    pub evolved: Vec<Nft>,
    pending: Vec<JoinHandle<()>>,
}

impl<T> ActionReport<T> {
    /// First recorded outcome for `step`.
    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.steps.iter().find(|r| r.step == step).map(|r| &r.outcome)
    }

    pub fn leveled_up(&self) -> bool {
        self.level.is_some_and(|l| l.leveled_up)
    }

    /// Wait for delayed notifications (the level-up message) to go out.
    pub async fn settle(mut self) -> Self {
        for handle in self.pending.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "delayed notification task failed");
            }
        }
        self
    }
}

/// Output of the genesis ritual's preparation phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisDraft {
    pub prompt: String,
    pub persona: String,
    pub mood: Mood,
    pub image_url: String,
    pub design_id: Option<String>,
}

/// External collaborators, injectable as a set.
#[derive(Clone)]
pub struct Collaborators {
    pub chain: Arc<dyn ChainWriter>,
    pub speech: Arc<dyn SpeechSynth>,
    pub images: Arc<dyn ImageSynth>,
    pub moods: Arc<dyn MoodClassifier>,
    pub pinner: Arc<dyn MetadataPinner>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// Offline defaults: simulated chain, no speech, placeholder images.
    pub fn offline(cfg: &CoreConfig) -> Self {
        Self {
            chain: Arc::new(SimulatedChain::new(cfg.chain.settle_delay(), cfg.chain.network)),
            speech: Arc::new(SilentSpeech),
            images: Arc::new(NoImageBackend),
            moods: Arc::new(KeywordClassifier),
            pinner: Arc::new(ContentAddressedPinner),
            notifier: Arc::new(TracingNotifier),
        }
    }
}

pub struct Orchestrator {
    store: Arc<Persistence>,
    ledger: ProfileLedger,
    evolution: EvolutionEngine,
    events: EventLog,
    collab: Collaborators,
    logbook: Arc<Logbook>,
    rewards: RewardsConfig,
    chain_timeout: Duration,
    level_up_delay: Duration,
    genesis_nft_id: String,
}

impl Orchestrator {
    pub fn new(
        store: Arc<Persistence>,
        cfg: &CoreConfig,
        collab: Collaborators,
        logbook: Arc<Logbook>,
    ) -> Self {
        let events = EventLog::new(store.clone());
        Self {
            ledger: ProfileLedger::new(store.clone(), cfg.progression.xp_per_level),
            evolution: EvolutionEngine::new(store.clone(), events.clone()),
            events,
            store,
            collab,
            logbook,
            rewards: cfg.progression.rewards.clone(),
            chain_timeout: cfg.chain.timeout(),
            level_up_delay: cfg.notifications.level_up_delay(),
            genesis_nft_id: cfg.contributor.genesis_nft_id.clone(),
        }
    }

    pub fn ledger(&self) -> &ProfileLedger {
        &self.ledger
    }

    pub fn evolution(&self) -> &EvolutionEngine {
        &self.evolution
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Mint a random MeeBot.
    pub async fn mint_random(&self, owner: &str) -> Result<ActionReport<Nft>, ActionError> {
        let mut run = Run::new(self, owner, "mint_random");
        let receipt = run.submit(ChainPayload::MintRandom).await?;

        let number: u32 = rand::thread_rng().gen_range(1000..=9999);
        let name = format!("MeeBot #{number}");
        let greeting = format!("Greetings, creator! I am {name}. It is an honor to be born.");
        let first_words = self.collab.speech.synthesize(&greeting).await;

        let mut draft = Nft::minted(
            name,
            format!("https://picsum.photos/seed/meebot{number}/500"),
            Rarity::Rare,
            "A freshly minted MeeBot, ready for adventure in the ecosystem.",
            Some(receipt.tx_hash.clone()),
            receipt.network,
        );
        draft.first_words = first_words;
        let nft = run
            .record(Step::Persist, self.store.write(owner, &draft))
            .unwrap_or(draft);

        let event = NewTimelineEvent::new(
            TimelineEventType::Mint,
            format!("{} was born!", nft.name),
            format!("A new {} companion has joined the collective.", nft.rarity),
        )
        .image_url(nft.image_url.clone())
        .tx_hash(nft.tx_hash.clone())
        .nft_id(nft.id.clone());
        run.record(Step::Timeline, self.events.append(owner, event));

        run.reward(
            "NFT Minted Successfully!",
            &format!("A new companion is born! Welcome, {}!", nft.name),
            self.rewards.mint_random,
        )
        .await;

        self.logbook.record_action(
            "orchestrator",
            "mint_random",
            &json!({ "owner": owner, "nft_id": nft.id, "tx_hash": receipt.tx_hash }),
            "low",
        );
        Ok(run.finish(Some(receipt), nft))
    }

    /// Claim the "Active Contributor" badge. Refused if already held.
    pub async fn claim_badge(&self, owner: &str) -> Result<ActionReport<Badge>, ActionError> {
        if self.holds_badge(owner, ACTIVE_CONTRIBUTOR)? {
            info!(owner, badge = ACTIVE_CONTRIBUTOR, "badge already claimed");
            return Err(ActionError::AlreadyClaimed(ACTIVE_CONTRIBUTOR.to_string()));
        }
        let mut run = Run::new(self, owner, "claim_badge");
        let receipt = run
            .submit(ChainPayload::ClaimBadge {
                badge_name: ACTIVE_CONTRIBUTOR.to_string(),
            })
            .await?;

        let draft = Badge {
            id: ACTIVE_CONTRIBUTOR_BADGE_ID.to_string(),
            name: ACTIVE_CONTRIBUTOR.to_string(),
            image_url: "https://picsum.photos/seed/badge4/300".to_string(),
            description: "For interacting with the dashboard features.".to_string(),
        };
        // A concurrent claim may have landed while this one was settling.
        let mut raced = false;
        let written = self.store.transactional_update::<Badge>(owner, ACTIVE_CONTRIBUTOR_BADGE_ID, |current| {
            raced = current.is_some();
            if raced { None } else { Some(draft.clone()) }
        });
        if raced {
            info!(owner, badge = ACTIVE_CONTRIBUTOR, "badge claimed concurrently; discarding duplicate");
            return Err(ActionError::AlreadyClaimed(ACTIVE_CONTRIBUTOR.to_string()));
        }
        let badge = run.record(Step::Persist, written).flatten().unwrap_or(draft);

        let event = NewTimelineEvent::new(
            TimelineEventType::Badge,
            format!("Earned \"{}\" Badge", badge.name),
            "You are making MeeChain better every day.",
        )
        .badge_name(badge.name.clone())
        .image_url(badge.image_url.clone());
        run.record(Step::Timeline, self.events.append(owner, event));

        run.reward(
            "Badge Claimed!",
            "Woohoo! You just earned the \"Active Contributor\" badge. Well done!",
            self.rewards.claim_badge,
        )
        .await;

        let trigger = format!("Claimed \"{ACTIVE_CONTRIBUTOR}\" Badge");
        if let Some(evolved) = run.evolve(&self.genesis_nft_id, &trigger) {
            self.collab.notifier.meebot_says(&format!(
                "Wow! Your {} felt that surge of energy and has evolved!",
                evolved.name
            ));
        }

        self.logbook.record_action(
            "orchestrator",
            "claim_badge",
            &json!({ "owner": owner, "badge": badge.name, "tx_hash": receipt.tx_hash }),
            "low",
        );
        Ok(run.finish(Some(receipt), badge))
    }

    /// Cast a vote. A missing proposal skips the tally but the vote is still
    /// logged and rewarded.
    pub async fn vote(
        &self,
        owner: &str,
        proposal_id: &str,
        support: bool,
    ) -> Result<ActionReport<Option<Proposal>>, ActionError> {
        let mut run = Run::new(self, owner, "vote");
        let receipt = run
            .submit(ChainPayload::Vote {
                proposal_id: proposal_id.to_string(),
                support,
            })
            .await?;

        let tallied = self.store.transactional_update::<Proposal>(owner, proposal_id, |current| {
            current.map(|mut p| {
                if support {
                    p.votes_for += 1;
                } else {
                    p.votes_against += 1;
                }
                p
            })
        });
        let proposal = match tallied {
            Ok(Some(p)) => {
                run.note(Step::Persist, StepOutcome::Done);
                Some(p)
            }
            Ok(None) => {
                info!(owner, proposal_id, "vote tally skipped: proposal not found");
                run.note(Step::Persist, StepOutcome::Skipped(format!("proposal {proposal_id} not found")));
                None
            }
            Err(e) => run.record::<Option<Proposal>>(Step::Persist, Err(e)).flatten(),
        };

        let event = NewTimelineEvent::new(
            TimelineEventType::Proposal,
            "Voted on Proposal",
            format!(
                "Voted {} on a crucial governance matter.",
                if support { "FOR" } else { "AGAINST" }
            ),
        );
        run.record(Step::Timeline, self.events.append(owner, event));

        run.reward(
            "Vote Cast Successfully!",
            "Your voice has been heard! Thank you for participating in governance.",
            self.rewards.vote,
        )
        .await;

        self.logbook.record_action(
            "orchestrator",
            "vote",
            &json!({ "owner": owner, "proposal_id": proposal_id, "support": support, "tx_hash": receipt.tx_hash }),
            "low",
        );
        Ok(run.finish(Some(receipt), proposal))
    }

    /// First half of the genesis ritual: read the mood of the prompt, render
    /// an image and keep the result as a design.
    pub async fn prepare_genesis(
        &self,
        owner: &str,
        prompt: &str,
        persona: &str,
    ) -> Result<ActionReport<GenesisDraft>, ActionError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ActionError::EmptyPrompt);
        }
        let persona = if persona.trim().is_empty() { "Default" } else { persona.trim() };
        let mut run = Run::new(self, owner, "prepare_genesis");

        let mood = coerce_mood(self.collab.moods.classify(prompt).await);
        run.note(Step::Classify, StepOutcome::Done);
        let mood_message = format!("I sense a {mood} mood in your words.");
        let event = NewTimelineEvent::new(TimelineEventType::MoodAnalysis, "MeeBot Mood Analysis", mood_message.clone())
            .mood(mood)
            .context(preview(prompt, 80));
        run.record(Step::Timeline, self.events.append(owner, event));
        run.reward("Mood Analysis Complete!", &mood_message, self.rewards.mood_analysis)
            .await;

        let image_url = match self.collab.images.synthesize(prompt).await {
            Some(generated) => {
                run.note(Step::Render, StepOutcome::Done);
                generated.image_url
            }
            None => {
                warn!(owner, prompt = %preview(prompt, 40), "image synthesis unavailable; using placeholder");
                run.note(Step::Render, StepOutcome::Skipped("placeholder image".to_string()));
                placeholder_image(prompt)
            }
        };

        let design = Design {
            id: String::new(),
            prompt: prompt.to_string(),
            image_url: image_url.clone(),
            status: DesignStatus::Generated,
            timestamp: Utc::now(),
        };
        let design_id = run
            .record(Step::Persist, self.store.write(owner, &design))
            .map(|d| d.id);
        run.reward(
            "Design Generated!",
            "Here is how I picture your MeeBot. Ready to bring it to life?",
            self.rewards.generate_design,
        )
        .await;

        let draft = GenesisDraft {
            prompt: prompt.to_string(),
            persona: persona.to_string(),
            mood,
            image_url,
            design_id,
        };
        self.logbook.record_action(
            "orchestrator",
            "prepare_genesis",
            &json!({ "owner": owner, "mood": mood, "persona": persona, "prompt": preview(prompt, 80) }),
            "low",
        );
        Ok(run.finish(None, draft))
    }

    /// Second half of the genesis ritual: pin metadata, mint an Epic MeeBot
    /// and record its first voice log.
    pub async fn mint_designed(&self, owner: &str, draft: &GenesisDraft) -> Result<ActionReport<Nft>, ActionError> {
        let mut run = Run::new(self, owner, "mint_designed");

        let number: u32 = rand::thread_rng().gen_range(9000..=9999);
        let name = format!("MeeBot #{number}");
        let description = format!(
            "A {} MeeBot born from a feeling of {} and curiosity. Prompt: \"{}\"",
            draft.persona, draft.mood, draft.prompt
        );
        let metadata = json!({
            "name": name,
            "description": description,
            "image": draft.image_url,
            "attributes": [
                { "trait_type": "Persona", "value": draft.persona },
                { "trait_type": "Mood", "value": draft.mood },
                { "trait_type": "Creator", "value": "You" },
                { "trait_type": "Birth Timestamp", "value": Utc::now().to_rfc3339() }
            ]
        });
        let metadata_uri = match self.collab.pinner.pin(&metadata).await {
            Ok(uri) => uri,
            Err(err) => return Err(run.abort("pin_metadata", err)),
        };
        let receipt = run.submit(ChainPayload::MintDesigned { metadata_uri }).await?;

        let nft_draft = Nft::minted(
            name,
            draft.image_url.clone(),
            Rarity::Epic,
            description,
            Some(receipt.tx_hash.clone()),
            receipt.network,
        );
        let nft = run
            .record(Step::Persist, self.store.write(owner, &nft_draft))
            .unwrap_or(nft_draft);

        let snippet: String = draft.prompt.chars().take(40).collect();
        let event = NewTimelineEvent::new(
            TimelineEventType::Mint,
            format!("A {} MeeBot was Born!", draft.mood),
            format!("From prompt: \"{snippet}...\""),
        )
        .image_url(nft.image_url.clone())
        .tx_hash(nft.tx_hash.clone())
        .nft_id(nft.id.clone());
        run.record(Step::Timeline, self.events.append(owner, event));

        let log = VoiceLog {
            id: String::new(),
            timestamp: Utc::now(),
            mood: draft.mood,
            quote: draft.prompt.clone(),
            network: receipt.network,
            meebot_id: Some(nft.id.clone()),
        };
        if let Err(e) = self.store.write(owner, &log) {
            warn!(owner, error = %e, "voice log not recorded");
        }
        if let Some(design_id) = &draft.design_id {
            match self.update_design_status(owner, design_id, DesignStatus::Minted) {
                Ok(Some(_)) => {}
                Ok(None) => info!(owner, design_id = %design_id, "design status skipped: design not found"),
                Err(e) => warn!(owner, design_id = %design_id, error = %e, "design status not updated"),
            }
        }

        run.reward(
            "Custom MeeBot Minted!",
            "Your unique design has been minted as an NFT!",
            self.rewards.mint_designed,
        )
        .await;

        self.logbook.record_action(
            "orchestrator",
            "mint_designed",
            &json!({ "owner": owner, "nft_id": nft.id, "mood": draft.mood, "tx_hash": receipt.tx_hash }),
            "low",
        );
        Ok(run.finish(Some(receipt), nft))
    }

    pub fn update_design_status(
        &self,
        owner: &str,
        design_id: &str,
        status: DesignStatus,
    ) -> Result<Option<Design>, StoreError> {
        self.store.transactional_update::<Design>(owner, design_id, |current| {
            current.map(|mut d| {
                d.status = status;
                d
            })
        })
    }

    fn holds_badge(&self, owner: &str, name: &str) -> Result<bool, StoreError> {
        Ok(self.store.list::<Badge>(owner)?.iter().any(|b| b.name == name))
    }

    /// The contributor's most recently minted MeeBot. Ties go to the one
    /// listed first.
    fn level_up_target(&self, owner: &str) -> Result<Option<Nft>, StoreError> {
        let nfts = self.store.list::<Nft>(owner)?;
        Ok(nfts.into_iter().rev().max_by_key(|n| n.minted_at()))
    }
}

/// Step bookkeeping for one action.
struct Run<'a> {
    orch: &'a Orchestrator,
    owner: &'a str,
    action: &'static str,
    steps: Vec<StepRecord>,
    level: Option<LevelChange>,
    evolved: Vec<Nft>,
    pending: Vec<JoinHandle<()>>,
}

impl<'a> Run<'a> {
    fn new(orch: &'a Orchestrator, owner: &'a str, action: &'static str) -> Self {
        Self {
            orch,
            owner,
            action,
            steps: Vec::new(),
            level: None,
            evolved: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn note(&mut self, step: Step, outcome: StepOutcome) {
        self.steps.push(StepRecord { step, outcome });
    }

    fn record<R>(&mut self, step: Step, result: Result<R, StoreError>) -> Option<R> {
        match result {
            Ok(value) => {
                self.note(step, StepOutcome::Done);
                Some(value)
            }
            Err(err) => {
                warn!(owner = self.owner, action = self.action, step = ?step, error = %err, "step failed; continuing");
                self.note(step, StepOutcome::Failed(err.to_string()));
                None
            }
        }
    }

    /// Step 1. Any failure here is fatal for the action.
    async fn submit(&mut self, payload: ChainPayload) -> Result<Receipt, ActionError> {
        let timeout = self.orch.chain_timeout;
        let result = match tokio::time::timeout(timeout, self.orch.collab.chain.submit(&payload)).await {
            Ok(result) => result,
            Err(_) => Err(ChainError::Timeout(timeout)),
        };
        match result {
            Ok(receipt) => {
                self.note(Step::Submit, StepOutcome::Done);
                info!(owner = self.owner, action = self.action, tx_hash = %receipt.tx_hash, "transaction confirmed");
                Ok(receipt)
            }
            Err(err) => Err(self.abort(payload.kind(), err)),
        }
    }

    fn abort(&mut self, kind: &str, err: ChainError) -> ActionError {
        error!(owner = self.owner, action = self.action, kind, error = %err, "submit failed; action aborted");
        self.note(Step::Submit, StepOutcome::Failed(err.to_string()));
        self.orch.collab.notifier.notify(NotificationKind::Failure, FAILURE_MESSAGE);
        self.orch.logbook.record_action(
            "orchestrator",
            "submit_failed",
            &json!({ "owner": self.owner, "action": self.action, "error": err.to_string() }),
            "medium",
        );
        ActionError::Chain(err)
    }

    fn evolve(&mut self, nft_id: &str, trigger: &str) -> Option<Nft> {
        match self.orch.evolution.trigger(self.owner, nft_id, trigger) {
            Ok(Some(nft)) => {
                self.note(Step::Evolve, StepOutcome::Done);
                self.evolved.push(nft.clone());
                Some(nft)
            }
            Ok(None) => {
                self.note(Step::Evolve, StepOutcome::Skipped(format!("nft {nft_id} not found")));
                None
            }
            Err(e) => self.record::<Nft>(Step::Evolve, Err(e)),
        }
    }

    /// Steps 4-6: award XP, evolve on level-up, tell the user.
    async fn reward(&mut self, message: &str, meebot_message: &str, xp: u64) {
        let notifier = self.orch.collab.notifier.clone();
        if xp == 0 {
            notifier.meebot_says(meebot_message);
            notifier.notify(NotificationKind::Success, message);
            return;
        }
        let Some(change) = self.record(Step::AwardXp, self.orch.ledger.add_xp(self.owner, xp)) else {
            notifier.notify(NotificationKind::Success, message);
            notifier.meebot_says(meebot_message);
            return;
        };
        self.level = Some(change);
        notifier.notify(NotificationKind::Success, &format!("{message} (+{xp} XP)"));
        if !change.leveled_up {
            notifier.meebot_says(meebot_message);
            return;
        }

        let target = match self.orch.level_up_target(self.owner) {
            Ok(Some(nft)) => nft,
            Ok(None) => {
                self.note(Step::Evolve, StepOutcome::Skipped("no meebot to evolve".to_string()));
                notifier.meebot_says(meebot_message);
                return;
            }
            Err(e) => {
                self.record::<()>(Step::Evolve, Err(e));
                notifier.meebot_says(meebot_message);
                return;
            }
        };
        let level = change.new_level;
        let Some(evolved) = self.evolve(&target.id, &format!("Reached Level {level}!")) else {
            notifier.meebot_says(meebot_message);
            return;
        };

        // The level-up message replaces the generic one after a short pause.
        let delay = self.orch.level_up_delay;
        let name = evolved.name.clone();
        self.pending.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            notifier.meebot_says(&format!(
                "Level up to {level}! Your {name} felt that power and has evolved!"
            ));
            notifier.notify(
                NotificationKind::Success,
                &format!("You reached Level {level}! Your MeeBot evolved!"),
            );
        }));
    }

    fn finish<T>(self, receipt: Option<Receipt>, record: T) -> ActionReport<T> {
        ActionReport {
            action: self.action,
            receipt,
            record,
            steps: self.steps,
            level: self.level,
            evolved: self.evolved,
            pending: self.pending,
        }
    }
}
