use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use meechain_core::models::{DesignStatus, Mood, Network, Rarity, TimelineEventType};
use meechain_core::services::collaborators::{
    ChainError, ChainPayload, ChainWriter, MoodClassifier, Receipt, SimulatedChain, SpeechSynth,
};
use meechain_core::services::{
    ActionError, CollectingNotifier, Collaborators, Logbook, NotificationKind, Signal, Step,
    StepOutcome,
};
use meechain_core::store::{MemoryStore, Persistence};
use meechain_core::{CoreConfig, Dashboard};

// ----------------------- Test stubs -----------------------

/// Confirms after the usual settle delay and counts submissions.
struct CountingChain {
    inner: SimulatedChain,
    submitted: AtomicUsize,
}

impl CountingChain {
    fn new() -> Self {
        Self {
            inner: SimulatedChain::new(Duration::from_millis(1800), Network::Testnet),
            submitted: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChainWriter for CountingChain {
    async fn submit(&self, payload: &ChainPayload) -> Result<Receipt, ChainError> {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.inner.submit(payload).await
    }
}

struct RejectingChain;

#[async_trait]
impl ChainWriter for RejectingChain {
    async fn submit(&self, _payload: &ChainPayload) -> Result<Receipt, ChainError> {
        Err(ChainError::Rejected("user denied transaction".into()))
    }
}

/// Never confirms within any sane timeout.
struct StalledChain;

#[async_trait]
impl ChainWriter for StalledChain {
    async fn submit(&self, _payload: &ChainPayload) -> Result<Receipt, ChainError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Receipt {
            tx_hash: "0xlate".into(),
            network: Network::Testnet,
            confirmed_at: Utc::now(),
        })
    }
}

struct FixedMood(&'static str);

#[async_trait]
impl MoodClassifier for FixedMood {
    async fn classify(&self, _text: &str) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

struct BrokenMood;

#[async_trait]
impl MoodClassifier for BrokenMood {
    async fn classify(&self, _text: &str) -> anyhow::Result<String> {
        anyhow::bail!("model offline")
    }
}

/// Remembers what it was asked to say and returns a fake clip.
#[derive(Default)]
struct RecordingSpeech {
    heard: Mutex<Vec<String>>,
}

#[async_trait]
impl SpeechSynth for RecordingSpeech {
    async fn synthesize(&self, text: &str) -> Option<String> {
        self.heard.lock().unwrap().push(text.to_string());
        Some("UklGRg==".to_string())
    }
}

struct Harness {
    dash: Dashboard,
    notes: Arc<CollectingNotifier>,
}

fn harness_with(tweak: impl FnOnce(&mut Collaborators)) -> Harness {
    let cfg = CoreConfig::default();
    let notes = Arc::new(CollectingNotifier::new());
    let mut collab = Collaborators::offline(&cfg);
    collab.notifier = notes.clone();
    tweak(&mut collab);
    let store = MemoryStore::seeded(&cfg.contributor.wallet).unwrap();
    let dash = Dashboard::with_parts(
        cfg,
        Arc::new(Persistence::memory_only(Arc::new(store))),
        collab,
        Arc::new(Logbook::disabled()),
    );
    Harness { dash, notes }
}

fn harness() -> Harness {
    harness_with(|_| {})
}

// ----------------------- mint ----------------------------

#[tokio::test(start_paused = true)]
async fn mint_random_runs_every_step_in_order() {
    let h = harness();
    let report = h.dash.mint_random().await.unwrap().settle().await;

    let steps: Vec<Step> = report.steps.iter().map(|s| s.step).collect();
    assert_eq!(steps, vec![Step::Submit, Step::Persist, Step::Timeline, Step::AwardXp]);
    assert!(report.steps.iter().all(|s| s.outcome == StepOutcome::Done));

    let receipt = report.receipt.as_ref().unwrap();
    assert_eq!(receipt.tx_hash.len(), 66);
    assert_eq!(receipt.network, Network::Testnet);

    let nft = &report.record;
    assert!(nft.name.starts_with("MeeBot #"));
    assert_eq!(nft.rarity, Rarity::Rare);
    assert_eq!(nft.tx_hash.as_deref(), Some(receipt.tx_hash.as_str()));
    assert_eq!(nft.evolution_stages.len(), 1);
    assert_eq!(nft.evolution_stages[0].trigger_event, "Minted");

    assert_eq!(h.dash.nfts().unwrap().len(), 3);
    let latest = &h.dash.timeline(Some(1)).unwrap()[0];
    assert_eq!(latest.kind, TimelineEventType::Mint);
    assert_eq!(latest.title, format!("{} was born!", nft.name));
    assert_eq!(latest.description, "A new Rare companion has joined the collective.");

    assert_eq!(h.dash.profile().unwrap().xp, 170);
    assert!(!report.leveled_up());
    assert_eq!(
        h.notes.last_notification().as_deref(),
        Some("NFT Minted Successfully! (+50 XP)")
    );
    assert_eq!(
        h.notes.last_meebot_message(),
        Some(format!("A new companion is born! Welcome, {}!", nft.name))
    );
}

#[tokio::test(start_paused = true)]
async fn submit_waits_for_the_settle_delay() {
    let h = harness();
    let started = tokio::time::Instant::now();
    h.dash.mint_random().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(1800));
}

#[tokio::test(start_paused = true)]
async fn random_mint_carries_first_words() {
    let speech = Arc::new(RecordingSpeech::default());
    let shared = speech.clone();
    let h = harness_with(move |c| c.speech = shared);

    let report = h.dash.mint_random().await.unwrap();
    let nft = &report.record;
    assert_eq!(nft.first_words.as_deref(), Some("UklGRg=="));
    assert_eq!(
        *speech.heard.lock().unwrap(),
        vec![format!("Greetings, creator! I am {}. It is an honor to be born.", nft.name)]
    );

    // the silent default mints without audio
    let quiet = harness().dash.mint_random().await.unwrap();
    assert!(quiet.record.first_words.is_none());
}

#[tokio::test(start_paused = true)]
async fn rejected_submit_aborts_before_any_write() {
    let h = harness_with(|c| c.chain = Arc::new(RejectingChain));
    let events = h.dash.timeline(None).unwrap().len();

    let err = h.dash.mint_random().await.unwrap_err();
    assert!(matches!(err, ActionError::Chain(ChainError::Rejected(_))));

    assert_eq!(h.dash.nfts().unwrap().len(), 2);
    assert_eq!(h.dash.timeline(None).unwrap().len(), events);
    assert_eq!(h.dash.profile().unwrap().xp, 120);
    assert_eq!(
        h.notes.signals(),
        vec![Signal::Notification {
            kind: NotificationKind::Failure,
            message: "Transaction failed. Please try again.".into(),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn stalled_chain_times_out() {
    let h = harness_with(|c| c.chain = Arc::new(StalledChain));
    let err = h.dash.vote("prop1", true).await.unwrap_err();
    assert!(matches!(err, ActionError::Chain(ChainError::Timeout(_))));
    assert_eq!(h.dash.proposals().unwrap()[0].votes_for, 1250);
}

// ----------------------- badge ---------------------------

#[tokio::test(start_paused = true)]
async fn badge_can_be_claimed_once() {
    let chain = Arc::new(CountingChain::new());
    let shared = chain.clone();
    let h = harness_with(move |c| c.chain = shared);

    let report = h.dash.claim_badge().await.unwrap().settle().await;
    assert_eq!(report.record.name, "Active Contributor");
    assert_eq!(h.dash.badges().unwrap().len(), 4);
    assert_eq!(h.dash.profile().unwrap().xp, 195);

    // claiming pushes the genesis MeeBot one stage further
    assert_eq!(report.outcome(Step::Evolve), Some(&StepOutcome::Done));
    let genesis = h.dash.nft("nft1").unwrap().unwrap();
    let stage = genesis.current_stage().unwrap();
    assert_eq!(stage.stage, 3);
    assert_eq!(stage.trigger_event, "Claimed \"Active Contributor\" Badge");
    assert_eq!(
        h.notes.last_meebot_message().as_deref(),
        Some("Wow! Your Genesis Contributor felt that surge of energy and has evolved!")
    );

    let err = h.dash.claim_badge().await.unwrap_err();
    assert!(matches!(err, ActionError::AlreadyClaimed(_)));
    assert_eq!(chain.submitted.load(Ordering::SeqCst), 1);
    assert_eq!(h.dash.badges().unwrap().len(), 4);
    assert_eq!(h.dash.profile().unwrap().xp, 195);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_store_a_single_badge() {
    let h = Arc::new(harness_with(|c| {
        c.chain = Arc::new(SimulatedChain::new(Duration::from_millis(20), Network::Testnet));
    }));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let h = h.clone();
        tasks.push(tokio::spawn(async move { h.dash.claim_badge().await.is_ok() }));
    }
    let mut ok = 0;
    for t in tasks {
        if t.await.unwrap() {
            ok += 1;
        }
    }

    assert_eq!(ok, 1);
    let claimed = h
        .dash
        .badges()
        .unwrap()
        .into_iter()
        .filter(|b| b.name == "Active Contributor")
        .count();
    assert_eq!(claimed, 1);
    assert_eq!(h.dash.profile().unwrap().xp, 195);
}

// ----------------------- vote ----------------------------

#[tokio::test(start_paused = true)]
async fn votes_tally_on_the_shared_proposal() {
    let h = harness();

    let report = h.dash.vote("prop1", true).await.unwrap();
    assert_eq!(report.record.as_ref().unwrap().votes_for, 1251);
    let report = h.dash.vote("prop3", false).await.unwrap();
    assert_eq!(report.record.as_ref().unwrap().votes_against, 1101);

    let ids: Vec<String> = h.dash.proposals().unwrap().into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec!["prop1", "prop2", "prop3"]);

    let latest = &h.dash.timeline(Some(1)).unwrap()[0];
    assert_eq!(latest.kind, TimelineEventType::Proposal);
    assert_eq!(latest.description, "Voted AGAINST on a crucial governance matter.");
    assert_eq!(h.dash.profile().unwrap().xp, 170);
}

#[tokio::test(start_paused = true)]
async fn vote_on_missing_proposal_still_rewards() {
    let h = harness();
    let report = h.dash.vote("prop-missing", true).await.unwrap();
    assert!(report.record.is_none());
    assert!(matches!(report.outcome(Step::Persist), Some(StepOutcome::Skipped(_))));
    assert_eq!(report.outcome(Step::Timeline), Some(&StepOutcome::Done));
    assert_eq!(h.dash.profile().unwrap().xp, 145);
}

// ----------------------- level-up ------------------------

#[tokio::test(start_paused = true)]
async fn level_up_evolves_the_newest_meebot() {
    let h = harness();
    h.dash.add_xp(105).unwrap(); // 225

    let report = h.dash.vote("prop2", true).await.unwrap();
    assert!(report.leveled_up());
    assert_eq!(report.level.unwrap().new_level, 2);

    // nft2 was minted after nft1
    assert_eq!(report.evolved.len(), 1);
    let evolved = &report.evolved[0];
    assert_eq!(evolved.id, "nft2");
    assert_eq!(evolved.current_stage().unwrap().trigger_event, "Reached Level 2!");
    assert_eq!(h.dash.nft("nft1").unwrap().unwrap().evolution_stages.len(), 2);

    assert_eq!(
        h.notes.last_notification().as_deref(),
        Some("Vote Cast Successfully! (+25 XP)")
    );
    let report = report.settle().await;
    assert!(report.leveled_up());
    assert_eq!(
        h.notes.last_meebot_message().as_deref(),
        Some("Level up to 2! Your MeeBot #1337 felt that power and has evolved!")
    );
    assert_eq!(
        h.notes.last_notification().as_deref(),
        Some("You reached Level 2! Your MeeBot evolved!")
    );
}

#[tokio::test(start_paused = true)]
async fn minting_into_a_new_level_evolves_the_fresh_meebot() {
    let h = harness();
    h.dash.add_xp(80).unwrap(); // 200

    let report = h.dash.mint_random().await.unwrap().settle().await;
    assert!(report.leveled_up());
    assert_eq!(report.evolved[0].id, report.record.id);

    let stored = h.dash.nft(&report.record.id).unwrap().unwrap();
    assert_eq!(stored.evolution_stages.len(), 2);
    assert_eq!(stored.current_stage().unwrap().name, "Crystal Awakening");
}

// ----------------------- genesis -------------------------

#[tokio::test(start_paused = true)]
async fn genesis_ritual_mints_an_epic_meebot() {
    let h = harness();
    let prompt = "A happy little robot who loves painting sunsets";

    let prepared = h.dash.prepare_genesis(prompt, "Dream Painter").await.unwrap();
    let draft = prepared.record.clone();
    assert_eq!(draft.mood, Mood::Joyful);
    assert_eq!(draft.persona, "Dream Painter");
    assert!(draft.image_url.starts_with("https://picsum.photos/seed/"));
    assert_eq!(prepared.outcome(Step::Render), Some(&StepOutcome::Skipped("placeholder image".into())));
    assert_eq!(h.dash.profile().unwrap().xp, 135);

    let mood_event = h
        .dash
        .timeline(None)
        .unwrap()
        .into_iter()
        .find(|e| e.kind == TimelineEventType::MoodAnalysis && e.mood.is_some())
        .unwrap();
    assert_eq!(mood_event.description, "I sense a joyful mood in your words.");

    let design_id = draft.design_id.clone().unwrap();
    let minted = h.dash.mint_designed(&draft).await.unwrap().settle().await;
    let nft = &minted.record;
    assert_eq!(nft.rarity, Rarity::Epic);
    let number: u32 = nft.name.trim_start_matches("MeeBot #").parse().unwrap();
    assert!((9000..=9999).contains(&number));
    assert!(nft.description.contains("Dream Painter"));

    let latest = &h.dash.timeline(Some(1)).unwrap()[0];
    assert_eq!(latest.title, "A joyful MeeBot was Born!");
    assert_eq!(
        latest.description,
        "From prompt: \"A happy little robot who loves painting ...\""
    );

    let logs = h.dash.voice_logs().unwrap();
    assert_eq!(logs.len(), 4);
    let log = logs.iter().find(|l| l.meebot_id.as_deref() == Some(nft.id.as_str())).unwrap();
    assert_eq!(log.quote, prompt);
    assert_eq!(log.mood, Mood::Joyful);

    let design = h.dash.designs().unwrap().into_iter().find(|d| d.id == design_id).unwrap();
    assert_eq!(design.status, DesignStatus::Minted);
    assert_eq!(h.dash.profile().unwrap().xp, 235);
}

#[tokio::test(start_paused = true)]
async fn designed_mint_voice_log_follows_the_chain_network() {
    let h = harness_with(|c| {
        c.chain = Arc::new(SimulatedChain::new(Duration::from_millis(1800), Network::Mainnet))
    });
    let draft = h.dash.prepare_genesis("a wise MeeBot", "Default").await.unwrap().record;
    let minted = h.dash.mint_designed(&draft).await.unwrap().settle().await;
    assert_eq!(minted.record.network, Network::Mainnet);

    let log = h
        .dash
        .voice_logs()
        .unwrap()
        .into_iter()
        .find(|l| l.meebot_id.as_deref() == Some(minted.record.id.as_str()))
        .unwrap();
    assert_eq!(log.network, Network::Mainnet);
}

#[tokio::test(start_paused = true)]
async fn empty_prompt_is_refused() {
    let h = harness();
    let err = h.dash.prepare_genesis("   ", "Default").await.unwrap_err();
    assert!(matches!(err, ActionError::EmptyPrompt));
    assert!(h.notes.signals().is_empty());
}

#[tokio::test(start_paused = true)]
async fn classifier_output_is_coerced_into_the_mood_set() {
    let h = harness_with(|c| c.moods = Arc::new(FixedMood("Melancholic")));
    let draft = h.dash.prepare_genesis("rain", "").await.unwrap().record;
    assert_eq!(draft.mood, Mood::Curious);
    assert_eq!(draft.persona, "Default");

    let h = harness_with(|c| c.moods = Arc::new(FixedMood(" Celebratory!\n")));
    assert_eq!(h.dash.prepare_genesis("x", "Default").await.unwrap().record.mood, Mood::Celebratory);

    let h = harness_with(|c| c.moods = Arc::new(BrokenMood));
    assert_eq!(h.dash.prepare_genesis("x", "Default").await.unwrap().record.mood, Mood::Helpful);
}

#[test]
fn design_status_can_be_set_by_hand() {
    let h = harness();
    let d = h.dash.update_design_status("d1", DesignStatus::Minted).unwrap().unwrap();
    assert_eq!(d.status, DesignStatus::Minted);
    assert!(h.dash.update_design_status("missing", DesignStatus::Minted).unwrap().is_none());
}
