// src/services/collaborators.rs
//! External collaborators the orchestrator talks to.
//!
//! Each one is a trait so tests and embedders can inject their own. The
//! defaults here run offline: a simulated chain that settles after a fixed
//! delay, no speech, placeholder images, a keyword mood classifier and a
//! content-addressed metadata pin.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Mood, Network};

// ---------- chain writes ----------

/// What an on-chain write is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainPayload {
    MintRandom,
    MintDesigned { metadata_uri: String },
    ClaimBadge { badge_name: String },
    Vote { proposal_id: String, support: bool },
}

impl ChainPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            ChainPayload::MintRandom => "mint_random",
            ChainPayload::MintDesigned { .. } => "mint_designed",
            ChainPayload::ClaimBadge { .. } => "claim_badge",
            ChainPayload::Vote { .. } => "vote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: String,
    pub network: Network,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("chain unavailable: {0}")]
    Unavailable(String),
    #[error("no confirmation within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Submit and wait for a single confirmation.
    async fn submit(&self, payload: &ChainPayload) -> Result<Receipt, ChainError>;
}

/// Confirms every write after `settle_delay`.
#[derive(Debug, Clone)]
pub struct SimulatedChain {
    settle_delay: Duration,
    network: Network,
}

impl SimulatedChain {
    pub fn new(settle_delay: Duration, network: Network) -> Self {
        Self {
            settle_delay,
            network,
        }
    }
}

#[async_trait]
impl ChainWriter for SimulatedChain {
    async fn submit(&self, payload: &ChainPayload) -> Result<Receipt, ChainError> {
        tracing::debug!(kind = payload.kind(), delay_ms = self.settle_delay.as_millis() as u64, "simulating transaction");
        tokio::time::sleep(self.settle_delay).await;
        Ok(Receipt {
            tx_hash: random_tx_hash(),
            network: self.network,
            confirmed_at: Utc::now(),
        })
    }
}

/// `0x` followed by 64 random lowercase hex digits.
pub fn random_tx_hash() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    let mut out = String::with_capacity(66);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

// ---------- speech ----------

#[async_trait]
pub trait SpeechSynth: Send + Sync {
    /// Base64 audio for `text`, or `None` to skip narration.
    async fn synthesize(&self, text: &str) -> Option<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSpeech;

#[async_trait]
impl SpeechSynth for SilentSpeech {
    async fn synthesize(&self, _text: &str) -> Option<String> {
        None
    }
}

// ---------- images ----------

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub image_url: String,
    pub metadata: Option<Value>,
}

#[async_trait]
pub trait ImageSynth: Send + Sync {
    async fn synthesize(&self, prompt: &str) -> Option<GeneratedImage>;
}

/// Image backend that never renders; callers fall back to
/// [`placeholder_image`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoImageBackend;

#[async_trait]
impl ImageSynth for NoImageBackend {
    async fn synthesize(&self, _prompt: &str) -> Option<GeneratedImage> {
        None
    }
}

/// Deterministic stand-in image keyed by the prompt.
pub fn placeholder_image(prompt: &str) -> String {
    format!("https://picsum.photos/seed/{}/512", urlencoding::encode(prompt))
}

// ---------- mood ----------

#[async_trait]
pub trait MoodClassifier: Send + Sync {
    /// Raw label; may be anything.
    async fn classify(&self, text: &str) -> anyhow::Result<String>;
}

/// Map a classifier outcome onto the closed mood set.
/// Unknown labels become `curious`; errors become `helpful`.
pub fn coerce_mood(result: anyhow::Result<String>) -> Mood {
    match result {
        Ok(raw) => Mood::parse(&raw).unwrap_or_else(|| {
            tracing::debug!(label = %raw, "classifier label outside mood set; using curious");
            Mood::Curious
        }),
        Err(err) => {
            tracing::warn!(error = %err, "mood classifier failed; using helpful");
            Mood::Helpful
        }
    }
}

/// Offline keyword heuristic.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

const MOOD_KEYWORDS: &[(Mood, &[&str])] = &[
    (Mood::Celebratory, &["celebrat", "party", "launch", "victory", "win"]),
    (Mood::Joyful, &["happy", "joy", "fun", "love", "smile", "bright"]),
    (Mood::Helpful, &["help", "support", "fix", "guide", "assist"]),
    (Mood::Thoughtful, &["wise", "think", "reflect", "ancient", "calm", "book"]),
];

#[async_trait]
impl MoodClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> anyhow::Result<String> {
        let lower = text.to_lowercase();
        let mood = MOOD_KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
            .map(|(mood, _)| *mood)
            .unwrap_or(Mood::Curious);
        Ok(mood.as_str().to_string())
    }
}

// ---------- metadata pinning ----------

#[async_trait]
pub trait MetadataPinner: Send + Sync {
    /// Pin `metadata` and return its `ipfs://` URI.
    async fn pin(&self, metadata: &Value) -> Result<String, ChainError>;
}

/// Local content addressing: the CID is the BLAKE3 hash of the JSON bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentAddressedPinner;

#[async_trait]
impl MetadataPinner for ContentAddressedPinner {
    async fn pin(&self, metadata: &Value) -> Result<String, ChainError> {
        let bytes = serde_json::to_vec(metadata).map_err(|e| ChainError::Rejected(e.to_string()))?;
        let cid = blake3::hash(&bytes).to_hex().to_string();
        Ok(format!("ipfs://{cid}/metadata.json"))
    }
}
