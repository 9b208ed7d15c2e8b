// src/models.rs
//! Domain records persisted by the store.
//!
//! Field names serialize in camelCase so documents keep the same shape no
//! matter which backend holds them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Collection, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Rarity::Common => "Common",
            Rarity::Rare => "Rare",
            Rarity::Epic => "Epic",
            Rarity::Legendary => "Legendary",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
}

/// Closed set of moods a classifier may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Joyful,
    Curious,
    Helpful,
    Celebratory,
    Thoughtful,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Mood::Joyful,
        Mood::Curious,
        Mood::Helpful,
        Mood::Celebratory,
        Mood::Thoughtful,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Joyful => "joyful",
            Mood::Curious => "curious",
            Mood::Helpful => "helpful",
            Mood::Celebratory => "celebratory",
            Mood::Thoughtful => "thoughtful",
        }
    }

    /// Lenient parse: case-insensitive, ignores anything that is not a-z.
    pub fn parse(raw: &str) -> Option<Mood> {
        let cleaned: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase())
            .collect();
        Mood::ALL.into_iter().find(|m| m.as_str() == cleaned)
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived view of a contributor's XP. Only `xp` is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributorProfile {
    pub xp: u64,
    pub level: u64,
    pub level_xp: u64,
    pub next_level_xp: u64,
    pub progress: f64,
}

/// One immutable snapshot in a MeeBot's evolution history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionStage {
    pub stage: u32,
    pub name: String,
    pub image_url: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub trigger_event: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nft {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub rarity: Rarity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub evolution_stages: Vec<EvolutionStage>,
    /// Base64 audio greeting recorded at birth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_words: Option<String>,
    #[serde(default)]
    pub network: Network,
}

impl Nft {
    /// Build a freshly minted NFT whose history starts with the birth stage.
    pub fn minted(
        name: impl Into<String>,
        image_url: impl Into<String>,
        rarity: Rarity,
        description: impl Into<String>,
        tx_hash: Option<String>,
        network: Network,
    ) -> Self {
        let name = name.into();
        let image_url = image_url.into();
        let description = description.into();
        let birth = EvolutionStage {
            stage: 1,
            name: format!("Birth of {name}"),
            image_url: image_url.clone(),
            description: description.clone(),
            timestamp: Utc::now(),
            trigger_event: "Minted".to_string(),
        };
        Self {
            id: String::new(),
            name,
            image_url,
            rarity,
            description,
            tx_hash,
            evolution_stages: vec![birth],
            first_words: None,
            network,
        }
    }

    pub fn current_stage(&self) -> Option<&EvolutionStage> {
        self.evolution_stages.last()
    }

    /// Mint time, taken from the birth stage.
    pub fn minted_at(&self) -> Option<DateTime<Utc>> {
        self.evolution_stages.first().map(|s| s.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    Active,
    Passed,
    Failed,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub status: ProposalStatus,
    pub summary: String,
    #[serde(default)]
    pub votes_for: u64,
    #[serde(default)]
    pub votes_against: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelineEventType {
    Commit,
    Proposal,
    Badge,
    Merge,
    Design,
    Mint,
    MoodAnalysis,
    Evolution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TimelineEventType,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft_id: Option<String>,
}

/// A timeline entry before the log stamps it with an id and time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTimelineEvent {
    pub kind: TimelineEventType,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub tx_hash: Option<String>,
    pub mood: Option<Mood>,
    pub context: Option<String>,
    pub badge_name: Option<String>,
    pub nft_id: Option<String>,
}

impl NewTimelineEvent {
    pub fn new(
        kind: TimelineEventType,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
            image_url: None,
            tx_hash: None,
            mood: None,
            context: None,
            badge_name: None,
            nft_id: None,
        }
    }

    pub fn image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn tx_hash(mut self, hash: Option<String>) -> Self {
        self.tx_hash = hash;
        self
    }

    pub fn mood(mut self, mood: Mood) -> Self {
        self.mood = Some(mood);
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn badge_name(mut self, name: impl Into<String>) -> Self {
        self.badge_name = Some(name.into());
        self
    }

    pub fn nft_id(mut self, id: impl Into<String>) -> Self {
        self.nft_id = Some(id.into());
        self
    }

    pub fn stamp(self, timestamp: DateTime<Utc>) -> TimelineEvent {
        TimelineEvent {
            id: String::new(),
            kind: self.kind,
            title: self.title,
            description: self.description,
            timestamp,
            image_url: self.image_url,
            tx_hash: self.tx_hash,
            mood: self.mood,
            context: self.context,
            badge_name: self.badge_name,
            nft_id: self.nft_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesignStatus {
    Generated,
    Minted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Design {
    #[serde(default)]
    pub id: String,
    pub prompt: String,
    pub image_url: String,
    pub status: DesignStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceLog {
    #[serde(default)]
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub mood: Mood,
    pub quote: String,
    pub network: Network,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meebot_id: Option<String>,
}

impl Entity for Nft {
    const COLLECTION: Collection = Collection::Nfts;
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Badge {
    const COLLECTION: Collection = Collection::Badges;
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Proposal {
    const COLLECTION: Collection = Collection::Proposals;
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for TimelineEvent {
    const COLLECTION: Collection = Collection::Timeline;
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Design {
    const COLLECTION: Collection = Collection::Designs;
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for VoiceLog {
    const COLLECTION: Collection = Collection::VoiceLogs;
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for ContributorProfile {
    const COLLECTION: Collection = Collection::Profile;
    fn id(&self) -> &str {
        crate::services::ledger::PROFILE_DOC_ID
    }
}
