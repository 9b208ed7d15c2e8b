use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::Network;

#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub logbook: LogbookConfig,
    #[serde(default)]
    pub contributor: ContributorConfig,
}

impl CoreConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("config.toml");
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            Self::from_toml_str(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            tracing::info!(
                "No config file found at {}. Using CoreConfig::default().",
                path.display()
            );
            CoreConfig::default()
        };
        cfg.resolve_paths(root);
        Ok(cfg)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str::<CoreConfig>(text)?)
    }

    fn resolve_paths(&mut self, root: &Path) {
        self.store.sqlite_path = absolutize(root, &self.store.sqlite_path);
        self.logbook.path = absolutize(root, &self.logbook.path);
        self.logbook.actions = absolutize(root, &self.logbook.actions);
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            system: SystemConfig::default(),
            store: StoreConfig::default(),
            progression: ProgressionConfig::default(),
            chain: ChainConfig::default(),
            notifications: NotificationsConfig::default(),
            logbook: LogbookConfig::default(),
            contributor: ContributorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "SystemConfig::default_name")]
    pub name: String,
    #[serde(default = "SystemConfig::default_version")]
    pub version: String,
}

impl SystemConfig {
    fn default_name() -> String {
        "meechain".to_string()
    }

    fn default_version() -> String {
        "0.1.0".to_string()
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            version: Self::default_version(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "StoreConfig::default_sqlite_path")]
    pub sqlite_path: PathBuf,
    #[serde(default = "StoreConfig::default_true")]
    pub fallback_enabled: bool,
    #[serde(default = "StoreConfig::default_true")]
    pub seed_fixtures: bool,
    #[serde(default = "StoreConfig::default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    #[serde(default = "StoreConfig::default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl StoreConfig {
    fn default_sqlite_path() -> PathBuf {
        PathBuf::from("cache/meechain.db")
    }

    fn default_true() -> bool {
        true
    }

    fn default_max_conflict_retries() -> u32 {
        5
    }

    fn default_busy_timeout_ms() -> u64 {
        250
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: Self::default_sqlite_path(),
            fallback_enabled: true,
            seed_fixtures: true,
            max_conflict_retries: Self::default_max_conflict_retries(),
            busy_timeout_ms: Self::default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressionConfig {
    #[serde(default = "ProgressionConfig::default_xp_per_level")]
    pub xp_per_level: u64,
    #[serde(default)]
    pub rewards: RewardsConfig,
}

impl ProgressionConfig {
    fn default_xp_per_level() -> u64 {
        crate::services::ledger::XP_PER_LEVEL
    }
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            xp_per_level: Self::default_xp_per_level(),
            rewards: RewardsConfig::default(),
        }
    }
}

/// Fixed XP rewards per gamified action.
#[derive(Debug, Clone, Deserialize)]
pub struct RewardsConfig {
    #[serde(default = "RewardsConfig::default_mint_random")]
    pub mint_random: u64,
    #[serde(default = "RewardsConfig::default_mint_designed")]
    pub mint_designed: u64,
    #[serde(default = "RewardsConfig::default_claim_badge")]
    pub claim_badge: u64,
    #[serde(default = "RewardsConfig::default_vote")]
    pub vote: u64,
    #[serde(default = "RewardsConfig::default_generate_design")]
    pub generate_design: u64,
    #[serde(default = "RewardsConfig::default_mood_analysis")]
    pub mood_analysis: u64,
}

impl RewardsConfig {
    fn default_mint_random() -> u64 {
        50
    }

    fn default_mint_designed() -> u64 {
        100
    }

    fn default_claim_badge() -> u64 {
        75
    }

    fn default_vote() -> u64 {
        25
    }

    fn default_generate_design() -> u64 {
        10
    }

    fn default_mood_analysis() -> u64 {
        5
    }
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            mint_random: Self::default_mint_random(),
            mint_designed: Self::default_mint_designed(),
            claim_badge: Self::default_claim_badge(),
            vote: Self::default_vote(),
            generate_design: Self::default_generate_design(),
            mood_analysis: Self::default_mood_analysis(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "ChainConfig::default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "ChainConfig::default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub network: Network,
}

impl ChainConfig {
    fn default_settle_delay_ms() -> u64 {
        1800
    }

    fn default_timeout_ms() -> u64 {
        10_000
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: Self::default_settle_delay_ms(),
            timeout_ms: Self::default_timeout_ms(),
            network: Network::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "NotificationsConfig::default_level_up_delay_ms")]
    pub level_up_delay_ms: u64,
}

impl NotificationsConfig {
    fn default_level_up_delay_ms() -> u64 {
        500
    }

    pub fn level_up_delay(&self) -> Duration {
        Duration::from_millis(self.level_up_delay_ms)
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            level_up_delay_ms: Self::default_level_up_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogbookConfig {
    #[serde(default = "LogbookConfig::default_path")]
    pub path: PathBuf,
    #[serde(default = "LogbookConfig::default_actions")]
    pub actions: PathBuf,
    #[serde(default = "LogbookConfig::default_enabled")]
    pub enabled: bool,
}

impl LogbookConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("logbook")
    }

    fn default_actions() -> PathBuf {
        PathBuf::from("logbook/actions.jsonl")
    }

    fn default_enabled() -> bool {
        true
    }
}

impl Default for LogbookConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            actions: Self::default_actions(),
            enabled: Self::default_enabled(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContributorConfig {
    #[serde(default = "ContributorConfig::default_wallet")]
    pub wallet: String,
    #[serde(default = "ContributorConfig::default_genesis_nft_id")]
    pub genesis_nft_id: String,
}

impl ContributorConfig {
    fn default_wallet() -> String {
        "0x1234567890AbCdEf1234567890aBcDeF12345678".to_string()
    }

    fn default_genesis_nft_id() -> String {
        "nft1".to_string()
    }
}

impl Default for ContributorConfig {
    fn default() -> Self {
        Self {
            wallet: Self::default_wallet(),
            genesis_nft_id: Self::default_genesis_nft_id(),
        }
    }
}

fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}
