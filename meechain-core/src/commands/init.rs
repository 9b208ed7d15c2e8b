// meechain-core/src/commands/init.rs

use anyhow::{Context, Result};
use chrono::Utc;
use once_cell::sync::OnceCell;
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::CoreConfig;

#[derive(Debug, Clone)]
pub struct InitReport {
    pub root: PathBuf,
    pub created: Vec<String>,
    pub existed: Vec<String>,
    pub config: CoreConfig,
}

// ---------- single global init gate ----------

static INIT: OnceCell<InitReport> = OnceCell::new();

/// Idempotent global initializer for the workspace named by `MEECHAIN_ROOT`.
pub fn ensure_initialized_once() -> Result<&'static InitReport> {
    INIT.get_or_try_init(ensure_initialized)
}

/// Resolve the workspace root. `MEECHAIN_ROOT` overrides the default.
pub fn meechain_root() -> PathBuf {
    std::env::var_os("MEECHAIN_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".meechain"))
}

pub fn ensure_initialized() -> Result<InitReport> {
    ensure_initialized_at(&meechain_root())
}

/// Create the workspace layout under `root` (idempotent) and load its config.
pub fn ensure_initialized_at(root: &Path) -> Result<InitReport> {
    let mut created = Vec::new();
    let mut existed = Vec::new();

    ensure_dir(root, "", &mut created, &mut existed)?;
    ensure_dir(root, "cache", &mut created, &mut existed)?;
    ensure_dir(root, "logbook", &mut created, &mut existed)?;

    ensure_file(
        root,
        "config.toml",
        Some(DEFAULT_CONFIG_TOML),
        &mut created,
        &mut existed,
    )?;

    let config = CoreConfig::load(root)?;
    initialize_logbook(&config, &mut created, &mut existed)?;

    Ok(InitReport {
        root: root.to_path_buf(),
        created,
        existed,
        config,
    })
}

fn ensure_dir(
    base: &Path,
    rel: &str,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = if rel.is_empty() { base.to_path_buf() } else { base.join(rel) };
    let label = if rel.is_empty() { ".".to_string() } else { rel.to_string() };
    if p.exists() {
        existed.push(label);
        return Ok(());
    }
    fs::create_dir_all(&p).with_context(|| format!("create_dir_all({:?})", p))?;
    created.push(label);
    Ok(())
}

fn ensure_file(
    base: &Path,
    rel_file: &str,
    content_if_absent: Option<&str>,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = base.join(rel_file);
    if p.exists() {
        existed.push(rel_file.to_string());
        return Ok(());
    }
    write_atomic(&p, content_if_absent.unwrap_or("").as_bytes())?;
    created.push(rel_file.to_string());
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create_dir_all({:?})", parent))?;
    }
    let tmp = path.with_extension("tmp");
    {
        let mut f = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .with_context(|| format!("open temp file {:?}", tmp))?;
        f.write_all(bytes)?;
        f.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("rename {:?} -> {:?}", tmp, path))?;
    Ok(())
}

/// Seed the actions log with a `system_init` line when missing or empty.
fn initialize_logbook(
    config: &CoreConfig,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    if !config.logbook.enabled {
        return Ok(());
    }
    let path = &config.logbook.actions;
    let label = path
        .file_name()
        .map(|n| format!("logbook/{}", n.to_string_lossy()))
        .unwrap_or_else(|| "logbook".to_string());
    let init_line = json!({
        "timestamp": Utc::now().to_rfc3339(),
        "event": "system_init",
        "agent": "system",
        "details": { "name": config.system.name, "version": config.system.version }
    })
    .to_string();

    if !path.exists() {
        write_atomic(path, format!("{init_line}\n").as_bytes())?;
        created.push(label);
        return Ok(());
    }
    existed.push(label);
    if fs::metadata(path)?.len() == 0 {
        let mut f = OpenOptions::new().append(true).open(path)?;
        writeln!(f, "{init_line}")?;
    }
    Ok(())
}

// ---------- defaults ----------

const DEFAULT_CONFIG_TOML: &str = r#"[system]
name = "meechain"
version = "0.1.0"

[store]
sqlite_path = "cache/meechain.db"
fallback_enabled = true
seed_fixtures = true
max_conflict_retries = 5
busy_timeout_ms = 250

[progression]
xp_per_level = 250

[progression.rewards]
mint_random = 50
mint_designed = 100
claim_badge = 75
vote = 25
generate_design = 10
mood_analysis = 5

[chain]
settle_delay_ms = 1800
timeout_ms = 10000
network = "testnet"

[notifications]
level_up_delay_ms = 500

[logbook]
path = "logbook"
actions = "logbook/actions.jsonl"
enabled = true

[contributor]
wallet = "0x1234567890AbCdEf1234567890aBcDeF12345678"
genesis_nft_id = "nft1"
"#;
