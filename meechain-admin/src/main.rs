use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use meechain_core::Dashboard;
use meechain_core::commands::init::{ensure_initialized_at, meechain_root};
use meechain_core::models::{DesignStatus, Mood};
use meechain_core::services::ActionReport;

#[derive(Parser)]
#[command(
    name = "meechain-admin",
    about = "Inspect and drive a MeeChain contributor workspace"
)]
struct Cli {
    /// Workspace root (defaults to $MEECHAIN_ROOT or .meechain)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Ignore SQLite and run against the seeded in-memory store
    #[arg(long, global = true)]
    in_memory: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create the workspace layout and default config
    Init,
    /// Show XP, level and progress
    Profile,
    /// List MeeBots with their evolution history
    Nfts,
    Badges,
    Proposals,
    Designs,
    VoiceLogs,
    /// Show the contributor timeline, newest first
    Timeline {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Mint a random MeeBot
    Mint,
    /// Run the genesis ritual: analyze a prompt, then mint the design
    Genesis {
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value = "Default")]
        persona: String,
    },
    /// Claim the "Active Contributor" badge
    ClaimBadge,
    /// Vote on a proposal
    Vote {
        #[arg(long)]
        proposal: String,
        /// Vote against instead of for
        #[arg(long)]
        against: bool,
    },
    /// Evolve a MeeBot by hand
    Evolve {
        #[arg(long)]
        nft: String,
        #[arg(long)]
        trigger: String,
    },
    /// Award XP directly
    AwardXp {
        #[arg(long)]
        amount: u64,
    },
    /// Set a design's status (generated | minted)
    DesignStatus {
        #[arg(long)]
        id: String,
        #[arg(long)]
        minted: bool,
    },
    /// Record a voice log line
    VoiceLog {
        #[arg(long)]
        mood: String,
        #[arg(long)]
        quote: String,
        #[arg(long)]
        meebot: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let root = cli.root.clone().unwrap_or_else(meechain_root);
    let report = ensure_initialized_at(&root)
        .with_context(|| format!("initializing workspace at {}", root.display()))?;

    if let Cmd::Init = cli.cmd {
        println!("workspace: {}", report.root.display());
        for c in &report.created {
            println!("  created  {c}");
        }
        for e in &report.existed {
            println!("  existed  {e}");
        }
        return Ok(());
    }

    let config = report.config.clone();
    let dash = if cli.in_memory {
        Dashboard::in_memory(config)?
    } else {
        Dashboard::open(config)?
    };
    run(&dash, cli.cmd).await
}

async fn run(dash: &Dashboard, cmd: Cmd) -> Result<()> {
    match cmd {
        Cmd::Init => Ok(()),
        Cmd::Profile => print_json(&dash.profile()?),
        Cmd::Nfts => print_json(&dash.nfts()?),
        Cmd::Badges => print_json(&dash.badges()?),
        Cmd::Proposals => print_json(&dash.proposals()?),
        Cmd::Designs => print_json(&dash.designs()?),
        Cmd::VoiceLogs => print_json(&dash.voice_logs()?),
        Cmd::Timeline { limit } => print_json(&dash.timeline(limit)?),
        Cmd::Mint => {
            let report = dash.mint_random().await?.settle().await;
            print_report(&report)
        }
        Cmd::Genesis { prompt, persona } => {
            let prepared = dash.prepare_genesis(&prompt, &persona).await?.settle().await;
            print_report(&prepared)?;
            let minted = dash.mint_designed(&prepared.record).await?.settle().await;
            print_report(&minted)
        }
        Cmd::ClaimBadge => {
            let report = dash.claim_badge().await?.settle().await;
            print_report(&report)
        }
        Cmd::Vote { proposal, against } => {
            let report = dash.vote(&proposal, !against).await?.settle().await;
            print_report(&report)
        }
        Cmd::Evolve { nft, trigger } => match dash.evolve(&nft, &trigger)? {
            Some(evolved) => print_json(&evolved),
            None => anyhow::bail!("no MeeBot with id {nft}"),
        },
        Cmd::AwardXp { amount } => {
            let change = dash.add_xp(amount)?;
            println!(
                "xp={} level {} -> {}{}",
                change.xp,
                change.old_level,
                change.new_level,
                if change.leveled_up { " (level up)" } else { "" }
            );
            Ok(())
        }
        Cmd::DesignStatus { id, minted } => {
            let status = if minted { DesignStatus::Minted } else { DesignStatus::Generated };
            match dash.update_design_status(&id, status)? {
                Some(design) => print_json(&design),
                None => anyhow::bail!("no design with id {id}"),
            }
        }
        Cmd::VoiceLog { mood, quote, meebot } => {
            let mood = Mood::parse(&mood).with_context(|| {
                format!("unknown mood {mood:?}; expected one of joyful, curious, helpful, celebratory, thoughtful")
            })?;
            print_json(&dash.record_voice_log(mood, &quote, meebot.as_deref())?)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_report<T: Serialize>(report: &ActionReport<T>) -> Result<()> {
    if let Some(receipt) = &report.receipt {
        println!("{}: tx {} ({:?})", report.action, receipt.tx_hash, receipt.network);
    }
    for step in &report.steps {
        println!("  {:?}: {:?}", step.step, step.outcome);
    }
    if let Some(level) = report.level {
        println!("  xp={} level={}", level.xp, level.new_level);
    }
    for nft in &report.evolved {
        if let Some(stage) = nft.current_stage() {
            println!("  evolved {} -> stage {} ({})", nft.name, stage.stage, stage.name);
        }
    }
    print_json(&report.record)
}
