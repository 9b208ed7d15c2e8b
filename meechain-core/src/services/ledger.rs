// src/services/ledger.rs
//! Profile ledger: XP is the only stored truth, everything else is derived.

use std::sync::Arc;

use crate::models::ContributorProfile;
use crate::store::{Persistence, StoreError, Subscription};

pub const XP_PER_LEVEL: u64 = 250;

/// Fixed id of the single profile document per contributor.
pub const PROFILE_DOC_ID: &str = "summary";

/// Derive the full profile from cumulative XP.
pub fn calculate_profile(xp: u64) -> ContributorProfile {
    calculate_profile_with(xp, XP_PER_LEVEL)
}

pub fn calculate_profile_with(xp: u64, xp_per_level: u64) -> ContributorProfile {
    let per_level = xp_per_level.max(1);
    let level_xp = xp - xp % per_level;
    let level = (xp / per_level).saturating_add(1);
    // saturates on the last partial level below u64::MAX
    let next_level_xp = level_xp.saturating_add(per_level);
    let progress = (xp - level_xp) as f64 / per_level as f64 * 100.0;
    ContributorProfile {
        xp,
        level,
        level_xp,
        next_level_xp,
        progress,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub leveled_up: bool,
    pub old_level: u64,
    pub new_level: u64,
    pub xp: u64,
}

#[derive(Clone)]
pub struct ProfileLedger {
    store: Arc<Persistence>,
    xp_per_level: u64,
}

impl ProfileLedger {
    pub fn new(store: Arc<Persistence>, xp_per_level: u64) -> Self {
        Self {
            store,
            xp_per_level,
        }
    }

    pub fn xp_per_level(&self) -> u64 {
        self.xp_per_level
    }

    /// Current profile, recomputed from the stored XP. A contributor with no
    /// profile yet starts at zero.
    pub fn profile(&self, owner: &str) -> Result<ContributorProfile, StoreError> {
        let xp = self
            .store
            .get::<ContributorProfile>(owner, PROFILE_DOC_ID)?
            .map(|p| p.xp)
            .unwrap_or(0);
        Ok(calculate_profile_with(xp, self.xp_per_level))
    }

    /// Add XP in one atomic read-modify-write and report whether the level
    /// changed. Multi-level jumps count as a single level-up.
    pub fn add_xp(&self, owner: &str, amount: u64) -> Result<LevelChange, StoreError> {
        let per_level = self.xp_per_level;
        let mut change = LevelChange {
            leveled_up: false,
            old_level: 1,
            new_level: 1,
            xp: 0,
        };
        self.store
            .transactional_update::<ContributorProfile>(owner, PROFILE_DOC_ID, |current| {
                let before = current.map(|p| p.xp).unwrap_or(0);
                let old = calculate_profile_with(before, per_level);
                let new = calculate_profile_with(before.saturating_add(amount), per_level);
                change = LevelChange {
                    leveled_up: new.level > old.level,
                    old_level: old.level,
                    new_level: new.level,
                    xp: new.xp,
                };
                Some(new)
            })?;
        tracing::info!(
            owner,
            amount,
            xp = change.xp,
            level = change.new_level,
            leveled_up = change.leveled_up,
            "xp awarded"
        );
        Ok(change)
    }

    /// Subscribe to profile changes; each snapshot is recomputed from XP.
    pub fn listen<F>(&self, owner: &str, callback: F) -> Result<Subscription, StoreError>
    where
        F: Fn(ContributorProfile) + Send + Sync + 'static,
    {
        let per_level = self.xp_per_level;
        self.store.listen::<ContributorProfile, _>(owner, move |docs| {
            let xp = docs.first().map(|p| p.xp).unwrap_or(0);
            callback(calculate_profile_with(xp, per_level));
        })
    }
}
