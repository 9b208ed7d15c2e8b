use std::sync::{Arc, Mutex};

use chrono::Utc;

use meechain_core::models::{ContributorProfile, Network, Nft, Rarity, TimelineEventType};
use meechain_core::services::calculate_profile;
use meechain_core::services::evolution::{EVOLUTION_TABLE, entry_for_stage, next_stage};
use meechain_core::services::ledger::calculate_profile_with;
use meechain_core::{CoreConfig, Dashboard};

fn dashboard() -> Dashboard {
    Dashboard::in_memory(CoreConfig::default()).expect("seeded dashboard")
}

// ----------------------- XP ledger ------------------------

#[test]
fn seeded_profile_is_recomputed_from_xp() {
    let dash = dashboard();
    let p = dash.profile().unwrap();
    assert_eq!(p, calculate_profile(120));
    assert_eq!(p.level, 1);
    assert_eq!(p.next_level_xp, 250);
    assert!((p.progress - 48.0).abs() < 1e-9);
}

#[test]
fn crossing_a_boundary_levels_up_once() {
    let dash = dashboard();
    dash.add_xp(120).unwrap(); // 240
    let change = dash.add_xp(20).unwrap();
    assert!(change.leveled_up);
    assert_eq!((change.old_level, change.new_level, change.xp), (1, 2, 260));

    let p = dash.profile().unwrap();
    assert_eq!(p.level_xp, 10);
    assert!((p.progress - 4.0).abs() < 1e-9);
}

#[test]
fn multi_level_jump_reports_a_single_change() {
    let dash = dashboard();
    let change = dash.add_xp(1000).unwrap(); // 1120 -> level 5
    assert!(change.leveled_up);
    assert_eq!(change.old_level, 1);
    assert_eq!(change.new_level, 5);
}

#[test]
fn awards_are_additive() {
    let a = dashboard();
    a.add_xp(30).unwrap();
    a.add_xp(45).unwrap();

    let b = dashboard();
    b.add_xp(75).unwrap();

    assert_eq!(a.profile().unwrap(), b.profile().unwrap());
}

#[test]
fn zero_award_changes_nothing() {
    let dash = dashboard();
    let change = dash.add_xp(0).unwrap();
    assert!(!change.leveled_up);
    assert_eq!(change.xp, 120);
}

#[test]
fn profile_listener_sees_each_award() {
    let dash = dashboard();
    let seen: Arc<Mutex<Vec<ContributorProfile>>> = Arc::default();
    let sink = seen.clone();
    let sub = dash
        .listen_profile(move |p| sink.lock().unwrap().push(p))
        .unwrap();

    dash.add_xp(10).unwrap();
    dash.add_xp(200).unwrap();
    sub.unsubscribe();
    dash.add_xp(5).unwrap();

    let xps: Vec<u64> = seen.lock().unwrap().iter().map(|p| p.xp).collect();
    assert_eq!(xps, vec![120, 130, 330]);
}

// ----------------------- evolution ------------------------

#[test]
fn genesis_nft_walks_the_evolution_table() {
    let dash = dashboard();

    let nft = dash.evolve("nft1", "Shipped v1").unwrap().expect("nft1 exists");
    assert_eq!(nft.evolution_stages.len(), 3);
    let stage = nft.current_stage().unwrap();
    assert_eq!(stage.stage, 3);
    assert_eq!(stage.name, "Cosmic Insight");
    assert_eq!(stage.trigger_event, "Shipped v1");
    assert_eq!(stage.image_url, "https://picsum.photos/seed/nft1-s3/500");
    assert_eq!(nft.image_url, stage.image_url);
    assert!(stage.description.contains("radiates with cosmic energy."));

    dash.evolve("nft1", "a").unwrap();
    let nft = dash.evolve("nft1", "b").unwrap().unwrap();
    assert_eq!(nft.current_stage().unwrap().name, "Nebula Weaver");

    // the table plateaus on its last entry
    let nft = dash.evolve("nft1", "c").unwrap().unwrap();
    let stage = nft.current_stage().unwrap();
    assert_eq!(stage.stage, 6);
    assert_eq!(stage.name, "Nebula Weaver");
}

#[test]
fn evolution_keeps_history_and_logs_it() {
    let dash = dashboard();
    let before = dash.nft("nft2").unwrap().unwrap();

    let after = dash.evolve("nft2", "Reviewed a PR").unwrap().unwrap();
    assert_eq!(after.evolution_stages[..1], before.evolution_stages[..]);
    assert_eq!(after.current_stage().unwrap().name, "Crystal Awakening");

    let latest = &dash.timeline(Some(1)).unwrap()[0];
    assert_eq!(latest.kind, TimelineEventType::Evolution);
    assert_eq!(latest.title, "MeeBot Evolved!");
    assert_eq!(latest.description, "MeeBot #1337 reached Stage 2: Crystal Awakening!");
    assert_eq!(latest.nft_id.as_deref(), Some("nft2"));
}

#[test]
fn evolving_a_missing_nft_is_a_no_op() {
    let dash = dashboard();
    let events = dash.timeline(None).unwrap().len();
    assert!(dash.evolve("nope", "anything").unwrap().is_none());
    assert_eq!(dash.timeline(None).unwrap().len(), events);
}

#[test]
fn nft_listener_gets_initial_snapshot_then_updates() {
    let dash = dashboard();
    let stages: Arc<Mutex<Vec<usize>>> = Arc::default();
    let sink = stages.clone();
    let _sub = dash
        .listen::<Nft, _>(move |nfts| {
            let genesis = nfts.iter().find(|n| n.id == "nft1").map(|n| n.evolution_stages.len());
            sink.lock().unwrap().push(genesis.unwrap_or(0));
        })
        .unwrap();

    dash.evolve("nft1", "one").unwrap();
    assert_eq!(*stages.lock().unwrap(), vec![2, 3]);
}

// ----------------------- derivations ----------------------

#[test]
fn level_boundaries() {
    assert_eq!(calculate_profile(0).level, 1);
    assert_eq!(calculate_profile(249).level, 1);

    let at = calculate_profile(250);
    assert_eq!((at.level, at.level_xp, at.next_level_xp), (2, 250, 500));
    assert_eq!(at.progress, 0.0);

    let p = calculate_profile(120);
    assert_eq!((p.level, p.level_xp, p.next_level_xp), (1, 0, 250));
}

#[test]
fn derived_fields_stay_consistent() {
    for xp in (0..5000).step_by(7) {
        let p = calculate_profile(xp);
        assert!(p.level >= 1);
        assert!(p.level_xp <= xp && xp < p.next_level_xp, "xp {xp}");
        assert_eq!(p.next_level_xp - p.level_xp, 250);
        assert!((0.0..100.0).contains(&p.progress), "xp {xp}");
    }
}

#[test]
fn profile_math_holds_at_the_top_of_the_range() {
    let p = calculate_profile(u64::MAX);
    assert_eq!(p.level, u64::MAX / 250 + 1);
    assert_eq!(p.level_xp, u64::MAX - u64::MAX % 250);
    assert_eq!(p.next_level_xp, u64::MAX);
    assert!((0.0..100.0).contains(&p.progress));

    assert_eq!(calculate_profile_with(u64::MAX, 1).level, u64::MAX);
}

#[test]
fn huge_award_saturates_and_leaves_the_store_usable() {
    let dash = dashboard();
    let change = dash.add_xp(u64::MAX).unwrap();
    assert_eq!(change.xp, u64::MAX);
    assert!(change.leveled_up);

    // a second award saturates again instead of wrapping
    assert_eq!(dash.add_xp(10).unwrap().xp, u64::MAX);
    assert_eq!(dash.profile().unwrap().xp, u64::MAX);
    assert_eq!(dash.badges().unwrap().len(), 3);
}

#[test]
fn zero_level_size_is_clamped() {
    assert_eq!(calculate_profile_with(10, 0).level, 11);
}

#[test]
fn next_stage_after_birth_is_crystal_awakening() {
    let mut nft = Nft::minted("MeeBot #7", "https://img/7", Rarity::Common, "fresh", None, Network::Testnet);
    nft.id = "nft7".to_string();

    let stage = next_stage(&nft, "Claimed badge", Utc::now());
    assert_eq!(stage.stage, 2);
    assert_eq!(stage.name, "Crystal Awakening");
    assert_eq!(stage.image_url, "https://picsum.photos/seed/nft7-s2/500");
    assert_eq!(
        stage.description,
        "Triggered by \"Claimed badge\", the MeeBot now gained wisdom in governance."
    );
    assert_eq!(stage.trigger_event, "Claimed badge");
}

#[test]
fn table_plateaus_on_its_last_entry() {
    let last = &EVOLUTION_TABLE[EVOLUTION_TABLE.len() - 1];
    assert_eq!(entry_for_stage(5), last);
    assert_eq!(entry_for_stage(40), last);
    // stages below 2 never occur but still resolve
    assert_eq!(entry_for_stage(0).name, "Crystal Awakening");
    assert_eq!(entry_for_stage(1).name, "Crystal Awakening");
}
