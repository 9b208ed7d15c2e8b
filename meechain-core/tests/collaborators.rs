use std::time::Duration;

use serde_json::json;

use meechain_core::models::{Mood, Network, Nft, Rarity, NewTimelineEvent, TimelineEventType};
use meechain_core::services::collaborators::{
    ChainPayload, ChainWriter, ContentAddressedPinner, KeywordClassifier, MetadataPinner,
    MoodClassifier, SimulatedChain, coerce_mood, placeholder_image, random_tx_hash,
};

// ----------------------- models ---------------------------

#[test]
fn mood_parse_is_lenient_but_closed() {
    assert_eq!(Mood::parse("  Joyful.\n"), Some(Mood::Joyful));
    assert_eq!(Mood::parse("CELEBRATORY!"), Some(Mood::Celebratory));
    assert_eq!(Mood::parse("angry"), None);
    assert_eq!(Mood::parse(""), None);
}

#[test]
fn minted_nft_starts_at_birth_stage() {
    let nft = Nft::minted("MeeBot #42", "https://img/42", Rarity::Rare, "fresh", None, Network::Testnet);
    assert_eq!(nft.evolution_stages.len(), 1);
    let birth = &nft.evolution_stages[0];
    assert_eq!(birth.stage, 1);
    assert_eq!(birth.name, "Birth of MeeBot #42");
    assert_eq!(birth.trigger_event, "Minted");
    assert_eq!(birth.image_url, nft.image_url);
    assert_eq!(nft.minted_at(), Some(birth.timestamp));
}

#[test]
fn timeline_event_serializes_type_tag_and_skips_empty_optionals() {
    let ev = NewTimelineEvent::new(TimelineEventType::MoodAnalysis, "t", "d")
        .mood(Mood::Curious)
        .stamp(chrono::Utc::now());
    let v = serde_json::to_value(&ev).expect("serialize");
    assert_eq!(v["type"], "MoodAnalysis");
    assert_eq!(v["mood"], "curious");
    assert!(v.get("imageUrl").is_none());
    assert!(v.get("nftId").is_none());
}

// ----------------------- collaborators --------------------

#[test]
fn tx_hash_shape() {
    let h = random_tx_hash();
    assert_eq!(h.len(), 66);
    assert!(h.starts_with("0x"));
    assert!(h[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_ne!(h, random_tx_hash());
}

#[test]
fn placeholder_is_deterministic_and_encoded() {
    let a = placeholder_image("a wise MeeBot");
    assert_eq!(a, "https://picsum.photos/seed/a%20wise%20MeeBot/512");
    assert_eq!(a, placeholder_image("a wise MeeBot"));
}

#[test]
fn coerce_mood_defaults() {
    assert_eq!(coerce_mood(Ok("angry".into())), Mood::Curious);
    assert_eq!(coerce_mood(Ok(" Joyful\n".into())), Mood::Joyful);
    assert_eq!(coerce_mood(Err(anyhow::anyhow!("quota"))), Mood::Helpful);
}

#[tokio::test]
async fn keyword_classifier_picks_first_matching_mood() {
    let c = KeywordClassifier;
    assert_eq!(c.classify("a wise MeeBot reading an ancient book").await.unwrap(), "thoughtful");
    assert_eq!(c.classify("a happy MeeBot").await.unwrap(), "joyful");
    assert_eq!(c.classify("a crystal MeeBot with a flower").await.unwrap(), "curious");
}

#[tokio::test]
async fn pin_is_content_addressed() {
    let p = ContentAddressedPinner;
    let a = p.pin(&json!({ "name": "MeeBot #9001" })).await.unwrap();
    let b = p.pin(&json!({ "name": "MeeBot #9001" })).await.unwrap();
    let c = p.pin(&json!({ "name": "MeeBot #9002" })).await.unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.starts_with("ipfs://") && a.ends_with("/metadata.json"));
}

#[tokio::test(start_paused = true)]
async fn simulated_chain_waits_for_settle_delay() {
    let chain = SimulatedChain::new(Duration::from_millis(1800), Network::Mainnet);
    let start = tokio::time::Instant::now();
    let receipt = chain.submit(&ChainPayload::MintRandom).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(1800));
    assert_eq!(receipt.network, Network::Mainnet);
}
