// src/store/fixtures.rs
//! Demo dataset used to seed a fresh store.

use serde_json::{Value, json};

use super::{Collection, DocumentStore, StoreError};

fn picsum(seed: &str, size: u32) -> String {
    format!("https://picsum.photos/seed/{seed}/{size}")
}

fn profile() -> Value {
    json!({ "xp": 120, "level": 1, "levelXp": 0, "nextLevelXp": 250, "progress": 48.0 })
}

fn nfts() -> Vec<(&'static str, Value)> {
    vec![
        (
            "nft1",
            json!({
                "name": "Genesis Contributor",
                "imageUrl": picsum("nft1-s2", 500),
                "rarity": "Legendary",
                "description": "Awarded to the first 100 contributors to the MeeChain protocol.",
                "txHash": "0xabc...def",
                "network": "testnet",
                "evolutionStages": [
                    {
                        "stage": 1,
                        "name": "Birth of Genesis",
                        "imageUrl": picsum("nft1-s1", 500),
                        "description": "The first spark of contribution, bringing the Genesis MeeBot to life.",
                        "timestamp": "2023-08-10T10:00:00Z",
                        "triggerEvent": "Initial Contribution"
                    },
                    {
                        "stage": 2,
                        "name": "Crystal Awakening",
                        "imageUrl": picsum("nft1-s2", 500),
                        "description": "After earning the \"First Proposal\" badge, a shimmering crystal appeared, signifying its growing wisdom in governance.",
                        "timestamp": "2023-09-01T11:05:00Z",
                        "triggerEvent": "Earned \"First Proposal\" Badge"
                    }
                ]
            }),
        ),
        (
            "nft2",
            json!({
                "name": "MeeBot #1337",
                "imageUrl": picsum("meebot1337", 500),
                "rarity": "Rare",
                "description": "A freshly minted MeeBot, ready for adventure.",
                "txHash": "0x123...456",
                "network": "testnet",
                "evolutionStages": [
                    {
                        "stage": 1,
                        "name": "Birth of MeeBot #1337",
                        "imageUrl": picsum("meebot1337", 500),
                        "description": "A freshly minted MeeBot, ready for adventure.",
                        "timestamp": "2023-09-20T12:00:00Z",
                        "triggerEvent": "Minted"
                    }
                ]
            }),
        ),
    ]
}

fn badges() -> Vec<(&'static str, Value)> {
    [
        ("badge1", "First Proposal", "For creating your first governance proposal."),
        ("badge2", "Code Contributor", "For merging your first pull request."),
        ("badge3", "Bug Squasher", "For successfully closing a bug-related issue."),
    ]
    .into_iter()
    .map(|(id, name, description)| {
        (
            id,
            json!({ "name": name, "imageUrl": picsum(id, 300), "description": description }),
        )
    })
    .collect()
}

fn proposals() -> Vec<(&'static str, Value)> {
    vec![
        (
            "prop1",
            json!({
                "title": "Q3 Protocol Upgrade",
                "status": "Active",
                "summary": "Proposal to implement the latest ZK-rollup technology for enhanced privacy and scalability.",
                "votesFor": 1250,
                "votesAgainst": 150
            }),
        ),
        (
            "prop2",
            json!({
                "title": "Community Grant for Dev Tools",
                "status": "Passed",
                "summary": "A grant to fund the development of open-source tools for MeeChain builders.",
                "votesFor": 2800,
                "votesAgainst": 50
            }),
        ),
        (
            "prop3",
            json!({
                "title": "Adjust Validator Rewards",
                "status": "Failed",
                "summary": "A proposal to decrease validator rewards to fund a new treasury initiative.",
                "votesFor": 400,
                "votesAgainst": 1100
            }),
        ),
    ]
}

fn timeline() -> Vec<(&'static str, Value)> {
    vec![
        (
            "t1",
            json!({
                "type": "Mint",
                "title": "Minted Genesis Contributor NFT",
                "description": "Your very first MeeBot companion was born!",
                "timestamp": "2023-08-10T10:00:00Z",
                "imageUrl": picsum("nft1-s1", 500),
                "txHash": "0xabc...def",
                "nftId": "nft1"
            }),
        ),
        (
            "t2",
            json!({
                "type": "Commit",
                "title": "First Commit to MeeChain Core",
                "description": "Pushed commit `feat: add initial UI components` to the main repository.",
                "timestamp": "2023-08-15T14:30:00Z"
            }),
        ),
        (
            "t3",
            json!({
                "type": "Badge",
                "title": "Earned \"Code Contributor\" Badge",
                "description": "Your first pull request was successfully merged.",
                "timestamp": "2023-08-16T09:00:00Z",
                "badgeName": "Code Contributor"
            }),
        ),
        (
            "t-evolution1",
            json!({
                "type": "Evolution",
                "title": "MeeBot Evolved!",
                "description": "Genesis Contributor reached Stage 2: Crystal Awakening, gaining new wisdom.",
                "timestamp": "2023-09-01T11:05:00Z",
                "imageUrl": picsum("nft1-s2", 500),
                "nftId": "nft1"
            }),
        ),
        (
            "t4",
            json!({
                "type": "MoodAnalysis",
                "title": "MeeBot Mood Analysis",
                "description": "Your recent flurry of activity around governance shows a strong sense of leadership.",
                "timestamp": "2023-09-05T18:00:00Z",
                "mood": "joyful",
                "context": "Active participation in proposal voting."
            }),
        ),
    ]
}

fn designs() -> Vec<(&'static str, Value)> {
    vec![
        (
            "d1",
            json!({
                "prompt": "a happy MeeBot floating in a sea of stars",
                "imageUrl": picsum("design1", 512),
                "status": "minted",
                "timestamp": "2023-08-20T11:00:00Z"
            }),
        ),
        (
            "d2",
            json!({
                "prompt": "a wise MeeBot reading an ancient book",
                "imageUrl": picsum("design2", 512),
                "status": "generated",
                "timestamp": "2023-08-22T15:20:00Z"
            }),
        ),
    ]
}

fn voice_logs() -> Vec<(&'static str, Value)> {
    vec![
        (
            "vl1",
            json!({
                "timestamp": "2023-09-10T10:00:00Z",
                "mood": "thoughtful",
                "quote": "Every line of code is a step towards a more decentralized future.",
                "network": "testnet"
            }),
        ),
        (
            "vl2",
            json!({
                "timestamp": "2023-09-12T15:30:00Z",
                "mood": "joyful",
                "quote": "Collaboration is the spark that ignites innovation!",
                "network": "testnet"
            }),
        ),
        (
            "vl3",
            json!({
                "timestamp": "2023-09-15T09:00:00Z",
                "mood": "curious",
                "quote": "What new wonders will we build together today?",
                "network": "mainnet"
            }),
        ),
    ]
}

fn put_all(
    store: &dyn DocumentStore,
    collection: Collection,
    owner: &str,
    docs: Vec<(&'static str, Value)>,
) -> Result<(), StoreError> {
    for (id, data) in docs {
        store.put(collection, owner, id, data)?;
    }
    Ok(())
}

/// Write the full demo dataset for `owner`, including shared proposals.
pub fn seed(store: &dyn DocumentStore, owner: &str) -> Result<(), StoreError> {
    put_all(store, Collection::Proposals, owner, proposals())?;
    seed_owner(store, owner)
}

fn seed_owner(store: &dyn DocumentStore, owner: &str) -> Result<(), StoreError> {
    store.put(
        Collection::Profile,
        owner,
        crate::services::ledger::PROFILE_DOC_ID,
        profile(),
    )?;
    put_all(store, Collection::Nfts, owner, nfts())?;
    put_all(store, Collection::Badges, owner, badges())?;
    put_all(store, Collection::Timeline, owner, timeline())?;
    put_all(store, Collection::Designs, owner, designs())?;
    put_all(store, Collection::VoiceLogs, owner, voice_logs())?;
    Ok(())
}

/// Seed only what is missing: shared proposals when none exist, and the
/// owner's records when the owner has neither a profile nor any NFTs.
/// Returns whether the owner's records were written.
pub fn seed_if_empty(store: &dyn DocumentStore, owner: &str) -> Result<bool, StoreError> {
    if store.is_empty(Collection::Proposals, owner)? {
        put_all(store, Collection::Proposals, owner, proposals())?;
    }
    if store.is_empty(Collection::Profile, owner)? && store.is_empty(Collection::Nfts, owner)? {
        seed_owner(store, owner)?;
        tracing::info!(owner, backend = store.name(), "seeded demo dataset");
        return Ok(true);
    }
    Ok(false)
}
