//! End-to-end tests for memory insertion, retrieval, decay, and capacity.

use chrono::{Duration, Utc};
use serde_json::json;

use recall_core::memory::{relevance_score, tokenize};
use recall_core::{
    calculate_importance, MemoryEntry, MemoryManager, MemoryStore, MemoryType, NewMemory,
    RecallConfig, RetrievalQuery,
};

fn manager_with_capacity(max: usize) -> MemoryManager {
    MemoryManager::in_memory(RecallConfig::default().with_max_memories(max))
}

#[test]
fn test_duplicate_insert_merges() {
    let m = manager_with_capacity(1000);
    let kind = MemoryType::Preference;
    m.add_memory("User prefers dark mode", kind, NewMemory::default())
        .unwrap();
    let merged = m
        .add_memory("User prefers dark mode", kind, NewMemory::default())
        .unwrap();

    assert_eq!(m.stats().total_memories, 1);
    assert_eq!(merged.access_count, 2);
    assert!((merged.importance - 0.6).abs() < 1e-9);
}

#[test]
fn test_repeated_inserts_cap_importance_and_sum_accesses() {
    let m = manager_with_capacity(1000);
    let opts = NewMemory::default().with_importance(0.8);
    let mut last = None;
    for _ in 0..8 {
        let entry = m.add_memory("Uses NixOS", MemoryType::Fact, opts.clone());
        last = Some(entry.unwrap());
    }
    let last = last.unwrap();
    assert_eq!(last.access_count, 8);
    assert_eq!(last.importance, 1.0);
    assert_eq!(m.stats().total_memories, 1);
}

#[test]
fn test_capacity_keeps_top_ranked() {
    let m = manager_with_capacity(3);
    for (content, importance) in [
        ("weakest memory", 0.1),
        ("strongest memory", 0.9),
        ("middle memory", 0.5),
        ("second memory", 0.7),
        ("fourth memory", 0.3),
    ] {
        let opts = NewMemory::default().with_importance(importance);
        m.add_memory(content, MemoryType::Fact, opts).unwrap();
    }

    let listed = m.list_memories(None);
    assert_eq!(listed.len(), 3);
    let contents: Vec<&str> = listed.iter().map(|r| r.entry.content.as_str()).collect();
    assert_eq!(
        contents,
        vec!["strongest memory", "second memory", "middle memory"]
    );
}

#[test]
fn test_decayed_memory_excluded_by_default() {
    let m = manager_with_capacity(1000);
    let now = Utc::now();
    let mut stale = MemoryEntry::new("Team uses Jenkins pipelines", MemoryType::Fact, now);
    stale.last_accessed = now - Duration::days(60);

    let score = calculate_importance(&stale, now);
    assert!((score - 0.056).abs() < 0.001);

    assert!(m.import_memories(&json!({ "memories": [stale] }).to_string()));

    let hits = m
        .retrieve_memories(&RetrievalQuery::new("jenkins pipelines"))
        .unwrap();
    assert!(hits.is_empty());

    let everything = RetrievalQuery::new("jenkins pipelines").with_min_importance(0.0);
    let hits = m.retrieve_memories(&everything).unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn test_retrieval_order_and_reinforcement() {
    let now = Utc::now();
    let mut store = MemoryStore::new();
    for (content, kind, tags) in [
        ("rust async runtime tokio", MemoryType::Fact, vec![]),
        ("rust borrow checker errors", MemoryType::Correction, vec![]),
        ("prefers rust over golang", MemoryType::Preference, vec!["tokio"]),
        ("rust tokio async examples", MemoryType::Pattern, vec![]),
    ] {
        store.add(content, kind, NewMemory::default().with_tags(tags), now);
    }

    let query = RetrievalQuery::new("rust tokio async");
    let tokens = tokenize(&query.text);

    let before = store.clone();
    let first = store.retrieve(&query, now);
    assert_eq!(first.len(), 4);
    for pair in first.windows(2) {
        let a = before.get(&pair[0].id).unwrap();
        let b = before.get(&pair[1].id).unwrap();
        assert!(relevance_score(a, &tokens, now) >= relevance_score(b, &tokens, now));
    }

    let second = store.retrieve(&query, now);
    assert_eq!(second.len(), first.len());
    for hit in &second {
        let earlier = first.iter().find(|e| e.id == hit.id).unwrap();
        assert_eq!(hit.access_count, earlier.access_count + 1);
    }
}

#[test]
fn test_retrieval_persists_access_bookkeeping() {
    let m = manager_with_capacity(1000);
    m.add_memory("Deploys Fridays", MemoryType::Pattern, NewMemory::default())
        .unwrap();
    m.retrieve_memories(&RetrievalQuery::new("deploys fridays"))
        .unwrap();

    let json = m.export_memories().unwrap();
    let exported: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(exported["memories"][0]["access_count"], 2);
}

#[test]
fn test_forget_removes_single_entry() {
    let m = manager_with_capacity(1000);
    let keep = m
        .add_memory("keep me around", MemoryType::Fact, NewMemory::default())
        .unwrap();
    let drop = m
        .add_memory("forget me soon", MemoryType::Fact, NewMemory::default())
        .unwrap();
    m.forget(&drop.id).unwrap();
    let listed = m.list_memories(None);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].entry.id, keep.id);
}
