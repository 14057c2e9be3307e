//! Tests for the persisted annotation store.
//!
//! Most tests run against `MemoryStorage`; reopening a store on a clone of
//! the same storage stands in for a page reload.

use super::*;
use crate::error::StorageError;
use crate::storage::{MemoryStorage, SledStorage};

// ============================================================================
// Helpers
// ============================================================================

fn fresh() -> (AnnotationStore<MemoryStorage>, MemoryStorage) {
    let storage = MemoryStorage::new();
    (AnnotationStore::open(storage.clone()), storage)
}

/// Backend whose writes always fail, reads report nothing stored.
struct FailingStorage;

impl KeyValueStorage for FailingStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("quota exceeded".to_string()))
    }
}

// ============================================================================
// Favorites
// ============================================================================

#[test]
fn test_toggle_favorite_twice_restores_status() {
    let (mut store, _) = fresh();
    assert!(!store.is_favorite("5"));
    assert!(store.toggle_favorite("5"));
    assert!(store.is_favorite("5"));
    assert!(!store.toggle_favorite("5"));
    assert!(!store.is_favorite("5"));
}

#[test]
fn test_favorites_keep_insertion_order() {
    let (mut store, storage) = fresh();
    store.toggle_favorite("10");
    store.toggle_favorite("2");
    store.toggle_favorite("7");
    store.toggle_favorite("2");
    assert_eq!(store.favorites(), ["10".to_string(), "7".to_string()]);
    assert_eq!(
        storage.get(FAVORITES_KEY).unwrap().as_deref(),
        Some(r#"["10","7"]"#)
    );
}

// ============================================================================
// Annotations
// ============================================================================

#[test]
fn test_annotation_survives_reopen() {
    let (mut store, storage) = fresh();
    store.save_annotation("5", "nota");

    let reopened = AnnotationStore::open(storage);
    assert_eq!(reopened.annotation("5"), Some("nota"));
}

#[test]
fn test_annotation_overwrite_and_empty_value() {
    let (mut store, _) = fresh();
    assert_eq!(store.annotation("1"), None);
    store.save_annotation("1", "primeira");
    store.save_annotation("1", "segunda");
    assert_eq!(store.annotation("1"), Some("segunda"));
    store.save_annotation("1", "");
    assert_eq!(store.annotation("1"), Some(""));
}

// ============================================================================
// Highlights
// ============================================================================

#[test]
fn test_duplicate_highlight_is_ignored_then_removed() {
    let (mut store, _) = fresh();
    store.add_highlight("12", "vida", HighlightColor::Default);
    store.add_highlight("12", "vida", HighlightColor::Yellow);
    assert_eq!(store.highlights("12").len(), 1);
    assert_eq!(store.highlights("12")[0].color, HighlightColor::Default);

    store.remove_highlight("12", "vida");
    assert!(store.highlights("12").is_empty());
}

#[test]
fn test_highlight_duplicate_check_is_case_sensitive() {
    let (mut store, _) = fresh();
    store.add_highlight("3", "Vida", HighlightColor::Default);
    store.add_highlight("3", "vida", HighlightColor::Green);
    assert_eq!(store.highlights("3").len(), 2);

    store.remove_highlight("3", "VIDA");
    assert_eq!(store.highlights("3").len(), 2);
    store.remove_highlight("3", "Vida");
    assert_eq!(store.highlights("3"), [HighlightSpan::new("vida", HighlightColor::Green)]);
}

#[test]
fn test_remove_missing_highlight_does_not_write() {
    let (mut store, storage) = fresh();
    store.remove_highlight("99", "nada");
    assert_eq!(storage.get(HIGHLIGHTS_KEY).unwrap(), None);
}

#[test]
fn test_highlights_are_per_article() {
    let (mut store, storage) = fresh();
    store.add_highlight("1", "direito", HighlightColor::Blue);
    store.add_highlight("2", "direito", HighlightColor::Yellow);

    let reopened = AnnotationStore::open(storage);
    assert_eq!(reopened.highlights("1")[0].color, HighlightColor::Blue);
    assert_eq!(reopened.highlights("2")[0].color, HighlightColor::Yellow);
    assert!(reopened.highlights("3").is_empty());
}

// ============================================================================
// Media
// ============================================================================

#[test]
fn test_remove_image_out_of_range_is_noop() {
    let (mut store, _) = fresh();
    store.add_image("7", "data:image/png;base64,AAA");
    store.remove_image("7", 5);
    assert_eq!(store.images("7").len(), 1);
    store.remove_image("8", 0);
    assert!(store.images("8").is_empty());
}

#[test]
fn test_media_lists_are_ordered_and_separate() {
    let (mut store, storage) = fresh();
    store.add_image("4", "data:image/png;base64,A");
    store.add_image("4", "data:image/png;base64,B");
    store.add_image("4", "data:image/png;base64,C");
    store.add_audio("4", "data:audio/webm;base64,X");

    store.remove_image("4", 1);
    assert_eq!(
        store.images("4"),
        ["data:image/png;base64,A".to_string(), "data:image/png;base64,C".to_string()]
    );
    assert_eq!(store.audios("4").len(), 1);

    store.remove_audio("4", 0);
    let reopened = AnnotationStore::open(storage);
    assert!(reopened.audios("4").is_empty());
    assert_eq!(reopened.images("4").len(), 2);
}

// ============================================================================
// Explanation Cache
// ============================================================================

#[test]
fn test_explanation_cache_is_keyed_by_source() {
    let (mut store, storage) = fresh();
    store.set_cached_explanation("5", Some("CF88"), "igualdade");
    assert_eq!(store.cached_explanation("5", Some("CF88")), Some("igualdade"));
    assert_eq!(store.cached_explanation("5", None), None);
    assert_eq!(store.cached_explanation("5", Some("CC")), None);

    let json = storage.get(EXPLANATIONS_KEY).unwrap().unwrap();
    assert_eq!(json, r#"{"5-CF88":"igualdade"}"#);
}

// ============================================================================
// Rehydration and Failures
// ============================================================================

#[test]
fn test_rehydrates_existing_slices() {
    let storage = MemoryStorage::new();
    storage.set(FAVORITES_KEY, r#"["1","5"]"#).unwrap();
    storage
        .set(HIGHLIGHTS_KEY, r#"{"5":[{"text":"Art. 5","color":"highlighted"}]}"#)
        .unwrap();

    let store = AnnotationStore::open(storage);
    assert!(store.is_favorite("5"));
    assert_eq!(store.highlights("5")[0].text, "Art. 5");
    assert_eq!(store.highlights("5")[0].color, HighlightColor::Default);
}

#[test]
fn test_corrupt_slice_starts_empty() {
    let storage = MemoryStorage::new();
    storage.set(ANNOTATIONS_KEY, "{not json").unwrap();
    storage.set(FAVORITES_KEY, r#"["2"]"#).unwrap();

    let store = AnnotationStore::open(storage);
    assert_eq!(store.annotation("2"), None);
    assert!(store.is_favorite("2"));
}

#[test]
fn test_write_failure_keeps_memory_state() {
    let mut store = AnnotationStore::open(FailingStorage);
    store.save_annotation("1", "ainda aqui");
    store.add_highlight("1", "aqui", HighlightColor::Green);
    assert!(store.toggle_favorite("1"));

    assert_eq!(store.annotation("1"), Some("ainda aqui"));
    assert_eq!(store.highlights("1").len(), 1);
    assert!(store.is_favorite("1"));
}

#[test]
fn test_sled_backend_roundtrip() {
    let storage = SledStorage::temporary().unwrap();
    let mut store = AnnotationStore::open(storage.clone());
    store.save_annotation("5", "nota");
    store.toggle_favorite("5");

    let reopened = AnnotationStore::open(storage);
    assert_eq!(reopened.annotation("5"), Some("nota"));
    assert!(reopened.is_favorite("5"));
}
