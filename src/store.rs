//! Persisted annotation store.
//!
//! Holds every piece of user-generated, per-article state (favorites,
//! annotations, highlights, attached images and audio clips, cached
//! explanations). Each slice is rehydrated from the storage backend when the
//! store opens and written back in full after every mutation that changes it.
//!
//! Persistence is best effort: a failed write is logged and the in-memory
//! change stands.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{HighlightColor, HighlightSpan};
use crate::storage::{
    KeyValueStorage, ANNOTATIONS_KEY, AUDIOS_KEY, EXPLANATIONS_KEY, FAVORITES_KEY, HIGHLIGHTS_KEY,
    IMAGES_KEY,
};

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

/// Cache key for an explanation: `"{number}-{source}"`, empty source allowed.
pub fn explanation_key(number: &str, source: Option<&str>) -> String {
    format!("{}-{}", number, source.unwrap_or(""))
}

pub struct AnnotationStore<S: KeyValueStorage> {
    backend: S,
    favorites: Vec<String>,
    annotations: BTreeMap<String, String>,
    highlights: BTreeMap<String, Vec<HighlightSpan>>,
    images: BTreeMap<String, Vec<String>>,
    audios: BTreeMap<String, Vec<String>>,
    explanations: BTreeMap<String, String>,
}

impl<S: KeyValueStorage> AnnotationStore<S> {
    /// Open the store, reading every slice from `backend`. Missing or
    /// unreadable slices start empty.
    pub fn open(backend: S) -> Self {
        let favorites = load_slice(&backend, FAVORITES_KEY);
        let annotations = load_slice(&backend, ANNOTATIONS_KEY);
        let highlights = load_slice(&backend, HIGHLIGHTS_KEY);
        let images = load_slice(&backend, IMAGES_KEY);
        let audios = load_slice(&backend, AUDIOS_KEY);
        let explanations = load_slice(&backend, EXPLANATIONS_KEY);

        Self {
            backend,
            favorites,
            annotations,
            highlights,
            images,
            audios,
            explanations,
        }
    }

    // ------------------------------------------------------------------------
    // Favorites
    // ------------------------------------------------------------------------

    pub fn favorites(&self) -> &[String] {
        &self.favorites
    }

    pub fn is_favorite(&self, number: &str) -> bool {
        self.favorites.iter().any(|n| n == number)
    }

    /// Flip membership and return whether the article is now a favorite.
    pub fn toggle_favorite(&mut self, number: &str) -> bool {
        let now_favorite = if self.is_favorite(number) {
            self.favorites.retain(|n| n != number);
            false
        } else {
            self.favorites.push(number.to_string());
            true
        };
        persist(&self.backend, FAVORITES_KEY, &self.favorites);
        tracing::debug!(article = number, favorite = now_favorite, "toggled favorite");
        now_favorite
    }

    // ------------------------------------------------------------------------
    // Annotations
    // ------------------------------------------------------------------------

    pub fn annotation(&self, number: &str) -> Option<&str> {
        self.annotations.get(number).map(|s| s.as_str())
    }

    pub fn save_annotation(&mut self, number: &str, text: &str) {
        self.annotations.insert(number.to_string(), text.to_string());
        persist(&self.backend, ANNOTATIONS_KEY, &self.annotations);
    }

    // ------------------------------------------------------------------------
    // Highlights
    // ------------------------------------------------------------------------

    pub fn highlights(&self, number: &str) -> &[HighlightSpan] {
        self.highlights
            .get(number)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Append a span unless one with the same literal text already exists.
    pub fn add_highlight(&mut self, number: &str, text: &str, color: HighlightColor) {
        let spans = self.highlights.entry(number.to_string()).or_default();
        if spans.iter().any(|h| h.text == text) {
            return;
        }
        spans.push(HighlightSpan::new(text, color));
        persist(&self.backend, HIGHLIGHTS_KEY, &self.highlights);
    }

    pub fn remove_highlight(&mut self, number: &str, text: &str) {
        let Some(spans) = self.highlights.get_mut(number) else {
            return;
        };
        let Some(pos) = spans.iter().position(|h| h.text == text) else {
            return;
        };
        spans.remove(pos);
        persist(&self.backend, HIGHLIGHTS_KEY, &self.highlights);
    }

    // ------------------------------------------------------------------------
    // Media
    // ------------------------------------------------------------------------

    pub fn images(&self, number: &str) -> &[String] {
        self.images.get(number).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn add_image(&mut self, number: &str, data_uri: &str) {
        push_media(&mut self.images, number, data_uri);
        persist(&self.backend, IMAGES_KEY, &self.images);
    }

    pub fn remove_image(&mut self, number: &str, index: usize) {
        if remove_media(&mut self.images, number, index) {
            persist(&self.backend, IMAGES_KEY, &self.images);
        }
    }

    pub fn audios(&self, number: &str) -> &[String] {
        self.audios.get(number).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn add_audio(&mut self, number: &str, data_uri: &str) {
        push_media(&mut self.audios, number, data_uri);
        persist(&self.backend, AUDIOS_KEY, &self.audios);
    }

    pub fn remove_audio(&mut self, number: &str, index: usize) {
        if remove_media(&mut self.audios, number, index) {
            persist(&self.backend, AUDIOS_KEY, &self.audios);
        }
    }

    // ------------------------------------------------------------------------
    // Explanation Cache
    // ------------------------------------------------------------------------

    pub fn cached_explanation(&self, number: &str, source: Option<&str>) -> Option<&str> {
        self.explanations
            .get(&explanation_key(number, source))
            .map(|s| s.as_str())
    }

    pub fn set_cached_explanation(&mut self, number: &str, source: Option<&str>, text: &str) {
        self.explanations
            .insert(explanation_key(number, source), text.to_string());
        persist(&self.backend, EXPLANATIONS_KEY, &self.explanations);
    }
}

fn push_media(slice: &mut BTreeMap<String, Vec<String>>, number: &str, data_uri: &str) {
    slice
        .entry(number.to_string())
        .or_default()
        .push(data_uri.to_string());
}

/// Returns true when something was removed.
fn remove_media(slice: &mut BTreeMap<String, Vec<String>>, number: &str, index: usize) -> bool {
    match slice.get_mut(number) {
        Some(items) if index < items.len() => {
            items.remove(index);
            true
        }
        _ => false,
    }
}

fn load_slice<S: KeyValueStorage, T: DeserializeOwned + Default>(backend: &S, key: &str) -> T {
    match backend.get(key) {
        Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "discarding unreadable stored slice");
            T::default()
        }),
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read stored slice");
            T::default()
        }
    }
}

fn persist<S: KeyValueStorage, T: Serialize>(backend: &S, key: &str, value: &T) {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to serialize slice");
            return;
        }
    };
    if let Err(e) = backend.set(key, &json) {
        tracing::warn!(key, error = %e, "failed to persist slice, keeping in-memory state");
    }
}
