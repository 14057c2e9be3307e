//! Vademecum library - re-exports for testing and external use.
//!
//! A legal-reference reader: articles come from a spreadsheet, and the
//! reader's favorites, annotations, highlights and attachments are kept in a
//! local key-value store.

use std::sync::{Mutex, MutexGuard};

pub mod config;
pub mod error;
pub mod explain;
pub mod export;
pub mod handlers;
pub mod highlight;
pub mod models;
pub mod sheets;
pub mod speech;
pub mod storage;
pub mod store;
pub mod templates;

use config::Config;
use error::Result;
use explain::ExplanationClient;
use models::Article;
use sheets::SheetsClient;
use speech::{CommandOutput, PlaybackSession, SpeechClient};
use storage::SledStorage;
use store::AnnotationStore;

// ============================================================================
// Application State
// ============================================================================

pub struct AppState {
    pub config: Config,
    pub sheets: SheetsClient,
    pub explainer: ExplanationClient,
    pub speech: SpeechClient,
    store: Mutex<AnnotationStore<SledStorage>>,
    playback: Mutex<PlaybackSession<CommandOutput>>,
    /// Articles loaded so far, most recent first.
    articles: Mutex<Vec<Article>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let storage = SledStorage::open(config.data_dir.join("store"))?;
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: Config, storage: SledStorage) -> Result<Self> {
        Ok(Self {
            sheets: SheetsClient::new(&config)?,
            explainer: ExplanationClient::new(&config)?,
            speech: SpeechClient::new(&config)?,
            store: Mutex::new(AnnotationStore::open(storage)),
            playback: Mutex::new(PlaybackSession::new(CommandOutput::new(&config))),
            articles: Mutex::new(Vec::new()),
            config,
        })
    }

    pub fn store(&self) -> MutexGuard<'_, AnnotationStore<SledStorage>> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn playback(&self) -> MutexGuard<'_, PlaybackSession<CommandOutput>> {
        self.playback.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn articles(&self) -> Vec<Article> {
        self.articles.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Keep an article in the loaded list, moving it to the front. A newer
    /// fetch replaces an older copy with the same identity.
    pub fn remember_article(&self, article: Article) {
        let mut articles = self.articles.lock().unwrap_or_else(|e| e.into_inner());
        articles.retain(|a| !a.same_identity(&article));
        articles.insert(0, article);
    }

    /// Replace the loaded list if nothing has been loaded yet.
    pub fn seed_articles(&self, loaded: Vec<Article>) {
        let mut articles = self.articles.lock().unwrap_or_else(|e| e.into_inner());
        if articles.is_empty() {
            *articles = loaded;
        }
    }

    /// Article from the loaded list, or fetched from its source.
    pub async fn load_article(&self, source: &str, number: &str) -> Result<Option<Article>> {
        let known = self
            .articles()
            .into_iter()
            .find(|a| a.number == number && a.source_or(&self.config.default_source) == source);
        if let Some(article) = known {
            return Ok(Some(article));
        }

        let fetched = self.sheets.fetch_article(number, source).await?;
        if let Some(article) = &fetched {
            self.remember_article(article.clone());
        }
        Ok(fetched)
    }

    /// Cached explanation for the article, asking the model only on a miss.
    pub async fn explanation_for(&self, article: &Article) -> Result<String> {
        let source = article.source.as_deref();
        let cached = self
            .store()
            .cached_explanation(&article.number, source)
            .map(|s| s.to_string());
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let text = self
            .explainer
            .explain(&article.text, &article.number, source)
            .await?;
        self.store()
            .set_cached_explanation(&article.number, source, &text);
        Ok(text)
    }
}

// Re-export commonly used types
pub use error::{AppError, StorageError};
pub use highlight::{highlight_text, render_segments_html, Segment};
pub use models::{HighlightColor, HighlightSpan, SourceInfo};
pub use storage::{KeyValueStorage, MemoryStorage};
