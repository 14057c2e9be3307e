//! HTTP route handlers for the web application.
//!
//! Pages (article list, search, favorites, article view), the form actions
//! that mutate the annotation store, the AI and speech actions, and exports.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Local;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::export::{export_csv, export_pdf, sheet_rows};
use crate::highlight::{highlight_text, render_segments_html};
use crate::models::{AnnotationForm, Article, HighlightColor, HighlightForm, QuestionForm, TextResponse};
use crate::speech::prepare_for_speech;
use crate::store::explanation_key;
use crate::templates::{
    article_list_html, article_path, base_html, html_escape, render_article_page,
    source_selector_html, ArticleView,
};
use crate::AppState;

type ArticlePath = Path<(String, String)>;

fn back_to(source: &str, number: &str) -> Redirect {
    Redirect::to(&article_path(source, number))
}

// ============================================================================
// Index Handler
// ============================================================================

pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let mut notice = String::new();

    if state.articles().is_empty() {
        match state
            .sheets
            .fetch_all_articles(&state.config.default_source, state.config.initial_articles)
            .await
        {
            Ok(loaded) => state.seed_articles(loaded),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load initial articles");
                notice = "<p class=\"error\">Falha ao carregar artigos iniciais.</p>".to_string();
            }
        }
    }

    let articles = state.articles();
    let favorites = state.store().favorites().to_vec();

    let html = format!(
        "<h1>Artigos</h1>{}{}",
        notice,
        article_list_html(&articles, &state.config.default_source, &favorites)
    );
    Html(base_html("Vademecum", &html, None))
}

// ============================================================================
// Browse Handler
// ============================================================================

const BROWSE_LIMIT: usize = 50;

#[derive(Deserialize)]
pub struct BrowseQuery {
    pub source: Option<String>,
}

pub async fn browse(
    Query(query): Query<BrowseQuery>,
    State(state): State<Arc<AppState>>,
) -> Html<String> {
    let mut notice = String::new();

    let sources = match state.sheets.list_sources().await {
        Ok(sources) => sources,
        Err(e) => {
            tracing::warn!(error = %e, "failed to list sources");
            notice.push_str("<p class=\"error\">Falha ao carregar a lista de leis.</p>");
            Vec::new()
        }
    };

    let selected = query
        .source
        .filter(|s| !s.trim().is_empty())
        .or_else(|| sources.first().map(|s| s.title.clone()))
        .unwrap_or_else(|| state.config.default_source.clone());

    let articles = match state.sheets.fetch_all_articles(&selected, BROWSE_LIMIT).await {
        Ok(articles) => articles,
        Err(e) => {
            tracing::warn!(error = %e, source = %selected, "failed to load articles");
            notice.push_str("<p class=\"error\">Falha ao carregar os artigos.</p>");
            Vec::new()
        }
    };

    let favorites = state.store().favorites().to_vec();
    let html = format!(
        "<h1>Navegar: {}</h1>{}{}{}",
        html_escape(&selected),
        source_selector_html(&sources, &selected),
        notice,
        article_list_html(&articles, &selected, &favorites)
    );
    Html(base_html("Navegar", &html, None))
}

// ============================================================================
// Search Handler
// ============================================================================

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub async fn search(
    Query(query): Query<SearchQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let q = query.q.unwrap_or_default().trim().to_string();

    if q.is_empty() {
        return Html(base_html(
            "Buscar",
            "<p>Digite o número de um artigo.</p>",
            None,
        ))
        .into_response();
    }

    // Overlapping searches are not coordinated; whichever finishes last is what
    // the reader sees.
    match state.sheets.search_article(&q).await {
        Ok(Some(article)) => {
            let target = article_path(article.source_or(&state.config.default_source), &article.number);
            state.remember_article(article);
            Redirect::to(&target).into_response()
        }
        Ok(None) => {
            let html = format!(
                "<h1>Artigo não encontrado</h1><p>Artigo {} não encontrado em nenhuma lei.</p>",
                html_escape(&q)
            );
            (StatusCode::NOT_FOUND, Html(base_html("Não encontrado", &html, Some(&q)))).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, query = %q, "article search failed");
            let html = "<h1>Erro na busca</h1><p class=\"error\">Ocorreu um erro ao buscar o artigo.</p>";
            (StatusCode::BAD_GATEWAY, Html(base_html("Erro na busca", html, Some(&q)))).into_response()
        }
    }
}

// ============================================================================
// Favorites
// ============================================================================

/// Favorite articles with their text: from the loaded list when possible,
/// otherwise searched for. Articles that cannot be fetched are skipped.
async fn favorite_articles(state: &AppState) -> Vec<Article> {
    let favorites = state.store().favorites().to_vec();
    let loaded = state.articles();

    let mut articles = Vec::with_capacity(favorites.len());
    for number in favorites {
        if let Some(article) = loaded.iter().find(|a| a.number == number) {
            articles.push(article.clone());
            continue;
        }
        match state.sheets.search_article(&number).await {
            Ok(Some(article)) => {
                state.remember_article(article.clone());
                articles.push(article);
            }
            Ok(None) => tracing::debug!(article = %number, "favorite no longer found"),
            Err(e) => tracing::warn!(article = %number, error = %e, "failed to fetch favorite"),
        }
    }
    articles
}

pub async fn favorites(State(state): State<Arc<AppState>>) -> Html<String> {
    let articles = favorite_articles(&state).await;
    let favorites = state.store().favorites().to_vec();
    let html = format!(
        "<h1>Favoritos</h1>{}",
        article_list_html(&articles, &state.config.default_source, &favorites)
    );
    Html(base_html("Favoritos", &html, None))
}

// ============================================================================
// Article Page
// ============================================================================

pub async fn view_article(
    Path((source, number)): ArticlePath,
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>> {
    let article = state
        .load_article(&source, &number)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Artigo {} não encontrado em {}", number, source)))?;

    let playing = state.playback().now_playing() == Some(number.as_str());

    let content = {
        let store = state.store();
        let spans = store.highlights(&number);
        let segments = highlight_text(&article.text, spans);
        let view = ArticleView {
            article: &article,
            source: &source,
            body_html: render_segments_html(&segments),
            favorite: store.is_favorite(&number),
            annotation: store.annotation(&number),
            highlights: spans,
            images: store.images(&number),
            audios: store.audios(&number),
            explanation: store.cached_explanation(&number, article.source.as_deref()),
            playing,
        };
        render_article_page(&view)
    };

    Ok(Html(base_html(&format!("Artigo {}", number), &content, None)))
}

// ============================================================================
// Store Mutations
// ============================================================================

pub async fn toggle_favorite(
    Path((source, number)): ArticlePath,
    State(state): State<Arc<AppState>>,
) -> Redirect {
    state.store().toggle_favorite(&number);
    back_to(&source, &number)
}

pub async fn save_annotation(
    Path((source, number)): ArticlePath,
    State(state): State<Arc<AppState>>,
    Form(form): Form<AnnotationForm>,
) -> Redirect {
    state.store().save_annotation(&number, &form.text);
    tracing::info!(article = %number, "annotation saved");
    back_to(&source, &number)
}

pub async fn add_highlight(
    Path((source, number)): ArticlePath,
    State(state): State<Arc<AppState>>,
    Form(form): Form<HighlightForm>,
) -> Result<Redirect> {
    if form.text.trim().is_empty() {
        return Err(AppError::BadRequest("Trecho vazio".to_string()));
    }
    let color = form.color.map(HighlightColor::from).unwrap_or_default();
    state.store().add_highlight(&number, &form.text, color);
    Ok(back_to(&source, &number))
}

pub async fn remove_highlight(
    Path((source, number)): ArticlePath,
    State(state): State<Arc<AppState>>,
    Form(form): Form<HighlightForm>,
) -> Redirect {
    state.store().remove_highlight(&number, &form.text);
    back_to(&source, &number)
}

/// Read the uploaded `file` field as a data URI, checking its media type.
async fn read_upload(mut multipart: Multipart, expected_type: &str) -> Result<String> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let mime = field.content_type().unwrap_or("").to_string();
        if !mime.starts_with(expected_type) {
            return Err(AppError::BadRequest(format!(
                "Tipo de arquivo não suportado: {}",
                mime
            )));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Arquivo vazio".to_string()));
        }
        return Ok(format!("data:{};base64,{}", mime, STANDARD.encode(&bytes)));
    }
    Err(AppError::BadRequest("Nenhum arquivo enviado".to_string()))
}

pub async fn add_image(
    Path((source, number)): ArticlePath,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Redirect> {
    let data_uri = read_upload(multipart, "image/").await?;
    state.store().add_image(&number, &data_uri);
    Ok(back_to(&source, &number))
}

pub async fn remove_image(
    Path((source, number, index)): Path<(String, String, usize)>,
    State(state): State<Arc<AppState>>,
) -> Redirect {
    state.store().remove_image(&number, index);
    back_to(&source, &number)
}

pub async fn add_audio(
    Path((source, number)): ArticlePath,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Redirect> {
    let data_uri = read_upload(multipart, "audio/").await?;
    state.store().add_audio(&number, &data_uri);
    Ok(back_to(&source, &number))
}

pub async fn remove_audio(
    Path((source, number, index)): Path<(String, String, usize)>,
    State(state): State<Arc<AppState>>,
) -> Redirect {
    state.store().remove_audio(&number, index);
    back_to(&source, &number)
}

// ============================================================================
// AI Actions
// ============================================================================

async fn require_article(state: &AppState, source: &str, number: &str) -> Result<Article> {
    state
        .load_article(source, number)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Artigo {} não encontrado em {}", number, source)))
}

pub async fn explain_article(
    Path((source, number)): ArticlePath,
    State(state): State<Arc<AppState>>,
) -> Result<Redirect> {
    let article = require_article(&state, &source, &number).await?;
    state.explanation_for(&article).await?;
    Ok(back_to(&source, &number))
}

pub async fn ask_question(
    Path((source, number)): ArticlePath,
    State(state): State<Arc<AppState>>,
    Form(form): Form<QuestionForm>,
) -> Result<Json<TextResponse>> {
    let article = require_article(&state, &source, &number).await?;
    let text = state
        .explainer
        .answer_question(&form.question, &article.text, &article.number, article.source.as_deref())
        .await?;
    Ok(Json(TextResponse { text }))
}

pub async fn auto_annotate(
    Path((source, number)): ArticlePath,
    State(state): State<Arc<AppState>>,
) -> Result<Json<TextResponse>> {
    let article = require_article(&state, &source, &number).await?;
    let text = state.explainer.auto_annotate(&article.text).await?;
    Ok(Json(TextResponse { text }))
}

// ============================================================================
// Speech
// ============================================================================

pub async fn play_article(
    Path((source, number)): ArticlePath,
    State(state): State<Arc<AppState>>,
) -> Result<Redirect> {
    let article = require_article(&state, &source, &number).await?;
    let prepared = prepare_for_speech(&article.text);

    match state.speech.synthesize(&prepared).await {
        Ok(audio) => state.playback().play(&number, &audio)?,
        Err(e) => {
            tracing::warn!(error = %e, "remote synthesis failed, using local speech");
            state.playback().speak_locally(&number, &prepared)?;
        }
    }
    Ok(back_to(&source, &number))
}

#[derive(Deserialize)]
pub struct StopForm {
    pub back: Option<String>,
}

pub async fn stop_audio(
    State(state): State<Arc<AppState>>,
    Form(form): Form<StopForm>,
) -> Redirect {
    state.playback().stop();
    // Only follow local paths
    match form.back {
        Some(back) if back.starts_with('/') && !back.starts_with("//") => Redirect::to(&back),
        _ => Redirect::to("/"),
    }
}

// ============================================================================
// Exports
// ============================================================================

fn attachment(content_type: &str, filename: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn safe_filename(number: &str) -> String {
    number
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

pub async fn export_article_pdf(
    Path((source, number)): ArticlePath,
    State(state): State<Arc<AppState>>,
) -> Result<Response> {
    let article = require_article(&state, &source, &number).await?;

    let mut explanations = HashMap::new();
    match state.explanation_for(&article).await {
        Ok(text) => {
            explanations.insert(explanation_key(&article.number, article.source.as_deref()), text);
        }
        Err(e) => tracing::warn!(error = %e, "exporting without explanation"),
    }

    let bytes = export_pdf(&[article], &explanations, Local::now().date_naive())?;
    Ok(attachment(
        "application/pdf",
        &format!("artigo-{}.pdf", safe_filename(&number)),
        bytes,
    ))
}

pub async fn export_favorites_pdf(State(state): State<Arc<AppState>>) -> Result<Response> {
    let articles = favorite_articles(&state).await;

    // Only explanations already cached; bulk export does not call the model.
    let explanations: HashMap<String, String> = {
        let store = state.store();
        articles
            .iter()
            .filter_map(|a| {
                let source = a.source.as_deref();
                store
                    .cached_explanation(&a.number, source)
                    .map(|text| (explanation_key(&a.number, source), text.to_string()))
            })
            .collect()
    };

    let bytes = export_pdf(&articles, &explanations, Local::now().date_naive())?;
    Ok(attachment("application/pdf", "favoritos.pdf", bytes))
}

pub async fn export_favorites_csv(State(state): State<Arc<AppState>>) -> Result<Response> {
    let articles = favorite_articles(&state).await;
    let rows = {
        let store = state.store();
        sheet_rows(&articles, &*store, Local::now().date_naive())
    };
    let bytes = export_csv(&rows)?;
    Ok(attachment("text/csv; charset=utf-8", "favoritos.csv", bytes))
}
