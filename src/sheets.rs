//! Article source backed by a spreadsheet.
//!
//! Each sheet of the spreadsheet is one legal text; column A holds the
//! article number and column B its text, with a header row on top.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{Article, SourceInfo};

pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    api_key: Option<String>,
}

impl SheetsClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.sheets_base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            api_key: config.google_api_key.clone(),
        })
    }

    pub async fn list_sources(&self) -> Result<Vec<SourceInfo>> {
        let url = format!("{}/v4/spreadsheets/{}", self.base_url, self.spreadsheet_id);
        let json = self.get_json(&url).await?;
        Ok(parse_sources(&json))
    }

    pub async fn fetch_article(&self, number: &str, source: &str) -> Result<Option<Article>> {
        let rows = self.fetch_rows(source).await?;
        let article = find_article(&rows, number, source);
        if article.is_none() {
            tracing::debug!(article = number, source, "article not in sheet");
        }
        Ok(article)
    }

    pub async fn fetch_all_articles(&self, source: &str, limit: usize) -> Result<Vec<Article>> {
        let rows = self.fetch_rows(source).await?;
        Ok(rows
            .iter()
            .skip(1)
            .take(limit)
            .map(|row| row_to_article(row, source))
            .collect())
    }

    /// Look for the article in every source, in sheet order; first hit wins.
    pub async fn search_article(&self, number: &str) -> Result<Option<Article>> {
        let sources = self.list_sources().await?;
        search_in_order(&sources, number, |source| async move {
            self.fetch_article(number, &source).await
        })
        .await
    }

    async fn fetch_rows(&self, source: &str) -> Result<Vec<Vec<String>>> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}!A:B",
            self.base_url,
            self.spreadsheet_id,
            urlencoding::encode(source)
        );
        let json = self.get_json(&url).await?;
        Ok(parse_rows(&json))
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("GOOGLE_API_KEY não definido".to_string()))?;
        if self.spreadsheet_id.is_empty() {
            return Err(AppError::Config(
                "VADEMECUM_SPREADSHEET_ID não definido".to_string(),
            ));
        }

        let response = self
            .http
            .get(url)
            .query(&[("key", api_key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, url, "spreadsheet request failed");
            return Err(AppError::Upstream(format!("spreadsheet API returned {}", status)));
        }
        Ok(response.json().await?)
    }
}

/// Try `fetch` on each source until one has the article. A source that fails
/// is logged and skipped; the search only fails when every source failed.
pub async fn search_in_order<F, Fut>(
    sources: &[SourceInfo],
    number: &str,
    mut fetch: F,
) -> Result<Option<Article>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Option<Article>>>,
{
    let mut failures = 0;
    let mut last_error = None;

    for source in sources {
        match fetch(source.title.clone()).await {
            Ok(Some(article)) => {
                tracing::info!(article = number, source = %source.title, "article found");
                return Ok(Some(article));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(article = number, source = %source.title, error = %e, "skipping source");
                failures += 1;
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if failures == sources.len() => Err(e),
        _ => Ok(None),
    }
}

// ============================================================================
// Response Parsing
// ============================================================================

pub fn parse_sources(json: &Value) -> Vec<SourceInfo> {
    json.get("sheets")
        .and_then(|s| s.as_array())
        .map(|sheets| {
            sheets
                .iter()
                .filter_map(|sheet| {
                    let props = sheet.get("properties")?;
                    Some(SourceInfo {
                        id: props.get("sheetId").and_then(|v| v.as_i64()).unwrap_or(0),
                        title: props.get("title")?.as_str()?.to_string(),
                        index: props.get("index").and_then(|v| v.as_i64()).unwrap_or(0),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Cell values as strings; numbers are kept in their JSON rendering.
pub fn parse_rows(json: &Value) -> Vec<Vec<String>> {
    json.get("values")
        .and_then(|v| v.as_array())
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| cells.iter().map(cell_text).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn row_to_article(row: &[String], source: &str) -> Article {
    Article::new(
        row.first().cloned().unwrap_or_default(),
        row.get(1).cloned().unwrap_or_default(),
        Some(source),
    )
}

pub fn find_article(rows: &[Vec<String>], number: &str, source: &str) -> Option<Article> {
    let number = number.trim();
    rows.iter()
        .find(|row| row.first().map(|c| c.trim() == number).unwrap_or(false))
        .map(|row| row_to_article(row, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_sources() {
        let json = json!({
            "sheets": [
                { "properties": { "sheetId": 0, "title": "CF88", "index": 0 } },
                { "properties": { "sheetId": 1234, "title": "Código Civil", "index": 1 } },
                { "properties": { "sheetId": 5 } }
            ]
        });
        let sources = parse_sources(&json);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].title, "Código Civil");
        assert_eq!(sources[1].id, 1234);
        assert!(parse_sources(&json!({})).is_empty());
    }

    #[test]
    fn test_find_article_matches_first_column() {
        let json = json!({
            "values": [
                ["Artigo", "Texto"],
                ["1", "A República Federativa do Brasil..."],
                ["5 ", "Todos são iguais perante a lei"],
                [6],
                ["5", "duplicado"]
            ]
        });
        let rows = parse_rows(&json);
        let article = find_article(&rows, "5", "CF88").unwrap();
        assert_eq!(article.text, "Todos são iguais perante a lei");
        assert_eq!(article.source.as_deref(), Some("CF88"));

        let short = find_article(&rows, "6", "CF88").unwrap();
        assert_eq!(short.text, "");
        assert!(find_article(&rows, "99", "CF88").is_none());
    }

    fn source(title: &str) -> SourceInfo {
        SourceInfo {
            id: 0,
            title: title.to_string(),
            index: 0,
        }
    }

    fn fetch_from(source: String) -> std::future::Ready<Result<Option<Article>>> {
        std::future::ready(match source.as_str() {
            "Quebrada" => Err(AppError::Upstream("spreadsheet API returned 500".to_string())),
            "Código Civil" => Ok(Some(Article::new("5", "Texto do Código Civil", Some("Código Civil")))),
            _ => Ok(None),
        })
    }

    #[tokio::test]
    async fn test_search_skips_failing_source() {
        let sources = vec![source("CF88"), source("Quebrada"), source("Código Civil")];
        let article = search_in_order(&sources, "5", fetch_from).await.unwrap();
        assert_eq!(
            article.and_then(|a| a.source).as_deref(),
            Some("Código Civil")
        );
    }

    #[tokio::test]
    async fn test_search_fails_only_when_every_source_fails() {
        let broken = vec![source("Quebrada"), source("Quebrada")];
        assert!(search_in_order(&broken, "5", fetch_from).await.is_err());

        let partly = vec![source("Quebrada"), source("CF88")];
        assert!(search_in_order(&partly, "5", fetch_from).await.unwrap().is_none());

        assert!(search_in_order(&[], "5", fetch_from).await.unwrap().is_none());
    }

    #[test]
    fn test_parse_rows_without_values() {
        assert!(parse_rows(&json!({ "range": "Sheet1!A1:B1" })).is_empty());
    }
}
