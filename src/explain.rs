//! AI explanations of articles.
//!
//! Thin request/response client for the generative-language API plus the
//! parsing of explanation text into named sections. Explanations are
//! requested as a JSON object with named fields; text cached before that
//! (free prose with lettered headings) is still split by heading, and the
//! result says whether the prose looked the way it was expected to.

use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::OnceLock;

use crate::config::Config;
use crate::error::{AppError, Result};

// ============================================================================
// Client
// ============================================================================

pub struct ExplanationClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl ExplanationClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.gemini_base_url.trim_end_matches('/'),
                config.gemini_model
            ),
            api_key: config.gemini_api_key.clone(),
        })
    }

    /// Explain an article. The returned text is the JSON object described in
    /// [`explanation_prompt`], ready to be cached and parsed later.
    pub async fn explain(
        &self,
        article_text: &str,
        number: &str,
        source: Option<&str>,
    ) -> Result<String> {
        let prompt = explanation_prompt(article_text, number, source);
        self.generate(&prompt, true).await
    }

    pub async fn answer_question(
        &self,
        question: &str,
        article_text: &str,
        number: &str,
        source: Option<&str>,
    ) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::BadRequest("Pergunta vazia".to_string()));
        }
        let prompt = question_prompt(question, article_text, number, source);
        self.generate(&prompt, false).await
    }

    pub async fn auto_annotate(&self, article_text: &str) -> Result<String> {
        self.generate(&annotation_prompt(article_text), false).await
    }

    async fn generate(&self, prompt: &str, structured: bool) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("GEMINI_API_KEY não definido".to_string()))?;

        let mut generation_config = json!({
            "temperature": 0.2,
            "topK": 40,
            "topP": 0.95,
            "maxOutputTokens": 800,
        });
        if structured {
            generation_config["responseMimeType"] = json!("application/json");
        }
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": generation_config,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "explanation request failed");
            return Err(AppError::Upstream(format!(
                "generateContent returned {}: {}",
                status,
                truncate(&detail, 200)
            )));
        }

        let json: Value = response.json().await?;
        extract_candidate_text(&json)
            .ok_or_else(|| AppError::Upstream("resposta sem texto gerado".to_string()))
    }
}

/// First candidate's first text part, if the model produced any.
pub fn extract_candidate_text(response: &Value) -> Option<String> {
    response
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?
        .iter()
        .find_map(|part| part.get("text").and_then(|t| t.as_str()))
        .map(|t| t.to_string())
        .filter(|t| !t.trim().is_empty())
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

// ============================================================================
// Prompts
// ============================================================================

fn article_heading(number: &str, source: Option<&str>) -> String {
    match source {
        Some(source) => format!("Artigo {} ({})", number, source),
        None => format!("Artigo {}", number),
    }
}

pub fn explanation_prompt(article_text: &str, number: &str, source: Option<&str>) -> String {
    format!(
        r#"Explique de forma clara e didática o seguinte artigo da legislação brasileira.

{heading}:
{article_text}

Responda apenas com um objeto JSON com os campos:
- "summary": explicação simples do artigo (no máximo 3 parágrafos)
- "legal_basis": base legal relacionada
- "notes": notas importantes
- "theory": teoria e doutrina aplicáveis
- "example": um exemplo prático de aplicação (1 parágrafo)
- "case_law": jurisprudência relevante (apenas 1 exemplo recente)
- "keywords": lista com no máximo 5 palavras-chave"#,
        heading = article_heading(number, source),
        article_text = article_text,
    )
}

pub fn question_prompt(
    question: &str,
    article_text: &str,
    number: &str,
    source: Option<&str>,
) -> String {
    format!(
        "Com base no artigo abaixo da legislação brasileira, responda à pergunta de forma objetiva.\n\n\
         {heading}:\n{article_text}\n\nPergunta: {question}",
        heading = article_heading(number, source),
        article_text = article_text,
        question = question,
    )
}

pub fn annotation_prompt(article_text: &str) -> String {
    format!(
        "Crie anotações de estudo concisas para o artigo abaixo: pontos-chave, \
         prazos e exceções, em tópicos curtos.\n\n{}",
        article_text
    )
}

// ============================================================================
// Explanation Sections
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationSections {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub legal_basis: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub theory: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub case_law: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ExplanationSections {
    pub fn is_empty(&self) -> bool {
        self.labeled().is_empty() && self.keywords.is_empty()
    }

    /// Non-empty sections with their display labels, in reading order.
    pub fn labeled(&self) -> Vec<(&'static str, &str)> {
        [
            ("A - ARTIGO", &self.summary),
            ("B - BASE LEGAL", &self.legal_basis),
            ("N - NOTAS", &self.notes),
            ("T - TEORIA", &self.theory),
            ("Exemplo prático", &self.example),
            ("Jurisprudência", &self.case_law),
        ]
        .into_iter()
        .filter_map(|(label, text)| {
            text.as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| (label, t))
        })
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedExplanation {
    Structured(ExplanationSections),
    /// Free prose. `drifted` is set when headings were missing, repeated or
    /// out of order, so section attribution should not be trusted.
    Prose {
        text: String,
        sections: ExplanationSections,
        drifted: bool,
    },
}

impl ParsedExplanation {
    pub fn sections(&self) -> &ExplanationSections {
        match self {
            ParsedExplanation::Structured(sections) => sections,
            ParsedExplanation::Prose { sections, .. } => sections,
        }
    }
}

pub fn parse_explanation(text: &str) -> ParsedExplanation {
    if let Some(sections) = parse_structured(text) {
        return ParsedExplanation::Structured(sections);
    }

    let (sections, drifted) = split_prose_sections(text);
    if drifted {
        tracing::warn!("explanation prose did not follow the expected headings");
    }
    ParsedExplanation::Prose {
        text: text.to_string(),
        sections,
        drifted,
    }
}

fn parse_structured(text: &str) -> Option<ExplanationSections> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str::<ExplanationSections>(body.trim())
        .ok()
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Heading {
    Summary,
    LegalBasis,
    Notes,
    Theory,
    Example,
    CaseLaw,
}

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?P<summary>A\s*-\s*ARTIGO)|(?P<legal>B\s*-\s*BASE\s*LEGAL)|(?P<notes>N\s*-\s*NOTAS)|(?P<theory>T\s*-\s*TEORIA)|(?P<example>Exemplo\s+prático)|(?P<case_law>Jurisprudência)",
        )
        .expect("heading pattern is valid")
    })
}

fn split_prose_sections(text: &str) -> (ExplanationSections, bool) {
    let mut headings: Vec<(Heading, usize, usize)> = Vec::new();
    for caps in heading_regex().captures_iter(text) {
        let (kind, m) = if let Some(m) = caps.name("summary") {
            (Heading::Summary, m)
        } else if let Some(m) = caps.name("legal") {
            (Heading::LegalBasis, m)
        } else if let Some(m) = caps.name("notes") {
            (Heading::Notes, m)
        } else if let Some(m) = caps.name("theory") {
            (Heading::Theory, m)
        } else if let Some(m) = caps.name("example") {
            (Heading::Example, m)
        } else if let Some(m) = caps.name("case_law") {
            (Heading::CaseLaw, m)
        } else {
            continue;
        };
        headings.push((kind, m.start(), m.end()));
    }

    let mut sections = ExplanationSections::default();
    let mut drifted = headings.is_empty();

    for (i, (kind, _, body_start)) in headings.iter().enumerate() {
        let body_end = headings.get(i + 1).map(|h| h.1).unwrap_or(text.len());
        let body = text[*body_start..body_end]
            .trim_start_matches(|c: char| c == ':' || c == '*' || c.is_whitespace())
            .trim_end_matches(|c: char| c == '*' || c == '#' || c.is_whitespace())
            .to_string();

        let slot = match kind {
            Heading::Summary => &mut sections.summary,
            Heading::LegalBasis => &mut sections.legal_basis,
            Heading::Notes => &mut sections.notes,
            Heading::Theory => &mut sections.theory,
            Heading::Example => &mut sections.example,
            Heading::CaseLaw => &mut sections.case_law,
        };
        if slot.is_some() {
            drifted = true;
            continue;
        }
        *slot = Some(body);

        if i > 0 && headings[i - 1].0 > *kind {
            drifted = true;
        }
    }

    (sections, drifted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_candidate_text() {
        let response = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Resposta" }] } }]
        });
        assert_eq!(extract_candidate_text(&response).as_deref(), Some("Resposta"));
        assert_eq!(extract_candidate_text(&json!({ "candidates": [] })), None);
        let blank = json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] });
        assert_eq!(extract_candidate_text(&blank), None);
    }

    #[test]
    fn test_parse_structured_explanation() {
        let text = r#"```json
{"summary": "Garante a igualdade.", "example": "Concurso público.", "keywords": ["igualdade"]}
```"#;
        let parsed = parse_explanation(text);
        let ParsedExplanation::Structured(sections) = parsed else {
            panic!("expected structured explanation");
        };
        assert_eq!(sections.summary.as_deref(), Some("Garante a igualdade."));
        assert_eq!(sections.keywords, vec!["igualdade".to_string()]);
        assert_eq!(
            sections.labeled(),
            vec![("A - ARTIGO", "Garante a igualdade."), ("Exemplo prático", "Concurso público.")]
        );
    }

    #[test]
    fn test_parse_prose_by_heading() {
        let text = "A - ARTIGO resumo aqui\nB - BASE LEGAL CF art. 5\nN - NOTAS nota\n\
                    T - TEORIA teoria\nExemplo prático: um caso\nJurisprudência: STF RE 123";
        match parse_explanation(text) {
            ParsedExplanation::Prose { sections, drifted, .. } => {
                assert!(!drifted);
                assert_eq!(sections.summary.as_deref(), Some("resumo aqui"));
                assert_eq!(sections.legal_basis.as_deref(), Some("CF art. 5"));
                assert_eq!(sections.example.as_deref(), Some("um caso"));
                assert_eq!(sections.case_law.as_deref(), Some("STF RE 123"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_prose_sections_attributed_by_heading_not_order() {
        // Body text full of heading letters (A, B, T) must not start new sections.
        let text = "Jurisprudência: Tema 1 do STF\nA - ARTIGO Base de Tudo";
        match parse_explanation(text) {
            ParsedExplanation::Prose { sections, drifted, .. } => {
                assert!(drifted);
                assert_eq!(sections.summary.as_deref(), Some("Base de Tudo"));
                assert_eq!(sections.case_law.as_deref(), Some("Tema 1 do STF"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_prose_without_headings_is_flagged() {
        match parse_explanation("Um texto livre sem seções.") {
            ParsedExplanation::Prose { sections, drifted, .. } => {
                assert!(drifted);
                assert!(sections.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_prompts_mention_article() {
        let prompt = explanation_prompt("Todos são iguais", "5", Some("CF88"));
        assert!(prompt.contains("Artigo 5 (CF88)"));
        assert!(prompt.contains("\"case_law\""));
        let prompt = question_prompt("O que é?", "texto", "7", None);
        assert!(prompt.contains("Artigo 7:"));
        assert!(prompt.ends_with("Pergunta: O que é?"));
    }
}
