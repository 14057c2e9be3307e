//! Data models for the vademecum application.
//!
//! Articles and sources as fetched from the spreadsheet, the highlight types
//! recorded by the annotation store, and the form payloads accepted by the
//! HTTP handlers.

use serde::{Deserialize, Serialize};

// ============================================================================
// Articles and Sources
// ============================================================================

/// One numbered article of a legal text. Identity is `(number, source)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub number: String,
    pub text: String,
    pub source: Option<String>,
}

impl Article {
    pub fn new(number: impl Into<String>, text: impl Into<String>, source: Option<&str>) -> Self {
        Self {
            number: number.into(),
            text: text.into(),
            source: source.map(|s| s.to_string()),
        }
    }

    pub fn same_identity(&self, other: &Article) -> bool {
        self.number == other.number && self.source == other.source
    }

    /// Source name used in URLs; articles without a source live under the default.
    pub fn source_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.source.as_deref().unwrap_or(default)
    }
}

/// A named legal text (one sheet of the spreadsheet).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceInfo {
    pub id: i64,
    pub title: String,
    pub index: i64,
}

// ============================================================================
// Highlights
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum HighlightColor {
    #[default]
    Default,
    Yellow,
    Green,
    Blue,
}

impl HighlightColor {
    pub const ALL: [HighlightColor; 4] = [
        HighlightColor::Default,
        HighlightColor::Yellow,
        HighlightColor::Green,
        HighlightColor::Blue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightColor::Default => "default",
            HighlightColor::Yellow => "yellow",
            HighlightColor::Green => "green",
            HighlightColor::Blue => "blue",
        }
    }
}

// Unknown names (including the legacy "highlighted") fall back to the default
// color so one odd entry cannot make a whole stored slice unreadable.
impl From<String> for HighlightColor {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "yellow" => HighlightColor::Yellow,
            "green" => HighlightColor::Green,
            "blue" => HighlightColor::Blue,
            _ => HighlightColor::Default,
        }
    }
}

impl std::fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded literal substring of an article, displayed with emphasis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HighlightSpan {
    pub text: String,
    #[serde(default)]
    pub color: HighlightColor,
}

impl HighlightSpan {
    pub fn new(text: impl Into<String>, color: HighlightColor) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

// ============================================================================
// Form Payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationForm {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HighlightForm {
    pub text: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionForm {
    pub question: String,
}

/// JSON answer for the asynchronous article actions (question, auto annotation).
#[derive(Debug, Clone, Serialize)]
pub struct TextResponse {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_deserializes_unknown_as_default() {
        let span: HighlightSpan =
            serde_json::from_str(r#"{"text":"vida","color":"highlighted"}"#).unwrap();
        assert_eq!(span.color, HighlightColor::Default);

        let span: HighlightSpan = serde_json::from_str(r#"{"text":"vida","color":"Green"}"#).unwrap();
        assert_eq!(span.color, HighlightColor::Green);

        let span: HighlightSpan = serde_json::from_str(r#"{"text":"vida"}"#).unwrap();
        assert_eq!(span.color, HighlightColor::Default);
    }

    #[test]
    fn test_color_serializes_lowercase() {
        let json = serde_json::to_string(&HighlightSpan::new("x", HighlightColor::Blue)).unwrap();
        assert_eq!(json, r#"{"text":"x","color":"blue"}"#);
    }

    #[test]
    fn test_article_identity() {
        let a = Article::new("5", "Todos são iguais", Some("CF88"));
        let b = Article::new("5", "outro texto", Some("CF88"));
        let c = Article::new("5", "Todos são iguais", Some("CC"));
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
        assert_eq!(Article::new("1", "", None).source_or("Sheet1"), "Sheet1");
    }
}
