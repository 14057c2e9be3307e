//! Highlight overlay for article text.
//!
//! Splits an article into plain and highlighted segments given the spans the
//! reader recorded for it. Matching is case-insensitive, the longest span
//! wins at any start position, and the segments always concatenate back to
//! the original text.

use serde::Serialize;

use crate::models::{HighlightColor, HighlightSpan};
use crate::templates::html_escape;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    pub highlighted: bool,
    pub color: Option<HighlightColor>,
}

impl Segment {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            highlighted: false,
            color: None,
        }
    }

    fn marked(text: &str, color: HighlightColor) -> Self {
        Self {
            text: text.to_string(),
            highlighted: true,
            color: Some(color),
        }
    }
}

pub fn highlight_text(text: &str, spans: &[HighlightSpan]) -> Vec<Segment> {
    if spans.is_empty() {
        return vec![Segment::plain(text)];
    }

    // Longest first; sort_by is stable so equal lengths keep recorded order.
    let mut patterns: Vec<(Vec<char>, HighlightColor)> = spans
        .iter()
        .filter(|s| !s.text.is_empty())
        .map(|s| (s.text.chars().collect(), s.color))
        .collect();
    patterns.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let byte_at = |pos: usize| chars.get(pos).map(|(b, _)| *b).unwrap_or(text.len());

    let mut segments = Vec::new();
    let mut plain_start = 0;
    let mut pos = 0;

    while pos < chars.len() {
        let hit = patterns
            .iter()
            .find(|(pattern, _)| matches_at(&chars[pos..], pattern));

        match hit {
            Some((pattern, color)) => {
                if plain_start < pos {
                    segments.push(Segment::plain(&text[byte_at(plain_start)..byte_at(pos)]));
                }
                let end = pos + pattern.len();
                segments.push(Segment::marked(&text[byte_at(pos)..byte_at(end)], *color));
                pos = end;
                plain_start = end;
            }
            None => pos += 1,
        }
    }

    // Empty text still yields one (empty) plain segment
    if plain_start < chars.len() || segments.is_empty() {
        segments.push(Segment::plain(&text[byte_at(plain_start)..]));
    }

    segments
}

fn matches_at(source: &[(usize, char)], pattern: &[char]) -> bool {
    source.len() >= pattern.len()
        && source
            .iter()
            .zip(pattern)
            .all(|((_, c), p)| chars_equal_ignore_case(*c, *p))
}

fn chars_equal_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Render segments as HTML, highlighted ones wrapped in `<mark>`.
pub fn render_segments_html(segments: &[Segment]) -> String {
    let mut html = String::new();
    for segment in segments {
        let escaped = html_escape(&segment.text).replace('\n', "<br>");
        match segment.color {
            Some(color) if segment.highlighted => {
                html.push_str(&format!(
                    "<mark class=\"hl hl-{}\">{}</mark>",
                    color.as_str(),
                    escaped
                ));
            }
            _ => html.push_str(&escaped),
        }
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str) -> HighlightSpan {
        HighlightSpan::new(text, HighlightColor::Default)
    }

    fn joined(segments: &[Segment]) -> String {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    fn marked_texts(segments: &[Segment]) -> Vec<&str> {
        segments
            .iter()
            .filter(|s| s.highlighted)
            .map(|s| s.text.as_str())
            .collect()
    }

    #[test]
    fn test_no_spans_is_single_plain_segment() {
        let segments = highlight_text("Art. 1 Texto", &[]);
        assert_eq!(segments, vec![Segment::plain("Art. 1 Texto")]);
    }

    #[test]
    fn test_empty_text_same_shape_with_or_without_spans() {
        let expected = vec![Segment::plain("")];
        assert_eq!(highlight_text("", &[]), expected);
        assert_eq!(highlight_text("", &[span("lei")]), expected);
        assert_eq!(highlight_text("", &[span("")]), expected);
    }

    #[test]
    fn test_prefix_highlight() {
        let segments = highlight_text("Art. 5 da lei", &[span("Art. 5")]);
        assert_eq!(
            segments,
            vec![
                Segment::marked("Art. 5", HighlightColor::Default),
                Segment::plain(" da lei"),
            ]
        );
    }

    #[test]
    fn test_longest_span_wins() {
        let segments = highlight_text("artigo 5", &[span("art"), span("artigo")]);
        assert_eq!(marked_texts(&segments), vec!["artigo"]);
        assert_eq!(joined(&segments), "artigo 5");
    }

    #[test]
    fn test_case_insensitive_keeps_source_casing() {
        let spans = [HighlightSpan::new("VIDA", HighlightColor::Green)];
        let segments = highlight_text("direito à vida e à Vida", &spans);
        assert_eq!(marked_texts(&segments), vec!["vida", "Vida"]);
        assert!(segments
            .iter()
            .filter(|s| s.highlighted)
            .all(|s| s.color == Some(HighlightColor::Green)));
    }

    #[test]
    fn test_accented_capitals_match() {
        let segments = highlight_text("É livre a manifestação", &[span("é livre")]);
        assert_eq!(marked_texts(&segments), vec!["É livre"]);
        assert_eq!(joined(&segments), "É livre a manifestação");
    }

    #[test]
    fn test_missing_span_is_ignored() {
        let segments = highlight_text("Todos são iguais", &[span("propriedade")]);
        assert_eq!(segments, vec![Segment::plain("Todos são iguais")]);
    }

    #[test]
    fn test_overlapping_spans_claim_each_char_once() {
        let text = "abcabcab";
        let segments = highlight_text(text, &[span("bca"), span("ab")]);
        assert_eq!(joined(&segments), text);
        // "ab" claims the 'b' that "bca" would have started on.
        assert_eq!(marked_texts(&segments), vec!["ab", "ab", "ab"]);
        assert_eq!(
            segments.iter().filter(|s| !s.highlighted).map(|s| s.text.as_str()).collect::<Vec<_>>(),
            vec!["c", "c"]
        );
    }

    #[test]
    fn test_empty_span_text_is_ignored() {
        let segments = highlight_text("lei", &[span(""), span("e")]);
        assert_eq!(joined(&segments), "lei");
        assert_eq!(marked_texts(&segments), vec!["e"]);
    }

    #[test]
    fn test_completeness_over_assorted_inputs() {
        let texts = [
            "",
            "a",
            "Parágrafo único. É vedado...",
            "aaaa",
            "Art. 5º Todos são iguais perante a lei",
        ];
        let spans = [span("a"), span("aa"), span("É"), span("lei"), span("º T")];
        for text in texts {
            let segments = highlight_text(text, &spans);
            assert_eq!(joined(&segments), text);
            assert!(segments.iter().all(|s| !s.text.is_empty() || text.is_empty()));
        }
    }

    #[test]
    fn test_repeated_pattern_greedy_from_left() {
        let segments = highlight_text("aaaaa", &[span("aa")]);
        assert_eq!(marked_texts(&segments), vec!["aa", "aa"]);
        assert_eq!(segments.last(), Some(&Segment::plain("a")));
    }

    #[test]
    fn test_render_html_escapes_and_marks() {
        let segments = highlight_text("a <b> & c", &[HighlightSpan::new("<b>", HighlightColor::Yellow)]);
        assert_eq!(
            render_segments_html(&segments),
            "a <mark class=\"hl hl-yellow\">&lt;b&gt;</mark> &amp; c"
        );
    }
}
