//! Document exports: a printable PDF of articles with their explanations,
//! and a spreadsheet-shaped CSV of articles with the reader's annotations.

use std::collections::HashMap;

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, StringFormat};

use crate::error::{AppError, Result};
use crate::explain::parse_explanation;
use crate::models::Article;
use crate::storage::KeyValueStorage;
use crate::store::{explanation_key, AnnotationStore};

// A4 in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const BOTTOM: i64 = 60;
const BODY_CHARS: usize = 90;
const SECTION_CHARS: usize = 95;

const APP_TITLE: &str = "VADEMECUM";

// ============================================================================
// PDF Layout
// ============================================================================

#[derive(Clone, Copy)]
enum Font {
    Heading,
    Body,
    Sans,
    Italic,
}

impl Font {
    fn resource(&self) -> &'static [u8] {
        match self {
            Font::Heading => b"F1",
            Font::Body => b"F2",
            Font::Sans => b"F3",
            Font::Italic => b"F4",
        }
    }
}

#[derive(Clone, Copy)]
enum Ink {
    Black,
    Gray,
    Purple,
    Blue,
    Green,
    Orange,
}

fn ink_op(ink: Ink) -> Operation {
    let (r, g, b) = match ink {
        Ink::Black => (0.0, 0.0, 0.0),
        Ink::Gray => (0.4, 0.4, 0.4),
        Ink::Purple => (0.35, 0.27, 0.78),
        Ink::Blue => (0.2, 0.47, 0.78),
        Ink::Green => (0.2, 0.7, 0.4),
        Ink::Orange => (0.8, 0.4, 0.1),
    };
    Operation::new("rg", vec![Object::Real(r), Object::Real(g), Object::Real(b)])
}

fn section_ink(label: &str) -> Ink {
    match label.chars().next() {
        Some('A') => Ink::Purple,
        Some('B') => Ink::Blue,
        Some('N') => Ink::Green,
        Some('T') => Ink::Orange,
        _ => Ink::Gray,
    }
}

/// Accumulates page content streams, starting a new page when the cursor
/// reaches the bottom margin.
struct Pages {
    finished: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    y: i64,
}

impl Pages {
    fn new() -> Self {
        Self {
            finished: Vec::new(),
            current: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn break_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.finished.push(page);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn ensure_space(&mut self, needed: i64) {
        if self.y - needed < BOTTOM {
            self.break_page();
        }
    }

    fn text_at(&mut self, x: i64, y: i64, font: Font, size: i64, ink: Ink, text: &str) {
        self.current.push(ink_op(ink));
        self.current.push(Operation::new("BT", vec![]));
        self.current.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource().to_vec()), Object::Integer(size)],
        ));
        self.current.push(Operation::new(
            "Td",
            vec![Object::Integer(x), Object::Integer(y)],
        ));
        self.current.push(Operation::new(
            "Tj",
            vec![Object::String(to_win_ansi(text), StringFormat::Literal)],
        ));
        self.current.push(Operation::new("ET", vec![]));
    }

    fn line(&mut self, font: Font, size: i64, ink: Ink, leading: i64, text: &str) {
        self.ensure_space(leading);
        self.y -= leading;
        let y = self.y;
        self.text_at(MARGIN, y, font, size, ink, text);
    }

    fn paragraph(&mut self, font: Font, size: i64, leading: i64, width: usize, text: &str) {
        for line in wrap_text(text, width) {
            self.line(font, size, Ink::Black, leading, &line);
        }
    }

    fn gap(&mut self, points: i64) {
        self.y -= points;
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        if !self.current.is_empty() || self.finished.is_empty() {
            self.break_page();
        }
        self.finished
    }
}

/// Render articles, each followed by its explanation when one is available in
/// `explanations` (keyed as in the explanation cache).
pub fn export_pdf(
    articles: &[Article],
    explanations: &HashMap<String, String>,
    date: NaiveDate,
) -> Result<Vec<u8>> {
    let mut pages = Pages::new();

    pages.line(Font::Heading, 20, Ink::Purple, 20, APP_TITLE);
    pages.line(Font::Sans, 12, Ink::Gray, 16, "Exportação de Artigos");
    pages.line(
        Font::Sans,
        10,
        Ink::Gray,
        18,
        &format!("Data: {}", date.format("%d/%m/%Y")),
    );
    pages.gap(12);

    for article in articles {
        pages.ensure_space(80);
        let heading = match &article.source {
            Some(source) => format!("A - ARTIGO {} ({})", article.number, source),
            None => format!("A - ARTIGO {}", article.number),
        };
        pages.line(Font::Heading, 14, Ink::Purple, 20, &heading);
        pages.gap(4);
        pages.paragraph(Font::Body, 11, 15, BODY_CHARS, &article.text);

        let explanation = explanations
            .get(&explanation_key(&article.number, article.source.as_deref()))
            .or_else(|| explanations.get(&article.number));
        if let Some(explanation) = explanation {
            write_explanation(&mut pages, explanation);
        }
        pages.gap(18);
    }

    build_document(pages.finish())
}

fn write_explanation(pages: &mut Pages, explanation: &str) {
    let parsed = parse_explanation(explanation);
    let sections = parsed.sections();
    pages.gap(10);

    let labeled = sections.labeled();
    if labeled.is_empty() {
        pages.ensure_space(60);
        pages.line(Font::Heading, 12, Ink::Blue, 18, "Explicação");
        pages.paragraph(Font::Sans, 10, 13, SECTION_CHARS, explanation);
        return;
    }

    for (label, text) in labeled {
        pages.ensure_space(60);
        pages.line(Font::Heading, 12, section_ink(label), 18, label);
        pages.gap(2);
        pages.paragraph(Font::Sans, 10, 13, SECTION_CHARS, text);
        pages.gap(6);
    }

    if !sections.keywords.is_empty() {
        pages.line(
            Font::Italic,
            10,
            Ink::Gray,
            14,
            &format!("Palavras-chave: {}", sections.keywords.join(", ")),
        );
    }
}

fn build_document(page_ops: Vec<Vec<Operation>>) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for (resource, base_font) in [
        ("F1", "Helvetica-Bold"),
        ("F2", "Times-Roman"),
        ("F3", "Helvetica"),
        ("F4", "Helvetica-Oblique"),
    ] {
        let font_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(base_font.as_bytes().to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ]));
        fonts.set(resource, Object::Reference(font_id));
    }
    let resources_id = doc.add_object(Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(fonts),
    )]));

    let total = page_ops.len();
    let mut page_ids = Vec::with_capacity(total);
    for (index, mut operations) in page_ops.into_iter().enumerate() {
        let footer = format!("Documento gerado por {} - página {} de {}", APP_TITLE, index + 1, total);
        operations.push(ink_op(Ink::Gray));
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![Object::Name(Font::Italic.resource().to_vec()), Object::Integer(8)],
        ));
        operations.push(Operation::new(
            "Td",
            vec![Object::Integer(MARGIN), Object::Integer(30)],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(to_win_ansi(&footer), StringFormat::Literal)],
        ));
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));
        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(PAGE_WIDTH),
                    Object::Integer(PAGE_HEIGHT),
                ]),
            ),
            ("Resources", Object::Reference(resources_id)),
            ("Contents", Object::Reference(content_id)),
        ]);
        page_ids.push(doc.add_object(page));
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(total as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Encode for the standard fonts' WinAnsi encoding. Latin-1 passes through;
/// common typographic punctuation is folded to ASCII, anything else becomes '?'.
fn to_win_ansi(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2013}' | '\u{2014}' => bytes.push(b'-'),
            '\u{2018}' | '\u{2019}' => bytes.push(b'\''),
            '\u{201C}' | '\u{201D}' => bytes.push(b'"'),
            '\u{2026}' => bytes.extend_from_slice(b"..."),
            '\t' => bytes.push(b' '),
            c if (c as u32) < 0x20 => {}
            c if (c as u32) <= 0xFF => bytes.push(c as u32 as u8),
            _ => bytes.push(b'?'),
        }
    }
    bytes
}

/// Greedy word wrap by character count. Explicit line breaks are kept and
/// words longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for raw_line in text.lines() {
        let mut current = String::new();
        let mut current_len = 0;

        for word in raw_line.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(width);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
            if needed > width && current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(word.iter());
            current_len += word.len();
        }

        lines.push(current);
    }

    lines
}

// ============================================================================
// Spreadsheet Rows
// ============================================================================

pub const SHEET_HEADERS: [&str; 6] = [
    "Número do Artigo",
    "Lei/Código",
    "Texto do Artigo",
    "Anotação Pessoal",
    "Destaques",
    "Data",
];

/// One row per article with the reader's annotation and highlighted passages.
pub fn sheet_rows<S: KeyValueStorage>(
    articles: &[Article],
    store: &AnnotationStore<S>,
    date: NaiveDate,
) -> Vec<Vec<String>> {
    let date = date.format("%d/%m/%Y").to_string();
    let mut rows: Vec<Vec<String>> = vec![SHEET_HEADERS.iter().map(|h| h.to_string()).collect()];
    for article in articles {
        let highlights = store
            .highlights(&article.number)
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        rows.push(vec![
            article.number.clone(),
            article.source.clone().unwrap_or_default(),
            article.text.clone(),
            store.annotation(&article.number).unwrap_or("").to_string(),
            highlights,
            date.clone(),
        ]);
    }
    rows
}

pub fn export_csv(rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    writer.into_inner().map_err(|e| AppError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HighlightColor;
    use crate::storage::MemoryStorage;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("um dois tres", 7), vec!["um dois", "tres"]);
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_text("é ç ã", 3), vec!["é ç", "ã"]);
    }

    #[test]
    fn test_win_ansi_encoding() {
        assert_eq!(to_win_ansi("Art. 5º – é"), b"Art. 5\xBA - \xE9".to_vec());
        assert_eq!(to_win_ansi("漢"), b"?".to_vec());
    }

    #[test]
    fn test_export_pdf_produces_loadable_document() {
        let articles = vec![
            Article::new("5", "Todos são iguais perante a lei. ".repeat(200), Some("CF88")),
            Article::new("6", "São direitos sociais a educação, a saúde...", Some("CF88")),
        ];
        let mut explanations = HashMap::new();
        explanations.insert(
            explanation_key("5", Some("CF88")),
            r#"{"summary":"Igualdade formal.","case_law":"STF, ADI 1234","keywords":["igualdade"]}"#
                .to_string(),
        );
        explanations.insert("6".to_string(), "Explicação em prosa livre.".to_string());

        let bytes = export_pdf(&articles, &explanations, date()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() >= 2);
    }

    #[test]
    fn test_export_pdf_with_no_articles_has_one_page() {
        let bytes = export_pdf(&[], &HashMap::new(), date()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_sheet_rows_and_csv() {
        let mut store = AnnotationStore::open(MemoryStorage::new());
        store.save_annotation("5", "ver ADI");
        store.add_highlight("5", "iguais", HighlightColor::Default);
        store.add_highlight("5", "lei", HighlightColor::Blue);

        let articles = vec![Article::new("5", "Todos são iguais perante a lei", Some("CF88"))];
        let rows = sheet_rows(&articles, &store, date());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "Número do Artigo");
        assert_eq!(rows[1][3], "ver ADI");
        assert_eq!(rows[1][4], "iguais\nlei");
        assert_eq!(rows[1][5], "14/03/2025");

        let csv = String::from_utf8(export_csv(&rows).unwrap()).unwrap();
        assert!(csv.starts_with("Número do Artigo,Lei/Código,"));
        assert!(csv.contains("\"iguais\nlei\""));
    }
}
