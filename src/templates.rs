//! HTML templates and styling.
//!
//! CSS, the page shell and the per-page HTML builders for the web interface.

use pulldown_cmark::Parser;

use crate::explain::{parse_explanation, ParsedExplanation};
use crate::models::{Article, HighlightColor, HighlightSpan, SourceInfo};

// ============================================================================
// CSS Styles
// ============================================================================

pub const STYLE: &str = r#"
/* Solarized Light Theme */
:root {
    --base03: #002b36;
    --base01: #586e75;
    --base00: #657b83;
    --base1: #93a1a1;
    --base2: #eee8d5;
    --base3: #fdf6e3;

    --yellow: #b58900;
    --orange: #cb4b16;
    --red: #dc322f;
    --violet: #6c71c4;
    --blue: #268bd2;
    --cyan: #2aa198;
    --green: #859900;

    --bg: var(--base3);
    --fg: var(--base00);
    --muted: var(--base1);
    --border: var(--base2);
    --link: var(--blue);
    --link-hover: var(--cyan);
    --accent: var(--base2);
}

* { box-sizing: border-box; margin: 0; padding: 0; }

body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif;
    line-height: 1.6;
    color: var(--fg);
    background: var(--bg);
}

.container { max-width: 900px; margin: 0 auto; padding: 1rem; }

a { color: var(--link); text-decoration: none; }
a:hover { color: var(--link-hover); text-decoration: underline; }

h1, h2, h3 { font-weight: 600; margin-top: 1.5em; margin-bottom: 0.5em; }
h1 { font-size: 1.5rem; }
h2 { font-size: 1.15rem; }

.nav-bar {
    position: sticky;
    top: 0;
    background: var(--bg);
    border-bottom: 1px solid var(--border);
    padding: 0.5rem 1rem;
    display: flex;
    gap: 1rem;
    align-items: center;
    flex-wrap: wrap;
    z-index: 100;
}
.nav-bar a { font-size: 0.9rem; }
.nav-bar .spacer { flex: 1; }

.search-box { display: flex; gap: 0.5rem; }
.search-box input, .panel input[type=text], .panel select, .panel textarea {
    padding: 0.4rem 0.75rem;
    border: 1px solid var(--border);
    border-radius: 4px;
    background: var(--bg);
    color: var(--fg);
    font-size: 0.9rem;
    font-family: inherit;
}
.search-box input { width: 180px; }
.panel textarea { width: 100%; min-height: 6rem; }

.btn, .search-box button {
    padding: 0.4rem 0.9rem;
    border: 1px solid var(--base1);
    border-radius: 4px;
    background: var(--blue);
    color: var(--base3);
    cursor: pointer;
    font-size: 0.85rem;
    font-family: inherit;
}
.btn:hover { background: var(--cyan); border-color: var(--cyan); }
.btn.secondary { background: var(--base2); color: var(--base00); }
.btn.link { background: none; border: none; color: var(--link); padding: 0; }

.article-list { list-style: none; }
.article-item {
    padding: 0.75rem 0;
    border-bottom: 1px solid var(--border);
}
.article-item:last-child { border-bottom: none; }
.article-item .excerpt { font-size: 0.85rem; color: var(--muted); }
.source-badge {
    font-size: 0.65rem;
    padding: 0.1rem 0.4rem;
    background: var(--accent);
    border-radius: 3px;
    text-transform: uppercase;
    letter-spacing: 0.05em;
    margin-left: 0.5rem;
    vertical-align: middle;
}

.article-header { display: flex; align-items: center; gap: 0.75rem; flex-wrap: wrap; }
.article-header h1 { flex: 1; }
.star { font-size: 1.4rem; color: var(--muted); }
.star.on { color: var(--yellow); }

.article-text {
    font-family: Georgia, "Times New Roman", serif;
    font-size: 1.05rem;
    background: white;
    border: 1px solid var(--border);
    border-radius: 4px;
    padding: 1rem 1.25rem;
}

mark.hl { padding: 0 0.1em; border-radius: 2px; color: inherit; }
mark.hl-default { background: #f7e3a1; }
mark.hl-yellow { background: #fff176; }
mark.hl-green { background: #c5e1a5; }
mark.hl-blue { background: #b3d9f7; }

.panel {
    margin-top: 1.5rem;
    padding: 1rem;
    background: var(--accent);
    border-radius: 4px;
}
.panel h2 { margin-top: 0; }
.panel form { margin-top: 0.5rem; display: flex; gap: 0.5rem; flex-wrap: wrap; align-items: center; }
.panel form.stacked { display: block; }
.panel form.stacked > * { margin-bottom: 0.5rem; }

.highlight-list, .media-list { list-style: none; }
.highlight-list li, .media-list li { display: flex; gap: 0.5rem; align-items: center; padding: 0.25rem 0; }
.media-list img { max-width: 240px; border-radius: 4px; }

.explanation section { margin-bottom: 1rem; }
.explanation h3 { font-size: 0.95rem; margin-top: 0.5rem; }
.explanation .keywords { font-size: 0.85rem; color: var(--muted); }
.warning { color: var(--orange); font-size: 0.85rem; }
.error { color: var(--red); }
.muted { color: var(--muted); font-size: 0.85rem; }
.source-picker { display: flex; gap: 0.5rem; margin: 1rem 0; }
.answer { white-space: pre-wrap; margin-top: 0.5rem; }
"#;

// ============================================================================
// Escaping and Markdown
// ============================================================================

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn render_markdown(content: &str) -> String {
    let parser = Parser::new(content);
    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, parser);
    // Model output is untrusted
    ammonia::clean(&html_output)
}

/// Path segment for an article page, e.g. `/article/CF88/5`.
pub fn article_path(source: &str, number: &str) -> String {
    format!(
        "/article/{}/{}",
        urlencoding::encode(source),
        urlencoding::encode(number)
    )
}

fn api_path(source: &str, number: &str, action: &str) -> String {
    format!("/api{}/{}", article_path(source, number), action)
}

// ============================================================================
// Page Shell
// ============================================================================

pub fn nav_bar(search_query: Option<&str>) -> String {
    format!(
        r#"<nav class="nav-bar">
            <a href="/">Artigos</a>
            <a href="/browse">Navegar</a>
            <a href="/favorites">Favoritos</a>
            <a href="/export/favorites.pdf">PDF</a>
            <a href="/export/favorites.csv">Planilha</a>
            <span class="spacer"></span>
            <form class="search-box" action="/search" method="get">
                <input type="text" name="q" placeholder="Número do artigo" value="{}">
                <button type="submit">Buscar</button>
            </form>
        </nav>"#,
        html_escape(search_query.unwrap_or(""))
    )
}

pub fn base_html(title: &str, content: &str, search_query: Option<&str>) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    {nav}
    <div class="container">
        {content}
    </div>
    <script>{SCRIPT}</script>
</body>
</html>"#,
        title = html_escape(title),
        nav = nav_bar(search_query),
    )
}

// Posts a form in the background and drops the returned text into the target element.
const SCRIPT: &str = r#"
document.querySelectorAll('form[data-async]').forEach(function (form) {
    form.addEventListener('submit', async function (event) {
        event.preventDefault();
        var target = document.getElementById(form.dataset.target);
        var button = form.querySelector('button');
        button.disabled = true;
        target.classList.remove('error');
        target.textContent = 'Carregando...';
        try {
            var response = await fetch(form.action, { method: 'POST', body: new URLSearchParams(new FormData(form)) });
            if (!response.ok) throw new Error(response.status);
            var data = await response.json();
            if (target.tagName === 'TEXTAREA') { target.value = data.text; } else { target.textContent = data.text; }
        } catch (e) {
            target.classList.add('error');
            target.textContent = 'Não foi possível obter uma resposta. Tente novamente.';
        } finally {
            button.disabled = false;
        }
    });
});
"#;

// ============================================================================
// Article Lists
// ============================================================================

fn excerpt(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push('…');
    }
    out
}

pub fn article_list_html(articles: &[Article], default_source: &str, favorites: &[String]) -> String {
    if articles.is_empty() {
        return "<p class=\"muted\">Nenhum artigo para mostrar.</p>".to_string();
    }

    let mut html = String::from("<ul class=\"article-list\">");
    for article in articles {
        let star = if favorites.contains(&article.number) {
            "<span class=\"star on\">★</span> "
        } else {
            ""
        };
        let badge = article
            .source
            .as_deref()
            .map(|s| format!("<span class=\"source-badge\">{}</span>", html_escape(s)))
            .unwrap_or_default();
        html.push_str(&format!(
            r#"<li class="article-item">
                {star}<a href="{href}">Artigo {number}</a>{badge}
                <div class="excerpt">{excerpt}</div>
            </li>"#,
            star = star,
            href = article_path(article.source_or(default_source), &article.number),
            number = html_escape(&article.number),
            badge = badge,
            excerpt = html_escape(&excerpt(&article.text, 180)),
        ));
    }
    html.push_str("</ul>");
    html
}

/// Picker over the spreadsheet's sources; submitting reloads `/browse`.
pub fn source_selector_html(sources: &[SourceInfo], selected: &str) -> String {
    let options: String = sources
        .iter()
        .map(|s| {
            format!(
                "<option value=\"{0}\"{1}>{0}</option>",
                html_escape(&s.title),
                if s.title == selected { " selected" } else { "" }
            )
        })
        .collect();

    format!(
        r#"<form class="source-picker" action="/browse" method="get">
            <select name="source">{}</select>
            <button class="btn">Mostrar</button>
        </form>"#,
        options
    )
}

// ============================================================================
// Article Page
// ============================================================================

pub struct ArticleView<'a> {
    pub article: &'a Article,
    pub source: &'a str,
    /// Article text with highlights already rendered.
    pub body_html: String,
    pub favorite: bool,
    pub annotation: Option<&'a str>,
    pub highlights: &'a [HighlightSpan],
    pub images: &'a [String],
    pub audios: &'a [String],
    pub explanation: Option<&'a str>,
    pub playing: bool,
}

pub fn render_article_page(view: &ArticleView) -> String {
    let number = &view.article.number;
    let source = view.source;
    let api = |action: &str| api_path(source, number, action);

    let star_class = if view.favorite { "star on" } else { "star" };
    let star_label = if view.favorite {
        "Remover dos favoritos"
    } else {
        "Adicionar aos favoritos"
    };

    let speech = if view.playing {
        format!(
            r#"<form method="post" action="/api/speech/stop"><input type="hidden" name="back" value="{}"><button class="btn secondary">■ Parar</button></form>"#,
            html_escape(&article_path(source, number))
        )
    } else {
        format!(
            r#"<form method="post" action="{}"><button class="btn secondary">▶ Ouvir</button></form>"#,
            api("speech")
        )
    };

    let mut html = format!(
        r#"<div class="article-header">
            <h1>Artigo {number_html}<span class="source-badge">{source_html}</span></h1>
            <form method="post" action="{favorite_action}">
                <button class="btn link {star_class}" title="{star_label}">★</button>
            </form>
            {speech}
            <a class="btn secondary" href="{pdf}">PDF</a>
        </div>
        <div class="article-text">{body}</div>"#,
        number_html = html_escape(number),
        source_html = html_escape(source),
        favorite_action = api("favorite"),
        star_class = star_class,
        star_label = star_label,
        speech = speech,
        pdf = format!("{}/export.pdf", article_path(source, number)),
        body = view.body_html,
    );

    html.push_str(&highlights_panel(view, &api));
    html.push_str(&annotation_panel(view, &api));
    html.push_str(&explanation_panel(view, &api));
    html.push_str(&question_panel(&api));
    html.push_str(&media_panel(view, &api));
    html
}

fn highlights_panel(view: &ArticleView, api: &dyn Fn(&str) -> String) -> String {
    let mut items = String::new();
    for span in view.highlights {
        items.push_str(&format!(
            r#"<li><mark class="hl hl-{color}">{text}</mark>
                <form method="post" action="{action}">
                    <input type="hidden" name="text" value="{value}">
                    <button class="btn link">remover</button>
                </form></li>"#,
            color = span.color.as_str(),
            text = html_escape(&span.text),
            action = api("highlights/remove"),
            value = html_escape(&span.text),
        ));
    }

    let options: String = HighlightColor::ALL
        .iter()
        .map(|c| format!("<option value=\"{0}\">{0}</option>", c.as_str()))
        .collect();

    format!(
        r#"<div class="panel">
            <h2>Destaques</h2>
            <ul class="highlight-list">{items}</ul>
            <form method="post" action="{action}">
                <input type="text" name="text" placeholder="Trecho a destacar" required>
                <select name="color">{options}</select>
                <button class="btn">Destacar</button>
            </form>
        </div>"#,
        items = items,
        action = api("highlights"),
        options = options,
    )
}

fn annotation_panel(view: &ArticleView, api: &dyn Fn(&str) -> String) -> String {
    format!(
        r#"<div class="panel">
            <h2>Anotação</h2>
            <form class="stacked" method="post" action="{save}">
                <textarea id="annotation-text" name="text">{text}</textarea>
                <button class="btn">Salvar anotação</button>
            </form>
            <form data-async data-target="annotation-text" method="post" action="{auto}">
                <button class="btn secondary">Gerar anotação automática</button>
            </form>
        </div>"#,
        save = api("annotation"),
        text = html_escape(view.annotation.unwrap_or("")),
        auto = api("annotation/auto"),
    )
}

fn explanation_panel(view: &ArticleView, api: &dyn Fn(&str) -> String) -> String {
    let body = match view.explanation {
        Some(text) => explanation_html(text),
        None => format!(
            r#"<form method="post" action="{}"><button class="btn">Explicar artigo</button></form>"#,
            api("explanation")
        ),
    };
    format!(
        r#"<div class="panel explanation"><h2>Explicação</h2>{}</div>"#,
        body
    )
}

/// Explanation as HTML: named sections when they can be told apart,
/// otherwise the text rendered as markdown.
pub fn explanation_html(text: &str) -> String {
    let parsed = parse_explanation(text);
    let sections = parsed.sections();
    let labeled = sections.labeled();

    let mut html = String::new();
    match &parsed {
        ParsedExplanation::Prose { drifted: true, .. } if !labeled.is_empty() => {
            html.push_str(
                "<p class=\"warning\">As seções abaixo foram separadas automaticamente e podem estar incompletas.</p>",
            );
        }
        _ => {}
    }

    if labeled.is_empty() {
        html.push_str(&render_markdown(text));
        return html;
    }

    for (label, body) in labeled {
        html.push_str(&format!(
            "<section><h3>{}</h3>{}</section>",
            html_escape(label),
            render_markdown(body)
        ));
    }
    if !sections.keywords.is_empty() {
        html.push_str(&format!(
            "<p class=\"keywords\">Palavras-chave: {}</p>",
            html_escape(&sections.keywords.join(", "))
        ));
    }
    html
}

fn question_panel(api: &dyn Fn(&str) -> String) -> String {
    format!(
        r#"<div class="panel">
            <h2>Pergunte sobre o artigo</h2>
            <form data-async data-target="answer" method="post" action="{}">
                <input type="text" name="question" placeholder="Sua pergunta" required>
                <button class="btn">Perguntar</button>
            </form>
            <div id="answer" class="answer"></div>
        </div>"#,
        api("question")
    )
}

fn media_panel(view: &ArticleView, api: &dyn Fn(&str) -> String) -> String {
    let mut images = String::new();
    for (index, uri) in view.images.iter().enumerate() {
        images.push_str(&format!(
            r#"<li><img src="{src}" alt="Imagem {n}">
                <form method="post" action="{action}"><button class="btn link">remover</button></form></li>"#,
            src = html_escape(uri),
            n = index + 1,
            action = api(&format!("images/{}/delete", index)),
        ));
    }

    let mut audios = String::new();
    for (index, uri) in view.audios.iter().enumerate() {
        audios.push_str(&format!(
            r#"<li><audio controls src="{src}"></audio>
                <form method="post" action="{action}"><button class="btn link">remover</button></form></li>"#,
            src = html_escape(uri),
            action = api(&format!("audios/{}/delete", index)),
        ));
    }

    format!(
        r#"<div class="panel">
            <h2>Imagens</h2>
            <ul class="media-list">{images}</ul>
            <form method="post" action="{image_action}" enctype="multipart/form-data">
                <input type="file" name="file" accept="image/*" required>
                <button class="btn">Anexar imagem</button>
            </form>
            <h2>Áudios</h2>
            <ul class="media-list">{audios}</ul>
            <form method="post" action="{audio_action}" enctype="multipart/form-data">
                <input type="file" name="file" accept="audio/*" capture required>
                <button class="btn">Anexar áudio</button>
            </form>
        </div>"#,
        images = images,
        image_action = api("images"),
        audios = audios,
        audio_action = api("audios"),
    )
}
