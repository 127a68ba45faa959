use crate::fence::{escape_html, FenceScanner};
use crate::stash::HtmlStash;
use anyhow::Result;
use pulldown_cmark::{html, Event, Options, Parser};

/// Appended to every document before scanning, so that a trailing unterminated
/// fence is closed ahead of the final paragraph break.
const DOCUMENT_END: &str = "\n\n";

/// Renders a Markdown document to HTML.
///
/// Fenced blocks are taken out by `scanner` first and parked in a stash, the
/// rest is rendered with pulldown-cmark, and the stashed markup is put back
/// where the placeholders ended up.
///
/// With `safe_mode` on, raw HTML written in the document is escaped. Markup
/// produced by the scanner is stored as safe and passes through untouched.
///
/// # Example
///
/// ```
/// use mdbook_fenced_code::{render_markdown, FenceScanner};
///
/// let html = render_markdown("~~~ c\nint x;\n~~~\n", &mut FenceScanner::new(), false).unwrap();
/// assert_eq!(html, "<pre><code class=\"c\">int x;\n</code></pre>\n");
/// ```
pub fn render_markdown(source: &str, scanner: &mut FenceScanner, safe_mode: bool) -> Result<String> {
    let mut stash = HtmlStash::new();
    let text = scan(source, scanner, &mut stash)?;

    let parser = Parser::new_ext(&text, markdown_options()).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) if safe_mode => Event::Text(raw),
        event => event,
    });

    let mut rendered = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut rendered, parser);

    Ok(stash.restore(&rendered, safe_mode))
}

/// Replaces fenced blocks in a Markdown document and returns Markdown.
///
/// Stashed markup is restored straight into the text. Every fragment starts with
/// `<pre`, so a downstream CommonMark renderer passes it through as one raw HTML
/// block. Quote blocks come back as ordinary `>` blockquotes.
///
/// With `safe_mode` on, raw HTML written in the document is escaped in place
/// before the stash is restored, so it renders as literal text.
pub fn preprocess_markdown(
    source: &str,
    scanner: &mut FenceScanner,
    safe_mode: bool,
) -> Result<String> {
    let mut stash = HtmlStash::new();
    let mut text = scan(source, scanner, &mut stash)?;
    if safe_mode {
        text = escape_raw_html(&text);
    }
    let restored = stash.restore(&text, safe_mode);

    Ok(restored
        .strip_suffix(DOCUMENT_END)
        .unwrap_or(&restored)
        .to_string())
}

fn scan(source: &str, scanner: &mut FenceScanner, stash: &mut HtmlStash) -> Result<String> {
    let mut normalized = source.replace("\r\n", "\n").replace('\r', "\n");
    normalized.push_str(DOCUMENT_END);

    let lines = normalized.split('\n').map(str::to_string).collect();
    let lines = scanner.transform(lines, stash)?;

    log::debug!("Stashed {} fragment(s)", stash.len());
    Ok(lines.join("\n"))
}

/// Escapes the source of every raw HTML block and inline tag in `text`.
fn escape_raw_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut last = 0;

    for (event, range) in Parser::new_ext(text, markdown_options()).into_offset_iter() {
        if matches!(event, Event::Html(_) | Event::InlineHtml(_)) && range.start >= last {
            escaped.push_str(&text[last..range.start]);
            escaped.push_str(&escape_html(&text[range.start..range.end]));
            last = range.end;
        }
    }

    escaped.push_str(&text[last..]);
    escaped
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options
}
