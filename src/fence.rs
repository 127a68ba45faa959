use crate::highlight::{HighlightOptions, Highlighter};
use crate::stash::PlaceholderStore;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Minimum number of tildes in a fence marker
const MIN_FENCE_LEN: usize = 3;

/// Language tags that turn a fenced block into a blockquote instead of code
const QUOTE_TAGS: [&str; 2] = ["quote", "quoted"];

/// Stats label for blocks without a language tag
const UNTAGGED_LABEL: &str = "text";

/// A fence marker line: a run of tildes plus an optional language tag.
///
/// The tag may be written as `python`, `.python`, `{python}` or `{.python}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceMarker<'a> {
    /// The literal tilde run. A block is only closed by a line with this exact run.
    pub fence: &'a str,
    /// The language tag, empty when none was given
    pub language: &'a str,
}

/// A complete fenced block found in a document.
///
/// `start..end` covers the opening fence through the end of the closing fence
/// line (trailing spaces included, newline excluded). `code` is everything in
/// between and keeps its final newline.
///
/// # Example
///
/// ````markdown
/// ~~~~{.python}
/// # Some python code
/// ~~~~
/// ````
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    pub start: usize,
    pub end: usize,
    pub fence: &'a str,
    pub language: &'a str,
    pub code: &'a str,
}

/// The highlighter a scanner was built with, and the options it passes along.
struct Highlighting {
    highlighter: Arc<dyn Highlighter>,
    options: HighlightOptions,
}

/// Replaces tilde-fenced code blocks in a document.
///
/// # Overview
///
/// Each complete block is rendered to HTML, parked in a [`PlaceholderStore`], and
/// replaced by the returned token on a line of its own. Blocks tagged `quote` or
/// `quoted` become a Markdown blockquote instead and are not stashed.
///
/// After all complete blocks are gone, one unterminated fence at the end of the
/// document is repaired by appending a matching closing fence. Only one repair is
/// attempted; anything still unmatched stays in the output as literal text.
///
/// One scanner belongs to one document at a time. The highlighter, if any, is
/// handed in at construction and may be shared between scanners.
pub struct FenceScanner {
    highlighting: Option<Highlighting>,
    stats: HashMap<String, usize>,
}

impl FenceScanner {
    /// Creates a scanner that renders code as escaped `<pre><code>` markup.
    pub fn new() -> Self {
        Self {
            highlighting: None,
            stats: HashMap::new(),
        }
    }

    /// Creates a scanner that renders code through `highlighter`.
    pub fn with_highlighter(highlighter: Arc<dyn Highlighter>, options: HighlightOptions) -> Self {
        Self {
            highlighting: Some(Highlighting {
                highlighter,
                options,
            }),
            stats: HashMap::new(),
        }
    }

    /// Whether code is rendered through a highlighter
    pub fn is_highlighting(&self) -> bool {
        self.highlighting.is_some()
    }

    /// Number of blocks processed so far, keyed by language tag.
    ///
    /// Quote blocks are counted under `quote`, untagged blocks under `text`.
    pub fn stats(&self) -> &HashMap<String, usize> {
        &self.stats
    }

    /// Total number of blocks processed so far
    pub fn processed(&self) -> usize {
        self.stats.values().sum()
    }

    /// Replaces every fenced block in `lines` and returns the new lines.
    ///
    /// # Errors
    ///
    /// The scanner itself never fails. Errors from the highlighter are returned
    /// as-is, with the language of the offending block attached.
    pub fn transform(
        &mut self,
        lines: Vec<String>,
        stash: &mut dyn PlaceholderStore,
    ) -> Result<Vec<String>> {
        let mut text = lines.join("\n");
        let mut end = 0;

        // Substitutions change the text length, so every pass searches from the start
        while let Some(block) = find_fenced_block(&text) {
            let span = block.start..block.end;
            let replacement = self.process_fence(&block, stash)?;
            end = span.start + replacement.len();
            text.replace_range(span, &replacement);
        }

        if let Some(marker) = find_dangling_fence(&text, end) {
            let fence = marker.fence.to_string();
            log::debug!("Closing unterminated fence {:?} at end of document", fence);

            // Keep the closing fence ahead of the paragraph break that ends the document
            if text.ends_with("\n\n") {
                let at = text.len() - 2;
                text.insert_str(at, &format!("\n{}", fence));
            } else {
                text.push_str(&fence);
            }

            match find_fenced_block(&text) {
                Some(block) => {
                    let span = block.start..block.end;
                    let replacement = self.process_fence(&block, stash)?;
                    text.replace_range(span, &replacement);
                }
                None => log::warn!("Unterminated fence {:?} left as text", fence),
            }
        }

        Ok(text.split('\n').map(str::to_string).collect())
    }

    /// Renders one block and returns the text that replaces it.
    fn process_fence(
        &mut self,
        block: &FencedBlock<'_>,
        stash: &mut dyn PlaceholderStore,
    ) -> Result<String> {
        if QUOTE_TAGS.contains(&block.language) {
            log::debug!("Quoting fenced block at offset {}", block.start);
            self.record(QUOTE_TAGS[0]);
            return Ok(format!("\n{}\n", quote_paragraphs(block.code)));
        }

        let language = (!block.language.is_empty()).then_some(block.language);

        let html = match &self.highlighting {
            Some(highlighting) => highlighting
                .highlighter
                .highlight(block.code, language, &highlighting.options)
                .with_context(|| {
                    format!(
                        "Failed to highlight {} block",
                        language.unwrap_or(UNTAGGED_LABEL)
                    )
                })?,
            None => wrap_code(block.code, language),
        };

        log::debug!(
            "Stashing {} block at offset {}",
            language.unwrap_or(UNTAGGED_LABEL),
            block.start
        );
        self.record(language.unwrap_or(UNTAGGED_LABEL));

        let token = stash.store(html, true);
        Ok(format!("\n{}\n", token))
    }

    fn record(&mut self, label: &str) {
        *self.stats.entry(label.to_string()).or_insert(0) += 1;
    }
}

impl Default for FenceScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds the leftmost complete fenced block in `text`.
///
/// The opening line is a tilde run of three or more, optional spaces, an optional
/// language tag and optional trailing spaces. The closing line must start with
/// the same tilde run (a longer or shorter run does not count) followed only by
/// spaces. The body is the shortest run of lines between the two, so the first
/// matching closing line wins.
pub fn find_fenced_block(text: &str) -> Option<FencedBlock<'_>> {
    let lines: Vec<(usize, &str)> = line_spans(text).collect();

    for (i, &(start, line)) in lines.iter().enumerate() {
        let Some(marker) = parse_marker(line, true) else {
            continue;
        };

        let body_start = start + line.len() + 1;
        let closing = lines[i + 1..]
            .iter()
            .find(|(_, candidate)| closes(candidate, marker.fence));

        if let Some(&(close_start, close_line)) = closing {
            return Some(FencedBlock {
                start,
                end: close_start + close_line.len(),
                fence: marker.fence,
                language: marker.language,
                code: &text[body_start..close_start],
            });
        }
    }

    None
}

/// Finds the first line at or after byte offset `from` that is a fence marker on
/// its own.
///
/// Unlike an opening fence, no spaces may follow a non-empty language tag.
pub fn find_dangling_fence(text: &str, from: usize) -> Option<FenceMarker<'_>> {
    line_spans(text)
        .filter(|&(start, _)| start >= from)
        .find_map(|(_, line)| parse_marker(line, false))
}

/// Turns a quoted block body into Markdown blockquote text.
///
/// Paragraphs are separated by blank lines. Every non-empty line gets a `"> "`
/// prefix; the blank lines between paragraphs are kept unprefixed.
pub fn quote_paragraphs(code: &str) -> String {
    code.split("\n\n")
        .map(|paragraph| {
            paragraph
                .split('\n')
                .filter(|line| !line.is_empty())
                .map(|line| format!("> {}", line))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Basic HTML escaping of `&`, `<`, `>` and `"`.
///
/// `&` goes first so the entities produced by the later replacements are left
/// alone. Escaping is not idempotent: call it exactly once per text.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Plain `<pre><code>` markup, used when no highlighter is configured
fn wrap_code(code: &str, language: Option<&str>) -> String {
    match language {
        Some(lang) => format!(
            "<pre><code class=\"{}\">{}</code></pre>",
            lang,
            escape_html(code)
        ),
        None => format!("<pre><code>{}</code></pre>", escape_html(code)),
    }
}

/// Yields `(byte offset, line)` for every `\n`-separated line of `text`
fn line_spans(text: &str) -> impl Iterator<Item = (usize, &str)> + '_ {
    let mut offset = 0;
    text.split('\n').map(move |line| {
        let start = offset;
        offset += line.len() + 1;
        (start, line)
    })
}

/// Parses a fence marker line.
///
/// `trailing_spaces` allows spaces after the language tag, as opening fences do.
fn parse_marker(line: &str, trailing_spaces: bool) -> Option<FenceMarker<'_>> {
    let run = line.len() - line.trim_start_matches('~').len();
    if run < MIN_FENCE_LEN {
        return None;
    }

    let (fence, rest) = line.split_at(run);
    let rest = rest.trim_start_matches(' ');
    let rest = rest.strip_prefix('{').unwrap_or(rest);
    let rest = rest.strip_prefix('.').unwrap_or(rest);

    let tag_len = rest.len() - rest.trim_start_matches(is_tag_char).len();
    let (language, rest) = rest.split_at(tag_len);

    let rest = rest.strip_prefix('}').unwrap_or(rest);
    let rest = if trailing_spaces {
        rest.trim_start_matches(' ')
    } else {
        rest
    };

    rest.is_empty().then_some(FenceMarker { fence, language })
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-')
}

/// Whether `line` closes a block opened with `fence`
fn closes(line: &str, fence: &str) -> bool {
    line.strip_prefix(fence)
        .is_some_and(|rest| rest.bytes().all(|b| b == b' '))
}
