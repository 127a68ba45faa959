use crate::config::FencedCodeConfig;
use crate::highlight::{Highlighter, SyntectHighlighter};
use crate::render::preprocess_markdown;
use crate::reporting;
use anyhow::Result;
use mdbook::book::{Book, BookItem};
use mdbook::preprocess::{Preprocessor, PreprocessorContext};
use std::collections::HashMap;
use std::sync::Arc;

/// An mdBook preprocessor that renders tilde-fenced code blocks.
///
/// # Overview
///
/// Every chapter is run through its own [`FenceScanner`](crate::FenceScanner).
/// Code blocks come out as raw `<pre>` HTML, escaped or highlighted with
/// syntect, and `quote`/`quoted` blocks come out as Markdown blockquotes.
/// Backtick fences are left alone for mdBook's own renderer.
///
/// # Configuration
///
/// Highlighting is configured in `book.toml` under
/// `[preprocessor.fenced-code.codehilite]`. Without it, code is only escaped.
///
/// # Example
///
/// ```toml
/// [preprocessor.fenced-code]
///
/// [preprocessor.fenced-code.codehilite]
/// linenums = true
/// css_class = "codehilite"
/// ```
pub struct FencedCodePreprocessor;

impl FencedCodePreprocessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FencedCodePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor for FencedCodePreprocessor {
    fn name(&self) -> &str {
        "fenced-code"
    }

    fn run(&self, ctx: &PreprocessorContext, mut book: Book) -> Result<Book> {
        let config = FencedCodeConfig::from_preprocessor_context(ctx)?;

        // Shared by every chapter; syntaxes are only loaded if a block needs them
        let highlighter: Arc<dyn Highlighter> = Arc::new(SyntectHighlighter::new());

        let src_dir = ctx.root.join(&ctx.config.book.src);

        let mut stats: HashMap<String, usize> = HashMap::new();
        let mut chapters = 0;
        let mut failures = Vec::new();

        // Book::for_each_mut() visits nested chapters at all depths
        book.for_each_mut(|item| {
            let BookItem::Chapter(chapter) = item else {
                return;
            };
            let Some(chapter_path) = &chapter.path else {
                return;
            };

            log::info!("Processing chapter: {}", chapter.name);

            let mut scanner = config.scanner(&highlighter);
            match preprocess_markdown(&chapter.content, &mut scanner, config.safe_mode) {
                Ok(content) => {
                    chapter.content = content;
                    chapters += 1;
                    for (lang, count) in scanner.stats() {
                        *stats.entry(lang.clone()).or_insert(0) += count;
                    }
                }
                Err(e) => {
                    let full_path = src_dir.join(chapter_path);
                    log::error!("Failed to process {}: {:#}", full_path.display(), e);
                    failures.push((full_path.display().to_string(), e));
                }
            }
        });

        if !failures.is_empty() {
            reporting::report_failures(&failures);
            anyhow::bail!(
                "Fenced code processing failed in {} chapter(s)",
                failures.len()
            );
        }

        reporting::report_summary(&stats, chapters);
        Ok(book)
    }

    fn supports_renderer(&self, renderer: &str) -> bool {
        renderer == "html"
    }
}
