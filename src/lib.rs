//! mdbook-fenced-code library
//!
//! This library provides a preprocessor for tilde-fenced code blocks in Markdown.
//! Every `~~~` block is replaced by an opaque placeholder that stands for
//! pre-rendered HTML (escaped, or highlighted with syntect), or, for the
//! `quote`/`quoted` tags, by a Markdown blockquote. The primary interface is the
//! mdbook-fenced-code binary, but the library can be used programmatically for
//! testing or custom integrations.
//!
//! ## Public API
//!
//! - [`FenceScanner`] - The scanner itself
//! - [`HtmlStash`] / [`PlaceholderStore`] - Where rendered markup is parked
//! - [`Highlighter`] / [`SyntectHighlighter`] - Optional syntax highlighting
//! - [`render_markdown`] - Scan, render to HTML and restore stashed markup
//! - [`FencedCodePreprocessor`] - The mdBook `Preprocessor` implementation

mod config;
mod fence;
mod highlight;
mod preprocessor;
mod render;
mod reporting;
mod stash;

pub use config::{CodeHiliteConfig, FencedCodeConfig};
pub use fence::{
    escape_html, find_dangling_fence, find_fenced_block, quote_paragraphs, FenceMarker,
    FenceScanner, FencedBlock,
};
pub use highlight::{HighlightOptions, Highlighter, SyntectHighlighter};
pub use preprocessor::FencedCodePreprocessor;
pub use render::{preprocess_markdown, render_markdown};
pub use stash::{placeholder, HtmlStash, PlaceholderStore, StashedHtml};
