use anyhow::{anyhow, Context, Result};
use std::sync::OnceLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::html::{
    styled_line_to_highlighted_html, ClassStyle, ClassedHTMLGenerator, IncludeBackground,
};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// Default CSS class on the `<pre>` element of highlighted code
pub const DEFAULT_CSS_CLASS: &str = "codehilite";

/// Default theme for inline-styled output
pub const DEFAULT_STYLE: &str = "InspiredGitHub";

/// Options passed to a [`Highlighter`] with every block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightOptions {
    /// Prefix every line with its line number
    pub line_numbers: bool,
    /// Guess the language of untagged blocks from their first line
    pub guess_language: bool,
    /// CSS class of the wrapping `<pre>` element
    pub css_class: String,
    /// Theme used for inline styles
    pub style: String,
    /// Emit inline `style` attributes instead of CSS classes
    pub no_css_classes: bool,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            line_numbers: false,
            guess_language: true,
            css_class: DEFAULT_CSS_CLASS.to_string(),
            style: DEFAULT_STYLE.to_string(),
            no_css_classes: false,
        }
    }
}

/// Renders a block of code to HTML.
///
/// `code` is the raw block body. `language` is `None` for untagged blocks.
/// Implementations are shared between documents, hence `Send + Sync`.
pub trait Highlighter: Send + Sync {
    fn highlight(
        &self,
        code: &str,
        language: Option<&str>,
        options: &HighlightOptions,
    ) -> Result<String>;
}

/// A [`Highlighter`] backed by syntect's bundled syntaxes and themes.
///
/// The syntax and theme sets are loaded on first use and kept for the lifetime of
/// the highlighter, so constructing one that is never used costs nothing.
///
/// Output always starts with `<pre`, which keeps it a single raw HTML block when
/// it is spliced back into Markdown, even if the code contains blank lines.
#[derive(Default)]
pub struct SyntectHighlighter {
    syntaxes: OnceLock<SyntaxSet>,
    themes: OnceLock<ThemeSet>,
}

impl SyntectHighlighter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is one of the themes syntect ships
    pub fn has_theme(&self, name: &str) -> bool {
        self.themes().themes.contains_key(name)
    }

    fn syntaxes(&self) -> &SyntaxSet {
        self.syntaxes.get_or_init(|| {
            log::debug!("Loading syntax definitions");
            SyntaxSet::load_defaults_newlines()
        })
    }

    fn themes(&self) -> &ThemeSet {
        self.themes.get_or_init(|| {
            log::debug!("Loading highlight themes");
            ThemeSet::load_defaults()
        })
    }

    fn find_syntax(&self, code: &str, language: Option<&str>, guess: bool) -> &SyntaxReference {
        let ss = self.syntaxes();
        let found = match language {
            Some(lang) => ss.find_syntax_by_token(lang),
            None if guess => code.lines().next().and_then(|l| ss.find_syntax_by_first_line(l)),
            None => None,
        };

        found.unwrap_or_else(|| {
            if let Some(lang) = language {
                log::debug!("No syntax for '{}', using plain text", lang);
            }
            ss.find_syntax_plain_text()
        })
    }

    fn classed(&self, code: &str, syntax: &SyntaxReference) -> Result<String> {
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, self.syntaxes(), ClassStyle::Spaced);
        for line in LinesWithEndings::from(code) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .with_context(|| format!("Failed to highlight line {:?}", line))?;
        }
        Ok(generator.finalize())
    }

    fn inline_styled(
        &self,
        code: &str,
        syntax: &SyntaxReference,
        style: &str,
    ) -> Result<(String, String)> {
        let theme = self
            .themes()
            .themes
            .get(style)
            .ok_or_else(|| anyhow!("Unknown highlight style '{}'", style))?;

        let mut lines = HighlightLines::new(syntax, theme);
        let mut body = String::with_capacity(code.len() * 4);
        for line in LinesWithEndings::from(code) {
            let regions = lines
                .highlight_line(line, self.syntaxes())
                .with_context(|| format!("Failed to highlight line {:?}", line))?;
            body.push_str(&styled_line_to_highlighted_html(
                &regions[..],
                IncludeBackground::No,
            )?);
        }

        let pre_style = match theme.settings.background {
            Some(c) => format!(" style=\"background-color:#{:02x}{:02x}{:02x};\"", c.r, c.g, c.b),
            None => String::new(),
        };

        Ok((body, pre_style))
    }
}

impl Highlighter for SyntectHighlighter {
    fn highlight(
        &self,
        code: &str,
        language: Option<&str>,
        options: &HighlightOptions,
    ) -> Result<String> {
        let syntax = self.find_syntax(code, language, options.guess_language);

        let (body, pre_style) = if options.no_css_classes {
            self.inline_styled(code, syntax, &options.style)?
        } else {
            (self.classed(code, syntax)?, String::new())
        };

        let body = if options.line_numbers {
            number_lines(&body, code.lines().count())
        } else {
            body
        };

        let code_class = match language {
            Some(lang) if !options.no_css_classes => format!(" class=\"language-{}\"", lang),
            _ => String::new(),
        };

        Ok(format!(
            "<pre class=\"{}\"{}><code{}>{}</code></pre>",
            options.css_class, pre_style, code_class, body
        ))
    }
}

/// Prefixes the first `count` lines of `html` with a line number span.
///
/// Spans may still be open at a line break; the number span is a complete
/// element, so nesting it inside them keeps the markup well formed. Anything
/// after the last source line (closing tags) is left unnumbered.
fn number_lines(html: &str, count: usize) -> String {
    let width = count.to_string().len();
    let mut numbered = String::with_capacity(html.len() + count * (width + 30));

    for (i, line) in html.split_inclusive('\n').enumerate() {
        if i < count {
            numbered.push_str(&format!(
                "<span class=\"lineno\">{:>width$} </span>",
                i + 1,
                width = width
            ));
        }
        numbered.push_str(line);
    }

    numbered
}
