use crate::fence::FenceScanner;
use crate::highlight::{
    HighlightOptions, Highlighter, SyntectHighlighter, DEFAULT_CSS_CLASS, DEFAULT_STYLE,
};
use anyhow::{Context, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Configuration for the fenced-code preprocessor.
///
/// This structure is deserialized from the `[preprocessor.fenced-code]` section
/// of `book.toml`, or from a standalone TOML file holding the same keys.
/// Without a `codehilite` table, code is escaped and wrapped in `<pre><code>`.
///
/// # Example
///
/// ```toml
/// [preprocessor.fenced-code]
/// safe-mode = false
///
/// [preprocessor.fenced-code.codehilite]
/// linenums = false
/// guess_lang = true
/// css_class = "codehilite"
/// style = "InspiredGitHub"
/// noclasses = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct FencedCodeConfig {
    /// Escape raw HTML written in the document, and any stashed markup not marked safe
    pub safe_mode: bool,

    /// Syntax highlighting settings; absent means no highlighting
    pub codehilite: Option<CodeHiliteConfig>,
}

/// Syntax highlighting settings.
///
/// Every value may also be written as a single-element array (`linenums = [true]`),
/// in which case the first element is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeHiliteConfig {
    /// Number every line of highlighted code
    #[serde(default, alias = "force_linenos", deserialize_with = "first_value")]
    pub linenums: bool,

    /// Guess the language of untagged blocks
    #[serde(default = "default_true", deserialize_with = "first_value")]
    pub guess_lang: bool,

    /// CSS class of the `<pre>` element
    #[serde(default = "default_css_class", deserialize_with = "first_value")]
    pub css_class: String,

    /// Theme name, only used with `noclasses`
    #[serde(
        default = "default_style",
        alias = "pygments_style",
        deserialize_with = "first_value"
    )]
    pub style: String,

    /// Emit inline styles instead of CSS classes
    #[serde(default, deserialize_with = "first_value")]
    pub noclasses: bool,
}

fn default_true() -> bool {
    true
}

fn default_css_class() -> String {
    DEFAULT_CSS_CLASS.to_string()
}

fn default_style() -> String {
    DEFAULT_STYLE.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Setting<T> {
    Bare(T),
    Listed(Vec<T>),
}

/// Accepts `value` or `[value]` and yields `value`
fn first_value<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    match Setting::<T>::deserialize(deserializer)? {
        Setting::Bare(value) => Ok(value),
        Setting::Listed(values) => values
            .into_iter()
            .next()
            .ok_or_else(|| D::Error::custom("expected a value, found an empty list")),
    }
}

impl Default for CodeHiliteConfig {
    fn default() -> Self {
        Self {
            linenums: false,
            guess_lang: default_true(),
            css_class: default_css_class(),
            style: default_style(),
            noclasses: false,
        }
    }
}

impl CodeHiliteConfig {
    /// Validate the configuration for correctness
    pub fn validate(&self) -> Result<()> {
        if self.css_class.is_empty() {
            anyhow::bail!("css_class cannot be empty");
        }

        // The class is written into an attribute verbatim
        for ch in ['"', '<', '>', '&'] {
            if self.css_class.contains(ch) {
                anyhow::bail!(
                    "css_class contains invalid character '{}': {}",
                    ch,
                    self.css_class
                );
            }
        }

        if self.noclasses && !SyntectHighlighter::new().has_theme(&self.style) {
            anyhow::bail!("Unknown highlight style '{}'", self.style);
        }

        Ok(())
    }

    /// The options handed to the highlighter with every block
    pub fn options(&self) -> HighlightOptions {
        HighlightOptions {
            line_numbers: self.linenums,
            guess_language: self.guess_lang,
            css_class: self.css_class.clone(),
            style: self.style.clone(),
            no_css_classes: self.noclasses,
        }
    }
}

impl FencedCodeConfig {
    /// Parse configuration from mdbook PreprocessorContext
    pub fn from_preprocessor_context(
        ctx: &mdbook::preprocess::PreprocessorContext,
    ) -> Result<Self> {
        let config: FencedCodeConfig =
            if let Some(config_value) = ctx.config.get("preprocessor.fenced-code") {
                config_value
                    .clone()
                    .try_into()
                    .context("Invalid [preprocessor.fenced-code] configuration")?
            } else {
                Self::default()
            };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: FencedCodeConfig =
            toml::from_str(source).context("Failed to parse fenced-code configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&source).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(codehilite) = &self.codehilite {
            codehilite
                .validate()
                .context("Invalid codehilite configuration")?;
        }
        Ok(())
    }

    /// Builds a scanner for one document.
    ///
    /// `highlighter` is only used when a `codehilite` table is configured.
    pub fn scanner(&self, highlighter: &Arc<dyn Highlighter>) -> FenceScanner {
        match &self.codehilite {
            Some(codehilite) => {
                FenceScanner::with_highlighter(Arc::clone(highlighter), codehilite.options())
            }
            None => FenceScanner::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_disables_highlighting() {
        let config = FencedCodeConfig::from_toml_str("").unwrap();
        assert!(config.codehilite.is_none());
        assert!(!config.safe_mode);

        let highlighter: Arc<dyn Highlighter> = Arc::new(SyntectHighlighter::new());
        assert!(!config.scanner(&highlighter).is_highlighting());
    }

    #[test]
    fn test_codehilite_defaults() {
        let config = FencedCodeConfig::from_toml_str("[codehilite]\n").unwrap();
        let options = config.codehilite.unwrap().options();
        assert_eq!(options, HighlightOptions::default());
    }

    #[test]
    fn test_full_config() {
        let config = FencedCodeConfig::from_toml_str(
            r#"
safe-mode = true

[codehilite]
linenums = true
guess_lang = false
css_class = "highlight"
style = "base16-ocean.dark"
noclasses = true
"#,
        )
        .unwrap();

        assert!(config.safe_mode);
        let options = config.codehilite.unwrap().options();
        assert!(options.line_numbers);
        assert!(!options.guess_language);
        assert_eq!(options.css_class, "highlight");
        assert_eq!(options.style, "base16-ocean.dark");
        assert!(options.no_css_classes);
    }

    #[test]
    fn test_single_element_lists_and_aliases() {
        let config = FencedCodeConfig::from_toml_str(
            r#"
[codehilite]
force_linenos = [true]
guess_lang = [false]
css_class = ["hl"]
pygments_style = ["Solarized (dark)"]
"#,
        )
        .unwrap();

        let codehilite = config.codehilite.unwrap();
        assert!(codehilite.linenums);
        assert!(!codehilite.guess_lang);
        assert_eq!(codehilite.css_class, "hl");
        assert_eq!(codehilite.style, "Solarized (dark)");
    }

    #[test]
    fn test_empty_list_is_rejected() {
        assert!(FencedCodeConfig::from_toml_str("[codehilite]\nlinenums = []\n").is_err());
    }

    #[test]
    fn test_invalid_css_class() {
        let err = FencedCodeConfig::from_toml_str("[codehilite]\ncss_class = 'a\"b'\n").unwrap_err();
        assert!(format!("{:#}", err).contains("css_class"));

        assert!(FencedCodeConfig::from_toml_str("[codehilite]\ncss_class = ''\n").is_err());
    }

    #[test]
    fn test_unknown_style_only_matters_with_noclasses() {
        assert!(FencedCodeConfig::from_toml_str("[codehilite]\nstyle = 'nope'\n").is_ok());

        let err =
            FencedCodeConfig::from_toml_str("[codehilite]\nstyle = 'nope'\nnoclasses = true\n")
                .unwrap_err();
        assert!(format!("{:#}", err).contains("nope"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fenced-code.toml");
        fs::write(&path, "[codehilite]\nlinenums = true\n").unwrap();

        let config = FencedCodeConfig::load(&path).unwrap();
        assert!(config.codehilite.unwrap().linenums);

        assert!(FencedCodeConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
