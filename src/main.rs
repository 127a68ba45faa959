use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mdbook::preprocess::{CmdPreprocessor, Preprocessor};
use mdbook_fenced_code::{
    render_markdown, FencedCodeConfig, FencedCodePreprocessor, Highlighter, SyntectHighlighter,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::Arc;

/// mdBook preprocessor for tilde-fenced code blocks
#[derive(Parser)]
#[command(name = "mdbook-fenced-code", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether a renderer is supported (used by mdBook)
    Supports { renderer: String },

    /// Render a Markdown file to HTML on stdout
    Render {
        /// Markdown file to render
        file: PathBuf,

        /// TOML file with fenced-code settings (same keys as in book.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Escape raw HTML in the document
        #[arg(long)]
        safe_mode: bool,
    },
}

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Command::Supports { renderer }) => {
            let preprocessor = FencedCodePreprocessor::new();
            if preprocessor.supports_renderer(&renderer) {
                exit(0);
            } else {
                exit(1);
            }
        }
        Some(Command::Render {
            file,
            config,
            safe_mode,
        }) => handle_render(file, config, safe_mode),
        None => handle_preprocessing(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

fn handle_preprocessing() -> Result<()> {
    let (ctx, book) = CmdPreprocessor::parse_input(io::stdin())?;

    if ctx.mdbook_version != mdbook::MDBOOK_VERSION {
        log::warn!(
            "mdbook-fenced-code was built against mdbook {}, but is being called from mdbook {}",
            mdbook::MDBOOK_VERSION,
            ctx.mdbook_version
        );
    }

    let preprocessor = FencedCodePreprocessor::new();
    let processed_book = preprocessor.run(&ctx, book)?;

    serde_json::to_writer(io::stdout(), &processed_book)?;

    Ok(())
}

fn handle_render(file: PathBuf, config: Option<PathBuf>, safe_mode: bool) -> Result<()> {
    let html = render_file(&file, config.as_deref(), safe_mode)?;
    print!("{}", html);
    Ok(())
}

/// Renders one Markdown file. `--safe-mode` and `safe-mode` from the config
/// file each turn safe mode on.
fn render_file(file: &Path, config: Option<&Path>, safe_mode: bool) -> Result<String> {
    let config = match config {
        Some(path) => FencedCodeConfig::load(path)?,
        None => FencedCodeConfig::default(),
    };

    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let highlighter: Arc<dyn Highlighter> = Arc::new(SyntectHighlighter::new());
    let mut scanner = config.scanner(&highlighter);

    let html = render_markdown(&source, &mut scanner, safe_mode || config.safe_mode)?;

    log::info!(
        "Rendered {} fenced block(s) from {}",
        scanner.processed(),
        file.display()
    );

    Ok(html)
}
