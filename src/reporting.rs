use chrono::Local;
use std::collections::HashMap;

/// Formats a message with mdBook-style timestamp and prefix.
fn format_line(level: &str, message: &str) -> String {
    format!(
        "{} [{}] (mdbook_fenced_code): {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        level,
        message
    )
}

/// Formats per-language counts, sorted by language.
///
/// Format: "python: 2, quote: 1, text: 3"
pub fn format_stats(stats: &HashMap<String, usize>) -> String {
    let mut sorted_stats: Vec<_> = stats.iter().collect();
    sorted_stats.sort_by_key(|(lang, _)| *lang);

    sorted_stats
        .iter()
        .map(|(lang, count)| format!("{}: {}", lang, count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prints the end-of-run summary in mdBook log format.
///
/// Always visible, regardless of log level.
pub fn report_summary(stats: &HashMap<String, usize>, chapters: usize) {
    let total_blocks: usize = stats.values().sum();

    if total_blocks > 0 {
        eprintln!(
            "{}",
            format_line(
                "INFO",
                &format!(
                    "Processed {} fenced block(s) in {} chapter(s) ({})",
                    total_blocks,
                    chapters,
                    format_stats(stats)
                )
            )
        );
    } else {
        eprintln!("{}", format_line("INFO", "No fenced blocks found"));
    }
}

/// Prints one error line per failed chapter, followed by the error chain.
pub fn report_failures(failures: &[(String, anyhow::Error)]) {
    eprintln!(
        "{}",
        format_line("ERROR", "Failed to process fenced code in the following chapters:")
    );
    for (chapter, error) in failures {
        eprintln!("{}", format_line("ERROR", &format!("  {}", chapter)));
        for line in format!("{:#}", error).lines() {
            eprintln!("{}", format_line("ERROR", &format!("    {}", line)));
        }
    }
}
