//! Integration tests for mdbook-fenced-code
//!
//! These tests verify the full end-to-end workflow by running the
//! preprocessor against test fixtures in isolated environments.
//!
//! ## Test Architecture
//!
//! Each test uses `TestFixture` to create an isolated environment with:
//! - Temporary book directory (copy of fixtures)
//! - Automatic cleanup via RAII (Drop trait)
//!
//! ## Adding New Tests
//!
//! 1. Create a new fixture in tests/fixtures/ if needed
//! 2. Use `TestFixture::new_from("path/to/fixture")`
//! 3. Assert on the returned Result or Book

mod common;

use anyhow::Result;
use common::{chapter_content, PreprocessorTest, TestFixture};
use mdbook::MDBook;

// ===== Tests =====

#[test]
fn integration_code_blocks_become_html() -> Result<()> {
    let fixture = TestFixture::new()?;
    let book = PreprocessorTest::from_fixture(&fixture)?.run()?;

    let content = chapter_content(&book, "Basics").expect("Basics chapter");

    assert!(
        content.contains(
            "<pre><code class=\"python\">if a &lt; b and c &gt; d:\n    print(&quot;yes&quot;)\n</code></pre>"
        ),
        "{}",
        content
    );
    assert!(!content.contains("~~~"), "{}", content);
    assert!(!content.contains("wzxhzdk"), "{}", content);
    Ok(())
}

#[test]
fn integration_quote_blocks_become_blockquotes() -> Result<()> {
    let fixture = TestFixture::new()?;
    let book = PreprocessorTest::from_fixture(&fixture)?.run()?;

    let content = chapter_content(&book, "Basics").expect("Basics chapter");

    assert!(
        content.contains("> First line\n> second line\n\n> Next paragraph"),
        "{}",
        content
    );
    Ok(())
}

#[test]
fn integration_backtick_fences_untouched() -> Result<()> {
    let fixture = TestFixture::new()?;
    let book = PreprocessorTest::from_fixture(&fixture)?.run()?;

    let content = chapter_content(&book, "Basics").expect("Basics chapter");

    assert!(content.contains("```rust\nfn main() {}\n```"), "{}", content);
    Ok(())
}

#[test]
fn integration_nested_unterminated_fence_repaired() -> Result<()> {
    let fixture = TestFixture::new()?;
    let book = PreprocessorTest::from_fixture(&fixture)?.run()?;

    let content = chapter_content(&book, "Unterminated").expect("Unterminated chapter");

    assert!(
        content.contains("<pre><code class=\"rust\">let x = 1;\n"),
        "{}",
        content
    );
    assert!(!content.contains("~~~"), "{}", content);
    Ok(())
}

#[test]
fn integration_book_structure_unchanged() -> Result<()> {
    let fixture = TestFixture::new()?;
    let md = MDBook::load(fixture.book_path())?;
    let original_sections = md.book.sections.len();

    let result_book = PreprocessorTest::from_fixture(&fixture)?.run()?;

    assert_eq!(
        result_book.sections.len(),
        original_sections,
        "Preprocessor should not modify book structure"
    );
    Ok(())
}

#[test]
fn integration_highlighted_book() -> Result<()> {
    let fixture = TestFixture::new_from("tests/fixtures/highlighted_book")?;
    let book = PreprocessorTest::from_fixture(&fixture)?.run()?;

    let content = chapter_content(&book, "Highlighted").expect("Highlighted chapter");

    assert!(
        content.contains("<pre class=\"codehilite\"><code class=\"language-python\">"),
        "{}",
        content
    );
    assert_eq!(content.matches("class=\"lineno\"").count(), 2, "{}", content);
    assert!(!content.contains("~~~"), "{}", content);
    Ok(())
}

#[test]
fn integration_safe_mode_escapes_raw_html() -> Result<()> {
    let fixture = TestFixture::new_from("tests/fixtures/safe_book")?;
    let book = PreprocessorTest::from_fixture(&fixture)?.run()?;

    let content = chapter_content(&book, "Untrusted").expect("Untrusted chapter");

    assert!(!content.contains("<script>"), "{}", content);
    assert!(
        content.contains("&lt;script&gt;alert(1)&lt;/script&gt;"),
        "{}",
        content
    );
    assert!(content.contains("<pre><code>x\n</code></pre>"), "{}", content);
    Ok(())
}

#[test]
fn integration_invalid_config_rejected() -> Result<()> {
    let fixture = TestFixture::new()?;
    fixture.write_book_toml(
        r#"
[book]
title = "Broken"
src = "src"

[preprocessor.fenced-code.codehilite]
noclasses = true
style = "no-such-theme"
"#,
    )?;

    let result = PreprocessorTest::from_fixture(&fixture)?.run();

    assert!(result.is_err(), "Unknown style should be rejected");
    if let Err(e) = result {
        let error_msg = format!("{:#}", e);
        assert!(error_msg.contains("no-such-theme"), "Wrong error: {}", error_msg);
    }
    Ok(())
}
