use crate::fence::escape_html;
use std::borrow::Cow;

const STX: char = '\u{2}';
const ETX: char = '\u{3}';

/// Somewhere to park rendered markup while the rest of the document is processed.
///
/// Each call to [`store`](PlaceholderStore::store) returns a token that is unique
/// for this store. The host pipeline later swaps the token back for the markup.
/// `safe = true` means the markup must survive any later sanitization untouched.
pub trait PlaceholderStore {
    fn store(&mut self, html: String, safe: bool) -> String;
}

/// Returns the token [`HtmlStash`] issues for the fragment at `index`.
///
/// Tokens are wrapped in STX/ETX control characters so they cannot collide with
/// ordinary document text, and so `wzxhzdk:1` never matches inside `wzxhzdk:10`.
pub fn placeholder(index: usize) -> String {
    format!("{STX}wzxhzdk:{index}{ETX}")
}

/// A fragment of markup held by [`HtmlStash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashedHtml {
    pub html: String,
    pub safe: bool,
}

/// Append-only, order-preserving [`PlaceholderStore`].
///
/// One stash belongs to one document. Fragments are restored by
/// [`restore`](HtmlStash::restore) once the document has been rendered.
#[derive(Debug, Default)]
pub struct HtmlStash {
    entries: Vec<StashedHtml>,
}

impl HtmlStash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StashedHtml> {
        self.entries.get(index)
    }

    /// Substitutes every stashed fragment back into `text`.
    ///
    /// A token the renderer wrapped in its own paragraph (`<p>TOKEN</p>`) is
    /// replaced as a whole, so block-level markup does not end up inside a `<p>`.
    /// With `safe_mode` on, fragments stored with `safe = false` are escaped.
    pub fn restore(&self, text: &str, safe_mode: bool) -> String {
        let mut restored = text.to_string();

        for (index, entry) in self.entries.iter().enumerate() {
            let html = if safe_mode && !entry.safe {
                Cow::Owned(escape_html(&entry.html))
            } else {
                Cow::Borrowed(entry.html.as_str())
            };

            let token = placeholder(index);
            restored = restored
                .replace(&format!("<p>{}</p>", token), &html)
                .replace(&token, &html);
        }

        restored
    }
}

impl PlaceholderStore for HtmlStash {
    fn store(&mut self, html: String, safe: bool) -> String {
        let token = placeholder(self.entries.len());
        self.entries.push(StashedHtml { html, safe });
        token
    }
}
