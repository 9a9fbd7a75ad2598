//! Light Markdown-like formatting of message bodies for display.
//!
//! The output is an HTML fragment that only ever contains markup produced
//! here (`pre`, `code`, `strong`, `em`, `li` and `br`). Everything taken from
//! the message itself is escaped first, so the fragment is safe to inject
//! into a page.
//!
//! Passes run in a fixed order so that patterns don't interfere:
//!
//! 1. fenced code blocks (their contents are left alone by later passes),
//! 2. `**bold**`,
//! 3. `*italic*` (optional),
//! 4. line-leading `- ` list items (optional),
//! 5. remaining line breaks.
//!
//! Stray single asterisks may pair up unexpectedly. Bold running before
//! italic is the only disambiguation.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static CODE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Non-greedy, so a block ends at the nearest closing fence.
    Regex::new(r"(?s)```([a-zA-Z]*)\n(.*?)\n```").expect("valid regex")
});
static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid regex"));
static ITALIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("valid regex"));
static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\n)- (.*)").expect("valid regex"));
// For text that follows a code block, where the start is mid-line.
static LIST_ITEM_AFTER_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n- (.*)").expect("valid regex"));

/// Toggles for the optional passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FormatOptions {
    /// Converts `*italic*` spans.
    pub italics: bool,
    /// Converts line-leading `- item` lines.
    pub lists: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            italics: true,
            lists: true,
        }
    }
}

/// Renders message bodies into HTML fragments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Formatter {
    options: FormatOptions,
}

impl Formatter {
    /// Creates a formatter with the given options.
    #[inline]
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    /// Returns the options of this formatter.
    #[inline]
    pub fn options(&self) -> FormatOptions {
        self.options
    }

    /// Formats a message body.
    pub fn format(&self, content: &str) -> String {
        let escaped = escape_html(content);

        let mut out = String::with_capacity(escaped.len());
        let mut last = 0;
        for caps in CODE_BLOCK_RE.captures_iter(&escaped) {
            let (Some(whole), Some(lang), Some(code)) =
                (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let text = &escaped[last..whole.start()];
            out.push_str(&self.format_inline(text, last == 0));
            push_code_block(&mut out, lang.as_str(), code.as_str());
            last = whole.end();
        }
        out.push_str(&self.format_inline(&escaped[last..], last == 0));
        out
    }

    /// `at_message_start` is `false` for text following a code block.
    fn format_inline(&self, text: &str, at_message_start: bool) -> String {
        let text = BOLD_RE.replace_all(text, "<strong>${1}</strong>");
        let text = if self.options.italics {
            Cow::Owned(
                ITALIC_RE.replace_all(&text, "<em>${1}</em>").into_owned(),
            )
        } else {
            text
        };
        let text = if self.options.lists {
            let list_item_re = if at_message_start {
                &*LIST_ITEM_RE
            } else {
                &*LIST_ITEM_AFTER_BREAK_RE
            };
            Cow::Owned(
                list_item_re
                    .replace_all(&text, "<li>\u{2022} ${1}</li>")
                    .into_owned(),
            )
        } else {
            text
        };
        text.replace('\n', "<br>")
    }
}

/// Formats a message body with the default options.
#[inline]
pub fn format_message(content: &str) -> String {
    Formatter::default().format(content)
}

fn push_code_block(out: &mut String, lang: &str, code: &str) {
    out.push_str("<pre><code");
    if !lang.is_empty() {
        out.push_str(" class=\"language-");
        out.push_str(lang);
        out.push('"');
    }
    out.push('>');
    out.push_str(code);
    out.push_str("</code></pre>");
}

/// Escapes HTML special characters.
pub fn escape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}
