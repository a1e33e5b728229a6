//! Post-processing of model replies for display.
//!
//! A reply is split at the template marker into a free-form explanation and
//! the template itself. The template is shown verbatim, so the blockquote
//! prefixes the model uses to set it apart are stripped first.

/// Blockquote indicator stripped from template lines
pub const QUOTE_CHAR: char = '>';

/// A reply prepared for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedReply {
    /// Explanation before the marker, shown as plain text. `None` when blank.
    pub preamble: Option<String>,
    /// Marker and everything after it, quote prefixes stripped. Shown verbatim.
    pub body: String,
}

impl FormattedReply {
    /// Plain-text rendering used outside the terminal UI
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        if let Some(preamble) = &self.preamble {
            out.push_str(preamble.trim_end());
            out.push_str("\n\n");
        }
        let rule = "─".repeat(60);
        out.push_str(&rule);
        out.push('\n');
        out.push_str(self.body.trim_end_matches('\n'));
        out.push('\n');
        out.push_str(&rule);
        out.push('\n');
        out
    }
}

/// Strip leading quote markers from a single line.
///
/// Each level is `>` optionally followed by one space. All levels are
/// removed so the result never starts with the quote character.
fn strip_line(line: &str) -> &str {
    let mut rest = line;
    while let Some(after) = rest.strip_prefix(QUOTE_CHAR) {
        rest = after.strip_prefix(' ').unwrap_or(after);
    }
    rest
}

/// Remove blockquote prefixes from every line of `text`.
///
/// Lines without a prefix pass through untouched and line structure is kept
/// exactly, including a trailing newline. A line that is only `>` becomes
/// an empty line.
pub fn strip_quote_prefix(text: &str) -> String {
    text.split('\n')
        .map(strip_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split `text` at the first occurrence of `marker`.
///
/// Returns the text before the marker and, when the marker is present, the
/// text after it. Matching is exact and case-sensitive.
pub fn split_at_marker<'a>(text: &'a str, marker: &str) -> (&'a str, Option<&'a str>) {
    if marker.is_empty() {
        return (text, None);
    }
    match text.split_once(marker) {
        Some((pre, post)) => (pre, Some(post)),
        None => (text, None),
    }
}

/// Prepare a raw reply for display
pub fn format_reply(text: &str, marker: &str) -> FormattedReply {
    match split_at_marker(text, marker) {
        (pre, Some(post)) => FormattedReply {
            preamble: (!pre.trim().is_empty()).then(|| pre.to_string()),
            body: strip_quote_prefix(&format!("{marker}{post}")),
        },
        (_, None) => FormattedReply {
            preamble: None,
            body: strip_quote_prefix(text),
        },
    }
}
