//! Conversation history display component

use chrono::{DateTime, Local};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::format::FormattedReply;

/// A single entry shown in the conversation pane
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEntry {
    User {
        content: String,
        timestamp: DateTime<Local>,
    },
    Assistant {
        reply: FormattedReply,
        timestamp: DateTime<Local>,
    },
    /// Informational text from the app itself (help, model switches)
    Notice(String),
    Error(String),
}

/// Conversation history display component
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    entries: Vec<HistoryEntry>,
    streaming: Option<String>,
    /// Lines scrolled up from the bottom
    scroll: usize,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
        self.scroll_to_bottom();
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.push(HistoryEntry::User {
            content: content.into(),
            timestamp: Local::now(),
        });
    }

    pub fn add_assistant_reply(&mut self, reply: FormattedReply) {
        self.push(HistoryEntry::Assistant {
            reply,
            timestamp: Local::now(),
        });
    }

    pub fn add_notice(&mut self, text: impl Into<String>) {
        self.push(HistoryEntry::Notice(text.into()));
    }

    pub fn add_error(&mut self, text: impl Into<String>) {
        self.push(HistoryEntry::Error(text.into()));
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.clear();
        self.streaming = None;
        self.scroll = 0;
    }

    /// Append a fragment of the reply being streamed
    pub fn push_streaming(&mut self, fragment: &str) {
        self.streaming.get_or_insert_with(String::new).push_str(fragment);
        self.scroll_to_bottom();
    }

    /// Show that a reply is on its way before any text has arrived
    pub fn start_streaming(&mut self) {
        self.streaming = Some(String::new());
    }

    pub fn clear_streaming(&mut self) {
        self.streaming = None;
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.is_some()
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = 0;
    }

    /// All lines of the pane for the given content width
    pub fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let width = width.saturating_sub(2) as usize;
        let mut lines = Vec::new();

        for entry in &self.entries {
            match entry {
                HistoryEntry::User { content, timestamp } => {
                    lines.push(header("👤 You", timestamp));
                    push_wrapped(&mut lines, content, width, Style::default().fg(Color::Blue));
                }
                HistoryEntry::Assistant { reply, timestamp } => {
                    lines.push(header("🤖 Assistant", timestamp));
                    if let Some(preamble) = &reply.preamble {
                        push_wrapped(&mut lines, preamble.trim_end(), width, Style::default().fg(Color::Green));
                        lines.push(Line::from(""));
                    }
                    push_verbatim(&mut lines, &reply.body, width);
                }
                HistoryEntry::Notice(text) => {
                    push_wrapped(&mut lines, text, width, Style::default().fg(Color::Yellow));
                }
                HistoryEntry::Error(text) => {
                    lines.push(Line::from(vec![
                        Span::styled("❌ Error: ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
                        Span::styled(text.clone(), Style::default().fg(Color::Red)),
                    ]));
                }
            }
            lines.push(Line::from(""));
        }

        if let Some(text) = &self.streaming {
            lines.push(header("🤖 Assistant", &Local::now()));
            if text.is_empty() {
                lines.push(Line::from(Span::styled(
                    "  thinking…",
                    Style::default().fg(Color::DarkGray),
                )));
            } else {
                push_wrapped(&mut lines, text, width, Style::default().fg(Color::Green));
                if let Some(last) = lines.last_mut() {
                    last.spans.push(Span::styled("▋", Style::default().fg(Color::Yellow)));
                }
            }
        }

        lines
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("💬 Conversation");
        let inner = block.inner(area);
        block.render(area, buf);

        if self.entries.is_empty() && self.streaming.is_none() {
            let welcome = [
                Line::from(Span::styled("Welcome to promptsmith! ✨", Style::default().fg(Color::Green))),
                Line::from(""),
                Line::from(Span::styled(
                    "Type a rough prompt below and get back a structured template.",
                    Style::default().fg(Color::Gray),
                )),
                Line::from(Span::styled("Type /help for commands.", Style::default().fg(Color::DarkGray))),
            ];
            for (i, line) in welcome.iter().enumerate().take(inner.height as usize) {
                buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
            }
            return;
        }

        let lines = self.lines(inner.width);
        let height = inner.height as usize;
        let max_scroll = lines.len().saturating_sub(height);
        let end = lines.len() - self.scroll.min(max_scroll);
        let start = end.saturating_sub(height);

        for (i, line) in lines[start..end].iter().enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }
}

fn header(who: &str, timestamp: &DateTime<Local>) -> Line<'static> {
    Line::from(Span::styled(
        format!("{} {} {}", who, timestamp.format("%H:%M:%S"), "─".repeat(20)),
        Style::default().fg(Color::DarkGray),
    ))
}

/// Word-wrap each line of `text`, keeping blank lines
fn push_wrapped(lines: &mut Vec<Line<'static>>, text: &str, width: usize, style: Style) {
    for raw_line in text.split('\n') {
        for wrapped in wrap_words(raw_line, width) {
            lines.push(Line::from(vec![Span::raw("  "), Span::styled(wrapped, style)]));
        }
    }
}

/// Render the template body exactly as written, hard-wrapped, in a frame
fn push_verbatim(lines: &mut Vec<Line<'static>>, body: &str, width: usize) {
    let frame = Style::default().fg(Color::DarkGray);
    let text = Style::default().fg(Color::Cyan);
    let inner_width = width.saturating_sub(4);

    lines.push(Line::from(Span::styled(format!("  ┌{}", "─".repeat(inner_width)), frame)));
    for raw_line in body.trim_end_matches('\n').split('\n') {
        for chunk in wrap_chars(raw_line, inner_width) {
            lines.push(Line::from(vec![
                Span::styled("  │ ", frame),
                Span::styled(chunk, text),
            ]));
        }
    }
    lines.push(Line::from(Span::styled(format!("  └{}", "─".repeat(inner_width)), frame)));
}

/// Wrap text to fit within the given width on word boundaries
fn wrap_words(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        let needed = current_line.chars().count() + word.chars().count() + 1;
        if current_line.is_empty() || needed <= width {
            if !current_line.is_empty() {
                current_line.push(' ');
            }
            current_line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line.push_str(word);
        }
    }

    if !current_line.is_empty() || lines.is_empty() {
        lines.push(current_line);
    }
    lines
}

/// Split a line into pieces of at most `width` characters, keeping spacing
fn wrap_chars(line: &str, width: usize) -> Vec<String> {
    if width == 0 || line.chars().count() <= width {
        return vec![line.to_string()];
    }
    let chars: Vec<char> = line.chars().collect();
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}
