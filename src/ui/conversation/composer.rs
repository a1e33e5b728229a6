use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::ui::conversation::commands::{ParsedCommand, parse_slash_command};

/// Result returned when the user interacts with the conversation composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// Single-line input for the next prompt
#[derive(Debug, Clone, Default)]
pub struct ConversationComposer {
    content: String,
    /// Cursor position in characters, not bytes
    cursor: usize,
    placeholder: String,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            ..Self::default()
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => return self.submit(),
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => self.clear(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_char(c)
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_index(self.cursor);
                    self.content.remove(at);
                }
            }
            KeyCode::Delete => {
                if self.cursor < self.char_count() {
                    let at = self.byte_index(self.cursor);
                    self.content.remove(at);
                }
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.char_count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.char_count(),
            _ => {}
        }

        ComposerResult::None
    }

    /// Insert pasted text; line breaks become spaces
    pub fn paste(&mut self, text: &str) {
        for c in text.chars() {
            self.insert_char(if c == '\n' || c == '\r' { ' ' } else { c });
        }
    }

    fn submit(&mut self) -> ComposerResult {
        if self.content.trim().is_empty() {
            return ComposerResult::None;
        }
        let content = std::mem::take(&mut self.content);
        self.cursor = 0;
        match parse_slash_command(&content) {
            Some(command) => ComposerResult::Command(command),
            None => ComposerResult::Submitted(content),
        }
    }

    fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.content.insert(at, c);
        self.cursor += 1;
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_index(&self, char_pos: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    /// Get current content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Clear content
    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("✨ Rough prompt")
            .style(Style::default().fg(Color::Green));

        let inner = block.inner(area);
        block.render(area, buf);

        let line = if self.content.is_empty() {
            Line::from(Span::styled(
                self.placeholder.clone(),
                Style::default().fg(Color::DarkGray),
            ))
        } else {
            let mut text = self.content.clone();
            text.insert(self.byte_index(self.cursor), '▌');
            // Keep the cursor visible on long input.
            let width = inner.width as usize;
            let skip = self.cursor.saturating_sub(width.saturating_sub(1));
            Line::from(Span::raw(text.chars().skip(skip).collect::<String>()))
        };
        buf.set_line(inner.x, inner.y, &line, inner.width);
    }
}
