use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::info;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::events::AppEvent;
use crate::llm::OpenAiCompatClient;
use crate::session::{MemoryPolicy, Session};
use crate::turn::{TurnHandler, TurnOutcome};
use crate::ui::conversation::{
    ComposerResult, ConversationComposer, ConversationHistory, ParsedCommand, SlashCommand,
    get_help_text,
};

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// Owns the session between turns and routes input to the turn handler
pub struct ConversationManager {
    config: Config,
    handler: TurnHandler,
    /// `None` while a turn is in flight; the turn hands it back
    session: Option<Session>,
    history: ConversationHistory,
    composer: ConversationComposer,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl ConversationManager {
    pub fn new(config: Config, handler: TurnHandler, session: Session) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            handler,
            session: Some(session),
            history: ConversationHistory::new(),
            composer: ConversationComposer::new(
                "Describe what you need, e.g. a bot that plans trips…",
            ),
            events_tx,
            events_rx,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.session.is_none()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind != KeyEventKind::Press {
            return ConversationAction::None;
        }

        match key.code {
            KeyCode::Esc => return ConversationAction::Exit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return ConversationAction::Exit;
            }
            KeyCode::PageUp => {
                self.history.scroll_up(10);
                return ConversationAction::None;
            }
            KeyCode::PageDown => {
                self.history.scroll_down(10);
                return ConversationAction::None;
            }
            _ => {}
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted(input) => {
                self.submit(input);
                ConversationAction::None
            }
            ComposerResult::Command(command) => self.handle_slash_command(command),
            ComposerResult::None => ConversationAction::None,
        }
    }

    pub fn paste(&mut self, text: &str) {
        self.composer.paste(text);
    }

    /// Send a prompt to the model on a background task
    pub fn submit(&mut self, input: String) {
        let Some(session) = self.session.take() else {
            self.history.add_notice("Still waiting for the previous reply.");
            return;
        };

        if session.policy() == MemoryPolicy::SingleTurn {
            self.history.clear();
        }
        self.history.add_user_message(input.trim());
        self.history.start_streaming();

        let handler = self.handler.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let fragments = tx.clone();
            let turn = handler
                .handle_with(session, &input, move |fragment| {
                    let _ = fragments.send(AppEvent::Fragment(fragment.to_string()));
                })
                .await;
            let _ = tx.send(AppEvent::TurnFinished(Box::new(turn)));
        });
    }

    /// Apply everything that arrived from background work (called from main loop)
    pub fn process_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
        }
    }

    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Fragment(fragment) => self.history.push_streaming(&fragment),
            AppEvent::TurnFinished(turn) => {
                let turn = *turn;
                self.history.clear_streaming();
                match turn.outcome {
                    TurnOutcome::Answered(answer) => {
                        self.history.add_assistant_reply(answer.formatted)
                    }
                    TurnOutcome::Failed(e) => self.history.add_error(e.to_string()),
                    TurnOutcome::Skipped => {}
                }
                self.session = Some(turn.session);
            }
        }
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        if self.is_waiting() && !command.command.available_during_streaming() {
            self.history
                .add_notice(format!("/{} is not available while waiting for a reply.", command.command.command()));
            return ConversationAction::None;
        }

        match command.command {
            SlashCommand::Bye => return ConversationAction::Exit,
            SlashCommand::Help => self.history.add_notice(get_help_text()),
            SlashCommand::Model => self.select_model(command.argument()),
            SlashCommand::Key => self.use_api_key(command.argument()),
            SlashCommand::Memory => self.set_memory(command.argument()),
            SlashCommand::Clear => {
                if let Some(session) = self.session.as_mut() {
                    session.reset();
                }
                self.history.clear();
            }
        }
        ConversationAction::None
    }

    fn select_model(&mut self, model: Option<&str>) {
        let Some(model) = model else {
            let mut text = format!("Models for {}:\n", self.config.provider);
            if let Ok(provider) = self.config.current_provider() {
                for m in &provider.models {
                    let mark = if *m == self.config.model { "*" } else { " " };
                    text.push_str(&format!("{} {}\n", mark, m));
                }
            }
            text.push_str("Switch with /model <id>.");
            self.history.add_notice(text);
            return;
        };

        match self.config.set_model(model) {
            Ok(()) => {
                self.handler.settings_mut().model = self.config.model.clone();
                info!("Switched model to {}", self.config.model);
                self.history.add_notice(format!("Using model {}.", self.config.model));
            }
            Err(e) => self.history.add_error(e.to_string()),
        }
    }

    fn use_api_key(&mut self, key: Option<&str>) {
        let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
            self.history.add_error("Usage: /key <api-key>");
            return;
        };

        match OpenAiCompatClient::from_config(&self.config, key) {
            Ok(client) => {
                let settings = self.handler.settings().clone();
                self.handler = TurnHandler::new(Arc::new(client), settings);
                info!("Switched to a user-supplied API key");
                self.history.add_notice("Using your API key for the rest of this run.");
            }
            Err(e) => self.history.add_error(format!("{:#}", e)),
        }
    }

    fn set_memory(&mut self, policy: Option<&str>) {
        let parsed = policy.map(MemoryPolicy::from_str);
        match (parsed, self.session.as_mut()) {
            (Some(Ok(policy)), Some(session)) => {
                session.set_policy(policy);
                self.config.memory = policy;
                self.history.add_notice(format!("Memory policy: {}.", policy));
            }
            _ => self.history.add_error("Usage: /memory single-turn|multi-turn"),
        }
    }

    fn status_line(&self) -> Line<'static> {
        let stream = if self.handler.settings().stream { "streaming" } else { "whole reply" };
        let mut spans = vec![
            Span::styled(" ✨ promptsmith ", Style::default().fg(Color::Black).bg(Color::Green)),
            Span::styled(
                format!(
                    " {} · {} · {} · {}",
                    self.config.provider, self.config.model, self.config.memory, stream
                ),
                Style::default().fg(Color::Gray),
            ),
        ];
        if self.is_waiting() {
            spans.push(Span::styled("  ⏳ waiting", Style::default().fg(Color::Yellow)));
        }
        Line::from(spans)
    }

    /// Render the conversation UI components
    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Status
                Constraint::Min(5),    // History
                Constraint::Length(3), // Composer
                Constraint::Length(1), // Hints
            ])
            .split(area);

        buf.set_line(chunks[0].x, chunks[0].y, &self.status_line(), chunks[0].width);
        self.history.render(chunks[1], buf);
        self.composer.render(chunks[2], buf);

        let hints = Line::from(Span::styled(
            " Enter send · /help commands · PgUp/PgDn scroll · Esc quit",
            Style::default().fg(Color::DarkGray),
        ));
        buf.set_line(chunks[3].x, chunks[3].y, &hints, chunks[3].width);
    }
}
