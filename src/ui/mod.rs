//! Terminal chat interface built on ratatui

pub mod conversation;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::info;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::time::Duration;

use conversation::{ConversationAction, ConversationManager};

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

/// Initialize terminal
pub fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal
pub fn restore_terminal(mut terminal: Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the chat until the user quits
pub async fn run(mut manager: ConversationManager) -> Result<()> {
    let mut terminal = init_terminal().context("Failed to initialize terminal")?;
    info!("Chat started");
    let result = event_loop(&mut terminal, &mut manager).await;
    restore_terminal(terminal).context("Failed to restore terminal")?;
    info!("Chat ended");
    result
}

async fn event_loop(terminal: &mut Tui, manager: &mut ConversationManager) -> Result<()> {
    loop {
        manager.process_events();
        terminal.draw(|frame| {
            let area = frame.size();
            manager.render(area, frame.buffer_mut());
        })?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => {
                    if manager.handle_key(key) == ConversationAction::Exit {
                        return Ok(());
                    }
                }
                Event::Paste(text) => manager.paste(&text),
                _ => {}
            }
        }

        // Let the turn task make progress between frames.
        tokio::task::yield_now().await;
    }
}
