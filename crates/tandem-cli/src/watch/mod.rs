//! `tandem watch`: live dashboard over the sync engine.
//!
//! Renders the local plan state published by the engine's watch channel,
//! so edits made by the other traveller appear as they land. A couple of
//! keys issue edits back through the engine (day done/skip), which makes
//! the round trip visible end to end.

pub mod app;
mod ui;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use tandem_core::sync::{self, SyncConfig};
use tandem_store::PlanStore;

use app::App;

/// How long to wait for a key before re-rendering from the watch channel.
const TICK: Duration = Duration::from_millis(200);

/// Launch the live dashboard for the caller's plan.
pub async fn run_watch(store: Arc<dyn PlanStore>, plan_id: &str, identity: &str) -> Result<()> {
    let handle = sync::attach(store, plan_id, identity, SyncConfig::default()).await?;

    // Set up terminal.
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(handle);
    let result = run_event_loop(&mut terminal, &mut app).await;

    // Restore terminal.
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.shutdown().await;
    result
}

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::render(f, app))?;

        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        app.should_quit = true;
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        app.should_quit = true;
                    }
                    KeyCode::Char('j') | KeyCode::Down => {
                        app.move_down();
                    }
                    KeyCode::Char('k') | KeyCode::Up => {
                        app.move_up();
                    }
                    KeyCode::Char('d') => {
                        app.toggle_selected_completed().await;
                    }
                    KeyCode::Char('s') => {
                        app.toggle_selected_skipped().await;
                    }
                    _ => {}
                }
            }
        }
        // No explicit refresh on tick: the next draw reads the watch
        // channel, which the engine keeps current.

        if app.should_quit {
            return Ok(());
        }
    }
}
