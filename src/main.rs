mod app;
mod clipboard;
mod handler;
mod tui;
mod ui;

use std::fs::{self, OpenOptions};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use jarvis_core::{Config, HttpCompletionClient};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::App;
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "could not load config, using defaults");
        Config::new()
    });
    info!(endpoint = %config.endpoint, timeout = ?config.timeout(), "starting jarvis");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let completion = Arc::new(HttpCompletionClient::from_config(&config));
    let mut app = App::new(&config, completion, events.sender());

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    let mut redraw = true;
    while !app.should_quit {
        if redraw {
            terminal.draw(|frame| ui::render(app, frame))?;
        }

        // Idle ticks leave the screen as it is
        match events.next().await {
            Some(event) => redraw = handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}

/// Log to `<config dir>/jarvis/jarvis.log`; the terminal belongs to the UI.
///
/// Filter comes from `JARVIS_LOG` (default `info`). Logging stays off if the
/// file cannot be opened.
fn init_logging() {
    let Ok(dir) = Config::config_dir() else {
        return;
    };
    if fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("jarvis.log"))
    else {
        return;
    };

    let filter = EnvFilter::try_from_env("JARVIS_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();
}
