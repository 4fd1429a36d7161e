use anyhow::Result;
use study_core::Config;
use tokio::sync::mpsc::UnboundedSender;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{AppEvent, EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_logging();

    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => {
            tracing::warn!(error = %e, "could not load config, using defaults");
            (Config::new(), Some(e))
        }
    };

    // Build the app before touching the terminal so setup errors print normally
    let mut app = App::new(&config)?;
    if let Some(e) = config_error {
        app.push_system(format!("Could not load config ({}); using defaults", e));
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let tx = events.sender();

    // Check the server and model in the background
    handler::spawn_model_list(app.gateway.clone(), false, tx.clone());

    let result = run(&mut terminal, &mut app, &mut events, &tx).await;

    tui::restore()?;
    result
}

async fn run(
    terminal: &mut Tui,
    app: &mut App,
    events: &mut EventHandler,
    tx: &UnboundedSender<AppEvent>,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event, tx),
            None => break,
        }
    }

    if app.is_waiting() {
        tracing::info!(pending = app.pending_requests(), "quitting with unanswered questions");
    }
    Ok(())
}

/// Log to a file in the data directory; stderr belongs to the terminal UI.
fn init_logging() -> Option<WorkerGuard> {
    let log_dir = Config::get_data_dir().ok()?;
    std::fs::create_dir_all(&log_dir).ok()?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "study-assistant.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Some(guard)
}
