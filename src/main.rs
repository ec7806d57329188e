use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

mod app;
mod config;
mod gateway;
mod gemini;
mod handler;
mod logging;
mod session;
mod state;
mod transcript;
mod tui;
mod ui;

use app::App;
use config::Config;
use gemini::GeminiClient;
use session::ChatSession;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "vttrans")]
#[command(about = "Terminal chat with Google Gemini", version)]
struct Cli {
    /// Directory holding config.json, secrets.json and the log file
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides config.json
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::default_dir()?,
    };
    let config = Config::load(&config_dir)?;

    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    logging::init(&config_dir, log_level)?;

    // Fatal before the page opens: one message, no session
    let env_key = std::env::var(config::API_KEY_NAME).ok();
    let session = match open_session(&config_dir, &config, env_key) {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(error = %err, "startup failed");
            return Err(err);
        }
    };
    tracing::info!(model = %config.model, translate = config.translate.is_some(), "session started");

    let mut app = App::new(session);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = run(&mut terminal, &mut app, &mut events).await;

    app.shutdown();
    tui::restore()?;

    tracing::info!(turns = app.session.conversation().len(), "session ended");
    result
}

/// Resolve the key and build the session. Runs before the terminal is touched.
fn open_session(config_dir: &Path, config: &Config, env_key: Option<String>) -> Result<ChatSession> {
    let api_key = config::resolve_api_key(config_dir, env_key)?;
    let gateway = Arc::new(GeminiClient::new(&api_key, config)?);
    Ok(ChatSession::new(gateway))
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}
