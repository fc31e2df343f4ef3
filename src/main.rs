use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::watch;

use mixdeck::controller::AppController;
use mixdeck::controller::session::BridgeSupervisor;
use mixdeck::logging;
use mixdeck::model::{AppModel, Catalog, PlayerStore};
use mixdeck::player::clock::spawn_fallback_clock;
use mixdeck::player::mpv::MpvVendor;
use mixdeck::player::vlc::VlcVendor;
use mixdeck::view::AppView;

const DEFAULT_CATALOG: &str = "assets/catalog.csv";

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = logging::init_logging() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== mixdeck starting ===");

    let catalog_path = catalog_path();
    let catalog = Catalog::load(&catalog_path)
        .with_context(|| format!("loading catalog from {}", catalog_path.display()))?;
    if catalog.is_empty() {
        tracing::warn!("catalog is empty; nothing to play");
    }

    let model = Arc::new(AppModel::new(catalog));
    let store = PlayerStore::new();

    // Fallback clock runs for the whole session and is cancelled on exit.
    let (clock_shutdown_tx, clock_shutdown_rx) = watch::channel(false);
    let clock = spawn_fallback_clock(store.clone(), clock_shutdown_rx);

    let supervisor = BridgeSupervisor::new(
        Arc::new(MpvVendor::from_env()),
        Arc::new(VlcVendor::from_env()),
    );
    let controller = AppController::new(model.clone(), store.clone(), supervisor);

    tracing::info!("Starting TUI...");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, model, store, controller.clone()).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    controller.shutdown().await;
    let _ = clock_shutdown_tx.send(true);
    let _ = tokio::time::timeout(Duration::from_secs(1), clock).await;

    if let Err(err) = res {
        tracing::error!(error = ?err, "Application error");
    }

    tracing::info!("mixdeck shutting down");
    Ok(())
}

fn catalog_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MIXDECK_CATALOG").ok())
        .unwrap_or_else(|| DEFAULT_CATALOG.to_string())
        .into()
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    model: Arc<AppModel>,
    store: PlayerStore,
    controller: AppController,
) -> io::Result<()> {
    loop {
        model.auto_clear_old_errors().await;

        let snapshot = store.snapshot().await;
        let ui_state = model.get_ui_state().await;
        let visible = model.visible_tracks().await;

        terminal.draw(|f| {
            AppView::render(f, &snapshot, &ui_state, &visible);
        })?;

        // Short poll time for smooth transport updates.
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                let _ = controller.handle_key_event(key).await;
            }
        }

        if model.should_quit().await {
            break;
        }
    }

    Ok(())
}
