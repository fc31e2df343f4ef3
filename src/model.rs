//! Application model: catalog, UI state and the playback store.

pub mod catalog;
pub mod playback;
pub mod store;
pub mod types;

pub use catalog::Catalog;
pub use playback::PlayerSnapshot;
pub use store::{GRACE_WINDOW, PlayerStore, StoreSession};
pub use types::{ActiveSection, Provider, QueueItem, Track, UiState};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

const ERROR_DISPLAY_DURATION: Duration = Duration::from_secs(5);

/// Holds everything the UI reads that is not owned by the playback store.
pub struct AppModel {
    pub catalog: Catalog,
    ui_state: Arc<Mutex<UiState>>,
    should_quit: Arc<Mutex<bool>>,
}

impl AppModel {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            ui_state: Arc::new(Mutex::new(UiState::default())),
            should_quit: Arc::new(Mutex::new(false)),
        }
    }

    pub async fn get_ui_state(&self) -> UiState {
        self.ui_state.lock().await.clone()
    }

    pub async fn update_ui_state(&self, f: impl FnOnce(&mut UiState)) {
        let mut state = self.ui_state.lock().await;
        f(&mut state);
    }

    /// Tracks currently visible in the catalog pane, after search filtering.
    pub async fn visible_tracks(&self) -> Vec<Track> {
        let query = self.ui_state.lock().await.search_query.clone();
        self.catalog.search(&query)
    }

    pub async fn set_error(&self, message: String) {
        tracing::warn!(message = %message, "ui error");
        let mut state = self.ui_state.lock().await;
        state.error_message = Some(message);
        state.error_timestamp = Some(Instant::now());
    }

    /// Drop the error banner once it has been on screen long enough.
    pub async fn auto_clear_old_errors(&self) {
        let mut state = self.ui_state.lock().await;
        if let Some(ts) = state.error_timestamp {
            if ts.elapsed() >= ERROR_DISPLAY_DURATION {
                state.error_message = None;
                state.error_timestamp = None;
            }
        }
    }

    pub async fn should_quit(&self) -> bool {
        *self.should_quit.lock().await
    }

    pub async fn set_should_quit(&self, quit: bool) {
        *self.should_quit.lock().await = quit;
    }
}
