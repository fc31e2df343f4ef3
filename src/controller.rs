//! Application controller: user actions against the model and the store.

pub mod input;
pub mod session;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::model::{AppModel, PlayerStore, Provider, Track};

use session::BridgeSupervisor;

/// Seek step for the arrow keys, in seconds.
pub const SEEK_STEP_SECS: f64 = 15.0;

#[derive(Clone)]
pub struct AppController {
    model: Arc<AppModel>,
    store: PlayerStore,
    supervisor: Arc<Mutex<BridgeSupervisor>>,
}

impl AppController {
    pub fn new(model: Arc<AppModel>, store: PlayerStore, supervisor: BridgeSupervisor) -> Self {
        Self {
            model,
            store,
            supervisor: Arc::new(Mutex::new(supervisor)),
        }
    }

    /// Switch the store to `track` and bring the matching bridge up.
    pub async fn play_track(&self, track: Track, preferred: Option<Provider>) {
        let session = self.store.play(track, preferred).await;
        let snap = self.store.snapshot().await;
        if let Some(item) = snap.current {
            self.supervisor.lock().await.mount_for(&item, session).await;
        }
    }

    pub async fn enqueue_track(&self, track: Track) {
        self.store.enqueue(track, None).await;
    }

    pub async fn toggle_playback(&self) {
        self.store.toggle().await;
    }

    pub async fn next_track(&self) {
        match self.store.next().await {
            Some(session) => {
                let snap = self.store.snapshot().await;
                if let Some(item) = snap.current {
                    self.supervisor.lock().await.mount_for(&item, session).await;
                }
            }
            None => {
                tracing::debug!("next on empty queue");
            }
        }
    }

    /// Seek relative to the current position. The store clamps.
    pub async fn seek_by(&self, delta_secs: f64) {
        let snap = self.store.snapshot().await;
        self.store.seek_to(snap.position_secs() + delta_secs).await;
    }

    /// Close the player view and unmount whatever bridge is live.
    pub async fn close_player(&self) {
        self.store.close().await;
        self.supervisor.lock().await.unmount().await;
    }

    /// Final teardown on exit.
    pub async fn shutdown(&self) {
        self.supervisor.lock().await.unmount().await;
    }
}
