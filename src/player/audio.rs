//! Audio provider bridge.
//!
//! The audio embed is a widget driven indirectly: commands go in, state
//! comes back only by polling. Duration is not known at load time, so the
//! bridge keeps a separate duration latch — the first positive length it
//! sees is pushed to the store immediately together with the last recorded
//! position, and only from then on do live progress updates flow.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::model::{QueueItem, StoreSession};

use super::{BridgeCommand, POLL_INTERVAL, ProviderController, ProviderError};

/// Delay before the widget is told to stop on unmount, so the teardown
/// never races the vendor's own handling of the last command.
const DEFERRED_STOP: Duration = Duration::from_millis(250);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidgetState {
    Playing,
    Paused,
    Stopped,
}

/// One status poll's worth of widget state. `duration_secs <= 0` means the
/// widget does not know the length yet.
#[derive(Clone, Copy, Debug)]
pub struct WidgetStatus {
    pub state: WidgetState,
    pub position_secs: f64,
    pub duration_secs: f64,
}

/// The vendor widget. All control is indirect; there are no push events.
#[async_trait]
pub trait AudioWidget: Send + Sync + 'static {
    async fn load(&self, url: &str) -> Result<(), ProviderError>;
    async fn play(&self) -> Result<(), ProviderError>;
    async fn pause(&self) -> Result<(), ProviderError>;
    async fn seek(&self, seconds: f64) -> Result<(), ProviderError>;
    async fn stop(&self) -> Result<(), ProviderError>;
    async fn status(&self) -> Result<WidgetStatus, ProviderError>;
}

/// One-time, idempotent access to the widget runtime, mirroring the video
/// side's vendor seam.
#[async_trait]
pub trait AudioVendor: Send + Sync + 'static {
    async fn acquire(&self) -> Result<Arc<dyn AudioWidget>, ProviderError>;
}

struct AudioController {
    widget: Arc<dyn AudioWidget>,
}

impl ProviderController for AudioController {
    fn play(&self) {
        let widget = self.widget.clone();
        tokio::spawn(async move {
            if let Err(e) = widget.play().await {
                tracing::debug!(error = %e, "widget play failed");
            }
        });
    }

    fn pause(&self) {
        let widget = self.widget.clone();
        tokio::spawn(async move {
            if let Err(e) = widget.pause().await {
                tracing::debug!(error = %e, "widget pause failed");
            }
        });
    }

    fn seek(&self, seconds: f64) {
        let widget = self.widget.clone();
        tokio::spawn(async move {
            if let Err(e) = widget.seek(seconds).await {
                tracing::debug!(error = %e, "widget seek failed");
            }
        });
    }
}

pub fn spawn_audio_bridge(
    vendor: Arc<dyn AudioVendor>,
    item: QueueItem,
    session: StoreSession,
    commands: mpsc::Receiver<BridgeCommand>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run(vendor, item, session, commands, shutdown))
}

async fn run(
    vendor: Arc<dyn AudioVendor>,
    item: QueueItem,
    mut session: StoreSession,
    mut commands: mpsc::Receiver<BridgeCommand>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut widget: Option<Arc<dyn AudioWidget>> = None;

    // Duration latch for the current item; re-armed on every load.
    let mut known_duration: Option<f64> = None;
    // Last position the widget reported, pushed as the baseline the moment
    // the duration resolves.
    let mut last_position: f64 = 0.0;
    let mut last_state: Option<WidgetState> = None;

    mount(&vendor, &mut widget, &item, &session).await;

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                let Some(w) = &widget else { continue };
                let status = match w.status().await {
                    Ok(status) => status,
                    Err(e) => {
                        tracing::trace!(error = %e, "widget status poll failed");
                        continue;
                    }
                };

                // Edge-detect play/pause flips.
                let playing = status.state == WidgetState::Playing;
                let was_playing = last_state.map(|s| s == WidgetState::Playing);
                if was_playing != Some(playing) {
                    session.set_playing_state(playing).await;
                }
                last_state = Some(status.state);
                last_position = status.position_secs;

                match known_duration {
                    None => {
                        if status.duration_secs > 0.0 {
                            // Duration finally resolved: push the baseline
                            // once, then fall into live updates.
                            known_duration = Some(status.duration_secs);
                            session
                                .set_progress_abs(last_position, status.duration_secs)
                                .await;
                        }
                    }
                    Some(duration) => {
                        let total = if status.duration_secs > 0.0 {
                            status.duration_secs
                        } else {
                            duration
                        };
                        session.set_progress_abs(status.position_secs, total).await;
                    }
                }
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(BridgeCommand::Load { item, session: fresh }) => {
                        session = fresh;
                        known_duration = None;
                        last_position = 0.0;
                        last_state = None;
                        mount(&vendor, &mut widget, &item, &session).await;
                    }
                    None => break,
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    session.register_controller(None).await;
    if let Some(w) = &widget {
        if let Err(e) = w.pause().await {
            tracing::trace!(error = %e, "widget teardown pause failed");
        }
        // Deferred detach: let the widget finish whatever it is doing
        // before the stop lands.
        let w = w.clone();
        tokio::spawn(async move {
            tokio::time::sleep(DEFERRED_STOP).await;
            if let Err(e) = w.stop().await {
                tracing::trace!(error = %e, "widget stop failed");
            }
        });
    }
    tracing::debug!("audio bridge unmounted");
}

async fn mount(
    vendor: &Arc<dyn AudioVendor>,
    widget: &mut Option<Arc<dyn AudioWidget>>,
    item: &QueueItem,
    session: &StoreSession,
) {
    if widget.is_none() {
        match vendor.acquire().await {
            Ok(w) => *widget = Some(w),
            Err(e) => {
                tracing::warn!(error = %e, "audio vendor bootstrap failed");
                return;
            }
        }
    }
    let Some(w) = widget.as_ref() else { return };
    let Some(url) = item.url() else {
        tracing::warn!(title = %item.track.title, "audio item has no link");
        return;
    };
    if let Err(e) = w.load(url).await {
        tracing::warn!(error = %e, url, "widget load failed");
        return;
    }
    // Vendor autoplay flags are not honored reliably; play explicitly.
    if let Err(e) = w.play().await {
        tracing::debug!(error = %e, "widget autoplay nudge failed");
    }
    tracing::debug!(title = %item.track.title, "audio widget ready");
    session
        .register_controller(Some(Arc::new(AudioController { widget: w.clone() })))
        .await;
}
