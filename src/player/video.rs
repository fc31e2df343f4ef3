//! Video provider bridge.
//!
//! Adapts a single externally-embedded video player to the controller
//! contract: one-time vendor bootstrap, a continuous position/duration
//! poll, and vendor state events mapped onto the store's playing flag.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::model::{QueueItem, StoreSession};

use super::{BridgeCommand, POLL_INTERVAL, ProviderController, ProviderError};

/// Normalized vendor playback states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VendorPlayback {
    Playing,
    Paused,
    Ended,
}

/// The embedded video player, once its runtime is up.
#[async_trait]
pub trait VideoPlayer: Send + Sync + 'static {
    async fn load(&self, url: &str) -> Result<(), ProviderError>;
    async fn set_paused(&self, paused: bool) -> Result<(), ProviderError>;
    async fn seek(&self, seconds: f64) -> Result<(), ProviderError>;
    /// `(elapsed, total)` in seconds once the vendor knows both; `None`
    /// while the item is still loading.
    async fn progress(&self) -> Result<Option<(f64, f64)>, ProviderError>;
    fn subscribe(&self) -> broadcast::Receiver<VendorPlayback>;
}

/// One-time, idempotent access to the vendor runtime. The first `acquire`
/// boots it; later calls reuse the same instance. A failed bootstrap is
/// retried on the next acquire.
#[async_trait]
pub trait VideoVendor: Send + Sync + 'static {
    async fn acquire(&self) -> Result<Arc<dyn VideoPlayer>, ProviderError>;
}

/// The `{play, pause, seek}` handle registered with the store. Calls are
/// fire-and-forget; vendor failures are logged and swallowed.
struct VideoController {
    player: Arc<dyn VideoPlayer>,
}

impl ProviderController for VideoController {
    fn play(&self) {
        let player = self.player.clone();
        tokio::spawn(async move {
            if let Err(e) = player.set_paused(false).await {
                tracing::debug!(error = %e, "video play failed");
            }
        });
    }

    fn pause(&self) {
        let player = self.player.clone();
        tokio::spawn(async move {
            if let Err(e) = player.set_paused(true).await {
                tracing::debug!(error = %e, "video pause failed");
            }
        });
    }

    fn seek(&self, seconds: f64) {
        let player = self.player.clone();
        tokio::spawn(async move {
            if let Err(e) = player.seek(seconds).await {
                tracing::debug!(error = %e, "video seek failed");
            }
        });
    }
}

/// Mount the video bridge for `item`. The task lives until `shutdown`
/// fires; same-provider track switches arrive as [`BridgeCommand::Load`].
pub fn spawn_video_bridge(
    vendor: Arc<dyn VideoVendor>,
    item: QueueItem,
    session: StoreSession,
    commands: mpsc::Receiver<BridgeCommand>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run(vendor, item, session, commands, shutdown))
}

async fn run(
    vendor: Arc<dyn VideoVendor>,
    item: QueueItem,
    mut session: StoreSession,
    mut commands: mpsc::Receiver<BridgeCommand>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut player: Option<Arc<dyn VideoPlayer>> = None;
    let mut events: Option<broadcast::Receiver<VendorPlayback>> = None;

    mount(&vendor, &mut player, &mut events, &item, &session).await;

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                if let Some(p) = &player {
                    match p.progress().await {
                        Ok(Some((elapsed, total))) if total > 0.0 => {
                            session.set_progress_abs(elapsed, total).await;
                        }
                        Ok(_) => {}
                        Err(e) => tracing::trace!(error = %e, "video progress poll failed"),
                    }
                }
            }
            event = next_event(&mut events) => {
                match event {
                    Some(VendorPlayback::Playing) => session.set_playing_state(true).await,
                    Some(VendorPlayback::Paused) | Some(VendorPlayback::Ended) => {
                        session.set_playing_state(false).await;
                    }
                    None => {}
                }
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(BridgeCommand::Load { item, session: fresh }) => {
                        // Same bridge, new link: reuse the player instance,
                        // skip the bootstrap, re-register under the fresh
                        // session (the switch already detached us).
                        session = fresh;
                        mount(&vendor, &mut player, &mut events, &item, &session).await;
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

    // Best-effort teardown: stop feeding the store, then pause the vendor.
    session.register_controller(None).await;
    if let Some(p) = &player {
        if let Err(e) = p.set_paused(true).await {
            tracing::trace!(error = %e, "video teardown pause failed");
        }
    }
    tracing::debug!("video bridge unmounted");
}

/// Ensure the vendor runtime is up, load the item and register the
/// controller. On failure the store is simply left waiting; the grace
/// window lapses and the fallback clock takes over.
async fn mount(
    vendor: &Arc<dyn VideoVendor>,
    player: &mut Option<Arc<dyn VideoPlayer>>,
    events: &mut Option<broadcast::Receiver<VendorPlayback>>,
    item: &QueueItem,
    session: &StoreSession,
) {
    if player.is_none() {
        match vendor.acquire().await {
            Ok(p) => {
                *events = Some(p.subscribe());
                *player = Some(p);
            }
            Err(e) => {
                tracing::warn!(error = %e, "video vendor bootstrap failed");
                return;
            }
        }
    }
    let Some(p) = player.as_ref() else { return };
    let Some(url) = item.url() else {
        tracing::warn!(title = %item.track.title, "video item has no link");
        return;
    };
    if let Err(e) = p.load(url).await {
        tracing::warn!(error = %e, url, "video load failed");
        return;
    }
    tracing::debug!(title = %item.track.title, "video player ready");
    session
        .register_controller(Some(Arc::new(VideoController { player: p.clone() })))
        .await;
}

async fn next_event(
    rx: &mut Option<broadcast::Receiver<VendorPlayback>>,
) -> Option<VendorPlayback> {
    match rx {
        Some(events) => match events.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::trace!(skipped, "video event stream lagged");
                None
            }
            Err(broadcast::error::RecvError::Closed) => {
                *rx = None;
                None
            }
        },
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Mutex;

    use super::*;
    use crate::model::{PlayerStore, Provider, Track};

    struct FakePlayer {
        calls: Mutex<Vec<String>>,
        events: broadcast::Sender<VendorPlayback>,
        progress: Mutex<Option<(f64, f64)>>,
    }

    impl FakePlayer {
        fn new() -> Arc<Self> {
            let (events, _) = broadcast::channel(16);
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                events,
                progress: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl VideoPlayer for Arc<FakePlayer> {
        async fn load(&self, url: &str) -> Result<(), ProviderError> {
            self.calls.lock().await.push(format!("load {url}"));
            Ok(())
        }
        async fn set_paused(&self, paused: bool) -> Result<(), ProviderError> {
            self.calls.lock().await.push(format!("pause {paused}"));
            Ok(())
        }
        async fn seek(&self, seconds: f64) -> Result<(), ProviderError> {
            self.calls.lock().await.push(format!("seek {seconds}"));
            Ok(())
        }
        async fn progress(&self) -> Result<Option<(f64, f64)>, ProviderError> {
            Ok(*self.progress.lock().await)
        }
        fn subscribe(&self) -> broadcast::Receiver<VendorPlayback> {
            self.events.subscribe()
        }
    }

    struct FakeVendor {
        player: Arc<FakePlayer>,
        acquires: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl VideoVendor for FakeVendor {
        async fn acquire(&self) -> Result<Arc<dyn VideoPlayer>, ProviderError> {
            self.acquires.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::NotReady);
            }
            Ok(Arc::new(self.player.clone()) as Arc<dyn VideoPlayer>)
        }
    }

    fn item(title: &str) -> QueueItem {
        QueueItem {
            track: Track {
                title: title.to_string(),
                genre: "techno".to_string(),
                video_url: Some(format!("v://{title}")),
                audio_url: None,
                added: None,
            },
            provider: Provider::Video,
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn attaches_controller_and_forwards_progress() {
        let store = PlayerStore::new();
        let fake = FakePlayer::new();
        let vendor = Arc::new(FakeVendor {
            player: fake.clone(),
            acquires: AtomicUsize::new(0),
            fail: false,
        });

        let session = store.play(item("a").track, Some(Provider::Video)).await;
        let (_cmd_tx, cmd_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let bridge = spawn_video_bridge(vendor.clone(), item("a"), session, cmd_rx, shutdown_rx);
        settle().await;

        let snap = store.snapshot().await;
        assert!(snap.has_controller);
        assert!(!snap.expecting_controller);
        // Autoplay intent reached the vendor exactly once.
        settle().await;
        let plays = fake
            .calls
            .lock()
            .await
            .iter()
            .filter(|c| c.as_str() == "pause false")
            .count();
        assert_eq!(plays, 1);

        // Duration unknown: the poll stays quiet.
        tokio::time::advance(Duration::from_millis(300)).await;
        settle().await;
        assert_eq!(store.snapshot().await.duration_secs, 0);

        *fake.progress.lock().await = Some((30.0, 120.0));
        tokio::time::advance(Duration::from_millis(300)).await;
        settle().await;
        let snap = store.snapshot().await;
        assert_eq!(snap.duration_secs, 120);
        assert_eq!(snap.progress, 0.25);

        let _ = shutdown_tx.send(true);
        let _ = bridge.await;
        assert!(!store.snapshot().await.has_controller);
    }

    #[tokio::test(start_paused = true)]
    async fn maps_vendor_events_to_playing_state() {
        let store = PlayerStore::new();
        let fake = FakePlayer::new();
        let vendor = Arc::new(FakeVendor {
            player: fake.clone(),
            acquires: AtomicUsize::new(0),
            fail: false,
        });

        let session = store.play(item("a").track, Some(Provider::Video)).await;
        let (_cmd_tx, cmd_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let bridge = spawn_video_bridge(vendor, item("a"), session, cmd_rx, shutdown_rx);
        settle().await;

        let _ = fake.events.send(VendorPlayback::Playing);
        settle().await;
        assert!(store.snapshot().await.playing);

        let _ = fake.events.send(VendorPlayback::Ended);
        settle().await;
        assert!(!store.snapshot().await.playing);

        let _ = shutdown_tx.send(true);
        let _ = bridge.await;
    }

    #[tokio::test(start_paused = true)]
    async fn load_command_reuses_bootstrapped_vendor() {
        let store = PlayerStore::new();
        let fake = FakePlayer::new();
        let vendor = Arc::new(FakeVendor {
            player: fake.clone(),
            acquires: AtomicUsize::new(0),
            fail: false,
        });

        let session = store.play(item("a").track, Some(Provider::Video)).await;
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let bridge = spawn_video_bridge(vendor.clone(), item("a"), session, cmd_rx, shutdown_rx);
        settle().await;

        // Track switch on the same provider.
        let fresh = store.play(item("b").track, Some(Provider::Video)).await;
        cmd_tx
            .send(BridgeCommand::Load {
                item: item("b"),
                session: fresh,
            })
            .await
            .unwrap();
        settle().await;

        assert_eq!(vendor.acquires.load(Ordering::SeqCst), 1);
        let calls = fake.calls.lock().await.clone();
        assert!(calls.contains(&"load v://a".to_string()));
        assert!(calls.contains(&"load v://b".to_string()));
        assert!(store.snapshot().await.has_controller);

        let _ = shutdown_tx.send(true);
        let _ = bridge.await;
    }

    #[tokio::test(start_paused = true)]
    async fn bootstrap_failure_leaves_store_waiting() {
        let store = PlayerStore::new();
        let fake = FakePlayer::new();
        let vendor = Arc::new(FakeVendor {
            player: fake,
            acquires: AtomicUsize::new(0),
            fail: true,
        });

        let session = store.play(item("a").track, Some(Provider::Video)).await;
        let (_cmd_tx, cmd_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let bridge = spawn_video_bridge(vendor, item("a"), session, cmd_rx, shutdown_rx);
        settle().await;

        assert!(store.snapshot().await.expecting_controller);
        assert!(!store.snapshot().await.has_controller);

        // Grace window lapses on its own.
        tokio::time::advance(Duration::from_millis(1600)).await;
        settle().await;
        assert!(!store.snapshot().await.expecting_controller);

        let _ = shutdown_tx.send(true);
        let _ = bridge.await;
    }
}
