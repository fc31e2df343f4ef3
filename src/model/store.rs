//! Playback state store: the single source of truth for transport state.
//!
//! Every mutation goes through the store's own operations. Bridges never
//! touch state directly; they call back through a [`StoreSession`], which
//! carries the switch generation it was created under so a late callback
//! from a superseded bridge is provably ignored.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::player::ProviderController;

use super::playback::PlayerSnapshot;
use super::types::{Provider, QueueItem, Track};

/// How long after a track switch the store keeps waiting for a bridge to
/// attach before the fallback clock is allowed to take over.
pub const GRACE_WINDOW: Duration = Duration::from_millis(1500);

struct PlayerState {
    current: Option<QueueItem>,
    queue: VecDeque<QueueItem>,
    playing: bool,
    /// Autoplay intent for a bridge that has not attached yet. Read once,
    /// at `register_controller` time.
    want_playing: bool,
    progress: f64,
    duration_secs: u64,
    open: bool,
    controller: Option<Arc<dyn ProviderController>>,
    expecting_controller: bool,
    /// Bumped on every switch; stale sessions compare unequal.
    generation: u64,
}

impl PlayerState {
    fn new() -> Self {
        Self {
            current: None,
            queue: VecDeque::new(),
            playing: false,
            want_playing: false,
            progress: 0.0,
            duration_secs: 0,
            open: false,
            controller: None,
            expecting_controller: false,
            generation: 0,
        }
    }
}

/// Cloneable handle to the session-scoped playback state.
///
/// Created once at application start; lives for the whole session.
#[derive(Clone)]
pub struct PlayerStore {
    inner: Arc<Mutex<PlayerState>>,
}

impl PlayerStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PlayerState::new())),
        }
    }

    // ========================================================================
    // UI-facing operations
    // ========================================================================

    /// Resolve the provider, make the track current and run the switch
    /// protocol. Returns the session the mounting bridge must use.
    pub async fn play(&self, track: Track, preferred: Option<Provider>) -> StoreSession {
        let item = QueueItem::resolve(track, preferred);
        tracing::info!(title = %item.track.title, provider = item.provider.label(), "play");
        self.switch_to(item).await
    }

    /// Flip play/pause. Delegates to the controller when one is attached and
    /// records the intent for a bridge that has not attached yet.
    pub async fn toggle(&self) {
        let mut s = self.inner.lock().await;
        let target = !s.playing;
        tracing::debug!(target, "toggle");
        s.playing = target;
        s.want_playing = target;
        if let Some(c) = &s.controller {
            if target {
                c.play();
            } else {
                c.pause();
            }
        }
    }

    pub async fn pause(&self) {
        self.set_intent(false).await;
    }

    pub async fn resume(&self) {
        self.set_intent(true).await;
    }

    async fn set_intent(&self, target: bool) {
        let mut s = self.inner.lock().await;
        s.playing = target;
        s.want_playing = target;
        if let Some(c) = &s.controller {
            if target {
                c.play();
            } else {
                c.pause();
            }
        }
    }

    /// Seek to an absolute position in seconds. The target is clamped to
    /// `>= 0`; progress is updated optimistically so the UI responds even if
    /// the controller's own progress callback lags.
    pub async fn seek_to(&self, seconds: f64) {
        let secs = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        let mut s = self.inner.lock().await;
        if let Some(c) = &s.controller {
            c.seek(secs);
        }
        let denom = s.duration_secs.max(1) as f64;
        s.progress = (secs / denom).clamp(0.0, 1.0);
    }

    /// Append a resolved item to the tail of the queue. No effect on the
    /// current track.
    pub async fn enqueue(&self, track: Track, preferred: Option<Provider>) {
        let item = QueueItem::resolve(track, preferred);
        let mut s = self.inner.lock().await;
        tracing::debug!(title = %item.track.title, queued = s.queue.len() + 1, "enqueue");
        s.queue.push_back(item);
    }

    /// Dequeue the head and switch to it. On an empty queue, leaves the
    /// current track alone and stops playing.
    pub async fn next(&self) -> Option<StoreSession> {
        let item = {
            let mut s = self.inner.lock().await;
            match s.queue.pop_front() {
                Some(item) => item,
                None => {
                    s.playing = false;
                    s.want_playing = false;
                    return None;
                }
            }
        };
        tracing::info!(title = %item.track.title, "next");
        Some(self.switch_to(item).await)
    }

    /// Close the full player view. The caller is responsible for unmounting
    /// the live bridge, which detaches its controller on the way out.
    pub async fn close(&self) {
        let mut s = self.inner.lock().await;
        if let Some(c) = &s.controller {
            c.pause();
        }
        s.open = false;
        s.playing = false;
        s.want_playing = false;
        s.expecting_controller = false;
    }

    pub async fn snapshot(&self) -> PlayerSnapshot {
        let s = self.inner.lock().await;
        PlayerSnapshot {
            current: s.current.clone(),
            queue: s.queue.iter().cloned().collect(),
            playing: s.playing,
            progress: s.progress,
            duration_secs: s.duration_secs,
            open: s.open,
            has_controller: s.controller.is_some(),
            expecting_controller: s.expecting_controller,
        }
    }

    // ========================================================================
    // Switch protocol
    // ========================================================================

    /// Tear down the old controller, reset transport state and arm the
    /// grace window for the next bridge.
    async fn switch_to(&self, item: QueueItem) -> StoreSession {
        let generation = {
            let mut s = self.inner.lock().await;
            // Best-effort pause of whatever was attached before.
            if let Some(old) = s.controller.take() {
                old.pause();
            }
            s.progress = 0.0;
            s.duration_secs = 0;
            s.expecting_controller = true;
            s.want_playing = true;
            s.playing = false;
            s.current = Some(item);
            s.open = true;
            s.generation += 1;
            s.generation
        };

        // Grace-window timer: superseded by a register_controller call or a
        // newer switch (the generation check makes the stale timer inert).
        let store = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(GRACE_WINDOW).await;
            let mut s = store.inner.lock().await;
            if s.generation == generation && s.expecting_controller {
                s.expecting_controller = false;
                tracing::debug!(generation, "no controller attached within grace window");
            }
        });

        StoreSession {
            store: self.clone(),
            generation,
        }
    }

    /// Advance the simulated transport by `dt_secs`. Called only by the
    /// fallback clock; a no-op unless playing with no controller attached
    /// and no grace window active.
    pub(crate) async fn advance_fallback(&self, dt_secs: f64, default_duration_secs: f64) {
        let mut s = self.inner.lock().await;
        if !s.playing || s.controller.is_some() || s.expecting_controller {
            return;
        }
        let denom = if s.duration_secs > 0 {
            s.duration_secs as f64
        } else {
            default_duration_secs
        };
        s.progress = (s.progress + dt_secs / denom).rem_euclid(1.0);
    }
}

impl Default for PlayerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Bridge-side handle to the store, pinned to one switch generation.
///
/// Every callback checks the generation under the lock, so calls from a
/// bridge that has since been superseded are no-ops.
#[derive(Clone)]
pub struct StoreSession {
    store: PlayerStore,
    generation: u64,
}

impl StoreSession {
    /// Attach (`Some`) or detach (`None`) the bridge's controller. At most
    /// one controller is attached at any instant; attaching consumes the
    /// recorded autoplay intent and starts the vendor player at most once.
    pub async fn register_controller(&self, controller: Option<Arc<dyn ProviderController>>) {
        let mut s = self.store.inner.lock().await;
        if s.generation != self.generation {
            tracing::trace!(
                stale = self.generation,
                current = s.generation,
                "register_controller from superseded session ignored"
            );
            return;
        }
        match controller {
            Some(c) => {
                s.expecting_controller = false;
                if s.want_playing {
                    c.play();
                }
                tracing::debug!(generation = self.generation, "controller attached");
                s.controller = Some(c);
            }
            None => {
                tracing::debug!(generation = self.generation, "controller detached");
                s.controller = None;
            }
        }
    }

    /// Normalized progress update from the bridge. Zero or negative totals
    /// are dropped outright so a known duration never flashes back to 0:00.
    pub async fn set_progress_abs(&self, elapsed_secs: f64, total_secs: f64) {
        let mut s = self.store.inner.lock().await;
        if s.generation != self.generation {
            return;
        }
        let total = total_secs.floor();
        if !total.is_finite() || total <= 0.0 {
            return;
        }
        s.duration_secs = total as u64;
        let denom = s.duration_secs.max(1) as f64;
        s.progress = (elapsed_secs / denom).clamp(0.0, 1.0);
    }

    /// Authoritative playing/paused update driven by vendor player events.
    pub async fn set_playing_state(&self, playing: bool) {
        let mut s = self.store.inner.lock().await;
        if s.generation != self.generation {
            return;
        }
        s.playing = playing;
    }

    /// Whether this session still belongs to the current switch.
    pub async fn is_live(&self) -> bool {
        self.store.inner.lock().await.generation == self.generation
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingController {
        plays: AtomicUsize,
        pauses: AtomicUsize,
        seeks: Mutex<Vec<f64>>,
    }

    impl ProviderController for CountingController {
        fn play(&self) {
            self.plays.fetch_add(1, Ordering::SeqCst);
        }
        fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }
        fn seek(&self, seconds: f64) {
            self.seeks.try_lock().unwrap().push(seconds);
        }
    }

    fn track(title: &str) -> Track {
        Track {
            title: title.to_string(),
            genre: "house".to_string(),
            video_url: Some(format!("v://{title}")),
            audio_url: Some(format!("a://{title}")),
            added: None,
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn play_resets_transport_and_arms_grace_window() {
        let store = PlayerStore::new();
        store.play(track("x"), None).await;
        let snap = store.snapshot().await;
        assert_eq!(snap.current.as_ref().unwrap().track.title, "x");
        assert_eq!(snap.progress, 0.0);
        assert_eq!(snap.duration_secs, 0);
        assert!(snap.expecting_controller);
        assert!(snap.open);
        assert!(!snap.playing);
    }

    #[tokio::test]
    async fn seek_clamps_into_unit_interval() {
        let store = PlayerStore::new();
        let session = store.play(track("x"), None).await;
        session.set_progress_abs(0.0, 100.0).await;

        store.seek_to(-30.0).await;
        assert_eq!(store.snapshot().await.progress, 0.0);

        store.seek_to(500.0).await;
        assert_eq!(store.snapshot().await.progress, 1.0);

        store.seek_to(25.0).await;
        assert_eq!(store.snapshot().await.progress, 0.25);
    }

    #[tokio::test]
    async fn seek_delegates_to_attached_controller() {
        let store = PlayerStore::new();
        let session = store.play(track("x"), None).await;
        let ctl = Arc::new(CountingController::default());
        session.register_controller(Some(ctl.clone())).await;
        store.seek_to(-5.0).await;
        assert_eq!(ctl.seeks.try_lock().unwrap().as_slice(), &[0.0]);
    }

    #[tokio::test]
    async fn register_with_intent_plays_exactly_once() {
        let store = PlayerStore::new();
        let session = store.play(track("x"), None).await;
        let ctl = Arc::new(CountingController::default());
        session.register_controller(Some(ctl.clone())).await;
        assert_eq!(ctl.plays.load(Ordering::SeqCst), 1);

        // Progress updates must not re-trigger autoplay.
        session.set_progress_abs(10.0, 120.0).await;
        session.set_progress_abs(20.0, 120.0).await;
        assert_eq!(ctl.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn switch_pauses_and_drops_previous_controller() {
        let store = PlayerStore::new();
        let first = store.play(track("a"), None).await;
        let ctl = Arc::new(CountingController::default());
        first.register_controller(Some(ctl.clone())).await;

        store.play(track("b"), None).await;
        let snap = store.snapshot().await;
        assert!(!snap.has_controller);
        assert_eq!(ctl.pauses.load(Ordering::SeqCst), 1);
        assert_eq!(snap.current.unwrap().track.title, "b");
    }

    #[tokio::test]
    async fn stale_session_callbacks_are_ignored() {
        let store = PlayerStore::new();
        let stale = store.play(track("a"), None).await;
        let live = store.play(track("b"), None).await;

        let ctl = Arc::new(CountingController::default());
        stale.register_controller(Some(ctl.clone())).await;
        assert!(!store.snapshot().await.has_controller);
        assert_eq!(ctl.plays.load(Ordering::SeqCst), 0);

        stale.set_progress_abs(30.0, 120.0).await;
        assert_eq!(store.snapshot().await.duration_secs, 0);
        stale.set_playing_state(true).await;
        assert!(!store.snapshot().await.playing);

        assert!(!stale.is_live().await);
        assert!(live.is_live().await);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_double_play_leaves_one_effective_grace_timer() {
        let store = PlayerStore::new();
        store.play(track("a"), None).await;
        tokio::time::advance(Duration::from_millis(500)).await;
        store.play(track("b"), None).await;

        // Past the first timer's deadline: that timer is stale and must not
        // clear the flag armed by the second switch.
        tokio::time::advance(Duration::from_millis(1100)).await;
        settle().await;
        let snap = store.snapshot().await;
        assert_eq!(snap.current.as_ref().unwrap().track.title, "b");
        assert_eq!(snap.progress, 0.0);
        assert_eq!(snap.duration_secs, 0);
        assert!(snap.expecting_controller);

        // Past the second timer's deadline the flag drops.
        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
        assert!(!store.snapshot().await.expecting_controller);
    }

    #[tokio::test(start_paused = true)]
    async fn controller_attach_supersedes_grace_timer() {
        let store = PlayerStore::new();
        let session = store.play(track("a"), None).await;
        let ctl = Arc::new(CountingController::default());
        session.register_controller(Some(ctl)).await;
        assert!(!store.snapshot().await.expecting_controller);

        // The timer still fires but finds nothing to do.
        tokio::time::advance(Duration::from_millis(1600)).await;
        settle().await;
        let snap = store.snapshot().await;
        assert!(snap.has_controller);
        assert!(!snap.expecting_controller);
    }

    #[tokio::test]
    async fn next_on_empty_queue_stops_playback_only() {
        let store = PlayerStore::new();
        let session = store.play(track("a"), None).await;
        session.set_playing_state(true).await;

        assert!(store.next().await.is_none());
        let snap = store.snapshot().await;
        assert_eq!(snap.current.unwrap().track.title, "a");
        assert!(snap.queue.is_empty());
        assert!(!snap.playing);
    }

    #[tokio::test]
    async fn queue_drains_in_fifo_order() {
        let store = PlayerStore::new();
        store.enqueue(track("x"), None).await;
        store.enqueue(track("y"), None).await;

        assert!(store.next().await.is_some());
        let snap = store.snapshot().await;
        assert_eq!(snap.current.as_ref().unwrap().track.title, "x");
        assert_eq!(snap.queue.len(), 1);
        assert_eq!(snap.queue[0].track.title, "y");

        assert!(store.next().await.is_some());
        let snap = store.snapshot().await;
        assert_eq!(snap.current.as_ref().unwrap().track.title, "y");
        assert!(snap.queue.is_empty());

        assert!(store.next().await.is_none());
        let snap = store.snapshot().await;
        assert_eq!(snap.current.unwrap().track.title, "y");
        assert!(!snap.playing);
    }

    #[tokio::test]
    async fn progress_updates_normalize_and_ignore_zero_duration() {
        let store = PlayerStore::new();
        let session = store.play(track("x"), None).await;

        session.set_progress_abs(30.0, 120.0).await;
        let snap = store.snapshot().await;
        assert_eq!(snap.progress, 0.25);
        assert_eq!(snap.duration_secs, 120);

        // A zero-duration update after a real one is dropped entirely.
        session.set_progress_abs(0.0, 0.0).await;
        let snap = store.snapshot().await;
        assert_eq!(snap.progress, 0.25);
        assert_eq!(snap.duration_secs, 120);
    }

    #[tokio::test]
    async fn toggle_before_attach_records_intent() {
        let store = PlayerStore::new();
        let session = store.play(track("x"), None).await;
        // User pauses before the bridge came up, then the bridge attaches:
        // the recorded intent is "paused", so no autoplay.
        store.toggle().await; // false -> true (still no controller)
        store.toggle().await; // true -> false
        let ctl = Arc::new(CountingController::default());
        session.register_controller(Some(ctl.clone())).await;
        assert_eq!(ctl.plays.load(Ordering::SeqCst), 0);
    }
}
