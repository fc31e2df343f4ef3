//! Fallback clock: cosmetic transport motion while no controller is live.
//!
//! When the user hits play on a track whose bridge never attaches (script
//! blocked, vendor down, linkless track resumed by hand) the transport
//! would otherwise freeze. The clock advances the store's progress at a
//! plausible pace instead. It never touches the playing flag and never
//! ends a track; it only animates.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::model::PlayerStore;

/// Pace to assume while the real duration is unknown: 48 minutes 36
/// seconds, a typical long-form set.
pub const DEFAULT_DURATION_SECS: f64 = 2916.0;

/// One display frame.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Spawn the per-frame loop. Runs for the whole session; the caller owns
/// the shutdown side of `shutdown` and cancels it on exit.
///
/// The store itself gates every tick (paused, controller attached, or
/// grace window active all make the tick a no-op), so the clock stops
/// advancing within one frame of a controller attaching.
pub fn spawn_fallback_clock(
    store: PlayerStore,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(FRAME_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = tokio::time::Instant::now();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = tokio::time::Instant::now();
                    let dt = now.saturating_duration_since(last);
                    last = now;
                    store
                        .advance_fallback(dt.as_secs_f64(), DEFAULT_DURATION_SECS)
                        .await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
