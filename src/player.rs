//! Playback providers: the controller contract, the two vendor bridges and
//! the fallback clock.
//!
//! A bridge owns its vendor embed and translates it both ways: vendor
//! events/polls become normalized store callbacks, and the minimal
//! [`ProviderController`] handle it registers lets the store drive the
//! vendor. Vendor-specific types never leak past the bridge that owns them.

pub mod audio;
pub mod clock;
pub mod mpv;
pub mod video;
pub mod vlc;

use std::time::Duration;

use thiserror::Error;

use crate::model::{QueueItem, StoreSession};

/// Cadence of the bridges' vendor polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// The capability a bridge hands to the store. Exactly one instance is
/// attached at a time; it is owned by the mounted bridge and borrowed by
/// the store.
///
/// Calls are fire-and-forget and must never fail into the caller: vendor
/// errors are logged and swallowed at the call site.
pub trait ProviderController: Send + Sync {
    fn play(&self);
    fn pause(&self);
    fn seek(&self, seconds: f64);
}

/// Vendor-side failures. None of these are fatal; every one degrades to
/// "fallback clock + no live controller".
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("vendor ipc error: {0}")]
    Ipc(#[from] std::io::Error),
    #[error("vendor http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("vendor rejected request: {0}")]
    Vendor(String),
    #[error("vendor not ready")]
    NotReady,
}

/// Commands a live bridge accepts while mounted.
pub enum BridgeCommand {
    /// Switch to a new item on the same provider without re-running the
    /// one-time vendor bootstrap. Carries the fresh store session because
    /// the switch protocol already invalidated the previous one.
    Load {
        item: QueueItem,
        session: StoreSession,
    },
}
