//! Bridge supervision: at most one mounted bridge at a time.
//!
//! The store's switch protocol has already detached the old controller by
//! the time the supervisor acts; the supervisor's job is the task side of
//! the same invariant — the previous bridge's polls are fully cancelled
//! before (or while) a new bridge comes up, and a same-provider switch is
//! forwarded to the live bridge instead of remounting it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::model::{Provider, QueueItem, StoreSession};
use crate::player::BridgeCommand;
use crate::player::audio::{AudioVendor, spawn_audio_bridge};
use crate::player::video::{VideoVendor, spawn_video_bridge};

const UNMOUNT_TIMEOUT: Duration = Duration::from_secs(2);
const COMMAND_BUFFER: usize = 8;

struct MountedBridge {
    provider: Provider,
    commands: mpsc::Sender<BridgeCommand>,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

pub struct BridgeSupervisor {
    video_vendor: Arc<dyn VideoVendor>,
    audio_vendor: Arc<dyn AudioVendor>,
    mounted: Option<MountedBridge>,
}

impl BridgeSupervisor {
    pub fn new(video_vendor: Arc<dyn VideoVendor>, audio_vendor: Arc<dyn AudioVendor>) -> Self {
        Self {
            video_vendor,
            audio_vendor,
            mounted: None,
        }
    }

    /// Make the mounted bridge match `item`. Reuses a live same-provider
    /// bridge, otherwise tears the old one down and mounts the right one.
    pub async fn mount_for(&mut self, item: &QueueItem, session: StoreSession) {
        if item.url().is_none() {
            // No controller will ever attach; leave the transport idle.
            tracing::warn!(
                title = %item.track.title,
                provider = item.provider.label(),
                "no link for resolved provider"
            );
            self.unmount().await;
            return;
        }

        if let Some(mounted) = &self.mounted {
            if mounted.provider == item.provider {
                let cmd = BridgeCommand::Load {
                    item: item.clone(),
                    session: session.clone(),
                };
                if mounted.commands.send(cmd).await.is_ok() {
                    tracing::debug!(provider = item.provider.label(), "reusing mounted bridge");
                    return;
                }
                tracing::warn!("mounted bridge dropped its command channel; remounting");
            }
        }

        self.unmount().await;

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = match item.provider {
            Provider::Video => spawn_video_bridge(
                self.video_vendor.clone(),
                item.clone(),
                session,
                cmd_rx,
                shutdown_rx,
            ),
            Provider::Audio => spawn_audio_bridge(
                self.audio_vendor.clone(),
                item.clone(),
                session,
                cmd_rx,
                shutdown_rx,
            ),
        };
        tracing::debug!(provider = item.provider.label(), "bridge mounted");
        self.mounted = Some(MountedBridge {
            provider: item.provider,
            commands: cmd_tx,
            shutdown: shutdown_tx,
            join,
        });
    }

    /// Gracefully stop the mounted bridge, cancelling its polls and
    /// detaching its controller.
    pub async fn unmount(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            tracing::debug!(provider = mounted.provider.label(), "unmounting bridge");
            let _ = mounted.shutdown.send(true);
            if tokio::time::timeout(UNMOUNT_TIMEOUT, mounted.join)
                .await
                .is_err()
            {
                tracing::warn!("bridge did not shut down in time");
            }
        }
    }

    pub fn mounted_provider(&self) -> Option<Provider> {
        self.mounted.as_ref().map(|m| m.provider)
    }
}
