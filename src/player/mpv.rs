//! mpv vendor embed for the video bridge.
//!
//! Drives a single mpv process over its JSON IPC socket. The process is
//! booted at most once per session; if a socket from an earlier run is
//! still alive it is adopted instead of spawning a second player.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::OwnedWriteHalf;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, broadcast, oneshot};

use super::ProviderError;
use super::video::{VendorPlayback, VideoPlayer, VideoVendor};

const CONNECT_ATTEMPTS: u32 = 40;
const CONNECT_RETRY: Duration = Duration::from_millis(250);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Lazily-booted mpv runtime, shared by every mount of the video bridge.
pub struct MpvVendor {
    bin: String,
    socket_path: PathBuf,
    cell: tokio::sync::OnceCell<Arc<MpvHandle>>,
}

impl MpvVendor {
    pub fn from_env() -> Self {
        let bin = std::env::var("MIXDECK_MPV_BIN").unwrap_or_else(|_| "mpv".to_string());
        let socket_path =
            std::env::temp_dir().join(format!("mixdeck-mpv-{}.sock", std::process::id()));
        Self {
            bin,
            socket_path,
            cell: tokio::sync::OnceCell::new(),
        }
    }
}

#[async_trait]
impl VideoVendor for MpvVendor {
    async fn acquire(&self) -> Result<Arc<dyn VideoPlayer>, ProviderError> {
        // A failed bootstrap leaves the cell empty, so the next mount
        // retries instead of caching the failure.
        let handle = self
            .cell
            .get_or_try_init(|| MpvHandle::bootstrap(&self.bin, &self.socket_path))
            .await?;
        Ok(handle.clone() as Arc<dyn VideoPlayer>)
    }
}

/// Live connection to the mpv IPC socket.
pub struct MpvHandle {
    next_id: AtomicU64,
    writer: Mutex<OwnedWriteHalf>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>,
    events: broadcast::Sender<VendorPlayback>,
    _child: Option<Child>,
}

impl MpvHandle {
    async fn bootstrap(bin: &str, socket_path: &Path) -> Result<Arc<Self>, ProviderError> {
        // A socket left behind by a previous mount means the player is
        // already up: connect instead of spawning again.
        let (stream, child) = match UnixStream::connect(socket_path).await {
            Ok(stream) => (stream, None),
            Err(_) => {
                let _ = std::fs::remove_file(socket_path);
                let child = Command::new(bin)
                    .arg("--idle=yes")
                    .arg("--force-window=yes")
                    .arg("--no-terminal")
                    .arg(format!("--input-ipc-server={}", socket_path.display()))
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()?;
                // mpv creates the socket some time after exec; poll for
                // readiness instead of racing it.
                let stream = connect_with_retry(socket_path).await?;
                (stream, Some(child))
            }
        };

        let (read_half, write_half) = stream.into_split();
        let (events, _) = broadcast::channel(64);
        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        spawn_reader(read_half, pending.clone(), events.clone());

        let handle = Arc::new(Self {
            next_id: AtomicU64::new(1),
            writer: Mutex::new(write_half),
            pending,
            events,
            _child: child,
        });

        // Pause flips arrive as property-change events from here on.
        handle
            .command(json!(["observe_property", 1, "pause"]))
            .await?;
        tracing::info!(socket = %socket_path.display(), "mpv ready");
        Ok(handle)
    }

    async fn command(&self, args: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let frame = json!({ "command": args, "request_id": id });
        {
            let mut writer = self.writer.lock().await;
            writer.write_all(frame.to_string().as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }

        let reply = match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) | Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(ProviderError::NotReady);
            }
        };

        match reply.get("error").and_then(Value::as_str) {
            Some("success") => Ok(reply.get("data").cloned().unwrap_or(Value::Null)),
            Some(other) => Err(ProviderError::Vendor(other.to_string())),
            None => Err(ProviderError::Vendor("malformed reply".to_string())),
        }
    }

    /// `get_property` that treats "property unavailable" as absent rather
    /// than failed — mpv reports exactly that while an item is loading.
    async fn property_f64(&self, name: &str) -> Result<Option<f64>, ProviderError> {
        match self.command(json!(["get_property", name])).await {
            Ok(value) => Ok(value.as_f64()),
            Err(ProviderError::Vendor(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl VideoPlayer for MpvHandle {
    async fn load(&self, url: &str) -> Result<(), ProviderError> {
        // loadfile replaces the current item and starts playing; the
        // store's autoplay intent only ever un-pauses on top of that.
        self.command(json!(["loadfile", url])).await?;
        Ok(())
    }

    async fn set_paused(&self, paused: bool) -> Result<(), ProviderError> {
        self.command(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    async fn seek(&self, seconds: f64) -> Result<(), ProviderError> {
        self.command(json!(["seek", seconds, "absolute"])).await?;
        Ok(())
    }

    async fn progress(&self) -> Result<Option<(f64, f64)>, ProviderError> {
        let elapsed = self.property_f64("time-pos").await?;
        let total = self.property_f64("duration").await?;
        Ok(match (elapsed, total) {
            (Some(elapsed), Some(total)) if total > 0.0 => Some((elapsed, total)),
            _ => None,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<VendorPlayback> {
        self.events.subscribe()
    }
}

async fn connect_with_retry(socket_path: &Path) -> Result<UnixStream, ProviderError> {
    let mut attempt = 0;
    loop {
        match UnixStream::connect(socket_path).await {
            Ok(stream) => return Ok(stream),
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                attempt += 1;
                tracing::trace!(attempt, error = %e, "waiting for mpv socket");
                tokio::time::sleep(CONNECT_RETRY).await;
            }
            Err(e) => return Err(ProviderError::Ipc(e)),
        }
    }
}

fn spawn_reader(
    read_half: tokio::net::unix::OwnedReadHalf,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>,
    events: broadcast::Sender<VendorPlayback>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "mpv ipc read failed");
                    break;
                }
            };
            let frame: Value = match serde_json::from_str(&line) {
                Ok(frame) => frame,
                Err(_) => continue,
            };

            if let Some(id) = frame.get("request_id").and_then(Value::as_u64) {
                if let Some(tx) = pending.lock().await.remove(&id) {
                    let _ = tx.send(frame);
                }
                continue;
            }

            match frame.get("event").and_then(Value::as_str) {
                Some("property-change") => {
                    if frame.get("name").and_then(Value::as_str) == Some("pause") {
                        let state = match frame.get("data").and_then(Value::as_bool) {
                            Some(true) => VendorPlayback::Paused,
                            Some(false) => VendorPlayback::Playing,
                            None => continue,
                        };
                        let _ = events.send(state);
                    }
                }
                Some("end-file") => {
                    let _ = events.send(VendorPlayback::Ended);
                }
                _ => {}
            }
        }
        tracing::debug!("mpv ipc reader stopped");
    });
}
