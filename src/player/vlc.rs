//! VLC vendor embed for the audio bridge.
//!
//! Drives a VLC instance through its classic HTTP interface
//! (`/requests/status.json`). Everything is command-in, poll-out: VLC
//! pushes nothing, which is exactly the widget shape the audio bridge
//! expects. Start VLC with `vlc --intf http --http-password <pw>`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::ProviderError;
use super::audio::{AudioVendor, AudioWidget, WidgetState, WidgetStatus};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
const READINESS_ATTEMPTS: u32 = 10;
const READINESS_RETRY: Duration = Duration::from_millis(500);

/// Lazily-verified VLC connection shared by every mount of the audio
/// bridge.
pub struct VlcVendor {
    base_url: String,
    password: String,
    cell: tokio::sync::OnceCell<Arc<VlcWidget>>,
}

impl VlcVendor {
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("MIXDECK_VLC_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let password = std::env::var("MIXDECK_VLC_PASSWORD").unwrap_or_default();
        Self {
            base_url,
            password,
            cell: tokio::sync::OnceCell::new(),
        }
    }
}

#[async_trait]
impl AudioVendor for VlcVendor {
    async fn acquire(&self) -> Result<Arc<dyn AudioWidget>, ProviderError> {
        let widget = self
            .cell
            .get_or_try_init(|| async {
                let widget = Arc::new(VlcWidget::new(&self.base_url, &self.password)?);
                // The instance may still be starting; poll for readiness
                // instead of failing the first mount outright.
                let mut attempt = 0;
                loop {
                    match widget.status().await {
                        Ok(_) => break,
                        Err(e) if attempt < READINESS_ATTEMPTS => {
                            attempt += 1;
                            tracing::trace!(attempt, error = %e, "waiting for vlc http interface");
                            tokio::time::sleep(READINESS_RETRY).await;
                        }
                        Err(e) => return Err(e),
                    }
                }
                tracing::info!(url = %self.base_url, "vlc ready");
                Ok(widget)
            })
            .await?;
        Ok(widget.clone() as Arc<dyn AudioWidget>)
    }
}

#[derive(Debug, Deserialize)]
struct VlcStatus {
    #[serde(default)]
    state: String,
    #[serde(default)]
    time: f64,
    #[serde(default)]
    length: f64,
}

pub struct VlcWidget {
    client: reqwest::Client,
    status_url: String,
    password: String,
}

impl VlcWidget {
    fn new(base_url: &str, password: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;
        Ok(Self {
            client,
            status_url: format!("{}/requests/status.json", base_url.trim_end_matches('/')),
            password: password.to_string(),
        })
    }

    async fn request(&self, query: &[(&str, String)]) -> Result<VlcStatus, ProviderError> {
        let response = self
            .client
            .get(&self.status_url)
            .basic_auth("", Some(self.password.as_str()))
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<VlcStatus>().await?)
    }

    async fn command(&self, query: &[(&str, String)]) -> Result<(), ProviderError> {
        self.request(query).await.map(|_| ())
    }
}

#[async_trait]
impl AudioWidget for VlcWidget {
    async fn load(&self, url: &str) -> Result<(), ProviderError> {
        self.command(&[("command", "pl_empty".to_string())]).await?;
        self.command(&[
            ("command", "in_play".to_string()),
            ("input", url.to_string()),
        ])
        .await
    }

    async fn play(&self) -> Result<(), ProviderError> {
        self.command(&[("command", "pl_forceresume".to_string())])
            .await
    }

    async fn pause(&self) -> Result<(), ProviderError> {
        self.command(&[("command", "pl_forcepause".to_string())])
            .await
    }

    async fn seek(&self, seconds: f64) -> Result<(), ProviderError> {
        self.command(&[
            ("command", "seek".to_string()),
            ("val", format!("{}", seconds.max(0.0).round() as i64)),
        ])
        .await
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.command(&[("command", "pl_stop".to_string())]).await
    }

    async fn status(&self) -> Result<WidgetStatus, ProviderError> {
        let status = self.request(&[]).await?;
        let state = match status.state.as_str() {
            "playing" => WidgetState::Playing,
            "paused" => WidgetState::Paused,
            _ => WidgetState::Stopped,
        };
        Ok(WidgetStatus {
            state,
            position_secs: status.time.max(0.0),
            // VLC reports -1 or 0 while the length is unknown.
            duration_secs: status.length,
        })
    }
}
