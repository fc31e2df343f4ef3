//! Core type definitions for the application

use std::time::Instant;

use chrono::NaiveDate;

/// One of the two supported playback backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Video,
    Audio,
}

impl Provider {
    pub fn label(self) -> &'static str {
        match self {
            Provider::Video => "video",
            Provider::Audio => "audio",
        }
    }
}

/// A playable set from the catalog. Immutable once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub title: String,
    pub genre: String,
    pub video_url: Option<String>,
    pub audio_url: Option<String>,
    pub added: Option<NaiveDate>,
}

impl Track {
    pub fn link_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Video => self.video_url.as_deref(),
            Provider::Audio => self.audio_url.as_deref(),
        }
    }

    /// True if at least one provider link exists.
    pub fn is_playable(&self) -> bool {
        self.video_url.is_some() || self.audio_url.is_some()
    }
}

/// A track paired with the provider it will play on.
///
/// The provider is resolved once, at enqueue/play time: an explicit
/// preference wins if that link exists, otherwise audio is preferred,
/// otherwise video.
#[derive(Clone, Debug, PartialEq)]
pub struct QueueItem {
    pub track: Track,
    pub provider: Provider,
}

impl QueueItem {
    pub fn resolve(track: Track, preferred: Option<Provider>) -> Self {
        let provider = match preferred {
            Some(p) if track.link_for(p).is_some() => p,
            _ => {
                if track.audio_url.is_some() {
                    Provider::Audio
                } else {
                    Provider::Video
                }
            }
        };
        Self { track, provider }
    }

    /// The link the resolved provider will play, if any.
    pub fn url(&self) -> Option<&str> {
        self.track.link_for(self.provider)
    }
}

/// Which section of the UI is currently active/focused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveSection {
    Search,
    Catalog,
}

impl ActiveSection {
    pub fn next(self) -> Self {
        match self {
            ActiveSection::Search => ActiveSection::Catalog,
            ActiveSection::Catalog => ActiveSection::Search,
        }
    }
}

/// UI state for the application
#[derive(Clone)]
pub struct UiState {
    pub active_section: ActiveSection,
    pub search_query: String,
    pub catalog_selected: usize,
    pub error_message: Option<String>,
    pub error_timestamp: Option<Instant>,
    pub show_help_popup: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            active_section: ActiveSection::Catalog,
            search_query: String::new(),
            catalog_selected: 0,
            error_message: None,
            error_timestamp: None,
            show_help_popup: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(video: Option<&str>, audio: Option<&str>) -> Track {
        Track {
            title: "Test Set".to_string(),
            genre: "techno".to_string(),
            video_url: video.map(String::from),
            audio_url: audio.map(String::from),
            added: None,
        }
    }

    #[test]
    fn explicit_preference_wins_when_link_exists() {
        let item = QueueItem::resolve(
            track(Some("v://x"), Some("a://x")),
            Some(Provider::Video),
        );
        assert_eq!(item.provider, Provider::Video);
    }

    #[test]
    fn preference_falls_back_when_link_missing() {
        // Audio preferred but only a video link exists.
        let item = QueueItem::resolve(track(Some("v://x"), None), Some(Provider::Audio));
        assert_eq!(item.provider, Provider::Video);
    }

    #[test]
    fn audio_preferred_without_explicit_choice() {
        let item = QueueItem::resolve(track(Some("v://x"), Some("a://x")), None);
        assert_eq!(item.provider, Provider::Audio);
    }

    #[test]
    fn linkless_track_resolves_to_video_but_is_unplayable() {
        let item = QueueItem::resolve(track(None, None), None);
        assert_eq!(item.provider, Provider::Video);
        assert!(item.url().is_none());
        assert!(!item.track.is_playable());
    }
}
