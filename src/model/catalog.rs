//! Catalog data layer: CSV-backed list of playable sets.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use super::types::Track;

/// One raw CSV row; empty cells deserialize as empty strings.
#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(default)]
    title: String,
    #[serde(default)]
    genre: String,
    #[serde(default)]
    video_url: String,
    #[serde(default)]
    audio_url: String,
    #[serde(default)]
    added: String,
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl CatalogRow {
    fn into_track(self) -> Option<Track> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return None;
        }
        let added = non_empty(self.added)
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());
        Some(Track {
            title,
            genre: self.genre.trim().to_string(),
            video_url: non_empty(self.video_url),
            audio_url: non_empty(self.audio_url),
            added,
        })
    }
}

/// Immutable, in-memory catalog loaded once at startup.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    tracks: Vec<Track>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        let catalog = Self::from_csv(&data)?;
        tracing::info!(path = %path.display(), tracks = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    pub fn from_csv(data: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data);

        let mut tracks = Vec::new();
        for (line, row) in reader.deserialize::<CatalogRow>().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!(line = line + 2, error = %e, "skipping malformed catalog row");
                    continue;
                }
            };
            match row.into_track() {
                Some(track) => tracks.push(track),
                None => tracing::warn!(line = line + 2, "skipping catalog row without a title"),
            }
        }
        Ok(Self { tracks })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Case-insensitive substring match over title and genre. An empty
    /// query returns the whole catalog.
    pub fn search(&self, query: &str) -> Vec<Track> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.tracks.clone();
        }
        self.tracks
            .iter()
            .filter(|t| {
                t.title.to_lowercase().contains(&needle)
                    || t.genre.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"\
title,genre,video_url,audio_url,added
Warehouse Closing Set,techno,https://video.example/w1,https://audio.example/w1,2024-03-09
Sunrise Rooftop Mix,house,,https://audio.example/s1,2024-05-21
,ambient,https://video.example/x1,,
Broken Transmission,dub techno,https://video.example/b1,,not-a-date
";

    #[test]
    fn loads_rows_and_skips_missing_titles() {
        let catalog = Catalog::from_csv(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.tracks()[0].title, "Warehouse Closing Set");
        assert_eq!(
            catalog.tracks()[0].added,
            NaiveDate::from_ymd_opt(2024, 3, 9)
        );
    }

    #[test]
    fn empty_cells_become_none() {
        let catalog = Catalog::from_csv(SAMPLE).unwrap();
        let sunrise = &catalog.tracks()[1];
        assert!(sunrise.video_url.is_none());
        assert!(sunrise.audio_url.is_some());
    }

    #[test]
    fn bad_dates_parse_as_none() {
        let catalog = Catalog::from_csv(SAMPLE).unwrap();
        assert!(catalog.tracks()[2].added.is_none());
    }

    #[test]
    fn search_matches_title_and_genre() {
        let catalog = Catalog::from_csv(SAMPLE).unwrap();
        assert_eq!(catalog.search("rooftop").len(), 1);
        assert_eq!(catalog.search("TECHNO").len(), 2);
        assert_eq!(catalog.search("").len(), 3);
        assert!(catalog.search("disco").is_empty());
    }
}
