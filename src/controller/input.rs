//! Key-event handling

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use crate::model::{ActiveSection, Provider};

use super::{AppController, SEEK_STEP_SECS};

impl AppController {
    pub async fn handle_key_event(&self, key: KeyEvent) -> Result<()> {
        // Only handle key press events, not release or repeat
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }

        let ui_state = self.model.get_ui_state().await;

        if ui_state.show_help_popup {
            self.model
                .update_ui_state(|s| s.show_help_popup = false)
                .await;
            return Ok(());
        }

        match ui_state.active_section {
            ActiveSection::Search => self.handle_search_key(key).await,
            ActiveSection::Catalog => self.handle_catalog_key(key).await,
        }
    }

    async fn handle_search_key(&self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Tab | KeyCode::Enter => {
                self.model
                    .update_ui_state(|s| s.active_section = s.active_section.next())
                    .await;
            }
            KeyCode::Esc => {
                self.model
                    .update_ui_state(|s| {
                        s.search_query.clear();
                        s.catalog_selected = 0;
                        s.active_section = ActiveSection::Catalog;
                    })
                    .await;
            }
            KeyCode::Backspace => {
                self.model
                    .update_ui_state(|s| {
                        s.search_query.pop();
                        s.catalog_selected = 0;
                    })
                    .await;
            }
            KeyCode::Char(c) => {
                self.model
                    .update_ui_state(|s| {
                        s.search_query.push(c);
                        s.catalog_selected = 0;
                    })
                    .await;
            }
            _ => {}
        }
        Ok(())
    }

    async fn handle_catalog_key(&self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('q') => {
                self.model.set_should_quit(true).await;
            }
            KeyCode::Char('?') => {
                self.model
                    .update_ui_state(|s| s.show_help_popup = true)
                    .await;
            }
            KeyCode::Char('/') | KeyCode::Tab => {
                self.model
                    .update_ui_state(|s| s.active_section = ActiveSection::Search)
                    .await;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.model
                    .update_ui_state(|s| {
                        s.catalog_selected = s.catalog_selected.saturating_sub(1);
                    })
                    .await;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let count = self.model.visible_tracks().await.len();
                self.model
                    .update_ui_state(|s| {
                        if count > 0 && s.catalog_selected + 1 < count {
                            s.catalog_selected += 1;
                        }
                    })
                    .await;
            }
            KeyCode::Enter => self.play_selected(None).await,
            // Force a specific provider for the selected set.
            KeyCode::Char('v') => self.play_selected(Some(Provider::Video)).await,
            KeyCode::Char('a') => self.play_selected(Some(Provider::Audio)).await,
            KeyCode::Char('e') => {
                if let Some(track) = self.selected_track().await {
                    self.enqueue_track(track).await;
                }
            }
            KeyCode::Char(' ') => self.toggle_playback().await,
            KeyCode::Char('n') => self.next_track().await,
            KeyCode::Left => self.seek_by(-SEEK_STEP_SECS).await,
            KeyCode::Right => self.seek_by(SEEK_STEP_SECS).await,
            KeyCode::Char('x') => self.close_player().await,
            _ => {}
        }
        Ok(())
    }

    async fn play_selected(&self, preferred: Option<Provider>) {
        match self.selected_track().await {
            Some(track) if track.is_playable() => self.play_track(track, preferred).await,
            Some(track) => {
                self.model
                    .set_error(format!("\"{}\" has no playable link", track.title))
                    .await;
            }
            None => {}
        }
    }

    async fn selected_track(&self) -> Option<crate::model::Track> {
        let selected = self.model.get_ui_state().await.catalog_selected;
        self.model.visible_tracks().await.into_iter().nth(selected)
    }
}
