use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Padding, Paragraph},
};

use crate::model::{ActiveSection, PlayerSnapshot, Provider, Track, UiState};

pub struct AppView;

impl AppView {
    pub fn render(
        frame: &mut Frame,
        snapshot: &PlayerSnapshot,
        ui_state: &UiState,
        visible: &[Track],
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Search bar
                Constraint::Min(0),    // Catalog + queue
                Constraint::Length(3), // Transport bar
            ])
            .split(frame.area());

        Self::render_search_bar(frame, chunks[0], ui_state);
        Self::render_main_area(frame, chunks[1], snapshot, ui_state, visible);
        Self::render_transport(frame, chunks[2], snapshot);

        if ui_state.error_message.is_some() {
            Self::render_error_notification(frame, ui_state);
        }
        if ui_state.show_help_popup {
            Self::render_help_popup(frame);
        }
    }

    fn render_search_bar(frame: &mut Frame, area: Rect, ui_state: &UiState) {
        let focused = ui_state.active_section == ActiveSection::Search;
        let search_text = if ui_state.search_query.is_empty() && !focused {
            "Press / to search by title or genre..."
        } else {
            &ui_state.search_query
        };

        let style = if focused {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::White)
        };

        let search = Paragraph::new(search_text).style(style).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Search ")
                .padding(Padding::horizontal(1))
                .border_style(if focused {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default()
                }),
        );
        frame.render_widget(search, area);
    }

    fn render_main_area(
        frame: &mut Frame,
        area: Rect,
        snapshot: &PlayerSnapshot,
        ui_state: &UiState,
        visible: &[Track],
    ) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(36)])
            .split(area);

        Self::render_catalog(frame, chunks[0], ui_state, visible);
        Self::render_queue(frame, chunks[1], snapshot);
    }

    fn render_catalog(frame: &mut Frame, area: Rect, ui_state: &UiState, visible: &[Track]) {
        let focused = ui_state.active_section == ActiveSection::Catalog;
        let items: Vec<ListItem> = visible
            .iter()
            .enumerate()
            .map(|(i, track)| {
                let style = if i == ui_state.catalog_selected && focused {
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD)
                } else if i == ui_state.catalog_selected {
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                ListItem::new(format!(
                    "{} {}  [{}]",
                    Self::link_markers(track),
                    track.title,
                    track.genre
                ))
                .style(style)
            })
            .collect();

        let border_style = if focused {
            Style::default().fg(Color::Green)
        } else {
            Style::default()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" Sets ({}) ", visible.len()))
                    .padding(Padding::horizontal(1))
                    .border_style(border_style),
            )
            .highlight_style(Style::default()); // Highlight handled by item styles

        let mut list_state = ListState::default();
        list_state.select(Some(ui_state.catalog_selected));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_queue(frame: &mut Frame, area: Rect, snapshot: &PlayerSnapshot) {
        let items: Vec<ListItem> = if snapshot.queue.is_empty() {
            vec![ListItem::new("(empty)").style(Style::default().fg(Color::DarkGray))]
        } else {
            snapshot
                .queue
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    ListItem::new(format!(
                        "{}. {} ({})",
                        i + 1,
                        item.track.title,
                        item.provider.label()
                    ))
                    .style(Style::default().fg(Color::White))
                })
                .collect()
        };

        let queue = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Up Next ({}) ", snapshot.queue.len()))
                .padding(Padding::horizontal(1)),
        );
        frame.render_widget(queue, area);
    }

    fn render_transport(frame: &mut Frame, area: Rect, snapshot: &PlayerSnapshot) {
        let current = if snapshot.open {
            snapshot.current.as_ref()
        } else {
            None
        };
        let title = match current {
            Some(item) if snapshot.playing => format!(
                " ▶ {} [{}] via {} ",
                item.track.title,
                item.track.genre,
                item.provider.label()
            ),
            Some(item) => format!(
                " ⏸ {} [{}] via {} ",
                item.track.title,
                item.track.genre,
                item.provider.label()
            ),
            None => " Nothing playing ".to_string(),
        };

        // Duration 0 means unknown: show an indeterminate label and never
        // derive a ratio from it.
        let time_str = if current.is_some() && snapshot.duration_secs > 0 {
            format!(
                "{} / {}",
                Self::format_duration(snapshot.position_secs() as u64),
                Self::format_duration(snapshot.duration_secs)
            )
        } else {
            "--:-- / --:--".to_string()
        };

        let hints = " space play/pause | n next | e enqueue | ←/→ seek | ? help ";

        let gauge = Gauge::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .title_bottom(Line::from(hints).right_aligned()),
            )
            .gauge_style(Style::default().fg(Color::Green))
            .ratio(if current.is_some() {
                snapshot.progress.clamp(0.0, 1.0)
            } else {
                0.0
            })
            .label(time_str);

        frame.render_widget(gauge, area);
    }

    fn link_markers(track: &Track) -> String {
        let video = if track.link_for(Provider::Video).is_some() {
            "v"
        } else {
            "-"
        };
        let audio = if track.link_for(Provider::Audio).is_some() {
            "a"
        } else {
            "-"
        };
        format!("[{video}{audio}]")
    }

    fn format_duration(total_seconds: u64) -> String {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{}:{:02}", minutes, seconds)
        }
    }

    fn render_error_notification(frame: &mut Frame, ui_state: &UiState) {
        if let Some(ref error_msg) = ui_state.error_message {
            let area = frame.area();

            let popup_width = error_msg.len().min(60_usize) as u16 + 4;
            let popup_height = 5;
            let popup_x = area.width.saturating_sub(popup_width) / 2;
            let popup_y = area.height.saturating_sub(popup_height) / 2;

            let popup_area = Rect {
                x: popup_x,
                y: popup_y,
                width: popup_width.min(area.width),
                height: popup_height.min(area.height),
            };

            frame.render_widget(Clear, popup_area);

            let error_widget = Paragraph::new(format!("⚠ {}", error_msg))
                .style(
                    Style::default()
                        .fg(Color::Red)
                        .add_modifier(Modifier::BOLD),
                )
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Red))
                        .title(" Error ")
                        .style(Style::default().bg(Color::Black)),
                );

            frame.render_widget(error_widget, popup_area);
        }
    }

    fn render_help_popup(frame: &mut Frame) {
        let lines = [
            "enter  play selected set",
            "v / a  play forcing video / audio provider",
            "e      enqueue selected set",
            "space  play / pause",
            "n      next queued set",
            "←/→   seek 15s",
            "x      close player",
            "/      search",
            "q      quit",
        ];

        let area = frame.area();
        let popup_width = 44u16.min(area.width);
        let popup_height = (lines.len() as u16 + 2).min(area.height);
        let popup_area = Rect {
            x: area.width.saturating_sub(popup_width) / 2,
            y: area.height.saturating_sub(popup_height) / 2,
            width: popup_width,
            height: popup_height,
        };

        frame.render_widget(Clear, popup_area);
        let help = Paragraph::new(lines.join("\n")).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Keys ")
                .padding(Padding::horizontal(1)),
        );
        frame.render_widget(help, popup_area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_format_with_hours_when_needed() {
        assert_eq!(AppView::format_duration(75), "1:15");
        assert_eq!(AppView::format_duration(0), "0:00");
        assert_eq!(AppView::format_duration(2916), "48:36");
        assert_eq!(AppView::format_duration(3725), "1:02:05");
    }
}
