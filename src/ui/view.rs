//! Frame rendering

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Padding, Paragraph, Wrap},
    Frame,
};

use crate::model::{SearchSource, Track};

use super::utils::{format_duration, num_width, truncate_string};
use super::{ContentView, Section, UiState};

const KEYBINDINGS: &[(&str, &str)] = &[
    ("", "── Playback ──"),
    ("Space", "Play / Pause"),
    ("N / P", "Next / Previous"),
    ("← / →", "Seek -5s / +5s"),
    ("+ / -", "Volume up / down"),
    ("S", "Toggle shuffle"),
    ("R", "Cycle repeat"),
    ("", ""),
    ("", "── Navigation ──"),
    ("Tab", "Next section"),
    ("/", "Search"),
    ("↑ / ↓", "Move selection"),
    ("Enter", "Play / Open"),
    ("", ""),
    ("", "── Queue ──"),
    ("A", "Add result to queue"),
    ("D", "Remove from queue"),
    ("W", "Save queue as local playlist"),
    ("X", "Remove from its saved playlist"),
    ("E", "Rename local playlist (sidebar)"),
    ("", ""),
    ("?", "Toggle this help"),
    ("Q", "Quit"),
];

pub fn render(frame: &mut Frame, state: &UiState, device_name: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Search bar + device
            Constraint::Min(0),    // Sidebar + content
            Constraint::Length(3), // Progress
        ])
        .split(frame.area());

    render_top_bar(frame, chunks[0], state, device_name);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(chunks[1]);

    render_sidebar(frame, main_chunks[0], state);
    render_content(frame, main_chunks[1], state);
    render_progress_bar(frame, chunks[2], state);

    if let Some(draft) = &state.rename {
        render_rename_popup(frame, &draft.name);
    }
    if state.notification.is_some() {
        render_notification(frame, state);
    }
    if state.show_help {
        render_help_popup(frame);
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    }
}

fn row_style(selected: bool, focused: bool) -> Style {
    match (selected, focused) {
        (true, true) => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        (true, false) => Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        _ => Style::default().fg(Color::White),
    }
}

fn render_top_bar(frame: &mut Frame, area: Rect, state: &UiState, device_name: &str) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(28)])
        .split(area);

    let focused = state.section == Section::Search;
    let search_text = if state.search_query.is_empty() && !focused {
        "Press / to search..."
    } else {
        &state.search_query
    };
    let search = Paragraph::new(search_text).style(focus_style(focused)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Search ")
            .padding(Padding::horizontal(1))
            .border_style(focus_style(focused)),
    );
    frame.render_widget(search, chunks[0]);

    let (label, color) = if state.connected {
        (format!("🎵 {}", device_name), Color::Cyan)
    } else {
        ("💻 Local playback".to_string(), Color::Yellow)
    };
    let device = Paragraph::new(label)
        .style(Style::default().fg(color))
        .block(Block::default().borders(Borders::ALL).title(" Device "));
    frame.render_widget(device, chunks[1]);
}

fn render_sidebar(frame: &mut Frame, area: Rect, state: &UiState) {
    let focused = state.section == Section::Sidebar;
    let items: Vec<ListItem> = state
        .sidebar
        .iter()
        .enumerate()
        .map(|(i, item)| ListItem::new(item.label()).style(row_style(i == state.sidebar_selected, focused)))
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Library ")
            .padding(Padding::horizontal(1))
            .border_style(focus_style(focused)),
    );
    let mut list_state = ListState::default();
    list_state.select(Some(state.sidebar_selected));
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn render_content(frame: &mut Frame, area: Rect, state: &UiState) {
    let focused = state.section == Section::Tracks;
    let (title, tracks, footer) = match &state.content {
        ContentView::Queue => (" Queue ".to_string(), state.playlist.as_slice(), None),
        ContentView::Search(results) => {
            let source = match results.source {
                SearchSource::Remote => "Spotify",
                SearchSource::Local => "queue",
            };
            let footer = (results.source == SearchSource::Remote).then(|| {
                format!(
                    " {} albums · {} artists · {} playlists ",
                    results.albums.len(),
                    results.artists.len(),
                    results.playlists.len()
                )
            });
            (format!(" Results from {} ", source), results.tracks.as_slice(), footer)
        }
    };

    let mut block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .padding(Padding::horizontal(1))
        .border_style(focus_style(focused));
    if let Some(footer) = footer {
        block = block.title_bottom(Line::from(footer).right_aligned());
    }

    if tracks.is_empty() {
        let empty = Paragraph::new("Nothing here yet\n\nPress / to search, Tab to switch sections")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let width = area.width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = tracks
        .iter()
        .enumerate()
        .map(|(i, track)| track_row(i, track, tracks.len(), width, state, focused))
        .collect();

    let list = List::new(items).block(block);
    let mut list_state = ListState::default();
    list_state.select(Some(state.selected));
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn track_row<'a>(
    index: usize,
    track: &Track,
    count: usize,
    width: usize,
    state: &UiState,
    focused: bool,
) -> ListItem<'a> {
    let num_width = num_width(count);
    let duration_width = 6;
    let remaining = width.saturating_sub(num_width + duration_width + 6);
    let title_width = remaining * 55 / 100;
    let artist_width = remaining.saturating_sub(title_width);

    let is_current = state.current_track.as_ref() == Some(track);
    let marker = if is_current && state.is_playing { "▶" } else { " " };
    let line = format!(
        "{:>num_width$} {} {}  {}  {:>duration_width$}",
        index + 1,
        marker,
        truncate_string(&track.title, title_width),
        truncate_string(&track.artist, artist_width),
        format_duration(track.duration_seconds),
    );

    let mut style = row_style(index == state.selected, focused);
    if is_current {
        style = style.fg(Color::Cyan);
    }
    ListItem::new(line).style(style)
}

fn render_progress_bar(frame: &mut Frame, area: Rect, state: &UiState) {
    let status_text = match &state.current_track {
        None => " No track playing".to_string(),
        Some(track) => {
            let icon = if state.is_playing { "▶" } else { "⏸ " };
            format!(" {} {} | {} ({})", icon, track.title, track.artist, track.album)
        }
    };

    let shuffle_text = if state.shuffle { "Shuffle: On" } else { "Shuffle: Off" };
    let controls_info = format!(
        " {} | Repeat: {} | Vol: {}% ",
        shuffle_text,
        state.repeat.label(),
        (state.volume * 100.0).round() as u32
    );
    let time_str = format!(
        "{} / {}",
        format_duration(state.progress.current_time),
        format_duration(state.progress.duration)
    );

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} ", status_text))
                .title_bottom(Line::from(controls_info).right_aligned()),
        )
        .gauge_style(Style::default().fg(Color::Green))
        .ratio((state.progress.percentage / 100.0).clamp(0.0, 1.0))
        .label(time_str);

    frame.render_widget(gauge, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.width.saturating_sub(width) / 2,
        y: area.height.saturating_sub(height) / 2,
        width,
        height,
    }
}

fn render_notification(frame: &mut Frame, state: &UiState) {
    let Some(notification) = &state.notification else {
        return;
    };
    let area = frame.area();
    let popup_width = 52.min(area.width.saturating_sub(4));
    let inner_width = popup_width.saturating_sub(4).max(1) as usize;
    let lines = notification.message.chars().count().div_ceil(inner_width).max(1) as u16;
    let popup_area = centered(area, popup_width, lines + 2);

    let (color, title) = if notification.is_error {
        (Color::Red, " Error ")
    } else {
        (Color::Cyan, " Info ")
    };

    frame.render_widget(Clear, popup_area);
    let widget = Paragraph::new(notification.message.as_str())
        .style(Style::default().fg(color))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(title)
                .title_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
                .style(Style::default().bg(Color::Black)),
        );
    frame.render_widget(widget, popup_area);
}

fn render_rename_popup(frame: &mut Frame, name: &str) {
    let popup_area = centered(frame.area(), 60, 3);
    frame.render_widget(Clear, popup_area);
    let input = Paragraph::new(name).style(Style::default().fg(Color::Green)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green))
            .title(" Rename playlist (Enter to save, Esc to cancel) ")
            .padding(Padding::horizontal(1))
            .style(Style::default().bg(Color::Black)),
    );
    frame.render_widget(input, popup_area);
}

fn render_help_popup(frame: &mut Frame) {
    let popup_area = centered(frame.area(), 52, KEYBINDINGS.len() as u16 + 2);
    frame.render_widget(Clear, popup_area);

    let lines: Vec<Line> = KEYBINDINGS
        .iter()
        .map(|(key, desc)| {
            if key.is_empty() {
                Line::from(Span::styled(
                    format!("{:^46}", desc),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(vec![
                    Span::styled(
                        format!("{:>12}", key),
                        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw("  "),
                    Span::styled(desc.to_string(), Style::default().fg(Color::White)),
                ])
            }
        })
        .collect();

    let help = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Help (? or Esc to close) ")
            .style(Style::default().bg(Color::Black)),
    );
    frame.render_widget(help, popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::RenameDraft;
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn renders_queue_and_progress() {
        let track = Track::new("a", "Sunrise", "Band", "Album", 200.0, "/music/a.mp3");
        let mut state = UiState::new(vec![track.clone()], 0.5);
        state.current_track = Some(track);
        state.is_playing = true;

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| render(f, &state, "Tunely")).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains("Sunrise"));
        assert!(text.contains("Vol: 50%"));
        assert!(text.contains("Local playback"));
    }

    #[test]
    fn rename_popup_shows_draft_name() {
        let mut state = UiState::new(Vec::new(), 0.5);
        state.rename = Some(RenameDraft {
            id: "local_1".into(),
            name: "Night drive".into(),
        });

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| render(f, &state, "Tunely")).unwrap();

        let text: String = terminal.backend().buffer().content().iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains("Night drive"));
    }
}
