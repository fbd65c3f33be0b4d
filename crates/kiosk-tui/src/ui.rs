use crate::app::{App, MediaForm, Screen, UiMode};
use kiosk_core::{MediaKind, PlaybackState};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Clear, Gauge, Paragraph, Row, Table},
    Frame,
};

const ACCENT_COLOR: Color = Color::Cyan;
const HIGHLIGHT_COLOR: Color = Color::Yellow;
const DIM_COLOR: Color = Color::DarkGray;
const ERROR_COLOR: Color = Color::Red;

pub fn ui(f: &mut Frame, app: &mut App) {
    match app.screen {
        Screen::Manager => render_manager(f, app),
        Screen::Player => render_player(f, app),
    }
}

fn render_manager(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Header with library stats
            Constraint::Min(10),   // Entry list
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    render_entry_list(f, app, chunks[1]);
    render_help_bar(f, app, chunks[2]);

    match app.ui_mode {
        UiMode::KindSelect | UiMode::TitleInput | UiMode::LocatorInput | UiMode::ThumbnailInput => {
            if let Some(form) = &app.form {
                render_form_popup(f, form, app.ui_mode);
            }
        }
        UiMode::ConfirmDelete => {
            if let Some((_, title)) = &app.pending_delete {
                render_confirm_popup(f, title);
            }
        }
        UiMode::Help => render_help_popup(f),
        UiMode::Normal => {}
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let latest = if app.recent_titles.is_empty() {
        "Latest: nothing yet".to_string()
    } else {
        format!("Latest: {}", app.recent_titles.join(", "))
    };
    let text = format!(
        "{} entries ({} videos, {} images)\n{}",
        app.stats.total(),
        app.stats.videos,
        app.stats.images,
        latest
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" kiosk ")
        .title_style(Style::default().fg(ACCENT_COLOR).add_modifier(Modifier::BOLD));

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White));

    f.render_widget(paragraph, area);
}

fn render_entry_list(f: &mut Frame, app: &mut App, area: Rect) {
    let title = format!(
        " Media [{}] ({}) ",
        app.settings.kind_filter.label(),
        app.entries.len()
    );

    let selected = app.list_state.selected();
    let rows: Vec<Row> = app
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let badge = match entry.kind {
                MediaKind::Video => "▶",
                MediaKind::Image => "🖼",
            };
            let style = if selected == Some(i) {
                Style::default().fg(Color::Black).bg(HIGHLIGHT_COLOR)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(format!(" {badge}")),
                Cell::from(entry.title.clone()),
                Cell::from(entry.kind.label()),
                Cell::from(entry.duration_str()),
                Cell::from(entry.created_str()),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(3),      // Kind badge
        Constraint::Percentage(50), // Title
        Constraint::Length(6),      // Kind
        Constraint::Length(6),      // Duration
        Constraint::Length(11),     // Added
    ];

    let header = Row::new(vec![
        Cell::from(""),
        Cell::from("Title"),
        Cell::from("Kind"),
        Cell::from("Time"),
        Cell::from("Added"),
    ])
    .style(Style::default().fg(ACCENT_COLOR).add_modifier(Modifier::BOLD))
    .bottom_margin(1);

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(DIM_COLOR))
                .title(title),
        )
        .style(Style::default().fg(Color::White));

    let mut state = app.list_state.clone();
    f.render_stateful_widget(table, area, &mut state);
}

fn render_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let help_text =
        "[Enter] Play  [a] Add  [e] Edit  [d] Delete  [J/K] Reorder  [f] Filter  [r] Refresh  [?] Help  [q] Quit";

    let status = if let Some(ref msg) = app.status_message {
        format!(" {} | {}", msg, help_text)
    } else {
        format!(" {}", help_text)
    };

    let paragraph = Paragraph::new(status).style(Style::default().fg(DIM_COLOR));

    f.render_widget(paragraph, area);
}

fn render_form_popup(f: &mut Frame, form: &MediaForm, mode: UiMode) {
    let area = centered_rect(60, 12, f.area());
    f.render_widget(Clear, area);

    let title = if form.editing.is_some() {
        " Edit Media "
    } else {
        " Add Media "
    };

    let field = |label: &str, value: &str, active: bool| {
        let cursor = if active { "_" } else { "" };
        let marker = if active { "» " } else { "  " };
        format!("{marker}{label}: {value}{cursor}")
    };

    let mut lines = Vec::new();
    if mode == UiMode::KindSelect {
        lines.push("» Kind: [v] Video  [i] Image (shown 8 seconds)".to_string());
    } else {
        lines.push(format!("  Kind: {}", form.kind.label()));
    }
    lines.push(field("Title", &form.title, mode == UiMode::TitleInput));
    lines.push(field("File", &form.locator, mode == UiMode::LocatorInput));
    if form.kind == MediaKind::Video {
        lines.push(field(
            "Thumbnail (optional)",
            &form.thumbnail,
            mode == UiMode::ThumbnailInput,
        ));
    }
    lines.push(String::new());
    if let Some(ref error) = form.error {
        lines.push(format!("  {error}"));
    } else {
        lines.push("  [Enter] Next/Save  [Esc] Cancel".to_string());
    }

    let style = if form.error.is_some() {
        Style::default().fg(ERROR_COLOR)
    } else {
        Style::default().fg(Color::White)
    };

    let paragraph = Paragraph::new(lines.join("\n")).style(style).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(HIGHLIGHT_COLOR))
            .title(title),
    );

    f.render_widget(paragraph, area);
}

fn render_confirm_popup(f: &mut Frame, title: &str) {
    let area = centered_rect(50, 5, f.area());
    f.render_widget(Clear, area);

    let text = format!("Delete \"{title}\"?\n\n[y] Delete  [any other key] Cancel");
    let paragraph = Paragraph::new(text)
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ERROR_COLOR))
                .title(" Confirm "),
        );

    f.render_widget(paragraph, area);
}

fn render_help_popup(f: &mut Frame) {
    let area = centered_rect(52, 14, f.area());
    f.render_widget(Clear, area);

    let text = "\
  Enter    Play slideshow
  a        Add media
  e        Edit selected
  d        Delete selected
  J / K    Move selected down / up
  f        Cycle kind filter
  r        Reload library
  Esc      Dismiss message
  q        Quit

  In the player: Space pauses, n/p skip,
  Esc returns here.";

    let paragraph = Paragraph::new(text)
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT_COLOR))
                .title(" Help "),
        );

    f.render_widget(paragraph, area);
}

fn render_player(f: &mut Frame, app: &App) {
    let Some(pane) = app.player.as_ref() else {
        return;
    };

    if !pane.overlay_visible {
        render_media_pane(f, app, f.area());
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Top bar
            Constraint::Min(5),    // Media pane
            Constraint::Length(2), // Progress bar
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    let session = &pane.session;
    let entry = session.current();
    let badge = if entry.is_image() { " [Image]" } else { "" };
    let top = format!(
        "{} / {}  {}{}",
        session.position() + 1,
        session.len(),
        entry.title,
        badge
    );
    let top_bar = Paragraph::new(top)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Now playing ")
                .title_style(Style::default().fg(ACCENT_COLOR).add_modifier(Modifier::BOLD)),
        )
        .style(Style::default().fg(Color::White));
    f.render_widget(top_bar, chunks[0]);

    render_media_pane(f, app, chunks[1]);

    let ratio = session.progress().clamp(0.0, 1.0);
    let label = format!(
        "{} / {}",
        format_secs(session.elapsed_secs()),
        session
            .duration_secs()
            .map(format_secs)
            .unwrap_or_else(|| "?:??".to_string())
    );
    let gauge = Gauge::default()
        .block(Block::default())
        .gauge_style(Style::default().fg(ACCENT_COLOR).bg(Color::DarkGray))
        .ratio(ratio)
        .label(label);
    f.render_widget(gauge, chunks[2]);

    let help = Paragraph::new(" [Space] Play/Pause  [n/p] Next/Prev  [Esc] Back")
        .style(Style::default().fg(DIM_COLOR));
    f.render_widget(help, chunks[3]);
}

fn render_media_pane(f: &mut Frame, app: &App, area: Rect) {
    let Some(pane) = app.player.as_ref() else {
        return;
    };
    let session = &pane.session;
    let entry = session.current();

    let (text, style) = if session.halted() {
        (
            session
                .error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Playback stopped".to_string()),
            Style::default().fg(ERROR_COLOR),
        )
    } else {
        let state = match session.state() {
            PlaybackState::Loading => "… Loading",
            PlaybackState::Playing => "▶ Playing",
            PlaybackState::Paused => "⏸ Paused",
            PlaybackState::Finished => "⏹ Finished",
        };
        let line = match entry.kind {
            MediaKind::Video => format!("{state}\n\n{}\n(video window is mpv)", entry.title),
            MediaKind::Image => format!("{state}\n\n{}\n{}", entry.title, entry.locator),
        };
        (line, Style::default().fg(Color::White))
    };

    let paragraph = Paragraph::new(text)
        .style(style)
        .alignment(ratatui::layout::Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(DIM_COLOR)));

    f.render_widget(paragraph, area);
}

fn format_secs(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as i64;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn centered_rect(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + r.width.saturating_sub(width) / 2;
    let y = r.y + r.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(r.width),
        height: height.min(r.height),
    }
}
