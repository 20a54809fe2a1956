use crate::app::{App, InputMode, View};
use crate::model::Theme;
use image::RgbImage;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

const APP_TITLE: &str = "playshelf  ";
const UPPER_HALF_BLOCK: &str = "\u{2580}";

#[derive(Clone, Copy)]
struct ThemePalette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    selected_bg: Color,
    selected_fg: Color,
    popup_bg: Color,
}

fn palette(theme: Theme) -> ThemePalette {
    match theme {
        Theme::Dark => ThemePalette {
            bg: Color::Rgb(10, 15, 24),
            panel_bg: Color::Rgb(19, 29, 43),
            panel_alt_bg: Color::Rgb(24, 38, 58),
            border: Color::Rgb(69, 121, 176),
            text: Color::Rgb(214, 228, 248),
            muted: Color::Rgb(149, 173, 204),
            accent: Color::Rgb(100, 203, 184),
            alert: Color::Rgb(249, 174, 88),
            selected_bg: Color::Rgb(34, 55, 82),
            selected_fg: Color::White,
            popup_bg: Color::Rgb(22, 33, 51),
        },
        Theme::Light => ThemePalette {
            bg: Color::Rgb(240, 240, 240),
            panel_bg: Color::Rgb(250, 250, 250),
            panel_alt_bg: Color::Rgb(232, 236, 242),
            border: Color::Rgb(120, 144, 176),
            text: Color::Rgb(28, 32, 40),
            muted: Color::Rgb(96, 104, 118),
            accent: Color::Rgb(0, 122, 204),
            alert: Color::Rgb(196, 98, 0),
            selected_bg: Color::Rgb(200, 220, 245),
            selected_fg: Color::Black,
            popup_bg: Color::Rgb(244, 244, 248),
        },
    }
}

fn screen_chunks(area: Rect) -> (Rect, Rect, Rect, Rect, Rect) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(vertical[1]);

    (vertical[0], body[0], body[1], vertical[2], vertical[3])
}

pub fn list_rect(area: Rect) -> Rect {
    screen_chunks(area).1
}

fn side_chunks(side: Rect, view: View) -> (Rect, Rect) {
    match view {
        View::Playlists => (Rect::default(), side),
        View::Playlist => {
            let split = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(7), Constraint::Min(0)])
                .split(side);
            (split[0], split[1])
        }
    }
}

/// Cell area the thumbnail is drawn into: the largest square (in half-block
/// pixels) that fits inside the thumbnail panel.
pub fn preview_rect(area: Rect, view: View) -> Rect {
    let (_, thumb_panel) = side_chunks(screen_chunks(area).2, view);
    let inner = thumb_panel.inner(Margin {
        vertical: 1,
        horizontal: 1,
    });
    let columns = inner.width.min(inner.height.saturating_mul(2));
    let rows = columns / 2;
    Rect {
        x: inner.x + (inner.width - columns) / 2,
        y: inner.y,
        width: columns,
        height: rows,
    }
}

pub fn draw(frame: &mut Frame, app: &App) {
    let colors = palette(app.settings.theme);
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let (header, list_area, side, timeline, footer) = screen_chunks(frame.area());
    draw_header(frame, app, header, &colors);

    match app.view {
        View::Playlists => draw_playlists(frame, app, list_area, &colors),
        View::Playlist => draw_tracks(frame, app, list_area, &colors),
    }

    let (info_area, thumb_area) = side_chunks(side, app.view);
    if app.view == View::Playlist {
        draw_now_playing(frame, app, info_area, &colors);
    }
    frame.render_widget(
        panel_block("Thumbnail", colors.panel_alt_bg, colors.text, colors.border),
        thumb_area,
    );
    if let Some(cache) = &app.preview {
        let target = preview_rect(frame.area(), app.view);
        frame.render_widget(Paragraph::new(half_block_lines(&cache.pixels)), target);
    }

    let timeline_text = timeline_line(app, 26, 14);
    frame.render_widget(
        Paragraph::new(Span::styled(timeline_text, Style::default().fg(colors.text)))
            .block(panel_block("Timeline", colors.panel_bg, colors.text, colors.border))
            .wrap(Wrap { trim: true }),
        timeline,
    );

    draw_footer(frame, app, footer, &colors);

    if let InputMode::ConfirmDelete(name) = &app.input {
        draw_confirm(frame, name, &colors);
    }
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect, colors: &ThemePalette) {
    frame.render_widget(
        panel_block("Status", colors.panel_bg, colors.text, colors.border),
        area,
    );
    let inner = area.inner(Margin {
        vertical: 0,
        horizontal: 1,
    });
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(inner);

    let location = match (&app.view, &app.controller.session().current_playlist) {
        (View::Playlist, Some(playlist)) => format!(
            "Playlist {}  |  Tracks {}",
            playlist.name,
            app.controller.session().ordered_tracks.len()
        ),
        _ => format!("Playlists {}", app.playlists.len()),
    };
    let left = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(location, Style::default().fg(colors.text)),
    ]));
    frame.render_widget(left, chunks[0]);

    let presence = match (
        app.controller.presence_enabled(),
        app.controller.presence_available(),
    ) {
        (false, _) => "off",
        (true, true) => "on",
        (true, false) => "offline",
    };
    let right = Paragraph::new(Line::from(vec![
        Span::styled(
            app.controller.engine().output_name(),
            Style::default().fg(colors.muted),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Discord {presence}"),
            Style::default().fg(colors.alert),
        ),
    ]))
    .alignment(Alignment::Right);
    frame.render_widget(right, chunks[1]);
}

fn draw_playlists(frame: &mut Frame, app: &App, area: Rect, colors: &ThemePalette) {
    let items: Vec<ListItem> = app
        .playlists
        .iter()
        .map(|name| ListItem::new(Span::styled(name.as_str(), Style::default().fg(colors.text))))
        .collect();

    let mut state = ListState::default();
    state.select((!app.playlists.is_empty()).then_some(app.selected_playlist));

    let list = List::new(items)
        .block(panel_block("Playlists", colors.panel_bg, colors.text, colors.border))
        .highlight_style(selected_style(colors))
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_tracks(frame: &mut Frame, app: &App, area: Rect, colors: &ThemePalette) {
    let session = app.controller.session();
    let items: Vec<ListItem> = session
        .ordered_tracks
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let playing = session.track_loaded && index == session.current_index;
            let marker = if playing { "  > " } else { "    " };
            let style = if playing {
                Style::default().fg(colors.accent)
            } else {
                Style::default().fg(colors.text)
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.muted)),
                Span::styled(track.display_name(), style),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select((!session.ordered_tracks.is_empty()).then_some(app.selected_track));

    let title = session
        .current_playlist
        .as_ref()
        .map(|playlist| format!("Playlists / {}", playlist.name))
        .unwrap_or_else(|| String::from("Tracks"));
    let list = List::new(items)
        .block(panel_block(&title, colors.panel_bg, colors.text, colors.border))
        .highlight_style(selected_style(colors))
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_now_playing(frame: &mut Frame, app: &App, area: Rect, colors: &ThemePalette) {
    let session = app.controller.session();
    let title = app
        .controller
        .now_playing()
        .map(|now| now.track)
        .unwrap_or_else(|| String::from("-"));
    let state = match (session.track_loaded, session.paused) {
        (false, _) => "Stopped",
        (true, true) => "Paused",
        (true, false) => "Playing",
    };
    let position = if session.ordered_tracks.is_empty() {
        String::from("-/0")
    } else {
        format!("{}/{}", session.current_index + 1, session.ordered_tracks.len())
    };

    let lines = vec![
        Line::from(vec![
            Span::styled(
                "Now",
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {title}"), Style::default().fg(colors.text)),
        ]),
        Line::from(Span::styled(
            format!("State   {state}"),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!("Track   {position}"),
            Style::default().fg(colors.alert),
        )),
        Line::from(Span::styled(
            format!("Time    {}", app.controller.progress()),
            Style::default().fg(colors.muted),
        )),
    ];
    frame.render_widget(
        Paragraph::new(lines)
            .block(panel_block("Now Playing", colors.panel_alt_bg, colors.text, colors.border))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn draw_footer(frame: &mut Frame, app: &App, area: Rect, colors: &ThemePalette) {
    let line = match &app.input {
        InputMode::Command(buffer) => Line::from(vec![
            Span::styled(":", Style::default().fg(colors.accent)),
            Span::styled(buffer.as_str(), Style::default().fg(colors.text)),
        ]),
        _ => {
            let keys = match app.view {
                View::Playlists => "Enter open, t theme, r refresh, : command, q quit",
                View::Playlist => {
                    "Enter play, Space pause, n/b next/prev, x shuffle, +/- volume, d discord, Esc back"
                }
            };
            Line::from(vec![
                Span::styled(keys, Style::default().fg(colors.muted)),
                Span::styled("  |  ", Style::default().fg(colors.muted)),
                Span::styled(app.status.as_str(), Style::default().fg(colors.text)),
            ])
        }
    };
    frame.render_widget(
        Paragraph::new(line).block(panel_block(
            "Message",
            colors.panel_bg,
            colors.text,
            colors.border,
        )),
        area,
    );
}

fn draw_confirm(frame: &mut Frame, name: &str, colors: &ThemePalette) {
    let popup = centered_rect(frame.area(), 50, 20);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(vec![
            Line::from(Span::styled(
                format!("Delete playlist {name} and all of its files?"),
                Style::default().fg(colors.text),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "y confirm, any other key cancels",
                Style::default().fg(colors.muted),
            )),
        ])
        .block(panel_block("Confirm", colors.popup_bg, colors.text, colors.alert))
        .wrap(Wrap { trim: true }),
        popup,
    );
}

fn selected_style(colors: &ThemePalette) -> Style {
    Style::default()
        .bg(colors.selected_bg)
        .fg(colors.selected_fg)
        .add_modifier(Modifier::BOLD)
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

/// Two image rows per text row: the glyph takes the upper pixel, the cell
/// background the lower one.
fn half_block_lines(pixels: &RgbImage) -> Vec<Line<'static>> {
    let (width, height) = pixels.dimensions();
    (0..height / 2)
        .map(|row| {
            let spans: Vec<Span<'static>> = (0..width)
                .map(|column| {
                    let top = pixels.get_pixel(column, row * 2).0;
                    let bottom = pixels.get_pixel(column, row * 2 + 1).0;
                    Span::styled(
                        UPPER_HALF_BLOCK,
                        Style::default()
                            .fg(Color::Rgb(top[0], top[1], top[2]))
                            .bg(Color::Rgb(bottom[0], bottom[1], bottom[2])),
                    )
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn progress_bar(ratio: Option<f64>, width: usize) -> String {
    let clamped = ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}

fn timeline_line(app: &App, timeline_bar_width: usize, volume_bar_width: usize) -> String {
    let progress = app.controller.progress();
    let volume = app.controller.session().volume;
    format!(
        "{progress} {}  |  Vol {} {:>3}%",
        progress_bar(progress.ratio(), timeline_bar_width),
        progress_bar(Some(f64::from(volume) / 100.0), volume_bar_width),
        volume
    )
}
