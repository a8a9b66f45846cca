//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from application state ([`App`])
//! and input handling ([`crate::input`]).
//!
//! ## For contributors
//!
//! * The layout is a header line, the list of current wallpapers, a detail
//!   pane for the selected post and a one-line status bar.
//! * Colours and styles are defined inline.
//! * [`ratatui`] is the TUI framework; see its docs for widget details.

use std::time::{Duration, Instant};

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::App;

/// Tags shown inline in the list before truncating.
const LIST_TAGS: usize = 4;

/// Draw the complete UI for one frame.
pub fn draw(app: &mut App, frame: &mut Frame) {
    let [header_area, list_area, detail_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(7),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_header(app, frame, header_area, Instant::now());
    draw_post_list(app, frame, list_area);
    draw_detail(app, frame, detail_area);
    draw_status_bar(app, frame, status_area);
}

/// `mm:ss`, or `h:mm:ss` past an hour.
pub fn format_countdown(left: Duration) -> String {
    let secs = left.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

fn draw_header(app: &App, frame: &mut Frame, area: Rect, now: Instant) {
    let schedule = if app.busy {
        Span::styled("rotating…", Style::default().fg(Color::Yellow))
    } else {
        match app.countdown(now) {
            Some(left) => Span::styled(
                format!("next in {}", format_countdown(left)),
                Style::default().fg(Color::Green),
            ),
            None => Span::styled("paused", Style::default().fg(Color::Magenta)),
        }
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(" konawall ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(format!("[{}]", app.source), Style::default().fg(Color::Cyan)),
        Span::raw(" → "),
        Span::styled(
            app.environment.clone().unwrap_or_else(|| "?".into()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(format!(
            "  {} monitor(s)  every {}  ",
            app.monitors,
            format_countdown(app.interval)
        )),
        schedule,
    ]));
    frame.render_widget(header, area);
}

/// Render the list of posts behind the current wallpapers.
fn draw_post_list(app: &mut App, frame: &mut Frame, area: Rect) {
    let list_items: Vec<ListItem> = app
        .posts
        .iter()
        .enumerate()
        .map(|(i, post)| {
            let mut tags: Vec<&str> =
                post.tags.iter().take(LIST_TAGS).map(String::as_str).collect();
            if post.tags.len() > LIST_TAGS {
                tags.push("…");
            }
            let line = Line::from(vec![
                Span::styled(format!("{:>2} ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::styled(format!("#{:<9}", post.id), Style::default().fg(Color::White)),
                Span::styled(
                    format!("{:>10} ", post.resolution()),
                    Style::default().fg(Color::Green),
                ),
                Span::styled(
                    format!("{:<13}", post.rating_label()),
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled(tags.join(" "), Style::default().fg(Color::Gray)),
            ]);
            ListItem::new(line)
        })
        .collect();

    let list = List::new(list_items)
        .block(Block::default().title(" Wallpapers ").borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
        .highlight_symbol("▸ ");

    frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn draw_detail(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default().title(" Post ").borders(Borders::ALL);
    let Some(post) = app.selected_post() else {
        frame.render_widget(Paragraph::new("No wallpaper yet").block(block), area);
        return;
    };
    let file = app
        .list_state
        .selected()
        .and_then(|i| app.files.get(i))
        .map(|f| f.display().to_string())
        .unwrap_or_default();
    let created = post
        .created
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".into());
    let label = Style::default().fg(Color::DarkGray);

    let lines = vec![
        Line::from(vec![
            Span::styled("by ", label),
            Span::raw(post.author.as_str()),
            Span::styled("  uploaded ", label),
            Span::raw(created),
            Span::styled("  from ", label),
            Span::raw(post.source_name.as_str()),
        ]),
        Line::from(vec![Span::styled("page ", label), Span::raw(post.show_url.as_str())]),
        Line::from(vec![Span::styled("file ", label), Span::raw(file)]),
        Line::from(vec![
            Span::styled("tags ", label),
            Span::raw(post.tags.iter().map(String::as_str).collect::<Vec<_>>().join(" ")),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let colour = if app.status_is_error {
        Color::Red
    } else {
        Color::Yellow
    };
    let status = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(&app.status, Style::default().fg(colour)),
        Span::raw("  "),
        Span::styled(
            format!("{} rotations, {} failed", app.rotations, app.failures),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  r: rotate  a: re-apply  p: pause  d: detect  o/O: open  l: log  q: quit"),
    ]));
    frame.render_widget(status, area);
}
