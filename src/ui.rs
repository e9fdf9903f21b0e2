use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::{App, InputMode};
use crate::message::MenuWidget;
use crate::state::FieldTag;

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);

pub fn render(frame: &mut Frame, app: &App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    render_menus(frame, root[1], app);
    render_preview(frame, root[2], app);
    render_footer(frame, root[3], app);

    if app.show_help() {
        render_help_modal(frame);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let mut left = Vec::new();
    push_powerline_segment(&mut left, " kbcraft ", Color::White, PL_A, PL_C);
    push_powerline_segment(
        &mut left,
        format!(" ctx {} ", compact_text(app.context(), 32)),
        Color::White,
        PL_C,
        BG,
    );

    let right = app
        .last_update()
        .map(|time| {
            vec![Span::styled(
                format!("{} · updated {time} ", display_cluster_endpoint(app.cluster())),
                Style::default().fg(MUTED),
            )]
        })
        .unwrap_or_default();
    let right_width = spans_width(&right) as u16;
    if right_width == 0 || right_width >= area.width.saturating_sub(24) {
        frame.render_widget(
            Paragraph::new(Line::from(left)).style(Style::default().bg(BG)),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(Line::from(left)).style(Style::default().bg(BG)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(Line::from(right))
            .style(Style::default().bg(BG))
            .alignment(Alignment::Right),
        chunks[1],
    );
}

fn render_menus(frame: &mut Frame, area: Rect, app: &App) {
    let menus = app.menus();
    if menus.is_empty() {
        let panel = Paragraph::new(Text::from(app.status().to_string()))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title("Command builder")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(MUTED))
                    .style(Style::default().bg(PANEL)),
            )
            .style(Style::default().fg(Color::White));
        frame.render_widget(panel, area);
        return;
    }

    let constraints = menus
        .iter()
        .map(|_| Constraint::Ratio(1, menus.len() as u32))
        .collect::<Vec<_>>();
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (index, (widget, column)) in menus.iter().zip(columns.iter()).enumerate() {
        render_menu(frame, *column, widget, app, index == app.focus());
    }
}

fn render_menu(frame: &mut Frame, area: Rect, widget: &MenuWidget, app: &App, focused: bool) {
    let menu = &widget.menu;
    let width = area.width.saturating_sub(4) as usize;
    let items = menu
        .options
        .iter()
        .map(|option| {
            let picked = menu.initial.as_ref() == Some(option);
            let marker = if picked { "● " } else { "  " };
            let style = if option.is_synthetic() {
                Style::default().fg(MUTED).add_modifier(Modifier::ITALIC)
            } else if picked {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(Span::styled(
                format!("{marker}{}", compact_text(&option.label, width.max(4))),
                style,
            )))
        })
        .collect::<Vec<_>>();

    let title = menu
        .initial
        .as_ref()
        .map(|initial| format!("{} · {}", field_title(menu.field), initial.value))
        .unwrap_or_else(|| menu.placeholder.clone());
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if focused {
            Style::default().fg(ACCENT)
        } else {
            Style::default().fg(MUTED)
        })
        .style(Style::default().bg(PANEL));

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Rgb(24, 36, 58))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("› ");

    let mut state = ListState::default();
    if focused {
        state.select(Some(app.cursor(app.focus())));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_preview(frame: &mut Frame, area: Rect, app: &App) {
    let (text, style) = match app.last_preview() {
        Some(preview) => (format!("$ {preview}"), Style::default().fg(ACCENT)),
        None => (
            "pick a command to see the preview".to_string(),
            Style::default().fg(MUTED),
        ),
    };
    let mut lines = vec![Line::from(Span::styled(text, style))];
    if let Some(filter) = app.filter_text().filter(|filter| !filter.is_empty()) {
        lines.push(Line::from(Span::styled(
            format!("filter: {filter}"),
            Style::default().fg(WARN),
        )));
    }

    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Command")
                .borders(Borders::TOP)
                .border_style(Style::default().fg(MUTED))
                .style(Style::default().bg(BG)),
        );
    frame.render_widget(panel, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();
    match app.mode() {
        InputMode::Filter => {
            push_powerline_segment(&mut spans, " 󰈲 flt ", Color::Black, WARN, PL_B);
            push_powerline_segment(
                &mut spans,
                format!(" /{} ", app.input()),
                Color::White,
                PL_B,
                BG,
            );
        }
        InputMode::Normal => {
            let status = app.status();
            push_powerline_segment(&mut spans, " 󰘳 nrm ", Color::White, PL_A, PL_B);
            push_powerline_segment(
                &mut spans,
                format!(
                    " {} {} ",
                    footer_status_icon(status),
                    compact_text(status, area.width.saturating_sub(24).max(24) as usize)
                ),
                Color::White,
                PL_B,
                BG,
            );
            spans.push(Span::styled(
                " ? help  q quit",
                Style::default().fg(MUTED),
            ));
        }
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_help_modal(frame: &mut Frame) {
    let area = centered_rect(64, 56, frame.area());
    frame.render_widget(Clear, area);

    let lines = help_lines()
        .into_iter()
        .map(Line::from)
        .collect::<Vec<_>>();
    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));

    frame.render_widget(modal, area);
}

fn help_lines() -> Vec<String> {
    vec![
        "kbcraft help".to_string(),
        String::new(),
        "Menus: ←/→ or Tab/Shift-Tab switch menu  ↑/↓ move  Enter select".to_string(),
        "Filter: / edit filter text  Enter submit  Esc cancel".to_string(),
        "Session: r start over".to_string(),
        "Exit: q or Esc (prints the last command)".to_string(),
    ]
}

fn field_title(field: FieldTag) -> &'static str {
    match field {
        FieldTag::Command => "command",
        FieldTag::Verb => "verb",
        FieldTag::ResourceName => "name",
        FieldTag::Namespace => "namespace",
        FieldTag::Filter => "filter",
    }
}

fn footer_status_icon(status_text: &str) -> &'static str {
    let status = status_text.to_ascii_lowercase();
    let has_failure = ["failed", "error", "unfortunately", "not selectable", "forbidden"]
        .iter()
        .any(|needle| status.contains(needle));
    if has_failure { "󰅚" } else { "󰄬" }
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|span| span.content.chars().count()).sum()
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn display_cluster_endpoint(cluster: &str) -> String {
    let trimmed = cluster.trim().trim_end_matches('/');
    trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed)
        .to_string()
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
