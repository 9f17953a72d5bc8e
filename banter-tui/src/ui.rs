//! Ratatui rendering for the chat window.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::app::{App, Focus};

/// Width of the online-users side panel.
const ONLINE_BOX_WIDTH: u16 = 20;

/// Height of the input field, borders included.
const INPUT_HEIGHT: u16 = 8;

pub fn draw(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(INPUT_HEIGHT)])
        .split(frame.area());

    if app.online_box_open {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(ONLINE_BOX_WIDTH)])
            .split(rows[0]);
        draw_chat_box(frame, app, cols[0]);
        draw_online_box(frame, app, cols[1]);
    } else {
        draw_chat_box(frame, app, rows[0]);
    }

    draw_input_field(frame, app, rows[1]);
}

fn border_style(app: &App, view: Focus) -> Style {
    if app.focus == view {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    }
}

fn draw_chat_box(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Chat ")
        .border_style(border_style(app, Focus::Chat));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines: Vec<Line> = app
        .messages
        .iter()
        .map(|msg| {
            let timestamp = Span::styled(
                format!("{} ", msg.timestamp),
                Style::default().fg(Color::Green),
            );
            if msg.is_system {
                Line::from(vec![
                    timestamp,
                    Span::styled("SYSTEM ", Style::default().fg(Color::Cyan)),
                    Span::raw(msg.text.as_str()),
                ])
            } else {
                Line::from(vec![
                    timestamp,
                    Span::styled(
                        format!("{} ", msg.nickname),
                        Style::default().fg(Color::Yellow),
                    ),
                    Span::raw(msg.text.as_str()),
                ])
            }
        })
        .collect();

    // Estimate wrapped heights so the newest lines hug the bottom edge,
    // offset by the scroll distance.
    let width = inner.width.max(1) as usize;
    let total_rows: usize = lines
        .iter()
        .map(|line| wrapped_rows(line.width(), width))
        .sum();
    let visible = inner.height as usize;
    let offset = (total_rows.saturating_sub(visible))
        .saturating_sub(app.chat_scroll as usize) as u16;

    let chat = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    frame.render_widget(chat, inner);
}

fn wrapped_rows(line_width: usize, area_width: usize) -> usize {
    if line_width == 0 {
        1
    } else {
        line_width.div_ceil(area_width)
    }
}

fn draw_online_box(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!(" {} online ", app.online_users.len());
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(border_style(app, Focus::Online));

    let lines: Vec<Line> = app
        .online_users
        .iter()
        .skip(app.online_scroll as usize)
        .map(|user| Line::from(user.as_str()))
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_input_field(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Input ")
        .border_style(
            border_style(app, Focus::Input).add_modifier(if app.focus == Focus::Input {
                Modifier::BOLD
            } else {
                Modifier::empty()
            }),
        );
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let input = Paragraph::new(app.input.as_str()).wrap(Wrap { trim: false });
    frame.render_widget(input, inner);

    if app.focus == Focus::Input {
        let (row, col) = app.cursor_row_col();
        let x = inner.x + col.min(inner.width.saturating_sub(1));
        let y = inner.y + row.min(inner.height.saturating_sub(1));
        frame.set_cursor_position((x, y));
    }
}
