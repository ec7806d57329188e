use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthChar;

use crate::app::App;
use crate::state::Role;
use crate::transcript::{transcript, Bubble, BubbleKind};

pub const PAGE_TITLE: &str = "VTTrans";
pub const PAGE_ICON: &str = "🤖";
pub const INPUT_PLACEHOLDER: &str = "Nhập tin nhắn...";

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after_open = &rest[start + 2..];
        let Some(len) = after_open.find("**") else {
            break;
        };

        // Empty "****" stays literal
        if len == 0 {
            spans.push(Span::raw(rest[..start + 4].to_string()));
            rest = &rest[start + 4..];
            continue;
        }

        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        spans.push(Span::styled(
            after_open[..len].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after_open[len + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Header, chat history, input box, key hints
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(
            format!(" {} {} ", PAGE_ICON, PAGE_TITLE),
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::styled(
            app.session.gateway().model_name().to_string(),
            Style::default().fg(Color::White),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Turn bubbles into styled lines. `animation_frame` picks the "Thinking" dot count.
pub fn chat_lines(bubbles: &[Bubble], animation_frame: u8) -> Vec<Line<'static>> {
    let user_label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let model_label = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

    let user_tag = format!("{}:", Role::User.as_str());
    let model_tag = format!("{}:", Role::Model.as_str());

    let mut lines: Vec<Line<'static>> = Vec::new();

    for bubble in bubbles {
        match bubble.kind {
            BubbleKind::User => {
                lines.push(Line::from(Span::styled(user_tag.clone(), user_label)));
                for line in bubble.text.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            BubbleKind::Model => {
                lines.push(Line::from(Span::styled(model_tag.clone(), model_label)));
                for line in bubble.text.lines() {
                    lines.push(parse_markdown_line(line));
                }
            }
            BubbleKind::Error => {
                for line in bubble.text.lines() {
                    lines.push(Line::from(Span::styled(
                        line.to_string(),
                        Style::default().fg(Color::Red),
                    )));
                }
            }
            BubbleKind::Pending => {
                lines.push(Line::from(Span::styled(model_tag.clone(), model_label)));
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((animation_frame as usize % 3) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            }
        }
        lines.push(Line::default());
    }

    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store inner size for scroll calculations and the area for mouse hit-testing
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let bubbles = transcript(&app.session);
    let lines = chat_lines(&bubbles, app.animation_frame);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll.min(app.max_scroll()), 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let waiting = app.session.is_waiting();
    let border_color = if waiting { Color::DarkGray } else { Color::Yellow };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    // Inner width excludes borders
    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) = input_window(&app.input, app.cursor, inner_width);

    let input = if app.input.is_empty() {
        Paragraph::new(INPUT_PLACEHOLDER).style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new(visible_text).style(Style::default().fg(Color::Cyan))
    };

    frame.render_widget(input.block(block), area);
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

/// Slice of `input` that fits in `width` columns with the cursor visible,
/// plus the cursor's column within that slice. Measured in display width,
/// so wide characters (CJK, emoji) take two columns.
fn input_window(input: &str, cursor: usize, width: usize) -> (String, u16) {
    let chars: Vec<char> = input.chars().collect();
    let cursor = cursor.min(chars.len());
    let char_width = |c: &char| c.width().unwrap_or(0);

    // Drop chars from the left until the cursor column fits
    let mut start = 0;
    let mut cursor_col: usize = chars[..cursor].iter().map(char_width).sum();
    while start < cursor && cursor_col >= width {
        cursor_col -= char_width(&chars[start]);
        start += 1;
    }

    let mut visible = String::new();
    let mut used = 0;
    for c in &chars[start..] {
        let w = char_width(c);
        if used + w > width {
            break;
        }
        used += w;
        visible.push(*c);
    }

    (visible, u16::try_from(cursor_col).unwrap_or(u16::MAX))
}

fn render_footer(frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = Line::from(vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    let footer = Paragraph::new(hints).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
