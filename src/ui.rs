use jarvis_core::format::{format_message, CodeBlock, Segment};
use jarvis_core::highlight::{SpanStyle, StyledLine};
use jarvis_core::Message;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
};
use unicode_width::UnicodeWidthChar;

use crate::app::{App, InputMode};

const INPUT_ROWS: u16 = 4;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, transcript, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(INPUT_ROWS + 2),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let activity = if app.store.is_pending() {
        " waiting for reply"
    } else {
        ""
    };

    let title = Line::from(vec![
        Span::styled(" Jarvis ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(activity, Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    let hints = match app.input_mode {
        InputMode::Normal => " i:type  j/k:scroll  g/G:top/bottom  Tab:select code  y:copy  q:quit ",
        InputMode::Editing => " Enter:send  Alt+Enter:newline  Esc:normal mode  Ctrl+C:quit ",
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(hints, Style::default().fg(Color::DarkGray)),
    ];
    if let Some(status) = &app.status {
        spans.push(Span::styled(status.clone(), Style::default().fg(Color::Green)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.input_mode == InputMode::Normal {
            Color::Cyan
        } else {
            Color::DarkGray
        }));

    let inner_width = area.width.saturating_sub(2).max(1) as usize;
    let inner_height = area.height.saturating_sub(2);

    let lines = if app.store.messages().is_empty() {
        vec![Line::from(Span::styled(
            "Ask Jarvis anything...",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        transcript_lines(app, inner_width)
    };

    // Every line is already at most `inner_width` wide, so rows == lines
    let lines: Vec<Line<'static>> = lines
        .into_iter()
        .flat_map(|line| split_to_width(line, inner_width))
        .collect();
    let total = lines.len().min(u16::MAX as usize) as u16;
    app.set_chat_metrics(total, inner_height);

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

/// Break a styled line into rows no wider than `width`, cutting between chars.
///
/// Prose is word-wrapped before it gets here; this catches code lines and
/// headers that overflow.
fn split_to_width(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    if line.width() <= width {
        return vec![line];
    }

    let alignment = line.alignment;
    let mut rows: Vec<Vec<Span<'static>>> = Vec::new();
    let mut row: Vec<Span<'static>> = Vec::new();
    let mut row_width = 0;

    for span in line.spans {
        let mut chunk = String::new();
        for c in span.content.chars() {
            let w = c.width().unwrap_or(0);
            if row_width + w > width && row_width > 0 {
                if !chunk.is_empty() {
                    row.push(Span::styled(std::mem::take(&mut chunk), span.style));
                }
                rows.push(std::mem::take(&mut row));
                row_width = 0;
            }
            chunk.push(c);
            row_width += w;
        }
        if !chunk.is_empty() {
            row.push(Span::styled(chunk, span.style));
        }
    }
    rows.push(row);

    rows.into_iter()
        .map(|spans| {
            let row = Line::from(spans);
            match alignment {
                Some(a) => row.alignment(a),
                None => row,
            }
        })
        .collect()
}

fn transcript_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let placeholder = app.store.placeholder_index();
    let mut block_index = 0;

    for (idx, msg) in app.store.messages().iter().enumerate() {
        let alignment = if msg.is_bot { Alignment::Left } else { Alignment::Right };
        lines.push(author_line(msg).alignment(alignment));

        if placeholder == Some(idx) {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Typing{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        } else {
            let segments = format_message(&msg.text, app.highlighter());
            push_segments(&mut lines, &segments, alignment, width, &mut block_index, app.selected_block);
        }

        lines.push(Line::default());
    }

    lines
}

fn author_line(msg: &Message) -> Line<'static> {
    if msg.is_bot {
        Line::from(Span::styled(
            "Jarvis:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ))
    } else {
        Line::from(Span::styled(
            "You:",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
    }
}

fn push_segments(
    lines: &mut Vec<Line<'static>>,
    segments: &[Segment],
    alignment: Alignment,
    width: usize,
    block_index: &mut usize,
    selected: Option<usize>,
) {
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Text(content) => {
                let after_code = i > 0;
                let before_code = i + 1 < segments.len();
                push_text(lines, content, after_code, before_code, alignment, width);
            }
            Segment::Code(block) => {
                push_code_block(lines, block, *block_index, selected == Some(*block_index));
                *block_index += 1;
            }
        }
    }
}

/// Plain text, word-wrapped to `width`, minus the line break that merely
/// separates it from a fence
fn push_text(
    lines: &mut Vec<Line<'static>>,
    content: &str,
    after_code: bool,
    before_code: bool,
    alignment: Alignment,
    width: usize,
) {
    let mut text = content;
    if after_code {
        text = text.strip_prefix('\n').unwrap_or(text);
    }
    if before_code {
        text = text.strip_suffix('\n').unwrap_or(text);
    }
    if text.is_empty() {
        return;
    }

    for line in text.split('\n') {
        for row in textwrap::wrap(line.trim_end_matches('\r'), width) {
            lines.push(Line::from(row.into_owned()).alignment(alignment));
        }
    }
}

fn push_code_block(lines: &mut Vec<Line<'static>>, block: &CodeBlock, index: usize, selected: bool) {
    let frame_style = if selected {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let copy_hint = if selected { " y:copy" } else { "" };

    lines.push(Line::from(vec![
        Span::styled(
            format!("╭─ {} [{}]", block.label().unwrap_or("code"), index + 1),
            frame_style,
        ),
        Span::styled(copy_hint, Style::default().fg(Color::Green)),
    ]));

    for styled in &block.highlighted.lines {
        lines.push(code_line(styled, frame_style));
    }

    lines.push(Line::from(Span::styled("╰─", frame_style)));
}

fn code_line(styled: &StyledLine, frame_style: Style) -> Line<'static> {
    let mut spans = vec![Span::styled("│ ", frame_style)];
    spans.extend(
        styled
            .iter()
            .map(|span| Span::styled(span.text.clone(), to_style(span.style))),
    );
    Line::from(spans)
}

fn to_style(style: SpanStyle) -> Style {
    let mut out = Style::default();
    if let Some(rgb) = style.foreground {
        out = out.fg(Color::Rgb(rgb.0, rgb.1, rgb.2));
    }
    if style.bold {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.italic {
        out = out.add_modifier(Modifier::ITALIC);
    }
    if style.underline {
        out = out.add_modifier(Modifier::UNDERLINED);
    }
    out
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Type a message ");

    let draft = app.store.draft();
    let (cursor_row, cursor_col) = cursor_position(draft, app.input_cursor);
    let inner_height = area.height.saturating_sub(2);
    let scroll = cursor_row.saturating_sub(inner_height.saturating_sub(1));

    let input = Paragraph::new(draft.to_string())
        .block(input_block)
        .scroll((scroll, 0));
    frame.render_widget(input, area);

    if editing {
        frame.set_cursor_position(Position::new(
            area.x + 1 + cursor_col.min(area.width.saturating_sub(3)),
            area.y + 1 + cursor_row - scroll,
        ));
    }
}

/// Row and column of the char index `cursor` within a multi-line draft
fn cursor_position(draft: &str, cursor: usize) -> (u16, u16) {
    let before: String = draft.chars().take(cursor).collect();
    let row = before.matches('\n').count();
    let col = before.rsplit('\n').next().map_or(0, |line| line.chars().count());
    (row as u16, col as u16)
}
