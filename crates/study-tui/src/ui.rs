use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use study_core::ChatRole;

use crate::app::{App, InputMode, ServerStatus};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            // Consume the second *
            chars.next();

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }
                spans.push(Span::styled(bold_text, Style::default().add_modifier(Modifier::BOLD)));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
                if found_close {
                    current_text.push_str("**");
                }
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    Line::from(spans)
}

fn role_style(role: ChatRole) -> Style {
    let color = match role {
        ChatRole::User => Color::Cyan,
        ChatRole::Assistant => Color::Yellow,
        ChatRole::System => Color::Red,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
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
    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if let Some(message) = &app.error_dialog {
        render_error_dialog(message, frame, area);
    } else if app.show_file_prompt {
        render_file_prompt(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (status_text, status_color) = match app.server_status {
        ServerStatus::Checking => ("○ connecting", Color::Gray),
        ServerStatus::Online => ("● online", Color::Green),
        ServerStatus::Offline => ("● offline", Color::Red),
    };

    let mut title = vec![
        Span::styled(" AI Study Assistant (Ollama) ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("{} ", app.selected_model()), Style::default().fg(Color::White)),
        Span::styled(status_text, Style::default().fg(status_color)),
    ];
    if app.model_installed == Some(false) {
        title.push(Span::styled(
            format!("  model not pulled: ollama pull {}", app.selected_model()),
            Style::default().fg(Color::Yellow),
        ));
    }
    title.push(Span::styled(
        format!("  v{}", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::Gray),
    ));

    let header = Paragraph::new(Line::from(title)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store area for mouse hit-testing and inner size for scroll calculations
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);

    let border_color = if app.input_mode == InputMode::Normal {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chat ");

    let chat_text = if app.chat_messages.is_empty() && !app.is_waiting() {
        Text::from(Span::styled(
            "Ask a question about your studies, or press Ctrl+O to attach notes...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &app.chat_messages {
            lines.push(Line::from(Span::styled(
                format!("{}:", msg.role.label()),
                role_style(msg.role),
            )));
            match msg.role {
                ChatRole::Assistant => {
                    for line in msg.content.lines() {
                        lines.push(parse_markdown_line(line));
                    }
                }
                ChatRole::User | ChatRole::System => {
                    for line in msg.content.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                }
            }
            lines.push(Line::default());
        }

        if app.is_waiting() {
            lines.push(Line::from(Span::styled(
                format!("{}:", ChatRole::Assistant.label()),
                role_style(ChatRole::Assistant),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            let pending = app.pending_requests();
            let status = if pending > 1 {
                format!("Thinking{} ({} questions pending)", dots, pending)
            } else {
                format!("Thinking{}", dots)
            };
            lines.push(Line::from(Span::styled(
                status,
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    // Measure before attaching the block so the count covers the inner area only
    let chat = Paragraph::new(chat_text).wrap(Wrap { trim: false });
    let total = chat.line_count(area.width.saturating_sub(2));
    app.set_chat_total_lines(u16::try_from(total).unwrap_or(u16::MAX));

    let chat = chat.block(chat_block).scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let title = match app.materials.attached() {
        Some(material) => format!(" Ask · attached: {} ", material.file_name()),
        None => " Ask ".to_string(),
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    // Use cyan text to match the "You:" style
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing and no popup owns it
    let popup_open = app.error_dialog.is_some() || app.show_file_prompt || app.show_model_picker;
    if editing && !popup_open {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " CHAT ",
        InputMode::Editing => " ASK ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = if app.error_dialog.is_some() {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" dismiss ", label_style),
        ]
    } else if app.show_file_prompt {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" load ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ]
    } else if app.show_model_picker {
        vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" select ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ]
    } else {
        match app.input_mode {
            InputMode::Editing => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", label_style),
                Span::styled(" Ctrl+O ", key_style),
                Span::styled(" attach file ", label_style),
                Span::styled(" ↑/↓ ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" stop typing ", label_style),
            ],
            InputMode::Normal => {
                let mut hints = vec![
                    Span::styled(" j/k ", key_style),
                    Span::styled(" scroll ", label_style),
                    Span::styled(" i ", key_style),
                    Span::styled(" ask ", label_style),
                    Span::styled(" o ", key_style),
                    Span::styled(" attach ", label_style),
                ];
                if app.materials.attached().is_some() {
                    hints.extend(vec![
                        Span::styled(" x ", key_style),
                        Span::styled(" detach ", label_style),
                    ]);
                }
                hints.extend(vec![
                    Span::styled(" M ", key_style),
                    Span::styled(" model ", label_style),
                    Span::styled(" q ", key_style),
                    Span::styled(" quit ", label_style),
                ]);
                hints
            }
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

/// Centered rectangle of the given size, clamped to `area`.
fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_error_dialog(message: &str, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area, 60, 7);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Error ");

    let text = Text::from(vec![
        Line::from(message.to_string()),
        Line::default(),
        Line::from(Span::styled("Press Enter to close", Style::default().fg(Color::DarkGray))),
    ]);

    let dialog = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    frame.render_widget(dialog, popup_area);
}

fn render_file_prompt(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area, 70, 6);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Attach Study Material ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Path to a UTF-8 text file. Enter to load, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    // Input field with the same horizontal scrolling as the question box
    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let width = input_area.width as usize;
    let scroll_offset = if width > 0 && app.file_input_cursor >= width {
        app.file_input_cursor - width + 1
    } else {
        0
    };
    let visible: String = app.file_input.chars().skip(scroll_offset).take(width).collect();

    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(Color::Cyan)),
        input_area,
    );

    let cursor_x = (app.file_input_cursor - scroll_offset) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area, 40, app.available_models.len() as u16 + 2);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model ");

    let current = app.selected_model().to_string();
    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if *model == current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use study_core::{ChatMessage, Config, ModelResponse};

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_parse_markdown_bold() {
        let line = parse_markdown_line("Use **F = ma** here");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "F = ma");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line_text(&line), "Use F = ma here");
    }

    #[test]
    fn test_parse_markdown_unclosed_is_literal() {
        let line = parse_markdown_line("2 ** 3 is eight");
        assert_eq!(line_text(&line), "2 ** 3 is eight");
        assert_eq!(line_text(&parse_markdown_line("**** empty")), "**** empty");
        assert_eq!(line_text(&parse_markdown_line("*single*")), "*single*");
    }

    #[test]
    fn test_render_shows_labels_and_thinking() {
        let mut app = App::new(&Config::new()).unwrap();
        app.chat_messages.push(ChatMessage::user("What is a prime?"));
        app.chat_messages.push(ChatMessage::system("Error: timeout"));
        app.input = "next question".to_string();
        app.submit_question();

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let screen: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(screen.contains("You:"));
        assert!(screen.contains("System:"));
        assert!(screen.contains("Thinking."));
        assert!(screen.contains("AI Study Assistant"));
        assert_eq!(app.chat_height, 24 - 1 - 3 - 1 - 2);
    }

    #[test]
    fn test_newest_wrapped_reply_is_visible() {
        let mut app = App::new(&Config::new()).unwrap();
        app.input = "Explain recursion".to_string();
        let request = app.submit_question().unwrap();
        app.apply_response(ModelResponse {
            id: request.id,
            outcome: Ok("Recursion means a function calls itself until a base case \
                         stops it and every pending call then returns in turn OMEGA"
                .to_string()),
        });

        // Narrow pane: word wrapping needs more rows than a character count suggests
        let mut terminal = Terminal::new(TestBackend::new(30, 12)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let screen: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(screen.contains("OMEGA"));
        assert!(app.chat_scroll > 0);
        assert_eq!(app.chat_scroll, app.chat_total_lines - app.chat_height);
    }

    #[test]
    fn test_error_dialog_renders_on_top() {
        let mut app = App::new(&Config::new()).unwrap();
        app.error_dialog = Some("Failed to read file: missing".to_string());

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let screen: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(screen.contains("Failed to read file: missing"));
        assert!(screen.contains("Error"));
    }
}
