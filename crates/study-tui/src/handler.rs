use std::future::Future;
use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use study_core::{GatewayError, ModelRequest, ModelResponse, OllamaClient, RequestId};
use tokio::sync::mpsc::UnboundedSender;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent, tx: &UnboundedSender<AppEvent>) {
    match event {
        AppEvent::Key(key) => handle_key(app, key, tx),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Response(response) => app.apply_response(response),
        AppEvent::Models { result, open_picker } => app.apply_models(result, open_picker),
    }
}

/// Run one model call in the background and report the outcome as an event.
pub fn spawn_completion(gateway: OllamaClient, request: ModelRequest, tx: UnboundedSender<AppEvent>) {
    let ModelRequest { id, prompt } = request;
    run_completion(id, async move { gateway.complete(&prompt).await }, tx);
}

/// Drive `call` on its own task and send its outcome back as a response.
///
/// The call runs in a nested task so a panic inside it still produces
/// a response instead of leaving the question unanswered.
fn run_completion<F>(id: RequestId, call: F, tx: UnboundedSender<AppEvent>)
where
    F: Future<Output = Result<String, GatewayError>> + Send + 'static,
{
    tokio::spawn(async move {
        let started = Instant::now();

        let outcome = match tokio::spawn(call).await {
            Ok(Ok(text)) => {
                tracing::info!(id, elapsed_ms = started.elapsed().as_millis() as u64, "model answered");
                Ok(text)
            }
            Ok(Err(e)) => {
                tracing::warn!(id, error = %e, "model request failed");
                Err(e.to_string())
            }
            Err(e) => {
                tracing::error!(id, error = %e, "model request task died");
                Err(format!("background task failed: {}", e))
            }
        };

        let _ = tx.send(AppEvent::Response(ModelResponse { id, outcome }));
    });
}

/// Ask the server which models are installed.
pub fn spawn_model_list(gateway: OllamaClient, open_picker: bool, tx: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let result = gateway.list_models().await.map_err(|e| e.to_string());
        if let Err(e) = &result {
            tracing::warn!(error = %e, "could not list models");
        }
        let _ = tx.send(AppEvent::Models { result, open_picker });
    });
}

fn send_question(app: &mut App, tx: &UnboundedSender<AppEvent>) {
    if let Some(request) = app.submit_question() {
        tracing::info!(id = request.id, model = app.selected_model(), "question submitted");
        spawn_completion(app.gateway.clone(), request, tx.clone());
    }
}

fn handle_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // The error dialog is modal
    if app.error_dialog.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            app.error_dialog = None;
        }
        return;
    }

    if app.show_file_prompt {
        handle_file_prompt(app, key);
        return;
    }

    if app.show_model_picker {
        handle_model_picker(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key, tx),
        InputMode::Editing => handle_editing_mode(app, key, tx),
    }
}

fn handle_file_prompt(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_file_prompt(),
        KeyCode::Enter => {
            let path = app.file_input.trim().to_string();
            app.close_file_prompt();
            if !path.is_empty() {
                app.attach_material(&path);
            }
        }
        _ => edit_line(&mut app.file_input, &mut app.file_input_cursor, key),
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_model_picker = false;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.model_picker_nav_down();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.model_picker_nav_up();
        }
        KeyCode::Enter => {
            app.select_model();
        }
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Back to typing, cursor at end of existing text
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            app.input_cursor = app.input.chars().count();
        }

        // Half-page scroll (must be before plain 'd'/'u' to match first)
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_up();
        }

        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::PageDown => app.scroll_half_page_down(),
        KeyCode::PageUp => app.scroll_half_page_up(),
        KeyCode::Char('g') => app.scroll_chat_to_top(),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        // Study material
        KeyCode::Char('o') => app.open_file_prompt(),
        KeyCode::Char('x') => app.detach_material(),

        // Open model picker once the server tells us what is installed
        KeyCode::Char('M') => {
            spawn_model_list(app.gateway.clone(), true, tx.clone());
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => send_question(app, tx),
        KeyCode::Char('o') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.open_file_prompt();
        }
        KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::PageUp => app.scroll_half_page_up(),
        KeyCode::PageDown => app.scroll_half_page_down(),
        _ => edit_line(&mut app.input, &mut app.input_cursor, key),
    }
}

/// Apply a cursor or text editing key to a single-line input.
fn edit_line(text: &mut String, cursor: &mut usize, key: KeyEvent) {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = text.chars().count();
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = text.chars().count();
            *cursor = (*cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            *cursor = 0;
        }
        KeyCode::End => {
            *cursor = text.chars().count();
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_chat_down(3),
        MouseEventKind::ScrollUp => app.scroll_chat_up(3),
        _ => {}
    }
}
