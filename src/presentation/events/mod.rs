//! Event handling.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Viewer action bound to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    /// Exit the viewer.
    Quit,
    /// Scroll the focused container down one step.
    ScrollDown,
    /// Scroll the focused container up one step.
    ScrollUp,
    /// Scroll the focused container down one screen.
    PageDown,
    /// Scroll the focused container up one screen.
    PageUp,
    /// Move focus to the next scroll container.
    NextContainer,
    /// Switch between event and observer detection.
    ToggleMode,
    /// Retry every element whose load failed.
    RetryErrored,
    /// Remove the topmost visible element from the page.
    DetachVisible,
    /// Show or hide the gallery panel.
    ToggleGallery,
    /// Step the gallery's image kind filter.
    CycleGalleryFilter,
}

/// Maps a key press to a viewer command.
#[must_use]
pub fn map_key(key: &KeyEvent) -> Option<ViewerCommand> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if is_quit_event(key) {
        return Some(ViewerCommand::Quit);
    }

    let command = match key.code {
        KeyCode::Char('j') | KeyCode::Down => ViewerCommand::ScrollDown,
        KeyCode::Char('k') | KeyCode::Up => ViewerCommand::ScrollUp,
        KeyCode::PageDown | KeyCode::Char(' ') => ViewerCommand::PageDown,
        KeyCode::PageUp => ViewerCommand::PageUp,
        KeyCode::Tab => ViewerCommand::NextContainer,
        KeyCode::Char('m') => ViewerCommand::ToggleMode,
        KeyCode::Char('r') => ViewerCommand::RetryErrored,
        KeyCode::Char('x') => ViewerCommand::DetachVisible,
        KeyCode::Char('g') => ViewerCommand::ToggleGallery,
        KeyCode::Char('f') => ViewerCommand::CycleGalleryFilter,
        _ => return None,
    };
    Some(command)
}

/// Checks if key is a quit event.
#[must_use]
pub fn is_quit_event(key: &KeyEvent) -> bool {
    matches!(
        key,
        KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            ..
        } | KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } | KeyEvent {
            code: KeyCode::Esc,
            modifiers: KeyModifiers::NONE,
            ..
        }
    )
}
