//! Key bindings: normal and vim-style.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Cursor west (x - 1).
    CursorLeft,
    /// Cursor east (x + 1).
    CursorRight,
    /// Cursor north (z - 1).
    CursorUp,
    /// Cursor south (z + 1).
    CursorDown,
    /// One layer up (y + 1).
    LayerUp,
    /// One layer down (y - 1).
    LayerDown,
    /// Click the block under the cursor.
    Select,
    Restart,
    Quit,
    None,
}

/// Map key event to game action. Supports both normal (arrows, enter/space,
/// pgup/pgdn) and vim (hjkl, K/J for layers).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent {
        code, modifiers, ..
    } = key;
    let no_mod = modifiers.is_empty();
    let shifted = modifiers == KeyModifiers::SHIFT;
    if !no_mod && !shifted {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc if no_mod => Action::Quit,
        KeyCode::Char('r') if no_mod || shifted => Action::Restart,
        KeyCode::Char('R') => Action::Restart,
        KeyCode::Left | KeyCode::Char('h') if no_mod => Action::CursorLeft,
        KeyCode::Right | KeyCode::Char('l') if no_mod => Action::CursorRight,
        KeyCode::Up | KeyCode::Char('k') if no_mod => Action::CursorUp,
        KeyCode::Down | KeyCode::Char('j') if no_mod => Action::CursorDown,
        KeyCode::PageUp | KeyCode::Tab => Action::LayerUp,
        KeyCode::Char('K') => Action::LayerUp,
        KeyCode::PageDown | KeyCode::BackTab => Action::LayerDown,
        KeyCode::Char('J') => Action::LayerDown,
        KeyCode::Enter | KeyCode::Char(' ') if no_mod => Action::Select,
        KeyCode::Char('x') if no_mod => Action::Select,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn arrows_move_cursor() {
        assert_eq!(key_to_action(press(KeyCode::Left)), Action::CursorLeft);
        assert_eq!(key_to_action(press(KeyCode::Down)), Action::CursorDown);
    }

    #[test]
    fn vim_layer_keys_are_shifted() {
        let k = KeyEvent::new(KeyCode::Char('K'), KeyModifiers::SHIFT);
        assert_eq!(key_to_action(k), Action::LayerUp);
        let j = KeyEvent::new(KeyCode::Char('J'), KeyModifiers::SHIFT);
        assert_eq!(key_to_action(j), Action::LayerDown);
    }

    #[test]
    fn select_keys() {
        assert_eq!(key_to_action(press(KeyCode::Enter)), Action::Select);
        assert_eq!(key_to_action(press(KeyCode::Char(' '))), Action::Select);
    }

    #[test]
    fn modified_keys_are_ignored() {
        let k = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert_eq!(key_to_action(k), Action::None);
    }
}
