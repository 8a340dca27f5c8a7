use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::cursor::CursorMove;

#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    InsertChar(char),
    InsertNewline,
    DeleteChar,
    DeleteCharBefore,
    Move(CursorMove),
    None,
}

pub fn process_key(key: KeyEvent) -> InputAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char(_) if ctrl || key.modifiers.contains(KeyModifiers::ALT) => InputAction::None,
        KeyCode::Char(c) => InputAction::InsertChar(c),
        KeyCode::Enter => InputAction::InsertNewline,
        KeyCode::Backspace => InputAction::DeleteCharBefore,
        KeyCode::Delete => InputAction::DeleteChar,
        KeyCode::Left => InputAction::Move(CursorMove::Back),
        KeyCode::Right => InputAction::Move(CursorMove::Forward),
        KeyCode::Up => InputAction::Move(CursorMove::Up),
        KeyCode::Down => InputAction::Move(CursorMove::Down),
        KeyCode::Home if ctrl => InputAction::Move(CursorMove::Top),
        KeyCode::End if ctrl => InputAction::Move(CursorMove::Bottom),
        KeyCode::Home => InputAction::Move(CursorMove::Head),
        KeyCode::End => InputAction::Move(CursorMove::End),
        KeyCode::PageUp => InputAction::Move(CursorMove::PageUp),
        KeyCode::PageDown => InputAction::Move(CursorMove::PageDown),
        _ => InputAction::None,
    }
}
