use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Represents the result of handling a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Quit the application
    Quit,
    /// Keep the current item
    Keep,
    /// Queue the current item for deletion
    Delete,
    /// Undo last swipe
    Undo,
    /// Drop the most recently queued item from the selection
    Unmark,
    /// Delete everything queued so far
    DeleteBatch,
    /// Re-read the media library
    Rescan,
    /// Switch to the next filter preset
    CycleFilter,
    /// Toggle smart ordering
    ToggleSmart,
    /// Toggle the delete confirmation preference
    ToggleConfirmation,
    /// Buy the pro unlock
    BuyPro,
    /// Restore previous purchases
    RestorePurchases,
    /// Toggle help
    Help,
    /// Answer yes to a prompt
    Confirm,
    /// Answer no to a prompt
    Cancel,
    /// No action
    None,
}

/// Maps keyboard events to actions
pub fn handle_key_event(key: KeyEvent) -> KeyAction {
    match (key.code, key.modifiers) {
        // Quit: q, Esc or Ctrl+C
        (KeyCode::Char('q'), KeyModifiers::NONE) => KeyAction::Quit,
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => KeyAction::Quit,
        (KeyCode::Esc, KeyModifiers::NONE) => KeyAction::Quit,

        // Keep: Right arrow or k
        (KeyCode::Right, KeyModifiers::NONE) => KeyAction::Keep,
        (KeyCode::Char('k'), KeyModifiers::NONE) => KeyAction::Keep,

        // Delete: Left arrow or d
        (KeyCode::Left, KeyModifiers::NONE) => KeyAction::Delete,
        (KeyCode::Char('d'), KeyModifiers::NONE) => KeyAction::Delete,

        // Undo: u or Ctrl+Z
        (KeyCode::Char('u'), KeyModifiers::NONE) => KeyAction::Undo,
        (KeyCode::Char('z'), KeyModifiers::CONTROL) => KeyAction::Undo,

        (KeyCode::Char('x'), KeyModifiers::NONE) => KeyAction::Unmark,
        (KeyCode::Char('D'), KeyModifiers::SHIFT) => KeyAction::DeleteBatch,
        (KeyCode::Char('D'), KeyModifiers::NONE) => KeyAction::DeleteBatch,
        (KeyCode::Char('r'), KeyModifiers::NONE) => KeyAction::Rescan,
        (KeyCode::Char('f'), KeyModifiers::NONE) => KeyAction::CycleFilter,
        (KeyCode::Char('s'), KeyModifiers::NONE) => KeyAction::ToggleSmart,
        (KeyCode::Char('c'), KeyModifiers::NONE) => KeyAction::ToggleConfirmation,
        (KeyCode::Char('p'), KeyModifiers::NONE) => KeyAction::BuyPro,
        (KeyCode::Char('R'), KeyModifiers::SHIFT) => KeyAction::RestorePurchases,
        (KeyCode::Char('R'), KeyModifiers::NONE) => KeyAction::RestorePurchases,

        // Help: ?
        (KeyCode::Char('?'), KeyModifiers::NONE) => KeyAction::Help,
        (KeyCode::Char('?'), KeyModifiers::SHIFT) => KeyAction::Help,

        _ => KeyAction::None,
    }
}

/// Maps keyboard events to answers for a yes/no prompt
pub fn handle_confirm_input(key: KeyEvent) -> KeyAction {
    match (key.code, key.modifiers) {
        // Confirm: y or Enter
        (KeyCode::Char('y'), KeyModifiers::NONE) => KeyAction::Confirm,
        (KeyCode::Char('Y'), _) => KeyAction::Confirm,
        (KeyCode::Enter, KeyModifiers::NONE) => KeyAction::Confirm,

        // Cancel: n or Esc
        (KeyCode::Char('n'), KeyModifiers::NONE) => KeyAction::Cancel,
        (KeyCode::Char('N'), _) => KeyAction::Cancel,
        (KeyCode::Esc, KeyModifiers::NONE) => KeyAction::Cancel,

        _ => KeyAction::None,
    }
}
