//! Turns node output into Telegram payloads.

use shoplist_core::core::Keyboard;

use crate::telegram::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Telegram rejects messages longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 4096;
/// Telegram rejects empty message text.
const EMPTY_TEXT: &str = "…";

/// Inline keyboard for `keyboard`, or `None` when it has no buttons.
pub(crate) fn keyboard_markup(keyboard: &Keyboard) -> Option<InlineKeyboardMarkup> {
    if keyboard.is_empty() {
        return None;
    }
    let inline_keyboard = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| InlineKeyboardButton {
                    text: button.label.clone(),
                    callback_data: button.token.clone(),
                })
                .collect()
        })
        .collect();
    Some(InlineKeyboardMarkup { inline_keyboard })
}

/// Message text as sent: never empty, capped at the Telegram limit.
pub(crate) fn message_text(text: &str) -> String {
    if text.trim().is_empty() {
        return EMPTY_TEXT.to_string();
    }
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let mut capped: String = text.chars().take(MAX_MESSAGE_CHARS - 1).collect();
    capped.push('…');
    capped
}

/// Puts `prefix` on its own line above `text`.
pub(crate) fn prefixed(prefix: &str, text: &str) -> String {
    format!("{prefix}\n{text}")
}
