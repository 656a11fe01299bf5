//! Fixed-width rows for the conversation list.

use chrono::Local;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::domain::{
    conversation::{Conversation, ConversationKind},
    message::CurrentUser,
};

pub const DEFAULT_ROW_WIDTH: usize = 72;
const TITLE_WIDTH: usize = 22;
const EMPTY_PREVIEW: &str = "No messages yet";

/// `HH:MM | title | preview [unread]`, padded or cut to `width` columns.
pub fn conversation_row(conversation: &Conversation, user: &CurrentUser, width: usize) -> String {
    let timestamp = conversation
        .last_message
        .as_ref()
        .map(|m| m.created_at.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "     ".to_owned());

    let marker = match conversation.kind {
        ConversationKind::Private => ' ',
        ConversationKind::Group => '#',
    };
    let title = pad_to_width(
        &truncate_to_width(&conversation.title(Some(&user.name)), TITLE_WIDTH),
        TITLE_WIDTH,
    );

    let preview = conversation
        .last_message
        .as_ref()
        .map(|m| {
            let text = normalize_preview(&m.content);
            if m.is_own(user) {
                format!("You: {text}")
            } else {
                text
            }
        })
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| EMPTY_PREVIEW.to_owned());

    let badge = if conversation.unread_count > 0 {
        format!(" [{}]", conversation.unread_count)
    } else {
        String::new()
    };

    let prefix = format!("{timestamp:>5} | {marker}{title} | ");
    let available = width.saturating_sub(prefix.width() + badge.width());
    let preview = pad_to_width(&truncate_to_width(&preview, available), available);

    format!("{prefix}{preview}{badge}")
}

/// Cuts `text` to at most `max` columns, ending with `...` when cut.
pub fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_owned();
    }

    let budget = max.saturating_sub(3);
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(ch);
    }

    if max >= 3 {
        out.push_str("...");
    }
    out
}

fn pad_to_width(text: &str, width: usize) -> String {
    let pad = width.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(pad))
}

fn normalize_preview(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
