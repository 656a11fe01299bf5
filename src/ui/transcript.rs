//! Plain-text rendering of a conversation log.
//!
//! - date separators between messages from different local days
//! - consecutive messages of one sender share a single header line
//! - the operator's own messages are attributed to "You"

use chrono::{Local, NaiveDate};

use crate::domain::message::{FormattedMessage, SenderKind};

const INDENT: &str = "      ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptElement {
    /// e.g. "14 Feb 2026"
    DateSeparator(String),
    Message {
        time: String,
        /// Present on the first message of a sender run.
        sender: Option<String>,
        content: String,
    },
}

/// Groups the log into display elements.
pub fn build_transcript(messages: &[FormattedMessage]) -> Vec<TranscriptElement> {
    let mut elements = Vec::new();
    let mut prev_date: Option<NaiveDate> = None;
    let mut prev_sender: Option<String> = None;

    for formatted in messages {
        let date = formatted
            .message
            .created_at
            .with_timezone(&Local)
            .date_naive();

        if prev_date != Some(date) {
            elements.push(TranscriptElement::DateSeparator(
                date.format("%-d %b %Y").to_string(),
            ));
            prev_sender = None;
        }

        let sender_name = sender_label(formatted);
        let sender = (prev_sender.as_deref() != Some(sender_name.as_str()))
            .then(|| sender_name.clone());

        elements.push(TranscriptElement::Message {
            time: formatted.time.clone(),
            sender,
            content: formatted.message.content.clone(),
        });

        prev_date = Some(date);
        prev_sender = Some(sender_name);
    }

    elements
}

/// Flattens elements into printable lines.
pub fn render_lines(elements: &[TranscriptElement]) -> Vec<String> {
    let mut lines = Vec::new();

    for element in elements {
        match element {
            TranscriptElement::DateSeparator(date) => {
                lines.push(String::new());
                lines.push(format!("--- {date} ---"));
            }
            TranscriptElement::Message {
                time,
                sender: Some(sender),
                content,
            } => {
                lines.push(format!("{time:>5} {sender}:"));
                if content.is_empty() {
                    lines.push(format!("{INDENT}[Empty message]"));
                }
                lines.extend(content.lines().map(|line| format!("{INDENT}{line}")));
            }
            TranscriptElement::Message {
                time,
                sender: None,
                content,
            } => {
                let mut content_lines = content.lines();
                let first = content_lines.next().unwrap_or("[Empty message]");
                lines.push(format!("{time:>5} {first}"));
                lines.extend(content_lines.map(|line| format!("{INDENT}{line}")));
            }
        }
    }

    lines
}

fn sender_label(formatted: &FormattedMessage) -> String {
    if formatted.is_own {
        return "You".to_owned();
    }

    let message = &formatted.message;
    match message.sender_kind {
        SenderKind::User => format!("user {}", message.sender_id),
        SenderKind::Admin => format!("admin {}", message.sender_id),
    }
}
