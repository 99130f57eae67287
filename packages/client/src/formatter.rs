//! Frame formatting for terminal display.

use chatgate_server::infrastructure::dto::websocket::{
    ChatFrame, ConnectionAckFrame, ConnectionEstablishedFrame, ErrorFrame, FrameKind,
};
use chatgate_shared::time::{to_clock_time, to_rfc3339};
use chrono::{DateTime, Utc};

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the `connection_established` notice
    pub fn format_established(frame: &ConnectionEstablishedFrame) -> String {
        let mut output = String::new();
        output.push_str("\n\n============================================================\n");
        output.push_str(&format!(
            "Joined room '{}' as '{}' at {}\n",
            frame.chat_id,
            frame.user_id,
            to_rfc3339(&frame.timestamp)
        ));
        output.push_str("Commands: /typing /read <id> /edit <id> <text> /delete <id> /ping /quit\n");
        output.push_str("============================================================\n");
        output
    }

    /// Format the reply to `/ping`
    pub fn format_ack(frame: &ConnectionAckFrame) -> String {
        format!(
            "\n* {} (room '{}', {})\n",
            frame.message,
            frame.chat_id,
            to_clock_time(&frame.timestamp)
        )
    }

    /// Format a chat frame fanned out by the gateway
    ///
    /// # Arguments
    ///
    /// * `frame` - The received frame
    /// * `own_user_id` - This client's user ID, once known, to mark own frames
    pub fn format_chat(frame: &ChatFrame, own_user_id: Option<&str>) -> String {
        let time = clock_or_placeholder(frame.timestamp);
        let is_me = own_user_id.is_some_and(|me| me == frame.user_id);
        let who = if is_me {
            format!("{} (me)", frame.user_id)
        } else {
            frame.user_id.clone()
        };
        let id = frame.message_id.as_deref().unwrap_or("?");

        match frame.r#type {
            FrameKind::Text => match &frame.original_id {
                Some(original) if is_me => format!(
                    "\n[{}] {}: {}\n    stored as {} (sent as {})\n",
                    time, who, frame.content, id, original
                ),
                _ => format!("\n[{}] {}: {}  <{}>\n", time, who, frame.content, id),
            },
            FrameKind::Typing => format!("\n{} is typing...\n", who),
            FrameKind::Read => format!("\n[{}] {} read <{}>\n", time, who, id),
            FrameKind::Edit => format!(
                "\n[{}] {} edited <{}>: {}\n",
                time, who, id, frame.content
            ),
            FrameKind::Delete => format!("\n[{}] {} deleted <{}>\n", time, who, id),
            other => format!("\n[{}] {} sent '{}'\n", time, who, other.as_str()),
        }
    }

    /// Format a reject frame
    pub fn format_error(frame: &ErrorFrame) -> String {
        format!(
            "\n! {}: {}\n",
            frame.error.code.as_str(),
            frame.error.message
        )
    }

    /// Format a local input problem that was never sent
    pub fn format_local_error(message: &str) -> String {
        format!("\n! {}\n", message)
    }

    /// Format a binary message
    pub fn format_binary_message(len: usize) -> String {
        format!("\nReceived binary data: {} bytes\n", len)
    }

    /// Format a raw text message that could not be classified
    pub fn format_raw_message(text: &str) -> String {
        format!("\n{}\n", text)
    }
}

fn clock_or_placeholder(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|t| to_clock_time(&t))
        .unwrap_or_else(|| "--:--:--".to_string())
}
