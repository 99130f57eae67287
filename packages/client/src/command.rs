//! Input line parsing.
//!
//! Plain text becomes a `text` frame; lines starting with `/` are commands:
//!
//! - `/typing`
//! - `/read <message_id>`
//! - `/edit <message_id> <new text>`
//! - `/delete <message_id>`
//! - `/ping` (sends `connection_check`)
//! - `/quit`

use chatgate_server::{
    domain::MessageId,
    infrastructure::dto::websocket::{ChatFrame, FrameKind},
};

use crate::error::ClientError;

/// What the write loop should do with one input line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Send(ChatFrame),
    Quit,
}

/// Parse one trimmed, non-empty input line
///
/// `user_id` and `chat_id` are left empty; the gateway fills them from the
/// connection.
pub fn parse_command(line: &str) -> Result<Command, ClientError> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Send(ChatFrame {
            r#type: FrameKind::Text,
            content: line.to_string(),
            message_id: Some(MessageId::provisional().into_string()),
            ..Default::default()
        }));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    match name {
        "quit" => Ok(Command::Quit),
        "typing" => Ok(Command::Send(frame(FrameKind::Typing))),
        "ping" => Ok(Command::Send(frame(FrameKind::ConnectionCheck))),
        "read" => Ok(Command::Send(targeted(FrameKind::Read, single_id(name, args)?))),
        "delete" => Ok(Command::Send(targeted(
            FrameKind::Delete,
            single_id(name, args)?,
        ))),
        "edit" => {
            let (id, content) = args
                .split_once(char::is_whitespace)
                .map(|(id, content)| (id, content.trim()))
                .filter(|(_, content)| !content.is_empty())
                .ok_or_else(|| {
                    ClientError::InvalidCommand("usage: /edit <message_id> <text>".to_string())
                })?;
            let mut edit = targeted(FrameKind::Edit, id);
            edit.content = content.to_string();
            Ok(Command::Send(edit))
        }
        other => Err(ClientError::InvalidCommand(format!("unknown command /{}", other))),
    }
}

fn frame(kind: FrameKind) -> ChatFrame {
    ChatFrame {
        r#type: kind,
        ..Default::default()
    }
}

fn targeted(kind: FrameKind, message_id: &str) -> ChatFrame {
    ChatFrame {
        r#type: kind,
        message_id: Some(message_id.to_string()),
        ..Default::default()
    }
}

fn single_id<'a>(name: &str, args: &'a str) -> Result<&'a str, ClientError> {
    let mut parts = args.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(id), None) => Ok(id),
        _ => Err(ClientError::InvalidCommand(format!(
            "usage: /{} <message_id>",
            name
        ))),
    }
}
