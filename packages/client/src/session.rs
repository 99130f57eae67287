//! WebSocket client session management.

use chatgate_server::infrastructure::dto::websocket::ServerFrame;
use futures_util::{SinkExt, StreamExt};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Error as WsError,
        client::IntoClientRequest,
        http::{HeaderValue, header::AUTHORIZATION},
        protocol::Message,
    },
};

use crate::{
    command::{Command, parse_command},
    domain::ConnectTarget,
    error::ClientError,
};

use super::{formatter::MessageFormatter, ui::show};

/// Run one WebSocket client session
///
/// Returns `Ok` when the user quits and `Err` when the connection is lost
/// or cannot be established.
pub async fn run_client_session(target: &ConnectTarget) -> Result<(), ClientError> {
    let url = target.connect_url()?;
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| ClientError::InvalidOptions(e.to_string()))?;
    if let Some(token) = target.bearer_token() {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ClientError::InvalidOptions(format!("token: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    let (ws_stream, _response) = match connect_async(request).await {
        Ok(result) => result,
        Err(WsError::Http(response)) if response.status().is_client_error() => {
            return Err(ClientError::Rejected(response.status().as_u16()));
        }
        Err(e) => return Err(ClientError::ConnectionError(e.to_string())),
    };

    tracing::info!("Connected to {}", url);
    println!(
        "\nType messages and press Enter to send. Type /quit or press Ctrl+C to exit.\n"
    );

    let (mut write, mut read) = ws_stream.split();
    let label = target.chat_id.clone();

    // Spawn a task to handle incoming frames
    let label_for_read = label.clone();
    let mut read_task = tokio::spawn(async move {
        let mut own_user_id: Option<String> = None;

        while let Some(message) = read.next().await {
            let formatted = match message {
                Ok(Message::Text(text)) => match ServerFrame::parse(text.as_str()) {
                    Ok(ServerFrame::Established(frame)) => {
                        own_user_id = Some(frame.user_id.clone());
                        MessageFormatter::format_established(&frame)
                    }
                    Ok(ServerFrame::Ack(frame)) => MessageFormatter::format_ack(&frame),
                    Ok(ServerFrame::Chat(frame)) => {
                        MessageFormatter::format_chat(&frame, own_user_id.as_deref())
                    }
                    Ok(ServerFrame::Error(frame)) => MessageFormatter::format_error(&frame),
                    Err(_) => MessageFormatter::format_raw_message(text.as_str()),
                },
                Ok(Message::Binary(data)) => MessageFormatter::format_binary_message(data.len()),
                Ok(Message::Close(frame)) => {
                    match frame {
                        Some(frame) => tracing::info!(
                            "Server closed the connection: {} {}",
                            frame.code,
                            frame.reason.as_str()
                        ),
                        None => tracing::info!("Server closed the connection"),
                    }
                    return true;
                }
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    return true;
                }
                // Pings are answered by tungstenite
                _ => continue,
            };
            show(&formatted, &label_for_read);
        }

        true
    });

    // Create channel for rustyline input
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // Spawn a blocking thread for rustyline (synchronous readline)
    let label_for_prompt = label.clone();
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        let prompt = format!("{}> ", label_for_prompt);

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    // Spawn a task to turn input lines into frames
    let mut write_task = tokio::spawn(async move {
        while let Some(line) = input_rx.recv().await {
            let frame = match parse_command(&line) {
                Ok(Command::Send(frame)) => frame,
                Ok(Command::Quit) => {
                    write.send(Message::Close(None)).await.ok();
                    return false;
                }
                Err(e) => {
                    show(&MessageFormatter::format_local_error(&e.to_string()), &label);
                    continue;
                }
            };

            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize frame: {}", e);
                    continue;
                }
            };

            if let Err(e) = write.send(Message::Text(json.into())).await {
                tracing::warn!("Failed to send frame: {}", e);
                return true;
            }
        }

        false
    });

    // If any one of the tasks completes, abort the other
    let connection_lost = tokio::select! {
        read_result = &mut read_task => {
            write_task.abort();
            read_result.unwrap_or(true)
        }
        write_result = &mut write_task => {
            read_task.abort();
            write_result.unwrap_or(true)
        }
    };

    if connection_lost {
        return Err(ClientError::ConnectionError("Connection lost".to_string()));
    }
    Ok(())
}
