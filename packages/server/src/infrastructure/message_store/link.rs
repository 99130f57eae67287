//! Message store wire protocol and TCP link
//!
//! One JSON object per line in each direction, strictly request/response:
//!
//! ```text
//! -> {"op":"send_message","chat_id":"r1","user_id":"alice","content":"hi"}
//! <- {"ok":true,"message_id":"0b6f..."}
//! -> {"op":"edit_message","chat_id":"r1","user_id":"bob","message_id":"0b6f...","content":"x"}
//! <- {"ok":false,"error":{"category":"permission_denied","message":"not the author"}}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};

use super::pool::{Dialer, PoolError, StoreLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOp {
    SendMessage,
    MarkRead,
    EditMessage,
    DeleteMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRequest {
    pub op: StoreOp,
    pub chat_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    NotFound,
    PermissionDenied,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFailure {
    pub category: FailureCategory,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StoreFailure>,
}

impl StoreResponse {
    pub fn accepted(message_id: Option<String>) -> Self {
        Self {
            ok: true,
            message_id,
            error: None,
        }
    }

    pub fn failed(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message_id: None,
            error: Some(StoreFailure {
                category,
                message: message.into(),
            }),
        }
    }
}

/// Dials plain TCP links to `address`
#[derive(Debug, Clone)]
pub struct TcpDialer {
    address: String,
}

impl TcpDialer {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Link = TcpLink;

    async fn dial(&self) -> Result<TcpLink, PoolError> {
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| PoolError::Dial(format!("{}: {e}", self.address)))?;
        stream
            .set_nodelay(true)
            .map_err(|e| PoolError::Dial(e.to_string()))?;
        Ok(TcpLink::new(stream))
    }
}

/// Newline-delimited JSON link over one TCP stream
#[derive(Debug)]
pub struct TcpLink {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    line: String,
}

impl TcpLink {
    pub fn new(stream: TcpStream) -> Self {
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
            line: String::new(),
        }
    }
}

#[async_trait]
impl StoreLink for TcpLink {
    async fn call(&mut self, request: &StoreRequest) -> Result<StoreResponse, PoolError> {
        let mut payload =
            serde_json::to_string(request).map_err(|e| PoolError::Io(e.to_string()))?;
        payload.push('\n');
        self.writer
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| PoolError::Io(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| PoolError::Io(e.to_string()))?;

        self.line.clear();
        let read = self
            .reader
            .read_line(&mut self.line)
            .await
            .map_err(|e| PoolError::Io(e.to_string()))?;
        if read == 0 {
            return Err(PoolError::Io("connection closed by message store".to_string()));
        }
        serde_json::from_str(self.line.trim_end())
            .map_err(|e| PoolError::Io(format!("invalid response: {e}")))
    }
}
