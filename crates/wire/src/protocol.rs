// SPDX-License-Identifier: MIT

//! Wire format for the notifier channel: a 4-byte big-endian length prefix
//! followed by a JSON payload, the same framing the daemon's own IPC
//! protocol uses for CLI<->daemon traffic. Keeping one framing convention
//! across every long-lived connection in the workspace means there is only
//! one place a truncation or oversize bug can hide.

use ldrepl_core::Command;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Maximum accepted frame size. The notifier only ever sends a handful of
/// bytes per message; anything larger indicates a desynchronized stream.
pub const MAX_FRAME_BYTES: u32 = 1 << 20;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_BYTES} byte limit")]
    FrameTooLarge(u32),
}

/// Requests the daemon sends to the notifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum NotifierRequest {
    /// "Give me transaction `id`'s DN + op."
    GetDn { id: u64 },
    /// "Are you alive?"
    Alive,
    /// Re-send a previously outstanding `GetDn` request under a new msgid.
    Resend { msgid: u64, id: u64 },
    /// "Reconnect me" -- open a fresh logical client on this connection.
    NewClient,
}

/// Replies the notifier sends back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum NotifierReply {
    /// `(id, dn, command)`. `command` is one of
    /// `{'a','m','d','n','r'}`, or the sentinel `0` meaning "ask LDAP's
    /// translog for the rest" (protocol v3+).
    Transaction { msgid: u64, id: u64, dn: Option<String>, command: u8 },
    Ack { msgid: u64 },
    Err { msgid: u64, message: String },
}

impl NotifierReply {
    pub fn msgid(&self) -> u64 {
        match self {
            NotifierReply::Transaction { msgid, .. }
            | NotifierReply::Ack { msgid }
            | NotifierReply::Err { msgid, .. } => *msgid,
        }
    }

    /// Decode the wire command byte, surfacing an unrecognized byte as a
    /// protocol error rather than panicking -- a desynchronized notifier is
    /// a transport fault, not a crash.
    pub fn command(&self) -> Result<Command, ldrepl_core::UnknownCommand> {
        match self {
            NotifierReply::Transaction { command, .. } => Command::try_from(*command),
            _ => Ok(Command::ResolveViaTranslog),
        }
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub async fn write_message<W: AsyncWriteExt + Unpin, T: Serialize>(
    writer: &mut W,
    value: &T,
) -> Result<(), ProtocolError> {
    let payload = encode(value)?;
    let len = u32::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge(u32::MAX))?;
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_message<R: AsyncReadExt + Unpin, T: for<'de> Deserialize<'de>>(
    reader: &mut R,
) -> Result<T, ProtocolError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    decode(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn request_roundtrips_through_the_wire() {
        let mut buf = Vec::new();
        write_message(&mut buf, &NotifierRequest::GetDn { id: 42 }).await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let decoded: NotifierRequest = read_message(&mut cursor).await.unwrap();
        assert_eq!(decoded, NotifierRequest::GetDn { id: 42 });
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_on_read() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_BYTES + 1).to_be_bytes());
        let mut cursor = std::io::Cursor::new(buf);
        let result: Result<NotifierRequest, _> = read_message(&mut cursor).await;
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge(_))));
    }

    #[test]
    fn reply_command_decodes_resolve_via_translog_sentinel() {
        let reply = NotifierReply::Transaction { msgid: 1, id: 7, dn: None, command: 0 };
        assert_eq!(reply.command().unwrap(), Command::ResolveViaTranslog);
    }

    proptest! {
        // A desynchronized stream can hand us arbitrary bytes inside a
        // well-formed length prefix; decoding must error, never panic.
        #[test]
        fn decode_never_panics_on_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let _: Result<NotifierRequest, _> = decode(&bytes);
        }

        #[test]
        fn get_dn_request_roundtrips_for_any_id(id in any::<u64>()) {
            let encoded = encode(&NotifierRequest::GetDn { id }).unwrap();
            let decoded: NotifierRequest = decode(&encoded).unwrap();
            prop_assert_eq!(decoded, NotifierRequest::GetDn { id });
        }
    }
}
