// src/bus/tcp/codec.rs

//! Line-delimited JSON frames.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{ClientId, ErrorCode, Message, Result};

/// Longest frame accepted from a peer, in bytes.
const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Frame {
    // --- client → server
    Connect {
        app_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        app_instance_id: Option<String>,
    },
    OpenPublisher {
        publisher: u64,
        endpoint_name: String,
    },
    Send {
        publisher: u64,
        message: Message,
    },
    ClosePublisher {
        publisher: u64,
    },
    Disconnect,

    // --- server → client
    Connected {
        client_id: ClientId,
    },
    Refused {
        code: ErrorCode,
        description: String,
    },
}

/// Write one frame followed by a newline, and flush.
pub(crate) async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    // ---
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. `Ok(None)` means the peer closed the stream.
pub(crate) async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncBufRead + Unpin,
{
    // ---
    let mut line = String::new();
    loop {
        line.clear();
        // One byte over the limit is enough to tell an oversized frame apart.
        let n = (&mut *reader)
            .take(MAX_FRAME_LEN as u64 + 1)
            .read_line(&mut line)
            .await?;
        if n == 0 {
            return Ok(None);
        }
        if n > MAX_FRAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("frame of {n} bytes exceeds {MAX_FRAME_LEN}"),
            )
            .into());
        }
        // Blank lines are keep-alives.
        if !line.trim().is_empty() {
            break;
        }
    }
    Ok(Some(serde_json::from_str(line.trim_end())?))
}
