// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Exec I/O over task websockets.
//!
//! An exec task exposes three websockets: `control`, `stdio` and `stderr`.
//! Data travels in binary frames; a text frame `{"command":"end"}` marks the
//! end of a stream in either direction.

use std::path::Path;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::UnixStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::client::PebbleClient;
use crate::error::Result;

const END_OF_STREAM: &str = r#"{"command":"end"}"#;

type TaskSocket = WebSocketStream<UnixStream>;

#[derive(Deserialize)]
struct StreamCommand {
    command: String,
}

fn is_end_of_stream(text: &str) -> bool {
    serde_json::from_str::<StreamCommand>(text)
        .map(|c| c.command == "end")
        .unwrap_or(false)
}

async fn connect(socket: &Path, task_id: &str, kind: &str) -> Result<TaskSocket> {
    let stream = UnixStream::connect(socket)
        .await
        .map_err(|e| PebbleClient::unavailable(socket, e))?;
    let url = format!("ws://localhost/v1/tasks/{task_id}/websocket/{kind}");
    let (ws, _) = tokio_tungstenite::client_async(url, stream).await?;
    Ok(ws)
}

/// Read binary frames until the end marker or the socket goes away.
///
/// A process that exits quickly may have its socket torn down before every
/// frame is acknowledged; whatever arrived is kept.
async fn read_to_end(ws: &mut TaskSocket, kind: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Binary(data)) => buf.extend_from_slice(&data),
            Ok(Message::Text(text)) if is_end_of_stream(text.as_str()) => break,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(stream = kind, error = %e, "Task websocket ended early");
                break;
            }
        }
    }
    buf
}

/// Attach to an exec task, close its stdin and collect stdout and stderr.
pub(crate) async fn collect_output(socket: &Path, task_id: &str) -> Result<(String, String)> {
    let mut control = connect(socket, task_id, "control").await?;
    let mut stdio = connect(socket, task_id, "stdio").await?;
    let mut stderr = connect(socket, task_id, "stderr").await?;

    // The command may already have exited and closed stdio.
    if let Err(e) = stdio.send(Message::Text(END_OF_STREAM.into())).await {
        debug!(error = %e, "Could not close task stdin");
    }

    let (stdout, stderr_bytes) = tokio::join!(
        read_to_end(&mut stdio, "stdio"),
        read_to_end(&mut stderr, "stderr")
    );

    for ws in [&mut control, &mut stdio, &mut stderr] {
        if let Err(e) = ws.close(None).await {
            debug!(error = %e, "Task websocket already closed");
        }
    }

    Ok((
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr_bytes).into_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_stream_detection() {
        assert!(is_end_of_stream(END_OF_STREAM));
        assert!(is_end_of_stream(r#"{ "command": "end" }"#));
        assert!(!is_end_of_stream(r#"{"command":"signal"}"#));
        assert!(!is_end_of_stream("end"));
    }
}
