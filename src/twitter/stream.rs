//! Reader side of the filtered live stream.
//!
//! The streaming endpoint sends one JSON message per line with blank
//! keep-alive lines in between. [`read_stream`] runs in its own task, turning
//! the byte stream into [`StreamMessage`]s on a channel; aborting that task
//! drops the sender and so closes the channel for the consumer.

use futures::StreamExt;
use log::{info, warn};
use tokio::sync::mpsc;

use super::api::sanitize_for_logging;
use super::model::StreamMessage;

/// Longest partial line kept while waiting for its newline.
pub(crate) const MAX_PENDING_BYTES: usize = 1024 * 1024;

/// Splits every complete line off the front of `buf`, leaving any trailing
/// partial line in place. Blank keep-alive lines are dropped.
pub(crate) fn drain_lines(buf: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
        let raw: Vec<u8> = buf.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

/// Appends `chunk` to `buf` and returns the lines it completed.
///
/// A partial line longer than [`MAX_PENDING_BYTES`] is discarded.
pub(crate) fn push_chunk(buf: &mut Vec<u8>, chunk: &[u8]) -> Vec<String> {
    buf.extend_from_slice(chunk);
    let lines = drain_lines(buf);
    if buf.len() > MAX_PENDING_BYTES {
        warn!(
            "Mentions: dropping {} bytes of stream data with no line break",
            buf.len()
        );
        buf.clear();
    }
    lines
}

/// Forwards messages from `response` to `tx` until either side goes away.
pub(crate) async fn read_stream(response: reqwest::Response, tx: mpsc::Sender<StreamMessage>) {
    let mut stream = response.bytes_stream();
    let mut buf: Vec<u8> = Vec::with_capacity(16 * 1024);

    while let Some(chunk_result) = stream.next().await {
        let chunk = match chunk_result {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Mentions: stream read failed: {}", e);
                return;
            }
        };

        for line in push_chunk(&mut buf, &chunk) {
            match StreamMessage::parse(&line) {
                Ok(message) => {
                    if tx.send(message).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(
                        "Mentions: could not parse stream message: {} ({})",
                        e,
                        sanitize_for_logging(&line, 200)
                    );
                }
            }
        }
    }
    info!("Mentions: stream closed by remote");
}
