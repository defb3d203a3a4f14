//! Per-connection ingest reader

use crate::buffer::RingBuffer;
use crate::persist::PersistenceManager;
use crate::types::truncate_message;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::debug;

/// Read newline-delimited log lines from one producer until EOF, error, or
/// shutdown. Each line is truncated to the message limit, pushed into the ring
/// buffer with level `"info"` and source `"unknown"`, and mirrored to persistence
/// when enabled.
pub async fn handle_connection(
    stream: TcpStream,
    buffer: Arc<RingBuffer>,
    persistence: Arc<PersistenceManager>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let peer = stream.peer_addr().ok();
    let mut reader = BufReader::with_capacity(4096, stream);
    let mut line = String::new();

    loop {
        line.clear();
        let read = tokio::select! {
            read = reader.read_line(&mut line) => read,
            _ = shutdown_rx.recv() => break,
        };

        match read {
            Ok(0) => break,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                if line.is_empty() {
                    continue;
                }
                truncate_message(&mut line);

                buffer.push(line.clone(), "info", "unknown");
                if persistence.is_enabled() {
                    persistence.write(&line);
                }
            }
            Err(e) => {
                debug!("Ingest read error from {:?}: {}", peer, e);
                break;
            }
        }
    }

    debug!("Ingest connection closed: {:?}", peer);
}
