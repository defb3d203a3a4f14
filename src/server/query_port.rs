//! One-shot query connection handler

use crate::query::QueryHandler;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Serve a single command: read up to 4096 bytes, strip trailing CR/LF, dispatch,
/// write the response, close
pub async fn handle_connection(mut stream: TcpStream, handler: Arc<QueryHandler>) {
    let mut buf = vec![0u8; 4096];
    let read = match stream.read(&mut buf).await {
        Ok(0) => return,
        Ok(n) => n,
        Err(e) => {
            debug!("Query read error: {}", e);
            return;
        }
    };

    let command = String::from_utf8_lossy(&buf[..read]);
    let command = command.trim_end_matches(['\r', '\n']);
    let response = handler.process(command);

    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!("Query write error: {}", e);
    }
    let _ = stream.shutdown().await;
}
