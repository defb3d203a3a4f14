//! Asynchronous disk persistence with size-based rotation
//!
//! Producers enqueue raw messages and never touch the disk; one writer task drains
//! the queue in bulk, appends to `current.log`, and rotates the file to
//! `log-YYYYMMDD-HHMMSS.log` once it reaches the configured size. Graceful shutdown
//! flushes everything still queued.

use crate::config::PersistenceSettings;
use crate::{LogCasterError, Result};
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Name of the live persistence file
pub const CURRENT_FILE: &str = "current.log";

/// Background single-writer persistence manager
pub struct PersistenceManager {
    enabled: bool,
    tx: Option<mpsc::UnboundedSender<String>>,
    shutdown_tx: broadcast::Sender<()>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

struct WriterState {
    directory: PathBuf,
    max_file_size: u64,
    file: Option<BufWriter<File>>,
    current_size: u64,
    rotation_seq: u64,
}

impl PersistenceManager {
    /// Create the manager; when enabled this creates the directory, opens
    /// `current.log` in append mode and spawns the writer task
    pub async fn new(settings: &PersistenceSettings) -> Result<Arc<Self>> {
        let (shutdown_tx, _) = broadcast::channel(1);

        if !settings.enabled {
            return Ok(Arc::new(Self {
                enabled: false,
                tx: None,
                shutdown_tx,
                writer: Mutex::new(None),
            }));
        }

        tokio::fs::create_dir_all(&settings.log_directory)
            .await
            .map_err(|e| {
                LogCasterError::Persistence(format!(
                    "Failed to create {}: {}",
                    settings.log_directory.display(),
                    e
                ))
            })?;

        let path = settings.log_directory.join(CURRENT_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                LogCasterError::Persistence(format!("Failed to open {}: {}", path.display(), e))
            })?;
        let current_size = file.metadata().await.map(|m| m.len()).unwrap_or(0);

        let (tx, rx) = mpsc::unbounded_channel();
        let state = WriterState {
            directory: settings.log_directory.clone(),
            max_file_size: settings.max_file_size,
            file: Some(BufWriter::new(file)),
            current_size,
            rotation_seq: 0,
        };

        let flush_interval = settings.flush_interval();
        let shutdown_rx = shutdown_tx.subscribe();
        let writer = tokio::spawn(writer_loop(state, rx, shutdown_rx, flush_interval));

        info!(
            "Persistence enabled, directory: {}, max file size: {} bytes",
            settings.log_directory.display(),
            settings.max_file_size
        );

        Ok(Arc::new(Self {
            enabled: true,
            tx: Some(tx),
            shutdown_tx,
            writer: Mutex::new(Some(writer)),
        }))
    }

    /// Enqueue one message for the writer; a no-op when persistence is disabled.
    /// Never blocks on disk I/O.
    pub fn write(&self, message: &str) {
        if let Some(tx) = &self.tx {
            // Send fails only after the writer has exited; those messages are lost
            // by design during shutdown races
            let _ = tx.send(message.to_string());
        }
    }

    /// Whether this manager actually writes to disk
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stop the writer after it drains every queued message
    pub async fn shutdown(&self) {
        let handle = self.writer.lock().await.take();
        if let Some(handle) = handle {
            let _ = self.shutdown_tx.send(());
            let _ = handle.await;
        }
    }
}

async fn writer_loop(
    mut state: WriterState,
    mut rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: broadcast::Receiver<()>,
    flush_interval: std::time::Duration,
) {
    let mut batch: Vec<String> = Vec::new();
    loop {
        batch.clear();
        tokio::select! {
            maybe = rx.recv() => {
                match maybe {
                    Some(message) => {
                        batch.push(message);
                        while let Ok(more) = rx.try_recv() {
                            batch.push(more);
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::time::sleep(flush_interval) => {
                // Periodic wakeup: flush buffered bytes even when idle
                if let Some(file) = state.file.as_mut() {
                    let _ = file.flush().await;
                }
                continue;
            }
            _ = shutdown_rx.recv() => {
                while let Ok(more) = rx.try_recv() {
                    batch.push(more);
                }
                state.drain(&batch).await;
                break;
            }
        }

        state.drain(&batch).await;
        if state.current_size >= state.max_file_size {
            state.rotate().await;
        }
    }

    if let Some(file) = state.file.as_mut() {
        let _ = file.flush().await;
    }
}

impl WriterState {
    /// Append every message in `batch` followed by a newline, tracking file size.
    /// A missing file (failed reopen after rotation) is retried here; if the retry
    /// fails the batch is dropped with a logged error.
    async fn drain(&mut self, batch: &[String]) {
        if batch.is_empty() {
            return;
        }

        if self.file.is_none() {
            if let Err(e) = self.reopen().await {
                error!("Dropping {} messages, cannot reopen log file: {}", batch.len(), e);
                return;
            }
        }
        let Some(file) = self.file.as_mut() else {
            return;
        };
        for message in batch {
            if let Err(e) = file.write_all(message.as_bytes()).await {
                error!("Persistence write failed: {}", e);
                return;
            }
            if let Err(e) = file.write_all(b"\n").await {
                error!("Persistence write failed: {}", e);
                return;
            }
            self.current_size += message.len() as u64 + 1;
        }
        if let Err(e) = file.flush().await {
            warn!("Persistence flush failed: {}", e);
        }
    }

    /// Close `current.log`, rename it with a local-time stamp, reopen a fresh one.
    /// A stamped name that already exists gets a `-N` suffix so same-second
    /// rotations never overwrite each other.
    async fn rotate(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush().await;
        }

        let current = self.directory.join(CURRENT_FILE);
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let mut target = self.directory.join(format!("log-{}.log", stamp));
        while tokio::fs::try_exists(&target).await.unwrap_or(false) {
            self.rotation_seq += 1;
            target = self
                .directory
                .join(format!("log-{}-{}.log", stamp, self.rotation_seq));
        }

        if let Err(e) = tokio::fs::rename(&current, &target).await {
            error!("Failed to rotate log file: {}", e);
        } else {
            info!("Rotated log file to {}", target.display());
        }

        if let Err(e) = self.reopen().await {
            error!("Failed to reopen {} after rotation: {}", CURRENT_FILE, e);
        }
    }

    async fn reopen(&mut self) -> std::io::Result<()> {
        let path = self.directory.join(CURRENT_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        self.current_size = file.metadata().await.map(|m| m.len()).unwrap_or(0);
        self.file = Some(BufWriter::new(file));
        Ok(())
    }
}
