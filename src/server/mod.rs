//! Server supervisor wiring all components
//!
//! Owns the ring buffer, worker pool, persistence manager, and optional IRC
//! subsystem; binds the ingest and query listeners and multiplexes their accepts
//! until shutdown.

pub mod ingest;
pub mod query_port;

use crate::buffer::RingBuffer;
use crate::config::ServerConfig;
use crate::irc::IrcServer;
use crate::persist::PersistenceManager;
use crate::pool::WorkerPool;
use crate::query::QueryHandler;
use crate::{LogCasterError, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Main LogCaster server coordinating all components
pub struct LogCaster {
    config: ServerConfig,
    buffer: Arc<RingBuffer>,
    pool: Arc<WorkerPool>,
    persistence: Arc<PersistenceManager>,
    irc: Option<Arc<IrcServer>>,
    query_handler: Arc<QueryHandler>,
    shutdown_tx: broadcast::Sender<()>,
    client_count: Arc<AtomicUsize>,
}

impl LogCaster {
    /// Construct every component from `config`.
    ///
    /// Persistence failures here are fatal; a throwaway configuration should
    /// disable persistence instead.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let buffer = Arc::new(RingBuffer::new(config.server.buffer_capacity));
        let pool = Arc::new(WorkerPool::new(config.server.workers));
        let persistence = PersistenceManager::new(&config.persistence).await?;
        let (shutdown_tx, _) = broadcast::channel(4);

        let irc = if config.irc.enabled {
            Some(IrcServer::new(
                &config.server.bind_address,
                config.irc.port,
                &buffer,
                Arc::clone(&pool),
                shutdown_tx.clone(),
            ))
        } else {
            None
        };

        let query_handler = Arc::new(QueryHandler::new(Arc::clone(&buffer)));

        Ok(Self {
            config,
            buffer,
            pool,
            persistence,
            irc,
            query_handler,
            shutdown_tx,
            client_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Shared ring buffer, exposed for tests and embedding
    pub fn buffer(&self) -> Arc<RingBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Bind the listeners and serve until [`LogCaster::shutdown`] or a shutdown
    /// broadcast
    pub async fn start(&self) -> Result<()> {
        let ingest = self.bind(self.config.server.ingest_port)?;
        let query = self.bind(self.config.server.query_port)?;
        info!(
            "LogCaster listening: ingest on {}, query on {}",
            ingest.local_addr()?,
            query.local_addr()?,
        );

        if let Some(irc) = &self.irc {
            let irc = Arc::clone(irc);
            tokio::spawn(async move {
                if let Err(e) = irc.start().await {
                    error!("IRC server error: {}", e);
                }
            });
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                result = ingest.accept() => match result {
                    Ok((stream, peer)) => self.accept_ingest(stream, peer),
                    Err(e) => warn!("Ingest accept error: {}", e),
                },
                result = query.accept() => match result {
                    Ok((stream, peer)) => self.accept_query(stream, peer),
                    Err(e) => warn!("Query accept error: {}", e),
                },
                _ = shutdown_rx.recv() => break,
            }
        }

        info!("Listeners closed");
        Ok(())
    }

    fn bind(&self, port: u16) -> Result<TcpListener> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.bind_address, port)
            .parse()
            .map_err(|e| LogCasterError::Server(format!("Invalid bind address: {}", e)))?;
        let socket = TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        socket
            .listen(128)
            .map_err(|e| LogCasterError::Server(format!("Failed to listen on {}: {}", addr, e)))
    }

    fn accept_ingest(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        // Admission check: reject by immediate close when at capacity
        let count = self.client_count.fetch_add(1, Ordering::SeqCst);
        if count >= self.config.server.max_clients {
            self.client_count.fetch_sub(1, Ordering::SeqCst);
            warn!("Rejecting ingest connection from {}: at capacity", peer);
            return;
        }

        let buffer = Arc::clone(&self.buffer);
        let persistence = Arc::clone(&self.persistence);
        let client_count = Arc::clone(&self.client_count);
        let shutdown_rx = self.shutdown_tx.subscribe();

        let submitted = self.pool.submit(async move {
            ingest::handle_connection(stream, buffer, persistence, shutdown_rx).await;
            client_count.fetch_sub(1, Ordering::SeqCst);
        });
        if submitted.is_err() {
            self.client_count.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn accept_query(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let handler = Arc::clone(&self.query_handler);
        if self
            .pool
            .submit(async move {
                query_port::handle_connection(stream, handler).await;
            })
            .is_err()
        {
            warn!("Dropping query connection from {}: pool unavailable", peer);
        }
    }

    /// Graceful shutdown: stop accepting, drain the pool, flush persistence.
    /// Components stop in reverse construction order; every join completes before
    /// this returns.
    pub async fn shutdown(&self) {
        info!("Shutting down");
        let _ = self.shutdown_tx.send(());
        self.pool.shutdown().await;
        self.persistence.shutdown().await;
        info!("Shutdown complete");
    }
}
