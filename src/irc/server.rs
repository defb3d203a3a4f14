//! IRC listener, session lifecycle, and buffer subscription

use crate::buffer::{RingBuffer, CHANNEL_ALL};
use crate::irc::channels::ChannelManager;
use crate::irc::commands::CommandHandler;
use crate::irc::message::IrcCommand;
use crate::irc::registry::SessionRegistry;
use crate::irc::session::Session;
use crate::irc::MAX_SESSIONS;
use crate::pool::WorkerPool;
use crate::{LogCasterError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

/// IRC subsystem: accept task, per-session readers, log fan-out
pub struct IrcServer {
    bind_address: String,
    port: u16,
    registry: Arc<SessionRegistry>,
    handler: Arc<CommandHandler>,
    pool: Arc<WorkerPool>,
    shutdown_tx: broadcast::Sender<()>,
    next_session_id: AtomicU64,
}

impl IrcServer {
    /// Create the subsystem and register its fan-out callbacks with `buffer`
    pub fn new(
        bind_address: &str,
        port: u16,
        buffer: &RingBuffer,
        pool: Arc<WorkerPool>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Arc<Self> {
        let registry = Arc::new(SessionRegistry::new());
        let channels = Arc::new(ChannelManager::new());
        channels.initialize_log_channels();

        let handler = Arc::new(CommandHandler::new(
            Arc::clone(&registry),
            Arc::clone(&channels),
        ));

        // The buffer invokes this synchronously on the pushing task; distribution
        // only enqueues onto per-session outbound queues. One subscription under
        // #logs-all is enough: distribute() walks every streaming channel and
        // applies each channel's own filter, #logs-error included.
        let distributor = Arc::clone(&channels);
        buffer.register_callback(
            CHANNEL_ALL,
            Arc::new(move |entry| distributor.distribute(entry)),
        );

        Arc::new(Self {
            bind_address: bind_address.to_string(),
            port,
            registry,
            handler,
            pool,
            shutdown_tx,
            next_session_id: AtomicU64::new(1),
        })
    }

    /// Bind the listener and run the accept loop until shutdown
    pub async fn start(self: Arc<Self>) -> Result<()> {
        let addr = format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| LogCasterError::Irc(format!("Invalid IRC bind address: {}", e)))?;
        let socket = TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket
            .listen(128)
            .map_err(|e| LogCasterError::Irc(format!("Failed to listen on {}: {}", addr, e)))?;

        info!("IRC server listening on {}", addr);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.accept_session(stream, peer).await,
                        Err(e) => error!("IRC accept error: {}", e),
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }

        self.evict_all();
        info!("IRC server stopped");
        Ok(())
    }

    async fn accept_session(&self, mut stream: TcpStream, peer: std::net::SocketAddr) {
        if self.registry.count() >= MAX_SESSIONS {
            let _ = stream.write_all(b"ERROR :Server is full\r\n").await;
            return;
        }

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let session = Arc::new(Session::new(id, peer, outbound_tx));
        self.registry.add(Arc::clone(&session));
        info!("New IRC client connected from {}", peer);

        tokio::spawn(write_session(outbound_rx, write_half));

        let registry = Arc::clone(&self.registry);
        let handler = Arc::clone(&self.handler);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let submitted = self.pool.submit(read_session(
            session,
            read_half,
            registry,
            handler,
            shutdown_rx,
        ));
        if submitted.is_err() {
            // Pool already shut down; drop the registry entry created above
            self.registry.remove(id);
        }
    }

    /// Evict every session with a synthetic QUIT; dropping the outbound sender
    /// ends each writer task, which closes the socket
    fn evict_all(&self) {
        for session in self.registry.all() {
            let quit = IrcCommand {
                command: "QUIT".to_string(),
                trailing: "Server shutting down".to_string(),
                ..Default::default()
            };
            self.handler.handle_quit(&session, &quit);
            self.registry.remove(session.id());
        }
    }
}

/// Drain one session's outbound queue into its socket; exits when the sender side
/// is dropped or the peer goes away
async fn write_session(mut rx: mpsc::UnboundedReceiver<String>, mut half: OwnedWriteHalf) {
    while let Some(line) = rx.recv().await {
        if half.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
    let _ = half.shutdown().await;
}

/// Read lines from one session until EOF, error, QUIT, or shutdown; then tear the
/// session down with a synthetic QUIT
async fn read_session(
    session: Arc<Session>,
    read_half: OwnedReadHalf,
    registry: Arc<SessionRegistry>,
    handler: Arc<CommandHandler>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut reader = BufReader::with_capacity(4096, read_half);
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
                // read_line strips nothing; the parser tolerates CR-LF and bare LF
                let cmd = IrcCommand::parse(&line);
                if cmd.command.is_empty() {
                    continue;
                }
                let is_quit = cmd.command == "QUIT";
                handler.handle(&session, &cmd);
                session.touch();
                if is_quit {
                    break;
                }
            }
            Err(e) => {
                debug!("IRC read error from {}: {}", session.addr(), e);
                break;
            }
        }
    }

    let nickname = session.nickname();
    debug!(
        "IRC client disconnected: {} ({})",
        if nickname.is_empty() { "*" } else { &nickname },
        session.addr()
    );

    // Channels may still hold this session if the peer vanished without QUIT
    if !session.channels().is_empty() {
        let quit = IrcCommand {
            command: "QUIT".to_string(),
            trailing: "Connection closed".to_string(),
            ..Default::default()
        };
        handler.handle_quit(&session, &quit);
    }
    registry.remove(session.id());
}
