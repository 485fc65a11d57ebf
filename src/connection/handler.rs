//! Connection Handler Module
//!
//! Each client gets its own Tokio task running a read-execute-respond loop:
//!
//! ```text
//! 1. Client connects, Session allocated
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │  Read bytes from socket      │
//!    │  Frame complete lines        │
//!    │  Execute (or queue) command  │
//!    │  Write reply line(s)         │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 3. Client disconnects / error: task ends, Session dropped
//! ```
//!
//! TCP is a stream, so a read may hold half a line or several lines. Bytes
//! accumulate in a `BytesMut` and whole lines are split off the front.
//!
//! A connection ending for any reason, I/O errors included, only ends its own
//! task. Store locks are scoped to single store calls and never held across
//! an `.await`, so nothing is left locked behind.

use crate::commands::CommandHandler;
use crate::connection::{Session, SessionId};
use crate::protocol::{Frame, LineParser, ParseError, Reply};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Server-wide connection counters, shared by every connection task.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    accepted: AtomicU64,
    active: AtomicU64,
    commands: AtomicU64,
}

/// Point-in-time copy of [`ConnectionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionTotals {
    pub accepted: u64,
    pub active: u64,
    pub commands: u64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn opened(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    fn closed(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    fn command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn totals(&self) -> ConnectionTotals {
        ConnectionTotals {
            accepted: self.accepted.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
        }
    }
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    buffer: BytesMut,

    command_handler: CommandHandler,

    parser: LineParser,

    /// Connection-local state, including the transaction queue
    session: Session,

    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            parser: LineParser::new(),
            session: Session::with_peer(SessionId::next(), addr),
            stats,
        }
    }

    /// Runs the connection until the client disconnects or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        let session = self.session.id();
        info!(client = %self.addr, session = %session, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, session = %session, "Client disconnected gracefully"),
            Err(ConnectionError::ClientDisconnected) => {
                info!(client = %self.addr, session = %session, "Client disconnected")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, session = %session, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, session = %session, error = %e, "Connection error"),
        }

        if self.session.transaction().is_queuing() {
            debug!(
                session = %session,
                dropped = self.session.transaction().len(),
                "Dropping unfinished transaction"
            );
        }

        self.stats.closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(frame) = self.try_parse_line()? {
                let reply = self.command_handler.execute(&mut self.session, frame);
                self.stats.command();
                self.send_reply(&reply).await?;
            }

            self.read_more_data().await?;
        }
    }

    /// Attempts to split one line off the front of the buffer.
    fn try_parse_line(&mut self) -> Result<Option<Frame>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.buffer) {
            Ok(Some((frame, consumed))) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Framed line"
                );
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Framing error");
                Err(ConnectionError::Parse(e))
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    ///
    /// The buffer only ever holds one partial line here, and the parser
    /// rejects that line once it outgrows the line length limit.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            return if self.buffer.is_empty() {
                Err(ConnectionError::ClientDisconnected)
            } else {
                // Partial line left in the buffer
                Err(ConnectionError::UnexpectedEof)
            };
        }

        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        let bytes = reply.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        trace!(client = %self.addr, bytes = bytes.len(), "Sent reply");
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Network read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing failed in a way the connection cannot recover from
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Client closed the socket between commands
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Client closed the socket mid-line
    #[error("Unexpected end of stream")]
    UnexpectedEof,
}

/// Runs a [`ConnectionHandler`] to completion, swallowing the ordinary ways
/// a connection ends.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
