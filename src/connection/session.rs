//! Per-Connection Session State
//!
//! Each accepted connection gets a [`Session`] with a process-unique
//! [`SessionId`]. The session owns the connection's transaction queue, so
//! queued commands live and die with the connection and can never leak into
//! another client, even one that reuses the same remote address.

use crate::transaction::TransactionQueue;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity handed out at accept time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocates the next unused id.
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State owned by one client connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    peer: Option<SocketAddr>,
    transaction: TransactionQueue,
}

impl Session {
    /// Creates a session with no known peer address (used by tests and
    /// embedded callers).
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            peer: None,
            transaction: TransactionQueue::new(),
        }
    }

    /// Creates a session for a TCP client.
    pub fn with_peer(id: SessionId, peer: SocketAddr) -> Self {
        Self {
            peer: Some(peer),
            ..Self::new(id)
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Remote address, for logging only.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn transaction(&self) -> &TransactionQueue {
        &self.transaction
    }

    pub fn transaction_mut(&mut self) -> &mut TransactionQueue {
        &mut self.transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_same_peer_different_sessions() {
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let mut first = Session::with_peer(SessionId::next(), peer);
        let second = Session::with_peer(SessionId::next(), peer);

        first.transaction_mut().begin().unwrap();

        assert_ne!(first.id(), second.id());
        assert!(first.transaction().is_queuing());
        assert!(!second.transaction().is_queuing());
        assert_eq!(second.peer(), Some(peer));
    }

    #[test]
    fn test_display() {
        let id = SessionId::next();
        assert_eq!(id.to_string(), format!("#{}", id.as_u64()));
    }
}
