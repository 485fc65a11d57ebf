//! Connection Handler Module
//!
//! Manages individual client connections. Every accepted socket runs in its
//! own Tokio task with its own [`Session`]; the store is the only thing
//! shared between them.
//!
//! ```text
//! ┌─────────────────────────────┐
//! │   TCP Listener (main.rs)    │
//! └──────────────┬──────────────┘
//!                │ accept() + spawn
//!                ▼
//! ┌─────────────────────────────┐      ┌───────────────────┐
//! │     ConnectionHandler       │─────>│  Session          │
//! │ read ─> frame ─> execute    │      │   SessionId       │
//! │            ─> write reply   │      │   TransactionQueue│
//! └─────────────────────────────┘      └───────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use tallykv::connection::{handle_connection, ConnectionStats};
//! use tallykv::commands::CommandHandler;
//! use tallykv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new());
//! let stats = Arc::new(ConnectionStats::new());
//!
//! let (stream, addr) = listener.accept().await?;
//! let handler = CommandHandler::new(Arc::clone(&storage));
//! tokio::spawn(handle_connection(stream, addr, handler, stats));
//! ```

pub mod handler;
pub mod session;

pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, ConnectionTotals,
};
pub use session::{Session, SessionId};
