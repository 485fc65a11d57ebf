//! # TallyKV - An In-Memory Key-Value Store
//!
//! TallyKV keeps typed scalar values (strings, integers, floats) in memory
//! and serves them over TCP using a plain-text line protocol with a small
//! Redis-like command set.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             TallyKV                              │
//! │                                                                  │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐           │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │           │
//! │  │ (Listener)  │    │  + Session  │    │  Handler    │           │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘           │
//! │                            │                  │                  │
//! │                     ┌──────▼──────┐           ▼                  │
//! │                     │ Transaction │    ┌──────────────────────┐  │
//! │                     │   Queue     │    │    StorageEngine     │  │
//! │                     └─────────────┘    │  RwLock<HashMap<..>> │  │
//! │                                        └──────────▲───────────┘  │
//! │                                                   │              │
//! │                                        ┌──────────┴───────────┐  │
//! │                                        │    ExpirySweeper     │  │
//! │                                        └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use tallykv::storage::{StorageEngine, start_expiry_sweeper};
//! use tallykv::commands::CommandHandler;
//! use tallykv::connection::{handle_connection, ConnectionStats};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Arc::new(StorageEngine::new());
//!     let _sweeper = start_expiry_sweeper(Arc::clone(&storage));
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let handler = CommandHandler::new(Arc::clone(&storage));
//!         tokio::spawn(handle_connection(stream, addr, handler, Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `MULTI`, `EXEC`, `DISCARD`
//! - `SET key value [EX minutes]`, `GET key`, `EXISTS key`, `DEL key`
//! - `INCR key`, `INCRBY key amount`, `DECR key`, `DECRBY key amount`
//! - `EXPIRE key seconds`, `TTL key`
//! - `PING`, `DBSIZE`, `FLUSHALL`
//!
//! ## Module Overview
//!
//! - [`storage`]: values, entries, the store and the expiry sweeper
//! - [`transaction`]: the per-connection MULTI/EXEC/DISCARD queue
//! - [`protocol`]: line framing and reply serialization
//! - [`commands`]: command dispatch
//! - [`connection`]: client connection loop and session state
//! - [`config`]: command-line configuration
//!
//! ## Known Limitation
//!
//! EXEC replays queued commands one at a time. Other connections may run
//! commands in between, and a failing command does not undo earlier ones.
//! Only a single command (such as INCR's read-modify-write) is atomic.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;
pub mod transaction;

pub use commands::CommandHandler;
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats, Session, SessionId};
pub use protocol::{Command, LineParser, ParseError, Reply};
pub use storage::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, StorageEngine, Value};
pub use transaction::TransactionQueue;

/// The default port TallyKV listens on
pub const DEFAULT_PORT: u16 = 8080;

/// The default host TallyKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of TallyKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
