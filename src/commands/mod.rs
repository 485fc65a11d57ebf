//! Command Handler Module
//!
//! Receives tokenized command lines, routes them through the session's
//! transaction queue, executes them against the storage engine, and builds
//! the reply.
//!
//! ```text
//! Client line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  LineParser     │  (protocol module)
//! └────────┬────────┘
//!          │ Frame
//!          ▼
//! ┌─────────────────┐      ┌──────────────────┐
//! │ CommandHandler  │<────>│ Session          │
//! │  - MULTI/EXEC   │      │  TransactionQueue│
//! │  - dispatch     │      └──────────────────┘
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```

pub mod error;
pub mod handler;

pub use error::{CommandError, CommandResult};
pub use handler::CommandHandler;
