//! Transaction Module
//!
//! Per-connection MULTI/EXEC/DISCARD queuing. Each connection's session owns
//! one [`TransactionQueue`]; queues are never shared between connections.

pub mod queue;

pub use queue::{TransactionError, TransactionQueue, TransactionState};
