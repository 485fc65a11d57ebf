//! MULTI / EXEC / DISCARD State Machine
//!
//! ```text
//!              MULTI                 any other command
//!   ┌──────┐ ────────> ┌──────────┐ ──────┐
//!   │ Idle │           │ Queuing  │       │ push raw line, reply QUEUED
//!   └──────┘ <──────── └──────────┘ <─────┘
//!       ▲     EXEC (drain) / DISCARD (clear)
//!       │
//!       └── EXEC while Idle: error, nothing runs
//! ```
//!
//! The queue only buffers raw command lines. Running the drained lines is the
//! dispatcher's job, and it does so one by one with no isolation from other
//! connections and no rollback: a failing command does not undo the ones
//! before it.

use std::collections::VecDeque;
use thiserror::Error;

/// Errors raised by illegal transitions.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransactionError {
    /// EXEC received while idle
    #[error("MULTI not set")]
    NotOpen,

    /// MULTI received while already queuing
    #[error("MULTI calls can not be nested")]
    Nested,
}

/// Where the machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    Idle,
    Queuing,
}

/// Per-connection buffer of commands queued between MULTI and EXEC.
#[derive(Debug, Default)]
pub struct TransactionQueue {
    state: TransactionState,
    queued: VecDeque<String>,
}

impl TransactionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// True between MULTI and EXEC/DISCARD.
    #[inline]
    pub fn is_queuing(&self) -> bool {
        self.state == TransactionState::Queuing
    }

    /// Number of buffered commands.
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// MULTI: enter the queuing state with an empty buffer.
    pub fn begin(&mut self) -> Result<(), TransactionError> {
        if self.is_queuing() {
            return Err(TransactionError::Nested);
        }
        self.queued.clear();
        self.state = TransactionState::Queuing;
        Ok(())
    }

    /// Buffers a raw command line.
    ///
    /// Returns `false` (and buffers nothing) when no transaction is open.
    pub fn enqueue(&mut self, line: impl Into<String>) -> bool {
        if !self.is_queuing() {
            return false;
        }
        self.queued.push_back(line.into());
        true
    }

    /// EXEC: returns the buffered lines in the order they arrived and goes
    /// back to idle.
    pub fn drain(&mut self) -> Result<Vec<String>, TransactionError> {
        if !self.is_queuing() {
            return Err(TransactionError::NotOpen);
        }
        self.state = TransactionState::Idle;
        Ok(self.queued.drain(..).collect())
    }

    /// DISCARD: drops anything buffered and goes back to idle. Legal in
    /// either state.
    pub fn discard(&mut self) {
        self.queued.clear();
        self.state = TransactionState::Idle;
    }
}
