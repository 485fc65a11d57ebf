//! Command Errors
//!
//! Every error is local to the command that caused it: the connection stays
//! open and the store is left as it was.

use crate::protocol::Reply;
use crate::storage::StoreError;
use crate::transaction::TransactionError;
use thiserror::Error;

/// Errors a single command can fail with.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    /// Wrong arity, bad option, unparsable number, or unknown command
    #[error("Invalid command")]
    MalformedCommand,

    /// The store refused the operation (e.g. increment on a string)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// EXEC without MULTI, or nested MULTI
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// Result type for command handlers.
pub type CommandResult = Result<Reply, CommandError>;

impl From<CommandError> for Reply {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::MalformedCommand => Reply::Invalid,
            other => Reply::error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_text() {
        assert_eq!(
            Reply::from(CommandError::MalformedCommand).to_string(),
            "Invalid command"
        );
        assert_eq!(
            Reply::from(CommandError::from(StoreError::NotANumber)).to_string(),
            "Error: ERR value is not a number"
        );
        assert_eq!(
            Reply::from(CommandError::from(TransactionError::NotOpen)).to_string(),
            "Error: MULTI not set"
        );
    }
}
