//! Command Handler Module
//!
//! Turns tokenized command lines into store calls and replies.
//!
//! ## Supported Commands
//!
//! ### Transaction Commands
//! - `MULTI` - Start queuing commands
//! - `EXEC` - Run the queued commands, in order
//! - `DISCARD` - Drop the queued commands
//!
//! ### Value Commands
//! - `SET key value [EX minutes]` - Set a key
//! - `GET key` - Get a key's value
//! - `EXISTS key` - Check if a key exists
//! - `DEL key` - Delete a key
//! - `INCR key` / `INCRBY key amount` - Add to a numeric value
//! - `DECR key` / `DECRBY key amount` - Subtract from a numeric value
//!
//! ### Key Commands
//! - `EXPIRE key seconds` - Set expiry
//! - `TTL key` - Remaining seconds (`-1` no expiry, `-2` absent)
//!
//! ### Server Commands
//! - `PING` - Test connection
//! - `DBSIZE` - Number of stored keys
//! - `FLUSHALL` - Clear the store
//!
//! ## Transactions
//!
//! While a session is queuing, every command other than MULTI/EXEC/DISCARD
//! is buffered as raw text and answered with `QUEUED`. EXEC replies `OK`
//! and then replays each buffered line through [`CommandHandler::execute_command`]
//! exactly as if it had just arrived. Other connections keep running in
//! between; there is no isolation and no rollback.

use crate::commands::error::{CommandError, CommandResult};
use crate::connection::Session;
use crate::protocol::{Command, Frame, Reply};
use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

const SECONDS_PER_MINUTE: u64 = 60;

/// Dispatches commands against the shared store.
#[derive(Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// The store this handler operates on.
    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Handles one framed line for `session`, routing it through the
    /// session's transaction queue.
    pub fn execute(&self, session: &mut Session, frame: Frame) -> Reply {
        let command = match frame {
            Ok(command) => command,
            Err(e) => {
                debug!(session = %session.id(), error = %e, "Rejected line");
                return Reply::Invalid;
            }
        };

        trace!(
            session = %session.id(),
            command = %command.name,
            args = command.args.len(),
            "Executing command"
        );

        let result = match command.name.as_str() {
            "MULTI" => self.cmd_multi(session),
            "EXEC" => self.cmd_exec(session),
            "DISCARD" => self.cmd_discard(session),
            _ if session.transaction().is_queuing() => {
                session.transaction_mut().enqueue(command.raw);
                Ok(Reply::Queued)
            }
            _ => return self.execute_command(&command),
        };

        result.unwrap_or_else(Reply::from)
    }

    /// Executes a command immediately, outside any transaction.
    pub fn execute_command(&self, command: &Command) -> Reply {
        self.dispatch(&command.name, &command.args)
            .unwrap_or_else(Reply::from)
    }

    fn dispatch(&self, cmd: &str, args: &[String]) -> CommandResult {
        match cmd {
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            "EXISTS" => self.cmd_exists(args),
            "DEL" => self.cmd_del(args),
            "INCR" => self.cmd_incr(args, 1.0),
            "DECR" => self.cmd_incr(args, -1.0),
            "INCRBY" => self.cmd_incrby(args, false),
            "DECRBY" => self.cmd_incrby(args, true),
            "EXPIRE" => self.cmd_expire(args),
            "TTL" => self.cmd_ttl(args),
            "PING" => Ok(Reply::Pong),
            "DBSIZE" => self.cmd_dbsize(args),
            "FLUSHALL" => self.cmd_flushall(args),
            _ => Err(CommandError::MalformedCommand),
        }
    }

    // ========================================================================
    // Transaction Commands
    // ========================================================================

    /// MULTI
    fn cmd_multi(&self, session: &mut Session) -> CommandResult {
        session.transaction_mut().begin()?;
        debug!(session = %session.id(), "Transaction opened");
        Ok(Reply::Ok)
    }

    /// EXEC
    fn cmd_exec(&self, session: &mut Session) -> CommandResult {
        let queued = session.transaction_mut().drain()?;
        debug!(session = %session.id(), commands = queued.len(), "Executing transaction");

        let mut replies = Vec::with_capacity(queued.len() + 1);
        replies.push(Reply::Ok);
        for line in &queued {
            let reply = match Command::parse(line) {
                Ok(command) => self.execute_command(&command),
                Err(_) => Reply::Invalid,
            };
            replies.push(reply);
        }

        Ok(Reply::Batch(replies))
    }

    /// DISCARD
    fn cmd_discard(&self, session: &mut Session) -> CommandResult {
        let dropped = session.transaction().len();
        session.transaction_mut().discard();
        debug!(session = %session.id(), dropped = dropped, "Transaction discarded");
        Ok(Reply::Ok)
    }

    // ========================================================================
    // Value Commands
    // ========================================================================

    /// SET key value [EX minutes]
    fn cmd_set(&self, args: &[String]) -> CommandResult {
        let ttl = match args {
            [_, _] => None,
            [_, _, opt, minutes] if opt.eq_ignore_ascii_case("EX") => {
                Some(parse_minutes(minutes)?)
            }
            _ => return Err(CommandError::MalformedCommand),
        };

        self.storage.set(args[0].as_str(), &args[1], ttl);
        Ok(Reply::Ok)
    }

    /// GET key
    fn cmd_get(&self, args: &[String]) -> CommandResult {
        let key = single_key(args)?;
        Ok(Reply::from_option(self.storage.get(key)))
    }

    /// EXISTS key
    fn cmd_exists(&self, args: &[String]) -> CommandResult {
        let key = single_key(args)?;
        Ok(Reply::Flag(self.storage.exists(key)))
    }

    /// DEL key
    fn cmd_del(&self, args: &[String]) -> CommandResult {
        let key = single_key(args)?;
        Ok(Reply::Flag(self.storage.delete(key)))
    }

    /// INCR key / DECR key
    fn cmd_incr(&self, args: &[String], delta: f64) -> CommandResult {
        let key = single_key(args)?;
        self.storage.increment(key, delta)?;
        Ok(Reply::Ok)
    }

    /// INCRBY key amount / DECRBY key amount
    fn cmd_incrby(&self, args: &[String], negate: bool) -> CommandResult {
        let [key, amount] = args else {
            return Err(CommandError::MalformedCommand);
        };

        let amount = parse_amount(amount)?;
        let delta = if negate { -amount } else { amount };

        self.storage.increment(key, delta)?;
        Ok(Reply::Ok)
    }

    // ========================================================================
    // Key Commands
    // ========================================================================

    /// EXPIRE key seconds
    fn cmd_expire(&self, args: &[String]) -> CommandResult {
        let [key, seconds] = args else {
            return Err(CommandError::MalformedCommand);
        };

        let seconds: u64 = seconds
            .parse()
            .map_err(|_| CommandError::MalformedCommand)?;

        Ok(Reply::Flag(
            self.storage.set_ttl(key, Duration::from_secs(seconds)),
        ))
    }

    /// TTL key
    fn cmd_ttl(&self, args: &[String]) -> CommandResult {
        let key = single_key(args)?;
        Ok(Reply::Integer(self.storage.ttl(key).unwrap_or(-2)))
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// DBSIZE
    fn cmd_dbsize(&self, args: &[String]) -> CommandResult {
        no_args(args)?;
        Ok(Reply::Integer(self.storage.len() as i64))
    }

    /// FLUSHALL
    fn cmd_flushall(&self, args: &[String]) -> CommandResult {
        no_args(args)?;
        self.storage.flush();
        debug!("Store flushed");
        Ok(Reply::Ok)
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

fn single_key(args: &[String]) -> Result<&str, CommandError> {
    match args {
        [key] => Ok(key.as_str()),
        _ => Err(CommandError::MalformedCommand),
    }
}

fn no_args(args: &[String]) -> Result<(), CommandError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandError::MalformedCommand)
    }
}

/// Parses the `EX` operand: a positive whole number of minutes.
fn parse_minutes(raw: &str) -> Result<Duration, CommandError> {
    raw.parse::<u64>()
        .ok()
        .filter(|&m| m > 0)
        .and_then(|m| m.checked_mul(SECONDS_PER_MINUTE))
        .map(Duration::from_secs)
        .ok_or(CommandError::MalformedCommand)
}

/// Parses an increment amount: any finite float.
fn parse_amount(raw: &str) -> Result<f64, CommandError> {
    raw.parse::<f64>()
        .ok()
        .filter(|a| a.is_finite())
        .ok_or(CommandError::MalformedCommand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SessionId;
    use crate::storage::Value;

    fn create_handler() -> (CommandHandler, Session) {
        let storage = Arc::new(StorageEngine::new());
        (CommandHandler::new(storage), Session::new(SessionId::next()))
    }

    fn run(handler: &CommandHandler, session: &mut Session, line: &str) -> Reply {
        handler.execute(session, Command::parse(line))
    }

    #[test]
    fn test_ping() {
        let (handler, mut session) = create_handler();
        assert_eq!(run(&handler, &mut session, "PING"), Reply::Pong);
        assert_eq!(run(&handler, &mut session, "ping"), Reply::Pong);
    }

    #[test]
    fn test_set_get() {
        let (handler, mut session) = create_handler();

        assert_eq!(run(&handler, &mut session, "SET key value"), Reply::Ok);
        assert_eq!(
            run(&handler, &mut session, "GET key"),
            Reply::Value(Value::String("value".into()))
        );

        assert_eq!(run(&handler, &mut session, "SET n 12"), Reply::Ok);
        assert_eq!(run(&handler, &mut session, "GET n").to_string(), "12");
    }

    #[test]
    fn test_get_nonexistent() {
        let (handler, mut session) = create_handler();
        assert_eq!(run(&handler, &mut session, "GET nonexistent"), Reply::Nil);
    }

    #[test]
    fn test_set_with_ex_minutes() {
        let (handler, mut session) = create_handler();

        assert_eq!(run(&handler, &mut session, "SET key v EX 2"), Reply::Ok);
        let ttl = handler.storage().ttl("key").unwrap();
        assert!(ttl > 60 && ttl <= 120);

        assert_eq!(run(&handler, &mut session, "set key2 v ex 1"), Reply::Ok);
        assert!(handler.storage().ttl("key2").unwrap() > 0);
    }

    #[test]
    fn test_set_malformed_ttl_stores_nothing() {
        let (handler, mut session) = create_handler();

        for line in [
            "SET key v EX",
            "SET key v EX soon",
            "SET key v EX 0",
            "SET key v EX -3",
            "SET key v PX 10",
            "SET key",
            "SET",
        ] {
            assert_eq!(run(&handler, &mut session, line), Reply::Invalid, "{}", line);
        }
        assert!(!handler.storage().exists("key"));
    }

    #[test]
    fn test_default_ttl_applies_to_plain_set() {
        let storage = Arc::new(StorageEngine::with_default_ttl(Some(Duration::from_secs(600))));
        let handler = CommandHandler::new(storage);
        let mut session = Session::new(SessionId::next());

        run(&handler, &mut session, "SET key v");
        let ttl = handler.storage().ttl("key").unwrap();
        assert!(ttl > 590 && ttl <= 600);
    }

    #[test]
    fn test_exists_del() {
        let (handler, mut session) = create_handler();

        run(&handler, &mut session, "SET key1 value1");

        assert_eq!(run(&handler, &mut session, "EXISTS key1"), Reply::Flag(true));
        assert_eq!(run(&handler, &mut session, "DEL key1"), Reply::Flag(true));
        assert_eq!(run(&handler, &mut session, "DEL key1"), Reply::Flag(false));
        assert_eq!(run(&handler, &mut session, "EXISTS key1"), Reply::Flag(false));
    }

    #[test]
    fn test_incr_decr() {
        let (handler, mut session) = create_handler();

        assert_eq!(run(&handler, &mut session, "INCR counter"), Reply::Ok);
        assert_eq!(run(&handler, &mut session, "INCRBY counter 10"), Reply::Ok);
        assert_eq!(run(&handler, &mut session, "DECR counter"), Reply::Ok);
        assert_eq!(run(&handler, &mut session, "DECRBY counter 0.5"), Reply::Ok);

        assert_eq!(run(&handler, &mut session, "GET counter").to_string(), "9.5");
    }

    #[test]
    fn test_incr_on_string() {
        let (handler, mut session) = create_handler();

        run(&handler, &mut session, "SET name tally");
        assert_eq!(
            run(&handler, &mut session, "INCR name").to_string(),
            "Error: ERR value is not a number"
        );
        assert_eq!(run(&handler, &mut session, "GET name").to_string(), "tally");
    }

    #[test]
    fn test_incrby_bad_amount() {
        let (handler, mut session) = create_handler();

        assert_eq!(run(&handler, &mut session, "INCRBY c lots"), Reply::Invalid);
        assert_eq!(run(&handler, &mut session, "INCRBY c inf"), Reply::Invalid);
        assert_eq!(run(&handler, &mut session, "INCRBY c"), Reply::Invalid);
        assert!(!handler.storage().exists("c"));
    }

    #[test]
    fn test_expire_and_ttl() {
        let (handler, mut session) = create_handler();

        assert_eq!(run(&handler, &mut session, "TTL key"), Reply::Integer(-2));
        assert_eq!(run(&handler, &mut session, "EXPIRE key 10"), Reply::Flag(false));

        run(&handler, &mut session, "SET key v");
        assert_eq!(run(&handler, &mut session, "TTL key"), Reply::Integer(-1));
        assert_eq!(run(&handler, &mut session, "EXPIRE key 10"), Reply::Flag(true));

        match run(&handler, &mut session, "TTL key") {
            Reply::Integer(n) => assert!(n > 0 && n <= 10),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_huge_ttls_do_not_expire() {
        let (handler, mut session) = create_handler();

        assert_eq!(
            run(&handler, &mut session, "SET k v EX 300000000000000000"),
            Reply::Ok
        );
        assert_eq!(run(&handler, &mut session, "GET k").to_string(), "v");
        assert_eq!(run(&handler, &mut session, "TTL k"), Reply::Integer(-1));

        assert_eq!(
            run(&handler, &mut session, "EXPIRE k 18446744073709551615"),
            Reply::Flag(true)
        );
        assert_eq!(run(&handler, &mut session, "EXISTS k"), Reply::Flag(true));
        assert_eq!(run(&handler, &mut session, "TTL k"), Reply::Integer(-1));
    }

    #[test]
    fn test_dbsize_flushall() {
        let (handler, mut session) = create_handler();

        run(&handler, &mut session, "SET a 1");
        run(&handler, &mut session, "SET b 2");
        assert_eq!(run(&handler, &mut session, "DBSIZE"), Reply::Integer(2));

        assert_eq!(run(&handler, &mut session, "FLUSHALL"), Reply::Ok);
        assert_eq!(run(&handler, &mut session, "DBSIZE"), Reply::Integer(0));
    }

    #[test]
    fn test_unknown_and_empty() {
        let (handler, mut session) = create_handler();

        assert_eq!(run(&handler, &mut session, "UNKNOWN"), Reply::Invalid);
        assert_eq!(run(&handler, &mut session, ""), Reply::Invalid);
        assert_eq!(run(&handler, &mut session, "GET"), Reply::Invalid);
        assert_eq!(run(&handler, &mut session, "GET a b"), Reply::Invalid);
    }

    #[test]
    fn test_transaction() {
        let (handler, mut session) = create_handler();

        assert_eq!(run(&handler, &mut session, "MULTI"), Reply::Ok);
        assert_eq!(run(&handler, &mut session, "SET a 5"), Reply::Queued);
        assert_eq!(run(&handler, &mut session, "INCR a"), Reply::Queued);

        // Nothing ran yet
        assert!(!handler.storage().exists("a"));

        assert_eq!(
            run(&handler, &mut session, "EXEC"),
            Reply::Batch(vec![Reply::Ok, Reply::Ok, Reply::Ok])
        );
        assert_eq!(run(&handler, &mut session, "GET a").to_string(), "6");
    }

    #[test]
    fn test_exec_without_multi() {
        let (handler, mut session) = create_handler();

        assert_eq!(
            run(&handler, &mut session, "EXEC").to_string(),
            "Error: MULTI not set"
        );
        assert!(handler.storage().is_empty());
    }

    #[test]
    fn test_nested_multi() {
        let (handler, mut session) = create_handler();

        run(&handler, &mut session, "MULTI");
        run(&handler, &mut session, "SET a 1");
        assert_eq!(
            run(&handler, &mut session, "MULTI").to_string(),
            "Error: MULTI calls can not be nested"
        );
        assert_eq!(session.transaction().len(), 1);
    }

    #[test]
    fn test_discard() {
        let (handler, mut session) = create_handler();

        run(&handler, &mut session, "MULTI");
        run(&handler, &mut session, "SET stale 1");
        assert_eq!(run(&handler, &mut session, "DISCARD"), Reply::Ok);

        // Back to immediate execution
        assert_eq!(run(&handler, &mut session, "GET stale"), Reply::Nil);

        run(&handler, &mut session, "MULTI");
        run(&handler, &mut session, "SET fresh 1");
        assert_eq!(
            run(&handler, &mut session, "EXEC"),
            Reply::Batch(vec![Reply::Ok, Reply::Ok])
        );
        assert!(handler.storage().exists("fresh"));
        assert!(!handler.storage().exists("stale"));
    }

    #[test]
    fn test_exec_runs_past_failures() {
        let (handler, mut session) = create_handler();

        run(&handler, &mut session, "SET name tally");
        run(&handler, &mut session, "MULTI");
        run(&handler, &mut session, "SET a 1");
        run(&handler, &mut session, "INCR name");
        run(&handler, &mut session, "BOGUS");
        run(&handler, &mut session, "INCR a");

        let reply = run(&handler, &mut session, "EXEC");
        assert_eq!(
            reply.to_string(),
            "OK\nOK\nError: ERR value is not a number\nInvalid command\nOK"
        );
        assert_eq!(run(&handler, &mut session, "GET a").to_string(), "2");
    }

    #[test]
    fn test_sessions_do_not_share_queues() {
        let storage = Arc::new(StorageEngine::new());
        let handler = CommandHandler::new(storage);
        let mut alice = Session::new(SessionId::next());
        let mut bob = Session::new(SessionId::next());

        run(&handler, &mut alice, "MULTI");
        assert_eq!(run(&handler, &mut alice, "SET k 1"), Reply::Queued);

        // Bob is not in a transaction
        assert_eq!(run(&handler, &mut bob, "SET k 2"), Reply::Ok);
        assert_eq!(
            run(&handler, &mut bob, "EXEC").to_string(),
            "Error: MULTI not set"
        );

        run(&handler, &mut alice, "EXEC");
        assert_eq!(run(&handler, &mut bob, "GET k").to_string(), "1");
    }
}
