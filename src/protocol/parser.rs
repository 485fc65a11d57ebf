//! Line Protocol Parser
//!
//! Clients send one command per line:
//!
//! ```text
//! SET counter 5\n
//! incr counter\r\n
//! ```
//!
//! The parser works on the connection's read buffer and returns either:
//! - `Ok(Some((frame, consumed)))` - a full line was found; `consumed` bytes
//!   (including the newline) can be dropped from the buffer
//! - `Ok(None)` - no newline yet, read more data
//! - `Err(ParseError::LineTooLong)` - the client is sending garbage, drop it
//!
//! A complete line that cannot be turned into a command (blank, or not
//! UTF-8) is still consumed; the frame carries the error so the caller can
//! reply `Invalid command` and keep the connection open.

use memchr::memchr;
use thiserror::Error;

/// Errors that can occur while framing or tokenizing a line.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// The line holds no fields
    #[error("empty command")]
    EmptyCommand,

    /// The line is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// No newline within the allowed line length
    #[error("line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// One framed line: a command, or why the line could not become one.
pub type Frame = ParseResult<Command>;

/// Maximum length of a single command line (64 KB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// A tokenized command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Upper-cased first field
    pub name: String,
    /// Remaining fields, case preserved
    pub args: Vec<String>,
    /// The trimmed line as received, kept for transaction queuing
    pub raw: String,
}

impl Command {
    /// Tokenizes a single line (without its newline).
    ///
    /// Fields are separated by runs of ASCII whitespace.
    ///
    /// ```
    /// use tallykv::protocol::Command;
    ///
    /// let cmd = Command::parse("set  Key 5").unwrap();
    /// assert_eq!(cmd.name, "SET");
    /// assert_eq!(cmd.args, vec!["Key", "5"]);
    /// assert_eq!(cmd.raw, "set  Key 5");
    /// ```
    pub fn parse(line: &str) -> ParseResult<Self> {
        let raw = line.trim();
        let mut fields = raw.split_ascii_whitespace();

        let name = fields
            .next()
            .ok_or(ParseError::EmptyCommand)?
            .to_ascii_uppercase();
        let args = fields.map(str::to_string).collect();

        Ok(Self {
            name,
            args,
            raw: raw.to_string(),
        })
    }
}

/// Splits a byte stream into command lines.
#[derive(Debug)]
pub struct LineParser {
    max_line_length: usize,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    pub fn new() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self { max_line_length }
    }

    /// Attempts to frame one line from the front of `buf`.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
        let newline = match memchr(b'\n', buf) {
            Some(pos) => pos,
            None if buf.len() > self.max_line_length => {
                return Err(ParseError::LineTooLong {
                    size: buf.len(),
                    max: self.max_line_length,
                });
            }
            None => return Ok(None),
        };

        if newline > self.max_line_length {
            return Err(ParseError::LineTooLong {
                size: newline,
                max: self.max_line_length,
            });
        }

        let consumed = newline + 1;
        let line = &buf[..newline];
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        let frame = match std::str::from_utf8(line) {
            Ok(text) => Command::parse(text),
            Err(e) => Err(ParseError::InvalidUtf8(e.to_string())),
        };

        Ok(Some((frame, consumed)))
    }
}

/// Convenience function to frame a single line.
pub fn parse_line(buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
    LineParser::new().parse(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(buf: &[u8]) -> (Command, usize) {
        let (frame, consumed) = parse_line(buf).unwrap().unwrap();
        (frame.unwrap(), consumed)
    }

    #[test]
    fn test_parse_simple_line() {
        let (cmd, consumed) = command(b"GET name\n");
        assert_eq!(cmd.name, "GET");
        assert_eq!(cmd.args, vec!["name"]);
        assert_eq!(consumed, 9);
    }

    #[test]
    fn test_parse_crlf() {
        let (cmd, consumed) = command(b"PING\r\n");
        assert_eq!(cmd.name, "PING");
        assert!(cmd.args.is_empty());
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_name_is_case_insensitive() {
        let (cmd, _) = command(b"incrBy Counter 2\n");
        assert_eq!(cmd.name, "INCRBY");
        assert_eq!(cmd.args, vec!["Counter", "2"]);
    }

    #[test]
    fn test_raw_is_trimmed_line() {
        let (cmd, _) = command(b"  SET a   5 \n");
        assert_eq!(cmd.raw, "SET a   5");
        assert_eq!(cmd.args, vec!["a", "5"]);
    }

    #[test]
    fn test_incomplete_line() {
        assert_eq!(parse_line(b"SET a 5").unwrap(), None);
        assert_eq!(parse_line(b"").unwrap(), None);
    }

    #[test]
    fn test_only_first_line_consumed() {
        let buf = b"SET a 1\nGET a\n";
        let (cmd, consumed) = command(buf);
        assert_eq!(cmd.name, "SET");

        let (cmd, _) = command(&buf[consumed..]);
        assert_eq!(cmd.name, "GET");
    }

    #[test]
    fn test_blank_line() {
        let (frame, consumed) = parse_line(b"   \n").unwrap().unwrap();
        assert_eq!(frame, Err(ParseError::EmptyCommand));
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_invalid_utf8_is_consumed() {
        let (frame, consumed) = parse_line(b"GET \xff\xfe\n").unwrap().unwrap();
        assert!(matches!(frame, Err(ParseError::InvalidUtf8(_))));
        assert_eq!(consumed, 7);
    }

    #[test]
    fn test_line_too_long() {
        let mut parser = LineParser::with_max_line_length(8);

        assert!(matches!(
            parser.parse(b"SET key value-that-is-long"),
            Err(ParseError::LineTooLong { .. })
        ));
        assert!(matches!(
            parser.parse(b"SET key value-that-is-long\n"),
            Err(ParseError::LineTooLong { .. })
        ));
        assert!(parser.parse(b"PING\n").unwrap().is_some());
    }

    #[test]
    fn test_line_at_limit() {
        let mut parser = LineParser::with_max_line_length(8);

        // Partial line of exactly the limit waits for more data
        assert!(parser.parse(b"GET abcd").unwrap().is_none());

        let (frame, consumed) = parser.parse(b"GET abcd\n").unwrap().unwrap();
        assert_eq!(frame.unwrap().args, vec!["abcd"]);
        assert_eq!(consumed, 9);

        assert!(matches!(
            parser.parse(b"GET abcde\n"),
            Err(ParseError::LineTooLong { size: 9, max: 8 })
        ));
    }
}
