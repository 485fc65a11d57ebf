//! Line Protocol Implementation
//!
//! TallyKV speaks a plain-text protocol: newline-terminated command lines
//! in, newline-terminated reply lines out.
//!
//! ## Modules
//!
//! - `parser`: frames lines out of the read buffer and tokenizes them
//! - `types`: the `Reply` enum and its serialization
//!
//! ## Example
//!
//! ```
//! use tallykv::protocol::{parse_line, Reply};
//!
//! let (frame, consumed) = parse_line(b"GET name\n").unwrap().unwrap();
//! let command = frame.unwrap();
//! assert_eq!(command.name, "GET");
//! assert_eq!(consumed, 9);
//!
//! assert_eq!(Reply::Nil.serialize(), b"nil\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_line, Command, Frame, LineParser, ParseError, ParseResult};
pub use types::Reply;
