//! The error taxonomy shared by every subsystem crate.
//!
//! Each variant maps onto a wire-visible RESP error via [`Error::wire_message`],
//! which is the only place command executors and the connection handler need
//! to agree on error text.

use std::io;

/// A command- or protocol-level failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No command by this name is registered.
    #[error("ERR unknown command")]
    UnknownCommand,

    /// The command was registered but received the wrong number of arguments.
    #[error("Err wrong number of arguments for '{0}' command")]
    WrongArity(String),

    /// A command-specific option or argument combination was malformed.
    #[error("Err syntax error")]
    Syntax,

    /// The key holds a value whose type cannot satisfy the command.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// A command argument expected to parse as an integer did not.
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    /// A `KEYS` pattern failed to compile.
    #[error("ERR illegal pattern")]
    IllegalPattern,

    /// A `SELECT` (or similar) index fell outside `[0, databases)`.
    #[error("ERR DB index is out of range")]
    DbIndexOutOfRange,

    /// Catch-all for executor panics recovered at the DB boundary, and any
    /// other condition the caller chooses not to name more specifically.
    #[error("Err unknown")]
    Internal,

    /// A generic, caller-supplied message, used sparingly where no other
    /// variant fits (e.g. "no such key" from RENAME).
    #[error("{0}")]
    Other(String),

    /// The RESP stream was malformed in a way that cannot be recovered from
    /// without resynchronizing; the connection is closed after this is
    /// surfaced to the client.
    #[error("{0}")]
    Protocol(String),

    /// The underlying byte source failed; always fatal to the stream.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns the text that goes after the leading `-` of a RESP error
    /// reply (CRLF is appended by the encoder).
    pub fn wire_message(&self) -> String {
        self.to_string()
    }

    /// True if this error is an underlying-stream failure that ends
    /// decoding entirely. A protocol error (bad length, missing CR) is
    /// recoverable at the stream level — the parser resynchronizes on the
    /// next line — even though callers like the connection handler choose
    /// to close on the first one anyway.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_messages_match_spec_prefixes() {
        assert_eq!(Error::UnknownCommand.wire_message(), "ERR unknown command");
        assert_eq!(
            Error::WrongArity("get".into()).wire_message(),
            "Err wrong number of arguments for 'get' command"
        );
        assert_eq!(Error::Syntax.wire_message(), "Err syntax error");
        assert_eq!(
            Error::WrongType.wire_message(),
            "WRONGTYPE Operation against a key holding the wrong kind of value"
        );
        assert_eq!(Error::Internal.wire_message(), "Err unknown");
    }

    #[test]
    fn fatal_classification() {
        assert!(Error::Io(io::Error::new(io::ErrorKind::Other, "boom")).is_fatal());
        assert!(!Error::Protocol("bad".into()).is_fatal());
        assert!(!Error::Syntax.is_fatal());
        assert!(!Error::WrongType.is_fatal());
    }
}
