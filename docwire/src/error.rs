//! `docwire` error types.
use std::{backtrace::Backtrace, fmt, io};

use crate::{
    bson::DecodeError,
    config::ConfigError,
    handlers::CommandError,
    postgres::{self, DatabaseError, UnsupportedAuth},
    row::ColumnError,
    wire::ProtocolError,
};

/// A specialized [`Result`] type for `docwire` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `docwire` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Prepend call site context, `outer: inner`.
    pub fn context(mut self, context: impl fmt::Display) -> Error {
        self.context = match self.context.is_empty() {
            true => context.to_string(),
            false => format!("{context}: {}", self.context),
        };
        self
    }

    /// Internal fault, a caught panic or a broken invariant.
    pub fn internal(message: impl Into<String>) -> Error {
        ErrorKind::Internal(message.into()).into()
    }

    /// Returns `true` if the error is a clean stop by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }
}

/// All possible error kind from `docwire` library.
pub enum ErrorKind {
    Io(io::Error),
    /// Malformed wire message.
    Protocol(ProtocolError),
    /// Malformed document.
    Decode(DecodeError),
    /// Unexpected message from the relational backend.
    Postgres(postgres::ProtocolError),
    /// Error response from the relational backend.
    Database(DatabaseError),
    /// Backend value cannot be read as the requested type.
    Column(ColumnError),
    Config(ConfigError),
    /// Command level error, rendered to the client as an error document.
    Command(CommandError),
    UnsupportedAuth(UnsupportedAuth),
    /// Operation was stopped by shutdown or timeout.
    Cancelled,
    Internal(String),
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<io::Error>e => ErrorKind::Io(e));
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<DecodeError>e => ErrorKind::Decode(e));
from!(<postgres::ProtocolError>e => ErrorKind::Postgres(e));
from!(<DatabaseError>e => ErrorKind::Database(e));
from!(<ColumnError>e => ErrorKind::Column(e));
from!(<ConfigError>e => ErrorKind::Config(e));
from!(<CommandError>e => ErrorKind::Command(e));
from!(<UnsupportedAuth>e => ErrorKind::UnsupportedAuth(e));

/// Lazily attach context to an error result.
pub trait ResultExt<T> {
    /// Prepend context if the result is an error, `f` is only called on error.
    fn context<C, F>(self, f: F) -> Result<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context<C, F>(self, f: F) -> Result<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().context(f()))
    }
}

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => fmt::Display::fmt(e, f),
            Self::Protocol(e) => fmt::Display::fmt(e, f),
            Self::Decode(e) => fmt::Display::fmt(e, f),
            Self::Postgres(e) => fmt::Display::fmt(e, f),
            Self::Database(e) => fmt::Display::fmt(e, f),
            Self::Column(e) => fmt::Display::fmt(e, f),
            Self::Config(e) => fmt::Display::fmt(e, f),
            Self::Command(e) => fmt::Display::fmt(e, f),
            Self::UnsupportedAuth(e) => fmt::Display::fmt(e, f),
            Self::Cancelled => f.write_str("operation cancelled"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn context_chain() {
        let res: Result<()> = Err(io::Error::from(io::ErrorKind::BrokenPipe))
            .context(|| "write response")
            .context(|| "session");
        let err = res.unwrap_err();
        assert!(err.to_string().starts_with("session: write response: "));
        assert!(matches!(err.kind(), ErrorKind::Io(_)));
    }

    #[test]
    fn cancelled() {
        let err = Error::from(ErrorKind::Cancelled);
        assert!(err.is_cancelled());
        assert!(!Error::internal("boom").is_cancelled());
    }
}
