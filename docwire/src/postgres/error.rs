//! Protocol error
use std::fmt;

use bytes::Bytes;

use super::message_name;
use crate::{bson::DecodeError, ext::BytesExt};

/// Backend sent a message that does not fit the startup or simple query flow.
pub enum ProtocolError {
    Unexpected {
        found: u8,
        /// The flow that received it, when known.
        phase: Option<&'static str>,
    },
    /// Message body is shorter than its fields.
    Malformed(DecodeError),
}

impl ProtocolError {
    pub(crate) fn unknown(found: u8) -> ProtocolError {
        Self::Unexpected { found, phase: None }
    }

    pub(crate) fn unexpected_phase(found: u8, phase: &'static str) -> ProtocolError {
        Self::Unexpected { found, phase: Some(phase) }
    }
}

impl From<DecodeError> for ProtocolError {
    fn from(value: DecodeError) -> Self {
        Self::Malformed(value)
    }
}

impl std::error::Error for ProtocolError { }

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unexpected { found, phase } => {
                write!(f, "Unexpected message `{}` ({})", message_name(*found), *found as char)?;
                match phase {
                    Some(phase) => write!(f, " in {phase}"),
                    None => Ok(()),
                }
            },
            Self::Malformed(e) => write!(f, "Malformed backend message: {e}"),
        }
    }
}

impl fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Authentication method requested by the backend which is not supported.
pub struct UnsupportedAuth {
    pub method: &'static str,
}

impl std::error::Error for UnsupportedAuth { }

impl fmt::Display for UnsupportedAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Authentication method `{}` is not supported", self.method)
    }
}

impl fmt::Debug for UnsupportedAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// An error or notice reported by the backend.
///
/// <https://www.postgresql.org/docs/current/protocol-error-fields.html>
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DatabaseError {
    /// `ERROR`, `FATAL`, or `PANIC` for errors, `WARNING`, `NOTICE` and others for notices.
    pub severity: String,
    /// The SQLSTATE code for the error.
    pub code: String,
    /// The primary human-readable error message.
    pub message: String,
    pub detail: Option<String>,
}

impl DatabaseError {
    /// Parse the identified fields of `ErrorResponse` or `NoticeResponse` body.
    pub fn parse(mut body: Bytes) -> Result<DatabaseError, ProtocolError> {
        let mut error = DatabaseError::default();

        loop {
            let field = body.try_u8()?;
            if field == b'\0' {
                break;
            }
            let value = body.try_nul_string()?;
            match field {
                // `S` may be localized, `V` never is
                b'S' if error.severity.is_empty() => error.severity = value,
                b'V' => error.severity = value,
                b'C' => error.code = value,
                b'M' => error.message = value,
                b'D' => error.detail = Some(value),
                _ => {}
            }
        }

        Ok(error)
    }

    /// Returns `true` if the SQLSTATE reports an already existing table, schema or object.
    pub fn is_already_exists(&self) -> bool {
        matches!(self.code.as_str(), "42P07" | "42P06" | "42710")
    }
}

impl std::error::Error for DatabaseError { }

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.severity, self.message, self.code)?;
        if let Some(detail) = &self.detail {
            write!(f, ", {detail}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
