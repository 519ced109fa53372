use std::fmt;

use crate::{
    bson::{Document, Tag},
    doc,
    translate::TranslateError,
};

/// Document database error codes returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    InternalError = 1,
    BadValue = 2,
    FailedToParse = 9,
    TypeMismatch = 14,
    NamespaceExists = 48,
    CommandNotFound = 59,
    NotImplemented = 238,
    ProjectionInclusionInExclusion = 31253,
    ProjectionExclusionInInclusion = 31254,
}

impl ErrorCode {
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Returns the `codeName` field value.
    pub const fn name(self) -> &'static str {
        match self {
            ErrorCode::InternalError => "InternalError",
            ErrorCode::BadValue => "BadValue",
            ErrorCode::FailedToParse => "FailedToParse",
            ErrorCode::TypeMismatch => "TypeMismatch",
            ErrorCode::NamespaceExists => "NamespaceExists",
            ErrorCode::CommandNotFound => "CommandNotFound",
            ErrorCode::NotImplemented => "NotImplemented",
            ErrorCode::ProjectionInclusionInExclusion => "Location31253",
            ErrorCode::ProjectionExclusionInInclusion => "Location31254",
        }
    }
}

/// Command level error, sent to the client as an error document.
#[derive(Clone, PartialEq)]
pub struct CommandError {
    code: ErrorCode,
    message: String,
}

impl CommandError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> CommandError {
        Self { code, message: message.into() }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn not_found(command: &str) -> CommandError {
        Self::new(ErrorCode::CommandNotFound, format!("no such command: '{command}'"))
    }

    pub(crate) fn not_implemented(command: &str, field: &str) -> CommandError {
        Self::new(ErrorCode::NotImplemented, format!("{command}: support for field {field:?} is not implemented yet"))
    }

    pub(crate) fn missing(command: &str, field: &str) -> CommandError {
        Self::new(ErrorCode::BadValue, format!("{command}: required field {field:?} is missing"))
    }

    pub(crate) fn mistyped(command: &str, field: &str, expected: Tag, found: Tag) -> CommandError {
        Self::new(
            ErrorCode::TypeMismatch,
            format!(
                "{command}: field {field:?} must be of type {}, found {}",
                expected.name(),
                found.name(),
            ),
        )
    }

    /// `{ errmsg, code, codeName, ok: 0.0 }`
    pub fn document(&self) -> Document {
        doc! {
            "errmsg" => self.message.as_str(),
            "code" => self.code.code(),
            "codeName" => self.code.name(),
            "ok" => 0.0,
        }
    }
}

impl From<TranslateError> for CommandError {
    fn from(err: TranslateError) -> Self {
        let code = match &err {
            TranslateError::InclusionConflict(_) => ErrorCode::ProjectionExclusionInInclusion,
            TranslateError::ExclusionConflict(_) => ErrorCode::ProjectionInclusionInExclusion,
            TranslateError::InvalidSortOrder { .. } => ErrorCode::TypeMismatch,
            TranslateError::InvalidPath(_) => ErrorCode::FailedToParse,
            TranslateError::MixedOperator(_) | TranslateError::InvalidOperand { .. } => ErrorCode::BadValue,
            TranslateError::UnsupportedType { .. }
            | TranslateError::UnsupportedOperator(_)
            | TranslateError::NegativeLimit(_)
            | TranslateError::InvalidProjection { .. } => ErrorCode::NotImplemented,
            TranslateError::ArgumentCount(_) | TranslateError::ArgumentKind(_) => ErrorCode::InternalError,
        };
        CommandError::new(code, err.to_string())
    }
}

impl std::error::Error for CommandError { }

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code.name(), self.code.code(), self.message)
    }
}

impl fmt::Debug for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
