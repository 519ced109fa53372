//! Messages received from the relational backend.
use bytes::Bytes;

use super::{DatabaseError, ProtocolError};
use crate::ext::BytesExt;

/// Authentication request of the startup exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Ok,
    Cleartext,
    Md5 { salt: [u8; 4] },
    /// Any other method, by name.
    Unsupported(&'static str),
}

impl Auth {
    fn decode(body: &mut Bytes) -> Result<Auth, ProtocolError> {
        let auth = match body.try_u32()? {
            0 => Auth::Ok,
            3 => Auth::Cleartext,
            5 => Auth::Md5 { salt: body.try_u32()?.to_be_bytes() },
            2 => Auth::Unsupported("KerberosV5"),
            7 => Auth::Unsupported("GSS"),
            9 => Auth::Unsupported("SSPI"),
            10 => Auth::Unsupported("SASL"),
            _ => Auth::Unsupported("Unknown"),
        };
        Ok(auth)
    }
}

/// Message of the startup and simple query flows.
///
/// Row bodies are kept undecoded, [`Rows`][crate::Rows] reads them lazily.
#[derive(Debug)]
pub enum BackendMessage {
    Auth(Auth),
    /// Cancellation key, never used since queries are not cancelled.
    KeyData,
    Parameter { name: String, value: String },
    /// Newest minor protocol version supported by the backend.
    NegotiateVersion { minor: u32 },
    Ready,
    RowDescription { fields: u16, body: Bytes },
    DataRow { columns: u16, body: Bytes },
    /// The command tag, such as `SELECT 14`.
    Complete { tag: String },
    EmptyQuery,
    Error(DatabaseError),
    Notice(DatabaseError),
}

/// Message type bytes and their protocol names.
const MSGTYPES: &[(u8, &str)] = &[
    (b'R', "Authentication"),
    (b'K', "BackendKeyData"),
    (b'S', "ParameterStatus"),
    (b'v', "NegotiateProtocolVersion"),
    (b'Z', "ReadyForQuery"),
    (b'T', "RowDescription"),
    (b'D', "DataRow"),
    (b'C', "CommandComplete"),
    (b'I', "EmptyQueryResponse"),
    (b'E', "ErrorResponse"),
    (b'N', "NoticeResponse"),
];

/// Protocol name of a message type, `"Unknown"` for types outside the simple query flow.
pub fn message_name(msgtype: u8) -> &'static str {
    MSGTYPES
        .iter()
        .find(|(ty, _)| *ty == msgtype)
        .map_or("Unknown", |(_, name)| name)
}

impl BackendMessage {
    pub fn decode(msgtype: u8, mut body: Bytes) -> Result<BackendMessage, ProtocolError> {
        let message = match msgtype {
            b'R' => Self::Auth(Auth::decode(&mut body)?),
            b'K' => Self::KeyData,
            b'S' => Self::Parameter {
                name: body.try_nul_string()?,
                value: body.try_nul_string()?,
            },
            b'v' => Self::NegotiateVersion { minor: body.try_u32()? },
            b'Z' => Self::Ready,
            b'T' => Self::RowDescription { fields: body.try_u16()?, body },
            b'D' => Self::DataRow { columns: body.try_u16()?, body },
            b'C' => Self::Complete { tag: body.try_nul_string()? },
            b'I' => Self::EmptyQuery,
            b'E' => Self::Error(DatabaseError::parse(body)?),
            b'N' => Self::Notice(DatabaseError::parse(body)?),
            _ => return Err(ProtocolError::unknown(msgtype)),
        };
        Ok(message)
    }

    pub fn msgtype(&self) -> u8 {
        match self {
            Self::Auth(_) => b'R',
            Self::KeyData => b'K',
            Self::Parameter { .. } => b'S',
            Self::NegotiateVersion { .. } => b'v',
            Self::Ready => b'Z',
            Self::RowDescription { .. } => b'T',
            Self::DataRow { .. } => b'D',
            Self::Complete { .. } => b'C',
            Self::EmptyQuery => b'I',
            Self::Error(_) => b'E',
            Self::Notice(_) => b'N',
        }
    }
}

/// Trailing row count of a command tag, `0` when absent.
pub fn rows_affected(tag: &str) -> u64 {
    tag.rsplit(' ').next().and_then(|n| n.parse().ok()).unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn command_tags() {
        assert_eq!(rows_affected("SELECT 14"), 14);
        assert_eq!(rows_affected("INSERT 0 3"), 3);
        assert_eq!(rows_affected("CREATE TABLE"), 0);
    }

    #[test]
    fn auth_requests() {
        let msg = BackendMessage::decode(b'R', Bytes::from_static(&[0, 0, 0, 5, 1, 2, 3, 4])).unwrap();
        assert!(matches!(msg, BackendMessage::Auth(Auth::Md5 { salt: [1, 2, 3, 4] })));

        let msg = BackendMessage::decode(b'R', Bytes::from_static(&[0, 0, 0, 10])).unwrap();
        assert!(matches!(msg, BackendMessage::Auth(Auth::Unsupported("SASL"))));
    }

    #[test]
    fn unknown_and_truncated() {
        let err = BackendMessage::decode(b'G', Bytes::new()).unwrap_err();
        assert_eq!(err.to_string(), "Unexpected message `Unknown` (G)");

        let err = BackendMessage::decode(b'T', Bytes::from_static(&[0])).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }
}
