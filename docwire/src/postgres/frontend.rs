//! Messages sent to the relational backend.
//!
//! <https://www.postgresql.org/docs/current/protocol-message-formats.html>
use bytes::{BufMut, BytesMut};
use md5::{Digest, Md5};

use crate::ext::{BufMutExt, UsizeExt};

/// Protocol version 3.0.
const PROTOCOL_VERSION: u32 = 3 << 16;

/// Message of the startup and simple query flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendMessage<'a> {
    /// The first message of a connection, it has no type byte.
    Startup {
        user: &'a str,
        database: &'a str,
        application_name: &'a str,
    },
    /// Password response, cleartext or md5 hashed as requested.
    Password(&'a str),
    Query(&'a str),
    Terminate,
}

impl FrontendMessage<'_> {
    /// Append the message to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        if let Some(msgtype) = self.msgtype() {
            buf.put_u8(msgtype);
        }

        // the length counts itself but not the type byte
        let offset = buf.len();
        buf.put_u32(0);

        match *self {
            Self::Startup { user, database, application_name } => {
                buf.put_u32(PROTOCOL_VERSION);
                for (param, value) in [("user", user), ("database", database), ("application_name", application_name)] {
                    buf.put_nul_string(param);
                    buf.put_nul_string(value);
                }
                buf.put_u8(b'\0');
            },
            Self::Password(text) | Self::Query(text) => buf.put_nul_string(text),
            Self::Terminate => {},
        }

        let len = (buf.len() - offset).to_u32();
        buf[offset..offset + 4].copy_from_slice(&len.to_be_bytes());
    }

    const fn msgtype(&self) -> Option<u8> {
        match self {
            Self::Startup { .. } => None,
            Self::Password(_) => Some(b'p'),
            Self::Query(_) => Some(b'Q'),
            Self::Terminate => Some(b'X'),
        }
    }
}

/// `md5` password response, `"md5" + md5(md5(password + user) + salt)`.
pub fn md5_password(user: &str, password: &str, salt: [u8; 4]) -> String {
    fn hex(digest: &[u8]) -> String {
        digest.iter().fold(String::with_capacity(digest.len() * 2), |mut out, b| {
            out.push(char::from_digit((b >> 4).into(), 16).unwrap_or('0'));
            out.push(char::from_digit((b & 0xf).into(), 16).unwrap_or('0'));
            out
        })
    }

    let mut md5 = Md5::new();
    md5.update(password);
    md5.update(user);
    let inner = hex(&md5.finalize_reset());

    md5.update(inner);
    md5.update(salt);
    format!("md5{}", hex(&md5.finalize()))
}

#[cfg(test)]
mod test {
    use super::*;

    fn encode(msg: FrontendMessage) -> BytesMut {
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        buf
    }

    #[test]
    fn query_layout() {
        assert_eq!(&encode(FrontendMessage::Query("SELECT 1"))[..], b"Q\0\0\0\x0dSELECT 1\0");
        assert_eq!(&encode(FrontendMessage::Terminate)[..], b"X\0\0\0\x04");
    }

    #[test]
    fn startup_layout() {
        let msg = FrontendMessage::Startup { user: "u", database: "d", application_name: "a" };
        assert_eq!(
            &encode(msg)[..],
            b"\0\0\0\x2e\0\x03\0\0user\0u\0database\0d\0application_name\0a\0\0",
        );
    }

    #[test]
    fn md5_response() {
        let password = md5_password("postgres", "postgres", [1, 2, 3, 4]);
        assert_eq!(password.len(), 35);
        assert!(password.starts_with("md5"));
        assert!(password[3..].bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        assert_ne!(password, md5_password("postgres", "postgres", [4, 3, 2, 1]));
    }
}
