//! Document Database Wire Protocol
//!
//! ## Messaging Overview
//!
//! Every message starts with a fixed 16 bytes header, all fields are little endian. The length
//! counts the whole message including the header itself. The body layout is determined by the
//! operation code.
//!
//! ```text
//! ┏━━━━━━━━━━━━━━━┳━━━━━━━━━━━━━━━┳━━━━━━━━━━━━━━━┳━━━━━━━━━━━━━━━┳━━━━━━┓
//! ┃    Length     ┃   RequestID   ┃  ResponseTo   ┃    OpCode     ┃ Body ┃
//! ┣━━━━━━━━━━━━━━━╋━━━━━━━━━━━━━━━╋━━━━━━━━━━━━━━━╋━━━━━━━━━━━━━━━╋━━━━━━┫
//! ┃   i32 (le)    ┃   i32 (le)    ┃   i32 (le)    ┃   i32 (le)    ┃ [u8] ┃
//! ┗━━━━━━━━━━━━━━━┻━━━━━━━━━━━━━━━┻━━━━━━━━━━━━━━━┻━━━━━━━━━━━━━━━┻━━━━━━┛
//! ```
//!
//! Only [`OpMsg`] is used for new responses. [`OpQuery`] is decoded for the legacy handshake,
//! which is answered with [`OpReply`].
//!
//! A stream cannot be resynchronized after a malformed frame, any decode error is fatal to the
//! connection.
//!
//! <https://www.mongodb.com/docs/manual/reference/mongodb-wire-protocol/>
mod header;
mod msg;
mod query;
mod reply;
mod dump;
mod error;

#[cfg(feature = "tokio")]
mod io;

pub use header::{MsgHeader, OpCode, HEADER_LEN, MAX_MESSAGE_LEN, next_request_id};
pub use msg::{OpMsg, OpMsgFlags, Section};
pub use query::OpQuery;
pub use reply::{OpReply, ReplyFlags};
pub use error::ProtocolError;
pub use dump::dump_message;

#[cfg(feature = "tokio")]
pub use io::WireStream;

use bytes::{Bytes, BytesMut};

use crate::ext::UsizeExt;

/// A message body which can be encoded to and decoded from the wire.
pub trait WireBody: Sized {
    /// Operation code of the body.
    const OPCODE: OpCode;

    /// Decode the body, `body` is exactly the bytes after the header.
    fn decode(body: Bytes) -> Result<Self, ProtocolError>;

    /// Append the encoded body to `buf`.
    fn encode(&self, buf: &mut BytesMut);
}

/// Decoded message body, keyed by operation code.
#[derive(Debug, Clone, PartialEq)]
pub enum MsgBody {
    Msg(OpMsg),
    Query(OpQuery),
    Reply(OpReply),
}

macro_rules! match_body {
    ($($name:ident($ty:ident),)*) => {
        impl MsgBody {
            /// Returns the operation code of the body.
            pub fn opcode(&self) -> OpCode {
                match self {
                    $(Self::$name(_) => <$ty as WireBody>::OPCODE,)*
                }
            }

            /// Decode body with the operation code found in the header.
            pub fn decode(opcode: OpCode, body: Bytes) -> Result<Self, ProtocolError> {
                $(
                    if opcode == <$ty as WireBody>::OPCODE {
                        return Ok(Self::$name(<$ty as WireBody>::decode(body)?));
                    }
                )*
                Err(ProtocolError::UnsupportedOpCode(opcode))
            }

            /// Append the encoded body to `buf`.
            pub fn encode(&self, buf: &mut BytesMut) {
                match self {
                    $(Self::$name(body) => body.encode(buf),)*
                }
            }
        }

        $(
            impl From<$ty> for MsgBody {
                fn from(value: $ty) -> Self {
                    Self::$name(value)
                }
            }
        )*
    };
}

match_body! {
    Msg(OpMsg),
    Query(OpQuery),
    Reply(OpReply),
}

/// Decode one whole frame.
///
/// `frame` must contain exactly one message, as announced by its header length.
pub fn decode_message(mut frame: Bytes) -> Result<(MsgHeader, MsgBody), ProtocolError> {
    let header = MsgHeader::decode(&mut frame)?;
    let expected = header.message_length as usize - HEADER_LEN;
    if frame.len() != expected {
        return Err(ProtocolError::LengthMismatch {
            declared: header.message_length,
            actual: (frame.len() + HEADER_LEN).to_i32(),
        });
    }
    let body = MsgBody::decode(header.op_code, frame)?;
    Ok((header, body))
}

/// Append one frame to `buf`.
///
/// The header length is computed from the encoded body, the one in `header` is ignored.
/// Returns the header as written.
pub fn encode_message(header: &MsgHeader, body: &MsgBody, buf: &mut BytesMut) -> MsgHeader {
    let offset = buf.len();
    let mut header = MsgHeader { op_code: body.opcode(), ..*header };
    header.encode(buf);
    body.encode(buf);

    header.message_length = (buf.len() - offset).to_i32();
    buf[offset..offset + 4].copy_from_slice(&header.message_length.to_le_bytes());
    header
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::doc;

    #[test]
    fn length_is_computed_from_body() {
        let body = MsgBody::Msg(OpMsg::reply(doc! { "ok" => 1.0 }));
        let header = MsgHeader { message_length: 999, request_id: 7, response_to: 3, op_code: OpCode::Reply };

        let mut buf = BytesMut::new();
        let written = encode_message(&header, &body, &mut buf);

        assert_eq!(written.message_length as usize, buf.len());
        assert_eq!(written.op_code, OpCode::Msg);

        let (h, b) = decode_message(buf.freeze()).unwrap();
        assert_eq!(h, written);
        assert_eq!(b, body);
    }

    #[test]
    fn length_mismatch_is_fatal() {
        let body = MsgBody::Msg(OpMsg::reply(doc! { "ok" => 1.0 }));
        let mut buf = BytesMut::new();
        encode_message(&MsgHeader::default(), &body, &mut buf);
        buf.extend_from_slice(&[0, 0]);

        assert!(matches!(
            decode_message(buf.freeze()),
            Err(ProtocolError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn deprecated_opcode_is_rejected() {
        let mut buf = BytesMut::new();
        let header = MsgHeader { message_length: 20, request_id: 1, response_to: 0, op_code: OpCode::Insert };
        header.encode(&mut buf);
        buf.extend_from_slice(&[0; 4]);

        assert!(matches!(
            decode_message(buf.freeze()),
            Err(ProtocolError::UnsupportedOpCode(OpCode::Insert))
        ));
    }
}
