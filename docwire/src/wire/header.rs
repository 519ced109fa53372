use std::sync::atomic::{AtomicI32, Ordering};

use bytes::{BufMut, Bytes, BytesMut};

use super::ProtocolError;
use crate::ext::BytesExt;

/// Size of [`MsgHeader`] on the wire.
pub const HEADER_LEN: usize = 16;

/// Largest accepted message, header included.
pub const MAX_MESSAGE_LEN: usize = 48 * 1024 * 1024;

static REQUEST_ID: AtomicI32 = AtomicI32::new(1);

/// Returns a process wide unique request id for outgoing messages.
pub fn next_request_id() -> i32 {
    REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// Standard message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MsgHeader {
    /// Total message size, including this header.
    pub message_length: i32,
    /// Identifier for this message.
    pub request_id: i32,
    /// `request_id` of the message this one respond to.
    pub response_to: i32,
    /// Body layout.
    pub op_code: OpCode,
}

impl MsgHeader {
    /// Decode and validate a header from the front of `buf`.
    pub fn decode(buf: &mut Bytes) -> Result<MsgHeader, ProtocolError> {
        let message_length = buf.try_i32_le()?;
        if message_length < HEADER_LEN as i32 || message_length as usize > MAX_MESSAGE_LEN {
            return Err(ProtocolError::InvalidLength(message_length));
        }
        let request_id = buf.try_i32_le()?;
        let response_to = buf.try_i32_le()?;
        let op_code = OpCode::try_from(buf.try_i32_le()?)?;
        Ok(MsgHeader { message_length, request_id, response_to, op_code })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(HEADER_LEN);
        buf.put_i32_le(self.message_length);
        buf.put_i32_le(self.request_id);
        buf.put_i32_le(self.response_to);
        buf.put_i32_le(self.op_code as i32);
    }

    /// Header for a response to this message.
    pub fn response(&self, op_code: OpCode) -> MsgHeader {
        MsgHeader {
            message_length: 0,
            request_id: next_request_id(),
            response_to: self.request_id,
            op_code,
        }
    }
}

/// Operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum OpCode {
    Reply = 1,
    Update = 2001,
    Insert = 2002,
    Query = 2004,
    GetMore = 2005,
    Delete = 2006,
    KillCursors = 2007,
    Compressed = 2012,
    #[default]
    Msg = 2013,
}

impl OpCode {
    pub const fn name(self) -> &'static str {
        match self {
            OpCode::Reply => "OP_REPLY",
            OpCode::Update => "OP_UPDATE",
            OpCode::Insert => "OP_INSERT",
            OpCode::Query => "OP_QUERY",
            OpCode::GetMore => "OP_GET_MORE",
            OpCode::Delete => "OP_DELETE",
            OpCode::KillCursors => "OP_KILL_CURSORS",
            OpCode::Compressed => "OP_COMPRESSED",
            OpCode::Msg => "OP_MSG",
        }
    }
}

impl TryFrom<i32> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        let op = match value {
            1 => OpCode::Reply,
            2001 => OpCode::Update,
            2002 => OpCode::Insert,
            2004 => OpCode::Query,
            2005 => OpCode::GetMore,
            2006 => OpCode::Delete,
            2007 => OpCode::KillCursors,
            2012 => OpCode::Compressed,
            2013 => OpCode::Msg,
            code => return Err(ProtocolError::UnknownOpCode(code)),
        };
        Ok(op)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_layout() {
        let mut buf = BytesMut::new();
        MsgHeader { message_length: 21, request_id: 2, response_to: 1, op_code: OpCode::Msg }.encode(&mut buf);
        assert_eq!(
            &buf[..],
            &[21, 0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 0xdd, 0x07, 0, 0]
        );
    }

    #[test]
    fn invalid_header() {
        let mut short = Bytes::from_static(&[15, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xdd, 0x07, 0, 0]);
        assert!(matches!(MsgHeader::decode(&mut short), Err(ProtocolError::InvalidLength(15))));

        let mut unknown = Bytes::from_static(&[16, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x63, 0, 0, 0]);
        assert!(matches!(MsgHeader::decode(&mut unknown), Err(ProtocolError::UnknownOpCode(99))));

        let mut truncated = Bytes::from_static(&[16, 0, 0, 0, 0, 0]);
        assert!(matches!(MsgHeader::decode(&mut truncated), Err(ProtocolError::Document(_))));
    }

    #[test]
    fn response_header() {
        let req = MsgHeader { message_length: 40, request_id: 12, response_to: 0, op_code: OpCode::Msg };
        let res = req.response(OpCode::Msg);
        assert_eq!(res.response_to, 12);
        assert_ne!(res.request_id, next_request_id());
    }
}
