//! `OP_REPLY`, the response to [`OpQuery`][super::OpQuery].
use bytes::{BufMut, Bytes, BytesMut};

use super::{OpCode, ProtocolError, WireBody};
use crate::{bson::Document, ext::BytesExt};

/// `OP_REPLY` response flag bits.
pub struct ReplyFlags;

impl ReplyFlags {
    pub const CURSOR_NOT_FOUND: u32 = 1 << 0;
    pub const QUERY_FAILURE: u32 = 1 << 1;
    pub const AWAIT_CAPABLE: u32 = 1 << 3;
}

/// Legacy reply message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpReply {
    pub response_flags: u32,
    pub cursor_id: i64,
    pub starting_from: i32,
    pub documents: Vec<Document>,
}

impl OpReply {
    /// Single document reply.
    pub fn reply(document: Document) -> OpReply {
        OpReply { documents: vec![document], ..Default::default() }
    }

    /// Reply with the `QueryFailure` flag and an `$err` document.
    pub fn failure(message: impl Into<String>) -> OpReply {
        OpReply {
            response_flags: ReplyFlags::QUERY_FAILURE,
            documents: vec![crate::doc! { "$err" => message.into() }],
            ..Default::default()
        }
    }
}

impl WireBody for OpReply {
    const OPCODE: OpCode = OpCode::Reply;

    fn decode(mut body: Bytes) -> Result<Self, ProtocolError> {
        let response_flags = body.try_u32_le()?;
        let cursor_id = body.try_i64_le()?;
        let starting_from = body.try_i32_le()?;
        let number_returned = body.try_i32_le()?;
        let mut documents = Vec::with_capacity(number_returned.clamp(0, 16) as usize);
        while !body.is_empty() {
            documents.push(Document::decode(&mut body)?);
        }
        if documents.len() as i64 != i64::from(number_returned) {
            return Err(ProtocolError::DocumentCount { declared: number_returned, found: documents.len() });
        }
        Ok(OpReply { response_flags, cursor_id, starting_from, documents })
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.response_flags);
        buf.put_i64_le(self.cursor_id);
        buf.put_i32_le(self.starting_from);
        buf.put_i32_le(i32::try_from(self.documents.len()).unwrap_or(i32::MAX));
        for doc in &self.documents {
            doc.encode(buf);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::doc;

    #[test]
    fn reply_roundtrip() {
        let reply = OpReply::reply(doc! { "ismaster" => true, "ok" => 1.0 });
        let mut buf = BytesMut::new();
        reply.encode(&mut buf);
        assert_eq!(&buf[16..20], &[1, 0, 0, 0]);
        assert_eq!(OpReply::decode(buf.freeze()).unwrap(), reply);
    }

    #[test]
    fn failure_flag() {
        let reply = OpReply::failure("no");
        assert_eq!(reply.response_flags & ReplyFlags::QUERY_FAILURE, ReplyFlags::QUERY_FAILURE);
        assert_eq!(reply.documents[0], doc! { "$err" => "no" });
    }
}
