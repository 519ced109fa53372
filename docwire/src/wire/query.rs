//! `OP_QUERY`, deprecated, decoded for the legacy handshake only.
use bytes::{BufMut, Bytes, BytesMut};

use super::{OpCode, ProtocolError, WireBody};
use crate::{
    bson::Document,
    ext::{BufMutExt, BytesExt},
};

/// Legacy query message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpQuery {
    pub flags: u32,
    /// `<database>.<collection>`
    pub full_collection_name: String,
    pub number_to_skip: i32,
    pub number_to_return: i32,
    pub query: Document,
    pub return_fields_selector: Option<Document>,
}

impl OpQuery {
    /// Returns the database if the query is a command, addressed to `<database>.$cmd`.
    pub fn command_database(&self) -> Option<&str> {
        self.full_collection_name.strip_suffix(".$cmd")
    }
}

impl WireBody for OpQuery {
    const OPCODE: OpCode = OpCode::Query;

    fn decode(mut body: Bytes) -> Result<Self, ProtocolError> {
        let flags = body.try_u32_le()?;
        let full_collection_name = body.try_nul_string()?;
        let number_to_skip = body.try_i32_le()?;
        let number_to_return = body.try_i32_le()?;
        let query = Document::decode(&mut body)?;
        let return_fields_selector = match body.is_empty() {
            true => None,
            false => Some(Document::decode(&mut body)?),
        };
        if !body.is_empty() {
            return Err(ProtocolError::TrailingBytes(body.len()));
        }
        Ok(OpQuery { flags, full_collection_name, number_to_skip, number_to_return, query, return_fields_selector })
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.flags);
        buf.put_nul_string(&self.full_collection_name);
        buf.put_i32_le(self.number_to_skip);
        buf.put_i32_le(self.number_to_return);
        self.query.encode(buf);
        if let Some(selector) = &self.return_fields_selector {
            selector.encode(buf);
        }
    }
}
