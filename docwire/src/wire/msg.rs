//! `OP_MSG`
//!
//! ```text
//! ┏━━━━━━━━━━━━━━━┳━━━━━━━━━━━━━━━┳━━━━━━━━━━━━━━━━━━━━━┓
//! ┃   FlagBits    ┃  Sections...  ┃ Checksum (optional) ┃
//! ┣━━━━━━━━━━━━━━━╋━━━━━━━━━━━━━━━╋━━━━━━━━━━━━━━━━━━━━━┫
//! ┃   u32 (le)    ┃               ┃      u32 (le)       ┃
//! ┗━━━━━━━━━━━━━━━┻━━━━━━━━━━━━━━━┻━━━━━━━━━━━━━━━━━━━━━┛
//! ```
//!
//! A section starts with a kind byte, kind `0` is followed by one document, kind `1` by a
//! length prefixed nul terminated identifier and the documents filling the remaining length.
use bytes::{BufMut, Bytes, BytesMut};

use super::{OpCode, ProtocolError, WireBody};
use crate::{
    bson::{Document, Value},
    ext::{BufMutExt, BytesExt, UsizeExt},
};

const KIND_BODY: u8 = 0;
const KIND_SEQUENCE: u8 = 1;

/// `OP_MSG` flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpMsgFlags(pub u32);

impl OpMsgFlags {
    /// The message ends with a crc32c checksum.
    pub const CHECKSUM_PRESENT: u32 = 1 << 0;
    /// Sender will send another message without waiting a response.
    pub const MORE_TO_COME: u32 = 1 << 1;
    /// Client is prepared for multiple replies to this request.
    pub const EXHAUST_ALLOWED: u32 = 1 << 16;

    pub const fn checksum_present(self) -> bool {
        self.0 & Self::CHECKSUM_PRESENT != 0
    }

    pub const fn more_to_come(self) -> bool {
        self.0 & Self::MORE_TO_COME != 0
    }
}

/// One part of an `OP_MSG`.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    /// Kind `0`, the command document.
    Body(Document),
    /// Kind `1`, a named sequence of documents.
    Sequence {
        identifier: String,
        documents: Vec<Document>,
    },
}

/// Extensible message format.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpMsg {
    pub flags: OpMsgFlags,
    pub sections: Vec<Section>,
    /// Received checksum, kept but not verified.
    pub checksum: Option<u32>,
}

impl OpMsg {
    /// Single document response.
    pub fn reply(document: Document) -> OpMsg {
        OpMsg {
            flags: OpMsgFlags::default(),
            sections: vec![Section::Body(document)],
            checksum: None,
        }
    }

    /// Returns the command document with every document sequence merged in as an array field.
    pub fn document(&self) -> Result<Document, ProtocolError> {
        let mut bodies = self.sections.iter().filter_map(|s| match s {
            Section::Body(doc) => Some(doc),
            Section::Sequence { .. } => None,
        });

        let (Some(body), None) = (bodies.next(), bodies.next()) else {
            let n = self.sections.iter().filter(|s| matches!(s, Section::Body(_))).count();
            return Err(ProtocolError::BodySectionCount(n));
        };

        let mut doc = body.clone();
        for section in &self.sections {
            if let Section::Sequence { identifier, documents } = section {
                if doc.contains_key(identifier) {
                    return Err(ProtocolError::DuplicateField(identifier.clone()));
                }
                let array = documents.iter().cloned().map(Value::Document).collect::<Vec<_>>();
                doc.insert(identifier.as_str(), array);
            }
        }
        Ok(doc)
    }
}

impl WireBody for OpMsg {
    const OPCODE: OpCode = OpCode::Msg;

    fn decode(mut body: Bytes) -> Result<Self, ProtocolError> {
        let flags = OpMsgFlags(body.try_u32_le()?);

        let checksum = match flags.checksum_present() {
            true => {
                body.require(4)?;
                let mut tail = body.split_off(body.len() - 4);
                Some(tail.try_u32_le()?)
            },
            false => None,
        };

        let mut sections = vec![];

        while !body.is_empty() {
            match body.try_u8()? {
                KIND_BODY => sections.push(Section::Body(Document::decode(&mut body)?)),
                KIND_SEQUENCE => {
                    let len = body.try_i32_le()?;
                    if len < 4 {
                        return Err(ProtocolError::InvalidSectionLength(len));
                    }
                    let mut seq = body.try_split(len as usize - 4)?;
                    let identifier = seq.try_nul_string()?;
                    let mut documents = vec![];
                    while !seq.is_empty() {
                        documents.push(Document::decode(&mut seq)?);
                    }
                    sections.push(Section::Sequence { identifier, documents });
                },
                kind => return Err(ProtocolError::InvalidSectionKind(kind)),
            }
        }

        Ok(OpMsg { flags, sections, checksum })
    }

    fn encode(&self, buf: &mut BytesMut) {
        // checksum is never written
        buf.put_u32_le(self.flags.0 & !OpMsgFlags::CHECKSUM_PRESENT);

        for section in &self.sections {
            match section {
                Section::Body(doc) => {
                    buf.put_u8(KIND_BODY);
                    doc.encode(buf);
                },
                Section::Sequence { identifier, documents } => {
                    buf.put_u8(KIND_SEQUENCE);
                    let offset = buf.len();
                    buf.put_i32_le(0);
                    buf.put_nul_string(identifier);
                    for doc in documents {
                        doc.encode(buf);
                    }
                    let len = (buf.len() - offset).to_i32();
                    buf[offset..offset + 4].copy_from_slice(&len.to_le_bytes());
                },
            }
        }
    }
}
