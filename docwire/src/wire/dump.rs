//! Human readable message dumps, for logs and diffs.
use std::fmt;

use super::{MsgBody, MsgHeader, OpMsg, OpQuery, OpReply, Section};

impl fmt::Display for MsgHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "length: {:>6}, id: {:>4}, response_to: {:>4}, opcode: {}",
            self.message_length,
            self.request_id,
            self.response_to,
            self.op_code.name(),
        )
    }
}

impl fmt::Display for OpMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "flags: {:#010x}", self.flags.0)?;
        for (i, section) in self.sections.iter().enumerate() {
            match section {
                Section::Body(doc) => writeln!(f, "section {i} body:\n{doc:#}")?,
                Section::Sequence { identifier, documents } => {
                    writeln!(f, "section {i} sequence {identifier:?}:")?;
                    for doc in documents {
                        writeln!(f, "{doc:#}")?;
                    }
                },
            }
        }
        if let Some(checksum) = self.checksum {
            writeln!(f, "checksum: {checksum:#010x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for OpQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "flags: {:#010x}, collection: {:?}, skip: {}, return: {}",
            self.flags, self.full_collection_name, self.number_to_skip, self.number_to_return,
        )?;
        writeln!(f, "query:\n{:#}", self.query)?;
        if let Some(selector) = &self.return_fields_selector {
            writeln!(f, "selector:\n{selector:#}")?;
        }
        Ok(())
    }
}

impl fmt::Display for OpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "flags: {:#010x}, cursor: {}, from: {}, returned: {}",
            self.response_flags,
            self.cursor_id,
            self.starting_from,
            self.documents.len(),
        )?;
        for doc in &self.documents {
            writeln!(f, "{doc:#}")?;
        }
        Ok(())
    }
}

impl fmt::Display for MsgBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsgBody::Msg(msg) => fmt::Display::fmt(msg, f),
            MsgBody::Query(query) => fmt::Display::fmt(query, f),
            MsgBody::Reply(reply) => fmt::Display::fmt(reply, f),
        }
    }
}

/// Dump a possibly absent message, header and body separated by an empty line.
pub fn dump_message(header: Option<&MsgHeader>, body: Option<&MsgBody>) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    match header {
        Some(header) => writeln!(out, "{header}"),
        None => writeln!(out, "<no header>"),
    }
    .ok();
    out.push('\n');
    match body {
        Some(body) => write!(out, "{body}"),
        None => writeln!(out, "<no body>"),
    }
    .ok();
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{doc, wire::OpCode};

    #[test]
    fn message_dump() {
        let header = MsgHeader { message_length: 30, request_id: 2, response_to: 1, op_code: OpCode::Msg };
        let body = MsgBody::Msg(OpMsg::reply(doc! { "ok" => 1.0 }));
        let dump = dump_message(Some(&header), Some(&body));
        assert_eq!(
            dump,
            "length:     30, id:    2, response_to:    1, opcode: OP_MSG\n\
             \n\
             flags: 0x00000000\n\
             section 0 body:\n\
             {\n  ok: 1.0\n}\n"
        );

        assert_eq!(dump_message(None, None), "<no header>\n\n<no body>\n");
    }
}
