//! Command dispatch.
//!
//! A request is routed by the first key of its command document. Command
//! level failures are answered with an error document, messages that cannot
//! be interpreted at all are an error and close the connection unanswered.
use crate::{
    Error, ErrorKind, Result,
    backend::Backend,
    bson::Document,
    metrics::Metrics,
    wire::{MsgBody, MsgHeader, OpCode, OpMsg, OpQuery, OpReply, ProtocolError},
};

mod admin;
mod command;
mod error;
mod query;

pub use command::{Command, Fields};
pub use error::{CommandError, ErrorCode};

/// Response of one request.
///
/// Either part may be absent, in which case nothing is sent.
#[derive(Debug, Default)]
pub struct Response {
    pub header: Option<MsgHeader>,
    pub body: Option<MsgBody>,
}

/// Handles requests of one session against the relational backend.
#[derive(Debug, Clone)]
pub struct Handler<B> {
    backend: B,
    metrics: Metrics,
}

impl<B: Backend> Handler<B> {
    pub fn new(backend: B, metrics: Metrics) -> Handler<B> {
        Self { backend, metrics }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Handle one request message.
    ///
    /// Command failures are answered with an error document. An `Err` is a
    /// message that cannot be interpreted, the connection is closed without
    /// a response.
    pub async fn handle(&self, header: &MsgHeader, body: &MsgBody) -> Result<Response> {
        match body {
            MsgBody::Msg(msg) => self.handle_msg(header, msg).await,
            MsgBody::Query(query) => Ok(self.handle_query(header, query).await),
            MsgBody::Reply(_) => {
                // replies only flow from server to client
                self.metrics.request(OpCode::Reply.name(), "unknown");
                self.metrics.response(OpCode::Reply.name(), "unknown", "error");
                Err(ProtocolError::UnsupportedOpCode(OpCode::Reply).into())
            },
        }
    }

    async fn handle_msg(&self, header: &MsgHeader, msg: &OpMsg) -> Result<Response> {
        let opcode = OpCode::Msg.name();

        let doc = match msg.document() {
            Ok(doc) => doc,
            Err(err) => {
                self.metrics.request(opcode, "unknown");
                self.metrics.response(opcode, "unknown", "error");
                return Err(Error::from(err).context("read command document"));
            },
        };

        let (command, reply) = self.dispatch(opcode, &doc).await;

        if msg.flags.more_to_come() {
            tracing::debug!("{command}: moreToCome, response discarded");
            return Ok(Response::default());
        }

        Ok(Response {
            header: Some(header.response(OpCode::Msg)),
            body: Some(OpMsg::reply(reply).into()),
        })
    }

    /// Legacy handshake, only `<db>.$cmd` queries are answered.
    async fn handle_query(&self, header: &MsgHeader, query: &OpQuery) -> Response {
        let opcode = OpCode::Query.name();

        let Some(db) = query.command_database() else {
            self.metrics.request(opcode, "unknown");
            self.metrics.response(opcode, "unknown", "error");
            let message = format!("OP_QUERY on {:?} is not supported", query.full_collection_name);
            return Response {
                header: Some(header.response(OpCode::Reply)),
                body: Some(OpReply::failure(message).into()),
                };
        };

        let mut doc = query.query.clone();
        if !doc.contains_key("$db") {
            doc.insert("$db", db);
        }

        let (_, reply) = self.dispatch(opcode, &doc).await;

        Response {
            header: Some(header.response(OpCode::Reply)),
            body: Some(OpReply::reply(reply).into()),
        }
    }

    /// Run a command and render its reply or error document.
    async fn dispatch(&self, opcode: &'static str, doc: &Document) -> (&'static str, Document) {
        let name = doc.command().and_then(Command::parse).map_or("unknown", Command::name);
        self.metrics.request(opcode, name);

        match self.command(doc).await {
            Ok(reply) => {
                self.metrics.response(opcode, name, "ok");
                (name, reply)
            },
            Err(err) => {
                self.metrics.response(opcode, name, "error");
                (name, error_document(err))
            },
        }
    }

    /// Execute a command document.
    ///
    /// Returns [`ErrorKind::Command`] for errors that belong in the reply.
    pub async fn command(&self, doc: &Document) -> Result<Document> {
        let Some(name) = doc.command() else {
            return Err(CommandError::new(ErrorCode::BadValue, "empty command document").into());
        };
        let Some(command) = Command::parse(name) else {
            return Err(CommandError::not_found(name).into());
        };

        let fields = Fields::new(command, doc)?;

        match command {
            Command::Find => query::find(&self.backend, &fields).await,
            Command::Count => query::count(&self.backend, &fields).await,
            Command::Create => admin::create(&self.backend, &fields).await,
            Command::DropDatabase => admin::drop_database(&self.backend, &fields).await,
            Command::HostInfo => admin::host_info(),
            Command::Hello => Ok(admin::hello(true)),
            Command::IsMaster => Ok(admin::hello(false)),
            Command::Ping => Ok(crate::doc! { "ok" => 1.0 }),
            Command::BuildInfo => Ok(admin::build_info()),
            Command::PrintShardingStatus => Err(CommandError::not_found(name).into()),
        }
        .map_err(|e| e.context(command.name()))
    }
}

/// Command errors are reported as is, anything else as an internal error.
fn error_document(err: Error) -> Document {
    if let ErrorKind::Command(err) = err.kind() {
        tracing::debug!("command error: {err}");
        return err.document();
    }
    tracing::warn!("failed to handle command: {err}");
    CommandError::new(ErrorCode::InternalError, err.kind().to_string()).document()
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        bson::Value,
        doc,
        postgres::DatabaseError,
        row::Rows,
        wire::{OpMsgFlags, ReplyFlags, Section},
    };

    /// Answers every query with the same text rows, recording the sql.
    #[derive(Clone, Default)]
    struct Fixed {
        columns: Vec<&'static str>,
        rows: Vec<Vec<Option<&'static str>>>,
        error: Option<DatabaseError>,
        queries: Arc<Mutex<Vec<String>>>,
    }

    impl Backend for Fixed {
        async fn query(&self, sql: &str) -> Result<Rows> {
            self.queries.lock().unwrap().push(sql.to_owned());
            match &self.error {
                Some(err) => Err(err.clone().into()),
                None => Ok(Rows::from_text(&self.columns, self.rows.clone())),
            }
        }
    }

    fn handler(backend: Fixed) -> Handler<Fixed> {
        Handler::new(backend, Metrics::default())
    }

    fn count_rows(n: &'static str) -> Fixed {
        Fixed { columns: vec!["count"], rows: vec![vec![Some(n)]], ..Default::default() }
    }

    #[tokio::test]
    async fn find_reply() {
        let backend = Fixed {
            columns: vec!["doc"],
            rows: vec![vec![Some(r#"{"_id": 1, "a": {"b": "x"}}"#)], vec![Some(r#"{"_id": 2}"#)]],
            ..Default::default()
        };
        let h = handler(backend.clone());

        let reply = h
            .command(&doc! { "find" => "users", "filter" => doc! { "a.b" => "x" }, "$db" => "test" })
            .await
            .unwrap();

        let cursor = reply.get("cursor").and_then(Value::as_document).unwrap();
        assert_eq!(cursor.get("ns"), Some(&Value::from("test.users")));
        assert_eq!(cursor.get("id"), Some(&Value::Int64(0)));
        assert_eq!(cursor.get("firstBatch").and_then(Value::as_array).unwrap().len(), 2);
        assert_eq!(reply.get("ok"), Some(&Value::Double(1.0)));
        assert_eq!(backend.queries.lock().unwrap()[0], r#"SELECT * FROM "users" WHERE "a"."b" = 'x'"#);
    }

    #[tokio::test]
    async fn count_is_capped_by_limit() {
        let doc = doc! { "count" => "c", "query" => doc! {}, "limit" => 10, "$db" => "test" };

        let reply = handler(count_rows("50")).command(&doc).await.unwrap();
        assert_eq!(reply, doc! { "n" => 10, "ok" => 1.0 });

        let reply = handler(count_rows("5")).command(&doc).await.unwrap();
        assert_eq!(reply, doc! { "n" => 5, "ok" => 1.0 });
    }

    #[tokio::test]
    async fn large_count_is_int64() {
        let doc = doc! { "count" => "c", "$db" => "test" };
        let reply = handler(count_rows("3000000000")).command(&doc).await.unwrap();
        assert_eq!(reply, doc! { "n" => 3_000_000_000i64, "ok" => 1.0 });

        let reply = handler(count_rows("2147483647")).command(&doc).await.unwrap();
        assert_eq!(reply.get("n"), Some(&Value::Int32(i32::MAX)));
    }

    #[tokio::test]
    async fn unsupported_fields_run_nothing() {
        let backend = count_rows("1");
        let h = handler(backend.clone());
        let commands = [
            doc! { "find" => "users", "filtr" => doc! { "a" => 1 }, "$db" => "test" },
            doc! { "count" => "users", "sort" => doc! { "a" => 1 }, "$db" => "test" },
            doc! { "count" => "users", "projection" => doc! { "a" => 1 }, "$db" => "test" },
        ];
        for doc in commands {
            let err = h.command(&doc).await.unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::Command(e) if e.code() == ErrorCode::NotImplemented));
        }
        assert!(backend.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn projection_has_no_effect_on_count() {
        let plain = count_rows("7");
        let with_fields = count_rows("7");

        let doc = doc! { "count" => "users", "query" => doc! { "a" => 1 }, "$db" => "test" };
        let reply = handler(plain.clone()).command(&doc).await.unwrap();

        let doc = doc! {
            "count" => "users",
            "query" => doc! { "a" => 1 },
            "fields" => doc! { "a" => 0 },
            "$db" => "test",
        };
        let projected = handler(with_fields.clone()).command(&doc).await.unwrap();

        assert_eq!(reply, projected);
        assert_eq!(*plain.queries.lock().unwrap(), *with_fields.queries.lock().unwrap());
    }

    #[tokio::test]
    async fn negative_limit_runs_nothing() {
        let backend = count_rows("1");
        let err = handler(backend.clone())
            .command(&doc! { "find" => "c", "limit" => -1, "$db" => "test" })
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Command(e) if e.code() == ErrorCode::NotImplemented));
        assert!(backend.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_and_rejected_commands() {
        let h = handler(Fixed::default());
        for name in ["aggregate", "printShardingStatus"] {
            let err = h.command(&doc! { name => 1, "$db" => "admin" }).await.unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::Command(e) if e.code() == ErrorCode::CommandNotFound));
        }
    }

    #[tokio::test]
    async fn create_existing_collection() {
        let backend = Fixed {
            error: Some(DatabaseError { code: "42P07".into(), ..Default::default() }),
            ..Default::default()
        };
        let err = handler(backend).command(&doc! { "create" => "c", "$db" => "test" }).await.unwrap_err();
        let ErrorKind::Command(err) = err.kind() else { panic!("{err}") };
        assert_eq!(err.code(), ErrorCode::NamespaceExists);
        assert_eq!(err.message(), "Collection already exists. NS: test.c");
    }

    #[tokio::test]
    async fn drop_database_requires_db() {
        let backend = Fixed::default();
        let h = handler(backend.clone());
        let reply = h.command(&doc! { "dropDatabase" => 1, "$db" => "test" }).await.unwrap();
        assert_eq!(reply, doc! { "dropped" => "test", "ok" => 1.0 });
        assert_eq!(backend.queries.lock().unwrap()[0], r#"DROP SCHEMA "test" CASCADE"#);

        assert!(h.command(&doc! { "dropDatabase" => 1 }).await.is_err());
    }

    #[tokio::test]
    async fn backend_error_is_an_error_document() {
        let backend = Fixed {
            error: Some(DatabaseError { code: "XX000".into(), message: "boom".into(), ..Default::default() }),
            ..Default::default()
        };
        let header = MsgHeader { request_id: 9, ..Default::default() };
        let body = MsgBody::Msg(OpMsg::reply(doc! { "find" => "c", "$db" => "test" }));

        let res = handler(backend).handle(&header, &body).await.unwrap();
        assert_eq!(res.header.unwrap().response_to, 9);
        let Some(MsgBody::Msg(msg)) = res.body else { panic!() };
        let doc = msg.document().unwrap();
        assert_eq!(doc.get("code"), Some(&Value::Int32(1)));
        assert_eq!(doc.get("ok"), Some(&Value::Double(0.0)));
    }

    #[tokio::test]
    async fn more_to_come_has_no_response() {
        let mut msg = OpMsg::reply(doc! { "ping" => 1, "$db" => "admin" });
        msg.flags = OpMsgFlags(OpMsgFlags::MORE_TO_COME);
        let res = handler(Fixed::default()).handle(&MsgHeader::default(), &msg.into()).await.unwrap();
        assert!(res.header.is_none() && res.body.is_none());
    }

    #[tokio::test]
    async fn uninterpretable_message_is_an_error() {
        let h = handler(Fixed::default());

        let mut msg = OpMsg::reply(doc! { "ping" => 1, "$db" => "admin" });
        msg.sections.push(Section::Body(doc! { "ping" => 1 }));
        let err = h.handle(&MsgHeader::default(), &msg.into()).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(ProtocolError::BodySectionCount(2))));

        let mut msg = OpMsg::reply(doc! { "find" => "c", "filter" => doc! {}, "$db" => "test" });
        msg.sections.push(Section::Sequence { identifier: "filter".into(), documents: vec![] });
        let err = h.handle(&MsgHeader::default(), &msg.into()).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(ProtocolError::DuplicateField(_))));

        let err = h.handle(&MsgHeader::default(), &OpReply::reply(doc! {}).into()).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(_)));
    }

    #[tokio::test]
    async fn legacy_handshake() {
        let h = handler(Fixed::default());
        let query = OpQuery {
            full_collection_name: "admin.$cmd".into(),
            query: doc! { "isMaster" => 1 },
            ..Default::default()
        };
        let res = h.handle(&MsgHeader::default(), &query.into()).await.unwrap();
        let Some(MsgBody::Reply(reply)) = res.body else { panic!() };
        assert_eq!(res.header.unwrap().op_code, OpCode::Reply);
        assert_eq!(reply.documents[0].get("ismaster"), Some(&Value::Bool(true)));

        let query = OpQuery { full_collection_name: "test.users".into(), ..Default::default() };
        let res = h.handle(&MsgHeader::default(), &query.into()).await.unwrap();
        let Some(MsgBody::Reply(reply)) = res.body else { panic!() };
        assert_eq!(reply.response_flags, ReplyFlags::QUERY_FAILURE);
    }
}
