use docwire::{
    Backend, ErrorKind, Handler, Listener, Metrics, Mode, Proxy, Result, Rows, Session,
    bson::{Document, Value},
    doc,
    wire::{MsgBody, MsgHeader, OpCode, OpMsg, OpMsgFlags, ProtocolError, Section, WireStream},
};
use tokio::{io::DuplexStream, net::TcpStream, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// Every query returns one document, a query on `boom` panics.
#[derive(Clone)]
struct Memory;

impl Backend for Memory {
    async fn query(&self, sql: &str) -> Result<Rows> {
        if sql.contains(r#""boom""#) {
            panic!("backend fault");
        }
        Ok(Rows::from_text(&["doc"], [vec![Some(r#"{"_id": 1, "name": "local"}"#)]]))
    }
}

/// Proxy answering every request with the same document.
fn scripted_proxy() -> Proxy<DuplexStream> {
    let (io, remote) = tokio::io::duplex(4096);
    tokio::spawn(async move {
        let mut remote = WireStream::new(remote);
        while let Ok(Some((header, _))) = remote.recv().await {
            let reply = doc! {
                "cursor" => doc! {
                    "firstBatch" => docwire::array![doc! { "_id" => 1, "name" => "proxy" }],
                    "id" => 0i64,
                    "ns" => "test.users",
                },
                "ok" => 1.0,
            };
            remote.send(&header.response(OpCode::Msg), &OpMsg::reply(reply).into());
            if remote.flush().await.is_err() {
                break;
            }
        }
    });
    Proxy::new(io)
}

fn spawn_session(
    mode: Mode,
    metrics: &Metrics,
) -> (WireStream<DuplexStream>, JoinHandle<Result<()>>) {
    let (client, server) = tokio::io::duplex(4096);
    let proxy = mode.forwards().then(scripted_proxy);
    let session = Session::new(mode, Handler::new(Memory, metrics.clone()), server, proxy);
    let handle = tokio::spawn(session.run(std::future::pending::<()>()));
    (WireStream::new(client), handle)
}

async fn request<S>(client: &mut WireStream<S>, request_id: i32, doc: Document) -> Option<(MsgHeader, Document)>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let header = MsgHeader { request_id, ..Default::default() };
    client.send(&header, &OpMsg::reply(doc).into());
    client.flush().await.ok()?;

    let (header, body) = client.recv().await.ok()??;
    let MsgBody::Msg(msg) = body else {
        panic!("expected OP_MSG, found {body:?}");
    };
    Some((header, msg.document().unwrap()))
}

fn first_name(reply: &Document) -> &str {
    let batch = reply
        .get("cursor")
        .and_then(Value::as_document)
        .and_then(|cursor| cursor.get("firstBatch"))
        .and_then(Value::as_array)
        .unwrap();
    batch[0].as_document().and_then(|d| d.get("name")).and_then(Value::as_str).unwrap()
}

fn find(collection: &str) -> Document {
    doc! { "find" => collection, "$db" => "test" }
}

#[tokio::test]
async fn normal_mode_answers_locally() {
    let metrics = Metrics::default();
    let (mut client, session) = spawn_session(Mode::Normal, &metrics);

    let (header, reply) = request(&mut client, 3, find("users")).await.unwrap();
    assert_eq!(header.response_to, 3);
    assert_eq!(first_name(&reply), "local");

    let (_, reply) = request(&mut client, 4, doc! { "ping" => 1, "$db" => "admin" }).await.unwrap();
    assert_eq!(reply.get("ok"), Some(&Value::Double(1.0)));

    drop(client);
    session.await.unwrap().unwrap();
    assert_eq!(metrics.diffs(), 0);
}

#[tokio::test]
async fn proxy_mode_skips_local_dispatch() {
    let metrics = Metrics::default();
    let (mut client, session) = spawn_session(Mode::Proxy, &metrics);

    // a local dispatch would panic
    let (_, reply) = request(&mut client, 1, find("boom")).await.unwrap();
    assert_eq!(first_name(&reply), "proxy");

    drop(client);
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn diff_proxy_sends_proxy_response() {
    let metrics = Metrics::default();
    let (mut client, session) = spawn_session(Mode::DiffProxy, &metrics);

    let (_, reply) = request(&mut client, 1, find("users")).await.unwrap();
    assert_eq!(first_name(&reply), "proxy");
    assert_eq!(metrics.diffs(), 1);

    drop(client);
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn diff_normal_sends_local_response() {
    let metrics = Metrics::default();
    let (mut client, session) = spawn_session(Mode::DiffNormal, &metrics);

    let (_, reply) = request(&mut client, 1, find("users")).await.unwrap();
    assert_eq!(first_name(&reply), "local");
    assert_eq!(metrics.diffs(), 1);

    drop(client);
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn missing_proxy_ends_session() {
    let (client, server) = tokio::io::duplex(4096);
    let session = Session::<_, _, DuplexStream>::new(Mode::DiffNormal, Handler::new(Memory, Metrics::default()), server, None);
    let handle = tokio::spawn(session.run(std::future::pending::<()>()));

    let mut client = WireStream::new(client);
    assert!(request(&mut client, 1, find("users")).await.is_none());

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Internal(_)));
}

#[tokio::test]
async fn proxy_failure_ends_session() {
    let (client, server) = tokio::io::duplex(4096);
    let (proxy, remote) = tokio::io::duplex(4096);
    drop(remote);

    let session = Session::new(Mode::DiffProxy, Handler::new(Memory, Metrics::default()), server, Some(Proxy::new(proxy)));
    let handle = tokio::spawn(session.run(std::future::pending::<()>()));

    let mut client = WireStream::new(client);
    assert!(request(&mut client, 1, find("users")).await.is_none());
    assert!(handle.await.unwrap().is_err());
}

#[tokio::test]
async fn fault_is_isolated_to_its_session() {
    let metrics = Metrics::default();
    let (mut faulty, faulty_session) = spawn_session(Mode::Normal, &metrics);
    let (mut healthy, healthy_session) = spawn_session(Mode::Normal, &metrics);

    assert!(request(&mut healthy, 1, find("users")).await.is_some());

    // the connection is closed without a response
    assert!(request(&mut faulty, 1, find("boom")).await.is_none());
    let err = faulty_session.await.unwrap().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Internal(_)));
    assert!(err.to_string().contains("backend fault"));

    let (_, reply) = request(&mut healthy, 2, find("users")).await.unwrap();
    assert_eq!(first_name(&reply), "local");

    drop(healthy);
    healthy_session.await.unwrap().unwrap();
}

#[tokio::test]
async fn malformed_command_closes_without_response() {
    let metrics = Metrics::default();
    let (mut client, session) = spawn_session(Mode::Normal, &metrics);

    let mut msg = OpMsg::reply(doc! { "ping" => 1, "$db" => "admin" });
    msg.sections.push(Section::Body(doc! { "ping" => 1 }));
    client.send(&MsgHeader { request_id: 1, ..Default::default() }, &msg.into());
    client.flush().await.unwrap();

    assert!(client.recv().await.unwrap().is_none());
    let err = session.await.unwrap().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Protocol(ProtocolError::BodySectionCount(2))));
}

#[tokio::test]
async fn more_to_come_is_not_answered() {
    let metrics = Metrics::default();
    let (mut client, session) = spawn_session(Mode::Normal, &metrics);

    let mut msg = OpMsg::reply(doc! { "ping" => 1, "$db" => "admin" });
    msg.flags = OpMsgFlags(OpMsgFlags::MORE_TO_COME);
    client.send(&MsgHeader { request_id: 1, ..Default::default() }, &msg.into());

    let (header, _) = request(&mut client, 2, doc! { "ping" => 1, "$db" => "admin" }).await.unwrap();
    assert_eq!(header.response_to, 2);

    drop(client);
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn stop_cancels_session() {
    let (_client, server) = tokio::io::duplex(4096);
    let token = CancellationToken::new();
    let session = Session::<_, _, DuplexStream>::new(Mode::Normal, Handler::new(Memory, Metrics::default()), server, None);
    let handle = tokio::spawn(session.run(token.clone().cancelled_owned()));

    token.cancel();
    let err = handle.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn listener_serves_and_drains() {
    let config = docwire::Config { listen_addr: "127.0.0.1:0".into(), ..Default::default() };
    let metrics = Metrics::default();
    let listener = Listener::bind(config, Handler::new(Memory, metrics.clone())).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = CancellationToken::new();
    let running = tokio::spawn(listener.run(shutdown.clone()));

    let mut client = WireStream::new(TcpStream::connect(addr).await.unwrap());
    let (_, reply) = request(&mut client, 1, doc! { "ping" => 1, "$db" => "admin" }).await.unwrap();
    assert_eq!(reply.get("ok"), Some(&Value::Double(1.0)));
    assert_eq!(metrics.connected(), 1);

    drop(client);
    shutdown.cancel();
    running.await.unwrap().unwrap();
    assert_eq!(metrics.connected(), 0);
}
