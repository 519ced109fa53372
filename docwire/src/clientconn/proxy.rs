//! Forwarding to a real document database.
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    Result, ResultExt,
    handlers::Response,
    net::Socket,
    wire::{MsgBody, MsgHeader, WireStream},
};

/// Connection to the proxy backend, owned by one session.
#[derive(Debug)]
pub struct Proxy<S = Socket> {
    stream: WireStream<S>,
}

impl Proxy<Socket> {
    /// Connect to the proxy backend at `addr`, `host:port`.
    pub async fn connect(addr: &str) -> Result<Proxy<Socket>> {
        let stream = tokio::net::TcpStream::connect(addr)
            .await
            .context(|| format!("connect to proxy {addr}"))?;
        stream.set_nodelay(true)?;
        Ok(Self::new(Socket::from(stream)))
    }
}

impl<S> Proxy<S> {
    pub fn new(io: S) -> Proxy<S> {
        Self { stream: WireStream::new(io) }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Proxy<S> {
    /// Forward a request and read its response.
    ///
    /// A request with `moreToCome` is only forwarded, the response is empty.
    pub async fn route(&mut self, header: &MsgHeader, body: &MsgBody) -> Result<Response> {
        if matches!(body, MsgBody::Msg(msg) if msg.flags.more_to_come()) {
            self.stream.send(header, body);
            self.stream.flush().await?;
            return Ok(Response::default());
        }

        let (header, body) = self.stream.round_trip(header, body).await?;
        Ok(Response { header: Some(header), body: Some(body) })
    }

    pub async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await
    }
}
