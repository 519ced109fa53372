//! Per connection request pipeline.
use std::{any::Any, panic::AssertUnwindSafe, time::Duration};

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite};

use super::{Proxy, diff};
use crate::{
    Error, ErrorKind, Result, ResultExt,
    backend::Backend,
    common::dump,
    config::Mode,
    handlers::{Handler, Response},
    metrics::Metrics,
    net::Socket,
    wire::{MsgBody, MsgHeader, WireStream, dump_message},
};

/// Bound on the final flush of a stopped session.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lines of context around each diff change.
const DIFF_CONTEXT: usize = 1;

/// One client connection.
///
/// Requests are read and answered strictly in order. Depending on the [`Mode`],
/// a request is handled locally, forwarded to the proxy, or both.
pub struct Session<B, S, P = Socket> {
    mode: Mode,
    handler: Handler<B>,
    conn: WireStream<S>,
    proxy: Option<Proxy<P>>,
}

impl<B, S, P> Session<B, S, P>
where
    B: Backend,
    S: AsyncRead + AsyncWrite + Unpin + Send,
    P: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// `proxy` is required when the mode forwards.
    pub fn new(mode: Mode, handler: Handler<B>, io: S, proxy: Option<Proxy<P>>) -> Session<B, S, P> {
        Self { mode, handler, conn: WireStream::new(io), proxy }
    }

    /// Serve requests until the client disconnects, an error occurs, or `stop` completes.
    ///
    /// A clean disconnect returns `Ok`, a stop returns [`ErrorKind::Cancelled`].
    /// The client stream is flushed and the proxy is closed on every path.
    pub async fn run(mut self, stop: impl Future<Output = ()> + Send) -> Result<()> {
        let result = tokio::select! {
            result = self.serve() => result,
            () = stop => Err(ErrorKind::Cancelled.into()),
        };

        if tokio::time::timeout(CLOSE_TIMEOUT, self.close()).await.is_err() {
            tracing::debug!("session close timed out");
        }

        result
    }

    async fn serve(&mut self) -> Result<()> {
        loop {
            let Some((header, body)) = self.conn.recv().await.context(|| "read request")? else {
                return Ok(());
            };

            dump!("Request", Some(&header), Some(&body));

            let mut res = Response::default();
            if self.mode.handles() {
                res = handle(&self.handler, &header, &body).await?;
                dump!("Response", res.header.as_ref(), res.body.as_ref());
            }

            let mut proxy_res = Response::default();
            if self.mode.forwards() {
                let mode = self.mode;
                let Some(proxy) = self.proxy.as_mut() else {
                    return Err(Error::internal(format!("no proxy connection in {mode} mode")));
                };
                proxy_res = match proxy.route(&header, &body).await {
                    Ok(res) => res,
                    Err(err) => {
                        tracing::warn!("Proxy returned error, closing connection: {err}");
                        return Err(err.context("proxy"));
                    },
                };
                dump!("Proxy response", proxy_res.header.as_ref(), proxy_res.body.as_ref());
            }

            if self.mode.diffs() {
                record_diff(self.handler.metrics(), &res, &proxy_res);
            }

            let chosen = match self.mode.sends_proxy() {
                true => proxy_res,
                false => res,
            };

            let (Some(header), Some(body)) = (&chosen.header, &chosen.body) else {
                tracing::info!("no response to send to client");
                continue;
            };

            self.conn.send(header, body);
            self.conn.flush().await.context(|| "write response")?;
        }
    }

    async fn close(&mut self) {
        if let Err(err) = self.conn.flush().await {
            tracing::debug!("failed to flush client: {err}");
        }
        if let Some(proxy) = self.proxy.as_mut() {
            if let Err(err) = proxy.close().await {
                tracing::debug!("failed to close proxy: {err}");
            }
        }
    }
}

impl<B, S, P> std::fmt::Debug for Session<B, S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("proxy", &self.proxy.is_some())
            .finish()
    }
}

/// Local dispatch, a panic is converted to an internal error.
async fn handle<B: Backend>(handler: &Handler<B>, header: &MsgHeader, body: &MsgBody) -> Result<Response> {
    AssertUnwindSafe(handler.handle(header, body))
        .catch_unwind()
        .await
        .map_err(|panic| Error::internal(format!("panic while handling request: {}", panic_message(&*panic))))?
}

fn record_diff(metrics: &Metrics, res: &Response, proxy: &Response) {
    let res = dump_message(res.header.as_ref(), res.body.as_ref());
    let proxy = dump_message(proxy.header.as_ref(), proxy.body.as_ref());

    let diff = diff::unified("res", "proxy", &res, &proxy, DIFF_CONTEXT);
    if diff.is_empty() {
        tracing::debug!("no diff");
        return;
    }

    metrics.diff();
    tracing::info!("Diff:\n{diff}");
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}
