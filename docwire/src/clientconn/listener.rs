//! Client listener.
use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::Instrument;

use super::{Proxy, Session};
use crate::{
    Result, ResultExt,
    backend::Backend,
    config::Config,
    handlers::Handler,
};

#[cfg(feature = "tls")]
type Acceptor = tokio_rustls::TlsAcceptor;
#[cfg(not(feature = "tls"))]
type Acceptor = std::convert::Infallible;

/// Sessions keep running for this long after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Delay before accepting again after an accept error.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Accepts clients and runs one [`Session`] per connection.
pub struct Listener<B> {
    tcp: TcpListener,
    shared: Arc<Shared<B>>,
}

struct Shared<B> {
    config: Config,
    handler: Handler<B>,
    tls: Option<Acceptor>,
}

impl<B: Backend> Listener<B> {
    /// Bind the listen address, and load the certificate when TLS is enabled.
    pub async fn bind(config: Config, handler: Handler<B>) -> Result<Listener<B>> {
        let tls = match config.tls {
            true => Some(tls_acceptor(&config)?),
            false => None,
        };

        let tcp = TcpListener::bind(&config.listen_addr)
            .await
            .context(|| format!("bind {}", config.listen_addr))?;

        tracing::info!("Listening on {} ...", tcp.local_addr()?);

        Ok(Self { tcp, shared: Arc::new(Shared { config, handler, tls }) })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.tcp.local_addr()?)
    }

    /// Accept clients until `shutdown` is cancelled, then wait for every session to stop.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let tracker = TaskTracker::new();

        loop {
            let accepted = tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = self.tcp.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(ok) => ok,
                Err(err) => {
                    tracing::warn!("Failed to accept connection: {err}");
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(ACCEPT_BACKOFF) => continue,
                    }
                },
            };

            let local = stream.local_addr().ok();
            let span = tracing::info_span!("conn", %peer, local = ?local);
            let shared = self.shared.clone();
            let shutdown = shutdown.clone();

            tracker.spawn(
                async move {
                    let _connected = shared.handler.metrics().connection();

                    match shared.serve(stream, shutdown).await {
                        Ok(()) => tracing::info!("Connection stopped"),
                        Err(err) if err.is_cancelled() => tracing::info!("Connection stopped: {err}"),
                        Err(err) => tracing::warn!("Connection stopped: {err}"),
                    }
                }
                .instrument(span),
            );
        }

        tracing::info!("Waiting for all connections to stop...");
        tracker.close();
        tracker.wait().await;

        Ok(())
    }
}

impl<B: Backend> Shared<B> {
    async fn serve(&self, stream: TcpStream, shutdown: CancellationToken) -> Result<()> {
        stream.set_nodelay(true)?;

        let stop = stop_signal(shutdown, self.config.test_conn_timeout);

        match &self.tls {
            #[cfg(feature = "tls")]
            Some(acceptor) => {
                let stream = acceptor.accept(stream).await.context(|| "TLS handshake")?;
                self.session(stream, stop).await
            },
            #[cfg(not(feature = "tls"))]
            Some(never) => match *never {},
            None => self.session(stream, stop).await,
        }
    }

    async fn session<S>(&self, io: S, stop: impl Future<Output = ()> + Send) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let proxy = match self.config.mode.forwards() {
            true => Some(Proxy::connect(&self.config.proxy_addr).await?),
            false => None,
        };

        Session::new(self.config.mode, self.handler.clone(), io, proxy).run(stop).await
    }
}

/// Completes [`SHUTDOWN_GRACE`] after `shutdown`, or after the optional `timeout`.
async fn stop_signal(shutdown: CancellationToken, timeout: Option<Duration>) {
    let graceful = async {
        shutdown.cancelled().await;
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    };
    let expired = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        () = graceful => {},
        () = expired => {},
    }
}

#[cfg(feature = "tls")]
fn tls_acceptor(config: &Config) -> Result<Acceptor> {
    tracing::warn!("The current TLS implementation is not secure.");
    super::tls::acceptor(&config.tls_cert, &config.tls_key)
}

#[cfg(not(feature = "tls"))]
fn tls_acceptor(_: &Config) -> Result<Acceptor> {
    Err(crate::config::ConfigError::new("TLS is enabled, but docwire is built without the `tls` feature").into())
}

impl<B> std::fmt::Debug for Listener<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("tcp", &self.tcp)
            .field("mode", &self.shared.config.mode)
            .field("tls", &self.shared.tls.is_some())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stop_after_grace() {
        let shutdown = CancellationToken::new();
        let stop = tokio::spawn(stop_signal(shutdown.clone(), None));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!stop.is_finished());

        shutdown.cancel();
        tokio::time::sleep(SHUTDOWN_GRACE - Duration::from_millis(1)).await;
        assert!(!stop.is_finished());
        tokio::time::sleep(Duration::from_millis(2)).await;
        stop.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_timeout() {
        let shutdown = CancellationToken::new();
        let stop = stop_signal(shutdown, Some(Duration::from_millis(250)));
        tokio::time::timeout(Duration::from_millis(300), stop).await.unwrap();
    }
}
