use std::{
    collections::VecDeque,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    oneshot,
};

use super::PoolConfig;
use crate::{ErrorKind, Result, common::verbose, connection::Connection};

#[derive(Clone)]
pub struct WorkerHandle {
    send: UnboundedSender<WorkerMessage>,
}

impl WorkerHandle {
    pub fn new(config: PoolConfig) -> (Self, WorkerFuture) {
        let (send, recv) = mpsc::unbounded_channel();
        (
            Self { send },
            WorkerFuture {
                config,
                actives: 0,
                conns: VecDeque::new(),
                recv,
                queue: VecDeque::with_capacity(1),
                connecting: None,
                closing: Vec::new(),
                closed: Vec::new(),
                is_closed: false,
            },
        )
    }

    pub async fn acquire(&self) -> Result<Connection> {
        let (tx, rx) = oneshot::channel();
        if self.send.send(WorkerMessage::Acquire(tx)).is_err() {
            return Err(ErrorKind::Cancelled.into());
        }
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ErrorKind::Cancelled.into()),
        }
    }

    pub fn release(&self, conn: Connection) {
        // worker gone, the connection is simply dropped
        let _ = self.send.send(WorkerMessage::Release(conn));
    }

    pub async fn close(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send.send(WorkerMessage::Close(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WorkerHandle")
    }
}

type AcquireSend = oneshot::Sender<Result<Connection>>;

enum WorkerMessage {
    Acquire(AcquireSend),
    Release(Connection),
    Close(oneshot::Sender<()>),
}

type ConnectFuture = Pin<Box<dyn Future<Output = Result<Connection>> + Send + 'static>>;
type CloseFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

pub struct WorkerFuture {
    config: PoolConfig,

    actives: usize,
    /// - new and released conn is pushed front
    /// - acquire conn is poped front
    ///
    /// front queue is the most fresh connection
    conns: VecDeque<Connection>,
    queue: VecDeque<AcquireSend>,

    recv: UnboundedReceiver<WorkerMessage>,

    connecting: Option<ConnectFuture>,
    closing: Vec<CloseFuture>,
    /// `Pool::close` callers, notified when all idle connections are terminated
    closed: Vec<oneshot::Sender<()>>,
    is_closed: bool,
}

/// Handle connection that is not yet in idle queue.
fn new_connection(
    mut conn: Connection,
    queue: &mut VecDeque<AcquireSend>,
    conns: &mut VecDeque<Connection>,
) {
    while let Some(send) = queue.pop_front() {
        if let Err(Ok(_conn)) = send.send(Ok(conn)) {
            conn = _conn;
            continue;
        }

        return;
    }

    conns.push_front(conn);
}

fn close(conn: Connection) -> CloseFuture {
    Box::pin(conn.close())
}

impl WorkerFuture {
    fn connect(&self) -> ConnectFuture {
        let config = self.config.conn.clone();
        Box::pin(async move { Connection::connect(&config).await })
    }
}

impl Future for WorkerFuture {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let me = self.as_mut().get_mut();

        macro_rules! tracew {
            ($prefix:literal) => {
                verbose!(
                    "{:11}: Active={}, Idle={}, Connecting={}, Closing={}",
                    $prefix,
                    me.actives,
                    me.conns.len(),
                    me.connecting.is_some() as u8,
                    me.closing.len(),
                );
            };
        }

        // 1. Collect all request upfront
        // 2. Poll any connection futures
        // 3. Try to fulfill Queues

        while let Poll::Ready(msg) = me.recv.poll_recv(cx) {
            let Some(msg) = msg else {
                // all Pools handle are dropped
                return Poll::Ready(())
            };

            match msg {
                WorkerMessage::Acquire(send) => {
                    if me.is_closed {
                        let _ = send.send(Err(ErrorKind::Cancelled.into()));
                        continue;
                    }
                    match me.conns.pop_front() {
                        Some(conn) => {
                            if let Err(Ok(conn)) = send.send(Ok(conn)) {
                                me.conns.push_front(conn);
                            }
                        },
                        None => me.queue.push_back(send),
                    }

                    tracew!("Acquired");
                },
                WorkerMessage::Release(conn) => {
                    if conn.is_broken() {
                        me.actives -= 1;
                        drop(conn);
                    } else if me.is_closed {
                        me.closing.push(close(conn));
                    } else {
                        new_connection(conn, &mut me.queue, &mut me.conns);
                    }

                    tracew!("Released");
                },
                WorkerMessage::Close(send) => {
                    me.is_closed = true;
                    me.connecting = None;
                    for acquire in me.queue.drain(..) {
                        let _ = acquire.send(Err(ErrorKind::Cancelled.into()));
                    }
                    me.closing.extend(me.conns.drain(..).map(close));
                    me.closed.push(send);

                    tracew!("Closing");
                },
            }
        }

        if let Some(Poll::Ready(result)) = me.connecting.as_mut().map(|e|e.as_mut().poll(cx)) {
            me.connecting.take();
            match result {
                Ok(conn) => {
                    me.actives += 1;
                    new_connection(conn, &mut me.queue, &mut me.conns);

                    tracew!("New");
                },
                Err(err) => {
                    tracing::error!("failed to connect to backend: {err}");

                    if let Some(send) = me.queue.pop_front() {
                        let _ = send.send(Err(err));
                    }
                },
            }
        }

        me.closing.retain_mut(|fut| match fut.as_mut().poll(cx) {
            Poll::Ready(result) => {
                if let Err(err) = result {
                    tracing::warn!("failed to close backend connection: {err}");
                }
                me.actives -= 1;
                false
            },
            Poll::Pending => true,
        });

        if me.is_closed && me.closing.is_empty() {
            for send in me.closed.drain(..) {
                let _ = send.send(());
            }
        }

        while let Some(send) = me.queue.pop_front() {
            match me.conns.pop_front() {
                Some(conn) => {
                    if let Err(Ok(conn)) = send.send(Ok(conn)) {
                        me.conns.push_front(conn);
                    }
                },
                None => {
                    me.queue.push_front(send);
                    if me.connecting.is_none() && me.actives < me.config.max_conn {
                        let mut connecting = me.connect();
                        // connect future must be polled once to register the waker
                        match connecting.as_mut().poll(cx) {
                            Poll::Ready(Ok(conn)) => {
                                me.actives += 1;
                                new_connection(conn, &mut me.queue, &mut me.conns);
                                continue;
                            },
                            Poll::Ready(Err(err)) => {
                                tracing::error!("failed to connect to backend: {err}");
                                if let Some(send) = me.queue.pop_front() {
                                    let _ = send.send(Err(err));
                                }
                                continue;
                            },
                            Poll::Pending => me.connecting = Some(connecting),
                        }
                    }
                    break;
                },
            }
        }

        verbose!("{:-<11}: Backpressured: {}", "", me.queue.len());

        Poll::Pending
    }
}
