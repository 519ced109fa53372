//! Relational backend connection.
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::{
    Result,
    common::verbose,
    net::Socket,
    postgres::{Auth, BackendMessage, FrontendMessage, ProtocolError, UnsupportedAuth, md5_password},
    row::Rows,
};

mod config;

pub use config::Config;

const DEFAULT_BUF_CAPACITY: usize = 1024;

/// Single connection to the relational backend.
#[derive(Debug)]
pub struct Connection {
    socket: Socket,
    read_buf: BytesMut,
    write_buf: BytesMut,
    /// Messages until `ReadyForQuery` must be discarded before the next query.
    sync_pending: bool,
    broken: bool,
}

impl Connection {
    /// Connect and perform startup.
    pub async fn connect(config: &Config) -> Result<Connection> {
        let socket = match &config.socket {
            Some(dir) => Socket::connect_socket(&format!("{dir}/.s.PGSQL.{}", config.port)).await?,
            None => Socket::connect_tcp(&config.host, config.port).await?,
        };

        let mut conn = Self {
            socket,
            read_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            write_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            sync_pending: false,
            broken: false,
        };

        conn.startup(config).await?;

        Ok(conn)
    }

    /// Perform a startup message.
    ///
    /// <https://www.postgresql.org/docs/17/protocol-flow.html#PROTOCOL-FLOW-START-UP>
    async fn startup(&mut self, config: &Config) -> Result<()> {
        self.send(FrontendMessage::Startup {
            user: &config.user,
            database: &config.dbname,
            application_name: "docwire",
        });
        self.flush().await?;

        // cleartext and md5 need at most one password round
        loop {
            match self.recv().await? {
                BackendMessage::Auth(Auth::Ok) => break,
                BackendMessage::Auth(Auth::Cleartext) => {
                    self.send(FrontendMessage::Password(&config.pass));
                    self.flush().await?;
                },
                BackendMessage::Auth(Auth::Md5 { salt }) => {
                    let password = md5_password(&config.user, &config.pass, salt);
                    self.send(FrontendMessage::Password(&password));
                    self.flush().await?;
                },
                BackendMessage::Auth(Auth::Unsupported(method)) => Err(UnsupportedAuth { method })?,
                BackendMessage::Error(e) => Err(e)?,
                f => Err(ProtocolError::unexpected_phase(f.msgtype(), "authentication"))?,
            }
        }

        // parameters and key data until ReadyForQuery
        loop {
            match self.recv().await? {
                BackendMessage::Ready => break,
                BackendMessage::KeyData => {},
                BackendMessage::Parameter { name: _name, value: _value } => {
                    verbose!("{_name}: {_value}");
                },
                BackendMessage::NegotiateVersion { minor } => {
                    tracing::debug!("backend negotiated protocol minor version {minor}")
                },
                BackendMessage::Error(e) => Err(e)?,
                f => Err(ProtocolError::unexpected_phase(f.msgtype(), "startup"))?,
            }
        }

        Ok(())
    }

    /// Perform a simple query, all rows are buffered.
    ///
    /// <https://www.postgresql.org/docs/current/protocol-flow.html#PROTOCOL-FLOW-SIMPLE-QUERY>
    pub async fn simple_query(&mut self, sql: &str) -> Result<Rows> {
        self.ready().await?;

        verbose!("simple query: {sql}");

        self.send(FrontendMessage::Query(sql));
        self.sync_pending = true;
        self.flush().await?;

        let mut rows = Rows::default();
        let mut error = None;

        loop {
            match self.recv().await? {
                BackendMessage::Ready => {
                    self.sync_pending = false;
                    break
                },
                BackendMessage::RowDescription { fields, body } => rows.describe(fields, body),
                BackendMessage::DataRow { columns, body } => rows.push(columns, body)?,
                BackendMessage::Complete { tag } => rows.complete(&tag),
                BackendMessage::EmptyQuery => {},
                // the query string is aborted, ReadyForQuery still follows
                BackendMessage::Error(e) => error = Some(e),
                f => Err(ProtocolError::unexpected_phase(f.msgtype(), "simple query"))?,
            }
        }

        match error {
            Some(error) => Err(error.into()),
            None => Ok(rows),
        }
    }

    /// Discard messages left by an interrupted query.
    async fn ready(&mut self) -> Result<()> {
        if !self.write_buf.is_empty() {
            self.flush().await?;
        }
        while self.sync_pending {
            if let BackendMessage::Ready = self.recv().await? {
                self.sync_pending = false;
            }
        }
        Ok(())
    }

    /// Returns `true` if io or protocol failed, the connection cannot be reused.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Send `Terminate` and shutdown the socket.
    pub async fn close(mut self) -> Result<()> {
        self.send(FrontendMessage::Terminate);
        self.flush().await?;
        self.socket.shutdown().await?;
        Ok(())
    }

    fn send(&mut self, message: FrontendMessage) {
        message.encode(&mut self.write_buf);
    }

    async fn flush(&mut self) -> Result<()> {
        if let Err(err) = self.socket.write_all_buf(&mut self.write_buf).await {
            self.broken = true;
            return Err(err.into());
        }
        Ok(())
    }

    /// Receive a backend message, `NoticeResponse` is logged and skipped.
    async fn recv(&mut self) -> Result<BackendMessage> {
        match self.recv_inner().await {
            Ok(ok) => Ok(ok),
            Err(err) => {
                self.broken = true;
                Err(err)
            },
        }
    }

    async fn recv_inner(&mut self) -> Result<BackendMessage> {
        loop {
            if let Some(mut header) = self.read_buf.get(..5) {
                let msgtype = header.get_u8();
                let len = header.get_i32();
                if len < 4 {
                    Err(ProtocolError::Malformed(crate::bson::DecodeError::InvalidLength(len)))?;
                }

                let len = len as usize;
                if self.read_buf.len() - 1 >= len {
                    self.read_buf.advance(5);
                    let body = self.read_buf.split_to(len - 4).freeze();

                    match BackendMessage::decode(msgtype, body)? {
                        BackendMessage::Notice(notice) => tracing::warn!("backend notice: {notice}"),
                        message => return Ok(message),
                    }
                    continue;
                }

                self.read_buf.reserve(1 + len - self.read_buf.len());
            }

            if self.socket.read_buf(&mut self.read_buf).await? == 0 {
                Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof))?;
            }
        }
    }
}
