use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{HEADER_LEN, MAX_MESSAGE_LEN, MsgBody, MsgHeader, ProtocolError, decode_message, encode_message};
use crate::{Result, common::verbose};

const DEFAULT_BUF_CAPACITY: usize = 1024;

/// Buffered stream of wire messages.
#[derive(Debug)]
pub struct WireStream<S> {
    io: S,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl<S> WireStream<S> {
    pub fn new(io: S) -> WireStream<S> {
        Self {
            io,
            read_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            write_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.io
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.io
    }

    /// Buffer a message, caller must [`flush`][WireStream::flush] afterwards.
    ///
    /// Returns the header as written, with its computed length.
    pub fn send(&mut self, header: &MsgHeader, body: &MsgBody) -> MsgHeader {
        encode_message(header, body, &mut self.write_buf)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> WireStream<S> {
    /// Receive one message.
    ///
    /// Returns `None` when the peer closed the stream at a message boundary,
    /// a close in the middle of a message is an error.
    pub async fn recv(&mut self) -> Result<Option<(MsgHeader, MsgBody)>> {
        loop {
            if let Some(mut header) = self.read_buf.get(..HEADER_LEN) {
                let len = header.get_i32_le();
                if len < HEADER_LEN as i32 || len as usize > MAX_MESSAGE_LEN {
                    return Err(ProtocolError::InvalidLength(len).into());
                }

                let len = len as usize;
                if self.read_buf.len() >= len {
                    let frame = self.read_buf.split_to(len).freeze();
                    verbose!("recv frame of {len} bytes");
                    return Ok(Some(decode_message(frame)?));
                }

                self.read_buf.reserve(len - self.read_buf.len());
            }

            let n = self.io.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return match self.read_buf.is_empty() {
                    true => Ok(None),
                    false => Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into()),
                };
            }
        }
    }

    /// Write all buffered messages to the underlying io.
    pub async fn flush(&mut self) -> Result<()> {
        self.io.write_all_buf(&mut self.write_buf).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Send one message and wait for its response.
    pub async fn round_trip(&mut self, header: &MsgHeader, body: &MsgBody) -> Result<(MsgHeader, MsgBody)> {
        self.send(header, body);
        self.flush().await?;
        match self.recv().await? {
            Some(message) => Ok(message),
            None => Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into()),
        }
    }

    /// Flush and shutdown the write half.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.flush().await?;
        self.io.shutdown().await?;
        Ok(())
    }
}
