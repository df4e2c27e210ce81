//! Async TCP connection speaking RESP.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{RedisError, RedisResult};
use crate::reply::Reply;
use crate::resp;

/// One TCP connection to a Redis server.
pub struct Connection {
    stream: TcpStream,
    read_buf: BytesMut,
}

impl Connection {
    pub async fn connect(addr: &str) -> RedisResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| RedisError::Connection(format!("{addr}: {e}")))?;
        Ok(Self {
            stream,
            read_buf: BytesMut::with_capacity(4096),
        })
    }

    /// Send one command and wait for its reply. Server `-ERR` replies come
    /// back as `RedisError::Server`.
    pub async fn command(&mut self, args: &[&[u8]]) -> RedisResult<Reply> {
        let mut out = BytesMut::with_capacity(64);
        resp::encode_command(args, &mut out);
        self.stream.write_all(&out).await?;

        match self.read_reply().await? {
            Reply::Error(msg) => Err(RedisError::Server(msg)),
            reply => Ok(reply),
        }
    }

    async fn read_reply(&mut self) -> RedisResult<Reply> {
        loop {
            if !self.read_buf.is_empty() {
                if let Some((reply, consumed)) = resp::decode(&self.read_buf)? {
                    self.read_buf.advance(consumed);
                    return Ok(reply);
                }
            }
            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(RedisError::Connection("connection closed by server".into()));
            }
        }
    }
}
