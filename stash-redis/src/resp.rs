//! RESP wire codec: command encoding and reply decoding.
//!
//! Commands are written as arrays of bulk strings. Decoding distinguishes
//! an incomplete frame (more bytes needed, `Ok(None)`) from a malformed one
//! (`Err`), which is what the transport's read loop keys off.

use bytes::BytesMut;

use crate::error::{RedisError, RedisResult};
use crate::reply::Reply;

/// Encode one command as a RESP array of bulk strings.
pub fn encode_command(args: &[&[u8]], buf: &mut BytesMut) {
    buf.extend_from_slice(b"*");
    buf.extend_from_slice(args.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    for arg in args {
        buf.extend_from_slice(b"$");
        buf.extend_from_slice(arg.len().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
}

/// Try to decode one reply from the front of `buf`.
///
/// Returns the reply and the number of bytes consumed, or `None` when the
/// frame is not complete yet.
pub fn decode(buf: &[u8]) -> RedisResult<Option<(Reply, usize)>> {
    let mut parser = Parser { buf, pos: 0 };
    match parser.reply() {
        Ok(reply) => Ok(Some((reply, parser.pos))),
        Err(Incomplete) => Ok(None),
        Err(Malformed(msg)) => Err(RedisError::Protocol(msg)),
    }
}

use ParseError::{Incomplete, Malformed};

enum ParseError {
    Incomplete,
    Malformed(String),
}

struct Parser<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn reply(&mut self) -> Result<Reply, ParseError> {
        let type_byte = *self.buf.get(self.pos).ok_or(Incomplete)?;
        self.pos += 1;
        match type_byte {
            b'+' => Ok(Reply::Simple(self.line()?.to_string())),
            b'-' => Ok(Reply::Error(self.line()?.to_string())),
            b':' => {
                let line = self.line()?;
                line.parse()
                    .map(Reply::Int)
                    .map_err(|_| Malformed(format!("invalid integer: {line}")))
            }
            b'$' => self.bulk(),
            b'*' => {
                let count = self.length()?;
                match count {
                    None => Ok(Reply::Null),
                    Some(count) => {
                        let mut items = Vec::with_capacity(count);
                        for _ in 0..count {
                            items.push(self.reply()?);
                        }
                        Ok(Reply::Array(items))
                    }
                }
            }
            b'%' => {
                let count = self.length()?.unwrap_or(0);
                let mut pairs = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = self.reply()?;
                    let value = self.reply()?;
                    pairs.push((key, value));
                }
                Ok(Reply::Map(pairs))
            }
            b'_' => {
                self.line()?;
                Ok(Reply::Null)
            }
            b'#' => match self.line()? {
                "t" => Ok(Reply::Bool(true)),
                "f" => Ok(Reply::Bool(false)),
                other => Err(Malformed(format!("invalid boolean: {other}"))),
            },
            b',' => {
                let line = self.line()?;
                line.parse()
                    .map(Reply::Double)
                    .map_err(|_| Malformed(format!("invalid double: {line}")))
            }
            other => Err(Malformed(format!("unknown reply type: 0x{other:02x}"))),
        }
    }

    fn bulk(&mut self) -> Result<Reply, ParseError> {
        let len = match self.length()? {
            None => return Ok(Reply::Null),
            Some(len) => len,
        };
        if self.buf.len() < self.pos + len + 2 {
            return Err(Incomplete);
        }
        let data = self.buf[self.pos..self.pos + len].to_vec();
        if &self.buf[self.pos + len..self.pos + len + 2] != b"\r\n" {
            return Err(Malformed("bulk payload not terminated".into()));
        }
        self.pos += len + 2;
        Ok(Reply::Bulk(data))
    }

    /// A length line; `None` is the RESP2 null marker (-1).
    fn length(&mut self) -> Result<Option<usize>, ParseError> {
        let line = self.line()?;
        let n: i64 = line
            .parse()
            .map_err(|_| Malformed(format!("invalid length: {line}")))?;
        if n < 0 {
            Ok(None)
        } else {
            Ok(Some(n as usize))
        }
    }

    fn line(&mut self) -> Result<&str, ParseError> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or(Incomplete)?;
        let line = std::str::from_utf8(&rest[..end])
            .map_err(|_| Malformed("line is not valid utf-8".into()))?;
        self.pos += end + 2;
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(bytes: &[u8]) -> (Reply, usize) {
        decode(bytes).unwrap().expect("complete frame")
    }

    #[test]
    fn test_encode_set_with_expiry() {
        let mut buf = BytesMut::new();
        encode_command(&[b"SET", b"k", b"v", b"EX", b"60"], &mut buf);
        assert_eq!(
            &buf[..],
            b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nEX\r\n$2\r\n60\r\n"
        );
    }

    #[test]
    fn test_decode_simple() {
        let (reply, consumed) = one(b"+OK\r\n");
        assert_eq!(reply, Reply::Simple("OK".into()));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_decode_error() {
        let (reply, _) = one(b"-ERR unknown command\r\n");
        assert_eq!(reply, Reply::Error("ERR unknown command".into()));
    }

    #[test]
    fn test_decode_integer() {
        assert_eq!(one(b":1000\r\n").0, Reply::Int(1000));
    }

    #[test]
    fn test_decode_bulk() {
        assert_eq!(one(b"$5\r\nhello\r\n").0, Reply::Bulk(b"hello".to_vec()));
    }

    #[test]
    fn test_decode_null_bulk() {
        assert_eq!(one(b"$-1\r\n").0, Reply::Null);
    }

    #[test]
    fn test_decode_array() {
        let (reply, _) = one(b"*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
        assert_eq!(
            reply,
            Reply::Array(vec![
                Reply::Bulk(b"foo".to_vec()),
                Reply::Bulk(b"bar".to_vec())
            ])
        );
    }

    #[test]
    fn test_decode_resp3_extras() {
        assert_eq!(one(b"#t\r\n").0, Reply::Bool(true));
        assert_eq!(one(b"_\r\n").0, Reply::Null);
        assert_eq!(one(b",1.25\r\n").0, Reply::Double(1.25));
    }

    #[test]
    fn test_incomplete_frames_ask_for_more() {
        assert!(decode(b"").unwrap().is_none());
        assert!(decode(b"$5\r\nhel").unwrap().is_none());
        assert!(decode(b"*2\r\n$3\r\nfoo\r\n").unwrap().is_none());
        assert!(decode(b"+OK").unwrap().is_none());
    }

    #[test]
    fn test_malformed_frames_error() {
        assert!(decode(b"?what\r\n").is_err());
        assert!(decode(b":abc\r\n").is_err());
        assert!(decode(b"$3\r\nfooXY").is_err());
    }

    #[test]
    fn test_consumed_leaves_pipelined_tail() {
        let (reply, consumed) = one(b"+OK\r\n:5\r\n");
        assert_eq!(reply, Reply::Simple("OK".into()));
        assert_eq!(consumed, 5);
    }
}
