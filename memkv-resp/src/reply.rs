//! RESP reply types and their wire encoding.
//!
//! Each variant here corresponds to one of the distinct reply shapes the
//! wire protocol distinguishes by leading byte; encoding is a direct,
//! allocation-light byte-exact mapping rather than a generic serializer.

use bytes::{BufMut, Bytes, BytesMut};

const CRLF: &[u8] = b"\r\n";

/// A decoded or constructed RESP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+status\r\n`
    Simple(String),
    /// `-message\r\n`
    Error(String),
    /// `:n\r\n`
    Integer(i64),
    /// `$len\r\n<bytes>\r\n`
    Bulk(Bytes),
    /// `$-1\r\n`
    NullBulk,
    /// `*n\r\n` followed by `n` bulks, `None` elements encoded as null bulk.
    MultiBulk(Vec<Option<Bytes>>),
    /// `*0\r\n`
    EmptyMultiBulk,
    /// `+PONG\r\n`
    Pong,
    /// `+OK\r\n`
    Ok,
    /// No bytes at all; used when a command intentionally sends nothing.
    NoReply,
}

impl Reply {
    /// True if this reply's leading byte is `-` (an error reply).
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Encodes this reply to its exact wire representation.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Reply::Simple(s) => {
                let mut buf = BytesMut::with_capacity(1 + s.len() + 2);
                buf.put_u8(b'+');
                buf.put_slice(s.as_bytes());
                buf.put_slice(CRLF);
                buf.freeze()
            }
            Reply::Error(s) => {
                let mut buf = BytesMut::with_capacity(1 + s.len() + 2);
                buf.put_u8(b'-');
                buf.put_slice(s.as_bytes());
                buf.put_slice(CRLF);
                buf.freeze()
            }
            Reply::Integer(n) => {
                let mut buf = BytesMut::new();
                buf.put_u8(b':');
                buf.put_slice(n.to_string().as_bytes());
                buf.put_slice(CRLF);
                buf.freeze()
            }
            Reply::Bulk(arg) => {
                let mut buf = BytesMut::with_capacity(arg.len() + 16);
                buf.put_u8(b'$');
                buf.put_slice(arg.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                buf.put_slice(arg);
                buf.put_slice(CRLF);
                buf.freeze()
            }
            Reply::NullBulk => Bytes::from_static(b"$-1\r\n"),
            Reply::MultiBulk(args) => {
                let mut buf = BytesMut::new();
                buf.put_u8(b'*');
                buf.put_slice(args.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                for arg in args {
                    match arg {
                        None => buf.put_slice(b"$-1\r\n"),
                        Some(bytes) => {
                            buf.put_u8(b'$');
                            buf.put_slice(bytes.len().to_string().as_bytes());
                            buf.put_slice(CRLF);
                            buf.put_slice(bytes);
                            buf.put_slice(CRLF);
                        }
                    }
                }
                buf.freeze()
            }
            Reply::EmptyMultiBulk => Bytes::from_static(b"*0\r\n"),
            Reply::Pong => Bytes::from_static(b"+PONG\r\n"),
            Reply::Ok => Bytes::from_static(b"+OK\r\n"),
            Reply::NoReply => Bytes::new(),
        }
    }

    /// Convenience constructor for a bulk reply from anything byte-like.
    pub fn bulk(arg: impl Into<Bytes>) -> Self {
        Reply::Bulk(arg.into())
    }

    /// Convenience constructor for a multi-bulk reply of plain strings.
    pub fn multi_bulk_strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Bytes>,
    {
        let args: Vec<Option<Bytes>> = items.into_iter().map(|s| Some(s.into())).collect();
        if args.is_empty() {
            Reply::EmptyMultiBulk
        } else {
            Reply::MultiBulk(args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_status_and_error() {
        assert_eq!(Reply::Ok.to_bytes(), &b"+OK\r\n"[..]);
        assert_eq!(Reply::Pong.to_bytes(), &b"+PONG\r\n"[..]);
        assert_eq!(
            Reply::Error("ERR unknown command".into()).to_bytes(),
            &b"-ERR unknown command\r\n"[..]
        );
    }

    #[test]
    fn integer_and_bulk() {
        assert_eq!(Reply::Integer(42).to_bytes(), &b":42\r\n"[..]);
        assert_eq!(Reply::Integer(-1).to_bytes(), &b":-1\r\n"[..]);
        assert_eq!(
            Reply::bulk(Bytes::from_static(b"hello")).to_bytes(),
            &b"$5\r\nhello\r\n"[..]
        );
        assert_eq!(Reply::NullBulk.to_bytes(), &b"$-1\r\n"[..]);
    }

    #[test]
    fn multi_bulk_with_nil_element() {
        let reply = Reply::MultiBulk(vec![Some(Bytes::from_static(b"a")), None]);
        assert_eq!(reply.to_bytes(), &b"*2\r\n$1\r\na\r\n$-1\r\n"[..]);
        assert_eq!(Reply::EmptyMultiBulk.to_bytes(), &b"*0\r\n"[..]);
    }
}
