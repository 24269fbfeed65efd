//! Streaming RESP decoder.
//!
//! [`parse_stream`] turns any `AsyncBufRead` into a lazy stream of
//! [`Payload`]s. Protocol errors (a malformed length header, a missing
//! `\r`) are recoverable: the stream yields an error payload and keeps
//! going on the assumption the next line resynchronizes. An IO error (a
//! short read mid-frame, EOF mid-header) is not: the stream yields one
//! final error payload and ends.

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use memkv_errors::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::reply::Reply;

/// One decoded unit from the stream: either a reply the client sent (for
/// inline/array commands this is a `MultiBulk`) or an error describing why
/// decoding failed.
#[derive(Debug)]
pub enum Payload {
    Reply(Reply),
    Err(Error),
}

/// Wraps `reader` in a stream of [`Payload`]. The stream ends after the
/// first fatal (IO) error; protocol errors are yielded but do not end it.
pub fn parse_stream<R>(reader: R) -> impl Stream<Item = Payload>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        let payload = read_one(&mut reader).await;
        let fatal = matches!(&payload, Payload::Err(e) if e.is_fatal());
        if fatal {
            Some((payload, None))
        } else {
            Some((payload, Some(reader)))
        }
    })
}

async fn read_one<R: AsyncBufRead + Unpin>(reader: &mut R) -> Payload {
    let line = match read_line_or_header(reader).await {
        Ok(line) => line,
        Err(e) => return Payload::Err(e),
    };
    let trimmed = strip_crlf(&line);
    if trimmed.is_empty() {
        return Payload::Err(Error::Protocol("protocol error: empty line".into()));
    }
    match trimmed[0] {
        b'+' | b'-' | b':' => parse_single_line(trimmed),
        b'$' => parse_bulk_string(trimmed, reader).await,
        b'*' => parse_multi_bulk(trimmed, reader).await,
        _ => {
            let args: Vec<Option<Bytes>> = trimmed
                .split(|b| *b == b' ')
                .map(|part| Some(Bytes::copy_from_slice(part)))
                .collect();
            Payload::Reply(if args.is_empty() {
                Reply::EmptyMultiBulk
            } else {
                Reply::MultiBulk(args)
            })
        }
    }
}

fn strip_crlf(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r\n").unwrap_or(line)
}

/// Reads one line terminated by `\n`. Binary-unsafe callers never read raw
/// payload bytes this way; this is only used for headers and single-line
/// replies, which are never binary.
async fn read_line_or_header<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).await.map_err(Error::Io)?;
    if n == 0 {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed",
        )));
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(Error::Protocol(format!(
            "protocol error: {}",
            String::from_utf8_lossy(&buf)
        )));
    }
    Ok(buf)
}

fn parse_single_line(line: &[u8]) -> Payload {
    match line[0] {
        b'+' => Payload::Reply(Reply::Simple(String::from_utf8_lossy(&line[1..]).into_owned())),
        b'-' => Payload::Reply(Reply::Error(String::from_utf8_lossy(&line[1..]).into_owned())),
        b':' => match std::str::from_utf8(&line[1..]).ok().and_then(|s| s.parse::<i64>().ok()) {
            Some(code) => Payload::Reply(Reply::Integer(code)),
            None => Payload::Err(Error::Protocol(format!(
                "protocol error--illegal number: {}",
                String::from_utf8_lossy(line)
            ))),
        },
        _ => unreachable!("caller already matched on first byte"),
    }
}

async fn parse_bulk_string<R: AsyncBufRead + Unpin>(header: &[u8], reader: &mut R) -> Payload {
    let len = match std::str::from_utf8(&header[1..]).ok().and_then(|s| s.parse::<i64>().ok()) {
        Some(n) if n >= -1 => n,
        _ => {
            return Payload::Err(Error::Protocol(format!(
                "protocol error--illegal number: {}",
                String::from_utf8_lossy(header)
            )))
        }
    };
    if len == -1 {
        return Payload::Reply(Reply::NullBulk);
    }
    let mut body = vec![0u8; len as usize + 2];
    if let Err(e) = reader.read_exact(&mut body).await {
        return Payload::Err(Error::Io(e));
    }
    body.truncate(body.len() - 2);
    Payload::Reply(Reply::Bulk(Bytes::from(body)))
}

async fn parse_multi_bulk<R: AsyncBufRead + Unpin>(header: &[u8], reader: &mut R) -> Payload {
    let expected = match std::str::from_utf8(&header[1..]).ok().and_then(|s| s.parse::<i64>().ok()) {
        Some(n) if n >= 0 => n,
        _ => {
            return Payload::Err(Error::Protocol(format!(
                "protocol error--illegal number: {}",
                String::from_utf8_lossy(header)
            )))
        }
    };
    if expected == 0 {
        return Payload::Reply(Reply::EmptyMultiBulk);
    }
    let mut elems = Vec::with_capacity(expected as usize);
    for _ in 0..expected {
        let mut bulk_header = Vec::new();
        if let Err(e) = reader.read_until(b'\n', &mut bulk_header).await {
            return Payload::Err(Error::Io(e));
        }
        if bulk_header.len() < 4 || bulk_header[bulk_header.len() - 2] != b'\r' || bulk_header[0] != b'$' {
            return Payload::Err(Error::Protocol(format!(
                "protocol error--illegal BulkString header: {}",
                String::from_utf8_lossy(&bulk_header)
            )));
        }
        let len_slice = &bulk_header[1..bulk_header.len() - 2];
        let bulk_len = match std::str::from_utf8(len_slice).ok().and_then(|s| s.parse::<i64>().ok()) {
            Some(n) if n >= -1 => n,
            _ => {
                return Payload::Err(Error::Protocol(format!(
                    "protocol error--illegal number: {}",
                    String::from_utf8_lossy(&bulk_header)
                )))
            }
        };
        if bulk_len == -1 {
            elems.push(None);
            continue;
        }
        let mut body = vec![0u8; bulk_len as usize + 2];
        if let Err(e) = reader.read_exact(&mut body).await {
            return Payload::Err(Error::Io(e));
        }
        body.truncate(body.len() - 2);
        elems.push(Some(Bytes::from(body)));
    }
    Payload::Reply(Reply::MultiBulk(elems))
}
