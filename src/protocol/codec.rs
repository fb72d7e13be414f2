use crate::command::Command;
use crate::error::ProxyError;
use crate::protocol::RespValue;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Largest bulk argument accepted from a client (matches Redis' proto-max-bulk-len).
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;
/// Largest argument count in one multibulk request.
const MAX_MULTIBULK_LEN: i64 = 1024 * 1024;
/// Longest inline command or `*`/`$` header line.
const MAX_INLINE_LEN: usize = 64 * 1024;

/// Client-facing framing: decodes commands, encodes replies.
///
/// Accepts RESP2 multibulk requests and inline commands; replies are always
/// written as RESP2. Arguments of a multibulk request are taken off the
/// buffer as soon as each one is complete, so a request arriving in many
/// reads is parsed only once.
#[derive(Debug, Default)]
pub struct RespCodec {
    pending: Option<Multibulk>,
}

#[derive(Debug)]
struct Multibulk {
    remaining: usize,
    args: Vec<Bytes>,
}

impl RespCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for RespCodec {
    type Item = Command;
    type Error = ProxyError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Command>, ProxyError> {
        loop {
            if let Some(pending) = self.pending.as_mut() {
                while pending.remaining > 0 {
                    let Some(arg) = take_bulk(src)? else {
                        return Ok(None);
                    };
                    pending.args.push(arg);
                    pending.remaining -= 1;
                }
                let args = self.pending.take().map(|p| p.args).unwrap_or_default();
                return Ok(Some(Command::new(args)));
            }

            if src.is_empty() {
                return Ok(None);
            }
            if src[0] == b'*' {
                let Some((count, header_len)) = parse_header(&src[..], b'*')? else {
                    return Ok(None);
                };
                src.advance(header_len);
                if count <= 0 {
                    return Ok(Some(Command::default()));
                }
                if count > MAX_MULTIBULK_LEN {
                    return Err(ProxyError::Protocol(format!(
                        "invalid multibulk length: {}",
                        count
                    )));
                }
                self.pending = Some(Multibulk {
                    remaining: count as usize,
                    args: Vec::with_capacity(count.min(1024) as usize),
                });
                continue;
            }

            let Some(end) = find_crlf(&src[..], 0) else {
                if src.len() > MAX_INLINE_LEN {
                    return Err(ProxyError::Protocol("too big inline request".to_string()));
                }
                return Ok(None);
            };
            let line = src.split_to(end.next);
            let args: Vec<Bytes> = line[..end.line_end]
                .split(|b| b.is_ascii_whitespace())
                .filter(|part| !part.is_empty())
                .map(Bytes::copy_from_slice)
                .collect();
            // blank lines are ignored, as redis-server does
            if !args.is_empty() {
                return Ok(Some(Command::new(args)));
            }
        }
    }
}

impl Encoder<RespValue> for RespCodec {
    type Error = ProxyError;

    fn encode(&mut self, item: RespValue, dst: &mut BytesMut) -> Result<(), ProxyError> {
        write_value(&item, dst);
        Ok(())
    }
}

struct LineEnd {
    /// Index of the first byte of the terminator.
    line_end: usize,
    /// Index just past the terminator.
    next: usize,
}

fn find_crlf(src: &[u8], from: usize) -> Option<LineEnd> {
    let offset = src[from..].iter().position(|&b| b == b'\n')?;
    let newline = from + offset;
    let line_end = if newline > from && src[newline - 1] == b'\r' {
        newline - 1
    } else {
        newline
    };
    Some(LineEnd {
        line_end,
        next: newline + 1,
    })
}

/// Parse a `<marker><number>\r\n` header at the start of `src`, returning
/// the number and the header length.
fn parse_header(src: &[u8], marker: u8) -> Result<Option<(i64, usize)>, ProxyError> {
    let Some(&first) = src.first() else {
        return Ok(None);
    };
    if first != marker {
        return Err(ProxyError::Protocol(format!(
            "expected '{}', got '{}'",
            marker as char, first as char
        )));
    }
    let Some(end) = find_crlf(src, 1) else {
        if src.len() > MAX_INLINE_LEN {
            return Err(ProxyError::Protocol("too big request header".to_string()));
        }
        return Ok(None);
    };
    let text = std::str::from_utf8(&src[1..end.line_end])
        .map_err(|_| ProxyError::Protocol("invalid length encoding".to_string()))?;
    let len = text
        .parse::<i64>()
        .map_err(|_| ProxyError::Protocol(format!("invalid length: {}", text)))?;
    Ok(Some((len, end.next)))
}

/// Take one complete `$<len>\r\n<data>\r\n` argument off `src`.
fn take_bulk(src: &mut BytesMut) -> Result<Option<Bytes>, ProxyError> {
    let Some((len, header_len)) = parse_header(&src[..], b'$')? else {
        return Ok(None);
    };
    if len < 0 || len as usize > MAX_BULK_LEN {
        return Err(ProxyError::Protocol(format!("invalid bulk length: {}", len)));
    }
    let len = len as usize;
    let total = header_len + len + 2;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }
    if &src[header_len + len..total] != b"\r\n" {
        return Err(ProxyError::Protocol(
            "bulk string not terminated by CRLF".to_string(),
        ));
    }
    src.advance(header_len);
    let data = src.split_to(len).freeze();
    src.advance(2);
    Ok(Some(data))
}

fn write_value(value: &RespValue, dst: &mut BytesMut) {
    match value {
        RespValue::Null => dst.put_slice(b"$-1\r\n"),
        RespValue::SimpleString(s) => {
            dst.put_u8(b'+');
            put_line(dst, s);
        }
        RespValue::Error(msg) => {
            dst.put_u8(b'-');
            put_line(dst, msg);
        }
        RespValue::Integer(n) => {
            dst.put_u8(b':');
            dst.put_slice(n.to_string().as_bytes());
            dst.put_slice(b"\r\n");
        }
        RespValue::Boolean(flag) => {
            dst.put_slice(if *flag { b":1\r\n" } else { b":0\r\n" });
        }
        RespValue::BulkString(data) => {
            dst.put_u8(b'$');
            dst.put_slice(data.len().to_string().as_bytes());
            dst.put_slice(b"\r\n");
            dst.put_slice(data);
            dst.put_slice(b"\r\n");
        }
        RespValue::Array(items) => {
            dst.put_u8(b'*');
            dst.put_slice(items.len().to_string().as_bytes());
            dst.put_slice(b"\r\n");
            for item in items {
                write_value(item, dst);
            }
        }
    }
}

/// Simple strings and errors cannot carry line breaks.
fn put_line(dst: &mut BytesMut, text: &str) {
    for b in text.bytes() {
        dst.put_u8(if b == b'\r' || b == b'\n' { b' ' } else { b });
    }
    dst.put_slice(b"\r\n");
}
