//! CFASL frame encoding and decoding.
//!
//! Every frame is an externalization marker byte followed by an
//! opcode-tagged body:
//!
//! ```text
//! +--------+--------+----------------------+
//! | marker | opcode | value bytes          |
//! | 0x33   | 1 byte | opcode-dependent     |
//! +--------+--------+----------------------+
//! ```
//!
//! Frames are length-implicit: the body's own structure (width opcodes,
//! length prefixes, element counts) determines where it ends. All multi-byte
//! integers are big-endian.
//!
//! Integers choose the narrowest of the 8/16/24/32-bit encodings by
//! magnitude, with separate positive/negative opcodes; wider magnitudes use
//! the length-prefixed bignum opcodes. Strings, symbols, and keywords are
//! length-prefixed UTF-8. Lists carry an element count; dotted pairs carry
//! the leading elements plus an explicit final cdr. Constants travel as raw
//! 16-byte GUIDs.

use cyc_domain::{CycError, CycValue, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Externalization marker — the first byte of every frame.
pub const EXTERNALIZATION: u8 = 0x33;

// Integer opcodes, positive/negative by magnitude bucket.
const OP_P8: u8 = 0;
const OP_N8: u8 = 1;
const OP_P16: u8 = 2;
const OP_N16: u8 = 3;
const OP_P24: u8 = 4;
const OP_N24: u8 = 5;
const OP_P32: u8 = 6;
const OP_N32: u8 = 7;

const OP_FLOAT: u8 = 8;
const OP_KEYWORD: u8 = 10;
const OP_SYMBOL: u8 = 11;
const OP_NIL: u8 = 12;
const OP_LIST: u8 = 13;
const OP_STRING: u8 = 15;
const OP_DOTTED: u8 = 17;
const OP_P_BIGNUM: u8 = 23;
const OP_N_BIGNUM: u8 = 24;
const OP_GUID: u8 = 25;

// ---

/// Whether `opcode` begins a number body (used by compact-id
/// classification, which must not decode the full value).
pub(crate) fn opcode_is_number(opcode: u8) -> bool {
    matches!(opcode, OP_P8..=OP_FLOAT | OP_P_BIGNUM | OP_N_BIGNUM)
}

/// Whether `opcode` begins a string body.
pub(crate) fn opcode_is_string(opcode: u8) -> bool {
    opcode == OP_STRING
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a value as a complete frame (marker + body).
pub fn encode(value: &CycValue) -> Vec<u8> {
    // ---
    let mut buf = Vec::with_capacity(16);
    buf.push(EXTERNALIZATION);
    encode_body(&mut buf, value);
    buf
}

// ---

/// Encode a frame for the compact-id scheme, which admits only strings and
/// numbers.
pub fn encode_literal(value: &CycValue) -> Result<Vec<u8>> {
    // ---
    if !value.is_compactable_literal() {
        return Err(CycError::InvalidArgument(format!(
            "not a string or number literal: {value}"
        )));
    }
    Ok(encode(value))
}

// ---

fn encode_body(buf: &mut Vec<u8>, value: &CycValue) {
    // ---
    match value {
        CycValue::Nil => buf.push(OP_NIL),

        CycValue::Int(v) => encode_int(buf, *v),

        CycValue::Float(v) => {
            buf.push(OP_FLOAT);
            buf.extend_from_slice(&v.to_be_bytes());
        }

        CycValue::String(s) => encode_text(buf, OP_STRING, s),
        CycValue::Symbol(s) => encode_text(buf, OP_SYMBOL, s),
        CycValue::Keyword(s) => encode_text(buf, OP_KEYWORD, s),

        CycValue::Guid(g) => {
            buf.push(OP_GUID);
            buf.extend_from_slice(g.as_bytes());
        }

        CycValue::List(items) => {
            buf.push(OP_LIST);
            buf.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                encode_body(buf, item);
            }
        }

        CycValue::Dotted(items, cdr) => {
            buf.push(OP_DOTTED);
            buf.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                encode_body(buf, item);
            }
            encode_body(buf, cdr);
        }
    }
}

// ---

fn encode_text(buf: &mut Vec<u8>, opcode: u8, s: &str) {
    // ---
    buf.push(opcode);
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

// ---

/// Pick the narrowest width bucket for the magnitude; sign selects the
/// opcode row.
fn encode_int(buf: &mut Vec<u8>, v: i64) {
    // ---
    let negative = v < 0;
    let magnitude = v.unsigned_abs();

    let (opcode, width) = match magnitude {
        m if m <= 0xFF => (if negative { OP_N8 } else { OP_P8 }, 1usize),
        m if m <= 0xFFFF => (if negative { OP_N16 } else { OP_P16 }, 2),
        m if m <= 0xFF_FFFF => (if negative { OP_N24 } else { OP_P24 }, 3),
        m if m <= 0xFFFF_FFFF => (if negative { OP_N32 } else { OP_P32 }, 4),
        _ => {
            // Bignum: length-prefixed big-endian magnitude, minimal bytes.
            let bytes = magnitude.to_be_bytes();
            let skip = bytes.iter().take_while(|b| **b == 0).count();
            buf.push(if negative { OP_N_BIGNUM } else { OP_P_BIGNUM });
            buf.push((bytes.len() - skip) as u8);
            buf.extend_from_slice(&bytes[skip..]);
            return;
        }
    };

    buf.push(opcode);
    let bytes = magnitude.to_be_bytes();
    buf.extend_from_slice(&bytes[bytes.len() - width..]);
}

// ---------------------------------------------------------------------------
// Decoding (in-memory)
// ---------------------------------------------------------------------------

/// Decode a complete frame. Rejects a missing marker, truncation, and
/// trailing bytes.
pub fn decode(frame: &[u8]) -> Result<CycValue> {
    // ---
    let mut cur = Cursor { buf: frame, pos: 0 };

    if cur.u8()? != EXTERNALIZATION {
        return Err(CycError::InvalidArgument(
            "frame does not start with the externalization marker".into(),
        ));
    }

    let value = decode_body(&mut cur)?;

    if cur.pos != frame.len() {
        return Err(CycError::InvalidArgument(format!(
            "{} trailing bytes after frame",
            frame.len() - cur.pos
        )));
    }

    Ok(value)
}

// ---

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    // ---
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        // ---
        if self.pos + n > self.buf.len() {
            return Err(CycError::InvalidArgument("truncated frame".into()));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn magnitude(&mut self, width: usize) -> Result<u64> {
        // ---
        let mut out = 0u64;
        for b in self.take(width)? {
            out = (out << 8) | u64::from(*b);
        }
        Ok(out)
    }
}

// ---

fn decode_body(cur: &mut Cursor<'_>) -> Result<CycValue> {
    // ---
    let opcode = cur.u8()?;
    match opcode {
        OP_P8 | OP_P16 | OP_P24 | OP_P32 => {
            let width = 1 + (opcode / 2) as usize;
            Ok(CycValue::Int(cur.magnitude(width)? as i64))
        }
        OP_N8 | OP_N16 | OP_N24 | OP_N32 => {
            let width = 1 + (opcode / 2) as usize;
            Ok(CycValue::Int(-(cur.magnitude(width)? as i64)))
        }

        OP_P_BIGNUM | OP_N_BIGNUM => {
            let len = cur.u8()? as usize;
            if len > 8 {
                return Err(CycError::InvalidArgument(format!(
                    "bignum of {len} bytes exceeds this client's 64-bit range"
                )));
            }
            let magnitude = cur.magnitude(len)?;
            if opcode == OP_N_BIGNUM {
                if magnitude > 1u64 << 63 {
                    return Err(CycError::InvalidArgument(
                        "negative bignum exceeds i64::MIN".into(),
                    ));
                }
                // i64::MIN has magnitude exactly 2^63, which negation covers.
                Ok(CycValue::Int((magnitude as i64).wrapping_neg()))
            } else {
                if magnitude > i64::MAX as u64 {
                    return Err(CycError::InvalidArgument(
                        "positive bignum exceeds i64::MAX".into(),
                    ));
                }
                Ok(CycValue::Int(magnitude as i64))
            }
        }

        OP_FLOAT => {
            let b = cur.take(8)?;
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(b);
            Ok(CycValue::Float(f64::from_be_bytes(bytes)))
        }

        OP_STRING => Ok(CycValue::String(decode_text(cur)?)),
        OP_SYMBOL => Ok(CycValue::Symbol(decode_text(cur)?)),
        OP_KEYWORD => Ok(CycValue::Keyword(decode_text(cur)?)),

        OP_NIL => Ok(CycValue::Nil),

        OP_GUID => {
            let b = cur.take(16)?;
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(b);
            Ok(CycValue::Guid(Uuid::from_bytes(bytes)))
        }

        OP_LIST => {
            let count = cur.u32()? as usize;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(decode_body(cur)?);
            }
            Ok(CycValue::List(items))
        }

        OP_DOTTED => {
            let count = cur.u32()? as usize;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(decode_body(cur)?);
            }
            let cdr = decode_body(cur)?;
            Ok(CycValue::Dotted(items, Box::new(cdr)))
        }

        other => Err(CycError::InvalidArgument(format!(
            "unknown opcode 0x{other:02X}"
        ))),
    }
}

// ---

fn decode_text(cur: &mut Cursor<'_>) -> Result<String> {
    // ---
    let len = cur.u32()? as usize;
    let bytes = cur.take(len)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| CycError::InvalidArgument(format!("non-UTF-8 text body: {e}")))
}

// ---------------------------------------------------------------------------
// Frame I/O
// ---------------------------------------------------------------------------

/// Write one frame to `w` and flush it.
pub async fn write_frame<W>(w: &mut W, value: &CycValue) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(value);
    w.write_all(&frame).await?;
    w.flush().await?;
    Ok(())
}

// ---

/// Read one frame from `r`.
///
/// Returns `None` on clean EOF (zero-length read of the marker byte), which
/// signals that the remote side has closed the stream.
pub async fn read_frame<R>(r: &mut R) -> Result<Option<CycValue>>
where
    R: AsyncRead + Unpin + Send,
{
    let mut marker = [0u8; 1];
    match r.read(&mut marker).await {
        Ok(0) => return Ok(None), // clean EOF
        Ok(_) => {}
        Err(e) => return Err(e.into()),
    }

    if marker[0] != EXTERNALIZATION {
        return Err(CycError::InvalidArgument(format!(
            "bad frame marker: expected 0x{EXTERNALIZATION:02X}, got 0x{:02X}",
            marker[0]
        )));
    }

    Ok(Some(read_body(r).await?))
}

// ---

/// Structural read of one body. List and dotted bodies recurse through a
/// boxed future so the async state machine stays sized.
async fn read_body<R>(r: &mut R) -> Result<CycValue>
where
    R: AsyncRead + Unpin + Send,
{
    let opcode = r.read_u8().await?;
    match opcode {
        OP_P8 | OP_P16 | OP_P24 | OP_P32 | OP_N8 | OP_N16 | OP_N24 | OP_N32 => {
            // ---
            let width = 1 + (opcode / 2) as usize;
            let mut buf = [0u8; 4];
            r.read_exact(&mut buf[..width]).await?;
            let mut magnitude = 0u64;
            for b in &buf[..width] {
                magnitude = (magnitude << 8) | u64::from(*b);
            }
            let v = magnitude as i64;
            Ok(CycValue::Int(if opcode % 2 == 1 { -v } else { v }))
        }

        OP_P_BIGNUM | OP_N_BIGNUM => {
            // ---
            let len = r.read_u8().await? as usize;
            if len > 8 {
                return Err(CycError::InvalidArgument(format!(
                    "bignum of {len} bytes exceeds this client's 64-bit range"
                )));
            }
            let mut buf = [0u8; 8];
            r.read_exact(&mut buf[..len]).await?;
            let mut magnitude = 0u64;
            for b in &buf[..len] {
                magnitude = (magnitude << 8) | u64::from(*b);
            }
            if opcode == OP_N_BIGNUM {
                if magnitude > 1u64 << 63 {
                    return Err(CycError::InvalidArgument(
                        "negative bignum exceeds i64::MIN".into(),
                    ));
                }
                Ok(CycValue::Int((magnitude as i64).wrapping_neg()))
            } else if magnitude > i64::MAX as u64 {
                Err(CycError::InvalidArgument(
                    "positive bignum exceeds i64::MAX".into(),
                ))
            } else {
                Ok(CycValue::Int(magnitude as i64))
            }
        }

        OP_FLOAT => {
            let mut bytes = [0u8; 8];
            r.read_exact(&mut bytes).await?;
            Ok(CycValue::Float(f64::from_be_bytes(bytes)))
        }

        OP_STRING => Ok(CycValue::String(read_text(r).await?)),
        OP_SYMBOL => Ok(CycValue::Symbol(read_text(r).await?)),
        OP_KEYWORD => Ok(CycValue::Keyword(read_text(r).await?)),

        OP_NIL => Ok(CycValue::Nil),

        OP_GUID => {
            let mut bytes = [0u8; 16];
            r.read_exact(&mut bytes).await?;
            Ok(CycValue::Guid(Uuid::from_bytes(bytes)))
        }

        OP_LIST => {
            let count = r.read_u32().await? as usize;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(Box::pin(read_body(r)).await?);
            }
            Ok(CycValue::List(items))
        }

        OP_DOTTED => {
            let count = r.read_u32().await? as usize;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(Box::pin(read_body(r)).await?);
            }
            let cdr = Box::pin(read_body(r)).await?;
            Ok(CycValue::Dotted(items, Box::new(cdr)))
        }

        other => Err(CycError::InvalidArgument(format!(
            "unknown opcode 0x{other:02X}"
        ))),
    }
}

// ---

async fn read_text<R>(r: &mut R) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let len = r.read_u32().await? as usize;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes).await?;
    String::from_utf8(bytes)
        .map_err(|e| CycError::InvalidArgument(format!("non-UTF-8 text body: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
