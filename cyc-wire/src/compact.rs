//! Compact IDs — URL-safe identifiers for string and number literals.
//!
//! A compact ID is the base64url encoding of a single CFASL frame with the
//! trailing `=` padding stripped, safe for embedding in URLs and other
//! identifier positions without contacting the server. Decoding re-pads to
//! a multiple of four characters first.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;

use cyc_domain::{CycError, CycValue, Result};

use crate::cfasl;

// ---------------------------------------------------------------------------
// Encoding / decoding
// ---------------------------------------------------------------------------

/// Derive the compact ID for a string or number literal.
///
/// Anything else is refused with `InvalidArgument`.
pub fn to_compact_id(value: &CycValue) -> Result<String> {
    // ---
    let frame = cfasl::encode_literal(value)?;
    Ok(URL_SAFE_NO_PAD.encode(frame))
}

// ---

/// Decode a compact ID back to its literal.
pub fn from_compact_id(id: &str) -> Result<CycValue> {
    // ---
    let frame = decode_base64(id)?;
    cfasl::decode(&frame)
}

// ---

fn decode_base64(id: &str) -> Result<Vec<u8>> {
    // ---
    let mut padded = id.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    URL_SAFE
        .decode(padded.as_bytes())
        .map_err(|e| CycError::InvalidArgument(format!("malformed compact id: {e}")))
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// What the first two decoded bytes say the literal is.
///
/// Only the marker and the opcode are inspected; the value body is never
/// decoded, so truncated or malformed input classifies as neither kind
/// instead of raising.
fn leading_opcode(id: &str) -> Option<u8> {
    // ---
    let frame = decode_base64(id).ok()?;
    match frame.as_slice() {
        [cfasl::EXTERNALIZATION, opcode, ..] => Some(*opcode),
        _ => None,
    }
}

// ---

/// Whether `id` is the compact ID of a string literal.
pub fn is_string_compact_id(id: &str) -> bool {
    leading_opcode(id).is_some_and(cfasl::opcode_is_string)
}

/// Whether `id` is the compact ID of a number literal.
pub fn is_number_compact_id(id: &str) -> bool {
    leading_opcode(id).is_some_and(cfasl::opcode_is_number)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
