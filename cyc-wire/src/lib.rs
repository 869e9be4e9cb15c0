//! CFASL — the binary wire framing used by the Cyc client.
//!
//! Implements encode/decode of [`cyc_domain::CycValue`] literals to the
//! opcode-tagged frame format, async frame I/O for binary-mode connections,
//! and the derived compact-id scheme for embedding literals in URLs.
//!
//! # Quick start
//!
//! ```ignore
//! use cyc_domain::CycValue;
//! use cyc_wire::{cfasl, compact};
//!
//! let frame = cfasl::encode(&CycValue::Int(-1977));
//! assert_eq!(cfasl::decode(&frame)?, CycValue::Int(-1977));
//!
//! let id = compact::to_compact_id(&CycValue::from("inference"))?;
//! assert!(compact::is_string_compact_id(&id));
//! ```

pub mod cfasl;
pub mod compact;

pub use cfasl::{decode, encode, encode_literal, read_frame, write_frame, EXTERNALIZATION};
pub use compact::{
    from_compact_id, is_number_compact_id, is_string_compact_id, to_compact_id,
};
