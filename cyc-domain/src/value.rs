use std::fmt;

use uuid::Uuid;

// ---------------------------------------------------------------------------
// CycValue
// ---------------------------------------------------------------------------

/// The literal model shared by the wire codec, worker events, and the
/// command builder.
///
/// This is deliberately the raw layer: the symbolic data model (sentences,
/// terms, assertions) is built on top of these values by higher layers and
/// adds no protocol structure of its own.
#[derive(Debug, Clone, PartialEq)]
pub enum CycValue {
    // ---
    Nil,

    /// 64-bit signed integer. The codec picks the narrowest wire encoding.
    Int(i64),

    Float(f64),

    String(String),

    /// An interned symbol, printed bare.
    Symbol(String),

    /// A keyword symbol, printed with a leading `:`.
    Keyword(String),

    /// A constant identified by its GUID.
    Guid(Uuid),

    /// Proper list.
    List(Vec<CycValue>),

    /// Dotted pair / improper list: the leading elements plus a final cdr.
    Dotted(Vec<CycValue>, Box<CycValue>),
}

// ---

impl CycValue {
    // ---
    /// Convenience constructor for a symbol.
    pub fn symbol(name: impl Into<String>) -> Self {
        CycValue::Symbol(name.into())
    }

    /// Convenience constructor for a keyword (no leading `:` in `name`).
    pub fn keyword(name: impl Into<String>) -> Self {
        CycValue::Keyword(name.into())
    }

    // ---

    /// Whether this value is one of the literals the compact-id scheme
    /// accepts (a string or a number).
    pub fn is_compactable_literal(&self) -> bool {
        matches!(
            self,
            CycValue::Int(_) | CycValue::Float(_) | CycValue::String(_)
        )
    }
}

// ---

impl From<i64> for CycValue {
    fn from(v: i64) -> Self {
        CycValue::Int(v)
    }
}

impl From<f64> for CycValue {
    fn from(v: f64) -> Self {
        CycValue::Float(v)
    }
}

impl From<&str> for CycValue {
    fn from(v: &str) -> Self {
        CycValue::String(v.to_string())
    }
}

impl From<String> for CycValue {
    fn from(v: String) -> Self {
        CycValue::String(v)
    }
}

// ---------------------------------------------------------------------------
// Display — canonical literal stringification
// ---------------------------------------------------------------------------

/// Escape a string for embedding in command text.
fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    // ---
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            _ => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

// ---

impl fmt::Display for CycValue {
    /// The canonical form used when a value is spliced into command text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        match self {
            CycValue::Nil => f.write_str("NIL"),
            CycValue::Int(v) => write!(f, "{v}"),
            // {:?} keeps the trailing ".0" on whole floats, so the server
            // reads the value back as a float rather than an integer.
            CycValue::Float(v) => write!(f, "{v:?}"),
            CycValue::String(s) => write_escaped(f, s),
            CycValue::Symbol(s) => f.write_str(s),
            CycValue::Keyword(s) => write!(f, ":{s}"),
            CycValue::Guid(g) => write!(f, "#G\"{g}\""),
            CycValue::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            CycValue::Dotted(items, cdr) => {
                f.write_str("(")?;
                for item in items {
                    write!(f, "{item} ")?;
                }
                write!(f, ". {cdr})")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
