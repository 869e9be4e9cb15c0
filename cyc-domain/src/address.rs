use std::fmt;

use super::error::{CycError, Result};

// ---------------------------------------------------------------------------
// CycServerAddress
// ---------------------------------------------------------------------------

/// A reachable Cyc server and how many concurrent in-flight requests it
/// tolerates.
///
/// Immutable value type; equality is structural, and addresses are used as
/// map keys by the session manager and the pool.
///
/// A `concurrency_level` of `None` means the caller must supply a default
/// when the level matters. A level of `0` marks the address as currently
/// unusable: it contributes no pool slots but remains addressable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CycServerAddress {
    // ---
    host: String,
    port: u16,
    concurrency_level: Option<u32>,
}

// ---

impl CycServerAddress {
    // ---
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            concurrency_level: None,
        }
    }

    // ---

    pub fn with_concurrency_level(host: impl Into<String>, port: u16, level: u32) -> Self {
        Self {
            host: host.into(),
            port,
            concurrency_level: Some(level),
        }
    }

    // ---

    /// Parse the `host:port[:concurrency]` grammar.
    ///
    /// The concurrency field, when present, must be a base-10 integer;
    /// anything else invalidates the whole string. `0` is accepted and
    /// yields an address that contributes no pool slots.
    pub fn parse(spec: &str) -> Result<Self> {
        // ---
        let mut parts = spec.split(':');

        let host = match parts.next() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => {
                return Err(CycError::InvalidArgument(format!(
                    "server address {spec:?} has no host"
                )))
            }
        };

        let port = parts
            .next()
            .ok_or_else(|| {
                CycError::InvalidArgument(format!("server address {spec:?} has no port"))
            })?
            .parse::<u16>()
            .map_err(|_| {
                CycError::InvalidArgument(format!("server address {spec:?} has a bad port"))
            })?;

        let concurrency_level = match parts.next() {
            None => None,
            Some(level) => Some(level.parse::<u32>().map_err(|_| {
                CycError::InvalidArgument(format!(
                    "server address {spec:?} has a bad concurrency level"
                ))
            })?),
        };

        if parts.next().is_some() {
            return Err(CycError::InvalidArgument(format!(
                "server address {spec:?} has trailing fields"
            )));
        }

        Ok(Self {
            host,
            port,
            concurrency_level,
        })
    }

    // ---

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Configured concurrency level, if any.
    pub fn concurrency_level(&self) -> Option<u32> {
        self.concurrency_level
    }

    /// Concurrency level with the caller's default applied.
    pub fn effective_concurrency_level(&self, default: u32) -> u32 {
        self.concurrency_level.unwrap_or(default)
    }
}

// ---

impl fmt::Display for CycServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        match self.concurrency_level {
            Some(level) => write!(f, "{}:{}:{}", self.host, self.port, level),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

// ---------------------------------------------------------------------------
// parse_pool_spec
// ---------------------------------------------------------------------------

/// Parse a comma-separated list of server address strings.
///
/// `"host1:40:1,host2:50:3"` → two addresses. Empty specs and any invalid
/// element invalidate the whole spec.
pub fn parse_pool_spec(spec: &str) -> Result<Vec<CycServerAddress>> {
    // ---
    if spec.trim().is_empty() {
        return Err(CycError::InvalidArgument("empty pool spec".into()));
    }

    spec.split(',')
        .map(|part| CycServerAddress::parse(part.trim()))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        // ---
        let addr = CycServerAddress::parse("cyc.example.org:3600").unwrap();
        assert_eq!(addr.host(), "cyc.example.org");
        assert_eq!(addr.port(), 3600);
        assert_eq!(addr.concurrency_level(), None);
        assert_eq!(addr.effective_concurrency_level(4), 4);
    }

    #[test]
    fn parses_concurrency_level() {
        // ---
        let addr = CycServerAddress::parse("localhost:3600:7").unwrap();
        assert_eq!(addr.concurrency_level(), Some(7));
        assert_eq!(addr.effective_concurrency_level(1), 7);
    }

    #[test]
    fn zero_level_is_addressable() {
        // ---
        let addr = CycServerAddress::parse("host1:40:0").unwrap();
        assert_eq!(addr.concurrency_level(), Some(0));
    }

    #[test]
    fn rejects_malformed_addresses() {
        // ---
        for bad in [
            "",
            "hostonly",
            ":3600",
            "host:notaport",
            "host:3600:-1",
            "host:3600:two",
            "host:3600:2:extra",
        ] {
            assert!(
                CycServerAddress::parse(bad).is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn pool_spec_round_trip() {
        // ---
        let addrs = parse_pool_spec("host1:40:1, host2:50:3").unwrap();
        assert_eq!(addrs.len(), 2);
        assert_eq!(addrs[0].to_string(), "host1:40:1");
        assert_eq!(addrs[1].to_string(), "host2:50:3");
    }

    #[test]
    fn pool_spec_rejects_any_bad_element() {
        // ---
        assert!(parse_pool_spec("host1:40:1,host2:bad").is_err());
        assert!(parse_pool_spec("").is_err());
    }

    #[test]
    fn structural_equality() {
        // ---
        let a = CycServerAddress::with_concurrency_level("h", 10, 2);
        let b = CycServerAddress::parse("h:10:2").unwrap();
        assert_eq!(a, b);
    }
}
