//! Bridge address normalization

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Result, TimingError};

const SCHEMES: [&str; 4] = ["http://", "https://", "ws://", "wss://"];

/// Bare host of a bridge, without scheme, port or path.
///
/// Built from whatever the user typed or a scanned code contained:
///
/// ```rust
/// use lapclock::BridgeAddress;
///
/// let address: BridgeAddress = "ws://192.168.1.50:8000/ws".parse().unwrap();
/// assert_eq!(address.host(), "192.168.1.50");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BridgeAddress(String);

impl BridgeAddress {
    /// Normalize `input` down to its host.
    ///
    /// Fails with [`TimingError::InvalidAddress`] when nothing is left.
    pub fn parse(input: &str) -> Result<Self> {
        let host = normalize_host(input);
        if host.is_empty() {
            return Err(TimingError::invalid_address(input));
        }
        Ok(Self(host.to_string()))
    }

    pub fn host(&self) -> &str {
        &self.0
    }

    /// WebSocket URL of the bridge endpoint on this host.
    pub fn endpoint(&self, port: u16, path: &str) -> String {
        format!("ws://{}:{}{}", self.0, port, path)
    }
}

impl fmt::Display for BridgeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BridgeAddress {
    type Err = TimingError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BridgeAddress {
    type Error = TimingError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<BridgeAddress> for String {
    fn from(address: BridgeAddress) -> Self {
        address.0
    }
}

/// Strip schemes, path and port from `input`, keeping only the host.
///
/// Bracketed IPv6 literals keep their brackets so the result can be put
/// straight back into a URL.
pub fn normalize_host(input: &str) -> &str {
    let mut rest = input.trim();

    while let Some(stripped) = strip_scheme(rest) {
        rest = stripped;
    }

    let rest = match rest.find(['/', '?', '#']) {
        Some(end) => &rest[..end],
        None => rest,
    };

    let host = if rest.starts_with('[') {
        match rest.find(']') {
            Some(end) => &rest[..=end],
            None => rest,
        }
    } else {
        rest.split(':').next().unwrap_or_default()
    };

    host.trim()
}

fn strip_scheme(input: &str) -> Option<&str> {
    SCHEMES.iter().find_map(|scheme| {
        let head = input.get(..scheme.len())?;
        head.eq_ignore_ascii_case(scheme).then(|| &input[scheme.len()..])
    })
}
