//! IPv4 CIDR matching used by the address bypass rules.
//!
//! Both operands are parsed strictly: a malformed dotted quad or a prefix outside `0..=32`
//! is reported as a [`CidrError`] and never silently turned into a zero address or a
//! zero-length mask.

use std::{fmt, net::Ipv4Addr, str::FromStr};
use thiserror::Error;

pub const MAX_PREFIX_LEN: u8 = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrError {
    #[error("invalid IPv4 address: {0:?}")]
    InvalidAddress(String),
    #[error("invalid prefix length: {0:?}")]
    InvalidPrefix(String),
}

/// An IPv4 block: every address sharing the top `prefix_len` bits of `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CidrRange {
    base: Ipv4Addr,
    prefix_len: u8,
}

impl CidrRange {
    /// # Errors
    /// Returns [`CidrError::InvalidPrefix`] if `prefix_len` is greater than 32.
    pub fn new(base: Ipv4Addr, prefix_len: u8) -> Result<Self, CidrError> {
        if prefix_len > MAX_PREFIX_LEN {
            return Err(CidrError::InvalidPrefix(prefix_len.to_string()));
        }

        Ok(Self { base, prefix_len })
    }

    #[must_use]
    pub const fn netmask(&self) -> u32 {
        // shifting a u32 by 32 overflows, /0 is the empty mask
        if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (MAX_PREFIX_LEN - self.prefix_len)
        }
    }

    /// A `/0` range matches every address.
    #[must_use]
    pub const fn is_universal(&self) -> bool {
        self.prefix_len == 0
    }

    #[must_use]
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = self.netmask();
        (u32::from(ip) & mask) == (u32::from(self.base) & mask)
    }
}

impl FromStr for CidrRange {
    type Err = CidrError;

    /// Accepts `a.b.c.d/len` or a bare `a.b.c.d`, which means `/32`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };

        let base = parse_ipv4(addr)?;

        let prefix_len = match prefix {
            None => MAX_PREFIX_LEN,
            Some(p) => parse_prefix(p)?,
        };

        Self::new(base, prefix_len)
    }
}

impl fmt::Display for CidrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.prefix_len)
    }
}

/// Parse a dotted-quad IPv4 address, surrounding whitespace ignored.
///
/// # Errors
/// Returns [`CidrError::InvalidAddress`] if the text is not a valid dotted quad.
pub fn parse_ipv4(text: &str) -> Result<Ipv4Addr, CidrError> {
    let text = text.trim();
    text.parse::<Ipv4Addr>()
        .map_err(|_| CidrError::InvalidAddress(text.to_string()))
}

fn parse_prefix(text: &str) -> Result<u8, CidrError> {
    // u8::from_str would take "+24"
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CidrError::InvalidPrefix(text.to_string()));
    }

    match text.parse::<u8>() {
        Ok(len) if len <= MAX_PREFIX_LEN => Ok(len),
        _ => Err(CidrError::InvalidPrefix(text.to_string())),
    }
}

#[must_use]
pub fn contains(ip: Ipv4Addr, range: &CidrRange) -> bool {
    range.contains(ip)
}

/// Textual form of [`contains`]: is `ip` inside `range`.
///
/// # Errors
/// Returns an error if either operand fails to parse.
pub fn ip_in_range(ip: &str, range: &str) -> Result<bool, CidrError> {
    let ip = parse_ipv4(ip)?;
    let range = range.parse::<CidrRange>()?;
    Ok(range.contains(ip))
}
