//! Decides whether a login needs the second factor at all.
//!
//! Rules are evaluated in order, first match wins:
//!
//! 1. `ldap_bypass`: LDAP-backed accounts keep the second factor, any other backend
//!    skips it (see [`BypassConfig`] for why this reads backwards).
//! 2. Source address inside one of the configured CIDR ranges skips it.
//! 3. Otherwise the second factor is required.

pub mod bypass;
pub mod cidr;

pub use self::bypass::{
    requires_second_factor, Backend, BypassConfig, BypassPolicy, BypassReason, Decision,
    UserContext,
};
pub use self::cidr::{contains, ip_in_range, CidrError, CidrRange};
