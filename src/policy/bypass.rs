use crate::config::ConfigError;
use crate::policy::cidr::CidrRange;
use std::net::{IpAddr, Ipv4Addr};
use tracing::{debug, warn};

/// Directory backend an account authenticates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Ldap,
    Other,
}

impl Backend {
    /// Map a user backend class name, `LDAP` in any case, to a [`Backend`].
    ///
    /// A blank name carries no backend information and yields `None`; callers must then
    /// require the second factor rather than guess.
    #[must_use]
    pub fn from_class_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            None
        } else if name.eq_ignore_ascii_case("LDAP") {
            Some(Self::Ldap)
        } else {
            Some(Self::Other)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub id: String,
    pub backend: Backend,
}

impl UserContext {
    #[must_use]
    pub fn new(id: impl Into<String>, backend: Backend) -> Self {
        Self {
            id: id.into(),
            backend,
        }
    }
}

/// Bypass rules as configured, before parsing.
///
/// **`ldap_bypass` exempts non-LDAP accounts.** When it is `true`, LDAP-backed users are
/// still required to complete the second factor and every other backend skips it. The
/// name suggests the opposite; the behaviour is kept as is until the product owner
/// confirms which one is intended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BypassConfig {
    pub ldap_bypass: bool,
    pub ip_ranges: Vec<String>,
}

impl BypassConfig {
    #[must_use]
    pub fn new(ldap_bypass: bool, ip_ranges: Vec<String>) -> Self {
        Self {
            ldap_bypass,
            ip_ranges,
        }
    }

    /// Strict parse used at load time: the first malformed range is fatal.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidBypassRange`] naming the offending entry.
    pub fn validate(&self) -> Result<Vec<CidrRange>, ConfigError> {
        self.ip_ranges
            .iter()
            .map(|raw| {
                raw.parse::<CidrRange>()
                    .map_err(|source| ConfigError::InvalidBypassRange {
                        range: raw.clone(),
                        source,
                    })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// `ldap_bypass` is on and the account is not LDAP-backed.
    NonLdapBackend,
    SourceAddress(CidrRange),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Require,
    Bypass(BypassReason),
}

impl Decision {
    #[must_use]
    pub const fn requires_second_factor(&self) -> bool {
        matches!(self, Self::Require)
    }
}

/// Parsed, read-only bypass rules; safe to share between concurrent evaluations.
#[derive(Debug, Clone, Default)]
pub struct BypassPolicy {
    ldap_bypass: bool,
    ranges: Vec<CidrRange>,
}

impl BypassPolicy {
    /// Build the policy, skipping (and logging) any range that does not parse.
    ///
    /// If every configured range is malformed the address rule is empty and the policy
    /// falls back to requiring the second factor.
    #[must_use]
    pub fn from_config(config: &BypassConfig) -> Self {
        let mut ranges = Vec::with_capacity(config.ip_ranges.len());

        for raw in &config.ip_ranges {
            match raw.parse::<CidrRange>() {
                Ok(range) => {
                    if range.is_universal() {
                        warn!(
                            range = %range,
                            "bypass range has prefix /0, every source skips the second factor"
                        );
                    }
                    ranges.push(range);
                }
                Err(error) => {
                    warn!(range = %raw, %error, "skipping malformed bypass range");
                }
            }
        }

        if ranges.is_empty() && !config.ip_ranges.is_empty() {
            warn!("no usable bypass range, second factor stays required for every address");
        }

        Self {
            ldap_bypass: config.ldap_bypass,
            ranges,
        }
    }

    #[must_use]
    pub fn ranges(&self) -> &[CidrRange] {
        &self.ranges
    }

    /// First matching rule wins: the LDAP flag, then source ranges in configured order,
    /// then the default of requiring the second factor.
    #[must_use]
    pub fn decide(&self, user: &UserContext, source_ip: IpAddr) -> Decision {
        if self.ldap_bypass {
            return match user.backend {
                Backend::Ldap => Decision::Require,
                Backend::Other => Decision::Bypass(BypassReason::NonLdapBackend),
            };
        }

        let Some(source) = as_ipv4(source_ip) else {
            debug!(user = %user.id, %source_ip, "source is not IPv4, no bypass range applies");
            return Decision::Require;
        };

        self.ranges
            .iter()
            .find(|range| range.contains(source))
            .map_or(Decision::Require, |range| {
                Decision::Bypass(BypassReason::SourceAddress(*range))
            })
    }

    #[must_use]
    pub fn requires_second_factor(&self, user: &UserContext, source_ip: IpAddr) -> bool {
        let decision = self.decide(user, source_ip);

        debug!(user = %user.id, %source_ip, ?decision, "bypass policy evaluated");

        decision.requires_second_factor()
    }

    /// Same as [`Self::requires_second_factor`] for an untrusted textual address; an
    /// address that does not parse always requires the second factor.
    #[must_use]
    pub fn requires_second_factor_from(&self, user: &UserContext, source_ip: &str) -> bool {
        match source_ip.trim().parse::<IpAddr>() {
            Ok(ip) => self.requires_second_factor(user, ip),
            Err(_) => {
                warn!(
                    user = %user.id,
                    source_ip,
                    "unparsable source address, second factor required"
                );
                true
            }
        }
    }
}

fn as_ipv4(ip: IpAddr) -> Option<Ipv4Addr> {
    match ip {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    }
}

/// One-shot evaluation of `config` for `user` connecting from `source_ip`.
#[must_use]
pub fn requires_second_factor(
    config: &BypassConfig,
    user: &UserContext,
    source_ip: Ipv4Addr,
) -> bool {
    BypassPolicy::from_config(config).requires_second_factor(user, IpAddr::V4(source_ip))
}
