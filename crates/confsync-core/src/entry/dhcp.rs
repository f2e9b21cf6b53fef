//! Address reservation and lease entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{canonicalize_mac, is_ip_token, is_mac_token};

/// One static address assignment
///
/// The on-disk token order is free on input (legacy files mix
/// `mac,ip,hostname` and `hostname,mac,ip`); tokens are classified
/// syntactically and exactly one MAC, one IP, and one hostname must be
/// present. Output is always `dhcp-host={hostname},{mac},{ip}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationEntry {
    pub mac_address: String,
    pub ip_address: String,
    pub hostname: String,
    #[serde(default)]
    pub comment: String,
}

impl ReservationEntry {
    pub fn new(
        mac_address: impl Into<String>,
        ip_address: impl Into<String>,
        hostname: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            mac_address: canonicalize_mac(&mac_address.into()),
            ip_address: ip_address.into(),
            hostname: hostname.into(),
            comment: comment.into(),
        }
    }

    /// Parse comment-stripped line content into a reservation
    ///
    /// Requires exactly three comma-separated tokens classifying to exactly
    /// one MAC, one IP, and one hostname; anything else is simply not a
    /// reservation (not an error).
    pub(crate) fn parse_content(content: &str, comment: &str) -> Option<Self> {
        let rest = content.strip_prefix("dhcp-host=")?;
        let tokens: Vec<&str> = rest.split(',').map(str::trim).collect();
        if tokens.len() != 3 {
            return None;
        }

        let mut mac = None;
        let mut ip = None;
        let mut hostname = None;
        for token in tokens {
            if is_mac_token(token) {
                if mac.replace(token).is_some() {
                    return None;
                }
            } else if is_ip_token(token) {
                if ip.replace(token).is_some() {
                    return None;
                }
            } else if hostname.replace(token).is_some() {
                return None;
            }
        }

        Some(Self::new(mac?, ip?, hostname?, comment))
    }

    /// Canonical line for this reservation, without any trailing comment
    pub fn to_line(&self) -> String {
        format!(
            "dhcp-host={},{},{}",
            self.hostname,
            canonicalize_mac(&self.mac_address),
            self.ip_address
        )
    }

    /// Identity comparison used by update/delete matching
    ///
    /// MACs compare case-insensitively; casing was canonicalized at parse time
    /// but callers may construct entries by hand.
    pub fn same_identity(&self, other: &Self) -> bool {
        self.mac_address.eq_ignore_ascii_case(&other.mac_address)
            && self.ip_address == other.ip_address
            && self.hostname == other.hostname
    }
}

/// One dynamically granted, time-bounded address assignment
///
/// The lease file is owned by the network service; fields past the hostname
/// (client-id and friends) are passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseEntry {
    pub mac_address: String,
    pub ip_address: String,
    pub hostname: String,
    /// Expiry as epoch seconds; 0 when the field was unparseable
    pub expiry_time: i64,
    /// Trailing tokens preserved in original order and position
    #[serde(default)]
    pub extra: Vec<String>,
}

impl LeaseEntry {
    /// Parse a whitespace-separated lease line
    ///
    /// Lines with fewer than 4 fields are silently skipped. An unparseable
    /// expiry defaults to 0 rather than failing.
    pub(crate) fn parse_content(content: &str) -> Option<Self> {
        let fields: Vec<&str> = content.split_whitespace().collect();
        if fields.len() < 4 {
            return None;
        }
        Some(Self {
            expiry_time: fields[0].parse().unwrap_or(0),
            mac_address: canonicalize_mac(fields[1]),
            ip_address: fields[2].to_string(),
            hostname: fields[3].to_string(),
            extra: fields[4..].iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Canonical line for this lease
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{} {} {} {}",
            self.expiry_time,
            canonicalize_mac(&self.mac_address),
            self.ip_address,
            self.hostname
        );
        for token in &self.extra {
            line.push(' ');
            line.push_str(token);
        }
        line
    }

    /// Identity comparison used by update/delete matching
    pub fn same_identity(&self, other: &Self) -> bool {
        self.mac_address.eq_ignore_ascii_case(&other.mac_address)
            && self.ip_address == other.ip_address
            && self.hostname == other.hostname
    }

    /// Expiry as a UTC timestamp; `None` for out-of-range values
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expiry_time, 0)
    }

    /// True if the lease expiry lies in the past
    pub fn is_expired(&self) -> bool {
        self.expires_at().is_some_and(|t| t < Utc::now())
    }
}
