//! Name-resolution directive entries

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Kind of a name-resolution directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveKind {
    /// `address=/{domain}/{value}` — map a domain (and subdomains) to an address
    #[serde(rename = "address")]
    AddressMap,
    /// `cname={domain},{value}` — alias one domain to another
    Cname,
    /// `txt-record={domain},"{value}"` — free-text record
    Txt,
}

impl DirectiveKind {
    /// Wire name used by the API layer and the config syntax
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectiveKind::AddressMap => "address",
            DirectiveKind::Cname => "cname",
            DirectiveKind::Txt => "txt",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DirectiveKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "address" => Ok(DirectiveKind::AddressMap),
            "cname" => Ok(DirectiveKind::Cname),
            "txt" => Ok(DirectiveKind::Txt),
            other => Err(Error::UnsupportedKind(format!(
                "{other}: only 'address', 'cname', and 'txt' are supported"
            ))),
        }
    }
}

/// One name-resolution rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveEntry {
    #[serde(rename = "type")]
    pub kind: DirectiveKind,
    pub domain: String,
    pub value: String,
    #[serde(default)]
    pub comment: String,
}

impl DirectiveEntry {
    pub fn new(
        kind: DirectiveKind,
        domain: impl Into<String>,
        value: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            domain: domain.into(),
            value: value.into(),
            comment: comment.into(),
        }
    }

    /// Parse comment-stripped line content into a directive
    ///
    /// Domain/value splits mirror greedy matching: the domain extends to the
    /// last separator, so values never contain one.
    pub(crate) fn parse_content(content: &str, comment: &str) -> Option<Self> {
        if let Some(rest) = content.strip_prefix("address=/") {
            let idx = rest.rfind('/')?;
            let (domain, value) = (&rest[..idx], &rest[idx + 1..]);
            if domain.is_empty() || value.is_empty() {
                return None;
            }
            return Some(Self::new(DirectiveKind::AddressMap, domain, value, comment));
        }

        if let Some(rest) = content.strip_prefix("cname=") {
            let idx = rest.rfind(',')?;
            let (domain, value) = (&rest[..idx], &rest[idx + 1..]);
            if domain.is_empty() || value.is_empty() {
                return None;
            }
            return Some(Self::new(DirectiveKind::Cname, domain, value, comment));
        }

        if let Some(rest) = content.strip_prefix("txt-record=") {
            let quoted = rest.strip_suffix('"')?;
            let idx = quoted.rfind(",\"")?;
            let (domain, value) = (&quoted[..idx], &quoted[idx + 2..]);
            if domain.is_empty() || value.is_empty() {
                return None;
            }
            return Some(Self::new(DirectiveKind::Txt, domain, value, comment));
        }

        None
    }

    /// Canonical line for this directive, without any trailing comment
    pub fn to_line(&self) -> String {
        match self.kind {
            DirectiveKind::AddressMap => format!("address=/{}/{}", self.domain, self.value),
            DirectiveKind::Cname => format!("cname={},{}", self.domain, self.value),
            DirectiveKind::Txt => format!("txt-record={},\"{}\"", self.domain, self.value),
        }
    }
}
