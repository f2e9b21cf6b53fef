//! Line ↔ structured entry conversion
//!
//! One tracked file is a sequence of lines. A line is either blank, a full-line
//! comment (leading `#`), or a candidate entry. Candidate entries may carry a
//! trailing free-form comment introduced by the first `" # "` delimiter; the
//! comment is split off before shape matching and reattached on serialization.
//!
//! Shapes are tried in a fixed order, first match wins:
//!
//! 1. `address=/{domain}/{value}`
//! 2. `cname={domain},{value}`
//! 3. `txt-record={domain},"{value}"`
//! 4. `dhcp-host={a},{b},{c}` (token order free, see [`ReservationEntry`])
//! 5. whitespace-separated lease record (≥ 4 fields)
//!
//! Lines matching none of the shapes produce no entry but are preserved in the
//! blob by the editors.
//!
//! MAC addresses are canonicalized to uppercase here, exactly once; everything
//! downstream compares them case-insensitively.

mod dhcp;
mod directive;

pub use dhcp::{LeaseEntry, ReservationEntry};
pub use directive::{DirectiveEntry, DirectiveKind};

/// Delimiter introducing a trailing comment
const COMMENT_DELIMITER: &str = " # ";

/// Any entry produced by [`parse_line`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Directive(DirectiveEntry),
    Reservation(ReservationEntry),
    Lease(LeaseEntry),
}

/// Parse one raw line into a structured entry, if it matches any shape
///
/// Blank lines and full-line comments yield `None`, as do lines matching no
/// canonical shape.
pub fn parse_line(raw: &str) -> Option<ParsedLine> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let (content, comment) = split_comment(trimmed);

    if let Some(entry) = DirectiveEntry::parse_content(content, comment) {
        return Some(ParsedLine::Directive(entry));
    }
    if let Some(entry) = ReservationEntry::parse_content(content, comment) {
        return Some(ParsedLine::Reservation(entry));
    }
    LeaseEntry::parse_content(content).map(ParsedLine::Lease)
}

/// Split a line into its content and trailing comment
///
/// The comment starts at the first `" # "`; both halves are trimmed.
pub fn split_comment(line: &str) -> (&str, &str) {
    match line.find(COMMENT_DELIMITER) {
        Some(idx) => {
            let (content, rest) = line.split_at(idx);
            (content.trim(), rest[COMMENT_DELIMITER.len()..].trim())
        }
        None => (line.trim(), ""),
    }
}

/// Append a trailing comment to a canonical line, if the comment is non-empty
pub fn attach_comment(line: String, comment: &str) -> String {
    if comment.is_empty() {
        line
    } else {
        format!("{}{}{}", line, COMMENT_DELIMITER, comment)
    }
}

/// Canonical MAC casing, applied at the parser/serializer boundary only
pub(crate) fn canonicalize_mac(mac: &str) -> String {
    mac.to_ascii_uppercase()
}

/// True if the token is a MAC address: six colon-separated hex octets
pub(crate) fn is_mac_token(token: &str) -> bool {
    let mut groups = 0;
    for group in token.split(':') {
        if group.len() != 2 || !group.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }
        groups += 1;
    }
    groups == 6
}

/// True if the token parses as an IPv4 address
pub(crate) fn is_ip_token(token: &str) -> bool {
    token.parse::<std::net::Ipv4Addr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_comment_at_first_delimiter() {
        let (content, comment) = split_comment("address=/a.com/1.2.3.4 # note # more");
        assert_eq!(content, "address=/a.com/1.2.3.4");
        assert_eq!(comment, "note # more");
    }

    #[test]
    fn split_comment_absent() {
        let (content, comment) = split_comment("cname=a.com,b.com");
        assert_eq!(content, "cname=a.com,b.com");
        assert_eq!(comment, "");
    }

    #[test]
    fn blank_and_comment_lines_yield_nothing() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("# full line comment"), None);
    }

    #[test]
    fn unmatched_lines_yield_nothing() {
        assert_eq!(parse_line("domain-needed"), None);
        assert_eq!(parse_line("bogus-priv"), None);
    }

    #[test]
    fn shapes_tried_in_fixed_order() {
        // A directive line also splits into >= 4 whitespace fields when it
        // carries extra tokens; the directive shape must win.
        match parse_line("address=/a.com/1.2.3.4") {
            Some(ParsedLine::Directive(_)) => {}
            other => panic!("expected directive, got {:?}", other),
        }
    }

    #[test]
    fn mac_token_classification_is_strict() {
        assert!(is_mac_token("AA:BB:CC:DD:EE:FF"));
        assert!(is_mac_token("00:0c:29:1c:bf:3b"));
        assert!(!is_mac_token("host:name"));
        assert!(!is_mac_token("AA:BB:CC:DD:EE"));
        assert!(!is_mac_token("AA:BB:CC:DD:EE:GG"));
    }

    #[test]
    fn ip_token_classification_is_strict() {
        assert!(is_ip_token("192.168.1.10"));
        assert!(!is_ip_token("my.host.name"));
        assert!(!is_ip_token("1.2.3"));
    }
}
