//! Request path classification.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Shape of an inbound request path, before mode checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    /// `/e/:address`
    Record(&'a str),
    /// `/p/:identity/d/*identifier`
    PathPair {
        identity: &'a str,
        identifier: Cow<'a, str>,
    },
    /// `/d/*identifier`, author taken from the subdomain
    Subdomain { identifier: Cow<'a, str> },
    /// `/health`
    Health,
    Unknown,
}

impl<'a> Route<'a> {
    /// Classify a request path. Query strings are ignored.
    pub fn parse(path: &'a str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();

        if path == "/health" {
            return Self::Health;
        }
        if let Some(address) = path.strip_prefix("/e/") {
            let address = address.trim_end_matches('/');
            return if address.is_empty() || address.contains('/') {
                Self::Unknown
            } else {
                Self::Record(address)
            };
        }
        if let Some(rest) = path.strip_prefix("/p/") {
            let Some((identity, identifier)) = rest.split_once("/d/") else {
                return Self::Unknown;
            };
            return match decode_identifier(identifier) {
                Some(identifier) if !identity.is_empty() && !identity.contains('/') => {
                    Self::PathPair {
                        identity,
                        identifier,
                    }
                }
                _ => Self::Unknown,
            };
        }
        if let Some(identifier) = path.strip_prefix("/d/") {
            return match decode_identifier(identifier) {
                Some(identifier) => Self::Subdomain { identifier },
                None => Self::Unknown,
            };
        }
        Self::Unknown
    }
}

/// Percent-decode an identifier path; empty identifiers are rejected.
fn decode_identifier(raw: &str) -> Option<Cow<'_, str>> {
    let raw = raw.trim_matches('/');
    if raw.is_empty() {
        return None;
    }
    percent_decode_str(raw).decode_utf8().ok()
}

/// First DNS label of a `Host` header value, port removed.
pub fn subdomain(host: &str) -> Option<&str> {
    let host = host.trim();
    // Bracketed IPv6 literals have no subdomain.
    if host.starts_with('[') {
        return None;
    }
    let host = host.split(':').next().unwrap_or_default();
    let (label, rest) = host.split_once('.')?;
    (!label.is_empty() && !rest.is_empty()).then_some(label)
}
