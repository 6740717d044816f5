//! Relay query filters.

use serde::Serialize;

use crate::core::RecordKind;

/// Subscription filter sent in `REQ` messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u16>,
    #[serde(rename = "#d", skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.ids.push(id.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    pub fn kinds(mut self, kinds: &[RecordKind]) -> Self {
        self.kinds.extend(kinds.iter().map(|k| k.as_u16()));
        self
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifiers.push(identifier.into());
        self
    }

    /// Whether a record satisfies every populated constraint.
    ///
    /// Relays apply the filter server-side; this re-check guards against
    /// relays that ignore part of it.
    pub fn matches(&self, record: &super::Record) -> bool {
        (self.ids.is_empty() || self.ids.contains(&record.id))
            && (self.authors.is_empty() || self.authors.contains(&record.pubkey))
            && (self.kinds.is_empty() || self.kinds.contains(&record.kind))
            && (self.identifiers.is_empty()
                || record
                    .identifier()
                    .is_some_and(|d| self.identifiers.iter().any(|i| i == d)))
    }
}
