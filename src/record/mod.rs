//! Signed, content-addressed records.
//!
//! A record's id is the sha256 of `[0, pubkey, created_at, kind, tags, content]`
//! serialized as compact JSON; the signature is a schnorr signature over that id.

pub mod address;
mod builder;
mod filter;
mod keys;

pub use builder::{Clock, RecordBuilder};
pub use filter::Filter;
pub use keys::{Keys, decode_hex32};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::RecordKind;

/// Record signing failures.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Ordered tag list, unique by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<Vec<String>>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `values`. An existing tag with the same key is replaced
    /// in place, so the first position is kept and the last write wins.
    pub fn set<I, S>(&mut self, key: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tag = vec![key.to_owned()];
        tag.extend(values.into_iter().map(Into::into));
        match self.0.iter_mut().find(|t| t.first().is_some_and(|k| k == key)) {
            Some(existing) => *existing = tag,
            None => self.0.push(tag),
        }
        self
    }

    /// Chainable single-value form of [`Tags::set`].
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, [value.into()]);
        self
    }

    /// First value of the tag with the given key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|t| t.first().is_some_and(|k| k == key))
            .and_then(|t| t.get(1))
            .map(String::as_str)
    }

    pub fn as_slice(&self) -> &[Vec<String>] {
        &self.0
    }
}

/// A signed record as exchanged with relays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Tags,
    pub content: String,
    pub sig: String,
}

impl Record {
    /// Compute the id over the signed fields.
    pub fn compute_id(
        pubkey: &str,
        created_at: u64,
        kind: u16,
        tags: &Tags,
        content: &str,
    ) -> Result<[u8; 32], serde_json::Error> {
        let canonical = serde_json::to_string(&(0, pubkey, created_at, kind, tags, content))?;
        Ok(Sha256::digest(canonical.as_bytes()).into())
    }

    /// Check that the id matches the content and the signature matches the id.
    ///
    /// Any change to author, timestamp, kind, tags or content after signing
    /// makes this return `false`.
    pub fn verify(&self) -> bool {
        let Ok(id) =
            Self::compute_id(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content)
        else {
            return false;
        };
        hex::encode(id) == self.id && keys::verify(&self.pubkey, &id, &self.sig)
    }

    pub fn record_kind(&self) -> Option<RecordKind> {
        RecordKind::from_u16(self.kind)
    }

    /// Value of the `d` tag of mutable records.
    pub fn identifier(&self) -> Option<&str> {
        self.tags.get("d")
    }
}
