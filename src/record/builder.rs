//! Record construction and signing.

use std::time::{SystemTime, UNIX_EPOCH};

use super::{Keys, Record, SigningError, Tags};
use crate::core::RecordKind;

/// Timestamp source for new records.
///
/// Never goes below `floor`: a redeploy stamped within the same second as the
/// record it replaces still gets a strictly newer `created_at`.
#[derive(Debug, Default)]
pub struct Clock {
    floor: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock whose readings are strictly greater than `previous`.
    pub fn after(previous: u64) -> Self {
        Self {
            floor: previous.saturating_add(1),
        }
    }

    /// Current unix time in seconds, clamped to the floor.
    pub fn now(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        wall.max(self.floor)
    }
}

/// Builds signed records for one author.
#[derive(Debug)]
pub struct RecordBuilder<'k> {
    keys: &'k Keys,
    clock: Clock,
}

impl<'k> RecordBuilder<'k> {
    pub fn new(keys: &'k Keys) -> Self {
        Self::with_clock(keys, Clock::new())
    }

    pub fn with_clock(keys: &'k Keys, clock: Clock) -> Self {
        Self { keys, clock }
    }

    /// Stamp, tag and sign `content` as a record of `kind`.
    pub fn build(
        &self,
        content: String,
        kind: RecordKind,
        tags: Tags,
    ) -> Result<Record, SigningError> {
        let pubkey = self.keys.public_hex();
        let created_at = self.clock.now();
        let kind = kind.as_u16();
        let id = Record::compute_id(&pubkey, created_at, kind, &tags, &content)?;
        let sig = self.keys.sign(&id);

        Ok(Record {
            id: hex::encode(id),
            pubkey,
            created_at,
            kind,
            tags,
            content,
            sig,
        })
    }
}
