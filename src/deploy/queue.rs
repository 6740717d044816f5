//! Ordered records for one deploy.

use crate::record::Record;

/// Append-only list of signed records with an explicit root marker.
///
/// Once a root is set it stays the last entry: records pushed afterwards are
/// inserted in front of it.
#[derive(Debug, Default)]
pub struct PublishQueue {
    records: Vec<Record>,
    root: Option<usize>,
}

impl PublishQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        match self.root {
            Some(root) => {
                self.records.insert(root, record);
                self.root = Some(root + 1);
            }
            None => self.records.push(record),
        }
    }

    /// Append the root record. Replaces a previously set root.
    pub fn set_root(&mut self, record: Record) {
        if let Some(previous) = self.root.take() {
            self.records.remove(previous);
        }
        self.records.push(record);
        self.root = Some(self.records.len() - 1);
    }

    pub fn root(&self) -> Option<&Record> {
        self.root.map(|index| &self.records[index])
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RecordKind;
    use crate::record::{Keys, RecordBuilder, Tags};

    fn record(builder: &RecordBuilder<'_>, content: &str) -> Record {
        builder
            .build(content.into(), RecordKind::StyleImmutable, Tags::new())
            .unwrap()
    }

    #[test]
    fn test_root_stays_last() {
        let keys = Keys::generate();
        let builder = RecordBuilder::new(&keys);
        let mut queue = PublishQueue::new();
        queue.push(record(&builder, "a"));
        queue.set_root(record(&builder, "root"));
        queue.push(record(&builder, "b"));

        let contents: Vec<_> = queue.records().iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, ["a", "b", "root"]);
        assert_eq!(queue.root().map(|r| r.content.as_str()), Some("root"));
    }

    #[test]
    fn test_set_root_replaces() {
        let keys = Keys::generate();
        let builder = RecordBuilder::new(&keys);
        let mut queue = PublishQueue::new();
        queue.set_root(record(&builder, "old"));
        queue.push(record(&builder, "a"));
        queue.set_root(record(&builder, "new"));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.records()[0].content, "a");
        assert_eq!(queue.root().map(|r| r.content.as_str()), Some("new"));
    }

    #[test]
    fn test_no_root() {
        let mut queue = PublishQueue::new();
        assert!(queue.is_empty());
        assert!(queue.root().is_none());
        let keys = Keys::generate();
        queue.push(record(&RecordBuilder::new(&keys), "a"));
        assert!(queue.root().is_none());
    }
}
