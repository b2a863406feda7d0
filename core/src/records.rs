//! Ordered record collections: the active and deleted partitions.

use std::collections::HashSet;

use crate::types::Record;

/// Records in insertion order. Display order is produced by `sort_desc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    rows: Vec<Record>,
}

impl RecordSet {
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn ids(&self) -> Vec<i64> {
        self.rows.iter().filter_map(Record::id).collect()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.find(id).is_some()
    }

    pub fn find(&self, id: i64) -> Option<&Record> {
        self.rows.iter().find(|r| r.id() == Some(id))
    }

    pub fn prepend(&mut self, record: Record) {
        self.rows.insert(0, record);
    }

    pub fn extend(&mut self, records: Vec<Record>) {
        self.rows.extend(records);
    }

    /// Remove and return the record with this id.
    pub fn take(&mut self, id: i64) -> Option<Record> {
        let pos = self.rows.iter().position(|r| r.id() == Some(id))?;
        Some(self.rows.remove(pos))
    }

    /// Remove every record whose id is in `ids`, returning them in their
    /// current relative order.
    pub fn drain_ids(&mut self, ids: &HashSet<i64>) -> Vec<Record> {
        let (taken, kept) = std::mem::take(&mut self.rows)
            .into_iter()
            .partition(|r| r.id().is_some_and(|id| ids.contains(&id)));
        self.rows = kept;
        taken
    }

    /// Deep-merge `patch` into the record with this id. Returns false when
    /// no such record exists.
    pub fn merge(&mut self, id: i64, patch: &Record) -> bool {
        match self.rows.iter_mut().find(|r| r.id() == Some(id)) {
            Some(record) => {
                record.merge(patch);
                true
            }
            None => false,
        }
    }

    /// Provisional id for a record the server has not numbered yet.
    pub fn next_id(&self) -> i64 {
        self.rows.iter().filter_map(Record::id).max().map_or(1, |max| max + 1)
    }

    pub fn sort_desc(&mut self) {
        self.rows.sort_by(|a, b| b.id().cmp(&a.id()));
    }
}
