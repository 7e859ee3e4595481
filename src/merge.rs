//! Merge and deduplication of partial result sets
//!
//! Overlapping walks return the same records more than once. A [`MergedSet`]
//! keys everything by record id and materializes one sequence ordered by
//! timestamp, ties broken by id.

use crate::record::Record;
use std::collections::HashMap;

/// Records keyed by id, last write wins
#[derive(Debug, Clone)]
pub struct MergedSet<R: Record> {
    records: HashMap<R::Id, R>,
}

impl<R: Record> Default for MergedSet<R> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<R: Record> MergedSet<R> {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any earlier record with the same id
    ///
    /// Returns `true` when the id was already present.
    pub fn insert(&mut self, record: R) -> bool {
        self.records.insert(record.id().clone(), record).is_some()
    }

    /// Check whether a record with this id is present
    pub fn contains(&self, id: &R::Id) -> bool {
        self.records.contains_key(id)
    }

    /// Number of unique records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records sorted ascending by timestamp, then id
    pub fn into_sorted(self) -> Vec<R> {
        let mut records: Vec<R> = self.records.into_values().collect();
        records.sort_by(|a, b| {
            a.timestamp()
                .cmp(b.timestamp())
                .then_with(|| a.id().cmp(b.id()))
        });
        records
    }
}

impl<R: Record> Extend<R> for MergedSet<R> {
    fn extend<T: IntoIterator<Item = R>>(&mut self, iter: T) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl<R: Record> FromIterator<R> for MergedSet<R> {
    fn from_iter<T: IntoIterator<Item = R>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

/// Merge any number of partial result sets into one ordered sequence
pub fn merge<R, S, I>(sets: S) -> Vec<R>
where
    R: Record,
    S: IntoIterator<Item = I>,
    I: IntoIterator<Item = R>,
{
    sets.into_iter().flatten().collect::<MergedSet<R>>().into_sorted()
}
