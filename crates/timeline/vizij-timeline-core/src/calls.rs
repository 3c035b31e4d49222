//! Pending callbacks ordered by due time.
//!
//! Entries are keyed by `(when, seq)`: `when` ordered with `f64::total_cmp`,
//! ties broken by insertion sequence so equal times fire in registration order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Ordering key for a pending call.
#[derive(Clone, Copy, Debug)]
pub struct CallKey {
    pub when: f64,
    pub seq: u64,
}

impl PartialEq for CallKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CallKey {}

impl PartialOrd for CallKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CallKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.when
            .total_cmp(&other.when)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Sorted queue of callbacks awaiting their due time.
pub struct CallQueue<F> {
    entries: BTreeMap<CallKey, F>,
    next_seq: u64,
}

impl<F> Default for CallQueue<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> CallQueue<F> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Insert after every existing entry with the same `when`.
    pub fn insert(&mut self, when: f64, callback: F) -> CallKey {
        let key = CallKey {
            when,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(key, callback);
        key
    }

    /// Sequence number the next insert will get. Entries below it already exist.
    #[inline]
    pub fn watermark(&self) -> u64 {
        self.next_seq
    }

    /// Remove and return the earliest entry due at `now` that was inserted
    /// before `watermark`. Later insertions are left for the next sweep.
    pub fn pop_due(&mut self, now: f64, watermark: u64) -> Option<(CallKey, F)> {
        let key = self
            .entries
            .keys()
            .take_while(|k| k.when <= now)
            .find(|k| k.seq < watermark)
            .copied()?;
        self.entries.remove(&key).map(|f| (key, f))
    }

    pub fn contains(&self, key: &CallKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Due times in firing order.
    pub fn whens(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.keys().map(|k| k.when)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
