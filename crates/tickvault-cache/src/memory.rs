//! Byte-bounded memory tier with write-time LRU eviction.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone)]
pub(crate) struct MemoryEntry {
    pub(crate) value: AnyValue,
    pub(crate) expires_at: u64,
    pub(crate) size_bytes: u64,
    seq: u64,
}

impl MemoryEntry {
    pub(crate) const fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }
}

/// Outcome of inserting into the memory tier.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Insert {
    pub(crate) stored: bool,
    pub(crate) evicted: Vec<String>,
}

/// Entries ordered by write sequence; the lowest sequence is evicted first.
#[derive(Debug)]
pub(crate) struct MemoryTier {
    entries: HashMap<String, MemoryEntry>,
    by_write: BTreeMap<u64, String>,
    used_bytes: u64,
    max_bytes: u64,
    next_seq: u64,
}

impl MemoryTier {
    pub(crate) fn new(max_bytes: u64) -> Self {
        Self {
            entries: HashMap::new(),
            by_write: BTreeMap::new(),
            used_bytes: 0,
            max_bytes,
            next_seq: 0,
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<&MemoryEntry> {
        self.entries.get(key)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub(crate) const fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) const fn free_bytes(&self) -> u64 {
        self.max_bytes.saturating_sub(self.used_bytes)
    }

    /// Writes an entry, evicting the oldest writes until it fits.
    ///
    /// An entry larger than the whole budget is not stored; any previous
    /// value under the key is removed either way.
    pub(crate) fn insert(&mut self, key: &str, value: AnyValue, expires_at: u64, size_bytes: u64) -> Insert {
        self.remove(key);

        if size_bytes > self.max_bytes {
            return Insert::default();
        }

        let mut evicted = Vec::new();
        while self.used_bytes + size_bytes > self.max_bytes {
            let Some((_, oldest)) = self.by_write.pop_first() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&oldest) {
                self.used_bytes -= entry.size_bytes;
            }
            evicted.push(oldest);
        }

        self.put(key, value, expires_at, size_bytes);
        Insert {
            stored: true,
            evicted,
        }
    }

    /// Stores an entry only if it fits in the free budget.
    pub(crate) fn insert_if_fits(&mut self, key: &str, value: AnyValue, expires_at: u64, size_bytes: u64) -> bool {
        self.remove(key);
        if size_bytes > self.free_bytes() {
            return false;
        }
        self.put(key, value, expires_at, size_bytes);
        true
    }

    fn put(&mut self, key: &str, value: AnyValue, expires_at: u64, size_bytes: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_write.insert(seq, key.to_string());
        self.used_bytes += size_bytes;
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at,
                size_bytes,
                seq,
            },
        );
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };
        self.by_write.remove(&entry.seq);
        self.used_bytes -= entry.size_bytes;
        true
    }

    pub(crate) fn remove_expired(&mut self, now_ms: u64) -> Vec<String> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now_ms))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.by_write.clear();
        self.used_bytes = 0;
    }
}
