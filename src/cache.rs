// Memoised table loading keyed by source content

use crate::csv_reader::{load_bytes, EncodingCandidate, Source};
use crate::data::Table;
use crate::error::LoadError;
use crate::normalize::{normalize, RenameMap};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

/// Hex SHA-256 of the raw source bytes.
pub fn content_key(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// A loaded, normalised table and how it was decoded.
#[derive(Debug, Clone)]
pub struct CachedTable {
    pub key: String,
    pub table: Arc<Table>,
    pub encoding: EncodingCandidate,
}

/// Parsed tables keyed by content digest. A source whose bytes change gets a
/// new key, so stale entries are never served; the oldest entry is evicted
/// once `capacity` is reached.
#[derive(Debug)]
pub struct TableCache {
    capacity: usize,
    entries: HashMap<String, CachedTable>,
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl TableCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the table for `source`, parsing only when its content has not
    /// been seen before.
    pub fn get_or_load(
        &mut self,
        source: &Source,
        encodings: &[EncodingCandidate],
        renames: Option<&RenameMap>,
    ) -> Result<CachedTable, LoadError> {
        let bytes = source.read_bytes()?;
        let key = content_key(&bytes);

        if let Some(entry) = self.entries.get(&key) {
            self.hits += 1;
            debug!(source = %source.name(), key = %&key[..12], "cache hit");
            return Ok(entry.clone());
        }

        self.misses += 1;
        let loaded = load_bytes(&source.name(), &bytes, encodings)?;
        let entry = CachedTable {
            key: key.clone(),
            table: Arc::new(normalize(loaded.table, renames)),
            encoding: loaded.encoding,
        };

        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                info!(key = %&oldest[..12], "evicting cached table");
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, entry.clone());
        Ok(entry)
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&mut self, key: &str) -> bool {
        self.order.retain(|k| k != key);
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new(8)
    }
}
