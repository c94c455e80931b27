use std::collections::HashMap;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::AnalysisResult;

pub const CACHE_TTL: Duration = Duration::from_secs(60 * 60 * 24);
pub const MAX_ENTRIES: usize = 1_000;

const KEY_SEPARATOR: u8 = 0x1f;

/// Cache key over the analysed text and the rules it was checked against.
pub fn cache_key(content: &str, rules: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update([KEY_SEPARATOR]);
    hasher.update(rules.as_bytes());
    hex::encode(hasher.finalize())
}

struct Entry {
    result: AnalysisResult,
    stored_at: Instant,
}

/// Process-local analysis results. Expired entries are dropped on read and
/// swept on every insert; past `max_entries` the oldest entry is evicted.
pub struct AnalysisCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
    max_entries: usize,
}

impl AnalysisCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub async fn get(&self, key: &str) -> Option<AnalysisResult> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    return Some(entry.result.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| entry.stored_at.elapsed() >= self.ttl)
        {
            entries.remove(key);
        }
        None
    }

    pub async fn insert(&self, key: String, result: AnalysisResult) {
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);

        while entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(oldest) => {
                    entries.remove(&oldest);
                }
                None => break,
            }
        }

        entries.insert(
            key,
            Entry {
                result,
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(CACHE_TTL)
    }
}
