//! TTL cache of full answers, keyed by `(query, top_k)`.
//!
//! Queries are normalized before hashing: lowercased, trimmed, and internal
//! whitespace runs collapsed to one space. `"What is Rust?"` and
//! `"  what   is rust? "` share an entry; punctuation is significant.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::time::Instant;

use crate::rag::Answer;

#[derive(Debug, Clone)]
struct CacheEntry {
    answer: Answer,
    created_at: Instant,
}

/// Process-wide response cache. All operations on the map run under one lock.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

/// Normalized form of a query used for keying.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Stable key: SHA-256 hex of `{"k": top_k, "q": normalized}`.
pub fn cache_key(query: &str, top_k: usize) -> String {
    let material = serde_json::json!({ "k": top_k, "q": normalize_query(query) });
    let digest = Sha256::digest(material.to_string().as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.duration_since(entry.created_at) >= self.ttl
    }

    /// Stored answer if still fresh; an expired entry is evicted.
    pub fn get(&self, query: &str, top_k: usize) -> Option<Answer> {
        let key = cache_key(query, top_k);
        let mut entries = self.entries.lock().ok()?;

        let now = Instant::now();
        match entries.get(&key) {
            Some(entry) if !self.is_expired(entry, now) => Some(entry.answer.clone()),
            Some(_) => {
                entries.remove(&key);
                tracing::debug!("Cache entry expired for top_k={}", top_k);
                None
            }
            None => None,
        }
    }

    /// Store or overwrite the answer, stamped with the current time.
    pub fn set(&self, query: &str, top_k: usize, answer: Answer) {
        let key = cache_key(query, top_k);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                CacheEntry {
                    answer,
                    created_at: Instant::now(),
                },
            );
        }
    }

    /// Remove every expired entry; returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!("Removed {} expired cache entries", removed);
        }
        removed
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: &str) -> Answer {
        Answer::new(text.to_string(), Vec::new())
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_query("  What   IS\tRust? "), "what is rust?");
        assert_eq!(cache_key("What is Rust?", 5), cache_key(" what  is rust? ", 5));
        assert_ne!(cache_key("What is Rust?", 5), cache_key("What is Rust?", 3));
        assert_ne!(cache_key("What is Rust?", 5), cache_key("What is Rust", 5));
        assert_eq!(cache_key("q", 1).len(), 64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_after_set_then_expiry() {
        let cache = ResponseCache::new(Duration::from_secs(5));
        cache.set("q", 5, answer("a"));
        assert_eq!(cache.get("q", 5).unwrap().text, "a");

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cache.get("q", 5).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_and_restamps() {
        let cache = ResponseCache::new(Duration::from_secs(5));
        cache.set("q", 5, answer("old"));
        tokio::time::advance(Duration::from_secs(4)).await;
        cache.set("q", 5, answer("new"));
        tokio::time::advance(Duration::from_secs(4)).await;

        assert_eq!(cache.get("q", 5).unwrap().text, "new");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_expired_counts() {
        let cache = ResponseCache::new(Duration::from_secs(5));
        cache.set("one", 5, answer("1"));
        cache.set("two", 5, answer("2"));
        tokio::time::advance(Duration::from_secs(3)).await;
        cache.set("three", 5, answer("3"));
        tokio::time::advance(Duration::from_secs(3)).await;

        assert_eq!(cache.cleanup_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.cleanup_expired(), 0);

        cache.clear();
        assert!(cache.is_empty());
    }
}
