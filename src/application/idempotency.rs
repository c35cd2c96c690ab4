//! In-process idempotency cache for checkout requests.
//!
//! Collapses client retry storms onto a single logical checkout. Entries are
//! deliberately not durable: the cache exists to absorb retried network
//! requests, not to provide exactly-once semantics across restarts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::ports::{IdempotencyBegin, IdempotencyStore};

#[derive(Debug, Clone)]
enum Entry {
    Pending,
    Done {
        order_id: i64,
        expires_at: DateTime<Utc>,
    },
}

#[derive(Default)]
pub struct InMemoryIdempotencyStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdempotencyStore for InMemoryIdempotencyStore {
    fn begin(&self, key: &str) -> IdempotencyBegin {
        let mut entries = self.entries.lock().expect("idempotency lock poisoned");
        match entries.get(key) {
            Some(Entry::Pending) => IdempotencyBegin::InFlight,
            Some(Entry::Done {
                order_id,
                expires_at,
            }) => {
                if *expires_at > Utc::now() {
                    IdempotencyBegin::Done {
                        order_id: *order_id,
                    }
                } else {
                    // Expired result: evict and treat the request as new.
                    entries.insert(key.to_string(), Entry::Pending);
                    IdempotencyBegin::Started
                }
            }
            None => {
                // Register PENDING before any work starts to close the
                // window where two identical requests both look "new".
                entries.insert(key.to_string(), Entry::Pending);
                IdempotencyBegin::Started
            }
        }
    }

    fn complete(&self, key: &str, order_id: i64, ttl: Duration) {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(60));
        self.entries
            .lock()
            .expect("idempotency lock poisoned")
            .insert(
                key.to_string(),
                Entry::Done {
                    order_id,
                    expires_at,
                },
            );
    }

    fn evict(&self, key: &str) {
        self.entries
            .lock()
            .expect("idempotency lock poisoned")
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn first_begin_starts_second_is_in_flight() {
        let store = InMemoryIdempotencyStore::new();
        assert_eq!(store.begin("k"), IdempotencyBegin::Started);
        assert_eq!(store.begin("k"), IdempotencyBegin::InFlight);
    }

    #[test]
    fn completed_key_replays_within_ttl() {
        let store = InMemoryIdempotencyStore::new();
        assert_eq!(store.begin("k"), IdempotencyBegin::Started);
        store.complete("k", 42, Duration::from_secs(60));
        assert_eq!(store.begin("k"), IdempotencyBegin::Done { order_id: 42 });
    }

    #[test]
    fn expired_result_is_evicted_and_restarted() {
        let store = InMemoryIdempotencyStore::new();
        assert_eq!(store.begin("k"), IdempotencyBegin::Started);
        store.complete("k", 42, Duration::from_secs(0));
        assert_eq!(store.begin("k"), IdempotencyBegin::Started);
    }

    #[test]
    fn evicted_key_can_retry() {
        let store = InMemoryIdempotencyStore::new();
        assert_eq!(store.begin("k"), IdempotencyBegin::Started);
        store.evict("k");
        assert_eq!(store.begin("k"), IdempotencyBegin::Started);
    }

    #[test]
    fn distinct_keys_are_independent() {
        let store = InMemoryIdempotencyStore::new();
        assert_eq!(store.begin("a"), IdempotencyBegin::Started);
        assert_eq!(store.begin("b"), IdempotencyBegin::Started);
    }

    #[test]
    fn concurrent_begins_admit_exactly_one() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.begin("race"))
            })
            .collect();
        let started = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|b| *b == IdempotencyBegin::Started)
            .count();
        assert_eq!(started, 1, "exactly one caller may run the checkout");
    }
}
