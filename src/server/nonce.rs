//! Freshness nonces for control requests
//!
//! A nonce is minted under bearer auth, expires after a fixed TTL and is
//! consumed on first use, so a captured control request cannot be replayed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

const NONCE_TTL_SECS: i64 = 600;

#[derive(Clone)]
pub struct NonceStore {
    inner: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
    ttl: Duration,
}

impl Default for NonceStore {
    fn default() -> Self {
        Self::with_ttl(Duration::seconds(NONCE_TTL_SECS))
    }
}

impl NonceStore {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    pub fn issue(&self) -> String {
        let nonce = Uuid::new_v4().to_string();
        let mut map = self.lock();
        let now = Utc::now();
        map.retain(|_, expires| *expires > now);
        map.insert(nonce.clone(), now + self.ttl);
        nonce
    }

    /// Consume a nonce; true only for a known, unexpired, first use.
    pub fn consume(&self, nonce: &str) -> bool {
        let mut map = self.lock();
        match map.remove(nonce) {
            Some(expires) => expires > Utc::now(),
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_is_single_use() {
        let store = NonceStore::default();
        let nonce = store.issue();
        assert!(store.consume(&nonce));
        assert!(!store.consume(&nonce));
    }

    #[test]
    fn unknown_nonce_is_rejected() {
        let store = NonceStore::default();
        assert!(!store.consume("not-a-nonce"));
    }

    #[test]
    fn expired_nonce_is_rejected() {
        let store = NonceStore::with_ttl(Duration::seconds(-1));
        let nonce = store.issue();
        assert!(!store.consume(&nonce));
    }
}
