//! Cancellation tokens of in-flight work, keyed for targeted stops.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub(crate) struct TokenSet<K> {
    tokens: Mutex<HashMap<K, CancellationToken>>,
}

impl<K: Eq + Hash + Clone> TokenSet<K> {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Track `token` under `key` until the returned lease is dropped.
    pub fn lease(&self, key: K, token: CancellationToken) -> TokenLease<'_, K> {
        self.lock().insert(key.clone(), token);
        TokenLease { set: self, key }
    }

    /// Cancel the token under `key`. False when nothing is tracked there.
    pub fn cancel(&self, key: &K) -> bool {
        match self.lock().get(key) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) -> usize {
        let tokens = self.lock();
        for token in tokens.values() {
            token.cancel();
        }
        tokens.len()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, CancellationToken>> {
        self.tokens.lock().unwrap_or_else(|p| p.into_inner())
    }
}

pub(crate) struct TokenLease<'a, K: Eq + Hash + Clone> {
    set: &'a TokenSet<K>,
    key: K,
}

impl<K: Eq + Hash + Clone> Drop for TokenLease<'_, K> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_scopes_token() {
        let set: TokenSet<String> = TokenSet::new();
        let token = CancellationToken::new();
        {
            let _lease = set.lease("J1".to_string(), token.clone());
            assert!(set.contains(&"J1".to_string()));
            assert!(set.cancel(&"J1".to_string()));
            assert!(token.is_cancelled());
        }
        assert!(!set.contains(&"J1".to_string()));
        assert!(!set.cancel(&"J1".to_string()));
    }

    #[test]
    fn test_cancel_all() {
        let set: TokenSet<u64> = TokenSet::new();
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        let _la = set.lease(1, a.clone());
        let _lb = set.lease(2, b.clone());
        assert_eq!(set.cancel_all(), 2);
        assert!(a.is_cancelled() && b.is_cancelled());
    }
}
