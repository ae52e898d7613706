//! Reverse indexes over the registry.
//!
//! Both indexes mirror the registry exactly: every registered token appears
//! under its callback and key, and under its scope. Empty inner collections
//! are pruned as soon as they empty out, so subscribe/unsubscribe churn
//! leaves nothing behind.

use crate::token::{CallbackId, ScopeId, TokenId};
use crate::topic::TopicKey;
use std::collections::{BTreeSet, HashMap};

/// callback -> key -> tokens.
#[derive(Debug, Default)]
pub struct CallbackIndex {
    callbacks: HashMap<CallbackId, HashMap<TopicKey, BTreeSet<TokenId>>>,
}

impl CallbackIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a token issued for `callback` under `key`.
    pub fn record(&mut self, callback: CallbackId, key: TopicKey, token: TokenId) {
        self.callbacks
            .entry(callback)
            .or_default()
            .entry(key)
            .or_default()
            .insert(token);
    }

    /// Forget a token, pruning empty sets and maps bottom-up.
    ///
    /// Returns `true` if the token was recorded.
    pub fn forget(&mut self, callback: CallbackId, key: &TopicKey, token: TokenId) -> bool {
        let Some(keys) = self.callbacks.get_mut(&callback) else {
            return false;
        };
        let Some(tokens) = keys.get_mut(key) else {
            return false;
        };

        let removed = tokens.remove(&token);
        if tokens.is_empty() {
            keys.remove(key);
        }
        if keys.is_empty() {
            self.callbacks.remove(&callback);
        }
        removed
    }

    /// Check if a callback has any recorded tokens.
    #[must_use]
    pub fn exists(&self, callback: CallbackId) -> bool {
        self.callbacks.contains_key(&callback)
    }

    /// Get every key and token recorded for a callback.
    #[must_use]
    pub fn lookup(&self, callback: CallbackId) -> Option<&HashMap<TopicKey, BTreeSet<TokenId>>> {
        self.callbacks.get(&callback)
    }

    /// All tokens recorded for a callback, across keys.
    #[must_use]
    pub fn tokens(&self, callback: CallbackId) -> Vec<TokenId> {
        self.lookup(callback)
            .map(|keys| keys.values().flatten().copied().collect())
            .unwrap_or_default()
    }

    /// Tokens recorded for a callback under one key.
    #[must_use]
    pub fn tokens_for_key(&self, callback: CallbackId, key: &TopicKey) -> Vec<TokenId> {
        self.lookup(callback)
            .and_then(|keys| keys.get(key))
            .map(|tokens| tokens.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of callbacks with at least one recorded token.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Whether no callbacks are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

/// scope -> tokens.
#[derive(Debug, Default)]
pub struct ScopeIndex {
    scopes: HashMap<ScopeId, BTreeSet<TokenId>>,
}

impl ScopeIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the tokens owned by a scope.
    #[must_use]
    pub fn lookup(&self, scope: ScopeId) -> Option<&BTreeSet<TokenId>> {
        self.scopes.get(&scope)
    }

    /// Record a token owned by `scope`.
    pub fn record(&mut self, scope: ScopeId, token: TokenId) {
        self.scopes.entry(scope).or_default().insert(token);
    }

    /// Forget a token, dropping the scope once it owns nothing.
    ///
    /// Returns `true` if the token was recorded.
    pub fn forget(&mut self, scope: ScopeId, token: TokenId) -> bool {
        let Some(tokens) = self.scopes.get_mut(&scope) else {
            return false;
        };

        let removed = tokens.remove(&token);
        if tokens.is_empty() {
            self.scopes.remove(&scope);
        }
        removed
    }

    /// Whether a scope owns `token`.
    #[must_use]
    pub fn contains(&self, scope: ScopeId, token: TokenId) -> bool {
        self.scopes
            .get(&scope)
            .is_some_and(|tokens| tokens.contains(&token))
    }

    /// Number of scopes owning at least one token.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Whether no scopes are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
