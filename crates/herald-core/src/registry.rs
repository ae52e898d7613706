//! Subscription registry.
//!
//! Maps each [`TopicKey`] to an entry holding the key's match predicate and
//! the callbacks subscribed under it. Entries iterate in the order their key
//! was first registered; callbacks within an entry iterate in subscription
//! order. Empty entries are removed eagerly.

use crate::callback::Callback;
use crate::token::TokenId;
use crate::topic::{Matcher, TopicKey};
use std::collections::{hash_map, BTreeMap, HashMap};

/// Registry entry for one key.
pub struct Entry<T> {
    seq: u64,
    matcher: Matcher,
    callbacks: BTreeMap<TokenId, Callback<T>>,
}

impl<T> Entry<T> {
    /// The predicate claimed by the first subscription to this key.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Tokens registered under this key.
    pub fn tokens(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.callbacks.keys().copied()
    }

    /// Callbacks registered under this key, in subscription order.
    pub fn callbacks(&self) -> impl Iterator<Item = &Callback<T>> {
        self.callbacks.values()
    }

    /// Number of subscriptions under this key.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Whether this entry has no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

/// The primary subscription store.
pub struct Registry<T> {
    entries: HashMap<TopicKey, Entry<T>>,
    /// Registration order (entry seq -> key).
    order: BTreeMap<u64, TopicKey>,
    next_seq: u64,
}

impl<T> Registry<T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Get the entry for a key.
    #[must_use]
    pub fn get(&self, key: &TopicKey) -> Option<&Entry<T>> {
        self.entries.get(key)
    }

    /// Check if a key has an entry.
    #[must_use]
    pub fn exists(&self, key: &TopicKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Register a callback under a key.
    ///
    /// The first registration for a key fixes its matcher; later ones reuse it.
    pub fn add(&mut self, key: TopicKey, matcher: Matcher, token: TokenId, callback: Callback<T>) {
        let entry = match self.entries.entry(key) {
            hash_map::Entry::Occupied(occupied) => occupied.into_mut(),
            hash_map::Entry::Vacant(vacant) => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.order.insert(seq, vacant.key().clone());
                vacant.insert(Entry {
                    seq,
                    matcher,
                    callbacks: BTreeMap::new(),
                })
            }
        };
        entry.callbacks.insert(token, callback);
    }

    /// Remove a token from a key's entry, dropping the entry once empty.
    ///
    /// Returns `true` if the token was registered under the key.
    pub fn remove(&mut self, key: &TopicKey, token: TokenId) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };

        let removed = entry.callbacks.remove(&token).is_some();
        if entry.callbacks.is_empty() {
            let seq = entry.seq;
            self.entries.remove(key);
            self.order.remove(&seq);
        }
        removed
    }

    /// Visit entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&TopicKey, &Entry<T>)> {
        self.order
            .values()
            .filter_map(|key| self.entries.get(key).map(|entry| (key, entry)))
    }

    /// Visit entries in registration order with a closure.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&TopicKey, &Entry<T>),
    {
        for (key, entry) in self.iter() {
            visitor(key, entry);
        }
    }

    /// Collect every callback whose entry matches `topic`.
    ///
    /// Order: entry registration order, then subscription order within an entry.
    #[must_use]
    pub fn resolve(&self, topic: &str) -> Vec<Callback<T>> {
        let mut resolved = Vec::new();
        self.for_each(|_, entry| {
            if entry.matcher.is_match(topic) {
                resolved.extend(entry.callbacks().cloned());
            }
        });
        resolved
    }

    /// Whether any entry matches `topic`.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        self.entries
            .values()
            .any(|entry| !entry.is_empty() && entry.matcher.is_match(topic))
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::{normalize, Topic};
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Callback<()> {
        let log = Arc::clone(log);
        Callback::new(move |_, _| log.lock().unwrap().push(name))
    }

    fn add(registry: &mut Registry<()>, topic: Topic, cb: Callback<()>) -> (TopicKey, TokenId) {
        let (key, matcher) = normalize(&topic).unwrap();
        let token = TokenId::generate();
        registry.add(key.clone(), matcher, token, cb);
        (key, token)
    }

    #[test]
    fn test_add_and_remove() {
        let mut registry = Registry::new();
        let (key, token) = add(&mut registry, "a".into(), Callback::new(|_, _| {}));

        assert!(registry.exists(&key));
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get(&key).unwrap().len(), 1);

        assert!(registry.remove(&key, token));
        assert!(!registry.exists(&key));
        assert!(registry.is_empty());

        // Removing again is a no-op.
        assert!(!registry.remove(&key, token));
    }

    #[test]
    fn test_same_key_shares_entry() {
        let mut registry = Registry::new();
        let (k1, t1) = add(&mut registry, "a".into(), Callback::new(|_, _| {}));
        let (k2, t2) = add(&mut registry, "a".into(), Callback::new(|_, _| {}));

        assert_eq!(k1, k2);
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get(&k1).unwrap().len(), 2);

        assert!(registry.remove(&k1, t1));
        assert!(registry.exists(&k1));
        assert!(registry.remove(&k2, t2));
        assert!(!registry.exists(&k1));
    }

    #[test]
    fn test_first_matcher_is_kept() {
        let mut registry: Registry<()> = Registry::new();
        let key = TopicKey::from("shared");
        let (_, first) = normalize(&Topic::pattern("^x$").unwrap()).unwrap();
        let (_, second) = normalize(&Topic::pattern("^y$").unwrap()).unwrap();

        registry.add(key.clone(), first, TokenId::generate(), Callback::new(|_, _| {}));
        registry.add(key.clone(), second, TokenId::generate(), Callback::new(|_, _| {}));

        assert_eq!(registry.get(&key).unwrap().matcher().as_str(), "^x$");
    }

    #[test]
    fn test_resolve_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = Registry::new();
        add(&mut registry, "t".into(), recorder(&log, "first"));
        add(&mut registry, Topic::pattern("^t").unwrap(), recorder(&log, "pattern"));
        add(&mut registry, "t".into(), recorder(&log, "second"));
        add(&mut registry, "other".into(), recorder(&log, "other"));

        for cb in registry.resolve("t") {
            cb.call("t", None);
        }
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "pattern"]);
    }

    #[test]
    fn test_order_after_entry_recreated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = Registry::new();
        let (key, token) = add(&mut registry, Topic::pattern(".").unwrap(), recorder(&log, "a"));
        add(&mut registry, "x".into(), recorder(&log, "b"));

        registry.remove(&key, token);
        add(&mut registry, Topic::pattern(".").unwrap(), recorder(&log, "c"));

        for cb in registry.resolve("x") {
            cb.call("x", None);
        }
        assert_eq!(*log.lock().unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn test_matches() {
        let mut registry = Registry::new();
        assert!(!registry.matches("a"));
        add(&mut registry, Topic::pattern("^a").unwrap(), Callback::new(|_, _| {}));
        assert!(registry.matches("abc"));
        assert!(!registry.matches("bc"));
    }
}
