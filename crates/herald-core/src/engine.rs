//! The publish/subscribe engine.
//!
//! [`PubSub`] is a cheap, cloneable handle onto one shared engine. The root
//! handle and every handle produced by [`PubSub::isolate`] see the same
//! registry: publishing from any of them reaches every matching subscriber.
//! A handle's scope only decides which subscriptions its
//! [`unsubscribe_all`](PubSub::unsubscribe_all) family removes.
//!
//! All engine state sits behind one mutex. It is held for a single
//! subscribe, unsubscribe or resolve step and never while callbacks run, so
//! callbacks may freely subscribe, unsubscribe and publish.

use crate::callback::Callback;
use crate::config::EngineConfig;
use crate::dispatch::{Delivery, DeliveryUnit};
use crate::error::Result;
use crate::index::{CallbackIndex, ScopeIndex};
use crate::metrics;
use crate::registry::Registry;
use crate::scheduler::{Scheduler, ThreadScheduler};
use crate::token::{CallbackId, ScopeId, Token, TokenId};
use crate::topic::{key_of, normalize, validate_topic, Matcher, Topic, TopicKey};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// What a live token is bound to.
#[derive(Debug, Clone)]
struct Binding {
    scope: ScopeId,
    key: TopicKey,
    callback: CallbackId,
}

/// Registry plus the derived indexes, kept consistent under one lock.
struct State<T> {
    registry: Registry<T>,
    callbacks: CallbackIndex,
    scopes: ScopeIndex,
    live: HashMap<TokenId, Binding>,
}

impl<T> State<T> {
    fn new() -> Self {
        Self {
            registry: Registry::new(),
            callbacks: CallbackIndex::new(),
            scopes: ScopeIndex::new(),
            live: HashMap::new(),
        }
    }

    fn insert(
        &mut self,
        scope: ScopeId,
        key: TopicKey,
        matcher: Matcher,
        token: TokenId,
        callback: Callback<T>,
    ) {
        let callback_id = callback.id();
        self.callbacks.record(callback_id, key.clone(), token);
        self.scopes.record(scope, token);
        self.live.insert(
            token,
            Binding {
                scope,
                key: key.clone(),
                callback: callback_id,
            },
        );
        self.registry.add(key, matcher, token, callback);
    }

    fn remove(&mut self, token: TokenId) -> bool {
        let Some(binding) = self.live.remove(&token) else {
            return false;
        };
        self.registry.remove(&binding.key, token);
        self.callbacks.forget(binding.callback, &binding.key, token);
        self.scopes.forget(binding.scope, token);
        true
    }

    fn remove_all(&mut self, tokens: impl IntoIterator<Item = TokenId>) -> usize {
        tokens.into_iter().filter(|token| self.remove(*token)).count()
    }
}

/// Engine state shared by every handle.
pub(crate) struct Shared<T> {
    state: Mutex<State<T>>,
    scheduler: Arc<dyn Scheduler>,
    config: EngineConfig,
}

impl<T: Send + Sync + 'static> Shared<T> {
    pub(crate) fn unsubscribe_token(&self, token: TokenId) -> bool {
        let (removed, active) = {
            let mut state = self.state.lock();
            (state.remove(token), state.live.len())
        };

        if removed {
            debug!(token = %token, "Unsubscribed");
            self.update_gauge(active);
        }
        removed
    }

    pub(crate) fn is_live(&self, token: TokenId) -> bool {
        self.state.lock().live.contains_key(&token)
    }

    fn update_gauge(&self, active: usize) {
        if self.config.metrics_enabled {
            metrics::set_active_subscriptions(active);
        }
    }
}

/// Unsubscribe addressing modes.
#[derive(Debug, Clone)]
pub enum Target {
    /// One subscription.
    Token(TokenId),
    /// Every subscription of a callback, across all topics.
    Callback(CallbackId),
    /// A callback's subscriptions under one specifier.
    TopicCallback(Topic, CallbackId),
}

impl From<TokenId> for Target {
    fn from(token: TokenId) -> Self {
        Self::Token(token)
    }
}

impl<T> From<&Token<T>> for Target
where
    T: Send + Sync + 'static,
{
    fn from(token: &Token<T>) -> Self {
        Self::Token(token.id())
    }
}

impl<T> From<&Callback<T>> for Target {
    fn from(callback: &Callback<T>) -> Self {
        Self::Callback(callback.id())
    }
}

impl<S, T> From<(S, &Callback<T>)> for Target
where
    S: Into<Topic>,
{
    fn from((topic, callback): (S, &Callback<T>)) -> Self {
        Self::TopicCallback(topic.into(), callback.id())
    }
}

/// Engine statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Number of distinct registry keys.
    pub topic_count: usize,
    /// Number of live subscriptions.
    pub subscription_count: usize,
    /// Number of callbacks with at least one live subscription.
    pub callback_count: usize,
    /// Number of scopes (root included) owning at least one subscription.
    pub scope_count: usize,
}

/// Handle onto a publish/subscribe engine.
///
/// `T` is the event payload type. Clones share both the engine and the scope.
pub struct PubSub<T> {
    shared: Arc<Shared<T>>,
    scope: ScopeId,
}

impl<T: Send + Sync + 'static> PubSub<T> {
    /// Create an engine with default configuration and a background
    /// deferred-delivery thread.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with custom configuration and a background
    /// deferred-delivery thread.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let scheduler = Arc::new(ThreadScheduler::new(config.deferred_worker_name.clone()));
        Self::with_scheduler(config, scheduler)
    }

    /// Create an engine that defers deliveries through `scheduler`.
    #[must_use]
    pub fn with_scheduler<S>(config: EngineConfig, scheduler: Arc<S>) -> Self
    where
        S: Scheduler + 'static,
    {
        info!("Creating pub/sub engine with config: {:?}", config);
        if config.metrics_enabled {
            metrics::describe_metrics();
        }
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::new()),
                scheduler,
                config,
            }),
            scope: ScopeId::ROOT,
        }
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// The scope this handle subscribes under.
    #[must_use]
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Whether this handle was produced by [`PubSub::isolate`].
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        !self.scope.is_root()
    }

    /// Create a handle bound to a fresh scope on the same engine.
    ///
    /// Subscriptions made through it are visible to every publisher, but its
    /// [`unsubscribe_all`](Self::unsubscribe_all) only touches its own.
    #[must_use]
    pub fn isolate(&self) -> Self {
        let scope = ScopeId::generate();
        debug!(scope = %scope, "Created isolated scope");
        Self {
            shared: Arc::clone(&self.shared),
            scope,
        }
    }

    // --- Subscribing ---

    /// Subscribe a callback to a topic or pattern.
    ///
    /// Returns `None` if the specifier is rejected.
    pub fn subscribe(&self, topic: impl Into<Topic>, callback: &Callback<T>) -> Option<Token<T>> {
        self.try_subscribe(topic, callback).ok()
    }

    /// Subscribe a callback to a topic or pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the specifier is too long or cannot be compiled.
    pub fn try_subscribe(
        &self,
        topic: impl Into<Topic>,
        callback: &Callback<T>,
    ) -> Result<Token<T>> {
        self.register(topic.into(), callback.clone(), TokenId::generate())
    }

    /// Subscribe a callback for a single delivery.
    ///
    /// The subscription removes itself before its first delivery, so the
    /// callback runs at most once even under reentrant synchronous publishes.
    /// A delivery captured by a deferred publish still runs if the token is
    /// unsubscribed before the scheduler gets to it.
    /// Returns `None` if the specifier is rejected.
    pub fn subscribe_once(
        &self,
        topic: impl Into<Topic>,
        callback: &Callback<T>,
    ) -> Option<Token<T>> {
        self.try_subscribe_once(topic, callback).ok()
    }

    /// Subscribe a callback for a single delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the specifier is too long or cannot be compiled.
    pub fn try_subscribe_once(
        &self,
        topic: impl Into<Topic>,
        callback: &Callback<T>,
    ) -> Result<Token<T>> {
        let token = TokenId::generate();
        let shared = Arc::downgrade(&self.shared);
        let inner = callback.clone();
        let fired = AtomicBool::new(false);

        // Indexed under the caller's identity so unsubscribe_callback finds it.
        let wrapper = Callback::with_id(callback.id(), move |topic: &str, data: Option<&T>| {
            if fired.swap(true, Ordering::AcqRel) {
                return;
            }
            // An explicit unsubscribe may already have removed the token.
            if let Some(shared) = shared.upgrade() {
                shared.unsubscribe_token(token);
            }
            inner.call(topic, data);
        });

        self.register(topic.into(), wrapper, token)
    }

    fn register(&self, topic: Topic, callback: Callback<T>, token: TokenId) -> Result<Token<T>> {
        validate_topic(&topic, self.shared.config.max_topic_length)?;
        let (key, matcher) = normalize(&topic)?;

        let active = {
            let mut state = self.shared.state.lock();
            state.insert(self.scope, key.clone(), matcher, token, callback);
            state.live.len()
        };

        debug!(topic = %key, token = %token, scope = %self.scope, "Subscribed");
        if self.shared.config.metrics_enabled {
            metrics::record_subscription();
            metrics::set_active_subscriptions(active);
        }

        Ok(Token::new(token, Arc::downgrade(&self.shared)))
    }

    // --- Publishing ---

    /// Publish an event, delivering later through the scheduler.
    ///
    /// Returns `true` if at least one subscriber matched, whether or not
    /// delivery has happened yet.
    pub fn publish(&self, topic: &str, data: impl Into<Option<T>>) -> bool {
        self.publish_with(topic, data.into(), Delivery::Deferred)
    }

    /// Publish an event, invoking every matching callback before returning.
    pub fn publish_sync(&self, topic: &str, data: impl Into<Option<T>>) -> bool {
        self.publish_with(topic, data.into(), Delivery::Inline)
    }

    /// Publish an event with an explicit delivery mode.
    ///
    /// Callbacks are captured now; subscriptions removed before a deferred
    /// delivery runs still receive it.
    pub fn publish_with(&self, topic: &str, data: Option<T>, delivery: Delivery) -> bool {
        let callbacks = self.shared.state.lock().registry.resolve(topic);
        let metrics_enabled = self.shared.config.metrics_enabled;

        if callbacks.is_empty() {
            trace!(topic = %topic, "Publish without subscribers");
            if metrics_enabled {
                metrics::record_unmatched();
            }
            return false;
        }

        trace!(
            topic = %topic,
            recipients = callbacks.len(),
            delivery = delivery.as_str(),
            "Published message"
        );
        if metrics_enabled {
            metrics::record_publish(delivery.as_str());
        }

        let unit = DeliveryUnit::new(topic, data, callbacks).with_metrics(metrics_enabled);
        match delivery {
            Delivery::Inline => {
                unit.run();
            }
            Delivery::Deferred => self.shared.scheduler.defer(Box::new(move || {
                unit.run();
            })),
        }
        true
    }

    /// Whether any subscription exists at all.
    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        !self.shared.state.lock().registry.is_empty()
    }

    /// Whether publishing `topic` would reach at least one subscriber.
    #[must_use]
    pub fn has_subscribers_for(&self, topic: &str) -> bool {
        self.shared.state.lock().registry.matches(topic)
    }

    // --- Unsubscribing ---

    /// Remove subscriptions addressed by `target`.
    ///
    /// Unknown targets are a no-op. Returns `true` if anything was removed.
    pub fn unsubscribe(&self, target: impl Into<Target>) -> bool {
        match target.into() {
            Target::Token(token) => self.unsubscribe_token(token),
            Target::Callback(callback) => self.remove_callback(callback, None),
            Target::TopicCallback(topic, callback) => {
                self.remove_callback(callback, Some(&key_of(&topic)))
            }
        }
    }

    /// Remove one subscription by token.
    pub fn unsubscribe_token(&self, token: TokenId) -> bool {
        self.shared.unsubscribe_token(token)
    }

    /// Remove every subscription of `callback`, across all topics.
    pub fn unsubscribe_callback(&self, callback: &Callback<T>) -> bool {
        self.remove_callback(callback.id(), None)
    }

    /// Remove `callback`'s subscriptions under one specifier.
    pub fn unsubscribe_topic_callback(
        &self,
        topic: impl Into<Topic>,
        callback: &Callback<T>,
    ) -> bool {
        let key = key_of(&topic.into());
        self.remove_callback(callback.id(), Some(&key))
    }

    fn remove_callback(&self, callback: CallbackId, key: Option<&TopicKey>) -> bool {
        let (removed, active) = {
            let mut state = self.shared.state.lock();
            if !state.callbacks.exists(callback) {
                return false;
            }
            let tokens = match key {
                Some(key) => state.callbacks.tokens_for_key(callback, key),
                None => state.callbacks.tokens(callback),
            };
            (state.remove_all(tokens), state.live.len())
        };

        if removed > 0 {
            debug!(callback = ?callback, removed, "Unsubscribed callback");
            self.shared.update_gauge(active);
        }
        removed > 0
    }

    /// Remove every subscription this handle is responsible for.
    ///
    /// On the root handle that is every subscription in the engine, isolated
    /// scopes included. On an isolated handle it is only its own.
    pub fn unsubscribe_all(&self) -> bool {
        let (removed, active) = {
            let mut state = self.shared.state.lock();
            let tokens: Vec<TokenId> = if self.is_isolated() {
                state
                    .scopes
                    .lookup(self.scope)
                    .map(|tokens| tokens.iter().copied().collect())
                    .unwrap_or_default()
            } else {
                state.live.keys().copied().collect()
            };
            (state.remove_all(tokens), state.live.len())
        };

        if removed > 0 {
            debug!(scope = %self.scope, removed, "Unsubscribed all");
            self.shared.update_gauge(active);
        }
        removed > 0
    }

    /// Remove every subscription to one specifier that this handle is
    /// responsible for (see [`unsubscribe_all`](Self::unsubscribe_all)).
    pub fn unsubscribe_all_from(&self, topic: impl Into<Topic>) -> bool {
        let key = key_of(&topic.into());
        let (removed, active) = {
            let mut state = self.shared.state.lock();
            let Some(entry) = state.registry.get(&key) else {
                return false;
            };
            let tokens: Vec<TokenId> = if self.is_isolated() {
                entry
                    .tokens()
                    .filter(|token| state.scopes.contains(self.scope, *token))
                    .collect()
            } else {
                entry.tokens().collect()
            };
            (state.remove_all(tokens), state.live.len())
        };

        if removed > 0 {
            debug!(topic = %key, scope = %self.scope, removed, "Unsubscribed all from topic");
            self.shared.update_gauge(active);
        }
        removed > 0
    }

    // --- Introspection ---

    /// Whether a token's subscription is still registered.
    #[must_use]
    pub fn is_active(&self, token: TokenId) -> bool {
        self.shared.is_live(token)
    }

    /// Number of live subscriptions in the engine.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.shared.state.lock().live.len()
    }

    /// Number of distinct registry keys in the engine.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.shared.state.lock().registry.count()
    }

    /// Get engine statistics.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let state = self.shared.state.lock();
        EngineStats {
            topic_count: state.registry.count(),
            subscription_count: state.live.len(),
            callback_count: state.callbacks.len(),
            scope_count: state.scopes.len(),
        }
    }
}

impl<T: Send + Sync + 'static> Default for PubSub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for PubSub<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            scope: self.scope,
        }
    }
}

impl<T> fmt::Debug for PubSub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubSub")
            .field("scope", &self.scope)
            .field("config", &self.shared.config)
            .finish()
    }
}
