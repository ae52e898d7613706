//! Subscription identities.
//!
//! Tokens, scopes and callbacks are identified by opaque ids drawn from
//! process-wide counters. They are only ever used as map keys; two ids are
//! equal exactly when they came from the same allocation.

use crate::engine::Shared;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(1);
static SCOPE_COUNTER: AtomicU64 = AtomicU64::new(1);
static CALLBACK_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u64);

impl TokenId {
    /// Allocate a fresh token id.
    #[must_use]
    pub(crate) fn generate() -> Self {
        Self(TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tok_{}", self.0)
    }
}

/// Identity of an isolation scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    /// The scope used by the root (non-isolated) handle.
    pub const ROOT: ScopeId = ScopeId(0);

    /// Allocate a fresh scope id. Never returns [`ScopeId::ROOT`].
    #[must_use]
    pub(crate) fn generate() -> Self {
        Self(SCOPE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether this is the root scope.
    #[must_use]
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("root")
        } else {
            write!(f, "scope_{}", self.0)
        }
    }
}

/// Identity of a [`Callback`](crate::Callback), shared by its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

impl CallbackId {
    #[must_use]
    pub(crate) fn generate() -> Self {
        Self(CALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle returned by a successful subscribe.
///
/// Invoking [`Token::unsubscribe`] removes the subscription. The handle does
/// not keep the engine alive; once every [`PubSub`](crate::PubSub) handle is
/// dropped, unsubscribing reports `false`.
pub struct Token<T> {
    id: TokenId,
    shared: Weak<Shared<T>>,
}

impl<T: Send + Sync + 'static> Token<T> {
    pub(crate) fn new(id: TokenId, shared: Weak<Shared<T>>) -> Self {
        Self { id, shared }
    }

    /// The token's identity.
    #[must_use]
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// Remove this subscription.
    ///
    /// Returns `true` if a live subscription was removed. Later calls are
    /// no-ops returning `false`.
    pub fn unsubscribe(&self) -> bool {
        self.shared
            .upgrade()
            .map(|shared| shared.unsubscribe_token(self.id))
            .unwrap_or(false)
    }

    /// Whether the subscription is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared
            .upgrade()
            .map(|shared| shared.is_live(self.id))
            .unwrap_or(false)
    }
}

impl<T> Clone for Token<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<T> PartialEq for Token<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Token<T> {}

impl<T> std::hash::Hash for Token<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Token<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&self.id).finish()
    }
}
