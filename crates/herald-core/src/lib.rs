//! # herald-core
//!
//! In-process topic-based publish/subscribe.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Topic** - Literal and pattern specifiers, normalized into registry keys
//! - **Registry** - Subscriptions grouped by key, with reverse indexes
//! - **PubSub** - Subscribe, publish, unsubscribe and isolated scopes
//! - **Scheduler** - Deferred delivery for asynchronous publishes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  subscribe  │────▶│  Registry   │◀────│   publish   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                   ▲                   │
//!        ▼                   │                   ▼
//! ┌─────────────┐            │            ┌─────────────┐
//! │   Indexes   │────────────┘            │  Scheduler  │
//! └─────────────┘   unsubscribe paths     └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use herald_core::{Callback, ManualScheduler, PubSub, EngineConfig, Topic};
//! use std::sync::Arc;
//!
//! let scheduler = Arc::new(ManualScheduler::new());
//! let bus: PubSub<String> = PubSub::with_scheduler(EngineConfig::default(), scheduler.clone());
//!
//! let greet = Callback::new(|topic: &str, name: Option<&String>| {
//!     println!("{topic}: hello {}", name.map_or("nobody", |n| n.as_str()));
//! });
//! let token = bus.subscribe(Topic::pattern("^user:").unwrap(), &greet).unwrap();
//!
//! assert!(bus.publish_sync("user:joined", "alice".to_string()));
//! assert!(bus.publish("user:left", "bob".to_string()));
//! scheduler.run_pending();
//!
//! assert!(token.unsubscribe());
//! assert!(!bus.has_subscribers());
//! ```

pub mod callback;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod index;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod token;
pub mod topic;

pub use callback::Callback;
pub use config::EngineConfig;
pub use dispatch::{Delivery, DeliveryReport};
pub use engine::{EngineStats, PubSub, Target};
pub use error::{HeraldError, Result};
pub use scheduler::{ManualScheduler, Scheduler, Task, ThreadScheduler, TokioScheduler};
pub use token::{CallbackId, ScopeId, Token, TokenId};
pub use topic::{Pattern, Topic, TopicKey};
