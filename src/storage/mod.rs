//! Storage Module
//!
//! The data-store engine for TallyKV: typed scalar values, entries with
//! optional expiry, the lock-guarded store, and the background sweeper.
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │            StorageEngine              │
//! │   RwLock<HashMap<String, Entry>>      │
//! │                 Entry { Value, TTL }  │
//! └───────────────────────────────────────┘
//!                    ▲
//!                    │ cleanup_expired()
//!          ┌─────────┴─────────┐
//!          │   ExpirySweeper   │
//!          │  (Tokio task)     │
//!          └───────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use tallykv::storage::{StorageEngine, Value};
//! use std::time::Duration;
//!
//! let engine = StorageEngine::new();
//!
//! engine.set("name", "tally", None);
//! assert_eq!(engine.get("name"), Some(Value::String("tally".into())));
//!
//! engine.set("session", "token123", Some(Duration::from_secs(3600)));
//! assert!(engine.exists("session"));
//! ```

pub mod engine;
pub mod expiry;
pub mod value;

pub use engine::{Entry, StorageEngine, StorageStats, StoreError};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
pub use value::Value;
