//! Generic caching layer for fetched content.
//!
//! This module provides a CMS-agnostic caching mechanism that:
//! - Serves entries younger than a stale time without touching the network
//! - Blocks on a refetch for stale or missing entries
//! - Shares one in-flight fetch between concurrent callers of the same key
//! - Accepts seeded entries and explicit invalidation
//! - Optionally serves stale entries when a refresh fails (offline mode)

mod layer;
mod storage;
mod traits;

pub use layer::{CacheLayer, DEFAULT_STALE_TIME};
pub use storage::{MemoryStorage, NoopStorage, SqliteStorage};
pub use traits::{CacheSource, Cacheable, QueryKey};
