//! Copy-on-write caches built on suspending operations
//!
//! A cache never edits its context node. Each `load` or `sync` produces a new
//! context node whose predecessors include the previous one, then re-points
//! the cache at it. Feedback raised against a context flows back through the
//! suspended operation that produced it.

mod database_cache;
mod value_cache;


pub use database_cache::{CacheContext, DatabaseCache};
pub use value_cache::ValueCache;
