//! Response caching for the content client.
//!
//! Two tiers hold raw response payloads keyed by request:
//!
//! - **Primary**: consulted first on every cacheable request.
//! - **Fallback**: the last known-good payload, served when fetching fails.
//!
//! ```toml
//! [spaces.main]
//! cache_capacity = 512
//! fallback_cache_capacity = 512
//! compress_fallback = true
//! ```

mod codec;
mod config;
mod keys;
mod store;

pub use codec::{FAIL_MARKER, PayloadCodec, decode_payload};
pub use config::CacheConfig;
pub use keys::{IncompleteParameter, generate_cache_key};
pub use store::{CacheStore, MemoryCache};
