//! Cache Port implementations.
//!
//! [`RedisBannerCache`] is the production backend; [`MemoryBannerCache`] keeps
//! entries in-process and backs `cache.backend = "memory"` as well as tests.

mod keys;
mod memory;
mod redis_cache;

pub use keys::BannerCacheKey;
pub use memory::MemoryBannerCache;
pub use redis_cache::RedisBannerCache;
