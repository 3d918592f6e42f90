//! Course cache adapters.
//!
//! [`RedisCourseCache`] backs production deployments through a `bb8` pool;
//! [`MemoryCourseCache`] keeps entries in process for development and tests.
//! Both store the serialised read model as an opaque string with a TTL.

mod memory;
mod redis;

pub use self::memory::MemoryCourseCache;
pub use self::redis::{RedisCacheConfig, RedisCacheError, RedisCourseCache};
