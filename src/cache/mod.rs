//! Persistent lookup-result caches.
//!
//! Region and profile results share one SQLite-backed store, namespaced per
//! domain so each can be cleared and counted independently. Expiry is lazy:
//! a stale entry reads as absent but stays on disk until overwritten.

pub mod store;

use sqlx::SqlitePool;

use crate::models::{ProfileResult, RegionResult};
pub use store::{PersistentCache, StoredEntry};

/// Days a region result stays valid. Not user-configurable.
pub const REGION_TTL_DAYS: i64 = 7;
/// Days a profile analysis stays valid. Profiles drift faster than regions.
pub const PROFILE_TTL_DAYS: i64 = 3;

const HOT_CAPACITY: u64 = 4096;

pub type RegionCache = PersistentCache<RegionResult>;
pub type ProfileCache = PersistentCache<ProfileResult>;

/// Both cache domains, handed to the coordinator as one unit.
pub struct AppCache {
    pub region: RegionCache,
    pub profile: ProfileCache,
}

impl AppCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            region: PersistentCache::new(pool.clone(), "region", REGION_TTL_DAYS, HOT_CAPACITY),
            profile: PersistentCache::new(pool, "profile", PROFILE_TTL_DAYS, HOT_CAPACITY),
        }
    }
}
