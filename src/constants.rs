/// Application constants

pub const API_VERSION: &str = "v1";

// Match rules
pub const MAX_SLOTS: usize = 2;
pub const DEFAULT_BOARD_SIZE: i32 = 10;
pub const SHIP_PACKING_PADDING: i64 = 3; // corridor share charged per ship

// Authority header for CreateMatch / Finish
pub const ENGINE_SECRET_HEADER: &str = "x-engine-secret";

// Replay cache
pub const REPLAY_CACHE_KEY_PREFIX: &str = "cloudships:replay:";
pub const DEFAULT_REPLAY_CACHE_TTL_SECS: u64 = 86_400; // 1 day

// Storage backends
pub const STORE_POSTGRES: &str = "postgres";
pub const STORE_MEMORY: &str = "memory";

// Postgres SQLSTATE codes
pub const PG_UNIQUE_VIOLATION: &str = "23505";
pub const PG_LOCK_NOT_AVAILABLE: &str = "55P03";
pub const PG_DEADLOCK_DETECTED: &str = "40P01";
pub const PG_SERIALIZATION_FAILURE: &str = "40001";
