// All service modules
pub mod match_service;
pub mod replay_cache;

// Re-export for convenience
pub use match_service::{FinishSummary, MatchService, MatchStatus};
pub use replay_cache::ReplayCache;
