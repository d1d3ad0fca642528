use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    constants::{DEFAULT_REPLAY_CACHE_TTL_SECS, REPLAY_CACHE_KEY_PREFIX},
    engine::MatchReplay,
};

/// Replays of finished matches. Only finished matches may be stored here;
/// a replay taken mid-attack would go stale as moves keep landing.
///
/// Local entries expire after `ttl_secs` like the Redis copies do. A TTL of
/// zero disables caching and every read recomputes.
#[derive(Clone)]
pub struct ReplayCache {
    local: Arc<RwLock<HashMap<Uuid, LocalEntry>>>,
    redis: Option<ConnectionManager>,
    ttl_secs: u64,
}

struct LocalEntry {
    stored_at: Instant,
    replay: Arc<MatchReplay>,
}

impl LocalEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

fn cache_key(match_id: Uuid) -> String {
    format!("{}{}", REPLAY_CACHE_KEY_PREFIX, match_id)
}

impl ReplayCache {
    pub fn new(redis: Option<ConnectionManager>, ttl_secs: u64) -> Self {
        Self {
            local: Arc::new(RwLock::new(HashMap::new())),
            redis,
            ttl_secs,
        }
    }

    pub fn local_only() -> Self {
        Self::new(None, DEFAULT_REPLAY_CACHE_TTL_SECS)
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub async fn get(&self, match_id: Uuid) -> Option<Arc<MatchReplay>> {
        let ttl = self.ttl();
        {
            let mut local = self.local.write().await;
            if let Some(entry) = local.get(&match_id) {
                if entry.is_fresh(ttl) {
                    return Some(entry.replay.clone());
                }
                local.remove(&match_id);
            }
        }
        if self.ttl_secs == 0 {
            return None;
        }

        let mut conn = self.redis.clone()?;
        let raw = match conn.get::<_, Option<String>>(cache_key(match_id)).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("Replay cache read skipped match_id={} err={}", match_id, err);
                return None;
            }
        };
        let replay = match serde_json::from_str::<MatchReplay>(&raw?) {
            Ok(replay) => Arc::new(replay),
            Err(err) => {
                tracing::warn!("Replay cache entry unreadable match_id={} err={}", match_id, err);
                return None;
            }
        };
        self.store_local(match_id, replay.clone()).await;
        Some(replay)
    }

    pub async fn put(&self, match_id: Uuid, replay: MatchReplay) -> Arc<MatchReplay> {
        let replay = Arc::new(replay);
        if self.ttl_secs == 0 {
            return replay;
        }
        self.store_local(match_id, replay.clone()).await;

        if let Some(mut conn) = self.redis.clone() {
            match serde_json::to_string(replay.as_ref()) {
                Ok(payload) => {
                    let result: std::result::Result<(), redis::RedisError> =
                        conn.set_ex(cache_key(match_id), payload, self.ttl_secs).await;
                    if let Err(err) = result {
                        tracing::warn!(
                            "Replay cache write failed match_id={} err={}",
                            match_id,
                            err
                        );
                    }
                }
                Err(err) => {
                    tracing::warn!("Replay cache encode failed match_id={} err={}", match_id, err);
                }
            }
        }
        replay
    }

    async fn store_local(&self, match_id: Uuid, replay: Arc<MatchReplay>) {
        let ttl = self.ttl();
        let mut local = self.local.write().await;
        local.retain(|_, entry| entry.is_fresh(ttl));
        local.insert(
            match_id,
            LocalEntry {
                stored_at: Instant::now(),
                replay,
            },
        );
    }
}
