use std::time::{Duration, Instant};

use ash_core::types::UserPreference;
use ash_core::UserId;
use ash_kv::{keys, KvStore};
use dashmap::DashMap;
use tracing::warn;

/// How long a cached lookup is trusted before the store re-asks Redis.
const CACHE_TTL: Duration = Duration::from_secs(30);

/// Per-user opt-out flag with TTL (spec §4.4).
///
/// A small in-process cache of recent lookups (≤30s, invalidated on every
/// write) avoids hitting Redis on every message for users who never opt out —
/// the common case — mirroring the rolling-window `DashMap` idiom used for
/// provider health tracking elsewhere in the stack.
#[derive(Clone)]
pub struct PreferencesStore {
    kv: KvStore,
    default_ttl_secs: u64,
    cache: DashMap<UserId, (bool, Instant)>,
}

impl PreferencesStore {
    pub fn new(kv: KvStore, default_ttl_days: u32) -> Self {
        Self {
            kv,
            default_ttl_secs: u64::from(default_ttl_days) * 86_400,
            cache: DashMap::new(),
        }
    }

    /// `true` iff the user has an active (unexpired) opt-out record.
    pub async fn is_opted_out(&self, user_id: &UserId) -> bool {
        if let Some(entry) = self.cache.get(user_id) {
            let (cached, at) = *entry;
            if at.elapsed() < CACHE_TTL {
                return cached;
            }
        }

        let key = keys::optout_key(user_id.as_ref());
        let now = chrono::Utc::now().timestamp();
        let opted_out = match self.kv.get_json::<UserPreference>(&key).await {
            Ok(Some(pref)) => pref.is_active(now),
            Ok(None) => false,
            Err(e) => {
                warn!(%user_id, error = %e, "opt-out lookup failed, assuming not opted out");
                false
            }
        };

        self.cache.insert(user_id.clone(), (opted_out, Instant::now()));
        opted_out
    }

    /// Record an opt-out, overwriting any existing one, with the default TTL.
    pub async fn set_opt_out(&self, user_id: &UserId) -> ash_kv::Result<()> {
        let now = chrono::Utc::now().timestamp();
        let pref = UserPreference::new(user_id.clone(), now, self.default_ttl_secs as i64);
        let key = keys::optout_key(user_id.as_ref());
        self.kv
            .set_json(&key, &pref, Some(self.default_ttl_secs))
            .await?;
        self.cache.remove(user_id);
        Ok(())
    }

    /// Clear an opt-out (explicit opt-in).
    pub async fn clear_opt_out(&self, user_id: &UserId) -> ash_kv::Result<()> {
        let key = keys::optout_key(user_id.as_ref());
        self.kv.del(&key).await.map(|_| ())?;
        self.cache.remove(user_id);
        Ok(())
    }

    /// The full preference record, if any, for display (`/ash status`).
    pub async fn get(&self, user_id: &UserId) -> Option<UserPreference> {
        let key = keys::optout_key(user_id.as_ref());
        self.kv.get_json::<UserPreference>(&key).await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_record_expires() {
        let pref = UserPreference::new(UserId::from("u1"), 1_000, 60);
        assert!(pref.is_active(1_030));
        assert!(!pref.is_active(1_100));
    }
}
