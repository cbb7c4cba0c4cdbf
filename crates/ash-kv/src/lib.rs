pub mod client;
pub mod error;
pub mod keys;

pub use client::KvStore;
pub use error::{KvError, Result};

use serde::{de::DeserializeOwned, Serialize};

impl KvStore {
    /// `GET` + JSON-decode, or `None` if the key is absent.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// JSON-encode + `SET` with an optional TTL.
    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: Option<u64>,
    ) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, ttl_secs).await
    }

    /// Atomically flip a boolean field from `false` to `true` inside the JSON
    /// document stored at `key`, preserving the key's existing TTL.
    ///
    /// This is the linearisation point for at-most-once side effects across
    /// bot replicas/restarts (§4.9, §4.12): `PendingAlert.acknowledged` and
    /// `CheckIn.delivered` are both flipped this way. Returns `true` iff this
    /// call performed the flip (the caller "won" the race); `false` if the
    /// key was absent or the field was already `true`.
    pub async fn cas_flag_true(&self, key: &str, field: &'static str) -> Result<bool> {
        let flipped: i64 = self
            .eval_script(CAS_FLAG_TRUE_SCRIPT, &[key], &[field])
            .await?;
        Ok(flipped == 1)
    }
}

/// Lua script backing [`KvStore::cas_flag_true`].
///
/// `KEYS[1]` is the record key, `ARGV[1]` the JSON field name. Uses `cjson`,
/// bundled with every modern Redis/Valkey build. Preserves the key's TTL via
/// `PERSIST`-free `SET ... KEEPTTL`.
const CAS_FLAG_TRUE_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
  return 0
end
local doc = cjson.decode(raw)
if doc[ARGV[1]] then
  return 0
end
doc[ARGV[1]] = true
redis.call('SET', KEYS[1], cjson.encode(doc), 'KEEPTTL')
return 1
"#;
