use std::sync::Arc;
use std::time::Duration;

use redis::FromRedisValue;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::{KvError, Result};

const DEFAULT_DEADLINE_SECS: u64 = 5;

/// Thin async wrapper over a single multiplexed Redis/Valkey connection.
///
/// Connections are established lazily and re-established on the first
/// command failure after a drop, following the reconnect-on-error pattern
/// used for session persistence elsewhere in the stack: every command or
/// pipeline gets at most one retry, and a failed attempt drops the shared
/// connection so the next caller reopens it rather than repeatedly hammering
/// a dead socket. Every attempt is additionally bounded by `deadline_secs` so
/// a wedged connection can never hang a caller indefinitely.
#[derive(Clone)]
pub struct KvStore {
    client: redis::Client,
    connection: Arc<Mutex<Option<redis::aio::MultiplexedConnection>>>,
    deadline_secs: u64,
}

impl KvStore {
    pub fn new(url: &str) -> Result<Self> {
        Self::with_deadline(url, DEFAULT_DEADLINE_SECS)
    }

    pub fn with_deadline(url: &str, deadline_secs: u64) -> Result<Self> {
        let client = redis::Client::open(url).map_err(KvError::InvalidUrl)?;
        Ok(Self {
            client,
            connection: Arc::new(Mutex::new(None)),
            deadline_secs,
        })
    }

    async fn ensure_connection(
        &self,
        connection: &mut Option<redis::aio::MultiplexedConnection>,
    ) -> Result<()> {
        if connection.is_some() {
            return Ok(());
        }
        let conn = tokio::time::timeout(self.deadline(), self.client.get_multiplexed_async_connection())
            .await
            .map_err(|_| KvError::Timeout {
                operation: "connect",
                deadline_secs: self.deadline_secs,
            })?
            .map_err(|source| KvError::Command {
                operation: "connect",
                source,
            })?;
        *connection = Some(conn);
        debug!("kv store connected");
        Ok(())
    }

    async fn run_command<T, F>(&self, operation: &'static str, build: F) -> Result<T>
    where
        T: FromRedisValue + Send,
        F: Fn() -> redis::Cmd,
    {
        let mut last_err = None;
        for attempt in 0..2 {
            let mut guard = self.connection.lock().await;
            self.ensure_connection(&mut guard).await?;
            let conn = guard.as_mut().ok_or(KvError::ConnectionUnavailable)?;
            let cmd = build();
            match tokio::time::timeout(self.deadline(), cmd.query_async::<T>(conn)).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(source)) => {
                    warn!(operation, attempt, error = %source, "kv command failed, reconnecting");
                    *guard = None;
                    last_err = Some(KvError::Command { operation, source });
                }
                Err(_) => {
                    warn!(operation, attempt, deadline_secs = self.deadline_secs, "kv command timed out, reconnecting");
                    *guard = None;
                    last_err = Some(KvError::Timeout {
                        operation,
                        deadline_secs: self.deadline_secs,
                    });
                }
            }
        }
        Err(last_err.unwrap_or(KvError::ConnectionUnavailable))
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    async fn run_pipeline<T, F>(&self, operation: &'static str, build: F) -> Result<T>
    where
        T: FromRedisValue + Send,
        F: Fn() -> redis::Pipeline,
    {
        let mut last_err = None;
        for attempt in 0..2 {
            let mut guard = self.connection.lock().await;
            self.ensure_connection(&mut guard).await?;
            let conn = guard.as_mut().ok_or(KvError::ConnectionUnavailable)?;
            let pipe = build();
            match tokio::time::timeout(self.deadline(), pipe.query_async::<T>(conn)).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(source)) => {
                    warn!(operation, attempt, error = %source, "kv pipeline failed, reconnecting");
                    *guard = None;
                    last_err = Some(KvError::Command { operation, source });
                }
                Err(_) => {
                    warn!(operation, attempt, deadline_secs = self.deadline_secs, "kv pipeline timed out, reconnecting");
                    *guard = None;
                    last_err = Some(KvError::Timeout {
                        operation,
                        deadline_secs: self.deadline_secs,
                    });
                }
            }
        }
        Err(last_err.unwrap_or(KvError::ConnectionUnavailable))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run_command("get", || {
            let mut cmd = redis::cmd("GET");
            cmd.arg(key);
            cmd
        })
        .await
    }

    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()> {
        self.run_pipeline("set", || {
            let mut pipe = redis::pipe();
            pipe.atomic();
            pipe.cmd("SET").arg(key).arg(value).ignore();
            if let Some(ttl) = ttl_secs {
                pipe.cmd("EXPIRE").arg(key).arg(ttl).ignore();
            }
            pipe
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn del(&self, key: &str) -> Result<bool> {
        let deleted: i64 = self
            .run_command("del", || {
                let mut cmd = redis::cmd("DEL");
                cmd.arg(key);
                cmd
            })
            .await?;
        Ok(deleted > 0)
    }

    #[instrument(skip(self))]
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let count: i64 = self
            .run_command("exists", || {
                let mut cmd = redis::cmd("EXISTS");
                cmd.arg(key);
                cmd
            })
            .await?;
        Ok(count > 0)
    }

    #[instrument(skip(self))]
    pub async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        self.run_command("expire", || {
            let mut cmd = redis::cmd("EXPIRE");
            cmd.arg(key).arg(ttl_secs);
            cmd
        })
        .await
    }

    /// Iterate all keys matching `prefix*` via `SCAN`, a non-blocking cursor
    /// walk instead of `KEYS` (which would stall the event loop on a large
    /// keyspace).
    #[instrument(skip(self))]
    pub async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        let mut out = Vec::new();
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = self
                .run_command("scan", || {
                    let mut cmd = redis::cmd("SCAN");
                    cmd.arg(cursor).arg("MATCH").arg(&pattern).arg("COUNT").arg(200);
                    cmd
                })
                .await?;
            out.extend(batch);
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        Ok(out)
    }

    /// Add a member to a sorted set with `score`, trimming anything older
    /// than `max_members` and refreshing the key's TTL.
    #[instrument(skip(self, member))]
    pub async fn zadd_capped(
        &self,
        key: &str,
        member: &str,
        score: i64,
        max_members: isize,
        ttl_secs: Option<u64>,
    ) -> Result<()> {
        self.run_pipeline("zadd_capped", || {
            let mut pipe = redis::pipe();
            pipe.atomic();
            pipe.cmd("ZADD").arg(key).arg(score).arg(member).ignore();
            if max_members > 0 {
                pipe.cmd("ZREMRANGEBYRANK")
                    .arg(key)
                    .arg(0)
                    .arg(-(max_members + 1))
                    .ignore();
            }
            if let Some(ttl) = ttl_secs {
                pipe.cmd("EXPIRE").arg(key).arg(ttl).ignore();
            }
            pipe
        })
        .await
    }

    /// Most recent `limit` members, highest score first.
    #[instrument(skip(self))]
    pub async fn zrevrange(&self, key: &str, limit: isize) -> Result<Vec<String>> {
        let stop = if limit <= 0 { -1 } else { limit - 1 };
        self.run_command("zrevrange", || {
            let mut cmd = redis::cmd("ZREVRANGE");
            cmd.arg(key).arg(0).arg(stop);
            cmd
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn zcard(&self, key: &str) -> Result<usize> {
        self.run_command("zcard", || {
            let mut cmd = redis::cmd("ZCARD");
            cmd.arg(key);
            cmd
        })
        .await
    }

    /// Evaluate a Lua script for operations that must be atomic
    /// read-modify-write transitions (e.g. acknowledging a pending alert
    /// exactly once).
    #[instrument(skip(self, script, keys, args))]
    pub async fn eval_script<T: FromRedisValue + Send>(
        &self,
        script: &'static str,
        keys: &[&str],
        args: &[&str],
    ) -> Result<T> {
        self.run_command("eval", || {
            let mut cmd = redis::cmd("EVAL");
            cmd.arg(script).arg(keys.len());
            for key in keys {
                cmd.arg(*key);
            }
            for arg in args {
                cmd.arg(*arg);
            }
            cmd
        })
        .await
    }
}
