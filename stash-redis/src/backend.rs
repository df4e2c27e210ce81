//! `RemoteCache` implementation over Redis.
//!
//! Entries are stored as `SET <ns>:<key> <payload> EX <ttl>`; tag
//! membership lives in native sets (`SADD <ns>:tag:<tag> <key>`), which is
//! what makes tag invalidation a server-side primitive. Sliding expiration
//! is carried in a small payload header so a read can refresh the key's
//! TTL without a side lookup: the header records the sliding window and the
//! absolute deadline the refresh may never exceed.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use stash_store::{RemoteCache, StoreError, StoreResult};

use crate::error::RedisError;
use crate::pool::{RedisConfig, RedisPool};
use crate::reply::Reply;

/// Payload header: sliding seconds (u32, 0 for none) then the absolute
/// unix deadline (u64), both big-endian.
const HEADER_LEN: usize = 12;

pub struct RedisBackend {
    pool: RedisPool,
    namespace: String,
}

impl RedisBackend {
    pub fn new(config: RedisConfig) -> Self {
        Self {
            pool: RedisPool::new(config),
            namespace: "stash".to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    fn entry_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn tag_key(&self, tag: &str) -> String {
        format!("{}:tag:{}", self.namespace, tag)
    }

    async fn run(&self, args: &[&[u8]]) -> Result<Reply, RedisError> {
        let mut conn = self.pool.acquire().await?;
        let result = conn.command(args).await;
        if let Err(e) = &result {
            // A server error leaves the stream usable; anything else does
            // not, so the connection must not return to the pool.
            if !matches!(e, RedisError::Server(_)) {
                conn.discard();
            }
        }
        result
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn encode_payload(bytes: &[u8], sliding_secs: u32, deadline: u64) -> Vec<u8> {
    let mut payload = Vec::with_capacity(HEADER_LEN + bytes.len());
    payload.extend_from_slice(&sliding_secs.to_be_bytes());
    payload.extend_from_slice(&deadline.to_be_bytes());
    payload.extend_from_slice(bytes);
    payload
}

fn decode_payload(payload: &[u8]) -> Option<(u32, u64, &[u8])> {
    if payload.len() < HEADER_LEN {
        return None;
    }
    let sliding = u32::from_be_bytes(payload[0..4].try_into().ok()?);
    let deadline = u64::from_be_bytes(payload[4..12].try_into().ok()?);
    Some((sliding, deadline, &payload[HEADER_LEN..]))
}

#[async_trait]
impl RemoteCache for RedisBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let entry_key = self.entry_key(key);
        let reply = self.run(&[b"GET", entry_key.as_bytes()]).await?;
        let Some(payload) = reply.into_bytes() else {
            return Ok(None);
        };

        let Some((sliding, deadline, bytes)) = decode_payload(&payload) else {
            tracing::warn!(key = %key, "cache payload missing its header; dropping");
            let _ = self.run(&[b"DEL", entry_key.as_bytes()]).await;
            return Ok(None);
        };

        if sliding > 0 {
            let now = unix_now();
            if now >= deadline {
                let _ = self.run(&[b"DEL", entry_key.as_bytes()]).await;
                return Ok(None);
            }
            let refresh = u64::from(sliding).min(deadline - now).max(1);
            let refresh = refresh.to_string();
            self.run(&[b"EXPIRE", entry_key.as_bytes(), refresh.as_bytes()])
                .await?;
        }

        Ok(Some(bytes.to_vec()))
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        absolute: Duration,
        sliding: Option<Duration>,
        tags: &[String],
    ) -> StoreResult<()> {
        let entry_key = self.entry_key(key);
        let absolute_secs = absolute.as_secs().max(1);
        let sliding_secs = sliding.map(|s| s.as_secs().max(1) as u32).unwrap_or(0);
        let deadline = unix_now() + absolute_secs;

        let payload = encode_payload(&bytes, sliding_secs, deadline);
        let initial_ttl = if sliding_secs > 0 {
            absolute_secs.min(u64::from(sliding_secs))
        } else {
            absolute_secs
        };
        let initial_ttl = initial_ttl.to_string();

        self.run(&[
            b"SET",
            entry_key.as_bytes(),
            &payload,
            b"EX",
            initial_ttl.as_bytes(),
        ])
        .await?
        .ack()
        .map_err(StoreError::from)?;

        let absolute_text = absolute_secs.to_string();
        for tag in tags {
            let tag_key = self.tag_key(tag);
            self.run(&[b"SADD", tag_key.as_bytes(), entry_key.as_bytes()])
                .await?;
            // GT keeps the set alive for its longest-lived member.
            self.run(&[
                b"EXPIRE",
                tag_key.as_bytes(),
                absolute_text.as_bytes(),
                b"GT",
            ])
            .await?;
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let entry_key = self.entry_key(key);
        self.run(&[b"DEL", entry_key.as_bytes()]).await?;
        Ok(())
    }

    async fn remove_tag(&self, tag: &str) -> StoreResult<()> {
        let tag_key = self.tag_key(tag);
        let members = self
            .run(&[b"SMEMBERS", tag_key.as_bytes()])
            .await?
            .into_array()
            .map_err(StoreError::from)?;

        let mut args: Vec<Vec<u8>> = vec![b"DEL".to_vec()];
        for member in members {
            if let Some(member_key) = member.into_bytes() {
                args.push(member_key);
            }
        }
        args.push(tag_key.into_bytes());

        let arg_refs: Vec<&[u8]> = args.iter().map(Vec::as_slice).collect();
        self.run(&arg_refs).await?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        let reply = self.run(&[b"PING"]).await?;
        match reply {
            Reply::Simple(s) if s == "PONG" => Ok(()),
            other => Err(StoreError::backend(format!("unexpected PING reply: {other:?}"))),
        }
    }
}
