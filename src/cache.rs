//! Key/value cache for query views.
//!
//! Values are stored as JSON strings. The primary backend is Redis; while it
//! is unconfigured or unreachable every operation is served by an in-process
//! map with the same TTL semantics (expiry is checked lazily on read).
//!
//! # Reconnection
//!
//! A failed connect or command drops the Redis connection and schedules the
//! next attempt with exponential backoff (1 s, doubling, capped at 5 min).
//! Attempts are started lazily by the next cache operation and run on a
//! background task. Invalidations that
//! happen during an outage cannot reach Redis, so they set a pending flag and
//! Redis is flushed as soon as it is reachable again. That keeps entries
//! written before the outage from resurfacing after it.
//!
//! # Key layout
//!
//! - `countries:all`: country list
//! - `country:{CODE}`: country detail
//! - `country:{CODE}:charts`: chart bundle
//! - `comparison:{C1}:{C2}`: comparison result
//! - `ai:summary:{CODE}`: generated summary

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Shared cache handle. Cloning is cheap.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    memory: MemoryStore,
    remote: Option<Remote>,
}

impl Cache {
    /// A cache with no remote backend.
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(CacheInner {
                memory: MemoryStore::default(),
                remote: None,
            }),
        }
    }

    /// Build a cache backed by Redis at `redis_url`, if given.
    ///
    /// Never fails: an invalid URL disables the remote backend, and an
    /// unreachable server is retried in the background of later operations.
    pub async fn connect(redis_url: Option<&str>) -> Self {
        let Some(url) = redis_url else {
            info!("Redis disabled, using in-memory cache");
            return Self::memory();
        };

        let client = match redis::Client::open(url) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Invalid Redis URL, using in-memory cache");
                return Self::memory();
            }
        };

        let cache = Self {
            inner: Arc::new(CacheInner {
                memory: MemoryStore::default(),
                remote: Some(Remote::new(client)),
            }),
        };
        if let Some(remote) = &cache.inner.remote {
            remote.state().connecting = true;
            if !remote.reconnect().await {
                warn!("Redis unavailable, falling back to in-memory cache until it recovers");
            }
        }
        cache
    }

    /// Name of the backend currently serving requests.
    pub fn backend_name(&self) -> &'static str {
        match &self.inner.remote {
            Some(remote) if remote.state().conn.is_some() => "redis",
            _ => "memory",
        }
    }

    /// Read and decode a value. Misses, expired entries and undecodable
    /// values all read as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.connection().await {
            Some(mut conn) => match conn.get::<_, Option<String>>(key).await {
                Ok(raw) => raw,
                Err(e) => {
                    self.remote_failed("GET", &e);
                    self.inner.memory.get(key)
                }
            },
            None => self.inner.memory.get(key),
        }?;

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Store a value, with an optional time-to-live.
    ///
    /// # Returns
    ///
    /// `false` when the value could not be serialized.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Cache SET serialization failed");
                return false;
            }
        };

        if let Some(mut conn) = self.connection().await {
            let written: redis::RedisResult<()> = match ttl {
                Some(ttl) => conn.set_ex(key, &raw, ttl.as_secs().max(1)).await,
                None => conn.set(key, &raw).await,
            };
            match written {
                Ok(()) => return true,
                Err(e) => self.remote_failed("SET", &e),
            }
        }

        self.inner.memory.set(key, raw, ttl);
        true
    }

    /// Remove one key.
    pub async fn del(&self, key: &str) {
        self.inner.memory.remove(key);

        if let Some(mut conn) = self.connection().await {
            match conn.del::<_, ()>(key).await {
                Ok(()) => return,
                Err(e) => self.remote_failed("DEL", &e),
            }
        }
        self.flush_on_reconnect();
    }

    /// Remove every key matching a glob pattern (`*` and `?` wildcards,
    /// anchored at both ends).
    ///
    /// # Returns
    ///
    /// The number of keys removed.
    pub async fn del_pattern(&self, pattern: &str) -> usize {
        let mut removed = match glob_to_regex(pattern) {
            Ok(regex) => self.inner.memory.remove_matching(&regex),
            Err(e) => {
                warn!(pattern, error = %e, "Invalid cache key pattern");
                return 0;
            }
        };

        if let Some(mut conn) = self.connection().await {
            match delete_keys(&mut conn, pattern).await {
                Ok(count) => {
                    removed += count;
                    debug!(pattern, removed, "Deleted cache keys");
                    return removed;
                }
                Err(e) => self.remote_failed("DEL pattern", &e),
            }
        }
        self.flush_on_reconnect();
        removed
    }

    /// Drop cached views for one country, or for every country when `code`
    /// is `None`.
    pub async fn invalidate_country_cache(&self, code: Option<&str>) {
        match code {
            Some(code) => {
                let code = code.to_uppercase();
                self.del_pattern(&format!("country:{code}:*")).await;
                self.del(&format!("country:{code}")).await;
            }
            None => {
                self.del_pattern("country:*").await;
                self.del_pattern("countries:*").await;
            }
        }
    }

    /// Drop everything.
    pub async fn invalidate_all(&self) {
        self.inner.memory.clear();

        if let Some(mut conn) = self.connection().await {
            match flush(&mut conn).await {
                Ok(()) => {
                    info!("Cache flushed");
                    return;
                }
                Err(e) => self.remote_failed("FLUSHDB", &e),
            }
        }
        self.flush_on_reconnect();
    }

    // ========================================================================
    // Remote connection management
    // ========================================================================

    /// A live Redis connection, if there is one.
    ///
    /// When a reconnect is due it is started on a background task and this
    /// call is served from memory, so no request waits on the connect.
    async fn connection(&self) -> Option<ConnectionManager> {
        let remote = self.inner.remote.as_ref()?;

        {
            let mut state = remote.state();
            if let Some(conn) = &state.conn {
                return Some(conn.clone());
            }
            if !state.claim_attempt(Instant::now()) {
                return None;
            }
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Some(remote) = &inner.remote {
                remote.reconnect().await;
            }
        });
        None
    }

    fn remote_failed(&self, op: &str, err: &redis::RedisError) {
        warn!(op, error = %err, "Redis command failed, using in-memory cache");
        if let Some(remote) = &self.inner.remote {
            remote.state().conn = None;
            remote.schedule_retry(&err.to_string());
        }
    }

    /// Remember that Redis may hold entries we could not invalidate.
    fn flush_on_reconnect(&self) {
        if let Some(remote) = &self.inner.remote {
            remote.pending_flush.store(true, Ordering::SeqCst);
        }
    }
}

struct Remote {
    client: redis::Client,
    state: Mutex<RemoteState>,
    pending_flush: AtomicBool,
}

struct RemoteState {
    conn: Option<ConnectionManager>,
    retry_at: Option<Instant>,
    backoff: Duration,
    connecting: bool,
}

impl RemoteState {
    /// Take the next connect attempt if one is due and none is in flight.
    fn claim_attempt(&mut self, now: Instant) -> bool {
        if self.connecting || self.retry_at.is_some_and(|at| now < at) {
            return false;
        }
        self.connecting = true;
        true
    }
}

impl Remote {
    fn new(client: redis::Client) -> Self {
        Self {
            client,
            state: Mutex::new(RemoteState {
                conn: None,
                retry_at: None,
                backoff: INITIAL_BACKOFF,
                connecting: false,
            }),
            pending_flush: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// One connect attempt. Flushes first when invalidations were missed
    /// while offline.
    async fn reconnect(&self) -> bool {
        let result = match timeout(CONNECT_TIMEOUT, ConnectionManager::new(self.client.clone())).await {
            Ok(Ok(conn)) => self.resume(conn).await,
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("connect timed out".to_string()),
        };

        match result {
            Ok(conn) => {
                let mut state = self.state();
                state.conn = Some(conn);
                state.retry_at = None;
                state.backoff = INITIAL_BACKOFF;
                state.connecting = false;
                info!("Redis connected");
                true
            }
            Err(reason) => {
                self.schedule_retry(&reason);
                false
            }
        }
    }

    async fn resume(&self, mut conn: ConnectionManager) -> Result<ConnectionManager, String> {
        if self.pending_flush.swap(false, Ordering::SeqCst) {
            if let Err(e) = flush(&mut conn).await {
                self.pending_flush.store(true, Ordering::SeqCst);
                warn!(error = %e, "Redis flush after reconnect failed");
                return Err(e.to_string());
            }
            info!("Flushed Redis after reconnect to drop entries invalidated while offline");
        }
        Ok(conn)
    }

    fn schedule_retry(&self, reason: &str) {
        let mut state = self.state();
        state.conn = None;
        state.connecting = false;
        state.retry_at = Some(Instant::now() + state.backoff);
        debug!(reason, retry_in_secs = state.backoff.as_secs(), "Redis reconnect scheduled");
        state.backoff = next_backoff(state.backoff);
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

async fn delete_keys(conn: &mut ConnectionManager, pattern: &str) -> redis::RedisResult<usize> {
    let keys: Vec<String> = conn.keys(pattern).await?;
    if keys.is_empty() {
        return Ok(0);
    }
    let _: () = conn.del(&keys).await?;
    Ok(keys.len())
}

async fn flush(conn: &mut ConnectionManager) -> redis::RedisResult<()> {
    redis::cmd("FLUSHDB").query_async(conn).await
}

// ============================================================================
// In-memory fallback
// ============================================================================

#[derive(Default)]
struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, MemoryEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.lock();
        let expired = entries
            .get(key)?
            .expires_at
            .is_some_and(|at| Instant::now() >= at);
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.lock()
            .insert(key.to_string(), MemoryEntry { value, expires_at });
    }

    fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    fn remove_matching(&self, regex: &Regex) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !regex.is_match(key));
        before - entries.len()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// Translate a Redis-style glob into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');
    Regex::new(&source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct View {
        name: String,
        rank: u32,
    }

    #[tokio::test]
    async fn test_round_trip() {
        let cache = Cache::memory();
        let view = View {
            name: "Japan".into(),
            rank: 7,
        };

        assert!(cache.set("country:JP", &view, None).await);
        assert_eq!(cache.get::<View>("country:JP").await, Some(view));
        assert_eq!(cache.get::<View>("country:FR").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_lazily() {
        let cache = Cache::memory();
        cache.set("k", &1u32, Some(Duration::from_secs(60))).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get::<u32>("k").await, Some(1));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn test_del_pattern_is_anchored() {
        let cache = Cache::memory();
        for key in ["country:US", "country:US:charts", "xcountry:US:charts", "countries:all"] {
            cache.set(key, &true, None).await;
        }

        let removed = cache.del_pattern("country:US:*").await;
        assert_eq!(removed, 1);
        assert_eq!(cache.get::<bool>("xcountry:US:charts").await, Some(true));
        assert_eq!(cache.get::<bool>("country:US").await, Some(true));
    }

    #[tokio::test]
    async fn test_invalidate_one_country_leaves_others() {
        let cache = Cache::memory();
        for key in ["country:US", "country:US:charts", "country:DE", "country:DE:charts"] {
            cache.set(key, &true, None).await;
        }

        cache.invalidate_country_cache(Some("us")).await;

        assert_eq!(cache.get::<bool>("country:US").await, None);
        assert_eq!(cache.get::<bool>("country:US:charts").await, None);
        assert_eq!(cache.get::<bool>("country:DE").await, Some(true));
        assert_eq!(cache.get::<bool>("country:DE:charts").await, Some(true));
    }

    #[tokio::test]
    async fn test_invalidate_all_countries_keeps_comparisons() {
        let cache = Cache::memory();
        for key in ["country:US", "countries:all", "comparison:US:DE"] {
            cache.set(key, &true, None).await;
        }

        cache.invalidate_country_cache(None).await;
        assert_eq!(cache.get::<bool>("countries:all").await, None);
        assert_eq!(cache.get::<bool>("comparison:US:DE").await, Some(true));

        cache.invalidate_all().await;
        assert_eq!(cache.get::<bool>("comparison:US:DE").await, None);
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        let regex = glob_to_regex("ai:summary:U?.*").unwrap();
        assert!(regex.is_match("ai:summary:US.x"));
        assert!(!regex.is_match("ai:summary:USAx"));
    }

    #[test]
    fn test_backoff_doubles_to_cap() {
        let mut backoff = INITIAL_BACKOFF;
        let mut steps = Vec::new();
        for _ in 0..10 {
            backoff = next_backoff(backoff);
            steps.push(backoff.as_secs());
        }
        assert_eq!(steps, vec![2, 4, 8, 16, 32, 64, 128, 256, 300, 300]);
    }

    #[tokio::test]
    async fn test_invalid_url_falls_back_to_memory() {
        let cache = Cache::connect(Some("not a url")).await;
        assert_eq!(cache.backend_name(), "memory");
        assert!(cache.set("k", &"v", None).await);
        assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v"));
    }

    // Nothing listens on port 1, so every connect attempt is refused.
    const UNREACHABLE: &str = "redis://127.0.0.1:1/0";

    fn remote(cache: &Cache) -> &Remote {
        cache.inner.remote.as_ref().unwrap()
    }

    #[tokio::test]
    async fn test_unreachable_redis_serves_from_memory() {
        let cache = Cache::connect(Some(UNREACHABLE)).await;
        assert_eq!(cache.backend_name(), "memory");

        {
            let state = remote(&cache).state();
            assert!(state.conn.is_none());
            assert!(!state.connecting);
            assert!(state.retry_at.is_some_and(|at| at > Instant::now()));
            // First retry waits INITIAL_BACKOFF, the one after that twice as long.
            assert_eq!(state.backoff, INITIAL_BACKOFF * 2);
        }

        assert!(cache.set("country:US", &1u32, None).await);
        assert_eq!(cache.get::<u32>("country:US").await, Some(1));
        assert!(!remote(&cache).pending_flush.load(Ordering::SeqCst));

        cache.invalidate_all().await;

        assert!(remote(&cache).pending_flush.load(Ordering::SeqCst));
        assert_eq!(cache.get::<u32>("country:US").await, None);
    }

    #[tokio::test]
    async fn test_due_reconnect_does_not_block_callers() {
        let cache = Cache::connect(Some(UNREACHABLE)).await;
        cache.set("k", &"v", None).await;
        remote(&cache).state().retry_at = None;

        let started = std::time::Instant::now();
        assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v"));
        assert!(started.elapsed() < CONNECT_TIMEOUT / 2);

        // Either the attempt is still in flight or it failed and pushed the
        // retry time out; a second caller starts nothing in both cases.
        assert!(!remote(&cache).state().claim_attempt(Instant::now()));
    }

    #[test]
    fn test_claim_attempt_respects_retry_time() {
        let now = Instant::now();
        let mut state = RemoteState {
            conn: None,
            retry_at: Some(now + Duration::from_secs(5)),
            backoff: INITIAL_BACKOFF,
            connecting: false,
        };

        assert!(!state.claim_attempt(now));
        assert!(state.claim_attempt(now + Duration::from_secs(5)));
        assert!(state.connecting);
        assert!(!state.claim_attempt(now + Duration::from_secs(60)));
    }
}
