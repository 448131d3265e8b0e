//! Token-keyed, TTL-bounded storage of decoded images.
//!
//! All mutation goes through a single mutex around the token map. Sessions are handed out as
//! `Arc<ImageSession>` so readers never hold the lock while sampling, and since a session's pixels
//! are never written after insertion there is nothing for readers to race with.

use crate::error::{Error, Result};
use crate::normalize::SourceMetadata;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// 43 alphanumeric characters carry just over 256 bits.
pub const TOKEN_LENGTH: usize = 43;

/// Monotonic time source, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall-clock anchored at construction and advanced by [`Instant`], so it never goes backwards.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    anchor: Instant,
    anchor_millis: u64,
}

impl SystemClock {
    pub fn new() -> Self {
        let anchor_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since| since.as_millis() as u64)
            .unwrap_or(0);

        Self {
            anchor: Instant::now(),
            anchor_millis,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.anchor_millis + self.anchor.elapsed().as_millis() as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// A decoded image cached behind a token.
#[derive(Debug)]
pub struct ImageSession {
    width: u32,
    height: u32,
    pixels: Option<Arc<[u8]>>,
    source: Option<Arc<[u8]>>,
    metadata: SourceMetadata,
    created_at: u64,
}

impl ImageSession {
    /// `pixels`, when present, must be interleaved RGBA of exactly `width * height * 4` bytes.
    /// `source` holds the encoded upload for sessions that should be able to re-decode. At least
    /// one of the two must be given.
    pub fn new(
        width: u32,
        height: u32,
        pixels: Option<Vec<u8>>,
        source: Option<Arc<[u8]>>,
        metadata: SourceMetadata,
    ) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        let len = pixels.as_ref().map_or(0, Vec::len);

        if width == 0 || height == 0 || (pixels.is_some() && len != expected) {
            return Err(Error::InvalidGeometry { width, height, len });
        }

        if pixels.is_none() && source.is_none() {
            return Err(Error::InvalidGeometry { width, height, len });
        }

        Ok(Self {
            width,
            height,
            pixels: pixels.map(Arc::from),
            source,
            metadata,
            created_at: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The cached RGBA buffer, if this session keeps one.
    pub fn pixels(&self) -> Option<&[u8]> {
        self.pixels.as_deref()
    }

    /// The encoded upload, if it was retained.
    pub fn source(&self) -> Option<&[u8]> {
        self.source.as_deref()
    }

    pub fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    /// Creation time in clock milliseconds. Zero until the session is stored.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn retained_bytes(&self) -> usize {
        self.pixels.as_ref().map_or(0, |p| p.len()) + self.source.as_ref().map_or(0, |s| s.len())
    }
}

/// Live-session statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub active_sessions: usize,
    pub oldest_session_created_at: Option<u64>,
    pub retained_bytes: usize,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<ImageSession>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store `session` under a fresh token and return the token.
    pub fn put(&self, mut session: ImageSession) -> String {
        session.created_at = self.clock.now_millis();

        let mut sessions = self.lock();
        let token = loop {
            let candidate = generate_token();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        debug!(token = token_prefix(&token), width = session.width, height = session.height, "session stored");
        sessions.insert(token.clone(), Arc::new(session));
        token
    }

    /// Look up a live session. An expired entry is evicted and reported absent.
    pub fn get(&self, token: &str) -> Option<Arc<ImageSession>> {
        let now = self.clock.now_millis();
        let mut sessions = self.lock();

        let expired = self.is_expired(sessions.get(token)?, now);
        if expired {
            sessions.remove(token);
            debug!(token = token_prefix(token), "expired session evicted on read");
            return None;
        }

        sessions.get(token).cloned()
    }

    /// Remove a session. Returns whether a live session was removed.
    pub fn delete(&self, token: &str) -> bool {
        let now = self.clock.now_millis();
        let removed = self.lock().remove(token);

        match removed {
            Some(session) => !self.is_expired(&session, now),
            None => false,
        }
    }

    /// Evict every expired session and return how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let mut sessions = self.lock();

        let before = sessions.len();
        sessions.retain(|_, session| !self.is_expired(session, now));
        before - sessions.len()
    }

    pub fn stats(&self) -> StoreStats {
        let now = self.clock.now_millis();
        let sessions = self.lock();
        let live = sessions.values().filter(|session| !self.is_expired(session, now));

        let mut stats = StoreStats {
            active_sessions: 0,
            oldest_session_created_at: None,
            retained_bytes: 0,
        };

        for session in live {
            stats.active_sessions += 1;
            stats.retained_bytes += session.retained_bytes();
            stats.oldest_session_created_at = Some(match stats.oldest_session_created_at {
                Some(oldest) => oldest.min(session.created_at),
                None => session.created_at,
            });
        }

        stats
    }

    /// Entry count including expired entries not yet evicted.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, session: &ImageSession, now: u64) -> bool {
        now.saturating_sub(session.created_at) > self.ttl.as_millis() as u64
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<ImageSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Enough of a token to correlate log lines without making it usable.
pub(crate) fn token_prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn metadata() -> SourceMetadata {
        SourceMetadata {
            filename: Some("swatch.png".to_string()),
            byte_len: 64,
            mime: "image/png".to_string(),
            format: "image/png".to_string(),
        }
    }

    fn session(width: u32, height: u32) -> ImageSession {
        ImageSession::new(width, height, Some(vec![0; (width * height * 4) as usize]), None, metadata()).unwrap()
    }

    fn store() -> (Arc<ManualClock>, SessionStore) {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = SessionStore::new(TTL, clock.clone());
        (clock, store)
    }

    #[test]
    fn geometry_must_match_buffer() {
        let err = ImageSession::new(2, 2, Some(vec![0; 15]), None, metadata()).unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry { len: 15, .. }));

        assert!(ImageSession::new(0, 2, Some(Vec::new()), None, metadata()).is_err());
        assert!(ImageSession::new(2, 2, None, None, metadata()).is_err());
        assert!(ImageSession::new(2, 2, None, Some(Arc::from(&b"png"[..])), metadata()).is_ok());
    }

    #[test]
    fn put_then_get() {
        let (_, store) = store();
        let token = store.put(session(3, 2));

        assert_eq!(token.len(), TOKEN_LENGTH);
        let found = store.get(&token).unwrap();
        assert_eq!((found.width(), found.height()), (3, 2));
        assert_eq!(found.created_at(), 1_000);
        assert_eq!(found.metadata().filename.as_deref(), Some("swatch.png"));
    }

    #[test]
    fn tokens_are_unique() {
        let (_, store) = store();
        let tokens: std::collections::HashSet<_> = (0..64).map(|_| store.put(session(1, 1))).collect();

        assert_eq!(tokens.len(), 64);
        assert_eq!(store.len(), 64);
    }

    #[test]
    fn expired_sessions_are_absent_without_a_sweep() {
        let (clock, store) = store();
        let token = store.put(session(1, 1));

        clock.advance(TTL);
        assert!(store.get(&token).is_some());

        clock.advance(Duration::from_millis(1));
        assert!(store.get(&token).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn delete_is_idempotent() {
        let (_, store) = store();
        let token = store.put(session(1, 1));

        assert!(store.delete(&token));
        assert!(!store.delete(&token));
        assert!(!store.delete("never-issued"));
    }

    #[test]
    fn deleting_an_expired_session_reports_not_found() {
        let (clock, store) = store();
        let token = store.put(session(1, 1));

        clock.advance(TTL * 2);
        assert!(!store.delete(&token));
        assert!(store.is_empty());
    }

    #[test]
    fn sweep_evicts_only_expired() {
        let (clock, store) = store();
        let old = store.put(session(1, 1));
        clock.advance(Duration::from_secs(45));
        let fresh = store.put(session(1, 1));
        clock.advance(Duration::from_secs(30));

        assert_eq!(store.sweep(), 1);
        assert!(store.get(&old).is_none());
        assert!(store.get(&fresh).is_some());
    }

    #[test]
    fn stats_track_live_sessions() {
        let (clock, store) = store();
        assert_eq!(store.stats().oldest_session_created_at, None);

        store.put(session(2, 2));
        clock.advance(Duration::from_secs(10));
        store.put(session(1, 1));

        let stats = store.stats();
        assert_eq!(stats.active_sessions, 2);
        assert_eq!(stats.oldest_session_created_at, Some(1_000));
        assert_eq!(stats.retained_bytes, 16 + 4);

        clock.advance(Duration::from_secs(55));
        let stats = store.stats();
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.oldest_session_created_at, Some(11_000));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now_millis();
        assert!(clock.now_millis() >= first);
        assert!(first > 0);
    }

    #[test]
    fn token_prefix_is_short() {
        assert_eq!(token_prefix("abcdefghijkl"), "abcdefgh");
        assert_eq!(token_prefix("abc"), "abc");
    }
}
