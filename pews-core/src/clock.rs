//! Time keys for addressing feed resources, with replay substitution.
//!
//! Every feed resource is named by a `YYYYMMDDHHMMSS` UTC timestamp. Live
//! mode asks for the resource published one second ago. A replay session
//! swaps in a historical clock: the key becomes the session's virtual start
//! plus the wall time elapsed since the session began, until the session's
//! duration has passed, after which the session is dropped and live keys
//! resume.
//!
//! The session lives in a `ReplayHandle` owned by the caller, never in a
//! global, so independent clients (and tests) do not share replay state.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use tracing::info;

use crate::types::{PewsError, Result};

/// chrono format of a time key.
pub const TIME_KEY_FORMAT: &str = "%Y%m%d%H%M%S";

/// Live resources are requested this many seconds behind the current time.
pub const PUBLICATION_LAG_SECS: i64 = 1;

/// Format a UTC timestamp as a 14-digit time key.
pub fn format_time_key(t: DateTime<Utc>) -> String {
    t.format(TIME_KEY_FORMAT).to_string()
}

/// Parse a 14-digit time key back into a UTC timestamp.
pub fn parse_time_key(key: &str) -> Result<DateTime<Utc>> {
    let key = key.trim();
    if key.len() != 14 || !key.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PewsError::InvalidTimeKey(key.to_string()));
    }
    NaiveDateTime::parse_from_str(key, TIME_KEY_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|e| PewsError::InvalidTimeKey(format!("{key}: {e}")))
}

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for simulations and tests. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

/// Lock, recovering the value if a previous holder panicked.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Replay sessions
// ---------------------------------------------------------------------------

/// Parameters for starting a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRequest {
    pub incident_id: u64,
    /// Historical time the replay starts from.
    pub virtual_start: DateTime<Utc>,
    /// How long the replay runs before live mode resumes.
    pub duration: TimeDelta,
}

/// An active replay session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySession {
    pub incident_id: u64,
    pub virtual_start: DateTime<Utc>,
    pub duration: TimeDelta,
    /// Wall time at which the session began.
    pub wall_start: DateTime<Utc>,
}

impl ReplaySession {
    pub fn new(request: ReplayRequest, wall_start: DateTime<Utc>) -> Self {
        ReplaySession {
            incident_id: request.incident_id,
            virtual_start: request.virtual_start,
            duration: request.duration,
            wall_start,
        }
    }

    /// Wall time elapsed since the session began. Never negative.
    pub fn elapsed(&self, now: DateTime<Utc>) -> TimeDelta {
        (now - self.wall_start).max(TimeDelta::zero())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.elapsed(now) >= self.duration
    }

    /// Historical time corresponding to wall time `now`.
    pub fn virtual_time_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.virtual_start + self.elapsed(now)
    }
}

/// Shared slot holding at most one replay session.
///
/// Clones refer to the same slot. Starting a session replaces the previous
/// one wholesale; readers get independent snapshots.
#[derive(Debug, Clone, Default)]
pub struct ReplayHandle {
    slot: Arc<Mutex<Option<ReplaySession>>>,
}

impl ReplayHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `session`, replacing any active one.
    pub fn install(&self, session: ReplaySession) {
        *lock(&self.slot) = Some(session);
    }

    /// Copy of the current session, if any. Does not check expiry.
    pub fn snapshot(&self) -> Option<ReplaySession> {
        lock(&self.slot).clone()
    }

    pub fn is_active(&self) -> bool {
        lock(&self.slot).is_some()
    }

    pub fn clear(&self) {
        lock(&self.slot).take();
    }

    /// Resolve the session for wall time `now`, dropping it if expired.
    ///
    /// Expiry check and removal happen under one lock, so a session installed
    /// concurrently is never dropped by a reader holding a stale copy.
    fn resolve(&self, now: DateTime<Utc>) -> Option<ReplaySession> {
        let mut slot = lock(&self.slot);
        if let Some(session) = slot.as_ref() {
            if session.is_expired_at(now) {
                info!(
                    incident_id = session.incident_id,
                    duration_secs = session.duration.num_seconds(),
                    "replay session ended, resuming live mode"
                );
                *slot = None;
            }
        }
        slot.clone()
    }
}

// ---------------------------------------------------------------------------
// Time key source
// ---------------------------------------------------------------------------

/// A time key together with the session snapshot it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeKey {
    pub key: String,
    pub session: Option<ReplaySession>,
}

impl TimeKey {
    pub fn is_replay(&self) -> bool {
        self.session.is_some()
    }
}

/// Produces resource keys, consulting the replay session on every call.
#[derive(Debug, Clone)]
pub struct TimeKeySource<C = SystemClock> {
    clock: C,
    replay: ReplayHandle,
}

impl TimeKeySource<SystemClock> {
    /// Live key source on the system clock with a fresh replay slot.
    pub fn system() -> Self {
        TimeKeySource::new(SystemClock, ReplayHandle::new())
    }
}

impl<C: Clock> TimeKeySource<C> {
    pub fn new(clock: C, replay: ReplayHandle) -> Self {
        TimeKeySource { clock, replay }
    }

    pub fn replay(&self) -> &ReplayHandle {
        &self.replay
    }

    /// Start a replay session now, replacing any active one.
    pub fn begin_replay(&self, request: ReplayRequest) -> ReplaySession {
        let session = ReplaySession::new(request, self.clock.now());
        info!(
            incident_id = session.incident_id,
            virtual_start = %format_time_key(session.virtual_start),
            duration_secs = session.duration.num_seconds(),
            "replay session started"
        );
        self.replay.install(session.clone());
        session
    }

    /// Key for the resource to request now.
    pub fn current_key(&self) -> String {
        self.resolve().key
    }

    /// Key plus the session snapshot that produced it.
    ///
    /// Callers that also choose paths or header layouts from the session
    /// should use this snapshot rather than reading the handle again.
    pub fn resolve(&self) -> TimeKey {
        let now = self.clock.now();
        match self.replay.resolve(now) {
            Some(session) => TimeKey {
                key: format_time_key(session.virtual_time_at(now)),
                session: Some(session),
            },
            None => TimeKey {
                key: format_time_key(now - TimeDelta::seconds(PUBLICATION_LAG_SECS)),
                session: None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn t(key: &str) -> DateTime<Utc> {
        parse_time_key(key).unwrap()
    }

    fn source(start: &str) -> (TimeKeySource<ManualClock>, ManualClock) {
        let clock = ManualClock::new(t(start));
        (TimeKeySource::new(clock.clone(), ReplayHandle::new()), clock)
    }

    fn jeju_request() -> ReplayRequest {
        ReplayRequest {
            incident_id: 2021007178,
            virtual_start: DateTime::from_timestamp(1639469954, 0).unwrap(),
            duration: TimeDelta::minutes(7),
        }
    }

    #[test]
    fn test_format_and_parse_roundtrip() {
        let ts = t("20211214081914");
        assert_eq!(format_time_key(ts), "20211214081914");
        assert_eq!(ts.timestamp(), 1639469954);
    }

    #[test]
    fn test_parse_rejects_bad_keys() {
        assert!(parse_time_key("2021121408191").is_err());
        assert!(parse_time_key("2021121408191x").is_err());
        assert!(matches!(
            parse_time_key("20211314081914"),
            Err(PewsError::InvalidTimeKey(_))
        ));
    }

    #[test]
    fn test_live_key_lags_one_second() {
        let (keys, _) = source("20240101000000");
        assert_eq!(keys.current_key(), "20231231235959");
        assert!(!keys.resolve().is_replay());
    }

    #[test]
    fn test_replay_key_tracks_elapsed() {
        let (keys, clock) = source("20260101120000");
        keys.begin_replay(jeju_request());

        assert_eq!(keys.current_key(), "20211214081914");
        clock.advance(TimeDelta::seconds(17));
        assert_eq!(keys.current_key(), "20211214081931");
        clock.advance(TimeDelta::seconds(400));
        assert_eq!(keys.current_key(), "20211214082611");
        assert!(keys.replay().is_active());
    }

    #[test]
    fn test_replay_expires_at_duration() {
        let (keys, clock) = source("20260101120000");
        keys.begin_replay(jeju_request());

        clock.advance(TimeDelta::seconds(419));
        assert!(keys.resolve().is_replay());

        clock.advance(TimeDelta::seconds(1));
        let key = keys.resolve();
        assert!(!key.is_replay());
        assert_eq!(key.key, "20260101120659");
        assert!(!keys.replay().is_active());

        // stays live afterwards
        clock.advance(TimeDelta::seconds(1));
        assert_eq!(keys.current_key(), "20260101120700");
    }

    #[test]
    fn test_new_session_replaces_old() {
        let (keys, clock) = source("20260101120000");
        keys.begin_replay(jeju_request());
        clock.advance(TimeDelta::seconds(100));

        let second = ReplayRequest {
            incident_id: 2022000001,
            virtual_start: t("20221029081227"),
            duration: TimeDelta::seconds(30),
        };
        keys.begin_replay(second);
        assert_eq!(keys.current_key(), "20221029081227");
        assert_eq!(keys.replay().snapshot().unwrap().incident_id, 2022000001);

        clock.advance(TimeDelta::seconds(30));
        assert!(!keys.resolve().is_replay());
    }

    #[test]
    fn test_zero_duration_expires_immediately() {
        let (keys, _) = source("20260101120000");
        keys.begin_replay(ReplayRequest {
            duration: TimeDelta::zero(),
            ..jeju_request()
        });
        assert_eq!(keys.current_key(), "20260101115959");
    }

    #[test]
    fn test_independent_sources_do_not_share_sessions() {
        let (a, _) = source("20260101120000");
        let (b, _) = source("20260101120000");
        a.begin_replay(jeju_request());
        assert!(a.resolve().is_replay());
        assert!(!b.resolve().is_replay());
    }

    #[test]
    fn test_clock_going_backwards_clamps_elapsed() {
        let (keys, clock) = source("20260101120000");
        keys.begin_replay(jeju_request());
        clock.advance(TimeDelta::seconds(-5));
        assert_eq!(keys.current_key(), "20211214081914");
    }

    #[test]
    fn test_shared_handle_sees_session() {
        let (keys, _) = source("20260101120000");
        let handle = keys.replay().clone();
        keys.begin_replay(jeju_request());
        assert!(handle.is_active());
        handle.clear();
        assert!(!keys.resolve().is_replay());
    }
}
