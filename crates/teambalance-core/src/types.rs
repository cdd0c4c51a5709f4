//! Shared types used across team balance crates.

use std::fmt;
use std::ops::Add;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ── Identifiers ────────────────────────────────────────────────────

/// A balancing group in the session (a team in two-sided play, one of
/// N groups in free-for-all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SideId(pub u32);

impl fmt::Display for SideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "side-{}", self.0)
    }
}

/// The live match backend's own identifier for a side.
///
/// The session maps its [`SideId`]s onto these; the two numbering
/// schemes are not assumed to agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchSide(pub u32);

impl fmt::Display for MatchSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "match-side-{}", self.0)
    }
}

/// Handle to a connected participant.
///
/// A handle is only ever resolved through the roster; once the
/// participant disconnects the lookup fails and every holder must treat
/// the handle as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Account identity known to the live match backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub u64);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id:{}", self.0)
    }
}

/// Tag passed along with a bonus grant so the backend can attribute it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusSource {
    /// Reward for volunteering to switch sides.
    Autobalance,
}

// ── Session clock ──────────────────────────────────────────────────

/// Monotonic session time, measured from session start.
///
/// All expiry and settle comparisons use this clock, never wall-clock
/// time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionTime(Duration);

impl SessionTime {
    pub const ZERO: SessionTime = SessionTime(Duration::ZERO);

    pub const fn from_duration(since_start: Duration) -> Self {
        Self(since_start)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn saturating_since(&self, earlier: SessionTime) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for SessionTime {
    type Output = SessionTime;

    fn add(self, rhs: Duration) -> SessionTime {
        SessionTime(self.0.saturating_add(rhs))
    }
}

impl From<Duration> for SessionTime {
    fn from(since_start: Duration) -> Self {
        Self(since_start)
    }
}

impl fmt::Display for SessionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0.as_secs_f64())
    }
}

impl Serialize for SessionTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0.as_secs_f64())
    }
}

// ── Session mode ───────────────────────────────────────────────────

/// Flags describing what kind of session is running.
///
/// Supplied by the session backend; the controller only reads them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionMode {
    /// Tutorial or training session.
    pub training: bool,
    /// Item/loadout testing session.
    pub item_testing: bool,
    /// Arena mode where a join queue replaces balancing.
    pub queued_arena: bool,
    /// Unmanaged tournament mode.
    pub tournament: bool,
    /// Set when the session is a managed match with its own parameters.
    pub managed_match: Option<ManagedMatch>,
}

/// Parameters of a managed (matchmade) match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedMatch {
    /// Whether this match type opts in to volunteer balancing.
    pub uses_autobalance: bool,
}
