//! Imbalance detection.
//!
//! Counts population per side and decides whether the gap exceeds the
//! configured limit. With a live match the two primary sides are counted
//! by the match backend; otherwise every roster side is scanned.
//!
//! # Tie-breaking
//!
//! Live match: on an exact tie the first roster side is light.
//! Roster scan: the first side in roster order holding the minimum is
//! light, the first holding the maximum is heavy.

use std::num::NonZeroUsize;

use serde::Serialize;

use teambalance_core::SideId;
use teambalance_session::{LiveMatch, Roster};

/// Transient balance picture, recomputed on every detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    pub heavy: SideId,
    pub light: SideId,
    pub population_diff: usize,
    /// Half the gap, rounded down. Never zero for an unbalanced snapshot.
    pub migrations_needed: NonZeroUsize,
}

impl BalanceSnapshot {
    /// `None` when the gap is too small to need any migration.
    pub fn new(heavy: SideId, light: SideId, population_diff: usize) -> Option<Self> {
        NonZeroUsize::new(population_diff / 2).map(|migrations_needed| Self {
            heavy,
            light,
            population_diff,
            migrations_needed,
        })
    }

    /// Asks to keep outstanding: twice the migrations needed, so a few
    /// refusals don't stall the cycle.
    pub fn ask_target(&self) -> usize {
        self.migrations_needed.get() * 2
    }
}

/// Result of one detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// Round not running, limit disabled, or balancing suspended.
    Inactive,
    Balanced,
    Unbalanced(BalanceSnapshot),
}

impl Detection {
    pub fn snapshot(&self) -> Option<&BalanceSnapshot> {
        match self {
            Detection::Unbalanced(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_unbalanced(&self) -> bool {
        matches!(self, Detection::Unbalanced(_))
    }
}

/// The heaviest and lightest side and their populations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideExtremes {
    pub heavy: SideId,
    pub heavy_count: usize,
    pub light: SideId,
    pub light_count: usize,
}

impl SideExtremes {
    pub fn diff(&self) -> usize {
        self.heavy_count.saturating_sub(self.light_count)
    }
}

/// Where side populations come from.
pub trait PopulationSource {
    /// `None` when there is nothing to compare.
    fn extremes(&self) -> Option<SideExtremes>;
}

/// Two-sided populations as counted by the live match backend.
pub struct MatchPopulation<'a> {
    roster: &'a dyn Roster,
    live: &'a dyn LiveMatch,
}

impl<'a> MatchPopulation<'a> {
    pub fn new(roster: &'a dyn Roster, live: &'a dyn LiveMatch) -> Self {
        Self { roster, live }
    }
}

impl PopulationSource for MatchPopulation<'_> {
    fn extremes(&self) -> Option<SideExtremes> {
        let sides = self.roster.sides();
        let (&a, &b) = (sides.first()?, sides.get(1)?);
        let count_a = self.live.active_participant_count(self.roster.match_side(a));
        let count_b = self.live.active_participant_count(self.roster.match_side(b));

        let extremes = if count_a > count_b {
            SideExtremes {
                heavy: a,
                heavy_count: count_a,
                light: b,
                light_count: count_b,
            }
        } else {
            SideExtremes {
                heavy: b,
                heavy_count: count_b,
                light: a,
                light_count: count_a,
            }
        };
        Some(extremes)
    }
}

/// Populations scanned from every roster side (free-for-all or local
/// sessions without a live match).
pub struct RosterPopulation<'a> {
    roster: &'a dyn Roster,
}

impl<'a> RosterPopulation<'a> {
    pub fn new(roster: &'a dyn Roster) -> Self {
        Self { roster }
    }
}

impl PopulationSource for RosterPopulation<'_> {
    fn extremes(&self) -> Option<SideExtremes> {
        let mut lightest: Option<(SideId, usize)> = None;
        let mut heaviest: Option<(SideId, usize)> = None;

        for side in self.roster.sides() {
            let count = self.roster.side_population(side);
            if lightest.is_none_or(|(_, least)| count < least) {
                lightest = Some((side, count));
            }
            // An empty side is never heavy.
            if count > heaviest.map_or(0, |(_, most)| most) {
                heaviest = Some((side, count));
            }
        }

        let ((light, light_count), (heavy, heavy_count)) = (lightest?, heaviest?);
        Some(SideExtremes {
            heavy,
            heavy_count,
            light,
            light_count,
        })
    }
}

/// Decide whether the sides are unbalanced beyond `unbalance_limit`.
pub fn detect_imbalance(roster: &dyn Roster, unbalance_limit: i32) -> Detection {
    if !roster.is_round_active() || unbalance_limit <= 0 || roster.balancing_suspended() {
        return Detection::Inactive;
    }

    let extremes = match roster.live_match() {
        Some(live) => MatchPopulation::new(roster, live).extremes(),
        None => RosterPopulation::new(roster).extremes(),
    };
    let Some(extremes) = extremes else {
        return Detection::Balanced;
    };

    let diff = extremes.diff();
    if diff <= unbalance_limit as usize {
        return Detection::Balanced;
    }

    BalanceSnapshot::new(extremes.heavy, extremes.light, diff)
        .map_or(Detection::Balanced, Detection::Unbalanced)
}
