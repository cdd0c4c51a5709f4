//! Candidate selection: who on the heavy side to ask next.
//!
//! Every eligible, not-yet-asked participant on the heavy side is a
//! candidate. With one candidate there is nothing to compare. With more,
//! the candidate whose score is closest to the per-migration share of
//! the score gap wins:
//!
//! ```text
//! target = |score(heavy) - score(light)| / 2 / migrations_needed
//! pick     argmin |target - score(candidate)|   (first in roster order on ties)
//! ```

use std::num::NonZeroUsize;

use teambalance_core::{ParticipantId, SessionTime};
use teambalance_session::Roster;

use crate::detector::BalanceSnapshot;
use crate::ledger::VolunteerLedger;
use crate::score::ScoreSource;

/// Score each moved participant should carry for the gap to close evenly.
pub fn skill_gap_target(heavy_score: i64, light_score: i64, migrations_needed: NonZeroUsize) -> i64 {
    let needed = u64::try_from(migrations_needed.get()).unwrap_or(u64::MAX);
    let share = heavy_score.abs_diff(light_score) / 2 / needed;
    // Half of any u64 fits in i64.
    i64::try_from(share).unwrap_or(i64::MAX)
}

pub struct CandidateSelector<'a> {
    roster: &'a dyn Roster,
    scores: &'a dyn ScoreSource,
}

impl<'a> CandidateSelector<'a> {
    pub fn new(roster: &'a dyn Roster, scores: &'a dyn ScoreSource) -> Self {
        Self { roster, scores }
    }

    /// Heavy-side participants that may be asked, in roster order.
    pub fn candidate_pool(
        &self,
        snapshot: &BalanceSnapshot,
        ledger: &VolunteerLedger,
        now: SessionTime,
    ) -> Vec<ParticipantId> {
        self.roster
            .participants(snapshot.heavy)
            .into_iter()
            .filter(|&id| !ledger.has(id))
            .filter(|&id| {
                self.roster
                    .participant(id)
                    .is_some_and(|p| p.is_eligible_for_migration(now))
            })
            .collect()
    }

    /// Next participant to ask, or `None` if nobody is left.
    pub fn select_next(
        &self,
        snapshot: &BalanceSnapshot,
        ledger: &VolunteerLedger,
        now: SessionTime,
    ) -> Option<ParticipantId> {
        let pool = self.candidate_pool(snapshot, ledger, now);
        if pool.len() <= 1 {
            return pool.first().copied();
        }

        let target = skill_gap_target(
            self.scores.team_score(snapshot.heavy),
            self.scores.team_score(snapshot.light),
            snapshot.migrations_needed,
        );

        pool.into_iter()
            .min_by_key(|&id| target.abs_diff(self.scores.participant_score(id)))
    }
}
