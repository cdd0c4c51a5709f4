//! Balance scores for sides and participants.
//!
//! A live match holds authoritative skill ratings; without one the
//! in-session performance score stands in. The source is picked once per
//! evaluation through [`ScoreEvaluator::for_roster`], never per lookup.

use teambalance_core::{ParticipantId, SideId};
use teambalance_session::{LiveMatch, Roster};

/// Produces comparable balance scores.
pub trait ScoreSource {
    fn team_score(&self, side: SideId) -> i64;

    /// Score of one participant. Zero for a stale handle.
    fn participant_score(&self, participant: ParticipantId) -> i64;
}

/// Scores from the live match backend's skill ratings.
pub struct MatchRatings<'a> {
    roster: &'a dyn Roster,
    live: &'a dyn LiveMatch,
}

impl ScoreSource for MatchRatings<'_> {
    fn team_score(&self, side: SideId) -> i64 {
        // Truncates fractional rating.
        self.live.total_skill_rating(self.roster.match_side(side)) as i64
    }

    fn participant_score(&self, participant: ParticipantId) -> i64 {
        let Some(p) = self.roster.participant(participant) else {
            return 0;
        };
        match p.identity().and_then(|id| self.live.skill_rating(id)) {
            Some(rating) => rating as i64,
            None => p.performance_score(),
        }
    }
}

/// Scores from in-session performance only.
pub struct SessionPerformance<'a> {
    roster: &'a dyn Roster,
}

impl ScoreSource for SessionPerformance<'_> {
    fn team_score(&self, side: SideId) -> i64 {
        self.roster
            .participants(side)
            .into_iter()
            .filter_map(|id| self.roster.participant(id))
            .map(|p| p.performance_score())
            .fold(0i64, i64::saturating_add)
    }

    fn participant_score(&self, participant: ParticipantId) -> i64 {
        self.roster
            .participant(participant)
            .map_or(0, |p| p.performance_score())
    }
}

/// The score source in effect for one evaluation.
pub enum ScoreEvaluator<'a> {
    Match(MatchRatings<'a>),
    Session(SessionPerformance<'a>),
}

impl<'a> ScoreEvaluator<'a> {
    pub fn for_roster(roster: &'a dyn Roster) -> Self {
        match roster.live_match() {
            Some(live) => Self::Match(MatchRatings { roster, live }),
            None => Self::Session(SessionPerformance { roster }),
        }
    }

    pub fn is_match_rated(&self) -> bool {
        matches!(self, Self::Match(_))
    }
}

impl ScoreSource for ScoreEvaluator<'_> {
    fn team_score(&self, side: SideId) -> i64 {
        match self {
            Self::Match(s) => s.team_score(side),
            Self::Session(s) => s.team_score(side),
        }
    }

    fn participant_score(&self, participant: ParticipantId) -> i64 {
        match self {
            Self::Match(s) => s.participant_score(participant),
            Self::Session(s) => s.participant_score(participant),
        }
    }
}
