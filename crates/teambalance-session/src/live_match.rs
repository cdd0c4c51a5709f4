//! Live match seam: the authoritative backend behind a matchmade session.

use teambalance_core::{BonusSource, Identity, MatchSide};

/// Authoritative match state, present only for matchmade sessions.
pub trait LiveMatch {
    /// Participants the backend still counts as active on `side`.
    fn active_participant_count(&self, side: MatchSide) -> usize;

    /// Skill rating for a participant in this match, if the backend holds one.
    fn skill_rating(&self, identity: Identity) -> Option<f64>;

    /// Sum of skill ratings of the active participants on `side`.
    fn total_skill_rating(&self, side: MatchSide) -> f64;

    /// `false` while team composition is locked (scoring, setup, ...).
    fn can_change_membership(&self) -> bool;

    fn change_membership(&mut self, identity: Identity, side: MatchSide);

    /// Whether the match outcome has already been reported.
    fn has_reported_result(&self) -> bool;

    fn grant_bonus(&mut self, identity: Identity, source: BonusSource, amount: u32);
}
