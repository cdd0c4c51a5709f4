//! Roster seam: sides and the participants on them.

use teambalance_core::{Identity, MatchSide, ParticipantId, SessionMode, SessionTime, SideId};

use crate::live_match::LiveMatch;

/// A connected participant, resolved from a [`ParticipantId`].
pub trait Participant {
    fn id(&self) -> ParticipantId;

    fn side(&self) -> SideId;

    /// Identity known to the live match backend, if any.
    fn identity(&self) -> Option<Identity>;

    /// In-session performance score.
    fn performance_score(&self) -> i64;

    /// Whether this participant may be moved right now (not exempt, not
    /// recently migrated).
    fn is_eligible_for_migration(&self, now: SessionTime) -> bool;

    fn change_side(&mut self, side: SideId);

    /// Force a fresh spawn on the new side.
    fn force_respawn(&mut self);

    fn mark_last_migration(&mut self, now: SessionTime);
}

/// The session's roster and round state.
pub trait Roster {
    fn is_round_active(&self) -> bool;

    /// A global "no balancing right now" phase (e.g. sudden death).
    fn balancing_suspended(&self) -> bool;

    fn session_mode(&self) -> SessionMode;

    /// Sides that take part in balancing, in stable order.
    fn sides(&self) -> Vec<SideId>;

    /// Connected participants on `side`, in stable roster order.
    fn participants(&self, side: SideId) -> Vec<ParticipantId>;

    fn side_population(&self, side: SideId) -> usize {
        self.participants(side).len()
    }

    /// Resolve a handle. `None` once the participant has disconnected.
    fn participant(&self, id: ParticipantId) -> Option<&dyn Participant>;

    fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut dyn Participant>;

    /// Map a session side onto the live match backend's numbering.
    fn match_side(&self, side: SideId) -> MatchSide;

    fn live_match(&self) -> Option<&dyn LiveMatch>;

    fn live_match_mut(&mut self) -> Option<&mut dyn LiveMatch>;

    fn is_connected(&self, id: ParticipantId) -> bool {
        self.participant(id).is_some()
    }
}
