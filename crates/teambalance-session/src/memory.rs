//! In-memory session backend.
//!
//! Backs the controller in tests and in the simulator. Membership lives
//! in a single join-ordered list; a side's roster is that list filtered
//! by side, so roster order is stable and a migration needs nothing more
//! than a field update.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use teambalance_core::{
    BonusSource, Identity, MatchSide, ParticipantId, SessionMode, SessionTime, SideId,
};

use crate::live_match::LiveMatch;
use crate::roster::{Participant, Roster};

// ── Participants ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MemoryParticipant {
    pub id: ParticipantId,
    pub side: SideId,
    pub identity: Option<Identity>,
    pub score: i64,
    /// Never eligible for migration (e.g. a coach or a party leader).
    pub exempt: bool,
    pub last_migration: Option<SessionTime>,
    /// Minimum time between two migrations of this participant.
    pub migration_cooldown: Duration,
    pub respawns: u32,
}

impl Participant for MemoryParticipant {
    fn id(&self) -> ParticipantId {
        self.id
    }

    fn side(&self) -> SideId {
        self.side
    }

    fn identity(&self) -> Option<Identity> {
        self.identity
    }

    fn performance_score(&self) -> i64 {
        self.score
    }

    fn is_eligible_for_migration(&self, now: SessionTime) -> bool {
        if self.exempt {
            return false;
        }
        self.last_migration
            .is_none_or(|at| now.saturating_since(at) >= self.migration_cooldown)
    }

    fn change_side(&mut self, side: SideId) {
        self.side = side;
    }

    fn force_respawn(&mut self) {
        self.respawns += 1;
    }

    fn mark_last_migration(&mut self, now: SessionTime) {
        self.last_migration = Some(now);
    }
}

// ── Live match ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct MatchPlayer {
    identity: Identity,
    side: MatchSide,
    rating: f64,
    active: bool,
}

/// A bonus handed out through the live match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BonusGrant {
    pub identity: Identity,
    pub source: BonusSource,
    pub amount: u32,
}

/// In-memory live match backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryMatch {
    players: Vec<MatchPlayer>,
    pub membership_locked: bool,
    pub result_reported: bool,
    pub bonuses: Vec<BonusGrant>,
    pub membership_changes: Vec<(Identity, MatchSide)>,
}

impl MemoryMatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-activate) a match participant.
    pub fn add_player(&mut self, identity: Identity, side: MatchSide, rating: f64) {
        self.players.retain(|p| p.identity != identity);
        self.players.push(MatchPlayer {
            identity,
            side,
            rating,
            active: true,
        });
    }

    /// Mark a participant as no longer active in the match.
    pub fn mark_left(&mut self, identity: Identity) {
        if let Some(p) = self.players.iter_mut().find(|p| p.identity == identity) {
            p.active = false;
        }
    }

    pub fn side_of(&self, identity: Identity) -> Option<MatchSide> {
        self.players
            .iter()
            .find(|p| p.identity == identity)
            .map(|p| p.side)
    }
}

impl LiveMatch for MemoryMatch {
    fn active_participant_count(&self, side: MatchSide) -> usize {
        self.players
            .iter()
            .filter(|p| p.active && p.side == side)
            .count()
    }

    fn skill_rating(&self, identity: Identity) -> Option<f64> {
        self.players
            .iter()
            .find(|p| p.identity == identity)
            .map(|p| p.rating)
    }

    fn total_skill_rating(&self, side: MatchSide) -> f64 {
        self.players
            .iter()
            .filter(|p| p.active && p.side == side)
            .map(|p| p.rating)
            .sum()
    }

    fn can_change_membership(&self) -> bool {
        !self.membership_locked
    }

    fn change_membership(&mut self, identity: Identity, side: MatchSide) {
        if let Some(p) = self.players.iter_mut().find(|p| p.identity == identity) {
            p.side = side;
        }
        self.membership_changes.push((identity, side));
    }

    fn has_reported_result(&self) -> bool {
        self.result_reported
    }

    fn grant_bonus(&mut self, identity: Identity, source: BonusSource, amount: u32) {
        debug!(%identity, ?source, amount, "bonus granted");
        self.bonuses.push(BonusGrant {
            identity,
            source,
            amount,
        });
    }
}

// ── Roster ─────────────────────────────────────────────────────────

/// In-memory roster with an optional live match.
#[derive(Debug, Clone)]
pub struct MemoryRoster {
    sides: Vec<SideId>,
    members: Vec<MemoryParticipant>,
    pub round_active: bool,
    pub suspended: bool,
    pub mode: SessionMode,
    live: Option<MemoryMatch>,
    migration_cooldown: Duration,
}

impl MemoryRoster {
    /// A roster with the given sides, an active round, and no live match.
    pub fn new(sides: impl IntoIterator<Item = SideId>) -> Self {
        Self {
            sides: sides.into_iter().collect(),
            members: Vec::new(),
            round_active: true,
            suspended: false,
            mode: SessionMode::default(),
            live: None,
            migration_cooldown: Duration::from_secs(120),
        }
    }

    pub fn with_live_match(mut self, live: MemoryMatch) -> Self {
        self.live = Some(live);
        self
    }

    /// Cooldown applied to participants who join after this call.
    pub fn with_migration_cooldown(mut self, cooldown: Duration) -> Self {
        self.migration_cooldown = cooldown;
        self
    }

    /// Add a participant at the end of the roster. Re-joining with an id
    /// already present replaces the old entry.
    pub fn join(&mut self, id: ParticipantId, side: SideId, score: i64) -> &mut MemoryParticipant {
        self.members.retain(|m| m.id != id);
        self.members.push(MemoryParticipant {
            id,
            side,
            identity: None,
            score,
            exempt: false,
            last_migration: None,
            migration_cooldown: self.migration_cooldown,
            respawns: 0,
        });
        let idx = self.members.len() - 1;
        &mut self.members[idx]
    }

    /// Add a participant that the live match also knows, with a rating.
    pub fn join_rated(
        &mut self,
        id: ParticipantId,
        side: SideId,
        score: i64,
        identity: Identity,
        rating: f64,
    ) -> &mut MemoryParticipant {
        let match_side = self.match_side(side);
        if let Some(live) = self.live.as_mut() {
            live.add_player(identity, match_side, rating);
        }
        let member = self.join(id, side, score);
        member.identity = Some(identity);
        member
    }

    /// Disconnect a participant. Returns `false` if it was not connected.
    pub fn leave(&mut self, id: ParticipantId) -> bool {
        let Some(pos) = self.members.iter().position(|m| m.id == id) else {
            return false;
        };
        let member = self.members.remove(pos);
        if let (Some(identity), Some(live)) = (member.identity, self.live.as_mut()) {
            live.mark_left(identity);
        }
        debug!(participant = %id, "participant left");
        true
    }

    pub fn member(&self, id: ParticipantId) -> Option<&MemoryParticipant> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn side_of(&self, id: ParticipantId) -> Option<SideId> {
        self.member(id).map(|m| m.side)
    }

    /// Population per side, in side order.
    pub fn populations(&self) -> Vec<(SideId, usize)> {
        self.sides
            .iter()
            .map(|&side| (side, self.side_population(side)))
            .collect()
    }

    pub fn memory_match(&self) -> Option<&MemoryMatch> {
        self.live.as_ref()
    }

    pub fn memory_match_mut(&mut self) -> Option<&mut MemoryMatch> {
        self.live.as_mut()
    }
}

impl Roster for MemoryRoster {
    fn is_round_active(&self) -> bool {
        self.round_active
    }

    fn balancing_suspended(&self) -> bool {
        self.suspended
    }

    fn session_mode(&self) -> SessionMode {
        self.mode.clone()
    }

    fn sides(&self) -> Vec<SideId> {
        self.sides.clone()
    }

    fn participants(&self, side: SideId) -> Vec<ParticipantId> {
        self.members
            .iter()
            .filter(|m| m.side == side)
            .map(|m| m.id)
            .collect()
    }

    fn side_population(&self, side: SideId) -> usize {
        self.members.iter().filter(|m| m.side == side).count()
    }

    fn participant(&self, id: ParticipantId) -> Option<&dyn Participant> {
        self.members
            .iter()
            .find(|m| m.id == id)
            .map(|m| m as &dyn Participant)
    }

    fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut dyn Participant> {
        self.members
            .iter_mut()
            .find(|m| m.id == id)
            .map(|m| m as &mut dyn Participant)
    }

    fn match_side(&self, side: SideId) -> MatchSide {
        MatchSide(side.0)
    }

    fn live_match(&self) -> Option<&dyn LiveMatch> {
        self.live.as_ref().map(|m| m as &dyn LiveMatch)
    }

    fn live_match_mut(&mut self) -> Option<&mut dyn LiveMatch> {
        self.live.as_mut().map(|m| m as &mut dyn LiveMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: SideId = SideId(2);
    const BLUE: SideId = SideId(3);

    #[test]
    fn join_order_is_roster_order() {
        let mut roster = MemoryRoster::new([RED, BLUE]);
        roster.join(ParticipantId(3), RED, 0);
        roster.join(ParticipantId(1), RED, 0);
        roster.join(ParticipantId(2), BLUE, 0);

        assert_eq!(
            roster.participants(RED),
            vec![ParticipantId(3), ParticipantId(1)]
        );
        assert_eq!(roster.populations(), vec![(RED, 2), (BLUE, 1)]);
    }

    #[test]
    fn leave_makes_handle_stale() {
        let mut roster = MemoryRoster::new([RED, BLUE]);
        roster.join(ParticipantId(1), RED, 5);
        assert!(roster.is_connected(ParticipantId(1)));

        assert!(roster.leave(ParticipantId(1)));
        assert!(!roster.is_connected(ParticipantId(1)));
        assert!(roster.participant(ParticipantId(1)).is_none());
        assert!(!roster.leave(ParticipantId(1)));
    }

    #[test]
    fn migration_cooldown_gates_eligibility() {
        let mut roster =
            MemoryRoster::new([RED, BLUE]).with_migration_cooldown(Duration::from_secs(60));
        roster.join(ParticipantId(1), RED, 0);

        let p = roster.participant_mut(ParticipantId(1)).unwrap();
        assert!(p.is_eligible_for_migration(SessionTime::from_secs(10)));
        p.mark_last_migration(SessionTime::from_secs(10));
        assert!(!p.is_eligible_for_migration(SessionTime::from_secs(30)));
        assert!(p.is_eligible_for_migration(SessionTime::from_secs(70)));
    }

    #[test]
    fn exempt_participant_is_never_eligible() {
        let mut roster = MemoryRoster::new([RED, BLUE]);
        roster.join(ParticipantId(1), RED, 0).exempt = true;
        let p = roster.participant(ParticipantId(1)).unwrap();
        assert!(!p.is_eligible_for_migration(SessionTime::from_secs(1000)));
    }

    #[test]
    fn live_match_tracks_rated_members() {
        let mut roster = MemoryRoster::new([RED, BLUE]).with_live_match(MemoryMatch::new());
        roster.join_rated(ParticipantId(1), RED, 0, Identity(100), 1500.0);
        roster.join_rated(ParticipantId(2), RED, 0, Identity(200), 1200.5);
        roster.join_rated(ParticipantId(3), BLUE, 0, Identity(300), 1000.0);

        let live = roster.live_match().unwrap();
        assert_eq!(live.active_participant_count(MatchSide(2)), 2);
        assert_eq!(live.total_skill_rating(MatchSide(2)), 2700.5);
        assert_eq!(live.skill_rating(Identity(300)), Some(1000.0));

        roster.leave(ParticipantId(2));
        let live = roster.live_match().unwrap();
        assert_eq!(live.active_participant_count(MatchSide(2)), 1);
        assert_eq!(live.total_skill_rating(MatchSide(2)), 1500.0);
    }

    #[test]
    fn live_match_membership_and_bonus() {
        let mut live = MemoryMatch::new();
        live.add_player(Identity(1), MatchSide(2), 1000.0);
        assert!(live.can_change_membership());

        live.change_membership(Identity(1), MatchSide(3));
        live.grant_bonus(Identity(1), BonusSource::Autobalance, 150);

        assert_eq!(live.side_of(Identity(1)), Some(MatchSide(3)));
        assert_eq!(live.membership_changes, vec![(Identity(1), MatchSide(3))]);
        assert_eq!(live.bonuses.len(), 1);

        live.membership_locked = true;
        assert!(!live.can_change_membership());
    }
}
