//! Balance controller: drives the volunteer balancing state machine.
//!
//! ```text
//! Inactive ──(gates pass)──▶ Monitoring ──(unbalanced past settle delay,
//!    ▲                          │           membership unlocked)──▶ FindingVolunteers
//!    └──────── reset ◀──────────┴──────────────────────────────────────────┘
//! ```
//!
//! Every transition out of `FindingVolunteers` goes through `reset()`,
//! which cancels each ask still open before clearing the ledger.

use serde::Serialize;
use tracing::{debug, info, warn};

use teambalance_core::{BalanceSettings, BonusSource, ParticipantId, SessionTime, SideId};
use teambalance_session::{Roster, Transport};

use crate::detector::{BalanceSnapshot, Detection, detect_imbalance};
use crate::gate::{balance_permitted, is_active};
use crate::ledger::{VolunteerLedger, VolunteerState};
use crate::score::ScoreEvaluator;
use crate::selector::CandidateSelector;

/// Current phase of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// Balancing disabled for this session, or just reset.
    Inactive,
    /// Watching populations; the settle timer may be armed.
    Monitoring,
    /// Asking heavy-side participants to switch.
    FindingVolunteers,
}

/// A completed side switch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Migration {
    pub participant: ParticipantId,
    pub from: SideId,
    pub to: SideId,
    pub at: SessionTime,
    pub bonus_granted: bool,
}

/// What happened to a volunteer's reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// Not soliciting; the reply was dropped.
    Ignored,
    /// Balancing no longer applies; the cycle was reset.
    Aborted,
    /// No ledger entry for this participant.
    NotAsked,
    Declined,
    /// Accepted, but the participant could not be moved (disconnected,
    /// no longer eligible, or already moved).
    Skipped,
    Migrated(Migration),
}

pub struct BalanceController<T: Transport> {
    settings: BalanceSettings,
    transport: T,
    state: ControllerState,
    snapshot: Option<BalanceSnapshot>,
    settle_deadline: Option<SessionTime>,
    ledger: VolunteerLedger,
}

impl<T: Transport> BalanceController<T> {
    pub fn new(settings: BalanceSettings, transport: T) -> Self {
        Self {
            settings,
            transport,
            state: ControllerState::Inactive,
            snapshot: None,
            settle_deadline: None,
            ledger: VolunteerLedger::new(),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Balance picture from the most recent detection, if unbalanced.
    pub fn snapshot(&self) -> Option<&BalanceSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn settle_deadline(&self) -> Option<SessionTime> {
        self.settle_deadline
    }

    pub fn ledger(&self) -> &VolunteerLedger {
        &self.ledger
    }

    pub fn settings(&self) -> &BalanceSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Advance the state machine by one tick.
    pub fn tick(&mut self, now: SessionTime, roster: &mut dyn Roster) -> ControllerState {
        if !is_active(&self.settings, &roster.session_mode()) {
            self.reset();
            return self.state;
        }

        match self.state {
            ControllerState::Inactive => {
                self.state = ControllerState::Monitoring;
                info!("balance monitoring started");
            }
            ControllerState::Monitoring => self.monitor(now, roster),
            ControllerState::FindingVolunteers => self.find_volunteers(now, roster),
        }

        self.state
    }

    /// Handle a volunteer's reply. Replies are only acted on while
    /// soliciting.
    pub fn on_reply(
        &mut self,
        now: SessionTime,
        roster: &mut dyn Roster,
        participant: ParticipantId,
        accepted: bool,
    ) -> ReplyOutcome {
        if self.state != ControllerState::FindingVolunteers {
            debug!(%participant, accepted, "reply outside of solicitation, ignoring");
            return ReplyOutcome::Ignored;
        }

        let Some(snapshot) = self.refresh(roster) else {
            self.reset();
            return ReplyOutcome::Aborted;
        };
        if !balance_permitted(roster) {
            self.reset();
            return ReplyOutcome::Aborted;
        }

        let Some(previous) = self.ledger.record_reply(participant, accepted) else {
            warn!(%participant, "reply from participant who was not asked");
            return ReplyOutcome::NotAsked;
        };

        if !accepted {
            debug!(%participant, "volunteer declined");
            return ReplyOutcome::Declined;
        }

        if previous == VolunteerState::Yes {
            debug!(%participant, "volunteer already accepted");
            return ReplyOutcome::Skipped;
        }

        match self.migrate(now, roster, participant, snapshot.light) {
            Some(migration) => ReplyOutcome::Migrated(migration),
            None => {
                warn!(%participant, "volunteer accepted but can no longer be moved");
                ReplyOutcome::Skipped
            }
        }
    }

    /// Return to `Inactive`, cancelling every open ask. Idempotent.
    pub fn reset(&mut self) {
        let previous = self.state;
        let cancelled = self.ledger.purge_all(&mut self.transport);

        self.state = ControllerState::Inactive;
        self.snapshot = None;
        self.settle_deadline = None;

        if previous != ControllerState::Inactive || cancelled > 0 {
            info!(from = ?previous, cancelled, "balance controller reset");
        }
    }

    /// Session teardown.
    pub fn shutdown(&mut self) {
        self.reset();
    }

    /// Re-run detection, keeping only a current unbalanced snapshot.
    fn refresh(&mut self, roster: &dyn Roster) -> Option<BalanceSnapshot> {
        self.snapshot = match detect_imbalance(roster, self.settings.unbalance_limit) {
            Detection::Unbalanced(snapshot) => Some(snapshot),
            Detection::Balanced | Detection::Inactive => None,
        };
        self.snapshot
    }

    fn monitor(&mut self, now: SessionTime, roster: &dyn Roster) {
        let Some(snapshot) = self.refresh(roster) else {
            if self.settle_deadline.take().is_some() {
                debug!("sides balanced again, settle timer cleared");
            }
            return;
        };

        match self.settle_deadline {
            None => {
                let deadline = now + self.settings.settle_delay;
                self.settle_deadline = Some(deadline);
                debug!(
                    heavy = %snapshot.heavy,
                    light = %snapshot.light,
                    diff = snapshot.population_diff,
                    %deadline,
                    "imbalance detected, settle timer armed"
                );
            }
            Some(deadline) if deadline < now => {
                if balance_permitted(roster) {
                    info!(
                        heavy = %snapshot.heavy,
                        light = %snapshot.light,
                        needed = snapshot.migrations_needed.get(),
                        "asking for volunteers"
                    );
                    self.transport.announce_balance(snapshot.heavy);
                    self.state = ControllerState::FindingVolunteers;
                } else {
                    debug!("membership locked, waiting to balance");
                }
            }
            Some(_) => {}
        }
    }

    fn find_volunteers(&mut self, now: SessionTime, roster: &dyn Roster) {
        let Some(snapshot) = self.refresh(roster) else {
            self.reset();
            return;
        };
        if !balance_permitted(roster) {
            self.reset();
            return;
        }

        let sweep = self
            .ledger
            .sweep_expired(now, |id| roster.is_connected(id));
        let target = snapshot.ask_target();
        let mut pending = sweep.pending;
        if pending >= target {
            return;
        }

        let scores = ScoreEvaluator::for_roster(roster);
        let selector = CandidateSelector::new(roster, &scores);
        let expires_at = now + self.settings.ask_lifetime();

        while pending < target {
            let Some(participant) = selector.select_next(&snapshot, &self.ledger, now) else {
                if pending == 0 {
                    info!(declined = sweep.declined, "no one left to ask");
                    self.reset();
                }
                return;
            };

            self.ledger.add(participant, expires_at);
            self.transport.send_ask(participant);
            pending += 1;
            debug!(%participant, pending, target, %expires_at, "asked volunteer");
        }
    }

    fn migrate(
        &mut self,
        now: SessionTime,
        roster: &mut dyn Roster,
        participant: ParticipantId,
        to: SideId,
    ) -> Option<Migration> {
        let p = roster.participant_mut(participant)?;
        if !p.is_eligible_for_migration(now) {
            return None;
        }

        let from = p.side();
        p.change_side(to);
        p.force_respawn();
        p.mark_last_migration(now);
        let identity = p.identity();

        let match_side = roster.match_side(to);
        let mut bonus_granted = false;
        if let (Some(identity), Some(live)) = (identity, roster.live_match_mut()) {
            if !live.has_reported_result() {
                live.grant_bonus(identity, BonusSource::Autobalance, self.settings.incentive_bonus);
                bonus_granted = true;
            }
            live.change_membership(identity, match_side);
        }

        info!(%participant, %from, %to, bonus_granted, "volunteer switched sides");
        Some(Migration {
            participant,
            from,
            to,
            at: now,
            bonus_granted,
        })
    }
}
