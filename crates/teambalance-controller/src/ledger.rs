//! Volunteer ledger: who has been asked, what they said, and when the
//! ask runs out.
//!
//! One entry per participant at most. Entries are only removed all at
//! once by [`VolunteerLedger::purge_all`], which closes every prompt
//! still open on a client.

use serde::Serialize;
use tracing::debug;

use teambalance_core::{ParticipantId, SessionTime};
use teambalance_session::Transport;

/// Reply state of one ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolunteerState {
    Asked,
    Yes,
    No,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskedEntry {
    pub participant: ParticipantId,
    pub state: VolunteerState,
    pub expires_at: SessionTime,
}

/// Counts produced by one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Still asked and not yet expired.
    pub pending: usize,
    /// Declined, including asks that just timed out.
    pub declined: usize,
    /// Asks that timed out during this sweep.
    pub expired: usize,
}

#[derive(Debug, Clone, Default)]
pub struct VolunteerLedger {
    entries: Vec<AskedEntry>,
}

impl VolunteerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ask order.
    pub fn entries(&self) -> &[AskedEntry] {
        &self.entries
    }

    /// Whether the participant has an entry in any state.
    pub fn has(&self, participant: ParticipantId) -> bool {
        self.entries.iter().any(|e| e.participant == participant)
    }

    pub fn state_of(&self, participant: ParticipantId) -> Option<VolunteerState> {
        self.entries
            .iter()
            .find(|e| e.participant == participant)
            .map(|e| e.state)
    }

    /// Record a new ask. Returns `false`, leaving the ledger untouched, if
    /// the participant already has an entry.
    pub fn add(&mut self, participant: ParticipantId, expires_at: SessionTime) -> bool {
        if self.has(participant) {
            return false;
        }
        self.entries.push(AskedEntry {
            participant,
            state: VolunteerState::Asked,
            expires_at,
        });
        true
    }

    /// Record a reply and return the entry's previous state, or `None`
    /// when the participant was never asked (or the ledger was purged in
    /// the meantime).
    pub fn record_reply(
        &mut self,
        participant: ParticipantId,
        accepted: bool,
    ) -> Option<VolunteerState> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.participant == participant)?;
        let previous = entry.state;
        entry.state = if accepted {
            VolunteerState::Yes
        } else {
            VolunteerState::No
        };
        Some(previous)
    }

    /// Time out expired asks and count what is still outstanding.
    ///
    /// Entries whose participant is no longer present are neither pending
    /// nor declined.
    pub fn sweep_expired(
        &mut self,
        now: SessionTime,
        is_present: impl Fn(ParticipantId) -> bool,
    ) -> SweepSummary {
        let mut summary = SweepSummary::default();

        for entry in &mut self.entries {
            if !is_present(entry.participant) {
                continue;
            }
            match entry.state {
                VolunteerState::Asked if entry.expires_at < now => {
                    entry.state = VolunteerState::No;
                    summary.expired += 1;
                    summary.declined += 1;
                    debug!(participant = %entry.participant, "volunteer ask timed out");
                }
                VolunteerState::Asked => summary.pending += 1,
                VolunteerState::No => summary.declined += 1,
                VolunteerState::Yes => {}
            }
        }

        summary
    }

    /// Cancel every ask still open and clear the ledger. Returns the
    /// number of cancellations sent.
    pub fn purge_all(&mut self, transport: &mut dyn Transport) -> usize {
        let mut cancelled = 0;
        for entry in self.entries.drain(..) {
            if entry.state == VolunteerState::Asked {
                transport.send_cancel(entry.participant);
                cancelled += 1;
            }
        }
        cancelled
    }
}
