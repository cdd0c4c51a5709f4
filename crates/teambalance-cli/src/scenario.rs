//! Scenario files and the virtual-clock simulation runner.
//!
//! A scenario describes a session: its sides, who is connected at the
//! start, how each participant answers volunteer asks, and a timeline of
//! events. The runner steps a virtual clock at `tick_interval`; each step
//! applies due events, delivers due auto-replies, then ticks the
//! controller.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use teambalance_controller::{BalanceController, ReplyOutcome};
use teambalance_core::{
    BalanceSettings, Identity, ParticipantId, SessionTime, SideId, parse_duration,
};
use teambalance_session::{MemoryMatch, MemoryRoster, Notification, RecordingTransport};

use crate::report::{ReplyRecord, SidePopulation, SimulationReport, TimedNotification};

pub type ScenarioResult<T> = Result<T, ScenarioError>;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for `{field}`: {value:?}")]
    InvalidDuration { field: String, value: String },

    #[error("tick_interval must be greater than zero")]
    ZeroTickInterval,

    #[error("scenario declares no sides")]
    NoSides,

    #[error("participant {participant} is on undeclared side {side}")]
    UnknownSide { participant: u64, side: u32 },

    #[error("participant {0} is listed more than once")]
    DuplicateParticipant(u64),
}

// ── File model ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_tick_interval")]
    pub tick_interval: String,
    #[serde(default = "default_duration")]
    pub duration: String,
    /// Attach an in-memory live match; only participants with an
    /// `identity` take part in it.
    #[serde(default)]
    pub live_match: bool,
    #[serde(default = "default_migration_cooldown")]
    pub migration_cooldown: String,
    #[serde(default = "default_true")]
    pub round_active: bool,
    pub sides: Vec<SideSpec>,
    #[serde(default)]
    pub participants: Vec<ParticipantSpec>,
    #[serde(default)]
    pub events: Vec<EventSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SideSpec {
    pub id: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantSpec {
    pub id: u64,
    pub side: u32,
    #[serde(default)]
    pub score: i64,
    pub rating: Option<f64>,
    pub identity: Option<u64>,
    #[serde(default)]
    pub exempt: bool,
    /// How this participant answers an ask. No policy means no answer.
    pub volunteer: Option<VolunteerPolicy>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolunteerPolicy {
    pub accept: bool,
    #[serde(default = "default_reply_delay")]
    pub after: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventSpec {
    Join {
        at: String,
        participant: ParticipantSpec,
    },
    Leave {
        at: String,
        participant: u64,
    },
    Reply {
        at: String,
        participant: u64,
        accept: bool,
    },
    RoundEnd {
        at: String,
    },
    RoundStart {
        at: String,
    },
    LockMembership {
        at: String,
    },
    UnlockMembership {
        at: String,
    },
    ReportResult {
        at: String,
    },
}

impl EventSpec {
    fn at(&self) -> &str {
        match self {
            EventSpec::Join { at, .. }
            | EventSpec::Leave { at, .. }
            | EventSpec::Reply { at, .. }
            | EventSpec::RoundEnd { at }
            | EventSpec::RoundStart { at }
            | EventSpec::LockMembership { at }
            | EventSpec::UnlockMembership { at }
            | EventSpec::ReportResult { at } => at,
        }
    }
}

fn default_tick_interval() -> String {
    "1s".to_string()
}

fn default_duration() -> String {
    "5m".to_string()
}

fn default_migration_cooldown() -> String {
    "120s".to_string()
}

fn default_reply_delay() -> String {
    "0s".to_string()
}

fn default_true() -> bool {
    true
}

impl Scenario {
    pub fn from_file(path: &Path) -> ScenarioResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ScenarioResult<Self> {
        Ok(toml::from_str(content)?)
    }
}

fn duration_field(field: impl Into<String>, value: &str) -> ScenarioResult<Duration> {
    parse_duration(value).ok_or_else(|| ScenarioError::InvalidDuration {
        field: field.into(),
        value: value.to_string(),
    })
}

// ── Runner ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct ReplyPolicy {
    accept: bool,
    after: Duration,
}

#[derive(Debug, Clone, Copy)]
struct PendingReply {
    participant: ParticipantId,
    accept: bool,
    due: SessionTime,
}

#[derive(Debug, Clone)]
struct TimedEvent {
    at: SessionTime,
    event: EventSpec,
}

pub struct Simulation {
    controller: BalanceController<RecordingTransport>,
    roster: MemoryRoster,
    sides: Vec<SideId>,
    tick_interval: Duration,
    end: SessionTime,
    events: Vec<TimedEvent>,
    next_event: usize,
    policies: HashMap<ParticipantId, ReplyPolicy>,
    pending: Vec<PendingReply>,
    seen: usize,
    replies: Vec<ReplyRecord>,
    notifications: Vec<TimedNotification>,
    migrations: Vec<teambalance_controller::Migration>,
}

impl Simulation {
    pub fn new(scenario: &Scenario, settings: BalanceSettings) -> ScenarioResult<Self> {
        let tick_interval = duration_field("tick_interval", &scenario.tick_interval)?;
        if tick_interval.is_zero() {
            return Err(ScenarioError::ZeroTickInterval);
        }
        let end = SessionTime::from_duration(duration_field("duration", &scenario.duration)?);
        let cooldown = duration_field("migration_cooldown", &scenario.migration_cooldown)?;

        if scenario.sides.is_empty() {
            return Err(ScenarioError::NoSides);
        }
        let sides: Vec<SideId> = scenario.sides.iter().map(|s| SideId(s.id)).collect();

        let mut roster = MemoryRoster::new(sides.iter().copied()).with_migration_cooldown(cooldown);
        if scenario.live_match {
            roster = roster.with_live_match(MemoryMatch::new());
        }
        roster.round_active = scenario.round_active;

        let mut events = Vec::with_capacity(scenario.events.len());
        for (i, event) in scenario.events.iter().enumerate() {
            let at = duration_field(format!("events[{i}].at"), event.at())?;
            if let EventSpec::Join { participant, .. } = event {
                check_participant(&sides, participant)?;
            }
            events.push(TimedEvent {
                at: SessionTime::from_duration(at),
                event: event.clone(),
            });
        }
        // Stable: events at the same time keep file order.
        events.sort_by_key(|e| e.at);

        let mut sim = Self {
            controller: BalanceController::new(settings, RecordingTransport::new()),
            roster,
            sides,
            tick_interval,
            end,
            events,
            next_event: 0,
            policies: HashMap::new(),
            pending: Vec::new(),
            seen: 0,
            replies: Vec::new(),
            notifications: Vec::new(),
            migrations: Vec::new(),
        };

        let mut seen_ids = Vec::new();
        for spec in &scenario.participants {
            if seen_ids.contains(&spec.id) {
                return Err(ScenarioError::DuplicateParticipant(spec.id));
            }
            seen_ids.push(spec.id);
            sim.join(spec)?;
        }

        Ok(sim)
    }

    /// Run to the end of the scenario, then tear the session down so asks
    /// still open at the end are cancelled.
    pub fn run(mut self) -> ScenarioResult<SimulationReport> {
        let mut now = SessionTime::ZERO;
        let mut last = now;
        let mut ticks = 0;

        while now <= self.end {
            self.apply_events(now)?;
            self.deliver_replies(now);
            self.controller.tick(now, &mut self.roster);
            self.collect_notifications(now);

            ticks += 1;
            last = now;
            now = now + self.tick_interval;
        }

        let final_state = self.controller.state();
        self.controller.shutdown();
        self.collect_notifications(last);

        info!(
            ticks,
            migrations = self.migrations.len(),
            state = ?final_state,
            "simulation finished"
        );

        let populations = self
            .roster
            .populations()
            .into_iter()
            .map(|(side, population)| SidePopulation { side, population })
            .collect();
        let bonuses = self
            .roster
            .memory_match()
            .map(|m| m.bonuses.clone())
            .unwrap_or_default();

        Ok(SimulationReport {
            ticks,
            ended_at: last,
            final_state,
            migrations: self.migrations,
            replies: self.replies,
            notifications: self.notifications,
            bonuses,
            populations,
        })
    }

    fn join(&mut self, spec: &ParticipantSpec) -> ScenarioResult<()> {
        check_participant(&self.sides, spec)?;
        let id = ParticipantId(spec.id);
        let side = SideId(spec.side);

        let member = match spec.identity.map(Identity) {
            Some(identity) if self.roster.memory_match().is_some() => self.roster.join_rated(
                id,
                side,
                spec.score,
                identity,
                spec.rating.unwrap_or_default(),
            ),
            Some(identity) => {
                let member = self.roster.join(id, side, spec.score);
                member.identity = Some(identity);
                member
            }
            None => self.roster.join(id, side, spec.score),
        };
        member.exempt = spec.exempt;

        match &spec.volunteer {
            Some(policy) => {
                let after = duration_field(
                    format!("participant {}.volunteer.after", spec.id),
                    &policy.after,
                )?;
                self.policies.insert(
                    id,
                    ReplyPolicy {
                        accept: policy.accept,
                        after,
                    },
                );
            }
            None => {
                self.policies.remove(&id);
            }
        }
        Ok(())
    }

    fn apply_events(&mut self, now: SessionTime) -> ScenarioResult<()> {
        while let Some(timed) = self.events.get(self.next_event) {
            if timed.at > now {
                break;
            }
            let event = timed.event.clone();
            self.next_event += 1;
            debug!(at = %now, ?event, "scenario event");

            match event {
                EventSpec::Join { participant, .. } => self.join(&participant)?,
                EventSpec::Leave { participant, .. } => {
                    let id = ParticipantId(participant);
                    self.roster.leave(id);
                    self.pending.retain(|r| r.participant != id);
                }
                EventSpec::Reply {
                    participant,
                    accept,
                    ..
                } => self.reply(now, ParticipantId(participant), accept),
                EventSpec::RoundEnd { .. } => self.roster.round_active = false,
                EventSpec::RoundStart { .. } => self.roster.round_active = true,
                EventSpec::LockMembership { .. } => {
                    if let Some(live) = self.roster.memory_match_mut() {
                        live.membership_locked = true;
                    }
                }
                EventSpec::UnlockMembership { .. } => {
                    if let Some(live) = self.roster.memory_match_mut() {
                        live.membership_locked = false;
                    }
                }
                EventSpec::ReportResult { .. } => {
                    if let Some(live) = self.roster.memory_match_mut() {
                        live.result_reported = true;
                    }
                }
            }
            self.collect_notifications(now);
        }
        Ok(())
    }

    fn deliver_replies(&mut self, now: SessionTime) {
        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|r| r.due <= now);
        self.pending = later;

        for reply in due {
            self.reply(now, reply.participant, reply.accept);
            self.collect_notifications(now);
        }
    }

    fn reply(&mut self, now: SessionTime, participant: ParticipantId, accepted: bool) {
        let outcome = self
            .controller
            .on_reply(now, &mut self.roster, participant, accepted);
        self.replies.push(ReplyRecord {
            at: now,
            participant,
            accepted,
            outcome: outcome_label(&outcome),
        });
        if let ReplyOutcome::Migrated(migration) = outcome {
            self.migrations.push(migration);
        }
    }

    /// Record notifications sent since the last call and schedule
    /// auto-replies for new asks.
    fn collect_notifications(&mut self, now: SessionTime) {
        let fresh = self.controller.transport().sent()[self.seen..].to_vec();
        self.seen += fresh.len();

        for notification in fresh {
            match notification {
                Notification::Ask { participant } => {
                    if let Some(policy) = self.policies.get(&participant) {
                        self.pending.push(PendingReply {
                            participant,
                            accept: policy.accept,
                            due: now + policy.after,
                        });
                    }
                }
                // The prompt is gone from the client; it can't be answered.
                Notification::Cancel { participant } => {
                    self.pending.retain(|r| r.participant != participant);
                }
                Notification::BalanceStarting { .. } => {}
            }
            self.notifications.push(TimedNotification {
                at: now,
                notification,
            });
        }
    }
}

fn check_participant(sides: &[SideId], spec: &ParticipantSpec) -> ScenarioResult<()> {
    if !sides.contains(&SideId(spec.side)) {
        return Err(ScenarioError::UnknownSide {
            participant: spec.id,
            side: spec.side,
        });
    }
    if let Some(policy) = &spec.volunteer {
        duration_field(
            format!("participant {}.volunteer.after", spec.id),
            &policy.after,
        )?;
    }
    Ok(())
}

fn outcome_label(outcome: &ReplyOutcome) -> &'static str {
    match outcome {
        ReplyOutcome::Ignored => "ignored",
        ReplyOutcome::Aborted => "aborted",
        ReplyOutcome::NotAsked => "not_asked",
        ReplyOutcome::Declined => "declined",
        ReplyOutcome::Skipped => "skipped",
        ReplyOutcome::Migrated(_) => "migrated",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teambalance_controller::ControllerState;

    const RED: SideId = SideId(2);
    const BLUE: SideId = SideId(3);

    fn settings() -> BalanceSettings {
        BalanceSettings {
            unbalance_limit: 1,
            settle_delay: Duration::from_secs(5),
            query_lifetime: Duration::from_secs(10),
            travel_slack: Duration::from_secs(3),
            ..Default::default()
        }
    }

    const FOUR_ON_TWO: &str = r#"
tick_interval = "1s"
duration = "30s"

[[sides]]
id = 2

[[sides]]
id = 3

[[participants]]
id = 1
side = 2
score = 10
volunteer = { accept = true, after = "2s" }

[[participants]]
id = 2
side = 2
score = 10
volunteer = { accept = true, after = "2s" }

[[participants]]
id = 3
side = 2
score = 10

[[participants]]
id = 4
side = 2
score = 10

[[participants]]
id = 11
side = 3
score = 10

[[participants]]
id = 12
side = 3
score = 10
"#;

    fn run(toml: &str) -> SimulationReport {
        let scenario = Scenario::from_toml_str(toml).unwrap();
        Simulation::new(&scenario, settings()).unwrap().run().unwrap()
    }

    #[test]
    fn volunteers_close_the_gap() {
        let report = run(FOUR_ON_TWO);

        // Asked at t8, both answer at t10: the first moves, the second
        // arrives after balance is restored.
        assert_eq!(report.migrations.len(), 1);
        let m = &report.migrations[0];
        assert_eq!(m.participant, ParticipantId(1));
        assert_eq!((m.from, m.to), (RED, BLUE));
        assert_eq!(m.at, SessionTime::from_secs(10));
        assert!(!m.bonus_granted);

        let outcomes: Vec<_> = report.replies.iter().map(|r| r.outcome).collect();
        assert_eq!(outcomes, vec!["migrated", "aborted"]);

        let kinds: Vec<_> = report.notifications.iter().map(|n| n.notification).collect();
        assert_eq!(
            kinds,
            vec![
                Notification::BalanceStarting { heavy: RED },
                Notification::Ask {
                    participant: ParticipantId(1)
                },
                Notification::Ask {
                    participant: ParticipantId(2)
                },
                Notification::Cancel {
                    participant: ParticipantId(2)
                },
            ]
        );

        assert_eq!(report.populations[0].population, 3);
        assert_eq!(report.populations[1].population, 3);
        assert_eq!(report.final_state, ControllerState::Monitoring);
        assert_eq!(report.ticks, 31);
        assert_eq!(report.ended_at, SessionTime::from_secs(30));
    }

    #[test]
    fn round_end_cancels_before_replies_arrive() {
        let toml = format!(
            "{FOUR_ON_TWO}\n[[events]]\nkind = \"round_end\"\nat = \"9s\"\n"
        );
        let report = run(&toml);

        assert!(report.migrations.is_empty());
        assert!(report.replies.is_empty());
        let cancels = report
            .notifications
            .iter()
            .filter(|n| matches!(n.notification, Notification::Cancel { .. }))
            .count();
        assert_eq!(cancels, 2);
        assert_eq!(report.populations[0].population, 4);
    }

    #[test]
    fn live_match_volunteer_earns_bonus() {
        let toml = r#"
duration = "20s"
live_match = true

[[sides]]
id = 2

[[sides]]
id = 3

[[participants]]
id = 1
side = 2
identity = 1
rating = 1000.0
volunteer = { accept = true }

[[participants]]
id = 2
side = 2
identity = 2
rating = 1000.0

[[participants]]
id = 3
side = 2
identity = 3
rating = 1000.0

[[participants]]
id = 4
side = 3
identity = 4
rating = 1000.0
"#;
        let report = run(toml);
        assert_eq!(report.migrations.len(), 1);
        assert!(report.migrations[0].bonus_granted);
        assert_eq!(report.bonuses.len(), 1);
        assert_eq!(report.bonuses[0].identity, Identity(1));
        assert_eq!(report.bonuses[0].amount, 150);
    }

    #[test]
    fn manual_reply_event_outside_solicitation_is_ignored() {
        let toml = format!(
            "{FOUR_ON_TWO}\n[[events]]\nkind = \"reply\"\nat = \"2s\"\nparticipant = 3\naccept = true\n"
        );
        let report = run(&toml);
        assert_eq!(report.replies[0].outcome, "ignored");
        assert_eq!(report.replies[0].at, SessionTime::from_secs(2));
    }

    #[test]
    fn join_event_triggers_balancing() {
        let toml = r#"
duration = "15s"

[[sides]]
id = 2

[[sides]]
id = 3

[[participants]]
id = 1
side = 2

[[participants]]
id = 2
side = 3

[[events]]
kind = "join"
at = "3s"
participant = { id = 5, side = 2, score = 40 }

[[events]]
kind = "join"
at = "3s"
participant = { id = 6, side = 2, score = 5 }
"#;
        let report = run(toml);
        // Armed at t3, deadline t8, soliciting at t9, asking at t10.
        let first = &report.notifications[0];
        assert_eq!(first.at, SessionTime::from_secs(9));
        assert_eq!(report.final_state, ControllerState::FindingVolunteers);

        // Nobody answered; both asks are cancelled when the session ends.
        let asks: Vec<_> = report.notifications[1..3]
            .iter()
            .map(|n| match n.notification {
                Notification::Ask { participant } => participant,
                other => panic!("expected an ask, got {other:?}"),
            })
            .collect();
        let cancels: Vec<_> = report.notifications[3..]
            .iter()
            .map(|n| {
                assert_eq!(n.at, report.ended_at);
                match n.notification {
                    Notification::Cancel { participant } => participant,
                    other => panic!("expected a cancel, got {other:?}"),
                }
            })
            .collect();
        assert_eq!(cancels, asks);
    }

    #[test]
    fn failed_join_event_stops_the_run() {
        let scenario = Scenario::from_toml_str(FOUR_ON_TWO).unwrap();
        let mut sim = Simulation::new(&scenario, settings()).unwrap();
        sim.events.push(TimedEvent {
            at: SessionTime::from_secs(2),
            event: EventSpec::Join {
                at: "2s".to_string(),
                participant: ParticipantSpec {
                    id: 40,
                    side: 9,
                    score: 0,
                    rating: None,
                    identity: None,
                    exempt: false,
                    volunteer: None,
                },
            },
        });

        assert!(matches!(
            sim.run(),
            Err(ScenarioError::UnknownSide {
                participant: 40,
                side: 9
            })
        ));
    }

    #[test]
    fn invalid_scenarios_are_rejected() {
        let no_sides = Scenario::from_toml_str("sides = []\n").unwrap();
        assert!(matches!(
            Simulation::new(&no_sides, settings()),
            Err(ScenarioError::NoSides)
        ));

        let bad_side = Scenario::from_toml_str(
            "[[sides]]\nid = 2\n[[participants]]\nid = 1\nside = 9\n",
        )
        .unwrap();
        assert!(matches!(
            Simulation::new(&bad_side, settings()),
            Err(ScenarioError::UnknownSide { participant: 1, side: 9 })
        ));

        let dup = Scenario::from_toml_str(
            "[[sides]]\nid = 2\n[[participants]]\nid = 1\nside = 2\n[[participants]]\nid = 1\nside = 2\n",
        )
        .unwrap();
        assert!(matches!(
            Simulation::new(&dup, settings()),
            Err(ScenarioError::DuplicateParticipant(1))
        ));

        let bad_at = Scenario::from_toml_str(
            "[[sides]]\nid = 2\n[[events]]\nkind = \"round_end\"\nat = \"later\"\n",
        )
        .unwrap();
        match Simulation::new(&bad_at, settings()) {
            Err(ScenarioError::InvalidDuration { field, .. }) => assert_eq!(field, "events[0].at"),
            other => panic!("expected InvalidDuration, got {:?}", other.err()),
        }

        let zero_tick =
            Scenario::from_toml_str("tick_interval = \"0s\"\n[[sides]]\nid = 2\n").unwrap();
        assert!(matches!(
            Simulation::new(&zero_tick, settings()),
            Err(ScenarioError::ZeroTickInterval)
        ));
    }

    #[test]
    fn bundled_scenario_parses() {
        let scenario =
            Scenario::from_toml_str(include_str!("../scenarios/uneven_join.toml")).unwrap();
        assert!(Simulation::new(&scenario, BalanceSettings::default()).is_ok());
    }
}
