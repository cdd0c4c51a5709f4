//! End-to-end balancing cycles against the in-memory session backend.

use std::time::Duration;

use teambalance_controller::{BalanceController, ControllerState, ReplyOutcome, VolunteerState};
use teambalance_core::{BalanceSettings, Identity, ParticipantId, SessionTime, SideId};
use teambalance_session::{MemoryMatch, MemoryRoster, Notification, RecordingTransport};

const RED: SideId = SideId(2);
const BLUE: SideId = SideId(3);

fn t(secs: u64) -> SessionTime {
    SessionTime::from_secs(secs)
}

fn settings(limit: i32) -> BalanceSettings {
    BalanceSettings {
        unbalance_limit: limit,
        settle_delay: Duration::from_secs(5),
        query_lifetime: Duration::from_secs(10),
        travel_slack: Duration::from_secs(3),
        ..Default::default()
    }
}

fn roster(red: u64, blue: u64) -> MemoryRoster {
    let mut roster = MemoryRoster::new([RED, BLUE]);
    for i in 1..=red {
        roster.join(ParticipantId(i), RED, (i * 10) as i64);
    }
    for i in 1..=blue {
        roster.join(ParticipantId(100 + i), BLUE, 10);
    }
    roster
}

/// Activate, arm the settle timer at t1, start soliciting at t7 and
/// issue the first round of asks at t8.
fn solicit(
    c: &mut BalanceController<RecordingTransport>,
    r: &mut MemoryRoster,
) -> Vec<ParticipantId> {
    c.tick(t(0), r);
    c.tick(t(1), r);
    c.tick(t(7), r);
    assert_eq!(c.state(), ControllerState::FindingVolunteers);
    c.tick(t(8), r);
    c.transport().asks()
}

#[test]
fn ten_versus_four_asks_six_distinct_heavy_candidates() {
    let mut c = BalanceController::new(settings(2), RecordingTransport::new());
    let mut r = roster(10, 4);

    let asked = solicit(&mut c, &mut r);
    assert_eq!(c.snapshot().map(|s| s.migrations_needed.get()), Some(3));
    assert_eq!(asked.len(), 6);

    let mut distinct = asked.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), 6);
    assert!(asked.iter().all(|&id| r.side_of(id) == Some(RED)));
}

#[test]
fn lone_candidate_is_asked() {
    let mut c = BalanceController::new(settings(1), RecordingTransport::new());
    let mut r = MemoryRoster::new([RED, BLUE]);
    r.join(ParticipantId(1), RED, 50).exempt = true;
    r.join(ParticipantId(2), RED, 0);
    r.join(ParticipantId(3), RED, 90).exempt = true;
    r.join(ParticipantId(4), BLUE, 0);

    let asked = solicit(&mut c, &mut r);
    assert_eq!(asked, vec![ParticipantId(2)]);
    // Target is two, but nobody else can be asked; the cycle keeps waiting.
    assert_eq!(c.state(), ControllerState::FindingVolunteers);
}

#[test]
fn expired_asks_are_replaced_in_the_same_tick() {
    let mut c = BalanceController::new(settings(1), RecordingTransport::new());
    let mut r = roster(4, 2);

    let first = solicit(&mut c, &mut r);
    assert_eq!(first.len(), 2);
    // Asked at t8, expiring at t21 (10s lifetime plus 3s slack).
    assert!(c.ledger().entries().iter().all(|e| e.expires_at == t(21)));

    c.tick(t(21), &mut r);
    assert_eq!(c.transport().asks().len(), 2);

    c.tick(t(22), &mut r);
    let asks = c.transport().asks();
    assert_eq!(asks.len(), 4);
    for id in &first {
        assert_eq!(c.ledger().state_of(*id), Some(VolunteerState::No));
        assert_eq!(asks.iter().filter(|&a| a == id).count(), 1);
    }
    for id in &asks[2..] {
        assert_eq!(c.ledger().state_of(*id), Some(VolunteerState::Asked));
    }
}

#[test]
fn everyone_declining_ends_the_cycle() {
    let mut c = BalanceController::new(settings(1), RecordingTransport::new());
    let mut r = roster(3, 1);

    let asked = solicit(&mut c, &mut r);
    assert_eq!(asked.len(), 2);
    for id in &asked {
        assert_eq!(
            c.on_reply(t(9), &mut r, *id, false),
            ReplyOutcome::Declined
        );
    }

    // One candidate left: asked, then it declines too.
    c.tick(t(10), &mut r);
    let last = c.transport().asks()[2];
    c.on_reply(t(11), &mut r, last, false);

    c.tick(t(12), &mut r);
    assert_eq!(c.state(), ControllerState::Inactive);
    assert!(c.ledger().is_empty());
    assert!(c.transport().cancels().is_empty());
}

#[test]
fn yes_after_disconnect_is_recorded_but_not_applied() {
    let mut c = BalanceController::new(settings(2), RecordingTransport::new());
    let mut r = roster(10, 4);

    let asked = solicit(&mut c, &mut r);
    let gone = asked[0];
    assert!(r.leave(gone));

    assert_eq!(c.on_reply(t(9), &mut r, gone, true), ReplyOutcome::Skipped);
    assert_eq!(c.ledger().state_of(gone), Some(VolunteerState::Yes));
    assert_eq!(c.state(), ControllerState::FindingVolunteers);
    assert_eq!(r.populations(), vec![(RED, 9), (BLUE, 4)]);
}

#[test]
fn round_end_mid_solicitation_cancels_open_asks() {
    let mut c = BalanceController::new(settings(2), RecordingTransport::new());
    let mut r = roster(10, 4);

    let asked = solicit(&mut c, &mut r);
    c.on_reply(t(9), &mut r, asked[0], false);

    r.round_active = false;
    assert_eq!(c.tick(t(10), &mut r), ControllerState::Inactive);
    assert_eq!(c.transport().cancels(), asked[1..].to_vec());
    assert!(c.ledger().is_empty());

    // The next tick resumes monitoring; nothing happens until the round restarts.
    assert_eq!(c.tick(t(11), &mut r), ControllerState::Monitoring);
    assert_eq!(c.tick(t(12), &mut r), ControllerState::Monitoring);
    assert!(c.settle_deadline().is_none());
}

#[test]
fn full_cycle_with_live_match_restores_balance() {
    let mut live_roster = MemoryRoster::new([RED, BLUE]).with_live_match(MemoryMatch::new());
    for i in 1..=5 {
        live_roster.join_rated(ParticipantId(i), RED, 0, Identity(i), 1000.0 + i as f64 * 100.0);
    }
    live_roster.join_rated(ParticipantId(10), BLUE, 0, Identity(10), 1200.0);

    let mut c = BalanceController::new(settings(1), RecordingTransport::new());
    let mut r = live_roster;
    let asked = solicit(&mut c, &mut r);
    // diff 4, two migrations, four asks.
    assert_eq!(asked.len(), 4);

    for (n, id) in asked.iter().take(2).enumerate() {
        match c.on_reply(t(9 + n as u64), &mut r, *id, true) {
            ReplyOutcome::Migrated(m) => {
                assert_eq!(m.to, BLUE);
                assert!(m.bonus_granted);
            }
            other => panic!("expected a migration, got {other:?}"),
        }
    }
    assert_eq!(r.populations(), vec![(RED, 3), (BLUE, 3)]);

    let live = r.memory_match().unwrap();
    assert_eq!(live.bonuses.len(), 2);
    assert_eq!(live.membership_changes.len(), 2);

    c.tick(t(12), &mut r);
    assert_eq!(c.state(), ControllerState::Inactive);
    assert_eq!(c.transport().cancels(), asked[2..].to_vec());
}

#[test]
fn notification_stream_is_announce_asks_then_cancels() {
    let mut c = BalanceController::new(settings(1), RecordingTransport::new());
    let mut r = roster(4, 2);
    let asked = solicit(&mut c, &mut r);

    c.shutdown();
    c.shutdown();

    let mut expected = vec![Notification::BalanceStarting { heavy: RED }];
    expected.extend(asked.iter().map(|&participant| Notification::Ask { participant }));
    expected.extend(asked.iter().map(|&participant| Notification::Cancel { participant }));
    assert_eq!(c.transport().sent(), expected.as_slice());
}
