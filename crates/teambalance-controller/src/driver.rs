//! Fixed-rate driver for running the controller inside a tokio service.
//!
//! Ticks and replies are handled on one task, one at a time, so a reply
//! is always fully processed before the next tick starts.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

use teambalance_core::{ParticipantId, SessionTime};
use teambalance_session::{Roster, Transport};

use crate::controller::BalanceController;

/// A volunteer's answer, as delivered by the network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub participant: ParticipantId,
    pub accepted: bool,
}

/// Monotonic session clock anchored at session start.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now(&self) -> SessionTime {
        SessionTime::from_duration(self.start.elapsed())
    }
}

/// Run the controller until `shutdown` fires.
///
/// On shutdown every open ask is cancelled, then the controller and the
/// roster are handed back.
pub async fn run<R, T>(
    mut controller: BalanceController<T>,
    mut roster: R,
    tick_interval: Duration,
    mut replies: mpsc::Receiver<Reply>,
    mut shutdown: watch::Receiver<bool>,
) -> (BalanceController<T>, R)
where
    R: Roster,
    T: Transport,
{
    let clock = SessionClock::start();
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        tick_ms = tick_interval.as_millis() as u64,
        "balance driver started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                controller.tick(clock.now(), &mut roster);
            }
            Some(reply) = replies.recv() => {
                controller.on_reply(clock.now(), &mut roster, reply.participant, reply.accepted);
            }
            _ = shutdown.changed() => {
                info!("balance driver shutting down");
                break;
            }
        }
    }

    controller.shutdown();
    (controller, roster)
}
