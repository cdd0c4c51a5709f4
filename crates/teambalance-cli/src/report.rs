//! Simulation report and its human-readable rendering.

use serde::Serialize;

use teambalance_controller::{ControllerState, Migration};
use teambalance_core::{ParticipantId, SessionTime, SideId};
use teambalance_session::{BonusGrant, Notification};

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub ticks: u64,
    pub ended_at: SessionTime,
    pub final_state: ControllerState,
    pub migrations: Vec<Migration>,
    pub replies: Vec<ReplyRecord>,
    pub notifications: Vec<TimedNotification>,
    pub bonuses: Vec<BonusGrant>,
    pub populations: Vec<SidePopulation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyRecord {
    pub at: SessionTime,
    pub participant: ParticipantId,
    pub accepted: bool,
    pub outcome: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimedNotification {
    pub at: SessionTime,
    #[serde(flatten)]
    pub notification: Notification,
}

#[derive(Debug, Clone, Serialize)]
pub struct SidePopulation {
    pub side: SideId,
    pub population: usize,
}

pub fn format_report(report: &SimulationReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Simulated {} ticks up to {}, final state: {:?}\n\n",
        report.ticks, report.ended_at, report.final_state
    ));

    out.push_str("Populations:\n");
    for p in &report.populations {
        out.push_str(&format!("  {:<10} {}\n", p.side.to_string(), p.population));
    }
    out.push('\n');

    out.push_str(&format!("Migrations ({}):\n", report.migrations.len()));
    for m in &report.migrations {
        let bonus = if m.bonus_granted { "  +bonus" } else { "" };
        out.push_str(&format!(
            "  {:>9}  {} {} → {}{bonus}\n",
            m.at.to_string(),
            m.participant,
            m.from,
            m.to
        ));
    }
    out.push('\n');

    if !report.replies.is_empty() {
        out.push_str(&format!("Replies ({}):\n", report.replies.len()));
        for r in &report.replies {
            let answer = if r.accepted { "yes" } else { "no" };
            out.push_str(&format!(
                "  {:>9}  {} {answer} → {}\n",
                r.at.to_string(),
                r.participant,
                r.outcome
            ));
        }
        out.push('\n');
    }

    out.push_str(&format!("Notifications ({}):\n", report.notifications.len()));
    for n in &report.notifications {
        let line = match n.notification {
            Notification::Ask { participant } => format!("ask {participant}"),
            Notification::Cancel { participant } => format!("cancel {participant}"),
            Notification::BalanceStarting { heavy } => format!("balance starting, {heavy} is heavy"),
        };
        out.push_str(&format!("  {:>9}  {line}\n", n.at.to_string()));
    }

    if !report.bonuses.is_empty() {
        out.push_str(&format!("\nBonuses ({}):\n", report.bonuses.len()));
        for b in &report.bonuses {
            out.push_str(&format!("  {}  {} ({:?})\n", b.identity, b.amount, b.source));
        }
    }

    out
}
