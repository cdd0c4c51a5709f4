//! teambalance-controller: negotiated live team balancing.
//!
//! Watches side populations and, when the gap exceeds the configured
//! limit for longer than the settle delay, asks heavy-side participants
//! to volunteer for the light side instead of moving anyone by force.
//!
//! # Algorithm
//!
//! ```text
//! diff   = population(heavy) - population(light)
//! needed = diff / 2                      (only when diff > unbalance_limit)
//!
//! keep 2 * needed asks outstanding:
//!     sweep expired asks → declined
//!     while pending < 2 * needed:
//!         ask the eligible heavy-side participant whose score is closest
//!         to |score(heavy) - score(light)| / 2 / needed
//!     nobody left and nobody pending → reset
//!
//! on accepted reply: switch side, respawn, stamp, bonus, report
//! ```
//!
//! The controller is single-threaded: `tick` and `on_reply` must be
//! called from one execution context. `driver::run` provides that loop
//! on tokio.

pub mod controller;
pub mod detector;
pub mod driver;
pub mod gate;
pub mod ledger;
pub mod score;
pub mod selector;

pub use controller::{BalanceController, ControllerState, Migration, ReplyOutcome};
pub use detector::{
    BalanceSnapshot, Detection, MatchPopulation, PopulationSource, RosterPopulation, SideExtremes,
    detect_imbalance,
};
pub use driver::{Reply, SessionClock, run};
pub use gate::{balance_permitted, developer_override, is_active};
pub use ledger::{AskedEntry, SweepSummary, VolunteerLedger, VolunteerState};
pub use score::{ScoreEvaluator, ScoreSource};
pub use selector::{CandidateSelector, skill_gap_target};
