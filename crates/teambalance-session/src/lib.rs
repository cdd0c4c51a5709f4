//! Team balance session seams.
//!
//! The balance controller never owns the session. It borrows one through
//! the traits in this crate, once per call, and resolves participant
//! handles through it every time it needs them.
//!
//! # Components
//!
//! - **`roster`**: `Roster` and `Participant`: sides, membership, round state
//! - **`live_match`**: `LiveMatch`: the authoritative match backend, when present
//! - **`transport`**: `Transport`: fire-and-forget notifications to participants
//! - **`memory`**: in-memory implementations for tests and simulation

pub mod live_match;
pub mod memory;
pub mod roster;
pub mod transport;

pub use live_match::LiveMatch;
pub use memory::{BonusGrant, MemoryMatch, MemoryParticipant, MemoryRoster};
pub use roster::{Participant, Roster};
pub use transport::{ChannelTransport, Notification, RecordingTransport, Transport};
