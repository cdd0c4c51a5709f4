//! Activity and permission gates.
//!
//! `is_active` decides whether the controller runs at all and is
//! re-checked every tick. `balance_permitted` is the soft block from the
//! live match: while it is `false` the controller waits instead of
//! progressing.

use teambalance_core::{BalanceMode, BalanceSettings, SessionMode};
use teambalance_session::Roster;

/// Developer override, honoured only in debug builds.
pub fn developer_override(settings: &BalanceSettings) -> bool {
    settings.developer && cfg!(debug_assertions)
}

/// Whether the controller should be running for this session.
pub fn is_active(settings: &BalanceSettings, mode: &SessionMode) -> bool {
    if mode.training || mode.item_testing {
        return false;
    }

    // The join queue does the balancing in queued arena.
    if mode.queued_arena {
        return false;
    }

    if developer_override(settings) {
        return false;
    }

    if !settings.limit_enabled() {
        return false;
    }

    // Managed matches decide for themselves, tournament or not.
    if let Some(managed) = mode.managed_match {
        return managed.uses_autobalance;
    }

    if mode.tournament {
        return false;
    }

    settings.mode == BalanceMode::Volunteer
}

/// Whether team membership may change right now.
pub fn balance_permitted(roster: &dyn Roster) -> bool {
    roster
        .live_match()
        .is_none_or(|live| live.can_change_membership())
}
