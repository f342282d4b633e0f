//! Primary-membership selection.
//!
//! Rule: among `active` memberships, highest role wins
//! (admin > staff > member); ties go to the lowest chamber id. No active
//! membership means no primary membership. The result never depends on the
//! order the backend returned rows in.

use core::cmp::Reverse;

use chamberhub_core::ChamberMembership;

pub fn select_primary(memberships: &[ChamberMembership]) -> Option<&ChamberMembership> {
    memberships
        .iter()
        .filter(|m| m.status.is_active())
        .min_by_key(|m| (Reverse(m.role.rank()), m.chamber_id))
}
