//! Site invitations: single-use codes that turn a new account into a forest
//! steward for a set of sites.

use jiff::{SignedDuration, Timestamp};
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::InvitationError;

pub const INVITATION_LIFETIME: SignedDuration = SignedDuration::from_hours(7 * 24);

pub const CODE_LENGTH: usize = 32;

pub fn expires_at(created_at: Timestamp) -> Timestamp {
    created_at + INVITATION_LIFETIME
}

/// A code is valid up to and including its expiry instant.
pub fn check_not_expired(expires_at: Timestamp, now: Timestamp) -> Result<(), InvitationError> {
    if now > expires_at {
        Err(InvitationError::Expired)
    } else {
        Ok(())
    }
}

pub fn generate_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LENGTH)
        .map(char::from)
        .collect()
}
