//! Guest preview quota.
//!
//! Anonymous callers are limited to a configured number of *completed*
//! jobs per kind. A limit of zero or below disables the check.

use crate::error::CoreError;

/// Default number of completed previews a guest may hold per kind.
pub const DEFAULT_GUEST_LIMIT: i64 = 3;

/// Returns `true` when a guest with `completed` jobs may not submit another.
pub fn is_exhausted(limit: i64, completed: i64) -> bool {
    limit > 0 && completed >= limit
}

/// Reject the submission with [`CoreError::QuotaExceeded`] once the guest
/// has used up its quota.
pub fn check_guest_quota(guest_id: &str, limit: i64, completed: i64) -> Result<(), CoreError> {
    if is_exhausted(limit, completed) {
        return Err(CoreError::QuotaExceeded {
            guest_id: guest_id.to_string(),
            limit,
        });
    }
    Ok(())
}
