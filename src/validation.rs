//! Time-window validity helpers.
//!
//! These are strictly local checks against a single certificate; chain
//! validity (issuer linkage, signatures, path constraints) is the CA
//! engine's job.

use chrono::Utc;

use crate::types::Certificate;

/// Returns true if the certificate's `not_after` has passed.
#[must_use]
pub fn is_expired(cert: &Certificate) -> bool {
    cert.not_after() < Utc::now()
}

/// Returns true if the certificate's `not_before` is still in the future.
#[must_use]
pub fn is_not_yet_valid(cert: &Certificate) -> bool {
    cert.not_before() > Utc::now()
}

/// Returns true if `not_before <= now <= not_after`.
///
/// Independent of revocation status.
#[must_use]
pub fn is_valid_now(cert: &Certificate) -> bool {
    !is_expired(cert) && !is_not_yet_valid(cert)
}

/// Duration until expiry, or `None` if already expired.
#[must_use]
pub fn remaining_validity(cert: &Certificate) -> Option<chrono::Duration> {
    let now = Utc::now();
    if cert.not_after() > now {
        Some(cert.not_after() - now)
    } else {
        None
    }
}
