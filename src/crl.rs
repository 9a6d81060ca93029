//! Certificate revocation lists.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::name::DistinguishedName;
use crate::types::{RevocationReason, SerialNumber};

/// One revoked certificate: serial, when, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedCertEntry {
    /// Serial of the revoked certificate.
    pub serial_number: SerialNumber,
    /// When the certificate was revoked.
    pub revocation_date: DateTime<Utc>,
    /// Why the certificate was revoked.
    pub reason: RevocationReason,
}

/// Issuer-scoped, time-stamped list of revoked certificate serials.
///
/// Signed by the issuing CA's key; entries are keyed by serial so
/// [`is_revoked`](Self::is_revoked) is an O(1) membership query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRevocationList {
    issuer: DistinguishedName,
    this_update: DateTime<Utc>,
    next_update: DateTime<Utc>,
    revoked_certificates: HashMap<SerialNumber, RevokedCertEntry>,
    signature: Vec<u8>,
}

impl CertificateRevocationList {
    pub(crate) fn new(
        issuer: DistinguishedName,
        this_update: DateTime<Utc>,
        next_update: DateTime<Utc>,
        entries: Vec<RevokedCertEntry>,
    ) -> Self {
        let revoked_certificates = entries
            .into_iter()
            .map(|entry| (entry.serial_number, entry))
            .collect();
        Self {
            issuer,
            this_update,
            next_update,
            revoked_certificates,
            signature: Vec::new(),
        }
    }

    pub(crate) fn attach_signature(&mut self, signature: Vec<u8>) {
        self.signature = signature;
    }

    /// Returns the issuing CA's name.
    #[must_use]
    pub const fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    /// Returns when this list was generated.
    #[must_use]
    pub const fn this_update(&self) -> DateTime<Utc> {
        self.this_update
    }

    /// Returns when the next list is due.
    #[must_use]
    pub const fn next_update(&self) -> DateTime<Utc> {
        self.next_update
    }

    /// Returns the issuer signature over the list content.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// O(1) membership query: is the serial on this list?
    #[must_use]
    pub fn is_revoked(&self, serial: SerialNumber) -> bool {
        self.revoked_certificates.contains_key(&serial)
    }

    /// Returns the entry for a serial, if present.
    #[must_use]
    pub fn entry(&self, serial: SerialNumber) -> Option<&RevokedCertEntry> {
        self.revoked_certificates.get(&serial)
    }

    /// Iterates over the revoked entries in unspecified order.
    pub fn entries(&self) -> impl Iterator<Item = &RevokedCertEntry> {
        self.revoked_certificates.values()
    }

    /// Number of revoked entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.revoked_certificates.len()
    }

    /// Returns true if no certificates are revoked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.revoked_certificates.is_empty()
    }

    /// The message the issuing CA signs: a domain-separated digest over the
    /// issuer, the update window, and the entries in serial order.
    #[must_use]
    pub fn signing_message(&self) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"certforge.crl.v1");
        hasher.update(self.issuer.to_string().as_bytes());
        hasher.update(&self.this_update.timestamp().to_le_bytes());
        hasher.update(&self.next_update.timestamp().to_le_bytes());

        let mut serials: Vec<_> = self.revoked_certificates.keys().copied().collect();
        serials.sort_unstable();
        for serial in serials {
            if let Some(entry) = self.revoked_certificates.get(&serial) {
                hasher.update(serial.to_string().as_bytes());
                hasher.update(&entry.revocation_date.timestamp().to_le_bytes());
                hasher.update(entry.reason.to_string().as_bytes());
            }
        }

        hasher.finalize().as_bytes().to_vec()
    }
}
