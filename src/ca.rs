//! Certificate Authority engine.
//!
//! The engine is the single owner of three registries: serial to
//! certificate, name to serial (for named intermediates), and serial to CA
//! signing key. All mutation goes through the write lock; verification,
//! chain building, and export read a consistent snapshot.

// Lock guards are intentionally held across registry reads/writes.
#![allow(clippy::significant_drop_tightening)]

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::crl::{CertificateRevocationList, RevokedCertEntry};
use crate::error::{Error, Result};
use crate::name::DistinguishedName;
use crate::signer::{Ed25519Provider, KeyPair, SignatureProvider};
use crate::types::{
    Certificate, CertificateType, ExtendedKeyUsage, KeyUsage, PrivateKey, RevocationReason,
    SerialNumber, SubjectAltName,
};
use crate::validation;

/// Default CRL validity window in days.
const DEFAULT_CRL_VALIDITY_DAYS: i64 = 7;

/// `not_before` backdating to absorb clock skew between hosts.
const CLOCK_SKEW_HOURS: i64 = 1;

/// Certificate Authority: issues, verifies, and revokes certificates.
///
/// One engine is one independent CA with its own root, registries, and
/// revocation state; multiple engines may coexist in a process.
pub struct CertificateAuthority {
    provider: Box<dyn SignatureProvider>,
    root_serial: SerialNumber,
    country: String,
    organization: String,
    crl_validity: Duration,
    registry: RwLock<Registry>,
}

/// Registries owned by the engine. The certificate map is the single owner
/// of all issued records (arena-by-serial); issuer links are serial lookup
/// keys, never pointers.
struct Registry {
    by_serial: HashMap<SerialNumber, Certificate>,
    by_name: HashMap<String, SerialNumber>,
    signing_keys: HashMap<SerialNumber, PrivateKey>,
}

impl CertificateAuthority {
    /// Creates a new CA with a self-signed Ed25519 root certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid or key generation
    /// fails.
    pub fn new(
        ca_name: &str,
        country: &str,
        organization: &str,
        validity_days: u32,
    ) -> Result<Self> {
        Self::with_provider(
            ca_name,
            country,
            organization,
            validity_days,
            Box::new(Ed25519Provider),
        )
    }

    /// Creates a new CA using a custom signature provider.
    pub fn with_provider(
        ca_name: &str,
        country: &str,
        organization: &str,
        validity_days: u32,
        provider: Box<dyn SignatureProvider>,
    ) -> Result<Self> {
        if ca_name.is_empty() {
            return Err(Error::Validation("CA name cannot be empty".into()));
        }
        if validity_days == 0 {
            return Err(Error::Validation(
                "validity_days must be greater than 0".into(),
            ));
        }

        info!("Creating new Certificate Authority: {}", ca_name);

        let key_pair = provider.generate_key_pair()?;
        let serial = SerialNumber::generate();

        let subject = DistinguishedName::builder(ca_name)
            .country(country)
            .organization(organization)
            .build();

        let now = Utc::now();
        let mut root = Certificate {
            serial_number: serial,
            subject: subject.clone(),
            issuer: subject,
            certificate_type: CertificateType::RootCa,
            not_before: now - Duration::hours(CLOCK_SKEW_HOURS),
            not_after: now + Duration::days(i64::from(validity_days)),
            is_ca: true,
            basic_constraints_path_len: None,
            subject_alt_names: None,
            key_usage: Some(KeyUsage::ca()),
            extended_key_usage: None,
            public_key: key_pair.public_key().to_vec(),
            signature: Vec::new(),
            issuer_serial: None,
            revoked: false,
            revocation_date: None,
            revocation_reason: None,
        };
        root.signature = provider.sign(&root.signing_message(), key_pair.private_key())?;

        let mut registry = Registry {
            by_serial: HashMap::new(),
            by_name: HashMap::new(),
            signing_keys: HashMap::new(),
        };
        registry.by_serial.insert(serial, root);
        registry.by_name.insert(ca_name.to_string(), serial);
        registry
            .signing_keys
            .insert(serial, key_pair.private_key().clone());

        debug!("CA root certificate created: serial {}", serial);

        Ok(Self {
            provider,
            root_serial: serial,
            country: country.to_string(),
            organization: organization.to_string(),
            crl_validity: Duration::days(DEFAULT_CRL_VALIDITY_DAYS),
            registry: RwLock::new(registry),
        })
    }

    /// Overrides the CRL validity window (default 7 days).
    pub fn set_crl_validity(&mut self, validity: Duration) {
        self.crl_validity = validity;
    }

    /// Returns a copy of the root certificate.
    pub fn root_certificate(&self) -> Result<Certificate> {
        self.certificate(self.root_serial)
    }

    /// Looks up a certificate by serial.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for unknown serials.
    pub fn certificate(&self, serial: SerialNumber) -> Result<Certificate> {
        let registry = self.read_registry()?;
        registry
            .by_serial
            .get(&serial)
            .cloned()
            .ok_or_else(|| Error::NotFound(serial.to_string()))
    }

    /// Number of certificates issued by this CA (root included).
    #[must_use]
    pub fn issued_count(&self) -> usize {
        self.registry.read().map(|r| r.by_serial.len()).unwrap_or(0)
    }

    /// Creates an intermediate CA, signed by `issuer` (`None` = root), and
    /// registers it under `ca_name` so later issuance can target it by name.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid parameters, an unknown issuer name, or a
    /// name that is already registered.
    pub fn create_intermediate_ca(
        &self,
        ca_name: &str,
        validity_days: u32,
        path_len: u32,
        issuer: Option<&str>,
    ) -> Result<(Certificate, KeyPair)> {
        if ca_name.is_empty() {
            return Err(Error::Validation("CA name cannot be empty".into()));
        }
        if validity_days == 0 {
            return Err(Error::Validation(
                "validity_days must be greater than 0".into(),
            ));
        }

        info!("Creating intermediate CA: {}", ca_name);

        let mut registry = self.write_registry()?;
        if registry.by_name.contains_key(ca_name) {
            return Err(Error::Validation(format!(
                "CA name '{ca_name}' is already registered"
            )));
        }

        let subject = DistinguishedName::builder(ca_name)
            .country(self.country.as_str())
            .organization(self.organization.as_str())
            .build();

        let (cert, key_pair) = self.build_signed_certificate(
            &mut registry,
            subject,
            CertificateType::IntermediateCa,
            Some(path_len),
            None,
            Some(KeyUsage::ca()),
            None,
            validity_days,
            issuer,
        )?;

        registry
            .by_name
            .insert(ca_name.to_string(), cert.serial_number());
        registry
            .signing_keys
            .insert(cert.serial_number(), key_pair.private_key().clone());

        Ok((cert, key_pair))
    }

    /// Issues a server (TLS) leaf certificate.
    ///
    /// The SAN extension is always present, populated from `dns_names` and
    /// `ip_addresses`; the common name is not auto-added.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid parameters or an unknown issuer name.
    pub fn issue_server_certificate(
        &self,
        common_name: &str,
        dns_names: Vec<String>,
        ip_addresses: Vec<String>,
        validity_days: u32,
        issuer: Option<&str>,
    ) -> Result<(Certificate, KeyPair)> {
        if common_name.is_empty() {
            return Err(Error::Validation("common name cannot be empty".into()));
        }
        if validity_days == 0 {
            return Err(Error::Validation(
                "validity_days must be greater than 0".into(),
            ));
        }

        info!("Issuing server certificate for: {}", common_name);

        let mut registry = self.write_registry()?;
        self.build_signed_certificate(
            &mut registry,
            DistinguishedName::new(common_name),
            CertificateType::Server,
            None,
            Some(SubjectAltName::new(dns_names, ip_addresses)),
            Some(KeyUsage::leaf()),
            Some(ExtendedKeyUsage::server()),
            validity_days,
            issuer,
        )
    }

    /// Issues a client leaf certificate.
    ///
    /// When `email` is set it becomes part of the subject name and enables
    /// the `email_protection` extended key usage.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid parameters or an unknown issuer name.
    pub fn issue_client_certificate(
        &self,
        common_name: &str,
        email: Option<&str>,
        validity_days: u32,
        issuer: Option<&str>,
    ) -> Result<(Certificate, KeyPair)> {
        if common_name.is_empty() {
            return Err(Error::Validation("common name cannot be empty".into()));
        }
        if validity_days == 0 {
            return Err(Error::Validation(
                "validity_days must be greater than 0".into(),
            ));
        }

        info!("Issuing client certificate for: {}", common_name);

        let mut subject = DistinguishedName::new(common_name);
        subject.email = email.map(String::from);

        let mut registry = self.write_registry()?;
        self.build_signed_certificate(
            &mut registry,
            subject,
            CertificateType::Client,
            None,
            None,
            Some(KeyUsage::leaf()),
            Some(ExtendedKeyUsage::client(email.is_some())),
            validity_days,
            issuer,
        )
    }

    /// Verifies a certificate against this CA's registry.
    ///
    /// Succeeds iff the certificate is inside its validity window and not
    /// revoked, the chain up to the root resolves, every link is unexpired,
    /// unrevoked, and (for non-terminal links) a CA, every issuer name
    /// matches its parent's subject, every signature checks out against the
    /// parent's public key, and no path-length constraint is exceeded.
    ///
    /// Verification is a query: all failures return `false`.
    #[must_use]
    pub fn verify_certificate(&self, cert: &Certificate) -> bool {
        let Ok(registry) = self.registry.read() else {
            return false;
        };

        // The presented certificate must match the registered record for
        // its serial. The walk below resolves links through the registry,
        // so content drift in the input (subject, SAN, validity, public
        // key, signature) is caught here.
        if let Some(registered) = registry.by_serial.get(&cert.serial_number()) {
            if registered.signing_message() != cert.signing_message()
                || registered.signature() != cert.signature()
            {
                return false;
            }
        }

        let chain = match Self::resolve_chain(&registry, cert) {
            Ok(chain) => chain,
            Err(e) => {
                debug!("chain resolution failed for {}: {}", cert.serial_number(), e);
                return false;
            }
        };

        // The walk must terminate at this CA's own trust anchor; a foreign
        // self-signed certificate is not trusted just for being self-signed.
        if chain.last().map(Certificate::serial_number) != Some(self.root_serial) {
            return false;
        }

        for (i, link) in chain.iter().enumerate() {
            if !validation::is_valid_now(link) || link.revoked() {
                return false;
            }
            if i > 0 && !link.is_ca_certificate() {
                return false;
            }
        }

        for (i, link) in chain.iter().enumerate() {
            // Root verifies against itself.
            let parent = chain.get(i + 1).unwrap_or(link);
            if link.issuer() != parent.subject() {
                return false;
            }
            if !self
                .provider
                .verify(&link.signing_message(), link.signature(), parent.public_key())
            {
                return false;
            }
        }

        // A path-length constraint bounds the CA certificates beneath the
        // constrained link in the chain.
        for (i, link) in chain.iter().enumerate() {
            if let Some(limit) = link.basic_constraints_path_len() {
                let cas_below = chain[..i]
                    .iter()
                    .filter(|c| c.is_ca_certificate())
                    .count();
                if cas_below > usize::try_from(limit).unwrap_or(usize::MAX) {
                    return false;
                }
            }
        }

        true
    }

    /// Revokes a certificate by serial.
    ///
    /// Returns `false` for unknown serials. Revoking an already-revoked
    /// certificate is an idempotent no-op returning `true`; the original
    /// revocation date and reason are preserved.
    pub fn revoke_certificate(&self, serial: SerialNumber, reason: RevocationReason) -> bool {
        let Ok(mut registry) = self.registry.write() else {
            warn!("registry lock poisoned; cannot revoke {}", serial);
            return false;
        };

        match registry.by_serial.get_mut(&serial) {
            None => {
                warn!("cannot revoke unknown serial: {}", serial);
                false
            }
            Some(cert) if cert.revoked() => {
                debug!("certificate {} already revoked", serial);
                true
            }
            Some(cert) => {
                info!("Revoking certificate {} ({})", serial, reason);
                cert.mark_revoked(Utc::now(), reason);
                true
            }
        }
    }

    /// Generates a signed CRL for the given issuing CA (`None` = root).
    ///
    /// Contains every revoked certificate whose issuer name matches the
    /// issuing CA's subject.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown issuer name or if signing fails.
    pub fn generate_crl(&self, issuer: Option<&str>) -> Result<CertificateRevocationList> {
        let registry = self.read_registry()?;
        let issuer_serial = Self::resolve_issuer_serial(&registry, issuer, self.root_serial)?;
        let issuer_cert = registry
            .by_serial
            .get(&issuer_serial)
            .ok_or_else(|| Error::NotFound(issuer_serial.to_string()))?;
        let issuer_key = registry
            .signing_keys
            .get(&issuer_serial)
            .ok_or_else(|| Error::NotFound(format!("signing key for {issuer_serial}")))?;

        let entries: Vec<RevokedCertEntry> = registry
            .by_serial
            .values()
            .filter(|cert| cert.revoked() && cert.issuer() == issuer_cert.subject())
            .filter_map(|cert| {
                let revocation_date = cert.revocation_date()?;
                Some(RevokedCertEntry {
                    serial_number: cert.serial_number(),
                    revocation_date,
                    reason: cert
                        .revocation_reason()
                        .unwrap_or(RevocationReason::Unspecified),
                })
            })
            .collect();

        info!(
            "Generating CRL for {} with {} entries",
            issuer_cert.subject(),
            entries.len()
        );

        let now = Utc::now();
        let mut crl = CertificateRevocationList::new(
            issuer_cert.subject().clone(),
            now,
            now + self.crl_validity,
            entries,
        );
        let signature = self.provider.sign(&crl.signing_message(), issuer_key)?;
        crl.attach_signature(signature);

        Ok(crl)
    }

    /// Returns the chain `[cert, parent, …, root]`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidChain` when a link cannot be resolved or the
    /// walk detects a cycle.
    pub fn get_certificate_chain(&self, cert: &Certificate) -> Result<Vec<Certificate>> {
        let registry = self.read_registry()?;
        Self::resolve_chain(&registry, cert)
    }

    /// PEM-encodes the full chain, leaf to root.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidChain` when the chain cannot be resolved.
    pub fn export_certificate_bundle(&self, cert: &Certificate) -> Result<String> {
        let chain = self.get_certificate_chain(cert)?;
        Ok(chain.iter().map(Certificate::to_pem).collect())
    }

    /// Builds, signs, and registers a certificate. Caller holds the write
    /// lock; name indexing (for intermediates) is the caller's job.
    #[allow(clippy::too_many_arguments)]
    fn build_signed_certificate(
        &self,
        registry: &mut Registry,
        subject: DistinguishedName,
        certificate_type: CertificateType,
        path_len: Option<u32>,
        subject_alt_names: Option<SubjectAltName>,
        key_usage: Option<KeyUsage>,
        extended_key_usage: Option<ExtendedKeyUsage>,
        validity_days: u32,
        issuer: Option<&str>,
    ) -> Result<(Certificate, KeyPair)> {
        let issuer_serial = Self::resolve_issuer_serial(registry, issuer, self.root_serial)?;
        let issuer_cert = registry
            .by_serial
            .get(&issuer_serial)
            .ok_or_else(|| Error::NotFound(issuer_serial.to_string()))?;
        if !issuer_cert.is_ca_certificate() {
            return Err(Error::Validation(format!(
                "issuer '{}' is not a CA certificate",
                issuer_cert.subject()
            )));
        }
        let issuer_name = issuer_cert.subject().clone();
        let issuer_key = registry
            .signing_keys
            .get(&issuer_serial)
            .ok_or_else(|| Error::NotFound(format!("signing key for {issuer_serial}")))?
            .clone();

        let key_pair = self.provider.generate_key_pair()?;
        let serial = Self::allocate_serial(registry);

        let now = Utc::now();
        let mut cert = Certificate {
            serial_number: serial,
            subject,
            issuer: issuer_name,
            certificate_type,
            not_before: now - Duration::hours(CLOCK_SKEW_HOURS),
            not_after: now + Duration::days(i64::from(validity_days)),
            is_ca: certificate_type.is_ca(),
            basic_constraints_path_len: path_len,
            subject_alt_names,
            key_usage,
            extended_key_usage,
            public_key: key_pair.public_key().to_vec(),
            signature: Vec::new(),
            issuer_serial: Some(issuer_serial),
            revoked: false,
            revocation_date: None,
            revocation_reason: None,
        };
        cert.signature = self.provider.sign(&cert.signing_message(), &issuer_key)?;

        registry.by_serial.insert(serial, cert.clone());

        debug!(
            "Certificate issued: serial {} subject {}",
            serial,
            cert.subject()
        );

        Ok((cert, key_pair))
    }

    /// Allocates a serial unique within this CA. Collisions against the
    /// registry are retried internally and never surfaced.
    fn allocate_serial(registry: &Registry) -> SerialNumber {
        loop {
            let serial = SerialNumber::generate();
            if !registry.by_serial.contains_key(&serial) {
                return serial;
            }
            debug!("serial collision, regenerating");
        }
    }

    fn resolve_issuer_serial(
        registry: &Registry,
        issuer: Option<&str>,
        root_serial: SerialNumber,
    ) -> Result<SerialNumber> {
        match issuer {
            None => Ok(root_serial),
            Some(name) => registry
                .by_name
                .get(name)
                .copied()
                .ok_or_else(|| Error::NotFound(format!("issuer CA '{name}'"))),
        }
    }

    /// Walks issuer references through the registry until the self-signed
    /// root. Bounded by registry size plus one and a visited set, so cycles
    /// fail instead of looping.
    fn resolve_chain(registry: &Registry, start: &Certificate) -> Result<Vec<Certificate>> {
        let max_depth = registry.by_serial.len() + 1;
        let mut chain = Vec::new();
        let mut visited = HashSet::new();

        // Prefer the registry's copy so revocation state is current.
        let mut current = registry
            .by_serial
            .get(&start.serial_number())
            .cloned()
            .unwrap_or_else(|| start.clone());

        loop {
            if chain.len() >= max_depth || !visited.insert(current.serial_number()) {
                return Err(Error::InvalidChain("cycle detected".into()));
            }

            let self_signed = current.subject() == current.issuer();
            let parent_serial = current.issuer_serial();
            chain.push(current);

            if self_signed {
                return Ok(chain);
            }

            let parent_serial = parent_serial
                .ok_or_else(|| Error::InvalidChain("missing issuer reference".into()))?;
            current = registry
                .by_serial
                .get(&parent_serial)
                .cloned()
                .ok_or_else(|| {
                    Error::InvalidChain(format!("issuer certificate {parent_serial} not found"))
                })?;
        }
    }

    fn read_registry(&self) -> Result<std::sync::RwLockReadGuard<'_, Registry>> {
        self.registry
            .read()
            .map_err(|e| Error::Storage(format!("failed to acquire read lock: {e}")))
    }

    fn write_registry(&self) -> Result<std::sync::RwLockWriteGuard<'_, Registry>> {
        self.registry
            .write()
            .map_err(|e| Error::Storage(format!("failed to acquire write lock: {e}")))
    }
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("root_serial", &self.root_serial)
            .field("issued_count", &self.issued_count())
            .field("signing_keys", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
