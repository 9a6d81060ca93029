//! Distinguished names for certificate subjects and issuers.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// X.509-style distinguished name.
///
/// All fields are optional except `common_name`. The canonical string form
/// renders populated fields in the fixed order `C, ST, L, O, OU, CN,
/// emailAddress`, joined by `", "`. Two names are equal iff their canonical
/// strings match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistinguishedName {
    /// Country (C).
    pub country: Option<String>,
    /// State or province (ST).
    pub state: Option<String>,
    /// Locality (L).
    pub locality: Option<String>,
    /// Organization (O).
    pub organization: Option<String>,
    /// Organizational unit (OU).
    pub organizational_unit: Option<String>,
    /// Common name (CN). Required.
    pub common_name: String,
    /// Email address (emailAddress).
    pub email: Option<String>,
}

impl DistinguishedName {
    /// Creates a distinguished name with only the common name set.
    #[must_use]
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            country: None,
            state: None,
            locality: None,
            organization: None,
            organizational_unit: None,
            common_name: common_name.into(),
            email: None,
        }
    }

    /// Creates a builder for a distinguished name.
    #[must_use]
    pub fn builder(common_name: impl Into<String>) -> DistinguishedNameBuilder {
        DistinguishedNameBuilder {
            name: Self::new(common_name),
        }
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(c) = &self.country {
            parts.push(format!("C={c}"));
        }
        if let Some(st) = &self.state {
            parts.push(format!("ST={st}"));
        }
        if let Some(l) = &self.locality {
            parts.push(format!("L={l}"));
        }
        if let Some(o) = &self.organization {
            parts.push(format!("O={o}"));
        }
        if let Some(ou) = &self.organizational_unit {
            parts.push(format!("OU={ou}"));
        }
        parts.push(format!("CN={}", self.common_name));
        if let Some(e) = &self.email {
            parts.push(format!("emailAddress={e}"));
        }
        write!(f, "{}", parts.join(", "))
    }
}

impl PartialEq for DistinguishedName {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for DistinguishedName {}

impl Hash for DistinguishedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

/// Builder for distinguished names.
#[derive(Debug)]
pub struct DistinguishedNameBuilder {
    name: DistinguishedName,
}

impl DistinguishedNameBuilder {
    /// Sets the country (C).
    #[must_use]
    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.name.country = Some(country.into());
        self
    }

    /// Sets the state or province (ST).
    #[must_use]
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.name.state = Some(state.into());
        self
    }

    /// Sets the locality (L).
    #[must_use]
    pub fn locality(mut self, locality: impl Into<String>) -> Self {
        self.name.locality = Some(locality.into());
        self
    }

    /// Sets the organization (O).
    #[must_use]
    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.name.organization = Some(organization.into());
        self
    }

    /// Sets the organizational unit (OU).
    #[must_use]
    pub fn organizational_unit(mut self, unit: impl Into<String>) -> Self {
        self.name.organizational_unit = Some(unit.into());
        self
    }

    /// Sets the email address.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.name.email = Some(email.into());
        self
    }

    /// Builds the distinguished name.
    #[must_use]
    pub fn build(self) -> DistinguishedName {
        self.name
    }
}
