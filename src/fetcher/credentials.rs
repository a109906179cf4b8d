//! Upstream API credentials.
//!
//! A [`Credential`] never renders its secret through `Debug` or `Display`; the
//! only observable form is [`Credential::fingerprint`].

use std::fmt;

const FINGERPRINT_PREFIX_LEN: usize = 6;
const MIN_LEN_FOR_PREFIX: usize = 10;

#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Short identifying prefix safe for logs: `AIzaSy...`, or `***` for short secrets.
    pub fn fingerprint(&self) -> String {
        if self.0.chars().count() < MIN_LEN_FOR_PREFIX {
            return "***".to_string();
        }
        let prefix: String = self.0.chars().take(FINGERPRINT_PREFIX_LEN).collect();
        format!("{}...", prefix)
    }

    /// Raw secret, for building the upstream request only.
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }

    /// Replaces any occurrence of the secret in `text` with the fingerprint.
    pub fn redact(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }
        text.replace(&self.0, &self.fingerprint())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

/// Ordered, immutable set of credentials loaded once at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialSet {
    credentials: Vec<Credential>,
}

impl CredentialSet {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self { credentials }
    }

    /// Parses a comma-separated list, trimming whitespace and dropping blank entries.
    pub fn from_comma_separated(raw: &str) -> Self {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Credential::new)
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }
}
