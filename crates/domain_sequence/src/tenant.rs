//! Tenant numbering configuration
//!
//! Tenants are owned by an external identity service; this crate only reads
//! the numbering configuration and calendar timezone.

use core_kernel::{TenantId, Timezone};
use serde::{Deserialize, Serialize};

use crate::error::SequenceError;
use crate::kind::DocumentKind;

/// Prefix and first number for one document kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingScheme {
    pub prefix: String,
    pub start_number: u64,
}

impl NumberingScheme {
    pub fn new(prefix: impl Into<String>, start_number: u64) -> Self {
        Self {
            prefix: prefix.into(),
            start_number,
        }
    }

    pub fn default_for(kind: DocumentKind) -> Self {
        Self::new(kind.default_prefix(), 1)
    }

    /// Prefixes are embedded in document numbers, so they must be
    /// non-empty alphanumerics without the `-` separator
    pub fn validate(&self, kind: DocumentKind) -> Result<(), SequenceError> {
        if self.prefix.is_empty() || !self.prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SequenceError::InvalidScheme {
                kind: kind.to_string(),
                message: format!("prefix '{}' must be non-empty ASCII alphanumerics", self.prefix),
            });
        }
        if self.start_number == 0 {
            return Err(SequenceError::InvalidScheme {
                kind: kind.to_string(),
                message: "start number must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Numbering schemes for every document kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingConfig {
    pub booking: NumberingScheme,
    pub invoice: NumberingScheme,
    pub quote: NumberingScheme,
    #[serde(default = "default_transaction_scheme")]
    pub transaction: NumberingScheme,
}

fn default_transaction_scheme() -> NumberingScheme {
    NumberingScheme::default_for(DocumentKind::Transaction)
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            booking: NumberingScheme::default_for(DocumentKind::Booking),
            invoice: NumberingScheme::default_for(DocumentKind::Invoice),
            quote: NumberingScheme::default_for(DocumentKind::Quote),
            transaction: NumberingScheme::default_for(DocumentKind::Transaction),
        }
    }
}

impl NumberingConfig {
    pub fn scheme(&self, kind: DocumentKind) -> &NumberingScheme {
        match kind {
            DocumentKind::Booking => &self.booking,
            DocumentKind::Invoice => &self.invoice,
            DocumentKind::Quote => &self.quote,
            DocumentKind::Transaction => &self.transaction,
        }
    }
}

/// Read-only tenant view used for allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    #[serde(default)]
    pub timezone: Timezone,
    #[serde(default)]
    pub numbering: NumberingConfig,
}

impl Tenant {
    pub fn new(id: TenantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            timezone: Timezone::default(),
            numbering: NumberingConfig::default(),
        }
    }

    pub fn with_timezone(mut self, timezone: Timezone) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_scheme(mut self, kind: DocumentKind, scheme: NumberingScheme) -> Self {
        match kind {
            DocumentKind::Booking => self.numbering.booking = scheme,
            DocumentKind::Invoice => self.numbering.invoice = scheme,
            DocumentKind::Quote => self.numbering.quote = scheme,
            DocumentKind::Transaction => self.numbering.transaction = scheme,
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_validation() {
        assert!(NumberingScheme::new("ACME", 100).validate(DocumentKind::Booking).is_ok());
        assert!(NumberingScheme::new("AC-ME", 1).validate(DocumentKind::Booking).is_err());
        assert!(NumberingScheme::new("", 1).validate(DocumentKind::Invoice).is_err());
        assert!(NumberingScheme::new("INV", 0).validate(DocumentKind::Invoice).is_err());
    }

    #[test]
    fn test_numbering_config_deserializes_without_transaction() {
        let json = r#"{
            "booking": {"prefix": "B", "start_number": 1},
            "invoice": {"prefix": "I", "start_number": 1},
            "quote": {"prefix": "Q", "start_number": 1}
        }"#;
        let config: NumberingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.transaction.prefix, "TXN");
    }
}
