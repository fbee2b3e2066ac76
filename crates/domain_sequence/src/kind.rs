//! Document kinds and their period buckets

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SequenceError;

/// Kind of numbered document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Booking,
    Invoice,
    Quote,
    /// Payment transaction ids
    Transaction,
}

/// Granularity of the period segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodBucket {
    /// `YYMM`
    YearMonth,
    /// `YYYY`
    Year,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Booking,
        DocumentKind::Invoice,
        DocumentKind::Quote,
        DocumentKind::Transaction,
    ];

    pub fn bucket(&self) -> PeriodBucket {
        match self {
            DocumentKind::Booking | DocumentKind::Transaction => PeriodBucket::YearMonth,
            DocumentKind::Invoice | DocumentKind::Quote => PeriodBucket::Year,
        }
    }

    /// Zero-padded width of the numeric suffix
    pub fn width(&self) -> usize {
        match self {
            DocumentKind::Booking | DocumentKind::Quote => 4,
            DocumentKind::Invoice => 5,
            DocumentKind::Transaction => 6,
        }
    }

    pub fn default_prefix(&self) -> &'static str {
        match self {
            DocumentKind::Booking => "BKG",
            DocumentKind::Invoice => "INV",
            DocumentKind::Quote => "QT",
            DocumentKind::Transaction => "TXN",
        }
    }

    /// Period segment for a local calendar date
    pub fn period_for(&self, date: NaiveDate) -> String {
        match self.bucket() {
            PeriodBucket::YearMonth => format!("{:02}{:02}", date.year() % 100, date.month()),
            PeriodBucket::Year => format!("{:04}", date.year()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Booking => "booking",
            DocumentKind::Invoice => "invoice",
            DocumentKind::Quote => "quote",
            DocumentKind::Transaction => "transaction",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booking" => Ok(DocumentKind::Booking),
            "invoice" => Ok(DocumentKind::Invoice),
            "quote" => Ok(DocumentKind::Quote),
            "transaction" => Ok(DocumentKind::Transaction),
            other => Err(SequenceError::UnknownKind(other.to_string())),
        }
    }
}
