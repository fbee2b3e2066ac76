//! Payment method shared by booking sub-ledgers and payment records

use serde::{Deserialize, Serialize};
use std::fmt;

/// How money moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Bank transfer
    BankTransfer,
    /// Credit card taken at the counter
    CreditCard,
    /// Debit card
    DebitCard,
    /// Check/cheque
    Check,
    /// Cash
    Cash,
    /// Digital wallet
    DigitalWallet,
    /// Online payment settled by the payment gateway
    Gateway,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Check => "check",
            PaymentMethod::Cash => "cash",
            PaymentMethod::DigitalWallet => "digital_wallet",
            PaymentMethod::Gateway => "gateway",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
