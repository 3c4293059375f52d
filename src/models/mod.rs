use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

/// Settlement state of a transaction as reported by the provider feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Pending,
    Booked,
}

/// Which aggregation provider a bank is known through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenBanking,
    Monzo,
}

/// Raised when an enum column holds a value outside the known variants.
#[derive(Debug, Error)]
#[error("unknown {kind} value `{value}`")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Pending => "pending",
            TransactionState::Booked => "booked",
        }
    }
}

impl FromStr for TransactionState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionState::Pending),
            "booked" => Ok(TransactionState::Booked),
            other => Err(UnknownVariant {
                kind: "transaction state",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenBanking => "open_banking",
            ProviderType::Monzo => "monzo",
        }
    }
}

impl FromStr for ProviderType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open_banking" => Ok(ProviderType::OpenBanking),
            "monzo" => Ok(ProviderType::Monzo),
            other => Err(UnknownVariant {
                kind: "provider type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A banking institution known to an aggregation provider.
///
/// `active_requisition_id` is `Some` exactly while a link is being tracked;
/// it is cleared when the remote requisition disappears.
#[derive(Debug, Clone, PartialEq)]
pub struct Bank {
    pub id: i64,
    pub name: String,
    pub external_id: String,
    pub provider_type: ProviderType,
    pub active_requisition_id: Option<String>,
    pub activation_email_sent: bool,
}

impl Bank {
    /// Whether a requisition is currently tracked for this bank.
    pub fn has_active_requisition(&self) -> bool {
        self.active_requisition_id
            .as_deref()
            .is_some_and(|id| !id.is_empty())
    }
}

/// One bank account under a [`Bank`]. `(bank_id, external_id)` is unique.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: i64,
    pub bank_id: i64,
    pub name: String,
    pub external_id: String,
}

/// One normalized ledger entry, keyed by the provider-assigned identifier.
///
/// The identifier stays stable as `state` moves from pending to booked, so an
/// upsert overwrites every mutable field while keeping row identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub account_id: i64,
    pub booking_time: DateTime<FixedOffset>,
    pub sequence_number: i32,
    pub remittance_info: String,
    pub transaction_code: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub source_amount: Option<Decimal>,
    pub source_currency: Option<String>,
    pub exchange_rate: Option<f64>,
    pub state: TransactionState,
    pub source_data: Value,
}
