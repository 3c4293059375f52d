use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Response from POST /token/new/
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub access_expires: i64,
    pub refresh: String,
    pub refresh_expires: i64,
}

/// Response from POST /token/refresh/ — the refresh token is not rotated.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access: String,
    pub access_expires: i64,
}

/// One institution from GET /institutions/
#[derive(Debug, Clone, Deserialize)]
pub struct Institution {
    pub id: String,
    pub name: String,
}

/// Response from POST /agreements/enduser/
#[derive(Debug, Clone, Deserialize)]
pub struct EndUserAgreement {
    pub id: String,
}

/// A requisition (bank link) as returned by the requisition endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Requisition {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub link: String,
}

/// Response from GET /requisitions/
#[derive(Debug, Clone, Deserialize)]
pub struct RequisitionList {
    pub results: Vec<Requisition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountDetailsResponse {
    pub account: AccountDetails,
}

/// The slice of GET /accounts/{id}/details/ the archiver uses.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountDetails {
    #[serde(rename = "resourceId")]
    pub resource_id: String,
    pub details: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: RawFeed,
}

/// The raw transaction feed: two newest-first lists of untyped records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFeed {
    #[serde(default)]
    pub booked: Vec<RawRecord>,
    #[serde(default)]
    pub pending: Vec<RawRecord>,
}

/// One provider transaction record, kept as the raw JSON document so it can be
/// archived verbatim. Accessors expose the handful of fields the normalizer
/// reads; no validation happens at this layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Value);

impl RawRecord {
    pub fn transaction_id(&self) -> Option<&str> {
        self.0.get("transactionId").and_then(Value::as_str)
    }

    pub fn booking_date_time(&self) -> Option<&str> {
        self.0.get("bookingDateTime").and_then(Value::as_str)
    }

    pub fn remittance_info(&self) -> Option<&str> {
        self.0
            .get("remittanceInformationUnstructured")
            .and_then(Value::as_str)
    }

    pub fn amount(&self) -> Option<&str> {
        self.0
            .get("transactionAmount")
            .and_then(|v| v.get("amount"))
            .and_then(Value::as_str)
    }

    pub fn currency(&self) -> Option<&str> {
        self.0
            .get("transactionAmount")
            .and_then(|v| v.get("currency"))
            .and_then(Value::as_str)
    }

    pub fn transaction_code(&self) -> Option<&str> {
        self.0
            .get("proprietaryBankTransactionCode")
            .and_then(Value::as_str)
    }

    fn currency_exchange(&self) -> Option<&Value> {
        self.0.get("currencyExchange")
    }

    pub fn exchange_source_currency(&self) -> Option<&str> {
        self.currency_exchange()?
            .get("sourceCurrency")
            .and_then(Value::as_str)
    }

    pub fn exchange_source_amount(&self) -> Option<&str> {
        self.currency_exchange()?
            .get("instructedAmount")?
            .get("amount")
            .and_then(Value::as_str)
    }

    pub fn exchange_rate(&self) -> Option<&str> {
        self.currency_exchange()?
            .get("exchangeRate")
            .and_then(Value::as_str)
    }

    /// The full original record, for verbatim archival.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("HTTP error ({0}): {1}")]
    Http(u16, String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        RawRecord(value)
    }

    #[test]
    fn test_raw_record_accessors() {
        let raw = record(json!({
            "transactionId": "tx-1",
            "bookingDateTime": "2024-01-01T10:00:00Z",
            "remittanceInformationUnstructured": "COFFEE SHOP",
            "transactionAmount": {"amount": "-3.20", "currency": "GBP"},
            "proprietaryBankTransactionCode": "CARD_PAYMENT",
            "currencyExchange": {
                "sourceCurrency": "USD",
                "instructedAmount": {"amount": "12.34"},
                "exchangeRate": "1.1"
            }
        }));

        assert_eq!(raw.transaction_id(), Some("tx-1"));
        assert_eq!(raw.booking_date_time(), Some("2024-01-01T10:00:00Z"));
        assert_eq!(raw.remittance_info(), Some("COFFEE SHOP"));
        assert_eq!(raw.amount(), Some("-3.20"));
        assert_eq!(raw.currency(), Some("GBP"));
        assert_eq!(raw.transaction_code(), Some("CARD_PAYMENT"));
        assert_eq!(raw.exchange_source_currency(), Some("USD"));
        assert_eq!(raw.exchange_source_amount(), Some("12.34"));
        assert_eq!(raw.exchange_rate(), Some("1.1"));
    }

    #[test]
    fn test_raw_record_missing_fields_are_none() {
        let raw = record(json!({"bookingDateTime": "2024-01-01T10:00:00Z"}));
        assert_eq!(raw.transaction_id(), None);
        assert_eq!(raw.amount(), None);
        assert_eq!(raw.exchange_rate(), None);
    }

    #[test]
    fn test_feed_deserializes_with_missing_lists() {
        let feed: RawFeed = serde_json::from_value(json!({"booked": []})).unwrap();
        assert!(feed.booked.is_empty());
        assert!(feed.pending.is_empty());
    }

    #[test]
    fn test_raw_record_preserves_key_order() {
        let text = r#"{"zeta":1,"alpha":{"b":2,"a":3},"transactionId":"t"}"#;
        let raw: RawRecord = serde_json::from_str(text).unwrap();
        assert_eq!(serde_json::to_string(raw.as_value()).unwrap(), text);
    }

    #[test]
    fn test_requisition_tolerates_extra_fields() {
        let requisition: Requisition = serde_json::from_value(json!({
            "id": "req-1",
            "status": "LN",
            "accounts": ["acc-1"],
            "link": "https://ob.example/start",
            "agreement": "agr-1",
            "created": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(requisition.id, "req-1");
        assert_eq!(requisition.status, "LN");
        assert_eq!(requisition.accounts, vec!["acc-1".to_string()]);
    }
}
