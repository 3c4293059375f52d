use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::api::nordigen::models::{RawFeed, RawRecord};
use crate::models::{Transaction, TransactionState};

/// A record that cannot be normalized aborts the whole feed for the current
/// cycle; there is no per-record skipping beyond the missing-id rule.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("transaction {id}: missing required field `{field}`")]
    MissingField { id: String, field: &'static str },

    #[error("transaction {id}: invalid booking timestamp `{value}`")]
    InvalidTimestamp {
        id: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("transaction {id}: invalid amount `{value}`")]
    InvalidAmount {
        id: String,
        value: String,
        #[source]
        source: rust_decimal::Error,
    },

    #[error("transaction {id}: invalid exchange rate `{value}`")]
    InvalidExchangeRate {
        id: String,
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
}

/// Convert a raw booked/pending feed into normalized transactions with
/// deterministic per-timestamp sequence numbers.
///
/// The provider returns each list newest-first and guarantees no ordering
/// among records sharing a timestamp. Each list is therefore walked in
/// reverse (oldest-first) and every run of identical booking timestamps is
/// numbered 1, 2, 3, ... so that repeated fetches assign the same tie-break
/// key to the same record. The pending list is processed first; the counter
/// and running timestamp start fresh for the booked pass. Records without a
/// `transactionId` are dropped and do not advance the numbering.
pub fn normalize_feed(account_id: i64, feed: &RawFeed) -> Result<Vec<Transaction>, NormalizeError> {
    let mut results = Vec::with_capacity(feed.pending.len() + feed.booked.len());

    for (records, state) in [
        (&feed.pending, TransactionState::Pending),
        (&feed.booked, TransactionState::Booked),
    ] {
        let mut current_booking_time: Option<DateTime<FixedOffset>> = None;
        let mut sequence_number = 1;

        for record in records.iter().rev() {
            let Some(id) = record.transaction_id() else {
                continue;
            };

            let booking_time = parse_booking_time(record, id)?;
            if Some(booking_time) == current_booking_time {
                sequence_number += 1;
            } else {
                sequence_number = 1;
            }
            current_booking_time = Some(booking_time);

            results.push(normalize_record(record, id, account_id, booking_time, sequence_number, state)?);
        }
    }

    Ok(results)
}

fn parse_booking_time(record: &RawRecord, id: &str) -> Result<DateTime<FixedOffset>, NormalizeError> {
    let raw = record
        .booking_date_time()
        .ok_or_else(|| NormalizeError::MissingField {
            id: id.to_string(),
            field: "bookingDateTime",
        })?;

    DateTime::parse_from_rfc3339(raw).map_err(|source| NormalizeError::InvalidTimestamp {
        id: id.to_string(),
        value: raw.to_string(),
        source,
    })
}

fn normalize_record(
    record: &RawRecord,
    id: &str,
    account_id: i64,
    booking_time: DateTime<FixedOffset>,
    sequence_number: i32,
    state: TransactionState,
) -> Result<Transaction, NormalizeError> {
    let amount_raw = record.amount().ok_or_else(|| NormalizeError::MissingField {
        id: id.to_string(),
        field: "transactionAmount.amount",
    })?;
    let amount = Decimal::from_str(amount_raw).map_err(|source| NormalizeError::InvalidAmount {
        id: id.to_string(),
        value: amount_raw.to_string(),
        source,
    })?;

    let currency = record
        .currency()
        .ok_or_else(|| NormalizeError::MissingField {
            id: id.to_string(),
            field: "transactionAmount.currency",
        })?
        .to_string();

    let remittance_info = record
        .remittance_info()
        .ok_or_else(|| NormalizeError::MissingField {
            id: id.to_string(),
            field: "remittanceInformationUnstructured",
        })?
        .to_string();

    // The currency-exchange sub-object is optional, and the provider has been
    // seen emitting empty strings inside it.
    let source_amount = match record.exchange_source_amount() {
        Some(raw) if !raw.is_empty() => {
            Some(
                Decimal::from_str(raw).map_err(|source| NormalizeError::InvalidAmount {
                    id: id.to_string(),
                    value: raw.to_string(),
                    source,
                })?,
            )
        }
        _ => None,
    };

    // Exchange rates are ratios, not money; f64 precision is acceptable here.
    let exchange_rate = match record.exchange_rate() {
        Some(raw) if !raw.is_empty() => {
            Some(
                raw.parse::<f64>()
                    .map_err(|source| NormalizeError::InvalidExchangeRate {
                        id: id.to_string(),
                        value: raw.to_string(),
                        source,
                    })?,
            )
        }
        _ => None,
    };

    Ok(Transaction {
        id: id.to_string(),
        account_id,
        booking_time,
        sequence_number,
        remittance_info,
        transaction_code: record.transaction_code().map(str::to_string),
        amount,
        currency,
        source_amount,
        source_currency: record.exchange_source_currency().map(str::to_string),
        exchange_rate,
        state,
        source_data: record.as_value().clone(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn record(id: Option<&str>, time: &str, amount: &str) -> RawRecord {
        let mut value = json!({
            "bookingDateTime": time,
            "remittanceInformationUnstructured": "TEST PAYMENT",
            "transactionAmount": {"amount": amount, "currency": "GBP"},
        });
        if let Some(id) = id {
            value["transactionId"] = Value::String(id.to_string());
        }
        RawRecord(value)
    }

    fn feed(pending: Vec<RawRecord>, booked: Vec<RawRecord>) -> RawFeed {
        RawFeed { booked, pending }
    }

    #[test]
    fn test_empty_feed_yields_nothing() {
        let transactions = normalize_feed(1, &feed(vec![], vec![])).unwrap();
        assert!(transactions.is_empty());
    }

    #[test]
    fn test_reversed_order_assigns_sequence_numbers_oldest_first() {
        // Newest-first provider order: b2 then b1, same instant.
        let raw = feed(
            vec![],
            vec![
                record(Some("b2"), "2024-01-01T10:00:00Z", "5.00"),
                record(Some("b1"), "2024-01-01T10:00:00Z", "3.00"),
            ],
        );

        let transactions = normalize_feed(1, &raw).unwrap();
        assert_eq!(transactions.len(), 2);

        assert_eq!(transactions[0].id, "b1");
        assert_eq!(transactions[0].sequence_number, 1);
        assert_eq!(transactions[1].id, "b2");
        assert_eq!(transactions[1].sequence_number, 2);
        assert!(transactions
            .iter()
            .all(|t| t.state == TransactionState::Booked));
    }

    #[test]
    fn test_sequence_resets_when_timestamp_changes() {
        let raw = feed(
            vec![],
            vec![
                record(Some("b4"), "2024-01-02T09:00:00Z", "4.00"),
                record(Some("b3"), "2024-01-01T10:00:00Z", "3.00"),
                record(Some("b2"), "2024-01-01T10:00:00Z", "2.00"),
                record(Some("b1"), "2024-01-01T08:30:00Z", "1.00"),
            ],
        );

        let transactions = normalize_feed(1, &raw).unwrap();
        let numbered: Vec<(&str, i32)> = transactions
            .iter()
            .map(|t| (t.id.as_str(), t.sequence_number))
            .collect();
        assert_eq!(
            numbered,
            vec![("b1", 1), ("b2", 1), ("b3", 2), ("b4", 1)]
        );
    }

    #[test]
    fn test_pending_pass_runs_first_and_passes_are_independent() {
        // The pending pass ends mid-run at the same instant the booked pass
        // begins with; booked numbering must still start at 1.
        let raw = feed(
            vec![
                record(Some("p2"), "2024-01-01T10:00:00Z", "2.00"),
                record(Some("p1"), "2024-01-01T10:00:00Z", "1.00"),
            ],
            vec![record(Some("b1"), "2024-01-01T10:00:00Z", "3.00")],
        );

        let transactions = normalize_feed(1, &raw).unwrap();
        assert_eq!(transactions.len(), 3);

        assert_eq!(transactions[0].id, "p1");
        assert_eq!(transactions[0].state, TransactionState::Pending);
        assert_eq!(transactions[0].sequence_number, 1);
        assert_eq!(transactions[1].id, "p2");
        assert_eq!(transactions[1].sequence_number, 2);

        assert_eq!(transactions[2].id, "b1");
        assert_eq!(transactions[2].state, TransactionState::Booked);
        assert_eq!(transactions[2].sequence_number, 1);
    }

    #[test]
    fn test_records_without_id_are_dropped_and_do_not_affect_numbering() {
        let raw = feed(
            vec![],
            vec![
                record(Some("b2"), "2024-01-01T10:00:00Z", "3.00"),
                record(None, "2024-01-01T10:00:00Z", "2.00"),
                record(Some("b1"), "2024-01-01T10:00:00Z", "1.00"),
            ],
        );

        let transactions = normalize_feed(1, &raw).unwrap();
        let numbered: Vec<(&str, i32)> = transactions
            .iter()
            .map(|t| (t.id.as_str(), t.sequence_number))
            .collect();
        assert_eq!(numbered, vec![("b1", 1), ("b2", 2)]);
    }

    #[test]
    fn test_amounts_are_exact_decimals() {
        let raw = feed(vec![], vec![record(Some("b1"), "2024-01-01T10:00:00Z", "10.10")]);
        let transactions = normalize_feed(1, &raw).unwrap();
        assert_eq!(transactions[0].amount, Decimal::from_str("10.10").unwrap());
        assert_eq!(transactions[0].amount.to_string(), "10.10");
        assert_eq!(transactions[0].currency, "GBP");
    }

    #[test]
    fn test_currency_exchange_fields_are_extracted() {
        let raw = RawRecord(json!({
            "transactionId": "fx1",
            "bookingDateTime": "2024-01-01T10:00:00Z",
            "remittanceInformationUnstructured": "FOREIGN PAYMENT",
            "transactionAmount": {"amount": "11.22", "currency": "GBP"},
            "currencyExchange": {
                "sourceCurrency": "USD",
                "instructedAmount": {"amount": "12.34"},
                "exchangeRate": "1.1"
            }
        }));

        let transactions = normalize_feed(1, &feed(vec![], vec![raw])).unwrap();
        let t = &transactions[0];
        assert_eq!(t.source_currency.as_deref(), Some("USD"));
        assert_eq!(t.source_amount, Some(Decimal::from_str("12.34").unwrap()));
        assert!((t.exchange_rate.unwrap() - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_empty_exchange_fields_are_treated_as_absent() {
        let raw = RawRecord(json!({
            "transactionId": "fx2",
            "bookingDateTime": "2024-01-01T10:00:00Z",
            "remittanceInformationUnstructured": "PAYMENT",
            "transactionAmount": {"amount": "1.00", "currency": "GBP"},
            "currencyExchange": {
                "sourceCurrency": "USD",
                "instructedAmount": {"amount": ""},
                "exchangeRate": ""
            }
        }));

        let transactions = normalize_feed(1, &feed(vec![], vec![raw])).unwrap();
        assert_eq!(transactions[0].source_amount, None);
        assert_eq!(transactions[0].exchange_rate, None);
        assert_eq!(transactions[0].source_currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_source_data_is_the_verbatim_raw_record() {
        let raw = RawRecord(json!({
            "transactionId": "b1",
            "bookingDateTime": "2024-01-01T10:00:00Z",
            "remittanceInformationUnstructured": "PAYMENT",
            "transactionAmount": {"amount": "1.00", "currency": "GBP"},
            "proprietaryBankTransactionCode": "TRANSFER",
            "someUnknownProviderField": {"nested": [1, 2, 3]}
        }));

        let transactions = normalize_feed(1, &feed(vec![], vec![raw.clone()])).unwrap();
        assert_eq!(transactions[0].source_data, raw.0);
        assert_eq!(transactions[0].transaction_code.as_deref(), Some("TRANSFER"));
    }

    #[test]
    fn test_malformed_amount_is_fatal() {
        let raw = feed(vec![], vec![record(Some("b1"), "2024-01-01T10:00:00Z", "ten")]);
        assert!(matches!(
            normalize_feed(1, &raw),
            Err(NormalizeError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_malformed_timestamp_is_fatal() {
        let raw = feed(
            vec![],
            vec![record(Some("b1"), "yesterday at noon", "1.00")],
        );
        assert!(matches!(
            normalize_feed(1, &raw),
            Err(NormalizeError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_missing_remittance_info_is_fatal() {
        let raw = RawRecord(json!({
            "transactionId": "b1",
            "bookingDateTime": "2024-01-01T10:00:00Z",
            "transactionAmount": {"amount": "1.00", "currency": "GBP"},
        }));
        assert!(matches!(
            normalize_feed(1, &feed(vec![], vec![raw])),
            Err(NormalizeError::MissingField {
                field: "remittanceInformationUnstructured",
                ..
            })
        ));
    }

    #[test]
    fn test_offset_aware_timestamps_compare_by_instant() {
        // Same instant written with two different offsets still forms one run.
        let raw = feed(
            vec![],
            vec![
                record(Some("b2"), "2024-01-01T11:00:00+01:00", "2.00"),
                record(Some("b1"), "2024-01-01T10:00:00Z", "1.00"),
            ],
        );

        let transactions = normalize_feed(1, &raw).unwrap();
        assert_eq!(transactions[0].sequence_number, 1);
        assert_eq!(transactions[1].sequence_number, 2);
    }
}
