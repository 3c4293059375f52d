use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::PgPool;
use tracing::{debug, error};

use crate::models::{Transaction, TransactionState};

/// Upsert a batch of transactions keyed by the provider-assigned id.
///
/// All-or-nothing: any individual failure rolls the whole batch back and the
/// error is re-raised after being logged.
pub async fn upsert_transactions(
    pool: &PgPool,
    transactions: &[Transaction],
) -> Result<(), sqlx::Error> {
    debug!("Upserting {} transactions", transactions.len());
    let mut tx = pool.begin().await?;

    for transaction in transactions {
        let result = sqlx::query(
            "INSERT INTO transactions (id, account_id, booking_time, sequence_number,
                     remittance_info, transaction_code, currency, source_currency,
                     source_amount, amount, exchange_rate, source_data, state)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                 ON CONFLICT (id) DO UPDATE SET
                     account_id = $2,
                     booking_time = $3,
                     sequence_number = $4,
                     remittance_info = $5,
                     transaction_code = $6,
                     currency = $7,
                     source_currency = $8,
                     source_amount = $9,
                     amount = $10,
                     exchange_rate = $11,
                     source_data = $12,
                     state = $13",
        )
        .bind(&transaction.id)
        .bind(transaction.account_id)
        .bind(transaction.booking_time)
        .bind(transaction.sequence_number)
        .bind(&transaction.remittance_info)
        .bind(&transaction.transaction_code)
        .bind(&transaction.currency)
        .bind(&transaction.source_currency)
        .bind(transaction.source_amount)
        .bind(transaction.amount)
        .bind(transaction.exchange_rate)
        .bind(&transaction.source_data)
        .bind(transaction.state.as_str())
        .execute(&mut *tx)
        .await;

        if let Err(err) = result {
            error!(
                transaction_id = %transaction.id,
                error = %err,
                "An error occurred while inserting transactions into the database"
            );
            tx.rollback().await.ok();
            return Err(err);
        }
    }

    tx.commit().await
}

type TransactionRow = (
    String,
    i64,
    DateTime<FixedOffset>,
    i32,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<Decimal>,
    Decimal,
    Option<f64>,
    Value,
    String,
);

/// Fetch one transaction by its provider id.
pub async fn get_transaction(
    pool: &PgPool,
    id: &str,
) -> Result<Option<Transaction>, sqlx::Error> {
    debug!("Retrieving transaction '{}'", id);
    let row = sqlx::query_as::<_, TransactionRow>(
        "SELECT id, account_id, booking_time, sequence_number, remittance_info,
                transaction_code, currency, source_currency, source_amount, amount,
                exchange_rate, source_data, state
             FROM transactions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(transaction_from_row).transpose()
}

fn transaction_from_row(row: TransactionRow) -> Result<Transaction, sqlx::Error> {
    let (
        id,
        account_id,
        booking_time,
        sequence_number,
        remittance_info,
        transaction_code,
        currency,
        source_currency,
        source_amount,
        amount,
        exchange_rate,
        source_data,
        state,
    ) = row;

    let state = state
        .parse::<TransactionState>()
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

    Ok(Transaction {
        id,
        account_id,
        booking_time,
        sequence_number,
        remittance_info,
        transaction_code,
        amount,
        currency,
        source_amount,
        source_currency,
        exchange_rate,
        state,
        source_data,
    })
}
