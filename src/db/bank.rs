use std::collections::HashMap;

use sqlx::postgres::PgPool;
use tracing::debug;

use crate::models::{Bank, ProviderType};

type BankRow = (i64, String, String, String, Option<String>, bool);

const BANK_COLUMNS: &str =
    "id, name, external_id, provider_type, active_requisition_id, activation_email_sent";

fn bank_from_row(row: BankRow) -> Result<Bank, sqlx::Error> {
    let (id, name, external_id, provider_type, active_requisition_id, activation_email_sent) = row;
    let provider_type = provider_type
        .parse::<ProviderType>()
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

    Ok(Bank {
        id,
        name,
        external_id,
        provider_type,
        active_requisition_id,
        activation_email_sent,
    })
}

/// Get every bank known to the archive.
pub async fn get_banks(pool: &PgPool) -> Result<Vec<Bank>, sqlx::Error> {
    debug!("Retrieving all banks");
    let rows = sqlx::query_as::<_, BankRow>(&format!("SELECT {BANK_COLUMNS} FROM banks"))
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(bank_from_row).collect()
}

/// Get a bank by its display name.
pub async fn get_bank_by_name(pool: &PgPool, name: &str) -> Result<Option<Bank>, sqlx::Error> {
    debug!("Retrieving bank '{}'", name);
    let row = sqlx::query_as::<_, BankRow>(&format!(
        "SELECT {BANK_COLUMNS} FROM banks WHERE name = $1"
    ))
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.map(bank_from_row).transpose()
}

/// Get banks by internal id, keyed by id.
pub async fn get_banks_by_ids(
    pool: &PgPool,
    ids: &[i64],
) -> Result<HashMap<i64, Bank>, sqlx::Error> {
    debug!("Retrieving banks by IDs: {:?}", ids);
    let rows = sqlx::query_as::<_, BankRow>(&format!(
        "SELECT {BANK_COLUMNS} FROM banks WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| bank_from_row(row).map(|bank| (bank.id, bank)))
        .collect()
}

/// Upsert a batch of banks keyed by provider-external id, all-or-nothing.
pub async fn upsert_banks(pool: &PgPool, banks: &[Bank]) -> Result<(), sqlx::Error> {
    debug!("Upserting {} banks", banks.len());
    let mut tx = pool.begin().await?;
    for bank in banks {
        sqlx::query(
            "INSERT INTO banks (name, external_id, provider_type)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (external_id) DO UPDATE
                 SET name = $1, provider_type = $3",
        )
        .bind(&bank.name)
        .bind(&bank.external_id)
        .bind(bank.provider_type.as_str())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

/// Overwrite every mutable field of an existing bank row.
pub async fn update_bank(pool: &PgPool, bank: &Bank) -> Result<(), sqlx::Error> {
    debug!("Updating bank '{}'", bank.name);
    sqlx::query(
        "UPDATE banks
             SET name = $1, external_id = $2, provider_type = $3,
                 active_requisition_id = $4, activation_email_sent = $5
             WHERE id = $6",
    )
    .bind(&bank.name)
    .bind(&bank.external_id)
    .bind(bank.provider_type.as_str())
    .bind(&bank.active_requisition_id)
    .bind(bank.activation_email_sent)
    .bind(bank.id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Flip the reminder-sent flag for one bank.
pub async fn set_activation_email_sent(
    pool: &PgPool,
    bank_id: i64,
    activation_email_sent: bool,
) -> Result<(), sqlx::Error> {
    debug!("Updating bank ID {}'s activation_email_sent", bank_id);
    sqlx::query("UPDATE banks SET activation_email_sent = $1 WHERE id = $2")
        .bind(activation_email_sent)
        .bind(bank_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Clear a requisition id that the provider no longer knows about.
pub async fn clear_requisition_id(pool: &PgPool, requisition_id: &str) -> Result<(), sqlx::Error> {
    debug!("Clearing requisition ID '{}'", requisition_id);
    sqlx::query("UPDATE banks SET active_requisition_id = NULL WHERE active_requisition_id = $1")
        .bind(requisition_id)
        .execute(pool)
        .await?;

    Ok(())
}
