use sqlx::postgres::PgPool;
use tracing::debug;

use crate::models::Account;

type AccountRow = (i64, i64, String, String);

fn account_from_row(row: AccountRow) -> Account {
    let (id, bank_id, name, external_id) = row;
    Account {
        id,
        bank_id,
        name,
        external_id,
    }
}

/// Get every account known to the archive.
pub async fn get_accounts(pool: &PgPool) -> Result<Vec<Account>, sqlx::Error> {
    debug!("Retrieving all accounts");
    let rows = sqlx::query_as::<_, AccountRow>("SELECT id, bank_id, name, external_id FROM accounts")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(account_from_row).collect())
}

/// Upsert an account keyed by `(bank_id, external_id)`, returning the stored
/// row so callers can link transactions to its internal id.
pub async fn upsert_account(pool: &PgPool, account: &Account) -> Result<Account, sqlx::Error> {
    debug!("Upserting account with external ID: {}", account.external_id);
    let row = sqlx::query_as::<_, AccountRow>(
        "INSERT INTO accounts (bank_id, external_id, name)
             VALUES ($1, $2, $3)
             ON CONFLICT (bank_id, external_id) DO UPDATE SET name = $3
             RETURNING id, bank_id, name, external_id",
    )
    .bind(account.bank_id)
    .bind(&account.external_id)
    .bind(&account.name)
    .fetch_one(pool)
    .await?;

    Ok(account_from_row(row))
}
