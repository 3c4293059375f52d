use sqlx::postgres::PgPool;

use crate::db;
use crate::error::Error;
use crate::utils::table::Table;

/// Print every stored bank, sorted by name.
pub async fn banks(pool: &PgPool) -> Result<(), Error> {
    let mut banks = db::bank::get_banks(pool).await?;
    banks.sort_by(|a, b| a.name.cmp(&b.name));

    let mut table = Table::new(vec![
        "ID",
        "Name",
        "External ID",
        "Active Requisition ID",
        "Provider Type",
    ]);
    for bank in &banks {
        table.add_row(vec![
            bank.id.to_string(),
            bank.name.clone(),
            bank.external_id.clone(),
            bank.active_requisition_id.clone().unwrap_or_default(),
            bank.provider_type.to_string(),
        ]);
    }

    print!("{}", table.render());
    Ok(())
}

/// Print every stored account with its bank's name, sorted by id.
pub async fn accounts(pool: &PgPool) -> Result<(), Error> {
    let mut accounts = db::account::get_accounts(pool).await?;
    accounts.sort_by_key(|account| account.id);

    let bank_ids: Vec<i64> = accounts.iter().map(|account| account.bank_id).collect();
    let banks = db::bank::get_banks_by_ids(pool, &bank_ids).await?;

    let mut table = Table::new(vec!["ID", "Name", "External ID", "Bank Name"]);
    for account in &accounts {
        let bank_name = banks
            .get(&account.bank_id)
            .map(|bank| bank.name.clone())
            .unwrap_or_else(|| "Not Found".to_string());
        table.add_row(vec![
            account.id.to_string(),
            account.name.clone(),
            account.external_id.clone(),
            bank_name,
        ]);
    }

    print!("{}", table.render());
    Ok(())
}
