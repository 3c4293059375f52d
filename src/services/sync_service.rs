use std::time::Duration;

use sqlx::postgres::PgPool;
use tracing::{debug, error, info};

use crate::api::nordigen::{NordigenClient, STATUS_LINKED};
use crate::db;
use crate::error::Error;
use crate::models::{Account, Bank, ProviderType};
use crate::services::email_service::Mailer;
use crate::services::normalizer;

/// What the orchestrator does with a bank's reminder flag for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAction {
    /// The link is active: re-arm the flag so a future deactivation triggers
    /// a fresh reminder, then sync the bank's accounts.
    ClearFlag,
    /// First cycle of a deactivation episode: send one reminder, set the
    /// flag, skip this bank.
    SendReminder,
    /// Still deactivated and already reminded: skip quietly.
    Skip,
}

pub fn reminder_action(status: &str, activation_email_sent: bool) -> ReminderAction {
    if status == STATUS_LINKED {
        ReminderAction::ClearFlag
    } else if !activation_email_sent {
        ReminderAction::SendReminder
    } else {
        ReminderAction::Skip
    }
}

/// Pull the provider's institution list and upsert every bank.
pub async fn sync_banks(client: &mut NordigenClient, pool: &PgPool) -> Result<(), Error> {
    debug!("Retrieving list of banks from the provider");
    client.refresh_token().await?;

    let banks: Vec<Bank> = client
        .institutions()
        .await?
        .into_iter()
        .map(|institution| Bank {
            id: 0,
            name: institution.name,
            external_id: institution.id,
            provider_type: ProviderType::OpenBanking,
            active_requisition_id: None,
            activation_email_sent: false,
        })
        .collect();

    debug!("Retrieved {} banks from the provider", banks.len());
    db::bank::upsert_banks(pool, &banks).await?;
    info!("Synced {} banks to the database", banks.len());
    Ok(())
}

/// Upsert the accounts of every bank whose link is currently active.
pub async fn sync_accounts(client: &mut NordigenClient, pool: &PgPool) -> Result<(), Error> {
    let banks: Vec<Bank> = db::bank::get_banks(pool)
        .await?
        .into_iter()
        .filter(Bank::has_active_requisition)
        .collect();
    client.refresh_token().await?;

    let mut count = 0;
    for bank in &banks {
        let requisition_id = bank.active_requisition_id.as_deref().unwrap_or_default();
        let requisition = client.requisition(requisition_id).await?;
        if requisition.status != STATUS_LINKED {
            continue;
        }

        for account_id in &requisition.accounts {
            count += 1;
            let details = client.account_details(account_id).await?;
            db::account::upsert_account(
                pool,
                &Account {
                    id: 0,
                    bank_id: bank.id,
                    name: details.details,
                    external_id: details.resource_id,
                },
            )
            .await?;
        }
    }

    info!("Synced {} accounts to the database", count);
    Ok(())
}

/// One full archival cycle per iteration: for every linked bank, check the
/// requisition, remind on deactivation, otherwise fetch, normalize and store
/// each account's feed. `poll_interval == 0` runs a single cycle.
pub async fn sync_transactions(
    client: &mut NordigenClient,
    pool: &PgPool,
    mailer: &Mailer,
    user_email: &str,
    poll_interval: u64,
) -> Result<(), Error> {
    loop {
        client.refresh_token().await?;
        let banks: Vec<Bank> = db::bank::get_banks(pool)
            .await?
            .into_iter()
            .filter(Bank::has_active_requisition)
            .collect();

        for bank in &banks {
            let requisition_id = bank.active_requisition_id.as_deref().unwrap_or_default();
            let requisition = client.requisition(requisition_id).await?;

            match reminder_action(&requisition.status, bank.activation_email_sent) {
                ReminderAction::ClearFlag => {
                    db::bank::set_activation_email_sent(pool, bank.id, false).await?;
                }
                ReminderAction::SendReminder => {
                    mailer.send_link(user_email, bank, &requisition.link)?;
                    // Remember the send so the next cycle with the same
                    // inactive status stays quiet.
                    db::bank::set_activation_email_sent(pool, bank.id, true).await?;
                    continue;
                }
                ReminderAction::Skip => continue,
            }

            for account_id in &requisition.accounts {
                if let Err(err) = sync_account(client, pool, bank, account_id).await {
                    // Provider errors abort the command; a malformed feed or a
                    // failed batch only costs this account's current cycle.
                    if matches!(err, Error::Api(_)) {
                        return Err(err);
                    }
                    error!(
                        account = %account_id,
                        bank = %bank.name,
                        error = %err,
                        "Skipping account for this cycle"
                    );
                }
            }
        }

        if poll_interval > 0 {
            debug!("Sleeping for {} seconds", poll_interval);
            tokio::time::sleep(Duration::from_secs(poll_interval)).await;
        } else {
            return Ok(());
        }
    }
}

async fn sync_account(
    client: &NordigenClient,
    pool: &PgPool,
    bank: &Bank,
    account_id: &str,
) -> Result<(), Error> {
    let details = client.account_details(account_id).await?;
    let account = db::account::upsert_account(
        pool,
        &Account {
            id: 0,
            bank_id: bank.id,
            name: details.details,
            external_id: details.resource_id,
        },
    )
    .await?;

    debug!("Requesting transactions for account ID {}", account_id);
    let feed = client.account_transactions(account_id).await?;
    let transactions = normalizer::normalize_feed(account.id, &feed)?;
    db::transaction::upsert_transactions(pool, &transactions).await?;

    info!(
        "Synced {} transactions of {} account at {} to the database",
        transactions.len(),
        account.name,
        bank.name
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_link_rearms_the_reminder() {
        assert_eq!(reminder_action("LN", false), ReminderAction::ClearFlag);
        assert_eq!(reminder_action("LN", true), ReminderAction::ClearFlag);
    }

    #[test]
    fn test_first_inactive_cycle_sends_one_reminder() {
        assert_eq!(reminder_action("EX", false), ReminderAction::SendReminder);
        assert_eq!(reminder_action("SU", false), ReminderAction::SendReminder);
    }

    #[test]
    fn test_repeated_inactive_cycles_stay_quiet() {
        assert_eq!(reminder_action("EX", true), ReminderAction::Skip);
    }

    #[test]
    fn test_deactivation_episode_lifecycle() {
        // Active, then deactivated for two cycles, then re-activated: exactly
        // one reminder per episode.
        let mut sent = false;
        assert_eq!(reminder_action("LN", sent), ReminderAction::ClearFlag);

        assert_eq!(reminder_action("EX", sent), ReminderAction::SendReminder);
        sent = true;
        assert_eq!(reminder_action("EX", sent), ReminderAction::Skip);

        assert_eq!(reminder_action("LN", sent), ReminderAction::ClearFlag);
        sent = false;
        assert_eq!(reminder_action("EX", sent), ReminderAction::SendReminder);
    }
}
