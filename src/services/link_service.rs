use std::collections::HashSet;

use sqlx::postgres::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::api::nordigen::{ApiError, NordigenClient, Requisition, STATUS_LINKED};
use crate::db;
use crate::error::Error;

const REDIRECT_URI: &str = "https://www.google.com";
const MAX_HISTORICAL_DAYS: u32 = 730;
const ACCESS_VALID_FOR_DAYS: u32 = 90;

/// Look up a bank's tracked requisition. A deleted requisition comes back as
/// HTTP 404 and is reported as `None`; any other provider error propagates.
async fn find_requisition(
    client: &NordigenClient,
    requisition_id: Option<&str>,
) -> Result<Option<Requisition>, ApiError> {
    let Some(id) = requisition_id.filter(|id| !id.is_empty()) else {
        return Ok(None);
    };

    match client.requisition(id).await {
        Ok(requisition) => Ok(Some(requisition)),
        Err(ApiError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Start (or report) the authorization session for a bank.
pub async fn link(
    client: &mut NordigenClient,
    pool: &PgPool,
    bank_name: &str,
) -> Result<(), Error> {
    let Some(mut bank) = db::bank::get_bank_by_name(pool, bank_name).await? else {
        error!("Unable to find bank with name '{}'", bank_name);
        return Ok(());
    };

    client.refresh_token().await?;

    match find_requisition(client, bank.active_requisition_id.as_deref()).await? {
        Some(requisition) if requisition.status == STATUS_LINKED => {
            info!(
                "Link with {} already active. Link: {}",
                bank_name, requisition.link
            );
        }
        Some(_) => {
            info!(
                "Link with {} exists but is not active. Unlink it first using `unlink '{}'`",
                bank_name, bank_name
            );
        }
        None => {
            let requisition = client
                .initialize_session(
                    &bank.external_id,
                    REDIRECT_URI,
                    &Uuid::new_v4().to_string(),
                    MAX_HISTORICAL_DAYS,
                    ACCESS_VALID_FOR_DAYS,
                )
                .await?;
            bank.active_requisition_id = Some(requisition.id);
            db::bank::update_bank(pool, &bank).await?;
            info!("Link: {}", requisition.link);
        }
    }

    Ok(())
}

/// Stop tracking a bank's requisition.
pub async fn unlink(
    client: &mut NordigenClient,
    pool: &PgPool,
    bank_name: &str,
) -> Result<(), Error> {
    let Some(mut bank) = db::bank::get_bank_by_name(pool, bank_name).await? else {
        error!("Unable to find bank with name '{}'", bank_name);
        return Ok(());
    };

    client.refresh_token().await?;

    if find_requisition(client, bank.active_requisition_id.as_deref())
        .await?
        .is_some()
    {
        bank.active_requisition_id = None;
        db::bank::update_bank(pool, &bank).await?;
        info!("Link with {} exists and has been removed.", bank_name);
    } else {
        info!("No link currently exists with {}", bank_name);
    }

    Ok(())
}

/// Report whether a bank's link is active.
pub async fn status(
    client: &mut NordigenClient,
    pool: &PgPool,
    bank_name: &str,
) -> Result<(), Error> {
    let Some(bank) = db::bank::get_bank_by_name(pool, bank_name).await? else {
        error!("Unable to find bank with name '{}'", bank_name);
        return Ok(());
    };

    let requisition = if bank.has_active_requisition() {
        client.refresh_token().await?;
        find_requisition(client, bank.active_requisition_id.as_deref()).await?
    } else {
        None
    };

    match requisition {
        Some(requisition) if requisition.status == STATUS_LINKED => {
            info!("Link with {}: ACTIVE", bank_name);
        }
        Some(requisition) => {
            info!("Link with {}: {}", bank_name, requisition.status);
        }
        None => {
            info!("Link with {}: INACTIVE", bank_name);
        }
    }

    Ok(())
}

/// Delete provider-side requisitions that are inactive or untracked, and
/// clear tracked ids the provider no longer knows about.
pub async fn prune(client: &mut NordigenClient, pool: &PgPool) -> Result<(), Error> {
    let requisition_ids_db: HashSet<String> = db::bank::get_banks(pool)
        .await?
        .into_iter()
        .filter_map(|bank| bank.active_requisition_id)
        .filter(|id| !id.is_empty())
        .collect();

    client.refresh_token().await?;
    let requisitions = client.requisitions().await?;
    let requisition_ids_api: HashSet<String> = requisitions
        .results
        .iter()
        .map(|requisition| requisition.id.clone())
        .collect();

    for requisition in &requisitions.results {
        if requisition.status != STATUS_LINKED || !requisition_ids_db.contains(&requisition.id) {
            info!("Deleting requisition ID {}", requisition.id);
            client.delete_requisition(&requisition.id).await?;
        }
    }

    for orphan_id in requisition_ids_db.difference(&requisition_ids_api) {
        db::bank::clear_requisition_id(pool, orphan_id).await?;
    }

    Ok(())
}
