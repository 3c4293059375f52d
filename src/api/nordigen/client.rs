use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::models::{
    AccessToken, AccountDetails, AccountDetailsResponse, ApiError, EndUserAgreement, Institution,
    RawFeed, Requisition, RequisitionList, TokenPair, TransactionsResponse,
};

/// Margin subtracted from the provider-declared expiry windows so a token is
/// never used right at its deadline.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Cached access/refresh token pair, refreshed just-in-time before each cycle.
#[derive(Debug, Clone)]
struct TokenCache {
    access: String,
    access_expires: i64,
    refresh: String,
    refresh_expires: i64,
    generated_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshAction {
    Keep,
    Exchange,
    Regenerate,
}

fn plan_refresh(elapsed: Duration, access_expires: i64, refresh_expires: i64) -> RefreshAction {
    let elapsed_secs = elapsed.as_secs().min(i64::MAX as u64) as i64;
    if elapsed_secs <= access_expires - EXPIRY_MARGIN_SECS {
        RefreshAction::Keep
    } else if elapsed_secs > refresh_expires - EXPIRY_MARGIN_SECS {
        RefreshAction::Regenerate
    } else {
        RefreshAction::Exchange
    }
}

/// Client for the Nordigen/GoCardless bank account data API.
pub struct NordigenClient {
    http: reqwest::Client,
    base_url: String,
    secret_id: String,
    secret_key: String,
    token: Option<TokenCache>,
}

impl NordigenClient {
    const DEFAULT_BASE_URL: &'static str = "https://ob.nordigen.com/api/v2";

    pub fn new(secret_id: String, secret_key: String) -> Self {
        Self::with_base_url(secret_id, secret_key, Self::DEFAULT_BASE_URL.to_string())
    }

    /// Create a client against a custom base URL (for testing).
    pub fn with_base_url(secret_id: String, secret_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            secret_id,
            secret_key,
            token: None,
        }
    }

    /// Ensure a usable access token exists, exchanging or regenerating as the
    /// expiry windows dictate. Called once before each sync cycle.
    pub async fn refresh_token(&mut self) -> Result<(), ApiError> {
        let action = match &self.token {
            None => RefreshAction::Regenerate,
            Some(token) => plan_refresh(
                token.generated_at.elapsed(),
                token.access_expires,
                token.refresh_expires,
            ),
        };

        match action {
            RefreshAction::Keep => debug!("Access token still valid"),
            RefreshAction::Exchange => {
                self.exchange_token().await?;
                debug!("Exchanged token using the refresh token");
            }
            RefreshAction::Regenerate => {
                self.generate_token().await?;
                debug!("Refresh token expired. Generated completely new token");
            }
        }

        Ok(())
    }

    async fn generate_token(&mut self) -> Result<(), ApiError> {
        let pair: TokenPair = self
            .post(
                "/token/new/",
                &json!({
                    "secret_id": self.secret_id,
                    "secret_key": self.secret_key,
                }),
            )
            .await?;

        self.token = Some(TokenCache {
            access: pair.access,
            access_expires: pair.access_expires,
            refresh: pair.refresh,
            refresh_expires: pair.refresh_expires,
            generated_at: Instant::now(),
        });

        Ok(())
    }

    async fn exchange_token(&mut self) -> Result<(), ApiError> {
        let refresh = self
            .token
            .as_ref()
            .map(|token| token.refresh.clone())
            .unwrap_or_default();

        let renewed: AccessToken = self.post("/token/refresh/", &json!({ "refresh": refresh })).await?;

        if let Some(token) = &mut self.token {
            token.access = renewed.access;
            token.access_expires = renewed.access_expires;
            token.generated_at = Instant::now();
        }

        Ok(())
    }

    fn access_token(&self) -> &str {
        self.token
            .as_ref()
            .map(|token| token.access.as_str())
            .unwrap_or("")
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(self.access_token())
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(self.access_token())
            .json(body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::error_for(status, response).await);
        }
        Ok(response.json::<T>().await?)
    }

    /// Map an error response onto an [`ApiError`] variant by status code. The
    /// provider wraps messages in `{summary, detail}`; fall back to the raw
    /// body when that shape is absent.
    async fn error_for(status: reqwest::StatusCode, response: reqwest::Response) -> ApiError {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("detail")
                    .or_else(|| value.get("summary"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);

        match status.as_u16() {
            400 => ApiError::BadRequest(message),
            401 | 403 => ApiError::Unauthorized(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited(message),
            500..=599 => ApiError::ServerError(status.as_u16(), message),
            other => ApiError::Http(other, message),
        }
    }

    /// GET /institutions/ — every institution the provider integrates.
    pub async fn institutions(&self) -> Result<Vec<Institution>, ApiError> {
        self.get("/institutions/").await
    }

    /// GET /requisitions/{id}/
    pub async fn requisition(&self, requisition_id: &str) -> Result<Requisition, ApiError> {
        self.get(&format!("/requisitions/{requisition_id}/")).await
    }

    /// GET /requisitions/
    pub async fn requisitions(&self) -> Result<RequisitionList, ApiError> {
        self.get("/requisitions/").await
    }

    /// DELETE /requisitions/{id}/
    pub async fn delete_requisition(&self, requisition_id: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(format!("{}/requisitions/{requisition_id}/", self.base_url))
            .bearer_auth(self.access_token())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error_for(status, response).await);
        }
        Ok(())
    }

    /// Create an end-user agreement and a requisition on top of it, returning
    /// the requisition whose `link` the end user must visit to authorize.
    pub async fn initialize_session(
        &self,
        institution_id: &str,
        redirect_uri: &str,
        reference_id: &str,
        max_historical_days: u32,
        access_valid_for_days: u32,
    ) -> Result<Requisition, ApiError> {
        let agreement: EndUserAgreement = self
            .post(
                "/agreements/enduser/",
                &json!({
                    "institution_id": institution_id,
                    "max_historical_days": max_historical_days,
                    "access_valid_for_days": access_valid_for_days,
                }),
            )
            .await?;

        self.post(
            "/requisitions/",
            &json!({
                "redirect": redirect_uri,
                "institution_id": institution_id,
                "reference": reference_id,
                "agreement": agreement.id,
            }),
        )
        .await
    }

    /// GET /accounts/{id}/details/
    pub async fn account_details(&self, account_id: &str) -> Result<AccountDetails, ApiError> {
        let response: AccountDetailsResponse =
            self.get(&format!("/accounts/{account_id}/details/")).await?;
        Ok(response.account)
    }

    /// GET /accounts/{id}/transactions/ — the raw booked/pending feed.
    pub async fn account_transactions(&self, account_id: &str) -> Result<RawFeed, ApiError> {
        let response: TransactionsResponse = self
            .get(&format!("/accounts/{account_id}/transactions/"))
            .await?;
        Ok(response.transactions)
    }
}
