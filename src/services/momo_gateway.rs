// services/momo_gateway.rs
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const REFERENCE_ID_HEADER: &str = "X-Reference-Id";
const TARGET_ENVIRONMENT_HEADER: &str = "X-Target-Environment";

#[derive(Debug, Deserialize)]
struct ApiKeyResponse {
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireParty {
    pub party_id_type: String,
    pub party_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestToPayPayload {
    pub amount: String,
    pub currency: String,
    pub external_id: String,
    pub payer: WireParty,
    pub payer_message: String,
    pub payee_note: String,
}

/// Provider's view of a submitted request-to-pay, returned by the status
/// endpoint and pushed through the webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financial_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<WireParty>,
    // The provider sends either a bare string or a {code, message} object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<serde_json::Value>,
}

/// The five outbound calls to the provider's collection API. A trait so the
/// orchestrator can be exercised against a stub gateway.
#[async_trait]
pub trait CollectionsApi: Send + Sync {
    async fn create_api_user(&self, candidate_id: &str, subscription_key: &str) -> Result<()>;
    async fn create_api_key(&self, api_user_id: &str, subscription_key: &str) -> Result<String>;
    async fn fetch_access_token(
        &self,
        api_user_id: &str,
        api_key: &str,
        subscription_key: &str,
    ) -> Result<String>;
    async fn request_to_pay(
        &self,
        transaction_id: &str,
        bearer_token: &str,
        subscription_key: &str,
        payload: &RequestToPayPayload,
    ) -> Result<()>;
    async fn fetch_transaction_status(
        &self,
        transaction_id: &str,
        bearer_token: &str,
        subscription_key: &str,
    ) -> Result<ProviderStatus>;
}

#[derive(Debug, Clone)]
pub struct MomoGateway {
    base_url: String,
    target_environment: String,
    callback_host: String,
    client: Client,
}

impl MomoGateway {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.momo_base_url,
            &config.momo_environment,
            &config.momo_callback_host,
        )
    }

    pub fn new(base_url: &str, target_environment: &str, callback_host: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        MomoGateway {
            base_url: base_url.trim_end_matches('/').to_string(),
            target_environment: target_environment.to_string(),
            callback_host: callback_host.to_string(),
            client,
        }
    }

    fn transport_error(err: reqwest::Error) -> AppError {
        if err.is_timeout() || err.is_connect() {
            AppError::ProviderUnreachable(err.to_string())
        } else {
            AppError::ProviderRejected(err.to_string())
        }
    }

    async fn rejection(response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("MoMo provider returned {}: {}", status, body);
        AppError::ProviderRejected(format!("{}: {}", status, body))
    }
}

#[async_trait]
impl CollectionsApi for MomoGateway {
    async fn create_api_user(&self, candidate_id: &str, subscription_key: &str) -> Result<()> {
        let url = format!("{}/v1_0/apiuser", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(REFERENCE_ID_HEADER, candidate_id)
            .header(SUBSCRIPTION_KEY_HEADER, subscription_key)
            .json(&serde_json::json!({ "providerCallbackHost": self.callback_host }))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        info!("MoMo API user created: {}", candidate_id);
        Ok(())
    }

    async fn create_api_key(&self, api_user_id: &str, subscription_key: &str) -> Result<String> {
        let url = format!("{}/v1_0/apiuser/{}/apikey", self.base_url, api_user_id);

        let response = self
            .client
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, subscription_key)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body: ApiKeyResponse = response.json().await.map_err(Self::transport_error)?;
        body.api_key
            .ok_or_else(|| AppError::MalformedResponse("missing apiKey field".to_string()))
    }

    async fn fetch_access_token(
        &self,
        api_user_id: &str,
        api_key: &str,
        subscription_key: &str,
    ) -> Result<String> {
        let url = format!("{}/collection/token/", self.base_url);
        let encoded_auth = base64.encode(format!("{}:{}", api_user_id, api_key));

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Basic {}", encoded_auth))
            .header(SUBSCRIPTION_KEY_HEADER, subscription_key)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body: TokenResponse = response.json().await.map_err(Self::transport_error)?;
        body.access_token
            .ok_or_else(|| AppError::MalformedResponse("missing access_token field".to_string()))
    }

    async fn request_to_pay(
        &self,
        transaction_id: &str,
        bearer_token: &str,
        subscription_key: &str,
        payload: &RequestToPayPayload,
    ) -> Result<()> {
        let url = format!("{}/collection/v1_0/requesttopay", self.base_url);

        // The reference id is the provider's idempotency key; this call is
        // made at most once per transaction id and is never retried.
        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer_token))
            .header(REFERENCE_ID_HEADER, transaction_id)
            .header(TARGET_ENVIRONMENT_HEADER, &self.target_environment)
            .header(SUBSCRIPTION_KEY_HEADER, subscription_key)
            .json(payload)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        info!("Request to pay accepted: {}", transaction_id);
        Ok(())
    }

    async fn fetch_transaction_status(
        &self,
        transaction_id: &str,
        bearer_token: &str,
        subscription_key: &str,
    ) -> Result<ProviderStatus> {
        let url = format!(
            "{}/collection/v1_0/requesttopay/{}",
            self.base_url, transaction_id
        );

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer_token))
            .header(TARGET_ENVIRONMENT_HEADER, &self.target_environment)
            .header(SUBSCRIPTION_KEY_HEADER, subscription_key)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ProviderRejected(format!("404: {}", body)));
        }

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let status: ProviderStatus = response
            .json()
            .await
            .map_err(|e| AppError::MalformedResponse(e.to_string()))?;
        Ok(status)
    }
}
