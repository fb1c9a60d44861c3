// services/payment_service.rs
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::credentials::CredentialStore;
use crate::database::transactions::TransactionLedger;
use crate::errors::{AppError, Result};
use crate::models::credential::ProviderCredential;
use crate::models::transaction::{Party, Transaction, TransactionStatus};
use crate::services::momo_gateway::{
    CollectionsApi, ProviderStatus, RequestToPayPayload, WireParty,
};

const PAYER_MESSAGE: &str = "Church donation";
const PAYEE_NOTE: &str = "Thank you for your giving";

/// Configuration slice the orchestrator needs, split out so tests can build
/// the service without a full AppConfig.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub subscription_keys: Vec<String>,
    pub static_api_user_id: Option<String>,
    pub static_api_key: Option<String>,
    pub currency: String,
    pub country_code: String,
    pub webhook_secret: String,
}

impl PaymentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        PaymentSettings {
            subscription_keys: config.momo_subscription_keys.clone(),
            static_api_user_id: config.momo_api_user_id.clone(),
            static_api_key: config.momo_api_key.clone(),
            currency: config.momo_currency.clone(),
            country_code: config.momo_country_code.clone(),
            webhook_secret: config.momo_webhook_secret.clone(),
        }
    }
}

/// Provider status push delivered to the webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub external_id: String,
    pub reference_id: Option<String>,
    pub financial_transaction_id: Option<String>,
    pub status: String,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub payer: Option<WireParty>,
    pub reason: Option<serde_json::Value>,
}

struct ResolvedCredential {
    api_user_id: String,
    api_key: String,
    subscription_key: String,
}

pub struct PaymentService {
    gateway: Arc<dyn CollectionsApi>,
    credentials: Arc<dyn CredentialStore>,
    ledger: Arc<dyn TransactionLedger>,
    settings: PaymentSettings,
}

impl PaymentService {
    pub fn new(
        gateway: Arc<dyn CollectionsApi>,
        credentials: Arc<dyn CredentialStore>,
        ledger: Arc<dyn TransactionLedger>,
        settings: PaymentSettings,
    ) -> Self {
        PaymentService {
            gateway,
            credentials,
            ledger,
            settings,
        }
    }

    /// Single entry point for the donation flow: validates input, resolves
    /// (or provisions) credentials, obtains a token, submits the request to
    /// pay, and records the pending transaction. Returns the caller-facing
    /// transaction id for later status polling.
    pub async fn initiate_payment(&self, amount: &str, phone_number: &str) -> Result<String> {
        let amount = amount.trim();
        let phone_number = phone_number.trim();

        if amount.is_empty() || phone_number.is_empty() {
            return Err(AppError::invalid_data("amount and phoneNumber are required"));
        }

        // Plain decimal digits only: f64::parse also accepts "NaN", "inf"
        // and exponent notation, none of which belong on the wire.
        if !amount.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(AppError::invalid_data("amount must be a number"));
        }
        let parsed_amount: f64 = amount
            .parse()
            .map_err(|_| AppError::invalid_data("amount must be a number"))?;
        if !parsed_amount.is_finite() || parsed_amount <= 0.0 {
            return Err(AppError::invalid_data("amount must be greater than 0"));
        }

        let msisdn = normalize_msisdn(phone_number, &self.settings.country_code)?;

        let credential = self.resolve_credentials(true).await?;
        let token = self.acquire_token(&credential).await?;

        // A fresh id every attempt, including user-initiated retries: the id
        // is the provider's idempotency reference, so reusing one would
        // collide and sharing one across retries is never correct.
        let transaction_id = Uuid::new_v4().to_string();
        let external_id = format!("DONATION-{}", Utc::now().timestamp_millis());

        let payload = RequestToPayPayload {
            amount: amount.to_string(),
            currency: self.settings.currency.clone(),
            external_id: external_id.clone(),
            payer: WireParty {
                party_id_type: "MSISDN".to_string(),
                party_id: msisdn.clone(),
            },
            payer_message: PAYER_MESSAGE.to_string(),
            payee_note: PAYEE_NOTE.to_string(),
        };

        self.gateway
            .request_to_pay(
                &transaction_id,
                &token,
                &credential.subscription_key,
                &payload,
            )
            .await?;

        info!(
            "Request to pay submitted: {} ({} {})",
            transaction_id, amount, self.settings.currency
        );

        let now = Utc::now();
        let transaction = Transaction {
            id: transaction_id.clone(),
            external_id,
            status: TransactionStatus::Pending,
            amount: amount.to_string(),
            currency: self.settings.currency.clone(),
            payer: Party::msisdn(msisdn),
            payer_message: PAYER_MESSAGE.to_string(),
            payee_note: PAYEE_NOTE.to_string(),
            financial_transaction_id: None,
            reason: None,
            created_at: now,
            updated_at: now,
        };

        // The provider has already accepted the charge; a missing ledger row
        // is a reconciliation gap, not a user-facing failure.
        if let Err(e) = self.ledger.insert(&transaction).await {
            error!(
                "Transaction {} not recorded (will self-heal on status check): {}",
                transaction_id, e
            );
        }

        Ok(transaction_id)
    }

    /// Polls the provider for the current disposition of a transaction and
    /// reconciles the ledger. The live provider status is returned even when
    /// the local write fails.
    pub async fn check_status(&self, transaction_id: &str) -> Result<ProviderStatus> {
        let transaction_id = transaction_id.trim();
        if transaction_id.is_empty() {
            return Err(AppError::invalid_data("transactionId is required"));
        }

        // Nothing to provision here: a transaction can only exist if
        // provisioning already succeeded once.
        let credential = self.resolve_credentials(false).await?;
        let token = self.acquire_token(&credential).await?;

        let status = self
            .gateway
            .fetch_transaction_status(transaction_id, &token, &credential.subscription_key)
            .await?;

        self.reconcile(transaction_id, &status).await;

        Ok(status)
    }

    /// Durably records a provider webhook push. Errors are for the caller's
    /// logs only; the HTTP layer acks regardless once the key check passed.
    pub async fn record_webhook(&self, payload: WebhookPayload) -> Result<()> {
        let parsed = match TransactionStatus::from_provider(&payload.status) {
            Some(status) => status,
            None => {
                warn!("Webhook carried unknown status '{}'", payload.status);
                TransactionStatus::Pending
            }
        };
        let reason = payload.reason.as_ref().map(reason_text);

        let mut existing = self.ledger.find_by_external_id(&payload.external_id).await?;
        if existing.is_none() {
            if let Some(reference_id) = &payload.reference_id {
                existing = self.ledger.find(reference_id).await?;
            }
        }

        match existing {
            Some(transaction) => {
                if parsed.is_terminal() {
                    self.ledger
                        .apply_status(
                            &transaction.id,
                            parsed,
                            payload.financial_transaction_id.as_deref(),
                            reason.as_deref(),
                        )
                        .await?;
                    info!(
                        "Webhook reconciled transaction {} -> {}",
                        transaction.id,
                        parsed.as_str()
                    );
                }
                Ok(())
            }
            None => {
                // Never recorded locally; create the row from the push so the
                // final state is not lost.
                let now = Utc::now();
                let transaction = Transaction {
                    id: payload
                        .reference_id
                        .clone()
                        .unwrap_or_else(|| Uuid::new_v4().to_string()),
                    external_id: payload.external_id.clone(),
                    status: parsed,
                    amount: payload.amount.clone().unwrap_or_default(),
                    currency: payload
                        .currency
                        .clone()
                        .unwrap_or_else(|| self.settings.currency.clone()),
                    payer: payload
                        .payer
                        .as_ref()
                        .map(|p| Party {
                            party_id_type: p.party_id_type.clone(),
                            party_id: p.party_id.clone(),
                        })
                        .unwrap_or_else(|| Party::msisdn("unknown")),
                    payer_message: PAYER_MESSAGE.to_string(),
                    payee_note: PAYEE_NOTE.to_string(),
                    financial_transaction_id: payload.financial_transaction_id.clone(),
                    reason,
                    created_at: now,
                    updated_at: now,
                };
                self.ledger.insert(&transaction).await?;
                info!(
                    "Webhook created ledger row for external id {}",
                    payload.external_id
                );
                Ok(())
            }
        }
    }

    /// Shared-secret check for the webhook header.
    pub fn webhook_key_matches(&self, provided: &str) -> bool {
        let a = provided.as_bytes();
        let b = self.settings.webhook_secret.as_bytes();
        a.len() == b.len()
            && a.iter()
                .zip(b.iter())
                .fold(0u8, |acc, (x, y)| acc | (x ^ y))
                == 0
    }

    async fn resolve_credentials(&self, allow_provisioning: bool) -> Result<ResolvedCredential> {
        // Statically configured credentials bypass both the store and
        // provisioning.
        if let (Some(api_user_id), Some(api_key)) = (
            &self.settings.static_api_user_id,
            &self.settings.static_api_key,
        ) {
            return Ok(ResolvedCredential {
                api_user_id: api_user_id.clone(),
                api_key: api_key.clone(),
                subscription_key: self.default_subscription_key()?.to_string(),
            });
        }

        if let Some(stored) = self.credentials.latest().await? {
            return Ok(ResolvedCredential {
                api_user_id: stored.api_user_id,
                api_key: stored.api_key,
                subscription_key: self.default_subscription_key()?.to_string(),
            });
        }

        if !allow_provisioning {
            return Err(AppError::CredentialsMissing);
        }

        self.provision_credentials().await
    }

    async fn provision_credentials(&self) -> Result<ResolvedCredential> {
        let candidate_id = Uuid::new_v4().to_string();
        info!("Provisioning MoMo API user {}", candidate_id);

        let mut winning_key: Option<&str> = None;
        let mut last_error = String::new();

        for key in &self.settings.subscription_keys {
            match self.gateway.create_api_user(&candidate_id, key).await {
                Ok(()) => {
                    winning_key = Some(key.as_str());
                    break;
                }
                Err(e) => {
                    warn!("Subscription key rejected during API user creation: {}", e);
                    last_error = e.to_string();
                }
            }
        }

        let subscription_key = winning_key.ok_or_else(|| {
            if last_error.is_empty() {
                AppError::provisioning("no subscription keys configured")
            } else {
                AppError::ProvisioningFailed(last_error.clone())
            }
        })?;

        // No ring fallback at this stage: the API user only exists under the
        // winning key.
        let api_key = self
            .gateway
            .create_api_key(&candidate_id, subscription_key)
            .await
            .map_err(|e| match e {
                AppError::ProviderUnreachable(_) => e,
                other => AppError::ProvisioningFailed(other.to_string()),
            })?;

        // Availability over durability: losing this write only costs one
        // future re-provisioning, so the in-memory pair still backs this
        // payment.
        let credential = ProviderCredential::new(&candidate_id, &api_key);
        if let Err(e) = self.credentials.insert(&credential).await {
            error!(
                "Provisioned credential was not durably saved, provisioning will repeat: {}",
                e
            );
        }

        Ok(ResolvedCredential {
            api_user_id: candidate_id,
            api_key,
            subscription_key: subscription_key.to_string(),
        })
    }

    async fn acquire_token(&self, credential: &ResolvedCredential) -> Result<String> {
        // Tokens are short-lived and fetched per call, never cached.
        self.gateway
            .fetch_access_token(
                &credential.api_user_id,
                &credential.api_key,
                &credential.subscription_key,
            )
            .await
            .map_err(|e| match e {
                AppError::ProviderUnreachable(_) => e,
                other => AppError::TokenAcquisitionFailed(other.to_string()),
            })
    }

    async fn reconcile(&self, transaction_id: &str, status: &ProviderStatus) {
        let parsed = match TransactionStatus::from_provider(&status.status) {
            Some(parsed) => parsed,
            None => {
                warn!(
                    "Provider reported unknown status '{}' for {}",
                    status.status, transaction_id
                );
                TransactionStatus::Pending
            }
        };
        let reason = status.reason.as_ref().map(reason_text);

        match self.ledger.find(transaction_id).await {
            Ok(Some(_)) => {
                if parsed.is_terminal() {
                    if let Err(e) = self
                        .ledger
                        .apply_status(
                            transaction_id,
                            parsed,
                            status.financial_transaction_id.as_deref(),
                            reason.as_deref(),
                        )
                        .await
                    {
                        error!(
                            "Status for {} fetched but not persisted: {}",
                            transaction_id, e
                        );
                    }
                }
            }
            Ok(None) => {
                // Initiation write was lost; recreate the row from the
                // provider's answer.
                let now = Utc::now();
                let transaction = Transaction {
                    id: transaction_id.to_string(),
                    external_id: status.external_id.clone().unwrap_or_default(),
                    status: parsed,
                    amount: status.amount.clone().unwrap_or_default(),
                    currency: status
                        .currency
                        .clone()
                        .unwrap_or_else(|| self.settings.currency.clone()),
                    payer: status
                        .payer
                        .as_ref()
                        .map(|p| Party {
                            party_id_type: p.party_id_type.clone(),
                            party_id: p.party_id.clone(),
                        })
                        .unwrap_or_else(|| Party::msisdn("unknown")),
                    payer_message: PAYER_MESSAGE.to_string(),
                    payee_note: PAYEE_NOTE.to_string(),
                    financial_transaction_id: status.financial_transaction_id.clone(),
                    reason,
                    created_at: now,
                    updated_at: now,
                };
                if let Err(e) = self.ledger.insert(&transaction).await {
                    error!(
                        "Self-healing insert for {} failed: {}",
                        transaction_id, e
                    );
                } else {
                    info!("Recreated missing ledger row for {}", transaction_id);
                }
            }
            Err(e) => {
                error!(
                    "Ledger lookup for {} failed during reconciliation: {}",
                    transaction_id, e
                );
            }
        }
    }

    fn default_subscription_key(&self) -> Result<&str> {
        self.settings
            .subscription_keys
            .first()
            .map(|k| k.as_str())
            .ok_or_else(|| AppError::configuration("no subscription keys configured"))
    }
}

fn reason_text(value: &serde_json::Value) -> String {
    value
        .as_str()
        .map(|s| s.to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Normalizes a local phone number into MSISDN form: a single leading zero
/// is replaced by the country code, already-international numbers pass
/// through unchanged, anything else is rejected rather than mis-dialed.
pub fn normalize_msisdn(phone: &str, country_code: &str) -> Result<String> {
    let phone = phone.trim();
    let digits = phone.strip_prefix('+').unwrap_or(phone);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::invalid_data(
            "phoneNumber must contain only digits",
        ));
    }

    if digits.starts_with(country_code) && digits.len() > country_code.len() {
        return Ok(digits.to_string());
    }

    if let Some(rest) = digits.strip_prefix('0') {
        if rest.is_empty() || rest.starts_with('0') {
            return Err(AppError::invalid_data("unrecognized phone number format"));
        }
        return Ok(format!("{}{}", country_code, rest));
    }

    if digits.len() == 9 {
        return Ok(format!("{}{}", country_code, digits));
    }

    Err(AppError::invalid_data("unrecognized phone number format"))
}
