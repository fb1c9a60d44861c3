// config.rs
use std::env;

use anyhow::{bail, Context};
use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub momo_environment: String,
    pub momo_base_url: String,
    pub momo_subscription_keys: Vec<String>,
    pub momo_api_user_id: Option<String>,
    pub momo_api_key: Option<String>,
    pub momo_webhook_secret: String,
    pub momo_callback_host: String,
    pub momo_currency: String,
    pub momo_country_code: String,
    pub database_url: String,
    pub port: u16,
    pub host: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        let momo_environment =
            env::var("MOMO_ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string());

        let momo_base_url = env::var("MOMO_BASE_URL").unwrap_or_else(|_| {
            if momo_environment == "production" {
                "https://proxy.momoapi.mtn.com".to_string()
            } else {
                "https://sandbox.momodeveloper.mtn.com".to_string()
            }
        });

        // Ordered ring: first key is the default, the rest are fallbacks
        // during provisioning.
        let momo_subscription_keys: Vec<String> = env::var("MOMO_SUBSCRIPTION_KEYS")
            .context("MOMO_SUBSCRIPTION_KEYS must be set")?
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if momo_subscription_keys.is_empty() {
            bail!("MOMO_SUBSCRIPTION_KEYS must contain at least one key");
        }

        // Static override pair: both must be present to bypass provisioning.
        let momo_api_user_id = env::var("MOMO_API_USER_ID").ok().filter(|v| !v.is_empty());
        let momo_api_key = env::var("MOMO_API_KEY").ok().filter(|v| !v.is_empty());

        Ok(AppConfig {
            momo_environment,
            momo_base_url,
            momo_subscription_keys,
            momo_api_user_id,
            momo_api_key,
            momo_webhook_secret: env::var("MOMO_WEBHOOK_SECRET")
                .context("MOMO_WEBHOOK_SECRET must be set")?,
            momo_callback_host: env::var("MOMO_CALLBACK_HOST")
                .context("MOMO_CALLBACK_HOST must be set")?,
            momo_currency: env::var("MOMO_CURRENCY").unwrap_or_else(|_| "EUR".to_string()),
            momo_country_code: env::var("MOMO_COUNTRY_CODE").unwrap_or_else(|_| "256".to_string()),
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a number")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
        })
    }

    pub fn has_static_credentials(&self) -> bool {
        self.momo_api_user_id.is_some() && self.momo_api_key.is_some()
    }

    pub fn is_production(&self) -> bool {
        self.momo_environment == "production"
    }

    pub fn get_config_info(&self) -> serde_json::Value {
        serde_json::json!({
            "environment": self.momo_environment,
            "is_production": self.is_production(),
            "base_url": self.momo_base_url,
            "subscription_keys": self.momo_subscription_keys.len(),
            "static_credentials": self.has_static_credentials(),
            "callback_host": self.momo_callback_host,
            "currency": self.momo_currency,
            "country_code": self.momo_country_code,
            "port": self.port,
            "host": self.host,
        })
    }
}
