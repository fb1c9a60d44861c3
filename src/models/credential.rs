// models/credential.rs
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Provisioned API user/key pair. Records are append-only: re-provisioning
/// inserts a new document and readers take the most recently updated one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCredential {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub api_user_id: String,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderCredential {
    pub fn new(api_user_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        let now = Utc::now();
        ProviderCredential {
            id: Some(ObjectId::new()),
            api_user_id: api_user_id.into(),
            api_key: api_key.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
