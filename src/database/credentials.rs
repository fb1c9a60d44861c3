// database/credentials.rs
use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{bson::doc, Collection, Database};

use crate::errors::Result;
use crate::models::credential::ProviderCredential;

/// Access contract for provisioned provider credentials. Writes are
/// append-only; `latest` implements the most-recent-wins read policy.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn latest(&self) -> Result<Option<ProviderCredential>>;
    async fn insert(&self, credential: &ProviderCredential) -> Result<()>;
}

pub struct MongoCredentialStore {
    collection: Collection<ProviderCredential>,
}

impl MongoCredentialStore {
    pub fn new(db: &Database) -> Self {
        MongoCredentialStore {
            collection: db.collection("momo_credentials"),
        }
    }
}

#[async_trait]
impl CredentialStore for MongoCredentialStore {
    async fn latest(&self) -> Result<Option<ProviderCredential>> {
        let mut cursor = self
            .collection
            .find(doc! {})
            .sort(doc! { "updated_at": -1 })
            .limit(1)
            .await?;
        Ok(cursor.try_next().await?)
    }

    async fn insert(&self, credential: &ProviderCredential) -> Result<()> {
        self.collection.insert_one(credential).await?;
        Ok(())
    }
}
