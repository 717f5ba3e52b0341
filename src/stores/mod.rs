use async_trait::async_trait;
use mongodb::{
    bson::{self, doc},
    Collection, Database,
};

use crate::errors::Result;
use crate::models::otp::OtpRecord;
use crate::models::user::User;

/// Lookup and credential update against the user accounts collection.
/// Account creation stays with the auth handlers.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn update_password_hash(&self, email: &str, password_hash: &str) -> Result<()>;
}

/// Outstanding reset challenges, one live record per email.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn delete_all_by_email(&self, email: &str) -> Result<()>;
    async fn insert(&self, record: OtpRecord) -> Result<()>;
    async fn find_by_email_and_code(&self, email: &str, code: &str) -> Result<Option<OtpRecord>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<OtpRecord>>;
}

#[derive(Clone)]
pub struct MongoAccountStore {
    db: Database,
}

impl MongoAccountStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self) -> Collection<User> {
        self.db.collection("users")
    }
}

#[async_trait]
impl AccountStore for MongoAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self.collection().find_one(doc! { "email": email }).await?;
        Ok(user)
    }

    async fn update_password_hash(&self, email: &str, password_hash: &str) -> Result<()> {
        let now = bson::DateTime::from_chrono(chrono::Utc::now());
        let filter = doc! { "email": email };
        let update = doc! {
            "$set": {
                "password_hash": password_hash,
                "updated_at": now,
            }
        };

        self.collection().update_one(filter, update).await?;

        Ok(())
    }
}

#[derive(Clone)]
pub struct MongoOtpStore {
    db: Database,
}

impl MongoOtpStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self) -> Collection<OtpRecord> {
        self.db.collection("reset_otps")
    }
}

#[async_trait]
impl OtpStore for MongoOtpStore {
    async fn delete_all_by_email(&self, email: &str) -> Result<()> {
        self.collection().delete_many(doc! { "email": email }).await?;
        Ok(())
    }

    async fn insert(&self, record: OtpRecord) -> Result<()> {
        self.collection().insert_one(&record).await?;
        Ok(())
    }

    async fn find_by_email_and_code(&self, email: &str, code: &str) -> Result<Option<OtpRecord>> {
        let record = self
            .collection()
            .find_one(doc! { "email": email, "code": code })
            .await?;
        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<OtpRecord>> {
        let record = self.collection().find_one(doc! { "email": email }).await?;
        Ok(record)
    }
}
