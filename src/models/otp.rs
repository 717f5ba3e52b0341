use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// One outstanding reset challenge. A single live record per email; a new
/// request removes the old ones before inserting.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OtpRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub email: String,
    pub code: String, // 6-digit OTP, zero padded

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Server-side progress of one user's reset flow, keyed by an opaque
/// session token. Lives in memory only, never in the document store.
///
/// `otp_verified` is only ever true while `reset_email` is set; both are
/// cleared together when the flow completes.
#[derive(Debug, Clone, Default)]
pub struct ResetSession {
    pub reset_email: Option<String>,
    pub otp_verified: bool,
}
