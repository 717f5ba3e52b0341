use std::sync::Arc;

use bcrypt::{hash, DEFAULT_COST};
use chrono::{Duration, Utc};
use rand::Rng;
use tracing::info;

use crate::errors::{AppError, Result};
use crate::models::otp::{OtpRecord, ResetSession};
use crate::services::email_service::EmailSender;
use crate::stores::{AccountStore, OtpStore};

const OTP_TTL_MINUTES: i64 = 5;

/// Drives the email OTP password-reset protocol: request a challenge,
/// verify the submitted code, then allow a one-time password change.
///
/// Each operation is a self-contained read-modify-write against the stores;
/// two concurrent requests for the same email resolve last-write-wins, so
/// only the latest code validates.
#[derive(Clone)]
pub struct ResetService {
    accounts: Arc<dyn AccountStore>,
    otps: Arc<dyn OtpStore>,
    mailer: Arc<dyn EmailSender>,
}

impl ResetService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        otps: Arc<dyn OtpStore>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            accounts,
            otps,
            mailer,
        }
    }

    // Generate 6-digit OTP
    pub fn generate_otp() -> String {
        let mut rng = rand::thread_rng();
        format!("{:06}", rng.gen_range(0..1_000_000))
    }

    /// Start (or restart) a reset for `email`. Any outstanding challenge for
    /// the address is superseded before the new code is written and mailed.
    ///
    /// On a failed dispatch the freshly written record stays behind and no
    /// session state is returned; re-invoking regenerates and overwrites it.
    pub async fn request_reset(&self, email: &str) -> Result<ResetSession> {
        if self.accounts.find_by_email(email).await?.is_none() {
            return Err(AppError::AccountNotFound);
        }

        self.otps.delete_all_by_email(email).await?;

        let code = Self::generate_otp();
        let now = Utc::now();
        let record = OtpRecord {
            _id: None,
            email: email.to_string(),
            code: code.clone(),
            expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
            created_at: now,
        };
        self.otps.insert(record).await?;

        let body = format!(
            "Your VersaChat password reset OTP is: {}. It expires in {} minutes.",
            code, OTP_TTL_MINUTES
        );
        self.mailer
            .send(email, "Your password reset code", &body)
            .await?;

        info!(email = %email, "Password reset OTP dispatched");

        Ok(ResetSession {
            reset_email: Some(email.to_string()),
            otp_verified: false,
        })
    }

    /// Check `submitted` against the outstanding challenge for the session's
    /// email. The record is kept until the password is actually changed, so
    /// a verified session survives the password-entry step.
    pub async fn verify_otp(&self, session: &mut ResetSession, submitted: &str) -> Result<()> {
        let email = session
            .reset_email
            .clone()
            .ok_or(AppError::NoActiveReset)?;
        let code = submitted.trim();

        // One lookup covers both "wrong code" and "no outstanding
        // challenge"; the caller cannot tell which was the case.
        let record = self
            .otps
            .find_by_email_and_code(&email, code)
            .await?
            .ok_or(AppError::InvalidOtp)?;

        if record.is_expired(Utc::now()) {
            return Err(AppError::OtpExpired);
        }

        session.otp_verified = true;

        Ok(())
    }

    /// Change the password for a verified session, then tear down all reset
    /// state for the email: every OTP record is deleted and the session goes
    /// back to idle.
    pub async fn complete_reset(
        &self,
        session: &mut ResetSession,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        if !session.otp_verified {
            return Err(AppError::NotVerified);
        }
        let email = session
            .reset_email
            .clone()
            .ok_or(AppError::NoActiveReset)?;

        if new_password != confirm_password {
            return Err(AppError::PasswordMismatch);
        }

        // The verified flag is only honored while the challenge itself is
        // still live. Sitting on the password form past the OTP window sends
        // the user back to the start of the flow.
        let challenge_live = self
            .otps
            .find_by_email(&email)
            .await?
            .map(|record| !record.is_expired(Utc::now()))
            .unwrap_or(false);
        if !challenge_live {
            session.reset_email = None;
            session.otp_verified = false;
            return Err(AppError::NotVerified);
        }

        let password_hash = hash(new_password, DEFAULT_COST)
            .map_err(|_| AppError::service("Password hashing failed"))?;

        self.accounts
            .update_password_hash(&email, &password_hash)
            .await?;
        self.otps.delete_all_by_email(&email).await?;

        session.reset_email = None;
        session.otp_verified = false;

        info!(email = %email, "Password reset completed");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bcrypt::verify;

    use super::*;
    use crate::models::user::User;

    #[derive(Default)]
    struct InMemoryAccounts {
        users: Mutex<HashMap<String, User>>,
    }

    impl InMemoryAccounts {
        fn with_user(email: &str) -> Self {
            let accounts = Self::default();
            let now = Utc::now();
            accounts.users.lock().unwrap().insert(
                email.to_string(),
                User {
                    _id: None,
                    email: email.to_string(),
                    username: "bob".to_string(),
                    password_hash: hash("OldPass1", 4).unwrap(),
                    created_at: now,
                    updated_at: now,
                },
            );
            accounts
        }

        fn password_hash(&self, email: &str) -> String {
            self.users.lock().unwrap()[email].password_hash.clone()
        }
    }

    #[async_trait]
    impl AccountStore for InMemoryAccounts {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
            Ok(self.users.lock().unwrap().get(email).cloned())
        }

        async fn update_password_hash(&self, email: &str, password_hash: &str) -> Result<()> {
            if let Some(user) = self.users.lock().unwrap().get_mut(email) {
                user.password_hash = password_hash.to_string();
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryOtps {
        records: Mutex<Vec<OtpRecord>>,
    }

    impl InMemoryOtps {
        fn live_codes(&self, email: &str) -> Vec<String> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.email == email)
                .map(|r| r.code.clone())
                .collect()
        }

        fn expire_all(&self, email: &str) {
            let past = Utc::now() - Duration::minutes(1);
            for record in self.records.lock().unwrap().iter_mut() {
                if record.email == email {
                    record.expires_at = past;
                }
            }
        }
    }

    #[async_trait]
    impl OtpStore for InMemoryOtps {
        async fn delete_all_by_email(&self, email: &str) -> Result<()> {
            self.records.lock().unwrap().retain(|r| r.email != email);
            Ok(())
        }

        async fn insert(&self, record: OtpRecord) -> Result<()> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }

        async fn find_by_email_and_code(
            &self,
            email: &str,
            code: &str,
        ) -> Result<Option<OtpRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.email == email && r.code == code)
                .cloned())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<OtpRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.email == email)
                .cloned())
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl EmailSender for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
            if self.fail {
                return Err(AppError::email_dispatch("provider rejected the message"));
            }
            self.sent.lock().unwrap().push((
                to.to_string(),
                subject.to_string(),
                body.to_string(),
            ));
            Ok(())
        }
    }

    struct Fixture {
        service: ResetService,
        accounts: Arc<InMemoryAccounts>,
        otps: Arc<InMemoryOtps>,
        mailer: Arc<RecordingMailer>,
    }

    const BOB: &str = "bob@x.com";

    fn fixture() -> Fixture {
        fixture_with_mailer(RecordingMailer::default())
    }

    fn fixture_with_mailer(mailer: RecordingMailer) -> Fixture {
        let accounts = Arc::new(InMemoryAccounts::with_user(BOB));
        let otps = Arc::new(InMemoryOtps::default());
        let mailer = Arc::new(mailer);

        Fixture {
            service: ResetService::new(accounts.clone(), otps.clone(), mailer.clone()),
            accounts,
            otps,
            mailer,
        }
    }

    fn code_for(otps: &InMemoryOtps, email: &str) -> String {
        otps.live_codes(email)
            .pop()
            .expect("an OTP record should exist")
    }

    #[test]
    fn generated_otp_is_six_digits() {
        for _ in 0..100 {
            let code = ResetService::generate_otp();
            assert_eq!(6, code.len());
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn request_for_unknown_email_creates_nothing() {
        let fx = fixture();

        let err = fx
            .service
            .request_reset("nobody@x.com")
            .await
            .expect_err("unknown email should fail");

        assert!(matches!(err, AppError::AccountNotFound));
        assert!(fx.otps.live_codes("nobody@x.com").is_empty());
        assert!(fx.mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_creates_record_and_mails_the_code() {
        let fx = fixture();

        let session = fx.service.request_reset(BOB).await.unwrap();

        assert_eq!(Some(BOB.to_string()), session.reset_email);
        assert!(!session.otp_verified);

        let codes = fx.otps.live_codes(BOB);
        assert_eq!(1, codes.len());

        let sent = fx.mailer.sent.lock().unwrap();
        assert_eq!(1, sent.len());
        assert_eq!(BOB, sent[0].0);
        assert!(sent[0].2.contains(&codes[0]));
    }

    #[tokio::test]
    async fn repeated_request_supersedes_the_first_code() {
        let fx = fixture();

        fx.service.request_reset(BOB).await.unwrap();
        let first_code = code_for(&fx.otps, BOB);

        let mut session = fx.service.request_reset(BOB).await.unwrap();
        let codes = fx.otps.live_codes(BOB);
        assert_eq!(1, codes.len(), "exactly one live record after re-request");

        if first_code != codes[0] {
            let err = fx
                .service
                .verify_otp(&mut session, &first_code)
                .await
                .expect_err("superseded code should not verify");
            assert!(matches!(err, AppError::InvalidOtp));
        }

        fx.service.verify_otp(&mut session, &codes[0]).await.unwrap();
        assert!(session.otp_verified);
    }

    #[tokio::test]
    async fn dispatch_failure_keeps_the_record() {
        let fx = fixture_with_mailer(RecordingMailer {
            fail: true,
            ..Default::default()
        });

        let err = fx
            .service
            .request_reset(BOB)
            .await
            .expect_err("failed dispatch should surface");

        assert!(matches!(err, AppError::EmailDispatch(_)));
        // The challenge stays live; a retry overwrites it.
        assert_eq!(1, fx.otps.live_codes(BOB).len());
    }

    #[tokio::test]
    async fn verify_without_active_reset_fails() {
        let fx = fixture();
        let mut session = ResetSession::default();

        let err = fx
            .service
            .verify_otp(&mut session, "123456")
            .await
            .expect_err("no reset in progress");

        assert!(matches!(err, AppError::NoActiveReset));
    }

    #[tokio::test]
    async fn correct_code_verifies_and_keeps_the_record() {
        let fx = fixture();

        let mut session = fx.service.request_reset(BOB).await.unwrap();
        let code = code_for(&fx.otps, BOB);

        fx.service.verify_otp(&mut session, &code).await.unwrap();

        assert!(session.otp_verified);
        // Deletion is deferred to the completed reset.
        assert_eq!(1, fx.otps.live_codes(BOB).len());
    }

    #[tokio::test]
    async fn submitted_code_is_trimmed_before_comparison() {
        let fx = fixture();

        let mut session = fx.service.request_reset(BOB).await.unwrap();
        let code = code_for(&fx.otps, BOB);

        let padded = format!("  {}\n", code);
        fx.service.verify_otp(&mut session, &padded).await.unwrap();

        assert!(session.otp_verified);
    }

    #[tokio::test]
    async fn wrong_code_fails_closed() {
        let fx = fixture();

        let mut session = fx.service.request_reset(BOB).await.unwrap();
        let code = code_for(&fx.otps, BOB);
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let err = fx
            .service
            .verify_otp(&mut session, wrong)
            .await
            .expect_err("wrong code should fail");

        assert!(matches!(err, AppError::InvalidOtp));
        assert!(!session.otp_verified);

        // Still InvalidOtp once the record has expired: a wrong guess never
        // reveals whether a challenge exists.
        fx.otps.expire_all(BOB);
        let err = fx
            .service
            .verify_otp(&mut session, wrong)
            .await
            .expect_err("wrong code should fail after expiry too");
        assert!(matches!(err, AppError::InvalidOtp));
    }

    #[tokio::test]
    async fn correct_code_after_expiry_is_a_distinct_failure() {
        let fx = fixture();

        let mut session = fx.service.request_reset(BOB).await.unwrap();
        let code = code_for(&fx.otps, BOB);
        fx.otps.expire_all(BOB);

        let err = fx
            .service
            .verify_otp(&mut session, &code)
            .await
            .expect_err("expired code should fail");

        assert!(matches!(err, AppError::OtpExpired));
        assert!(!session.otp_verified);
    }

    #[tokio::test]
    async fn fresh_request_recovers_from_expiry() {
        let fx = fixture();

        let mut session = fx.service.request_reset(BOB).await.unwrap();
        let stale = code_for(&fx.otps, BOB);
        fx.otps.expire_all(BOB);

        let err = fx
            .service
            .verify_otp(&mut session, &stale)
            .await
            .expect_err("expired code should fail");
        assert!(matches!(err, AppError::OtpExpired));

        let mut session = fx.service.request_reset(BOB).await.unwrap();
        let fresh = code_for(&fx.otps, BOB);
        fx.service.verify_otp(&mut session, &fresh).await.unwrap();
        assert!(session.otp_verified);
    }

    #[tokio::test]
    async fn complete_without_verification_fails() {
        let fx = fixture();

        // Never requested at all.
        let mut session = ResetSession::default();
        let err = fx
            .service
            .complete_reset(&mut session, "NewPass1", "NewPass1")
            .await
            .expect_err("unverified session should fail");
        assert!(matches!(err, AppError::NotVerified));

        // Requested but never verified, mismatched values notwithstanding.
        let mut session = fx.service.request_reset(BOB).await.unwrap();
        let err = fx
            .service
            .complete_reset(&mut session, "NewPass1", "different")
            .await
            .expect_err("unverified session should fail first");
        assert!(matches!(err, AppError::NotVerified));
    }

    #[tokio::test]
    async fn mismatched_passwords_leave_the_account_alone() {
        let fx = fixture();
        let old_hash = fx.accounts.password_hash(BOB);

        let mut session = fx.service.request_reset(BOB).await.unwrap();
        let code = code_for(&fx.otps, BOB);
        fx.service.verify_otp(&mut session, &code).await.unwrap();

        let err = fx
            .service
            .complete_reset(&mut session, "NewPass1", "NewPass2")
            .await
            .expect_err("mismatched passwords should fail");

        assert!(matches!(err, AppError::PasswordMismatch));
        assert_eq!(old_hash, fx.accounts.password_hash(BOB));
        // The session stays verified; the user just retypes.
        assert!(session.otp_verified);
    }

    #[tokio::test]
    async fn full_flow_resets_the_password_and_tears_down_state() {
        let fx = fixture();
        let old_hash = fx.accounts.password_hash(BOB);

        let mut session = fx.service.request_reset(BOB).await.unwrap();
        let code = code_for(&fx.otps, BOB);
        fx.service.verify_otp(&mut session, &code).await.unwrap();
        fx.service
            .complete_reset(&mut session, "NewPass1", "NewPass1")
            .await
            .unwrap();

        let new_hash = fx.accounts.password_hash(BOB);
        assert_ne!(old_hash, new_hash);
        assert!(verify("NewPass1", &new_hash).unwrap());

        assert!(fx.otps.live_codes(BOB).is_empty());
        assert_eq!(None, session.reset_email);
        assert!(!session.otp_verified);
    }

    #[tokio::test]
    async fn challenge_expiring_on_the_password_form_voids_the_session() {
        let fx = fixture();
        let old_hash = fx.accounts.password_hash(BOB);

        let mut session = fx.service.request_reset(BOB).await.unwrap();
        let code = code_for(&fx.otps, BOB);
        fx.service.verify_otp(&mut session, &code).await.unwrap();

        // The user sits on the password form past the OTP window.
        fx.otps.expire_all(BOB);

        let err = fx
            .service
            .complete_reset(&mut session, "NewPass1", "NewPass1")
            .await
            .expect_err("stale challenge should not allow a change");

        assert!(matches!(err, AppError::NotVerified));
        assert_eq!(old_hash, fx.accounts.password_hash(BOB));
        assert_eq!(None, session.reset_email);
        assert!(!session.otp_verified);
    }
}
