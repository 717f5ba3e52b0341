use std::sync::Arc;
use mongodb::Database;

use crate::config::AppConfig;
use crate::services::chat_service::ChatService;
use crate::services::email_service::{ConsoleMailer, EmailSender, SendgridMailer};
use crate::services::reset_service::ResetService;
use crate::services::session_service::SessionStore;
use crate::stores::{MongoAccountStore, MongoOtpStore};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt_secret: String,
    pub reset_service: ResetService,
    pub sessions: SessionStore,
    pub chat_service: Arc<ChatService>,
}

impl AppState {
    pub fn new(db: Database, config: &AppConfig) -> Self {
        let mailer: Arc<dyn EmailSender> = match &config.sendgrid_api_key {
            Some(api_key) => Arc::new(SendgridMailer::new(
                api_key.clone(),
                config.email_from.clone(),
            )),
            None => {
                tracing::warn!("SENDGRID_API_KEY not set, reset emails go to stdout");
                Arc::new(ConsoleMailer {
                    from: config.email_from.clone(),
                })
            }
        };

        let reset_service = ResetService::new(
            Arc::new(MongoAccountStore::new(db.clone())),
            Arc::new(MongoOtpStore::new(db.clone())),
            mailer,
        );

        let chat_service = Arc::new(ChatService::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
        ));

        AppState {
            db,
            jwt_secret: config.jwt_secret.clone(),
            reset_service,
            sessions: SessionStore::new(),
            chat_service,
        }
    }
}
