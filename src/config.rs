// config.rs
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub sendgrid_api_key: Option<String>,
    pub email_from: String,
    pub port: u16,
    pub host: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv().ok();

        AppConfig {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "versachat".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            gemini_api_key: env::var("GEMINI_API_KEY")
                .expect("GEMINI_API_KEY must be set"),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            // Without a SendGrid key, reset emails fall back to the console mailer.
            sendgrid_api_key: env::var("SENDGRID_API_KEY").ok(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "no-reply@versachat.app".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("PORT must be a number"),
            host: env::var("HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
        }
    }
}
