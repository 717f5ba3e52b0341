pub mod chat_service;
pub mod email_service;
pub mod reset_service;
pub mod session_service;
