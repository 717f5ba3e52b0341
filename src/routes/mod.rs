pub(crate) mod auth;
pub(crate) mod auth_otp_routes;
pub(crate) mod chat;
