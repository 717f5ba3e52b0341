use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::handlers::chat_handlers;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(chat_handlers::send_message))
        .route("/history", get(chat_handlers::get_history))
        .layer(from_fn_with_state(state, auth_middleware))
}
