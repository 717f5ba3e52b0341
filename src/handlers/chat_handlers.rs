use axum::{
    extract::{Query, State},
    Extension, Json,
};
use bson::doc;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{Collection, Database};

use crate::errors::{AppError, Result};
use crate::models::chat::{
    ChatMessage, ChatMessageResponse, ChatReply, PaginationQuery, SendChatMessage,
};
use crate::models::user::Claims;
use crate::state::AppState;

// Get collection helper
fn get_chat_collection(db: &Database) -> Collection<ChatMessage> {
    db.collection("chat_messages")
}

// POST /api/chat
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SendChatMessage>,
) -> Result<Json<ChatReply>> {
    let prompt = payload.message.trim();
    if prompt.is_empty() {
        return Err(AppError::invalid_data("Please say something."));
    }

    let reply = state.chat_service.generate_reply(prompt).await?;

    // Both sides of the exchange land in history.
    let collection = get_chat_collection(&state.db);
    let now = Utc::now();
    let exchange = [
        ChatMessage {
            id: None,
            user_id: claims.sub.clone(),
            role: "user".to_string(),
            content: prompt.to_string(),
            created_at: now,
        },
        ChatMessage {
            id: None,
            user_id: claims.sub.clone(),
            role: "model".to_string(),
            content: reply.clone(),
            created_at: now,
        },
    ];
    collection.insert_many(&exchange).await?;

    Ok(Json(ChatReply { response: reply }))
}

// GET /api/chat/history
pub async fn get_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PaginationQuery>,
) -> Result<Json<serde_json::Value>> {
    let collection = get_chat_collection(&state.db);

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let skip = (page - 1) * limit;

    let filter = doc! { "user_id": &claims.sub };
    let total = collection.count_documents(filter.clone()).await?;

    let cursor = collection
        .find(filter)
        .sort(doc! { "created_at": 1 })
        .skip(skip as u64)
        .limit(limit as i64)
        .await?;
    let messages: Vec<ChatMessage> = cursor.try_collect().await?;
    let messages: Vec<ChatMessageResponse> = messages.into_iter().map(Into::into).collect();

    Ok(Json(serde_json::json!({
        "messages": messages,
        "total": total,
        "page": page,
        "limit": limit,
        "totalPages": (total as f64 / limit as f64).ceil() as i64,
    })))
}
