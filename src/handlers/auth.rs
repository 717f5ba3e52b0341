use axum::{
    extract::State,
    response::Json,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{encode, EncodingKey, Header};
use chrono::Utc;
use mongodb::Collection;
use mongodb::bson::doc;

use crate::state::AppState;
use crate::errors::{AppError, Result};
use crate::models::user::{
    User, CreateUser, LoginUser, UserResponse, AuthResponse, Claims
};

fn generate_token(user: &UserResponse, secret: &str) -> Result<String> {
    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        username: user.username.clone(),
        exp: (Utc::now().timestamp() + 86400) as usize, // 24 hours
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
        .map_err(|_| AppError::service("Token generation failed"))
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CreateUser>,
) -> Result<Json<AuthResponse>> {
    let collection: Collection<User> = state.db.collection("users");

    // Check if user exists by email or username
    let filter = doc! {
        "$or": [
            { "email": &payload.email },
            { "username": &payload.username }
        ]
    };

    let existing_user = collection.find_one(filter).await?;

    if existing_user.is_some() {
        return Err(AppError::InvalidUserData);
    }

    // Hash password
    let password_hash = hash(&payload.password, DEFAULT_COST)
        .map_err(|_e| AppError::InvalidUserData)?;

    let user = User {
        _id: None,
        email: payload.email.clone(),
        username: payload.username.clone(),
        password_hash,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };

    let insert_result = collection.insert_one(&user).await?;
    let inserted_id = insert_result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| AppError::service("Failed to read inserted user id"))?;

    let user_response = UserResponse {
        id: inserted_id.to_hex(),
        email: payload.email.clone(),
        username: payload.username.clone(),
    };

    let token = generate_token(&user_response, &state.jwt_secret)?;

    Ok(Json(AuthResponse {
        user: user_response,
        token,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginUser>,
) -> Result<Json<AuthResponse>> {
    let collection: Collection<User> = state.db.collection("users");

    // Find user by email
    let filter = doc! { "email": &payload.email };
    let user = collection.find_one(filter).await?
        .ok_or(AppError::InvalidUserData)?;

    // Verify password
    let valid = verify(&payload.password, &user.password_hash)
        .map_err(|_| AppError::InvalidUserData)?;

    if !valid {
        return Err(AppError::InvalidUserData);
    }

    let user_response = UserResponse {
        id: user._id.ok_or(AppError::InvalidUserData)?.to_hex(),
        email: user.email.clone(),
        username: user.username.clone(),
    };

    let token = generate_token(&user_response, &state.jwt_secret)?;

    Ok(Json(AuthResponse {
        user: user_response,
        token,
    }))
}
