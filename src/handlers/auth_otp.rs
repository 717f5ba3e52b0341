use axum::{extract::State, response::Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use validator::Validate;

use crate::dtos::auth_dtos::{
    ForgotPasswordRequest, ForgotPasswordResponse, ResetPasswordRequest, ResetPasswordResponse,
    VerifyOtpRequest, VerifyOtpResponse,
};
use crate::errors::{AppError, Result};
use crate::state::AppState;

pub const RESET_SESSION_COOKIE: &str = "reset_session";

// 1. Forgot Password - request an OTP
pub async fn forgot_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<(CookieJar, Json<ForgotPasswordResponse>)> {
    req.validate()
        .map_err(|e| AppError::invalid_data(format!("Validation error: {}", e)))?;

    // Session state is only established once the dispatch went through; the
    // service fails before returning a session otherwise.
    let session = state.reset_service.request_reset(&req.email).await?;

    let existing = jar
        .get(RESET_SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());
    let token = state.sessions.bind(existing, session);

    let jar = jar.add(
        Cookie::build((RESET_SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .build(),
    );

    Ok((
        jar,
        Json(ForgotPasswordResponse {
            success: true,
            message: "OTP sent to your email".to_string(),
        }),
    ))
}

// 2. Verify OTP
pub async fn verify_otp(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>> {
    let token = jar
        .get(RESET_SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or(AppError::NoActiveReset)?;
    let mut session = state.sessions.get(&token).ok_or(AppError::NoActiveReset)?;

    state.reset_service.verify_otp(&mut session, &req.otp).await?;
    state.sessions.put(&token, session);

    Ok(Json(VerifyOtpResponse {
        success: true,
        message: "OTP verified successfully".to_string(),
    }))
}

// 3. Reset Password
pub async fn reset_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<(CookieJar, Json<ResetPasswordResponse>)> {
    let token = jar
        .get(RESET_SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or(AppError::NotVerified)?;
    let mut session = state.sessions.get(&token).ok_or(AppError::NotVerified)?;

    let outcome = state
        .reset_service
        .complete_reset(&mut session, &req.new_password, &req.confirm_password)
        .await;

    match outcome {
        Ok(()) => {
            state.sessions.remove(&token);
            // Removal must carry the same path the cookie was set with.
            let jar = jar.remove(
                Cookie::build((RESET_SESSION_COOKIE, ""))
                    .path("/")
                    .build(),
            );

            Ok((
                jar,
                Json(ResetPasswordResponse {
                    success: true,
                    message: "Password reset successful".to_string(),
                }),
            ))
        }
        Err(err) => {
            // Keep whatever the manager left behind, including a session it
            // voided because the challenge expired under the user.
            state.sessions.put(&token, session);
            Err(err)
        }
    }
}
