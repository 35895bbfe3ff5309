// ============================
// crates/backend-lib/src/handlers/users.rs
// ============================
//! `/api/v1/users` handlers.
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use identity_common::{
    ApiResponse, ChangePasswordRequest, LoginRequest, LoginResponse, PublicIdentity,
    RefreshRequest, TokenPair, UpdateAccountRequest,
};
use serde_json::Value;
use std::sync::Arc;
use tower_cookies::Cookies;

use super::extract::{
    clear_session_cookies, non_empty_cookie, set_session_cookies, CurrentIdentity, StagedForm,
    REFRESH_COOKIE,
};
use crate::auth::RegisterInput;
use crate::error::AppError;
use crate::storage::IdentityStore;
use crate::validation::ValidationError;
use crate::AppState;

type Reply<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

fn reply<T>(status: StatusCode, data: T, message: &str) -> Reply<T> {
    Ok((status, Json(ApiResponse::new(status.as_u16(), data, message))))
}

pub async fn register<S: IdentityStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    multipart: Multipart,
) -> Reply<PublicIdentity> {
    let form = StagedForm::from_multipart(multipart).await?;
    let input = RegisterInput {
        full_name: form.text("fullName"),
        email: form.text("email"),
        username: form.text("username"),
        password: form.text("password"),
        avatar: form.upload("avatar"),
        cover_image: form.upload("coverImage"),
    };

    let user = state.auth.register(input).await?;
    reply(StatusCode::CREATED, user, "User registered successfully")
}

pub async fn login<S: IdentityStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    cookies: Cookies,
    Json(body): Json<LoginRequest>,
) -> Reply<LoginResponse> {
    let outcome = state.auth.login(body).await?;
    set_session_cookies(&cookies, &state.settings, &outcome.tokens);

    let response = LoginResponse {
        user: outcome.user,
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
    };
    reply(StatusCode::OK, response, "User logged in successfully")
}

pub async fn logout<S: IdentityStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    cookies: Cookies,
    CurrentIdentity(user): CurrentIdentity,
) -> Reply<Value> {
    state.auth.logout(user.id).await?;
    clear_session_cookies(&cookies, &state.settings);
    reply(StatusCode::OK, Value::Object(Default::default()), "User logged out")
}

/// The refresh token comes from the cookie, or from a JSON body for non-browser clients
pub async fn refresh_token<S: IdentityStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    cookies: Cookies,
    body: Bytes,
) -> Reply<TokenPair> {
    let presented = match non_empty_cookie(&cookies, REFRESH_COOKIE) {
        Some(token) => Some(token),
        None if body.is_empty() => None,
        None => {
            serde_json::from_slice::<RefreshRequest>(&body)
                .map_err(|e| AppError::InvalidInput(e.to_string()))?
                .refresh_token
        },
    };

    let pair = state.auth.refresh(presented).await?;
    set_session_cookies(&cookies, &state.settings, &pair);
    reply(StatusCode::OK, pair, "Access token refreshed")
}

pub async fn change_password<S: IdentityStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    cookies: Cookies,
    CurrentIdentity(user): CurrentIdentity,
    Json(body): Json<ChangePasswordRequest>,
) -> Reply<Value> {
    state.auth.change_password(user.id, body).await?;
    clear_session_cookies(&cookies, &state.settings);
    reply(
        StatusCode::OK,
        Value::Object(Default::default()),
        "Password changed successfully",
    )
}

pub async fn current_user(CurrentIdentity(user): CurrentIdentity) -> Reply<PublicIdentity> {
    reply(StatusCode::OK, user, "Current user fetched successfully")
}

pub async fn update_account<S: IdentityStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentIdentity(user): CurrentIdentity,
    Json(body): Json<UpdateAccountRequest>,
) -> Reply<PublicIdentity> {
    let updated = state.profiles.update_account_details(user.id, body).await?;
    reply(StatusCode::OK, updated, "Account details updated successfully")
}

pub async fn update_avatar<S: IdentityStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentIdentity(user): CurrentIdentity,
    multipart: Multipart,
) -> Reply<PublicIdentity> {
    let form = StagedForm::from_multipart(multipart).await?;
    let upload = form
        .upload("avatar")
        .ok_or(ValidationError::MissingFile("avatar"))?;
    let updated = state.profiles.update_avatar(user.id, upload).await?;
    reply(StatusCode::OK, updated, "Avatar updated successfully")
}

pub async fn update_cover_image<S: IdentityStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentIdentity(user): CurrentIdentity,
    multipart: Multipart,
) -> Reply<PublicIdentity> {
    let form = StagedForm::from_multipart(multipart).await?;
    let upload = form
        .upload("coverImage")
        .ok_or(ValidationError::MissingFile("coverImage"))?;
    let updated = state.profiles.update_cover_image(user.id, upload).await?;
    reply(StatusCode::OK, updated, "Cover image updated successfully")
}
