// ============================
// crates/backend-lib/src/handlers/extract.rs
// ============================
//! Request extractors and cookie helpers shared by the user routes.
use axum::{
    extract::{multipart::Field, FromRequestParts, Multipart},
    http::{header::AUTHORIZATION, request::Parts},
};
use identity_common::{PublicIdentity, TokenPair};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tower_cookies::{Cookie, Cookies};

use crate::config::Settings;
use crate::error::AppError;
use crate::media::LocalUpload;
use crate::storage::IdentityStore;
use crate::AppState;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// The identity behind the access token presented with the request.
///
/// The token is read from the `accessToken` cookie, falling back to an
/// `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub PublicIdentity);

impl<S> FromRequestParts<Arc<AppState<S>>> for CurrentIdentity
where
    S: IdentityStore + 'static,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::Internal(msg.to_string()))?;

        let token = non_empty_cookie(&cookies, ACCESS_COOKIE).or_else(|| bearer_token(parts));

        let identity = state.gate.authenticate(token.as_deref()).await?;
        Ok(CurrentIdentity(identity))
    }
}

/// Cookie value, treating a blank value (as left behind by a cleared cookie) as absent
pub fn non_empty_cookie(cookies: &Cookies, name: &str) -> Option<String> {
    cookies
        .get(name)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|value| !value.is_empty())
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

fn session_cookie(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    let secs = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
    cookie.set_max_age(time::Duration::seconds(secs));
    cookie
}

/// Store both tokens of a freshly issued pair as cookies
pub fn set_session_cookies(cookies: &Cookies, settings: &Settings, pair: &TokenPair) {
    let secure = settings.cookies.secure;
    let tokens = &settings.tokens;
    cookies.add(session_cookie(
        ACCESS_COOKIE,
        pair.access_token.clone(),
        tokens.access_ttl(),
        secure,
    ));
    cookies.add(session_cookie(
        REFRESH_COOKIE,
        pair.refresh_token.clone(),
        tokens.refresh_ttl(),
        secure,
    ));
}

/// Expire both token cookies
pub fn clear_session_cookies(cookies: &Cookies, settings: &Settings) {
    let secure = settings.cookies.secure;
    for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
        cookies.add(session_cookie(name, String::new(), Duration::ZERO, secure));
    }
}

/// Multipart form with its files staged in temporary files.
///
/// Staged files are deleted when the form is dropped unless the blob store
/// already consumed them.
#[derive(Default)]
pub struct StagedForm {
    fields: HashMap<String, String>,
    files: HashMap<String, (NamedTempFile, Option<String>)>,
}

impl StagedForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = StagedForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::InvalidInput(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let staged = stage_field(field).await?;
                    form.files.insert(name, (staged, Some(file_name)));
                },
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::InvalidInput(e.body_text()))?;
                    form.fields.insert(name, text);
                },
            }
        }
        Ok(form)
    }

    /// Text value of a field, empty if absent
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn upload(&self, name: &str) -> Option<LocalUpload> {
        self.files.get(name).map(|(staged, file_name)| LocalUpload {
            path: staged.path().to_path_buf(),
            file_name: file_name.clone(),
        })
    }
}

async fn stage_field(field: Field<'_>) -> Result<NamedTempFile, AppError> {
    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let mut staged = NamedTempFile::new()?;
    staged.write_all(&bytes)?;
    staged.flush()?;
    Ok(staged)
}
