//! Cookie-backed sessions.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use server_api::Requester;
use shared::error::ApiError;
use storage::StoredSession;

use crate::{internal, AppState};

pub(crate) const SESSION_COOKIE: &str = "repertoire_session";

/// The requester resolved from the session cookie. Unknown or missing
/// tokens yield an anonymous requester.
pub(crate) struct Caller(pub(crate) Requester);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            return Ok(Caller(Requester::anonymous()));
        };
        let session = state
            .api
            .storage
            .session(&token)
            .await
            .map_err(internal)?;
        Ok(Caller(Requester { session }))
    }
}

pub(crate) fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn session_cookie(session: &StoredSession) -> Result<HeaderValue, (StatusCode, Json<ApiError>)> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        session.token
    ))
    .map_err(|error| internal(error.into()))
}

pub(crate) fn cleared_cookie() -> HeaderValue {
    HeaderValue::from_static("repertoire_session=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}
