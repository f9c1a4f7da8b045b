//! HTTP access to the repertoire backend.

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Opening, OpeningId, VariationId},
    protocol::{
        AuthResponse, BatchDeleteRequest, Credentials, FavoriteResponse, ImportRequest,
        ImportResponse, MeResponse, MessageResponse, OpeningsQuery, ProfileUpdateRequest,
        RenameOpeningRequest, ReorderOpeningsRequest, ReorderVariationsRequest, VariationForm,
        VerifyAdminRequest,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiFailure {
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
}

impl ApiFailure {
    /// Builds a failure from an error response, preferring the body's
    /// `message` field, then its `error` field.
    pub fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                ["message", "error"].iter().find_map(|field| {
                    value
                        .get(field)
                        .and_then(|v| v.as_str())
                        .filter(|s| !s.trim().is_empty())
                        .map(str::to_string)
                })
            })
            .unwrap_or_else(|| format!("Request failed with status {status}"));
        Self::Status { status, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[async_trait]
pub trait RepertoireApi: Send + Sync {
    async fn list_openings(&self, query: OpeningsQuery) -> Result<Vec<Opening>, ApiFailure>;
    async fn create_opening(&self, form: VariationForm) -> Result<Opening, ApiFailure>;
    async fn rename_opening(&self, opening_id: OpeningId, name: &str)
        -> Result<Opening, ApiFailure>;
    async fn delete_opening(&self, opening_id: OpeningId) -> Result<(), ApiFailure>;
    async fn toggle_favorite(&self, opening_id: OpeningId)
        -> Result<FavoriteResponse, ApiFailure>;
    async fn update_variation(
        &self,
        variation_id: VariationId,
        form: VariationForm,
    ) -> Result<Opening, ApiFailure>;
    async fn delete_variation(&self, variation_id: VariationId) -> Result<(), ApiFailure>;
    async fn batch_delete(&self, request: &BatchDeleteRequest)
        -> Result<MessageResponse, ApiFailure>;
    async fn import_openings(&self, opening_ids: &[OpeningId])
        -> Result<ImportResponse, ApiFailure>;
    async fn reorder_openings(&self, request: &ReorderOpeningsRequest) -> Result<(), ApiFailure>;
    async fn reorder_variations(
        &self,
        opening_id: OpeningId,
        request: &ReorderVariationsRequest,
    ) -> Result<(), ApiFailure>;
    async fn verify_admin(&self, password: &str) -> Result<(), ApiFailure>;
    async fn exit_admin(&self) -> Result<(), ApiFailure>;
}

/// reqwest client keeping the session cookie between calls.
#[derive(Debug, Clone)]
pub struct HttpRepertoireApi {
    http: Client,
    server_url: String,
}

impl HttpRepertoireApi {
    pub fn new(server_url: impl Into<String>) -> Result<Self, ApiFailure> {
        let server_url = server_url.into();
        let parsed =
            Url::parse(&server_url).map_err(|err| ApiFailure::InvalidUrl(err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiFailure::InvalidUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }
        let http = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            server_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn image_url(&self, filename: &str) -> String {
        format!("{}/uploads/{filename}", self.server_url)
    }

    pub async fn signup(&self, credentials: &Credentials) -> Result<AuthResponse, ApiFailure> {
        self.send_json(self.http.post(self.url("/auth/signup")).json(credentials))
            .await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiFailure> {
        self.send_json(self.http.post(self.url("/auth/login")).json(credentials))
            .await
    }

    pub async fn logout(&self) -> Result<MessageResponse, ApiFailure> {
        self.send_json(self.http.post(self.url("/auth/logout"))).await
    }

    pub async fn me(&self) -> Result<MeResponse, ApiFailure> {
        self.send_json(self.http.get(self.url("/auth/me"))).await
    }

    pub async fn update_profile(
        &self,
        request: &ProfileUpdateRequest,
    ) -> Result<AuthResponse, ApiFailure> {
        self.send_json(self.http.put(self.url("/auth/profile")).json(request))
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiFailure> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), %body, "backend rejected request");
        Err(ApiFailure::from_body(status.as_u16(), &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiFailure> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|err| ApiFailure::Decode(err.to_string()))
    }
}

fn variation_multipart(form: VariationForm) -> Form {
    let mut multipart = Form::new().text("moves", form.moves);
    if let Some(name) = form.name {
        multipart = multipart.text("name", name);
    }
    if let Some(side) = form.side {
        multipart = multipart.text("side", side.as_str());
    }
    if let Some(notes) = form.notes {
        multipart = multipart.text("notes", notes);
    }
    if let Some(variation_name) = form.variation_name {
        multipart = multipart.text("variation_name", variation_name);
    }
    for tutorial in form.tutorials {
        multipart = multipart.text("tutorials", tutorial);
    }
    if form.delete_image {
        multipart = multipart.text("delete_image", "true");
    }
    if let Some(image) = form.image {
        multipart = multipart.part("image", Part::bytes(image.bytes).file_name(image.filename));
    }
    multipart
}

#[async_trait]
impl RepertoireApi for HttpRepertoireApi {
    async fn list_openings(&self, query: OpeningsQuery) -> Result<Vec<Opening>, ApiFailure> {
        let request = self.http.get(self.url("/openings")).query(&[
            ("mode", query.mode.as_str()),
            ("favorites", if query.favorites { "true" } else { "false" }),
        ]);
        self.send_json(request).await
    }

    async fn create_opening(&self, form: VariationForm) -> Result<Opening, ApiFailure> {
        let request = self
            .http
            .post(self.url("/openings"))
            .multipart(variation_multipart(form));
        self.send_json(request).await
    }

    async fn rename_opening(
        &self,
        opening_id: OpeningId,
        name: &str,
    ) -> Result<Opening, ApiFailure> {
        let request = self
            .http
            .put(self.url(&format!("/openings/{opening_id}")))
            .json(&RenameOpeningRequest {
                name: name.to_string(),
            });
        self.send_json(request).await
    }

    async fn delete_opening(&self, opening_id: OpeningId) -> Result<(), ApiFailure> {
        self.send(self.http.delete(self.url(&format!("/openings/{opening_id}"))))
            .await
            .map(drop)
    }

    async fn toggle_favorite(
        &self,
        opening_id: OpeningId,
    ) -> Result<FavoriteResponse, ApiFailure> {
        self.send_json(
            self.http
                .post(self.url(&format!("/openings/{opening_id}/favorite"))),
        )
        .await
    }

    async fn update_variation(
        &self,
        variation_id: VariationId,
        form: VariationForm,
    ) -> Result<Opening, ApiFailure> {
        let request = self
            .http
            .put(self.url(&format!("/variations/{variation_id}")))
            .multipart(variation_multipart(form));
        self.send_json(request).await
    }

    async fn delete_variation(&self, variation_id: VariationId) -> Result<(), ApiFailure> {
        self.send(self.http.delete(self.url(&format!("/variations/{variation_id}"))))
            .await
            .map(drop)
    }

    async fn batch_delete(
        &self,
        request: &BatchDeleteRequest,
    ) -> Result<MessageResponse, ApiFailure> {
        self.send_json(self.http.post(self.url("/batch-delete")).json(request))
            .await
    }

    async fn import_openings(
        &self,
        opening_ids: &[OpeningId],
    ) -> Result<ImportResponse, ApiFailure> {
        let request = ImportRequest {
            opening_ids: opening_ids.to_vec(),
        };
        self.send_json(self.http.post(self.url("/import")).json(&request))
            .await
    }

    async fn reorder_openings(&self, request: &ReorderOpeningsRequest) -> Result<(), ApiFailure> {
        self.send(self.http.put(self.url("/openings/order")).json(request))
            .await
            .map(drop)
    }

    async fn reorder_variations(
        &self,
        opening_id: OpeningId,
        request: &ReorderVariationsRequest,
    ) -> Result<(), ApiFailure> {
        self.send(
            self.http
                .put(self.url(&format!("/openings/{opening_id}/variations/order")))
                .json(request),
        )
        .await
        .map(drop)
    }

    async fn verify_admin(&self, password: &str) -> Result<(), ApiFailure> {
        let request = VerifyAdminRequest {
            password: password.to_string(),
        };
        self.send(self.http.post(self.url("/auth/verify-admin")).json(&request))
            .await
            .map(drop)
    }

    async fn exit_admin(&self) -> Result<(), ApiFailure> {
        self.send(self.http.post(self.url("/auth/exit-admin")))
            .await
            .map(drop)
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
