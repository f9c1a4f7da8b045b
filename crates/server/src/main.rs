use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use server_api::{auth, uploads, ApiContext, UploadStore};
use shared::{
    domain::{Opening, OpeningId, VariationId},
    error::{ApiError, ErrorCode},
    protocol::{
        AuthResponse, BatchDeleteRequest, Credentials, FavoriteResponse, ImportRequest,
        ImportResponse, MeResponse, MessageResponse, OpeningsQuery, ProfileUpdateRequest,
        RenameOpeningRequest, ReorderOpeningsRequest, ReorderVariationsRequest,
        VerifyAdminRequest,
    },
};
use storage::Storage;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod form;
mod session;

use config::{load_settings, prepare_database_url};
use form::read_variation_form;
use session::{cleared_cookie, session_cookie, Caller};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
    max_upload_bytes: usize,
    allowed_origins: Vec<HeaderValue>,
}

type HandlerError = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    if settings.admin_password.is_none() {
        warn!("no admin password configured; public openings are read-only");
    }

    let allowed_origins = settings
        .origins()
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let state = AppState {
        api: ApiContext {
            storage,
            uploads: UploadStore::new(&settings.uploads_dir),
            admin_password: settings.admin_password.clone(),
        },
        max_upload_bytes: settings.max_upload_bytes,
        allowed_origins,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, uploads = %settings.uploads_dir.display(), "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.allowed_origins.clone())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .route("/healthz", get(healthz))
        .route("/openings", get(http_list_openings).post(http_create_opening))
        .route("/openings/order", put(http_reorder_openings))
        .route(
            "/openings/:opening_id",
            put(http_rename_opening).delete(http_delete_opening),
        )
        .route("/openings/:opening_id/favorite", post(http_toggle_favorite))
        .route(
            "/openings/:opening_id/variations/order",
            put(http_reorder_variations),
        )
        .route(
            "/variations/:variation_id",
            put(http_update_variation).delete(http_delete_variation),
        )
        .route("/batch-delete", post(http_batch_delete))
        .route("/import", post(http_import))
        .route("/uploads/:filename", get(http_serve_upload))
        .route("/auth/signup", post(http_signup))
        .route("/auth/login", post(http_login))
        .route("/auth/logout", post(http_logout))
        .route("/auth/me", get(http_me))
        .route("/auth/profile", put(http_update_profile))
        .route("/auth/verify-admin", post(http_verify_admin))
        .route("/auth/exit-admin", post(http_exit_admin))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

fn reject(err: ApiError) -> HandlerError {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err))
}

fn internal(err: anyhow::Error) -> HandlerError {
    error!(error = %err, "request failed");
    reject(ApiError::new(ErrorCode::Internal, err.to_string()))
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.api.storage.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            warn!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

async fn http_list_openings(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Query(query): Query<OpeningsQuery>,
) -> Result<Json<Vec<Opening>>, HandlerError> {
    let openings = server_api::list_openings(&state.api, &requester, query)
        .await
        .map_err(reject)?;
    Ok(Json(openings))
}

async fn http_create_opening(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Opening>), HandlerError> {
    let form = read_variation_form(multipart).await?;
    let opening = server_api::create_opening(&state.api, &requester, form)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(opening)))
}

async fn http_rename_opening(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Path(opening_id): Path<i64>,
    Json(req): Json<RenameOpeningRequest>,
) -> Result<Json<Opening>, HandlerError> {
    let opening = server_api::rename_opening(&state.api, &requester, OpeningId(opening_id), &req.name)
        .await
        .map_err(reject)?;
    Ok(Json(opening))
}

async fn http_delete_opening(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Path(opening_id): Path<i64>,
) -> Result<StatusCode, HandlerError> {
    server_api::delete_opening(&state.api, &requester, OpeningId(opening_id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_toggle_favorite(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Path(opening_id): Path<i64>,
) -> Result<Json<FavoriteResponse>, HandlerError> {
    let response = server_api::toggle_favorite(&state.api, &requester, OpeningId(opening_id))
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

async fn http_update_variation(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Path(variation_id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<Opening>, HandlerError> {
    let form = read_variation_form(multipart).await?;
    let opening =
        server_api::update_variation(&state.api, &requester, VariationId(variation_id), form)
            .await
            .map_err(reject)?;
    Ok(Json(opening))
}

async fn http_delete_variation(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Path(variation_id): Path<i64>,
) -> Result<StatusCode, HandlerError> {
    server_api::delete_variation(&state.api, &requester, VariationId(variation_id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_batch_delete(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Json(req): Json<BatchDeleteRequest>,
) -> Result<Json<MessageResponse>, HandlerError> {
    let response = server_api::batch_delete(&state.api, &requester, &req)
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

async fn http_import(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Json(req): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, HandlerError> {
    let response = server_api::import_openings(&state.api, &requester, &req)
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

async fn http_reorder_openings(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Json(req): Json<ReorderOpeningsRequest>,
) -> Result<StatusCode, HandlerError> {
    server_api::reorder_openings(&state.api, &requester, &req)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_reorder_variations(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Path(opening_id): Path<i64>,
    Json(req): Json<ReorderVariationsRequest>,
) -> Result<StatusCode, HandlerError> {
    server_api::reorder_variations(&state.api, &requester, OpeningId(opening_id), &req)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_serve_upload(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    if !uploads::is_safe_filename(&filename) {
        return Err(reject(ApiError::validation("invalid filename")));
    }
    let bytes = state
        .api
        .uploads
        .read(&filename)
        .await
        .map_err(internal)?
        .ok_or_else(|| reject(ApiError::not_found("image not found")))?;
    Ok((
        [(header::CONTENT_TYPE, uploads::content_type_for(&filename))],
        bytes,
    ))
}

async fn http_signup(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Json(req): Json<Credentials>,
) -> Result<impl IntoResponse, HandlerError> {
    let (response, session) = auth::signup(&state.api, &requester, &req)
        .await
        .map_err(reject)?;
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&session)?)],
        Json(response),
    ))
}

async fn http_login(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Json(req): Json<Credentials>,
) -> Result<impl IntoResponse, HandlerError> {
    let (response, session) = auth::login(&state.api, &requester, &req)
        .await
        .map_err(reject)?;
    Ok(([(header::SET_COOKIE, session_cookie(&session)?)], Json(response)))
}

async fn http_logout(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
) -> Result<impl IntoResponse, HandlerError> {
    auth::logout(&state.api, &requester).await.map_err(reject)?;
    Ok((
        [(header::SET_COOKIE, cleared_cookie())],
        Json(MessageResponse::new("Logged out successfully")),
    ))
}

async fn http_me(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
) -> Result<Json<MeResponse>, HandlerError> {
    let me = auth::me(&state.api, &requester).await.map_err(reject)?;
    Ok(Json(me))
}

async fn http_update_profile(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Json(req): Json<ProfileUpdateRequest>,
) -> Result<Json<AuthResponse>, HandlerError> {
    let response = auth::update_profile(&state.api, &requester, &req)
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

async fn http_verify_admin(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Json(req): Json<VerifyAdminRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = auth::verify_admin(&state.api, &requester, &req.password)
        .await
        .map_err(reject)?;
    Ok((
        [(header::SET_COOKIE, session_cookie(&session)?)],
        Json(MessageResponse::new("Admin mode enabled")),
    ))
}

async fn http_exit_admin(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
) -> Result<Json<MessageResponse>, HandlerError> {
    auth::exit_admin(&state.api, &requester)
        .await
        .map_err(reject)?;
    Ok(Json(MessageResponse::new("Admin mode disabled")))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
