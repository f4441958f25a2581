use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Multipart, Path, Query, Request, State, multipart::MultipartRejection,
        rejection::PathRejection,
    },
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use nutrisnap_core::models::{
    FoodEntry, FoodEntryPayload, NewUser, User, UserPayload, validate_food_entry, validate_user,
};
use nutrisnap_core::storage::{MAX_USER_ID, Storage};

const BODY_LIMIT: usize = 20 * 1024 * 1024; // 20 MB

/// Multipart field carrying the photo of a food entry.
const IMAGE_FIELD: &str = "image";

pub(crate) struct AppState<S> {
    storage: Arc<S>,
    upload_dir: Arc<PathBuf>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            upload_dir: Arc::clone(&self.upload_dir),
        }
    }
}

impl<S: Storage> AppState<S> {
    pub(crate) fn new(storage: Arc<S>, upload_dir: PathBuf) -> Self {
        Self {
            storage,
            upload_dir: Arc::new(upload_dir),
        }
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct FoodEntriesQuery {
    since: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn invalid_user() -> ApiError {
    ApiError::BadRequest("Invalid user data".to_string())
}

fn invalid_food_entry() -> ApiError {
    ApiError::BadRequest("Invalid food entry data".to_string())
}

fn image_required() -> ApiError {
    ApiError::BadRequest("Image required".to_string())
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

fn invalid_user_id() -> ApiError {
    ApiError::BadRequest("Invalid user id".to_string())
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Parsing ---

/// Decode and validate a user body. Any failure is reported as a generic 400.
fn parse_user_body(body: &[u8]) -> Result<NewUser, ApiError> {
    let payload: UserPayload = serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "rejected malformed user body");
        invalid_user()
    })?;
    validate_user(payload).map_err(|e| {
        debug!(error = %e, "rejected user body");
        invalid_user()
    })
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
fn parse_since(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Invalid since '{raw}'. Use YYYY-MM-DD or an RFC 3339 timestamp"
            ))
        })
}

/// Unwrap an id path segment, answering malformed ids with `on_error` as JSON.
fn path_id(
    path: Result<Path<i64>, PathRejection>,
    on_error: fn() -> ApiError,
) -> Result<i64, ApiError> {
    path.map(|Path(id)| id).map_err(|e| {
        debug!(error = %e, "rejected path id");
        on_error()
    })
}

fn random_file_name() -> String {
    use rand::Rng;
    use std::fmt::Write;

    let bytes: [u8; 16] = rand::rng().random();
    bytes
        .iter()
        .fold(String::with_capacity(32), |mut acc: String, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        })
}

// --- Handlers ---

async fn create_user<S: Storage>(
    State(state): State<AppState<S>>,
    body: Bytes,
) -> Result<Json<User>, ApiError> {
    let new_user = parse_user_body(&body)?;
    let user = state
        .storage
        .create_user(new_user)
        .await
        .context("failed to create user")?;
    info!(user_id = user.id, "created user");
    Ok(Json(user))
}

async fn get_user<S: Storage>(
    State(state): State<AppState<S>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<User>, ApiError> {
    let id = path_id(path, user_not_found)?;
    let user = state
        .storage
        .get_user(id)
        .await
        .context("database error")?
        .ok_or_else(user_not_found)?;
    Ok(Json(user))
}

async fn update_user<S: Storage>(
    State(state): State<AppState<S>>,
    path: Result<Path<i64>, PathRejection>,
    body: Bytes,
) -> Result<Json<User>, ApiError> {
    let id = path_id(path, invalid_user_id)?;
    if id > MAX_USER_ID {
        return Err(invalid_user_id());
    }
    let new_user = parse_user_body(&body)?;
    let user = state
        .storage
        .update_user(id, new_user)
        .await
        .context("failed to update user")?;
    info!(user_id = user.id, "updated user");
    Ok(Json(user))
}

async fn create_food_entry<S: Storage>(
    State(state): State<AppState<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<FoodEntry>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        debug!(error = %e, "food entry request is not multipart");
        image_required()
    })?;

    let mut payload = FoodEntryPayload::default();
    let mut image: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        debug!(error = %e, "malformed multipart body");
        invalid_food_entry()
    })? {
        let name = field.name().unwrap_or_default().to_string();
        if name == IMAGE_FIELD {
            let has_file = field.file_name().is_some_and(|f| !f.is_empty());
            let bytes = field.bytes().await.map_err(|e| {
                debug!(error = %e, "failed to read image part");
                invalid_food_entry()
            })?;
            if has_file {
                image = Some(bytes);
            }
        } else {
            let value = field.text().await.map_err(|e| {
                debug!(error = %e, field = %name, "failed to read form field");
                invalid_food_entry()
            })?;
            payload.set_field(&name, value);
        }
    }

    let image = image.ok_or_else(image_required)?;

    let path = state.upload_dir.join(random_file_name());
    let new_entry = validate_food_entry(payload, path.display().to_string()).map_err(|e| {
        debug!(error = %e, "rejected food entry");
        invalid_food_entry()
    })?;

    store_image(&state.upload_dir, &path, &image).await?;

    let entry = match state.storage.create_food_entry(new_entry).await {
        Ok(entry) => entry,
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                debug!(error = %rm, path = %path.display(), "failed to remove orphaned image");
            }
            return Err(ApiError::Internal(e.context("failed to create food entry")));
        }
    };

    info!(
        entry_id = entry.id,
        user_id = entry.user_id,
        bytes = image.len(),
        "logged food entry"
    );
    Ok(Json(entry))
}

async fn store_image(dir: &FsPath, path: &FsPath, image: &[u8]) -> Result<(), ApiError> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create upload directory {}", dir.display()))?;
    tokio::fs::write(path, image)
        .await
        .with_context(|| format!("failed to write image {}", path.display()))?;
    Ok(())
}

async fn list_food_entries<S: Storage>(
    State(state): State<AppState<S>>,
    path: Result<Path<i64>, PathRejection>,
    Query(params): Query<FoodEntriesQuery>,
) -> Result<Json<Vec<FoodEntry>>, ApiError> {
    let user_id = path_id(path, invalid_user_id)?;
    let since = params
        .since
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_since)
        .transpose()?;

    let entries = state
        .storage
        .get_food_entries_by_user_id(user_id, since)
        .await
        .context("database error")?;
    Ok(Json(entries))
}

// --- Router builder ---

pub(crate) fn build_router<S: Storage>(state: AppState<S>) -> Router {
    Router::new()
        .route("/api/users", post(create_user::<S>))
        .route("/api/users/{id}", get(get_user::<S>).put(update_user::<S>))
        .route("/api/users/{id}/food-entries", get(list_food_entries::<S>))
        .route("/api/food-entries", post(create_food_entry::<S>))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server<S: Storage>(
    storage: S,
    port: u16,
    bind: &str,
    upload_dir: PathBuf,
) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .with_context(|| format!("failed to create upload directory {}", upload_dir.display()))?;
    info!(upload_dir = %upload_dir.display(), "storing images");

    let app = build_router(AppState::new(Arc::new(storage), upload_dir));

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!("Listening on http://{bind}:{port}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
