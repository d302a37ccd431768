use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit, FromRequest, FromRequestParts, Path, Query, Request, State,
    },
    http::{self, header, request::Parts, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AuthError, MediaError, RemoteError, SessionError};
use crate::media::{MediaFetcher, MediaSource};
use crate::remote::{
    MediaInfo, Profile, RemoteClient, RemotePlatform, StoryItem, ThreadMessages, ThreadSummary,
    UserSummary, VideoTarget,
};
use crate::service::auth::authorize;
use crate::service::openapi;
use crate::session::{ClientCache, SessionRecord, SessionStore};
use crate::util::{is_safe_identifier, timestamp_millis};

/// Shared application state for the HTTP API.
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<dyn SessionStore>,
    pub platform: Arc<dyn RemotePlatform>,
    /// Restored clients keyed by username
    pub clients: ClientCache,
    pub media: MediaFetcher,
}

impl AppState {
    pub fn new(
        config: Config,
        sessions: Arc<dyn SessionStore>,
        platform: Arc<dyn RemotePlatform>,
    ) -> Result<Self, MediaError> {
        let media = MediaFetcher::new(&config.media)?;
        let clients = ClientCache::new(config.sessions.client_cache_capacity);
        Ok(Self {
            config,
            sessions,
            platform,
            clients,
            media,
        })
    }

    /// Run a collaborator call under the configured upstream timeout.
    async fn remote<T, F>(&self, fut: F) -> Result<T, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        let secs = self.config.bridge.timeout_secs.max(1);
        match tokio::time::timeout(Duration::from_secs(secs), fut).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(secs)),
        }
    }

    /// Resolve the client for a stored session, restoring it on a cache miss.
    pub async fn client_for(&self, username: &str) -> Result<Arc<dyn RemoteClient>, ApiError> {
        check_key(username)?;
        if !self.sessions.exists(username) {
            self.clients.invalidate(username);
            return Err(session_not_found(username));
        }
        if let Some(client) = self.clients.get(username) {
            return Ok(client);
        }

        let record = self
            .sessions
            .load(username)?
            .ok_or_else(|| session_not_found(username))?;
        let client = self
            .remote(self.platform.restore(&record))
            .await
            .map_err(|e| ApiError::upstream(e, StatusCode::BAD_REQUEST))?;
        self.clients.insert(username, client.clone());
        Ok(client)
    }
}

// ====== Errors ======

/// Every failure a handler can surface, mapped once to a status code.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    PayloadTooLarge(String),
    Upstream {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
    Internal(String),
}

impl ApiError {
    /// Wrap a collaborator failure with an explicit status.
    pub fn upstream(err: RemoteError, status: StatusCode) -> Self {
        ApiError::Upstream {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }

    /// Login failures: 401 for credential problems, 400 otherwise.
    pub fn login_failure(err: RemoteError) -> Self {
        let status = if err.is_credential_failure() {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::BAD_REQUEST
        };
        Self::upstream(err, status)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED_ERROR",
            ApiError::Forbidden(_) => "FORBIDDEN_ERROR",
            ApiError::NotFound(_) => "RESOURCE_NOT_FOUND",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::Upstream { code, .. } => *code,
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub message: String,
    pub timestamp: i64,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match self {
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                "An unexpected error occurred.".to_string()
            }
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::PayloadTooLarge(m)
            | ApiError::Upstream { message: m, .. } => m,
        };

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: code.to_string(),
            message,
            timestamp: timestamp_millis(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RemoteError> for ApiError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound(message) => ApiError::NotFound(message),
            err if err.is_credential_failure() => ApiError::upstream(err, StatusCode::UNAUTHORIZED),
            err => ApiError::upstream(err, StatusCode::BAD_REQUEST),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidKey(key) => {
                ApiError::BadRequest(format!("Invalid username: '{key}'"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Missing => ApiError::Unauthorized(err.to_string()),
            AuthError::Invalid => ApiError::Forbidden(err.to_string()),
        }
    }
}

fn session_not_found(username: &str) -> ApiError {
    ApiError::NotFound(format!("No session found for '{username}'"))
}

fn check_key(username: &str) -> Result<(), ApiError> {
    if is_safe_identifier(username) {
        Ok(())
    } else {
        Err(SessionError::InvalidKey(username.to_string()).into())
    }
}

/// Trimmed, non-empty value of a required field.
fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("'{field}' is required")))
}

/// Like [`required`] but keeps the value untouched.
fn required_raw(field: &str, value: Option<String>) -> Result<String, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("'{field}' is required")))
}

// ====== Extractors ======

/// `Json<T>` whose rejections become [`ApiError`] bodies.
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(rejection.body_text())
    } else {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// `Query<T>` whose rejections become [`ApiError`] bodies.
pub struct ValidQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ValidQuery(value)),
            Err(rejection) => Err(query_rejection(rejection)),
        }
    }
}

fn query_rejection(rejection: QueryRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

/// `Path<T>` whose rejections become [`ApiError`] bodies.
pub struct ValidPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ValidPath(value)),
            Err(rejection) => Err(path_rejection(rejection)),
        }
    }
}

fn path_rejection(rejection: PathRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

// ====== Request / response types ======

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub proxy: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsernameRequest {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportSessionRequest {
    pub username: Option<String>,
    pub session: Option<Value>,
    pub validate: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PostRequest {
    pub username: Option<String>,
    pub caption: Option<String>,
    pub url: Option<String>,
    pub base64: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub username: Option<String>,
    pub to_username: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPhotoRequest {
    pub username: Option<String>,
    pub to_username: Option<String>,
    pub url: Option<String>,
    pub base64: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBioRequest {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub url: Option<String>,
    pub base64: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoriesQuery {
    pub username: Option<String>,
    pub target_username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub session: SessionRecord,
}

#[derive(Debug, Serialize)]
pub struct ImportSessionResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged_in_user: Option<UserSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub username: String,
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub message: String,
    pub media: MediaInfo,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub message: String,
    pub thread_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ====== Router ======

/// Create the axum Router with all API routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        // Auth
        .route("/auth/login", post(handle_login))
        .route("/auth/resume", post(handle_resume))
        .route("/auth/status", get(handle_status))
        .route("/auth/delete", delete(handle_delete))
        .route("/auth/login-session", post(handle_login_session))
        // Posts
        .route("/post/photo-feed", post(handle_photo_feed))
        .route("/post/photo-story", post(handle_photo_story))
        .route("/post/video-feed", post(handle_video_feed))
        .route("/post/video-story", post(handle_video_story))
        .route("/post/video-reels", post(handle_video_reels))
        // Direct messages
        .route("/dm/send", post(handle_dm_send))
        .route("/dm/send-photo", post(handle_dm_send_photo))
        .route("/dm/inbox", get(handle_dm_inbox))
        .route("/dm/thread/{thread_id}", get(handle_dm_thread))
        // Profile / stories
        .route("/profile/update-bio", post(handle_update_bio))
        .route("/profile/{target_username}", get(handle_profile))
        .route("/stories", get(handle_stories))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/health", get(handle_health))
        .route("/openapi.json", get(handle_openapi))
        .route("/apidocs", get(handle_apidocs))
        .merge(protected)
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .with_state(state)
}

/// Admin bearer gate for every privileged route.
async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if let Err(e) = authorize(header, &state.config.auth.admin_token) {
        warn!("Rejected {} {}: {}", req.method(), req.uri().path(), e);
        return Err(e.into());
    }
    Ok(next.run(req).await)
}

// ====== Handlers: docs & health ======

async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
    })
}

async fn handle_openapi() -> impl IntoResponse {
    Json(openapi::openapi_document())
}

async fn handle_apidocs() -> impl IntoResponse {
    Html(openapi::SWAGGER_UI_HTML)
}

async fn handle_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

// ====== Handlers: auth ======

async fn handle_login(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = required("username", body.username)?;
    let password = required_raw("password", body.password)?;
    check_key(&username)?;
    let proxy = body
        .proxy
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    let record = match state
        .remote(state.platform.login(&username, &password, proxy.as_deref()))
        .await
    {
        Ok(record) => record,
        Err(e) => {
            warn!("Login failed for {}: {}", username, e);
            return Err(ApiError::login_failure(e));
        }
    };

    state.sessions.save(&record)?;
    state.clients.invalidate(&username);
    info!("Logged in {} via {}", username, state.platform.name());

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        session: record,
    }))
}

async fn handle_resume(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<UsernameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = required("username", body.username)?;
    check_key(&username)?;
    let record = state
        .sessions
        .load(&username)?
        .ok_or_else(|| session_not_found(&username))?;

    let verified = async {
        let client = state.remote(state.platform.restore(&record)).await?;
        state.remote(client.verify()).await?;
        Ok::<_, RemoteError>(client)
    }
    .await;

    match verified {
        Ok(client) => {
            state.clients.insert(&username, client);
            info!("Resumed session for {}", username);
            Ok(MessageResponse::new("Session resumed"))
        }
        Err(e) => {
            state.clients.invalidate(&username);
            warn!("Resume failed for {}: {}", username, e);
            Err(ApiError::upstream(e, StatusCode::BAD_REQUEST))
        }
    }
}

async fn handle_status(
    State(state): State<Arc<AppState>>,
    ValidQuery(query): ValidQuery<UsernameQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let username = required("username", query.username)?;
    let active = state.sessions.exists(&username);
    Ok(Json(StatusResponse { username, active }))
}

async fn handle_delete(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<UsernameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = required("username", body.username)?;
    check_key(&username)?;
    state.clients.invalidate(&username);
    if !state.sessions.delete(&username)? {
        return Err(session_not_found(&username));
    }
    info!("Deleted session for {}", username);
    Ok(MessageResponse::new("Session deleted"))
}

async fn handle_login_session(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<ImportSessionRequest>,
) -> Result<Json<ImportSessionResponse>, ApiError> {
    let username = required("username", body.username)?;
    let blob = body
        .session
        .ok_or_else(|| ApiError::BadRequest("'session' is required".to_string()))?;
    check_key(&username)?;
    let record = SessionRecord::from_import(&username, blob)
        .ok_or_else(|| ApiError::BadRequest("'session' must be a JSON object".to_string()))?;

    state.sessions.save(&record)?;
    state.clients.invalidate(&username);
    info!("Imported session for {}", username);

    if !body.validate.unwrap_or(false) {
        return Ok(Json(ImportSessionResponse {
            message: "Session imported".to_string(),
            logged_in_user: None,
        }));
    }

    let validated = async {
        let client = state.remote(state.platform.restore(&record)).await?;
        let user = state.remote(client.current_user()).await?;
        Ok::<_, RemoteError>((client, user))
    }
    .await;

    match validated {
        Ok((client, mut user)) => {
            state.clients.insert(&username, client);
            user.pk = None;
            Ok(Json(ImportSessionResponse {
                message: "Session imported and validated".to_string(),
                logged_in_user: Some(user),
            }))
        }
        Err(e) => {
            warn!("Imported session for {} failed validation: {}", username, e);
            Err(ApiError::upstream(e, StatusCode::BAD_REQUEST))
        }
    }
}

// ====== Handlers: posts ======

#[derive(Debug, Clone, Copy)]
enum PostKind {
    PhotoFeed,
    PhotoStory,
    Video(VideoTarget),
}

impl PostKind {
    fn message(&self) -> &'static str {
        match self {
            PostKind::PhotoFeed => "Photo published",
            PostKind::PhotoStory => "Story published",
            PostKind::Video(VideoTarget::Feed) => "Video published",
            PostKind::Video(VideoTarget::Story) => "Video story published",
            PostKind::Video(VideoTarget::Reel) => "Reel published",
        }
    }
}

async fn publish(
    state: &AppState,
    body: PostRequest,
    kind: PostKind,
) -> Result<Json<PublishResponse>, ApiError> {
    let username = required("username", body.username)?;
    let source = MediaSource::from_fields(body.base64.as_deref(), body.url.as_deref())?;
    let client = state.client_for(&username).await?;
    let payload = state.media.fetch(&source).await?;
    let caption = body.caption.unwrap_or_default();

    let media = match kind {
        PostKind::PhotoFeed => state.remote(client.publish_photo(&payload, &caption)).await,
        PostKind::PhotoStory => state.remote(client.publish_photo_story(&payload)).await,
        PostKind::Video(target) => {
            state
                .remote(client.publish_video(&payload, &caption, target))
                .await
        }
    }
    .inspect_err(|e| warn!("Publish {:?} failed for {}: {}", kind, username, e))?;

    info!("{:?} published for {} ({})", kind, username, media.id);
    Ok(Json(PublishResponse {
        message: kind.message().to_string(),
        media,
    }))
}

async fn handle_photo_feed(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<PostRequest>,
) -> Result<Json<PublishResponse>, ApiError> {
    publish(&state, body, PostKind::PhotoFeed).await
}

async fn handle_photo_story(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<PostRequest>,
) -> Result<Json<PublishResponse>, ApiError> {
    publish(&state, body, PostKind::PhotoStory).await
}

async fn handle_video_feed(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<PostRequest>,
) -> Result<Json<PublishResponse>, ApiError> {
    publish(&state, body, PostKind::Video(VideoTarget::Feed)).await
}

async fn handle_video_story(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<PostRequest>,
) -> Result<Json<PublishResponse>, ApiError> {
    publish(&state, body, PostKind::Video(VideoTarget::Story)).await
}

async fn handle_video_reels(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<PostRequest>,
) -> Result<Json<PublishResponse>, ApiError> {
    publish(&state, body, PostKind::Video(VideoTarget::Reel)).await
}

// ====== Handlers: direct messages ======

async fn handle_dm_send(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<SendMessageRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let username = required("username", body.username)?;
    let to_username = required("toUsername", body.to_username)?;
    let text = required_raw("message", body.message)?;

    let client = state.client_for(&username).await?;
    let thread_id = state
        .remote(client.send_text_message(&to_username, &text))
        .await?;

    info!("Message sent from {} to {}", username, to_username);
    Ok(Json(SendResponse {
        message: "Message sent".to_string(),
        thread_id,
    }))
}

async fn handle_dm_send_photo(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<SendPhotoRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let username = required("username", body.username)?;
    let to_username = required("toUsername", body.to_username)?;
    let source = MediaSource::from_fields(body.base64.as_deref(), body.url.as_deref())?;

    let client = state.client_for(&username).await?;
    let image = state.media.fetch(&source).await?;
    let thread_id = state
        .remote(client.send_photo_message(&to_username, &image))
        .await?;

    info!("Photo sent from {} to {}", username, to_username);
    Ok(Json(SendResponse {
        message: "Photo sent".to_string(),
        thread_id,
    }))
}

async fn handle_dm_inbox(
    State(state): State<Arc<AppState>>,
    ValidQuery(query): ValidQuery<UsernameQuery>,
) -> Result<Json<Vec<ThreadSummary>>, ApiError> {
    let username = required("username", query.username)?;
    let client = state.client_for(&username).await?;
    let threads = state.remote(client.list_threads()).await?;
    Ok(Json(threads))
}

async fn handle_dm_thread(
    State(state): State<Arc<AppState>>,
    ValidPath(thread_id): ValidPath<String>,
    ValidQuery(query): ValidQuery<UsernameQuery>,
) -> Result<Json<ThreadMessages>, ApiError> {
    let username = required("username", query.username)?;
    let thread_id = required("thread_id", Some(thread_id))?;
    let client = state.client_for(&username).await?;
    let messages = state.remote(client.thread_messages(&thread_id)).await?;
    Ok(Json(messages))
}

// ====== Handlers: profile & stories ======

async fn handle_profile(
    State(state): State<Arc<AppState>>,
    ValidPath(target_username): ValidPath<String>,
    ValidQuery(query): ValidQuery<UsernameQuery>,
) -> Result<Json<Profile>, ApiError> {
    let username = required("username", query.username)?;
    let target_username = required("targetUsername", Some(target_username))?;
    let client = state.client_for(&username).await?;
    let profile = state.remote(client.get_profile(&target_username)).await?;
    Ok(Json(profile))
}

async fn handle_update_bio(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<UpdateBioRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = required("username", body.username)?;
    let bio = body.bio.filter(|b| !b.trim().is_empty());
    let picture = MediaSource::optional(body.base64.as_deref(), body.url.as_deref());
    if bio.is_none() && picture.is_none() {
        return Err(ApiError::BadRequest(
            "Provide 'bio', 'url' or 'base64'".to_string(),
        ));
    }

    let client = state.client_for(&username).await?;
    let image = match &picture {
        Some(source) => Some(state.media.fetch(source).await?),
        None => None,
    };

    if let Some(bio) = &bio {
        state.remote(client.set_biography(bio)).await?;
    }
    if let Some(image) = &image {
        state.remote(client.change_profile_picture(image)).await?;
    }

    info!("Profile updated for {}", username);
    Ok(MessageResponse::new("Profile updated"))
}

async fn handle_stories(
    State(state): State<Arc<AppState>>,
    ValidQuery(query): ValidQuery<StoriesQuery>,
) -> Result<Json<Vec<StoryItem>>, ApiError> {
    let username = required("username", query.username)?;
    let target_username = required("targetUsername", query.target_username)?;
    let client = state.client_for(&username).await?;
    let stories = state.remote(client.list_stories(&target_username)).await?;
    Ok(Json(stories))
}

// ====== Server ======

/// Start the HTTP server and run until Ctrl-C.
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_mapping() {
        let err: ApiError = RemoteError::NotFound("user x not found".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "RESOURCE_NOT_FOUND");

        let err: ApiError = RemoteError::LoginRequired("expired".into()).into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "LOGIN_REQUIRED");

        let err: ApiError = RemoteError::Api {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "UPSTREAM_ERROR");
    }

    #[test]
    fn test_login_failure_status() {
        let err = ApiError::login_failure(RemoteError::ChallengeRequired("checkpoint".into()));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "CHALLENGE_REQUIRED");

        let err = ApiError::login_failure(RemoteError::RateLimited("wait".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = ApiError::login_failure(RemoteError::NotFound("no such user".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_session_and_auth_error_mapping() {
        let err: ApiError = SessionError::InvalidKey("../x".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = AuthError::Missing.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "UNAUTHORIZED_ERROR");

        let err: ApiError = AuthError::Invalid.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "FORBIDDEN_ERROR");
    }

    #[test]
    fn test_required_fields() {
        assert_eq!(required("username", Some(" alice ".into())).unwrap(), "alice");
        assert!(required("username", Some("   ".into())).is_err());
        assert!(required("username", None).is_err());
        assert_eq!(required_raw("password", Some(" p ".into())).unwrap(), " p ");
    }

    #[tokio::test]
    async fn test_internal_error_body_is_generic() {
        let resp = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "Internal Server Error");
        assert_eq!(body.code, "INTERNAL_SERVER_ERROR");
        assert_eq!(body.message, "An unexpected error occurred.");
        assert!(body.timestamp > 0);
    }
}
