use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::error;

use super::comments::{self, PostCommentRequest};
use super::geo::Coordinates;
use super::identity::IdentityProvider;
use super::issues::{self, IssueQuery};
use super::lifecycle::{self, TransitionRequest};
use super::models::{Actor, IssueSubmission};
use super::policy;
use super::registry::RegistryView;
use super::repository::IssueRepository;
use super::ws::{WsMessage, broadcast_message};
use crate::errors::CivicError;

pub const SESSION_COOKIE: &str = "civic_session";

const DEFAULT_LOGIN_REDIRECT: &str = "/dashboard/citizen";

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub repo: Arc<dyn IssueRepository>,
    pub identity: Arc<dyn IdentityProvider>,
    pub ws_tx: broadcast::Sender<String>,
    pub map_center: Coordinates,
}

pub type SharedState = Arc<AppState>;

// ── Request/response payload types ────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuthCallbackParams {
    pub code: Option<String>,
    pub next: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Serialize)]
pub struct RegistryResponse {
    #[serde(flatten)]
    pub registry: RegistryView,
    pub map_center: Coordinates,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

// ── Error handling ────────────────────────────────────────────────────

pub struct ApiError(pub CivicError);

impl From<CivicError> for ApiError {
    fn from(err: CivicError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CivicError::Unauthenticated => StatusCode::UNAUTHORIZED,
            CivicError::Forbidden { .. } => StatusCode::FORBIDDEN,
            CivicError::NotFound { .. } => StatusCode::NOT_FOUND,
            CivicError::Validation(_) | CivicError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            CivicError::Conflict { .. } => StatusCode::CONFLICT,
            CivicError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let CivicError::Upstream(e) = &self.0 {
            error!(error = ?e, "upstream failure");
        }
        let body = serde_json::json!({
            "error": self.0.to_string(),
            "kind": self.0.kind(),
        });
        (status, Json(body)).into_response()
    }
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError(CivicError::Validation(rejection.body_text()))
}

fn bad_query(rejection: QueryRejection) -> ApiError {
    ApiError(CivicError::Validation(rejection.body_text()))
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/issues", get(list_issues).post(create_issue))
        .route(
            "/api/issues/{id}",
            get(get_issue).patch(update_issue).delete(delete_issue),
        )
        .route("/api/comments", post(post_comment))
        .route("/api/registry", get(registry))
        .route("/api/stats", get(stats))
        .route("/api/me", get(me))
        .route("/api/auth/callback", get(auth_callback))
        .route("/health", get(health_check))
}

// ── Session helpers ───────────────────────────────────────────────────

/// Session token from `Authorization: Bearer` or the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

/// Resolve the calling actor. A missing or unknown token is `None`.
async fn current_actor(state: &AppState, headers: &HeaderMap) -> Result<Option<Actor>, ApiError> {
    match session_token(headers) {
        Some(token) => Ok(state
            .identity
            .current_actor(&token)
            .await
            .map_err(CivicError::from)?),
        None => Ok(None),
    }
}

/// Only same-site absolute paths that form a valid `Location` header are
/// honored as post-login destinations.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n)
            if n.starts_with('/')
                && !n.starts_with("//")
                && !n.contains('\\')
                && !n.chars().any(char::is_control)
                && HeaderValue::from_str(n).is_ok() =>
        {
            n
        }
        _ => DEFAULT_LOGIN_REDIRECT,
    }
}

fn auth_error_redirect(error: &str, description: Option<&str>) -> Redirect {
    let mut pairs = vec![("error", error)];
    if let Some(d) = description {
        pairs.push(("error_description", d));
    }
    let query = serde_urlencoded::to_string(&pairs).unwrap_or_default();
    Redirect::to(&format!("/auth/error?{}", query))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_issues(
    State(state): State<SharedState>,
    query: Result<Query<IssueQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(bad_query)?;
    let filter = query.into_filter()?;
    let issues = issues::list_issues(state.repo.as_ref(), filter).await?;
    Ok(Json(issues))
}

async fn create_issue(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<IssueSubmission>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current_actor(&state, &headers).await?;
    policy::require_actor(actor.as_ref())?;
    let Json(submission) = payload.map_err(bad_json)?;
    let issue = issues::create_issue(state.repo.as_ref(), actor.as_ref(), submission).await?;
    broadcast_message(
        &state.ws_tx,
        &WsMessage::IssueCreated {
            issue: issue.clone(),
        },
    );
    Ok((StatusCode::CREATED, Json(issue)))
}

async fn get_issue(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = issues::get_issue(state.repo.as_ref(), &id).await?;
    Ok(Json(detail))
}

async fn update_issue(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current_actor(&state, &headers).await?;
    policy::require_actor(actor.as_ref())?;
    let Json(request) = payload.map_err(bad_json)?;
    let issue = lifecycle::transition(state.repo.as_ref(), actor.as_ref(), &id, request).await?;
    broadcast_message(
        &state.ws_tx,
        &WsMessage::IssueUpdated {
            issue: issue.clone(),
        },
    );
    Ok(Json(issue))
}

async fn delete_issue(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current_actor(&state, &headers).await?;
    issues::delete_issue(state.repo.as_ref(), actor.as_ref(), &id).await?;
    broadcast_message(&state.ws_tx, &WsMessage::IssueDeleted { issue_id: id });
    Ok(Json(DeleteResponse { success: true }))
}

async fn post_comment(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<PostCommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current_actor(&state, &headers).await?;
    policy::require_actor(actor.as_ref())?;
    let Json(request) = payload.map_err(bad_json)?;
    let comment = comments::post_comment(
        state.repo.as_ref(),
        actor.as_ref(),
        &request.issue_id,
        &request.content,
    )
    .await?;
    broadcast_message(
        &state.ws_tx,
        &WsMessage::CommentPosted {
            comment: comment.clone(),
        },
    );
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn registry(State(state): State<SharedState>) -> Json<RegistryResponse> {
    Json(RegistryResponse {
        registry: RegistryView::build(),
        map_center: state.map_center,
    })
}

async fn stats(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let stats = issues::issue_stats(state.repo.as_ref()).await?;
    Ok(Json(stats))
}

async fn me(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let actor = current_actor(&state, &headers).await?;
    let actor = policy::require_actor(actor.as_ref())?;
    Ok(Json(actor.clone()))
}

async fn auth_callback(
    State(state): State<SharedState>,
    Query(params): Query<AuthCallbackParams>,
) -> Response {
    if let Some(err) = params.error.as_deref() {
        return auth_error_redirect(err, params.error_description.as_deref()).into_response();
    }
    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        return auth_error_redirect("invalid_request", None).into_response();
    };
    match state.identity.exchange_code(code).await {
        Ok(Some(token)) => {
            let cookie = Cookie::build((SESSION_COOKIE, token.0))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            let target = safe_next(params.next.as_deref());
            (
                [(header::SET_COOKIE, cookie.to_string())],
                Redirect::to(target),
            )
                .into_response()
        }
        Ok(None) => auth_error_redirect(
            "exchange_failed",
            Some("Auth code is invalid or has already been used"),
        )
        .into_response(),
        Err(e) => {
            error!(error = ?e, "auth code exchange failed");
            auth_error_redirect("exchange_failed", Some("Failed to exchange code for session"))
                .into_response()
        }
    }
}
