use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::ItemId,
    error::{ApiError, ErrorCode},
    protocol::{
        AccessToken, Container, Item, MoveItemRequest, Page, TokenObtainRequest, TokenPair,
        TokenRefreshRequest, User,
    },
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;
mod storage;
mod token;

use api::ApiContext;
use app_state::AppState;
use config::load_settings;
use storage::Storage;

type ApiRejection = (StatusCode, Json<ApiError>);

const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let api = ApiContext {
        storage: Storage::demo().await,
        tokens: settings.token_config(),
    };
    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.server_bind))?;
    info!(%addr, "board server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/token/", post(obtain_token))
        .route("/api/token/refresh/", post(refresh_token))
        .route("/api/users/me/", get(current_user))
        .route("/api/tasks/", get(http_list_tasks))
        .route("/api/tasks/columns/", get(http_list_columns))
        .route("/api/tasks/:task_id/move/", post(http_move_task))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn obtain_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TokenObtainRequest>,
) -> Result<Json<TokenPair>, ApiRejection> {
    let pair = api::obtain_tokens(&state.api, &req.email, &req.password)
        .await
        .map_err(|e| {
            warn!(login = %req.email, "login rejected");
            rejection(e)
        })?;
    Ok(Json(pair))
}

async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TokenRefreshRequest>,
) -> Result<Json<AccessToken>, ApiRejection> {
    let access = api::refresh_access(&state.api, &req.refresh)
        .await
        .map_err(rejection)?;
    Ok(Json(access))
}

async fn current_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiRejection> {
    let user = authorize(&state, &headers).await?;
    Ok(Json(user))
}

async fn http_list_tasks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Page<Item>>, ApiRejection> {
    authorize(&state, &headers).await?;
    Ok(Json(api::list_tasks(&state.api).await))
}

async fn http_list_columns(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Page<Container>>, ApiRejection> {
    authorize(&state, &headers).await?;
    Ok(Json(api::list_columns(&state.api).await))
}

async fn http_move_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<MoveItemRequest>,
) -> Result<Json<Item>, ApiRejection> {
    let user = authorize(&state, &headers).await?;
    let item = api::move_task(
        &state.api,
        user.id,
        ItemId(task_id),
        req.column_id.as_ref(),
        req.position,
    )
    .await
    .map_err(rejection)?;
    Ok(Json(item))
}

async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<User, ApiRejection> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            rejection(ApiError::unauthorized(
                "Authentication credentials were not provided.",
            ))
        })?;
    api::authenticate(&state.api, token)
        .await
        .map_err(rejection)
}

fn rejection(err: ApiError) -> ApiRejection {
    let status = match err.code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
