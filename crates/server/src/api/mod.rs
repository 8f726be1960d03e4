use shared::{
    domain::{ContainerId, ItemId, UserId},
    error::{ApiError, ErrorCode},
    protocol::{AccessToken, Container, Item, Page, TokenPair, User},
};
use tracing::{debug, info};

use crate::{
    storage::{MoveError, Storage},
    token::{mint_pair, mint_token, verify_token, TokenConfig, TokenKind},
};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub tokens: TokenConfig,
}

pub async fn obtain_tokens(
    ctx: &ApiContext,
    login: &str,
    password: &str,
) -> Result<TokenPair, ApiError> {
    let user = ctx
        .storage
        .verify_login(login, password)
        .await
        .ok_or_else(|| {
            ApiError::unauthorized("No active account found with the given credentials")
        })?;
    let pair = mint_pair(&ctx.tokens, user.id).map_err(internal)?;
    info!(user_id = user.id.0, "issued token pair");
    Ok(pair)
}

pub async fn refresh_access(ctx: &ApiContext, refresh: &str) -> Result<AccessToken, ApiError> {
    let claims = verify_token(&ctx.tokens, refresh, TokenKind::Refresh)?;
    ensure_user(ctx, claims.user_id()).await?;
    let access = mint_token(&ctx.tokens, claims.user_id(), TokenKind::Access).map_err(internal)?;
    debug!(user_id = claims.user_id, "refreshed access token");
    Ok(AccessToken { access })
}

/// Resolves a bearer access token to the account it was issued for.
pub async fn authenticate(ctx: &ApiContext, access: &str) -> Result<User, ApiError> {
    let claims = verify_token(&ctx.tokens, access, TokenKind::Access)?;
    ensure_user(ctx, claims.user_id()).await
}

pub async fn list_tasks(ctx: &ApiContext) -> Page<Item> {
    into_page(ctx.storage.list_tasks().await)
}

pub async fn list_columns(ctx: &ApiContext) -> Page<Container> {
    into_page(ctx.storage.list_columns().await)
}

pub async fn move_task(
    ctx: &ApiContext,
    user_id: UserId,
    item: ItemId,
    column: Option<&ContainerId>,
    position: u32,
) -> Result<Item, ApiError> {
    let moved = ctx
        .storage
        .move_task(item, column, position)
        .await
        .map_err(|err| match err {
            MoveError::TaskNotFound(_) => ApiError::not_found("Not found."),
            MoveError::ColumnNotFound(_) => ApiError::not_found("Column not found"),
        })?;
    info!(
        user_id = user_id.0,
        item = item.0,
        column = ?column,
        position,
        "task moved"
    );
    Ok(moved)
}

async fn ensure_user(ctx: &ApiContext, user_id: UserId) -> Result<User, ApiError> {
    ctx.storage
        .user(user_id)
        .await
        .ok_or_else(|| ApiError::unauthorized("User not found"))
}

fn into_page<T>(results: Vec<T>) -> Page<T> {
    Page {
        count: results.len() as u64,
        next: None,
        previous: None,
        results,
    }
}

fn internal(err: impl std::fmt::Display) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
