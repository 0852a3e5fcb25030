use crate::api::error::AppError;
use crate::entities::{prelude::*, tokens};
use crate::utils::auth::{Claims, CurrentUser, validate_jwt};
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Deserialize;

#[derive(Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

/// Bearer header first, then `?token=`.
fn bearer_token(req: &Request) -> Option<String> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());

    header.or_else(|| {
        let query = req.uri().query().unwrap_or_default();
        serde_urlencoded::from_str::<AuthQuery>(query)
            .ok()
            .and_then(|q| q.token)
    })
}

/// Resolves a token to its caller. `Ok(None)` for anything invalid, revoked
/// or belonging to a deleted user.
async fn resolve(state: &AppState, token: &str) -> Result<Option<(Claims, CurrentUser)>, AppError> {
    let Ok(claims) = validate_jwt(token, &state.config.jwt_secret) else {
        return Ok(None);
    };

    let live = Tokens::find()
        .filter(tokens::Column::Jti.eq(&claims.jti))
        .one(&state.db)
        .await?
        .is_some();
    if !live {
        return Ok(None);
    }

    let Some(user) = Users::find_by_id(claims.sub.clone()).one(&state.db).await? else {
        return Ok(None);
    };

    let current = CurrentUser {
        id: user.id,
        username: user.username,
        is_staff: user.is_staff,
    };
    Ok(Some((claims, current)))
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let (claims, user) = resolve(&state, &token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Like [`auth_middleware`] but lets anonymous requests through.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = bearer_token(&req) {
        if let Some((claims, user)) = resolve(&state, &token).await? {
            req.extensions_mut().insert(claims);
            req.extensions_mut().insert(user);
        }
    }
    Ok(next.run(req).await)
}

/// Must run after [`auth_middleware`].
pub async fn staff_middleware(req: Request, next: Next) -> Result<Response, AppError> {
    let is_staff = req
        .extensions()
        .get::<CurrentUser>()
        .map(|u| u.is_staff)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    if !is_staff {
        return Err(AppError::Forbidden("Staff only".to_string()));
    }
    Ok(next.run(req).await)
}
