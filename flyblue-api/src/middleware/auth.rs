use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use flyblue_core::gate::{self, Caller};
use flyblue_core::CoreError;

use crate::error::AppError;
use crate::state::AppState;

fn bearer_token(req: &Request) -> Result<String, AppError> {
    req.headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .ok_or_else(|| CoreError::Unauthorized("missing bearer token".into()).into())
}

// ============================================================================
// User Authentication Middleware
// ============================================================================

/// Resolves the bearer token to a stored user and injects both the `User`
/// and its `Caller` into request extensions.
pub async fn user_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)?;
    let user = state.service.authenticate(&token).await?;

    let caller = gate::require_user(&user);
    req.extensions_mut().insert(caller);
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)?;
    let user = state.service.authenticate(&token).await?;

    let caller = Caller::from(&user);
    gate::require_admin(&caller)?;
    req.extensions_mut().insert(caller);

    Ok(next.run(req).await)
}
