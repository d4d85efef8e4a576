use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use flyblue_core::identity::CredentialService;
use flyblue_core::models::{Role, User};
use flyblue_core::{CoreError, CoreResult};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, middleware::user_auth_middleware, state::AppState};

// ============================================================================
// JWT Credentials
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserClaims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// HS256 tokens signed with the configured secret.
pub struct JwtCredentials {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtCredentials {
    /// Fails on a zero lifetime or one too large to represent.
    pub fn new(secret: &str, expiration_seconds: u64) -> CoreResult<Self> {
        let ttl = i64::try_from(expiration_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .filter(|ttl| *ttl > Duration::zero())
            .ok_or_else(|| {
                CoreError::ValidationError(format!("jwt expiration of {} seconds is out of range", expiration_seconds))
            })?;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }
}

impl CredentialService for JwtCredentials {
    fn issue(&self, user: &User) -> CoreResult<String> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| CoreError::Internal("token expiry is past the representable date range".into()))?;
        let claims = UserClaims {
            sub: user.id.to_string(),
            role: user.role,
            iat: now.timestamp(),
            exp: expires.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| CoreError::Internal(format!("Token encoding failed: {}", e)))
    }

    fn verify(&self, token: &str) -> CoreResult<String> {
        decode::<UserClaims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims.sub)
            .map_err(|e| CoreError::Unauthorized(format!("invalid token: {}", e)))
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email.into_inner(),
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user: UserResponse,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/login", post(login))
        .route(
            "/v1/auth/me",
            get(me).route_layer(middleware::from_fn_with_state(state, user_auth_middleware)),
        )
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = state.service.register(&req.name, &req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Result<Json<AuthResponse>, AppError> {
    let outcome = state.service.login(&req.email, &req.password).await?;
    Ok(Json(AuthResponse {
        token: outcome.token,
        user: outcome.user.into(),
    }))
}

async fn me(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(user.into())
}
