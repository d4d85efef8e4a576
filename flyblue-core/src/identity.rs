use tracing::{info, warn};

use crate::models::{normalize_email, NewUser, Role, User};
use crate::repository::Session;
use crate::{CoreError, CoreResult};

/// One-way password hashing.
pub trait PasswordHasher: Send + Sync {
    /// Fails with `ValidationError` on an empty (or whitespace-only) password.
    fn hash(&self, password: &str) -> CoreResult<String>;

    fn verify(&self, password: &str, hash: &str) -> CoreResult<bool>;
}

pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> CoreResult<String> {
        let password = password.trim();
        if password.is_empty() {
            return Err(CoreError::ValidationError("password must not be empty".into()));
        }
        bcrypt::hash(password, self.cost).map_err(|e| CoreError::Internal(format!("password hashing failed: {}", e)))
    }

    fn verify(&self, password: &str, hash: &str) -> CoreResult<bool> {
        bcrypt::verify(password.trim(), hash)
            .map_err(|e| CoreError::Internal(format!("password verification failed: {}", e)))
    }
}

/// Issues and verifies opaque bearer credentials.
pub trait CredentialService: Send + Sync {
    fn issue(&self, user: &User) -> CoreResult<String>;

    /// Returns the embedded subject, or `Unauthorized` for a malformed,
    /// expired or forged credential.
    fn verify(&self, token: &str) -> CoreResult<String>;
}

/// Credentials of the form `static-{user_id}`, for tests and local tooling.
pub struct StaticCredentials;

impl CredentialService for StaticCredentials {
    fn issue(&self, user: &User) -> CoreResult<String> {
        Ok(format!("static-{}", user.id))
    }

    fn verify(&self, token: &str) -> CoreResult<String> {
        token
            .strip_prefix("static-")
            .map(str::to_string)
            .ok_or_else(|| CoreError::Unauthorized("invalid token".into()))
    }
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub token: String,
}

/// Self-registration. The role is always `user`.
pub async fn register(
    session: &mut dyn Session,
    hasher: &dyn PasswordHasher,
    name: &str,
    email: &str,
    password: &str,
) -> CoreResult<User> {
    let email = normalize_email(email)?;
    if session.find_user_by_email(&email).await?.is_some() {
        return Err(CoreError::Conflict("email already registered".into()));
    }

    let hash = hasher.hash(password)?;
    let user = session.insert_user(&NewUser::new(name, &email, hash, Role::User)?).await?;

    info!(user_id = user.id, "User registered");
    Ok(user)
}

pub async fn login(
    session: &mut dyn Session,
    hasher: &dyn PasswordHasher,
    credentials: &dyn CredentialService,
    email: &str,
    password: &str,
) -> CoreResult<LoginOutcome> {
    let email = normalize_email(email)?;
    let user = session
        .find_user_by_email(&email)
        .await?
        .ok_or(CoreError::NotFound("user"))?;

    if !hasher.verify(password, user.password_hash.expose())? {
        return Err(CoreError::Unauthorized("incorrect password".into()));
    }

    let token = credentials.issue(&user)?;
    info!(user_id = user.id, "User logged in");
    Ok(LoginOutcome { user, token })
}

/// Creates the configured administrator unless the email is already taken.
pub async fn ensure_admin(
    session: &mut dyn Session,
    hasher: &dyn PasswordHasher,
    name: &str,
    email: &str,
    password: &str,
) -> CoreResult<User> {
    let email = normalize_email(email)?;
    if let Some(existing) = session.find_user_by_email(&email).await? {
        if existing.role != Role::Admin {
            warn!(user_id = existing.id, "Bootstrap admin email belongs to a non-admin user");
        }
        return Ok(existing);
    }

    let hash = hasher.hash(password)?;
    let admin = session.insert_user(&NewUser::new(name, &email, hash, Role::Admin)?).await?;
    info!(user_id = admin.id, "Bootstrap admin created");
    Ok(admin)
}
