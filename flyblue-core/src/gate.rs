use serde::Serialize;

use crate::identity::CredentialService;
use crate::models::{Role, User};
use crate::repository::Session;
use crate::{CoreError, CoreResult};

/// The authenticated identity an operation runs on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub id: i64,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Self-or-admin rule.
    pub fn can_act_for(&self, user_id: i64) -> bool {
        self.is_admin() || self.id == user_id
    }
}

impl From<&User> for Caller {
    fn from(user: &User) -> Self {
        Self { id: user.id, role: user.role }
    }
}

/// Resolves a bearer credential to the stored user.
pub async fn current_user(
    session: &mut dyn Session,
    credentials: &dyn CredentialService,
    token: &str,
) -> CoreResult<User> {
    let subject = credentials.verify(token)?;
    let user_id: i64 = subject
        .parse()
        .map_err(|_| CoreError::Unauthorized("invalid token subject".into()))?;

    session.find_user(user_id).await?.ok_or(CoreError::NotFound("user"))
}

pub fn require_user(user: &User) -> Caller {
    Caller::from(user)
}

pub fn require_admin(caller: &Caller) -> CoreResult<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(CoreError::Forbidden("administrator role required".into()))
    }
}
