use async_trait::async_trait;
use flyblue_core::models::{NewUser, User};
use flyblue_core::repository::IdentityRepository;
use flyblue_core::{CoreError, CoreResult};
use flyblue_shared::Masked;

use crate::session::{db_error, PgSession};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    role: String,
}

impl TryFrom<UserRow> for User {
    type Error = CoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: Masked(row.email),
            password_hash: Masked(row.password_hash),
            role: row.role.parse().map_err(|_| CoreError::Storage(format!("user {} has role '{}'", row.id, row.role)))?,
        })
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role";

#[async_trait]
impl IdentityRepository for PgSession {
    async fn find_user(&mut self, id: i64) -> CoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;

        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&mut self, email: &str) -> CoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;

        row.map(User::try_from).transpose()
    }

    async fn insert_user(&mut self, user: &NewUser) -> CoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.name)
        .bind(user.email.expose())
        .bind(user.password_hash.expose())
        .bind(user.role.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)?;

        User::try_from(row)
    }
}
