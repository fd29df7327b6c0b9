//! User persistence and password authentication.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use tracing::{debug, instrument};

use ovl_auth::storage::UserStore;
use ovl_auth::{RecordMeta, StoreError, StoreResult, User};

use crate::{PostgresAuthStore, map_db_err};

type UserRow = (
    String,                  // id
    bool,                    // active
    String,                  // name
    String,                  // username
    String,                  // password_hash
    OffsetDateTime,          // created_at
    OffsetDateTime,          // updated_at
    Option<OffsetDateTime>,  // deleted_at
);

const USER_COLUMNS: &str = "id, active, name, username, password_hash, \
                            created_at, updated_at, deleted_at";

fn user_from_row(row: UserRow) -> User {
    let (id, active, name, username, password_hash, created_at, updated_at, deleted_at) = row;
    User {
        id,
        active,
        name,
        username,
        password_hash,
        meta: RecordMeta {
            created_at,
            updated_at,
            deleted_at,
        },
    }
}

impl PostgresAuthStore {
    pub(crate) async fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let row: Option<UserRow> = query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_db_err)?;
        Ok(row.map(user_from_row))
    }
}

#[async_trait]
impl UserStore for PostgresAuthStore {
    #[instrument(skip(self))]
    async fn get_user(&self, id: &str) -> StoreResult<User> {
        self.find_user(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("User '{id}'")))
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        user.validate()?;

        query(
            r#"
            INSERT INTO users (id, active, name, username, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            ON CONFLICT (username) DO UPDATE SET
                active = EXCLUDED.active,
                name = EXCLUDED.name,
                password_hash = EXCLUDED.password_hash,
                updated_at = NOW()
            "#,
        )
        .bind(&user.id)
        .bind(user.active)
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.password_hash)
        .execute(self.pool())
        .await
        .map_err(map_db_err)?;

        debug!(username = %user.username, "User upserted");
        Ok(())
    }

    #[instrument(skip(self, secret))]
    async fn authenticate(&self, username: &str, secret: &str) -> StoreResult<User> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND deleted_at IS NULL");
        let row: Option<UserRow> = query_as(&sql)
            .bind(username)
            .fetch_optional(self.pool())
            .await
            .map_err(map_db_err)?;

        match row.map(user_from_row) {
            Some(user) if user.active && user.verify_password(secret) => Ok(user),
            _ => Err(StoreError::not_found(format!("User '{username}'"))),
        }
    }
}
