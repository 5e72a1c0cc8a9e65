use async_trait::async_trait;
use sqlx::PgPool;

use crate::users::errors::StoreError;
use crate::users::repo_types::{NewUser, User};

/// Row-level access to the `users` table.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    /// Rows whose name or email contains `term`; no filter when `term` is empty.
    async fn search(&self, term: &str, limit: i64, offset: i64) -> Result<Vec<User>, StoreError>;
    /// Rows matching `term` with the filter always applied.
    async fn count_matching(&self, term: &str) -> Result<i64, StoreError>;
    async fn email_exists(&self, email: &str) -> Result<bool, StoreError>;
    async fn insert(&self, user: &NewUser) -> Result<i64, StoreError>;
    /// Returns the number of rows affected.
    async fn update(&self, id: i64, user: &NewUser) -> Result<u64, StoreError>;
    async fn delete(&self, id: i64) -> Result<u64, StoreError>;
}

/// Escapes LIKE wildcards so `term` matches as a literal substring.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, birth_date, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::classify)
    }

    async fn search(&self, term: &str, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let rows = if term.is_empty() {
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, name, email, phone, birth_date, created_at
                FROM users
                ORDER BY id
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
        } else {
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, name, email, phone, birth_date, created_at
                FROM users
                WHERE name ILIKE $1 ESCAPE '\' OR email ILIKE $1 ESCAPE '\'
                ORDER BY id
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(contains_pattern(term))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
        };
        rows.map_err(StoreError::classify)
    }

    async fn count_matching(&self, term: &str) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM users
            WHERE name ILIKE $1 ESCAPE '\' OR email ILIKE $1 ESCAPE '\'
            "#,
        )
        .bind(contains_pattern(term))
        .fetch_one(&self.db)
        .await
        .map_err(StoreError::classify)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(r#"SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)"#)
            .bind(email)
            .fetch_one(&self.db)
            .await
            .map_err(StoreError::classify)
    }

    async fn insert(&self, user: &NewUser) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (name, email, phone, birth_date)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.birth_date)
        .fetch_one(&self.db)
        .await
        .map_err(StoreError::classify)
    }

    async fn update(&self, id: i64, user: &NewUser) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET name = $2,
                   email = $3,
                   phone = $4,
                   birth_date = $5
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.birth_date)
        .execute(&self.db)
        .await
        .map_err(StoreError::classify)?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(StoreError::classify)?;
        Ok(result.rows_affected())
    }
}
