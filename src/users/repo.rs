use async_trait::async_trait;
use sqlx::PgPool;

use crate::users::error::{UserError, UserResult};
use crate::users::repo_types::{NewUserRow, User, UserChangesRow, UserFilter};

/// Persistence seam for users. Each method maps to a single statement.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// One page of users matching the filter, plus the total match count.
    async fn list(&self, filter: &UserFilter) -> UserResult<(Vec<User>, i64)>;

    async fn find(&self, id: i64) -> UserResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> UserResult<Option<User>>;

    /// Fails with `DuplicateEmail` if the email is taken.
    async fn insert(&self, row: NewUserRow) -> UserResult<User>;

    /// `None` when no row has this id.
    async fn update(&self, id: i64, changes: UserChangesRow) -> UserResult<Option<User>>;

    /// `false` when no row has this id.
    async fn delete(&self, id: i64) -> UserResult<bool>;
}

const USER_COLUMNS: &str = "id, name, email, password, ip, comment, created_at, updated_at";

/// Builds an ILIKE pattern matching `search` as a literal substring.
pub(crate) fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
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
    async fn list(&self, filter: &UserFilter) -> UserResult<(Vec<User>, i64)> {
        let pattern = filter.search.as_deref().map(like_pattern);
        let dir = filter.sort.as_sql();

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM users
            WHERE ($1::text IS NULL OR name ILIKE $1 ESCAPE '\')
            "#,
        )
        .bind(pattern.as_deref())
        .fetch_one(&self.db)
        .await?;

        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE ($1::text IS NULL OR name ILIKE $1 ESCAPE '\')
            ORDER BY lower(name) {dir}, name {dir}, id {dir}
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, User>(&sql)
            .bind(pattern.as_deref())
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.db)
            .await?;

        Ok((rows, total))
    }

    async fn find(&self, id: i64) -> UserResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn insert(&self, row: NewUserRow) -> UserResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (name, email, password, ip, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&row.name)
            .bind(&row.email)
            .bind(&row.password)
            .bind(row.ip.as_deref())
            .bind(row.comment.as_deref())
            .fetch_one(&self.db)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => UserError::DuplicateEmail,
                _ => UserError::Store(e),
            })
    }

    async fn update(&self, id: i64, changes: UserChangesRow) -> UserResult<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                password = COALESCE($3, password),
                ip = CASE WHEN $4 THEN $5 ELSE ip END,
                comment = CASE WHEN $6 THEN $7 ELSE comment END,
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.name.as_deref())
            .bind(changes.password.as_deref())
            .bind(changes.ip.is_some())
            .bind(changes.ip.flatten())
            .bind(changes.comment.is_some())
            .bind(changes.comment.flatten())
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn delete(&self, id: i64) -> UserResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use time::OffsetDateTime;

    use crate::users::repo_types::SortDirection;

    async fn pg_store() -> Option<PgUserStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("connect to DATABASE_URL");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("run migrations");
        Some(PgUserStore::new(pool))
    }

    fn row(tag: &str, name: &str, email: &str) -> NewUserRow {
        NewUserRow {
            name: format!("{tag} {name}"),
            email: format!("{tag}.{email}"),
            password: "$argon2id$fake".into(),
            ip: Some("10.0.0.1".into()),
            comment: Some("seeded".into()),
        }
    }

    #[test]
    fn like_pattern_wraps_and_escapes_wildcards() {
        assert_eq!(like_pattern("John"), "%John%");
        assert_eq!(like_pattern("50%_off"), r"%50\%\_off%");
        assert_eq!(like_pattern(r"a\b"), r"%a\\b%");
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
    async fn postgres_store_round_trip() {
        let Some(store) = pg_store().await else {
            return;
        };
        let tag = format!("pgt{}", OffsetDateTime::now_utc().unix_timestamp_nanos());

        let literal = store.insert(row(&tag, "50% off", "a@example.com")).await.unwrap();
        let loose = store.insert(row(&tag, "50 percent off", "b@example.com")).await.unwrap();
        let apple = store.insert(row(&tag, "Apple", "c@example.com")).await.unwrap();
        let banana = store.insert(row(&tag, "banana", "d@example.com")).await.unwrap();
        let ids = [literal.id, loose.id, apple.id, banana.id];

        let err = store
            .insert(row(&tag, "Copy", "a@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::DuplicateEmail));

        let (rows, total) = store
            .list(&UserFilter {
                search: Some(format!("{} 50%", tag.to_uppercase())),
                sort: SortDirection::Asc,
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, literal.id);

        let (rows, total) = store
            .list(&UserFilter {
                search: Some(tag.clone()),
                sort: SortDirection::Asc,
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(total, 4);
        let at = |id: i64| rows.iter().position(|u| u.id == id).unwrap();
        assert!(at(apple.id) < at(banana.id));

        let updated = store
            .update(
                apple.id,
                UserChangesRow {
                    ip: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .expect("row exists");
        assert_eq!(updated.ip, None);
        assert_eq!(updated.comment.as_deref(), Some("seeded"));
        assert_eq!(updated.name, apple.name);
        assert_eq!(updated.password, apple.password);

        let updated = store
            .update(
                apple.id,
                UserChangesRow {
                    comment: Some(Some("changed".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .expect("row exists");
        assert_eq!(updated.comment.as_deref(), Some("changed"));
        assert_eq!(updated.ip, None);

        for id in ids {
            assert!(store.delete(id).await.unwrap());
        }
        assert!(store.find(apple.id).await.unwrap().is_none());
    }
}
