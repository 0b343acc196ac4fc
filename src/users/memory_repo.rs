use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::users::error::{UserError, UserResult};
use crate::users::repo::UserStore;
use crate::users::repo_types::{NewUserRow, SortDirection, User, UserChangesRow, UserFilter};

#[derive(Debug, Default)]
struct Inner {
    rows: BTreeMap<i64, User>,
    last_id: i64,
}

/// In-memory store for development and tests. Ids come from a counter that
/// never goes backwards, so deleted ids are not handed out again.
#[derive(Debug, Default, Clone)]
pub struct MemoryUserStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list(&self, filter: &UserFilter) -> UserResult<(Vec<User>, i64)> {
        let inner = self.inner.read().await;
        let needle = filter.search.as_deref().map(str::to_lowercase);

        let mut matched: Vec<&User> = inner
            .rows
            .values()
            .filter(|u| match &needle {
                Some(n) => u.name.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .collect();

        matched.sort_by_cached_key(|u| (u.name.to_lowercase(), u.name.clone(), u.id));
        if filter.sort == SortDirection::Desc {
            matched.reverse();
        }

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn find(&self, id: i64) -> UserResult<Option<User>> {
        Ok(self.inner.read().await.rows.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.rows.values().find(|u| u.email == email).cloned())
    }

    async fn insert(&self, row: NewUserRow) -> UserResult<User> {
        let mut inner = self.inner.write().await;
        if inner.rows.values().any(|u| u.email == row.email) {
            return Err(UserError::DuplicateEmail);
        }

        inner.last_id += 1;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: inner.last_id,
            name: row.name,
            email: row.email,
            password: row.password,
            ip: row.ip,
            comment: row.comment,
            created_at: now,
            updated_at: now,
        };
        inner.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: i64, changes: UserChangesRow) -> UserResult<Option<User>> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.rows.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(password) = changes.password {
            user.password = password;
        }
        if let Some(ip) = changes.ip {
            user.ip = ip;
        }
        if let Some(comment) = changes.comment {
            user.comment = comment;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: i64) -> UserResult<bool> {
        Ok(self.inner.write().await.rows.remove(&id).is_some())
    }
}
