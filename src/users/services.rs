use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::users::dto::{ListUsersQuery, NewUser, PagedResult, UserChanges};
use crate::users::error::{UserError, UserResult};
use crate::users::password::hash_password;
use crate::users::repo::UserStore;
use crate::users::repo_types::{NewUserRow, User, UserChangesRow, UserFilter};

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self, query: ListUsersQuery) -> UserResult<PagedResult<User>> {
        let filter = UserFilter {
            offset: query.offset(),
            search: query.search,
            sort: query.sort,
            limit: query.per_page,
        };
        let (rows, total) = self.store.list(&filter).await?;
        Ok(PagedResult::new(rows, query.page, query.per_page, total))
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: i64) -> UserResult<User> {
        self.store.find(id).await?.ok_or(UserError::NotFound)
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: NewUser) -> UserResult<User> {
        if self.store.find_by_email(&input.email).await?.is_some() {
            warn!("email already registered");
            return Err(UserError::DuplicateEmail);
        }

        let row = NewUserRow {
            password: hash_password(&input.password)?,
            name: input.name,
            email: input.email,
            ip: input.ip,
            comment: input.comment,
        };
        let user = self.store.insert(row).await?;
        info!(user_id = user.id, "user created");
        Ok(user)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_user(&self, id: i64, changes: UserChanges) -> UserResult<User> {
        let password = match changes.password.as_deref() {
            Some(plain) => Some(hash_password(plain)?),
            None => None,
        };
        let row = UserChangesRow {
            name: changes.name,
            password,
            ip: changes.ip,
            comment: changes.comment,
        };
        let user = self
            .store
            .update(id, row)
            .await?
            .ok_or(UserError::NotFound)?;
        info!(user_id = user.id, "user updated");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: i64) -> UserResult<bool> {
        if !self.store.delete(id).await? {
            return Err(UserError::NotFound);
        }
        info!(user_id = id, "user deleted");
        Ok(true)
    }
}
