use std::sync::Arc;

use time::macros::format_description;
use tracing::{debug, info, instrument, warn};

use crate::users::errors::UserError;
use crate::users::repo_types::User;
use crate::users::store::UserStore;
use crate::users::validation::{validated, UserRecord};

/// Validation, uniqueness and pagination rules on top of a `UserStore`.
#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn UserStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, UserError> {
        Ok(self.store.find_by_id(id).await?)
    }

    #[instrument(skip(self))]
    pub async fn search(&self, term: &str, page: i64, page_size: i64) -> Result<Vec<User>, UserError> {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let term = term.trim();
        let offset = (page - 1).saturating_mul(page_size);

        let users = self.store.search(term, page_size, offset).await?;
        debug!(found = users.len(), offset, "user search");
        Ok(users)
    }

    /// Count of users matching `term`. The filter is applied even when `term`
    /// is empty, where it matches every row.
    pub async fn count_total(&self, term: &str) -> Result<i64, UserError> {
        Ok(self.store.count_matching(term.trim()).await?)
    }

    pub async fn total_pages(&self, page_size: i64, term: &str) -> Result<i64, UserError> {
        let page_size = page_size.max(1);
        let total = self.count_total(term).await?;
        Ok(total / page_size + i64::from(total % page_size != 0))
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, UserError> {
        Ok(self.store.email_exists(email).await?)
    }

    /// Validates and inserts a new user, returning its id.
    ///
    /// The existence check is only a fast path; the unique constraint on
    /// `email` is what actually rejects concurrent duplicates.
    #[instrument(skip(self, candidate))]
    pub async fn create(&self, candidate: UserRecord) -> Result<i64, UserError> {
        if let Some(email) = candidate.email.as_deref().map(str::trim) {
            if !email.is_empty() && self.email_exists(email).await? {
                warn!(%email, "email already registered");
                return Err(UserError::DuplicateEmail);
            }
        }

        let new_user = validated(&candidate).map_err(|errors| {
            warn!(%errors, "user rejected by validation");
            UserError::ValidationFailed(errors)
        })?;

        let id = self.store.insert(&new_user).await?;
        info!(user_id = id, email = %new_user.email, "user created");
        Ok(id)
    }

    /// Re-validates the candidate merged over the stored row and writes it.
    ///
    /// Optional fields left unset (`None`) keep their stored value; an empty
    /// string clears them.
    #[instrument(skip(self, candidate))]
    pub async fn update(&self, id: i64, candidate: UserRecord) -> Result<(), UserError> {
        let existing = self.find_by_id(id).await?.ok_or(UserError::NotFound)?;

        let merged = UserRecord {
            phone: candidate.phone.or(existing.phone),
            birth_date: candidate
                .birth_date
                .or_else(|| existing.birth_date.and_then(iso_date)),
            ..candidate
        };

        let changes = validated(&merged).map_err(|errors| {
            warn!(user_id = id, %errors, "update rejected by validation");
            UserError::ValidationFailed(errors)
        })?;

        let affected = self.store.update(id, &changes).await?;
        if affected == 0 {
            warn!(user_id = id, "update affected no rows");
            return Err(UserError::UpdateFailed);
        }
        info!(user_id = id, "user updated");
        Ok(())
    }

    /// Hard delete; `false` when no row had this id.
    pub async fn delete(&self, id: i64) -> Result<bool, UserError> {
        let removed = self.store.delete(id).await? > 0;
        if removed {
            info!(user_id = id, "user deleted");
        }
        Ok(removed)
    }
}

fn iso_date(date: time::Date) -> Option<String> {
    date.format(format_description!("[year]-[month]-[day]")).ok()
}
