//! In-memory `UserStore` used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::users::errors::StoreError;
use crate::users::repo_types::{NewUser, User};
use crate::users::store::UserStore;

#[derive(Default)]
struct Inner {
    rows: Vec<User>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<Inner>,
    broken: bool,
    email_checks: AtomicUsize,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails like a lost database connection.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().rows.len()
    }

    /// Number of `email_exists` calls served so far.
    pub fn email_checks(&self) -> usize {
        self.email_checks.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.broken {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

fn matches(user: &User, term: &str) -> bool {
    let term = term.to_lowercase();
    user.name.to_lowercase().contains(&term) || user.email.to_lowercase().contains(&term)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().find(|u| u.id == id).cloned())
    }

    async fn search(&self, term: &str, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rows
            .iter()
            .filter(|u| term.is_empty() || matches(u, term))
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn count_matching(&self, term: &str) -> Result<i64, StoreError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().filter(|u| matches(u, term)).count() as i64)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        self.email_checks.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().any(|u| u.email == email))
    }

    async fn insert(&self, user: &NewUser) -> Result<i64, StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        if inner.rows.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        inner.next_id += 1;
        let id = inner.next_id;
        inner.rows.push(User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            birth_date: user.birth_date,
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(id)
    }

    async fn update(&self, id: i64, user: &NewUser) -> Result<u64, StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        if inner.rows.iter().any(|u| u.id != id && u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let Some(row) = inner.rows.iter_mut().find(|u| u.id == id) else {
            return Ok(0);
        };
        row.name = user.name.clone();
        row.email = user.email.clone();
        row.phone = user.phone.clone();
        row.birth_date = user.birth_date;
        Ok(1)
    }

    async fn delete(&self, id: i64) -> Result<u64, StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        let before = inner.rows.len();
        inner.rows.retain(|u| u.id != id);
        Ok((before - inner.rows.len()) as u64)
    }
}
