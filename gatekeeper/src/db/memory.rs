//! In-process Account Store.
//!
//! Behaves like the PostgreSQL repository (ids assigned on insert, writes
//! visible only after commit, unique usernames and emails) and counts every
//! store call so tests can assert which paths touched the store.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::repository::{AccountRepository, AccountTransaction, duplicate_field};
use crate::auth::{
    AuthError, AuthResult, Credentials, NewUser, UniqueField, UserId, UserProfile,
};

#[derive(Debug, Clone)]
struct StoredUser {
    id: UserId,
    user: NewUser,
}

#[derive(Default)]
struct State {
    users: Vec<StoredUser>,
    next_id: UserId,
    commits: usize,
    rollbacks: usize,
}

impl State {
    fn collision(&self, username: &str, email: &str) -> Option<UniqueField> {
        let row = self
            .users
            .iter()
            .find(|u| u.user.username == username || u.user.email == email)?;
        if row.user.username == username {
            Some(UniqueField::Username)
        } else {
            Some(UniqueField::Email)
        }
    }
}

/// Account repository backed by a `Vec` behind a mutex
#[derive(Clone, Default)]
pub struct MemoryAccountRepository {
    state: Arc<Mutex<State>>,
    calls: Arc<AtomicUsize>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AuthResult<MutexGuard<'_, State>> {
        lock(&self.state)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of committed accounts
    pub fn user_count(&self) -> usize {
        self.lock().map(|s| s.users.len()).unwrap_or_default()
    }

    /// Number of repository calls made so far, transactions included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.lock().map(|s| s.commits).unwrap_or_default()
    }

    pub fn rollbacks(&self) -> usize {
        self.lock().map(|s| s.rollbacks).unwrap_or_default()
    }
}

fn lock(state: &Mutex<State>) -> AuthResult<MutexGuard<'_, State>> {
    state
        .lock()
        .map_err(|_| AuthError::StoreUnavailable("account store mutex poisoned".to_string()))
}

/// Transaction over [`MemoryAccountRepository`]; staged rows are applied on
/// commit and dropped otherwise.
pub struct MemoryAccountTransaction {
    state: Arc<Mutex<State>>,
    staged: Vec<StoredUser>,
}

#[async_trait]
impl AccountTransaction for MemoryAccountTransaction {
    async fn insert_user(&mut self, user: &NewUser) -> AuthResult<UserId> {
        let mut state = lock(&self.state)?;

        let staged_collision = self
            .staged
            .iter()
            .any(|s| s.user.username == user.username || s.user.email == user.email);
        if let Some(field) = state.collision(&user.username, &user.email) {
            return Err(duplicate_field(field).into());
        }
        if staged_collision {
            return Err(duplicate_field(UniqueField::Username).into());
        }

        state.next_id += 1;
        let id = state.next_id;
        self.staged.push(StoredUser {
            id,
            user: user.clone(),
        });
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> AuthResult<()> {
        let Self { state: shared, staged } = *self;
        let mut state = lock(&shared)?;
        state.users.extend(staged);
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AuthResult<()> {
        let mut state = lock(&self.state)?;
        state.rollbacks += 1;
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn begin(&self) -> AuthResult<Box<dyn AccountTransaction>> {
        self.record_call();
        Ok(Box::new(MemoryAccountTransaction {
            state: self.state.clone(),
            staged: Vec::new(),
        }))
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> AuthResult<Option<UniqueField>> {
        self.record_call();
        Ok(self.lock()?.collision(username, email))
    }

    async fn find_credentials_by_email(&self, email: &str) -> AuthResult<Option<Credentials>> {
        self.record_call();
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.user.email == email)
            .map(|u| Credentials {
                user_id: u.id,
                password_hash: u.user.password_hash.clone(),
            }))
    }

    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<UserProfile>> {
        self.record_call();
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| UserProfile {
                id: u.id,
                username: u.user.username.clone(),
                email: u.user.email.clone(),
                created_at: u.user.created_at,
                updated_at: u.user.updated_at,
            }))
    }

    async fn ping(&self) -> AuthResult<()> {
        Ok(())
    }
}
