//! In-process account backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{AccountBackend, AccountError, BackendUser};

#[derive(Default)]
struct State {
    users: BTreeMap<String, BackendUser>,
    /// Remaining calls to answer with `RateLimited`
    rate_limited_calls: u32,
    calls: u32,
    created: Vec<String>,
}

/// Account backend held in memory. Clones share state.
#[derive(Clone)]
pub struct InMemoryAccounts {
    name: &'static str,
    state: Arc<Mutex<State>>,
}

impl InMemoryAccounts {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub async fn insert(&self, user: BackendUser) {
        self.state
            .lock()
            .await
            .users
            .insert(user.username.clone(), user);
    }

    /// Answer the next `count` calls with `RateLimited`
    pub async fn rate_limit_next(&self, count: u32) {
        self.state.lock().await.rate_limited_calls = count;
    }

    /// Total calls seen, including rate-limited ones
    pub async fn calls(&self) -> u32 {
        self.state.lock().await.calls
    }

    /// Usernames created through this backend, in order
    pub async fn created(&self) -> Vec<String> {
        self.state.lock().await.created.clone()
    }

    async fn enter(&self) -> Result<tokio::sync::MutexGuard<'_, State>, AccountError> {
        let mut state = self.state.lock().await;
        state.calls += 1;
        if state.rate_limited_calls > 0 {
            state.rate_limited_calls -= 1;
            return Err(AccountError::RateLimited { retry_after: None });
        }
        Ok(state)
    }
}

#[async_trait]
impl AccountBackend for InMemoryAccounts {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn get_user(&self, username: &str) -> Result<Option<BackendUser>, AccountError> {
        let state = self.enter().await?;
        Ok(state.users.get(username).cloned())
    }

    async fn create_user(
        &self,
        username: &str,
        password: &str,
        _admin_role: bool,
    ) -> Result<BackendUser, AccountError> {
        let mut state = self.enter().await?;
        if let Some(existing) = state.users.get(username) {
            return Ok(existing.clone());
        }
        let user = BackendUser {
            username: username.to_string(),
            id: Some(format!("user-{}", state.users.len() + 1)),
            access_key: Some(username.to_string()),
            secret_key: Some(password.to_string()),
        };
        state.users.insert(username.to_string(), user.clone());
        state.created.push(username.to_string());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limit_injection() {
        let backend = InMemoryAccounts::new("memory");
        backend.rate_limit_next(2).await;

        assert!(backend.get_user("a").await.unwrap_err().is_rate_limited());
        assert!(backend.get_user("a").await.unwrap_err().is_rate_limited());
        assert!(backend.get_user("a").await.unwrap().is_none());
        assert_eq!(backend.calls().await, 3);
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let backend = InMemoryAccounts::new("memory");
        let first = backend.create_user("mlent", "pw", false).await.unwrap();
        let second = backend.create_user("mlent", "other", false).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.created().await, vec!["mlent"]);
    }
}
