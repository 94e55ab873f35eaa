//! Eucalyptus user directory read from a JSON export.
//!
//! The export is a list of `{"username", "access_key", "secret_key"}` objects.
//! The directory is read-only; users are created on the Eucalyptus side.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::{AccountBackend, AccountError, BackendUser};

#[derive(Debug, Deserialize)]
struct ExportedUser {
    username: String,
    access_key: String,
    secret_key: String,
}

pub struct FileAccountDirectory {
    users: BTreeMap<String, BackendUser>,
}

impl FileAccountDirectory {
    pub fn from_json(raw: &str) -> Result<Self, AccountError> {
        let exported: Vec<ExportedUser> = serde_json::from_str(raw)?;
        let users = exported
            .into_iter()
            .map(|user| {
                (
                    user.username.clone(),
                    BackendUser {
                        username: user.username,
                        id: None,
                        access_key: Some(user.access_key),
                        secret_key: Some(user.secret_key),
                    },
                )
            })
            .collect();
        Ok(Self { users })
    }

    pub async fn load(path: &Path) -> Result<Self, AccountError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let directory = Self::from_json(&raw)?;
        tracing::info!(path = %path.display(), users = directory.len(), "Loaded Eucalyptus user export");
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl AccountBackend for FileAccountDirectory {
    fn name(&self) -> &'static str {
        "eucalyptus"
    }

    async fn get_user(&self, username: &str) -> Result<Option<BackendUser>, AccountError> {
        Ok(self.users.get(username).cloned())
    }

    async fn create_user(
        &self,
        username: &str,
        _password: &str,
        _admin_role: bool,
    ) -> Result<BackendUser, AccountError> {
        Err(AccountError::Backend(format!(
            "cannot create {username}: the Eucalyptus user export is read-only"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXPORT: &str = r#"[
        {"username": "esteve", "access_key": "AKIA1", "secret_key": "s1"},
        {"username": "jmatt", "access_key": "AKIA2", "secret_key": "s2"}
    ]"#;

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXPORT.as_bytes()).unwrap();

        let directory = FileAccountDirectory::load(file.path()).await.unwrap();
        assert_eq!(directory.len(), 2);

        let user = directory.get_user("jmatt").await.unwrap().unwrap();
        assert_eq!(user.access_key.as_deref(), Some("AKIA2"));
        assert_eq!(user.secret_key.as_deref(), Some("s2"));
        assert!(directory.get_user("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_is_rejected() {
        let directory = FileAccountDirectory::from_json("[]").unwrap();
        assert!(directory.is_empty());
        assert!(matches!(
            directory.create_user("x", "pw", false).await,
            Err(AccountError::Backend(_))
        ));
    }

    #[test]
    fn test_malformed_export() {
        assert!(matches!(
            FileAccountDirectory::from_json(r#"[{"username": "x"}]"#),
            Err(AccountError::Serialization(_))
        ));
    }
}
