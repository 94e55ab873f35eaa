//! OpenStack Identity (Keystone v3) account backend.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use url::Url;

use super::{AccountBackend, AccountError, BackendUser};

#[derive(Debug, Deserialize)]
struct KeystoneUser {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct UserList {
    users: Vec<KeystoneUser>,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: KeystoneUser,
}

#[derive(Debug, Deserialize)]
struct Project {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ProjectEnvelope {
    project: Project,
}

#[derive(Debug, Deserialize)]
struct ProjectList {
    projects: Vec<Project>,
}

#[derive(Debug, Deserialize)]
struct Role {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RoleList {
    roles: Vec<Role>,
}

/// Keystone v3 admin client authenticated with a static admin token
pub struct KeystoneAccounts {
    client: reqwest::Client,
    base_url: Url,
    admin_token: String,
    admin_role: String,
}

impl KeystoneAccounts {
    pub fn new(
        base_url: &str,
        admin_token: impl Into<String>,
        admin_role: impl Into<String>,
    ) -> Result<Self, AccountError> {
        // Keep a trailing slash so joins append instead of replacing the last segment
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| AccountError::Configuration(format!("invalid Keystone URL: {e}")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            admin_token: admin_token.into(),
            admin_role: admin_role.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AccountError> {
        self.base_url
            .join(path)
            .map_err(|e| AccountError::Configuration(format!("invalid Keystone path {path}: {e}")))
    }

    /// Map non-success responses onto [`AccountError`]
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AccountError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYLOAD_TOO_LARGE => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok());
                warn!(status = status.as_u16(), ?retry_after, "Keystone rate limited the request");
                Err(AccountError::RateLimited { retry_after })
            }
            StatusCode::UNAUTHORIZED => Err(AccountError::InvalidCredentials),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(AccountError::Backend(format!(
                    "Keystone returned {}: {}",
                    status, body
                )))
            }
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T, AccountError> {
        let response = self
            .client
            .get(url)
            .header("X-Auth-Token", &self.admin_token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: Url,
        body: serde_json::Value,
    ) -> Result<T, AccountError> {
        let response = self
            .client
            .post(url)
            .header("X-Auth-Token", &self.admin_token)
            .json(&body)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn find_or_create_project(&self, name: &str) -> Result<String, AccountError> {
        let mut url = self.endpoint("v3/projects")?;
        url.query_pairs_mut().append_pair("name", name);
        let existing: ProjectList = self.get_json(url).await?;
        if let Some(project) = existing.projects.into_iter().next() {
            return Ok(project.id);
        }

        let created: ProjectEnvelope = self
            .post_json(
                self.endpoint("v3/projects")?,
                json!({ "project": { "name": name, "enabled": true } }),
            )
            .await?;
        Ok(created.project.id)
    }

    async fn grant_role(&self, project_id: &str, user_id: &str) -> Result<(), AccountError> {
        let mut url = self.endpoint("v3/roles")?;
        url.query_pairs_mut().append_pair("name", &self.admin_role);
        let roles: RoleList = self.get_json(url).await?;
        let role = roles.roles.into_iter().next().ok_or_else(|| {
            AccountError::Backend(format!("Keystone has no role named {}", self.admin_role))
        })?;

        let url = self.endpoint(&format!(
            "v3/projects/{}/users/{}/roles/{}",
            project_id, user_id, role.id
        ))?;
        let response = self
            .client
            .put(url)
            .header("X-Auth-Token", &self.admin_token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl AccountBackend for KeystoneAccounts {
    fn name(&self) -> &'static str {
        "openstack"
    }

    async fn get_user(&self, username: &str) -> Result<Option<BackendUser>, AccountError> {
        let mut url = self.endpoint("v3/users")?;
        url.query_pairs_mut().append_pair("name", username);
        let list: UserList = self.get_json(url).await?;

        Ok(list
            .users
            .into_iter()
            .find(|user| user.name == username)
            .map(|user| BackendUser {
                username: user.name,
                id: Some(user.id),
                access_key: None,
                secret_key: None,
            }))
    }

    async fn create_user(
        &self,
        username: &str,
        password: &str,
        admin_role: bool,
    ) -> Result<BackendUser, AccountError> {
        let project_id = self.find_or_create_project(username).await?;
        let created: UserEnvelope = self
            .post_json(
                self.endpoint("v3/users")?,
                json!({
                    "user": {
                        "name": username,
                        "password": password,
                        "default_project_id": project_id,
                        "enabled": true
                    }
                }),
            )
            .await?;

        if admin_role {
            self.grant_role(&project_id, &created.user.id).await?;
        }

        info!(username, project_id = %project_id, admin_role, "Created Keystone user");
        Ok(BackendUser {
            username: created.user.name,
            id: Some(created.user.id),
            access_key: Some(username.to_string()),
            secret_key: Some(password.to_string()),
        })
    }
}
