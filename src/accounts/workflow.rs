//! The account import workflow.
//!
//! Every step is a lookup-or-create, so re-running the import for the same
//! usernames leaves the database unchanged.

use std::future::Future;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{AccountBackend, AccountError, hashpass};
use crate::config::{ProvisioningConfig, QuotaDefaults};
use crate::models::identity;
use crate::repositories::{
    GroupRepository, IdentityRepository, NewProviderKey, ProviderKeyRepository, QuotaRepository,
    UserRepository,
};
use crate::seeds::{EUCALYPTUS_SLUG, OPENSTACK_SLUG};

/// Outcome for one username
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserReport {
    pub username: String,
    pub eucalyptus_identity: Option<Uuid>,
    pub openstack_identity: Option<Uuid>,
    /// Rows created for this user, across every table touched
    pub rows_created: u32,
    pub error: Option<String>,
}

impl UserReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvisioningReport {
    pub users: Vec<UserReport>,
}

impl ProvisioningReport {
    pub fn succeeded(&self) -> usize {
        self.users.iter().filter(|u| u.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.users.len() - self.succeeded()
    }

    pub fn rows_created(&self) -> u32 {
        self.users.iter().map(|u| u.rows_created).sum()
    }
}

pub struct ProvisioningWorkflow<'a> {
    db: &'a DatabaseConnection,
    config: &'a ProvisioningConfig,
    quota_defaults: &'a QuotaDefaults,
    eucalyptus: &'a dyn AccountBackend,
    openstack: &'a dyn AccountBackend,
    backoff: Duration,
}

impl<'a> ProvisioningWorkflow<'a> {
    pub fn new(
        db: &'a DatabaseConnection,
        config: &'a ProvisioningConfig,
        quota_defaults: &'a QuotaDefaults,
        eucalyptus: &'a dyn AccountBackend,
        openstack: &'a dyn AccountBackend,
    ) -> Self {
        Self {
            db,
            config,
            quota_defaults,
            eucalyptus,
            openstack,
            backoff: Duration::from_secs(config.rate_limit_backoff_seconds),
        }
    }

    /// Override the pause between rate-limited attempts
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Import `usernames`, or the configured core list when empty.
    ///
    /// A failure for one user is recorded in the report and the run moves on.
    pub async fn run(&self, usernames: &[String]) -> ProvisioningReport {
        let usernames = if usernames.is_empty() {
            self.config.core_usernames.as_slice()
        } else {
            usernames
        };

        let mut report = ProvisioningReport::default();
        for username in usernames {
            let mut user_report = UserReport {
                username: username.clone(),
                ..Default::default()
            };
            if let Err(err) = self.provision(username, &mut user_report).await {
                warn!(username = %username, error = %err, "Provisioning failed");
                user_report.error = Some(err.to_string());
            }
            report.users.push(user_report);
        }

        info!(
            total = report.users.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            rows_created = report.rows_created(),
            "Provisioning run finished"
        );
        report
    }

    async fn provision(&self, username: &str, report: &mut UserReport) -> Result<(), AccountError> {
        let (identity, created) = self.create_eucalyptus_account(username).await?;
        report.eucalyptus_identity = Some(identity.id);
        report.rows_created += created;

        let (identity, created) = self.create_openstack_account(username).await?;
        report.openstack_identity = Some(identity.id);
        report.rows_created += created;

        self.make_admin(username).await?;
        Ok(())
    }

    /// Run `step` until it stops reporting rate limiting or the attempt cap is hit
    async fn with_retry<T, F, Fut>(&self, step: &str, mut attempt: F) -> Result<T, AccountError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AccountError>>,
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match attempt().await {
                Err(err) if err.is_rate_limited() => {
                    if self
                        .config
                        .rate_limit_max_attempts
                        .is_some_and(|max| attempts >= max)
                    {
                        warn!(step, attempts, "Giving up after repeated rate limiting");
                        return Err(err);
                    }
                    info!(
                        step,
                        attempts,
                        backoff_secs = self.backoff.as_secs(),
                        "Requests are rate limited; pausing"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                other => return other,
            }
        }
    }

    async fn create_eucalyptus_account(
        &self,
        username: &str,
    ) -> Result<(identity::Model, u32), AccountError> {
        let user = self
            .with_retry("eucalyptus.get_user", || self.eucalyptus.get_user(username))
            .await?
            .ok_or_else(|| AccountError::UserNotFound {
                backend: self.eucalyptus.name(),
                username: username.to_string(),
            })?;

        let (access_key, secret_key) = match (user.access_key, user.secret_key) {
            (Some(access), Some(secret)) => (access, secret),
            _ => {
                return Err(AccountError::Backend(format!(
                    "{} has no EC2 key pair in {}",
                    username,
                    self.eucalyptus.name()
                )));
            }
        };

        let mut created = self.ensure_provider_key(username, &access_key, &secret_key).await?;
        let (identity, identity_rows) = self
            .ensure_identity(
                EUCALYPTUS_SLUG,
                username,
                &[("key", access_key.as_str()), ("secret", secret_key.as_str())],
            )
            .await?;
        created += identity_rows;
        Ok((identity, created))
    }

    /// Zero keys: create one. One key: reuse it. Several: replace them with one.
    async fn ensure_provider_key(
        &self,
        username: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<u32, AccountError> {
        let keys = ProviderKeyRepository::new(self.db);
        let existing = keys.find_by_username(username).await?;

        match existing.len() {
            1 => return Ok(0),
            0 => {}
            count => {
                let removed = keys.delete_by_username(username).await?;
                warn!(username, count, removed, "Replacing duplicate EC2 keys");
            }
        }

        keys.create(NewProviderKey {
            username: username.to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            ec2_url: self.config.euca_ec2_url.clone(),
        })
        .await?;
        Ok(1)
    }

    async fn create_openstack_account(
        &self,
        username: &str,
    ) -> Result<(identity::Model, u32), AccountError> {
        if username == self.config.admin_username {
            let (key, secret, tenant) =
                self.config.openstack_admin_credentials().ok_or_else(|| {
                    AccountError::Configuration(
                        "OpenStack admin key, secret and tenant must be set".to_string(),
                    )
                })?;
            return self
                .ensure_identity(
                    OPENSTACK_SLUG,
                    username,
                    &[
                        ("key", key.as_str()),
                        ("secret", secret.as_str()),
                        ("ex_tenant_name", tenant.as_str()),
                    ],
                )
                .await;
        }

        let salt = self.config.password_salt.as_deref().ok_or_else(|| {
            AccountError::Configuration("password salt must be set".to_string())
        })?;

        let password = self
            .with_retry("openstack.create_account", || async {
                let password = hashpass(salt, username)?;
                if self.openstack.get_user(username).await?.is_none() {
                    self.openstack.create_user(username, &password, true).await?;
                }
                Ok::<_, AccountError>(password)
            })
            .await?;

        self.ensure_identity(
            OPENSTACK_SLUG,
            username,
            &[
                ("key", username),
                ("secret", password.as_str()),
                ("ex_tenant_name", username),
            ],
        )
        .await
    }

    /// User, per-user group, default quota, identity, credentials and memberships.
    /// Returns the identity and the number of rows created.
    async fn ensure_identity(
        &self,
        provider_slug: &str,
        username: &str,
        credentials: &[(&str, &str)],
    ) -> Result<(identity::Model, u32), AccountError> {
        let mut created = 0u32;
        let mut count = |was_created: bool| {
            if was_created {
                created += 1;
            }
        };

        let (user, new_user) = UserRepository::new(self.db).get_or_create(username).await?;
        count(new_user);

        let groups = GroupRepository::new(self.db);
        let (group, new_group) = groups.get_or_create(username).await?;
        count(new_group);
        groups.add_member(group.id, user.id, true).await?;

        let quota = QuotaRepository::new(self.db)
            .get_or_create_default(self.quota_defaults)
            .await?;

        let identities = IdentityRepository::new(self.db);
        let (identity, new_identity) = identities.get_or_create(provider_slug, user.id).await?;
        count(new_identity);

        for (key, value) in credentials {
            identities.set_credential(identity.id, key, value).await?;
        }

        let (_, new_membership) = identities
            .ensure_identity_membership(identity.id, group.id, quota.id)
            .await?;
        count(new_membership);
        let (_, new_provider_membership) = identities
            .ensure_provider_membership(provider_slug, group.id)
            .await?;
        count(new_provider_membership);

        if new_identity {
            info!(username, provider = provider_slug, identity_id = %identity.id, "Created identity");
        }
        Ok((identity, created))
    }

    async fn make_admin(&self, username: &str) -> Result<(), AccountError> {
        UserRepository::new(self.db).promote_admin(username).await?;
        Ok(())
    }
}
