//! Tests for the account import workflow against in-memory backends

use std::time::Duration;

use anyhow::Result;
use atmosphere::accounts::{BackendUser, InMemoryAccounts, ProvisioningWorkflow, hashpass};
use atmosphere::config::{ProvisioningConfig, QuotaDefaults};
use atmosphere::repositories::{
    GroupRepository, IdentityRepository, ProviderKeyRepository, QuotaRepository, UserRepository,
};
use atmosphere::seeds::{EUCALYPTUS_SLUG, OPENSTACK_SLUG};
use sea_orm::DatabaseConnection;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::setup_test_db;

const SALT: &str = "import-salt";

fn provisioning_config() -> ProvisioningConfig {
    ProvisioningConfig {
        password_salt: Some(SALT.to_string()),
        openstack_admin_key: Some("os-admin".to_string()),
        openstack_admin_secret: Some("os-admin-secret".to_string()),
        openstack_admin_tenant: Some("admin-tenant".to_string()),
        ..Default::default()
    }
}

async fn euca_directory(usernames: &[&str]) -> InMemoryAccounts {
    let euca = InMemoryAccounts::new("eucalyptus");
    for username in usernames {
        euca.insert(BackendUser {
            username: username.to_string(),
            id: None,
            access_key: Some(format!("AK-{}", username)),
            secret_key: Some(format!("SK-{}", username)),
        })
        .await;
    }
    euca
}

async fn credential(
    db: &DatabaseConnection,
    identity_id: uuid::Uuid,
    key: &str,
) -> Result<Option<String>> {
    Ok(IdentityRepository::new(db)
        .credentials(identity_id)
        .await?
        .into_iter()
        .find(|c| c.key == key)
        .map(|c| c.value))
}

#[tokio::test]
async fn import_creates_identities_on_both_providers() -> Result<()> {
    let db = setup_test_db().await?;
    let config = provisioning_config();
    let quota = QuotaDefaults::default();
    let euca = euca_directory(&["mlent"]).await;
    let openstack = InMemoryAccounts::new("openstack");

    let report = ProvisioningWorkflow::new(&db, &config, &quota, &euca, &openstack)
        .with_backoff(Duration::ZERO)
        .run(&["mlent".to_string()])
        .await;

    assert_eq!(report.failed(), 0, "{:?}", report.users);
    let user_report = &report.users[0];
    // key, user, group, two identities, two identity memberships, two provider memberships
    assert_eq!(user_report.rows_created, 9);
    assert_eq!(openstack.created().await, vec!["mlent"]);

    let euca_identity = user_report.eucalyptus_identity.unwrap();
    assert_eq!(
        credential(&db, euca_identity, "key").await?.as_deref(),
        Some("AK-mlent")
    );

    let os_identity = user_report.openstack_identity.unwrap();
    let password = hashpass(SALT, "mlent")?;
    assert_eq!(credential(&db, os_identity, "secret").await?, Some(password));
    assert_eq!(
        credential(&db, os_identity, "ex_tenant_name").await?.as_deref(),
        Some("mlent")
    );

    let identities = IdentityRepository::new(&db);
    assert_eq!(identities.get(euca_identity).await?.provider_slug, EUCALYPTUS_SLUG);
    assert_eq!(identities.get(os_identity).await?.provider_slug, OPENSTACK_SLUG);
    let default_quota = QuotaRepository::new(&db).find_by_slug("default").await?.unwrap();
    for identity in [euca_identity, os_identity] {
        let quota = identities.quota_for(identity).await?.unwrap();
        assert_eq!(quota.id, default_quota.id);
    }

    let user = UserRepository::new(&db).find_by_username("mlent").await?.unwrap();
    assert!(user.is_staff && user.is_superuser);

    let groups = GroupRepository::new(&db);
    let group = groups.find_by_name("mlent").await?.unwrap();
    let members = groups.members(group.id).await?;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, user.id);
    assert!(members[0].is_leader);
    Ok(())
}

#[tokio::test]
async fn second_import_creates_nothing() -> Result<()> {
    let db = setup_test_db().await?;
    let config = provisioning_config();
    let quota = QuotaDefaults::default();
    let euca = euca_directory(&["esteve", "jmatt"]).await;
    let openstack = InMemoryAccounts::new("openstack");
    let usernames = vec!["esteve".to_string(), "jmatt".to_string()];

    let workflow = ProvisioningWorkflow::new(&db, &config, &quota, &euca, &openstack)
        .with_backoff(Duration::ZERO);
    let first = workflow.run(&usernames).await;
    assert_eq!(first.succeeded(), 2);
    assert!(first.rows_created() > 0);

    let second = workflow.run(&usernames).await;
    assert_eq!(second.succeeded(), 2);
    assert_eq!(second.rows_created(), 0);
    assert_eq!(openstack.created().await.len(), 2);

    for (a, b) in first.users.iter().zip(&second.users) {
        assert_eq!(a.eucalyptus_identity, b.eucalyptus_identity);
        assert_eq!(a.openstack_identity, b.openstack_identity);
    }
    Ok(())
}

#[tokio::test]
async fn duplicate_provider_keys_are_replaced_by_one() -> Result<()> {
    let db = setup_test_db().await?;
    let keys = ProviderKeyRepository::new(&db);
    for suffix in ["a", "b"] {
        keys.create(atmosphere::repositories::NewProviderKey {
            username: "cjlarose".to_string(),
            access_key: format!("old-{}", suffix),
            secret_key: "old".to_string(),
            ec2_url: "http://localhost:8773/services/Eucalyptus".to_string(),
        })
        .await?;
    }

    let config = provisioning_config();
    let quota = QuotaDefaults::default();
    let euca = euca_directory(&["cjlarose"]).await;
    let openstack = InMemoryAccounts::new("openstack");
    let report = ProvisioningWorkflow::new(&db, &config, &quota, &euca, &openstack)
        .run(&["cjlarose".to_string()])
        .await;
    assert_eq!(report.failed(), 0);

    let remaining = keys.find_by_username("cjlarose").await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].access_key, "AK-cjlarose");
    Ok(())
}

#[tokio::test]
async fn missing_eucalyptus_user_fails_only_that_user() -> Result<()> {
    let db = setup_test_db().await?;
    let config = provisioning_config();
    let quota = QuotaDefaults::default();
    let euca = euca_directory(&["edwins"]).await;
    let openstack = InMemoryAccounts::new("openstack");

    let report = ProvisioningWorkflow::new(&db, &config, &quota, &euca, &openstack)
        .run(&["ghost".to_string(), "edwins".to_string()])
        .await;

    assert_eq!(report.failed(), 1);
    assert_eq!(
        report.users[0].error.as_deref(),
        Some("User ghost not found in eucalyptus")
    );
    assert!(report.users[1].succeeded());
    assert!(UserRepository::new(&db).find_by_username("ghost").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn rate_limited_backend_is_retried() -> Result<()> {
    let db = setup_test_db().await?;
    let config = provisioning_config();
    let quota = QuotaDefaults::default();
    let euca = euca_directory(&["mlent"]).await;
    let openstack = InMemoryAccounts::new("openstack");
    openstack.rate_limit_next(3).await;

    let report = ProvisioningWorkflow::new(&db, &config, &quota, &euca, &openstack)
        .with_backoff(Duration::ZERO)
        .run(&["mlent".to_string()])
        .await;

    assert_eq!(report.failed(), 0);
    // three refusals, then get_user and create_user
    assert_eq!(openstack.calls().await, 5);
    assert_eq!(openstack.created().await, vec!["mlent"]);
    Ok(())
}

#[tokio::test]
async fn rate_limit_attempt_cap_fails_the_user() -> Result<()> {
    let db = setup_test_db().await?;
    let config = ProvisioningConfig {
        rate_limit_max_attempts: Some(2),
        ..provisioning_config()
    };
    let quota = QuotaDefaults::default();
    let euca = euca_directory(&["mlent"]).await;
    let openstack = InMemoryAccounts::new("openstack");
    openstack.rate_limit_next(10).await;

    let report = ProvisioningWorkflow::new(&db, &config, &quota, &euca, &openstack)
        .with_backoff(Duration::ZERO)
        .run(&["mlent".to_string()])
        .await;

    assert_eq!(report.failed(), 1);
    assert_eq!(openstack.calls().await, 2);
    assert_eq!(
        report.users[0].error.as_deref(),
        Some("Requests are rate limited")
    );
    Ok(())
}

#[tokio::test]
async fn admin_reuses_configured_openstack_credentials() -> Result<()> {
    let db = setup_test_db().await?;
    let config = provisioning_config();
    let quota = QuotaDefaults::default();
    let euca = euca_directory(&["admin"]).await;
    let openstack = InMemoryAccounts::new("openstack");

    let report = ProvisioningWorkflow::new(&db, &config, &quota, &euca, &openstack)
        .run(&["admin".to_string()])
        .await;

    assert_eq!(report.failed(), 0);
    assert_eq!(openstack.calls().await, 0);

    let os_identity = report.users[0].openstack_identity.unwrap();
    assert_eq!(
        credential(&db, os_identity, "key").await?.as_deref(),
        Some("os-admin")
    );
    assert_eq!(
        credential(&db, os_identity, "ex_tenant_name").await?.as_deref(),
        Some("admin-tenant")
    );
    Ok(())
}

#[tokio::test]
async fn admin_without_credentials_is_a_configuration_error() -> Result<()> {
    let db = setup_test_db().await?;
    let config = ProvisioningConfig {
        openstack_admin_secret: None,
        ..provisioning_config()
    };
    let quota = QuotaDefaults::default();
    let euca = euca_directory(&["admin"]).await;
    let openstack = InMemoryAccounts::new("openstack");

    let report = ProvisioningWorkflow::new(&db, &config, &quota, &euca, &openstack)
        .run(&["admin".to_string()])
        .await;

    assert_eq!(report.failed(), 1);
    assert!(
        report.users[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("Provisioning is misconfigured")
    );
    Ok(())
}

#[tokio::test]
async fn empty_username_list_uses_core_users() -> Result<()> {
    let db = setup_test_db().await?;
    let config = ProvisioningConfig {
        core_usernames: vec!["jmatt".to_string()],
        ..provisioning_config()
    };
    let quota = QuotaDefaults::default();
    let euca = euca_directory(&["jmatt"]).await;
    let openstack = InMemoryAccounts::new("openstack");

    let report = ProvisioningWorkflow::new(&db, &config, &quota, &euca, &openstack)
        .run(&[])
        .await;

    assert_eq!(report.users.len(), 1);
    assert_eq!(report.users[0].username, "jmatt");
    assert!(report.users[0].succeeded());
    Ok(())
}
