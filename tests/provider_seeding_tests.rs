//! Tests for provider seeding

use std::sync::Arc;

use anyhow::Result;
use atmosphere::repositories::ProviderRepository;
use atmosphere::seeds::{EUCALYPTUS_LOCATION, OPENSTACK_LOCATION, seed_providers};

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::setup_test_db;

#[tokio::test]
async fn seeding_is_idempotent() -> Result<()> {
    let db = setup_test_db().await?;
    seed_providers(&db).await?;

    let repo = ProviderRepository::new(Arc::new(db));
    let providers = repo.find_all().await?;
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0].slug, "eucalyptus");
    assert_eq!(providers[0].location, EUCALYPTUS_LOCATION);
    assert_eq!(providers[1].display_name, "OpenStack");
    assert_eq!(providers[1].location, OPENSTACK_LOCATION);
    Ok(())
}

#[tokio::test]
async fn upsert_refreshes_display_name() -> Result<()> {
    let db = setup_test_db().await?;
    let repo = ProviderRepository::new(Arc::new(db));

    let updated = repo
        .upsert("openstack", "OpenStack (Jetstream)", OPENSTACK_LOCATION)
        .await?;
    assert_eq!(updated.display_name, "OpenStack (Jetstream)");

    let found = repo.find_by_slug("openstack").await?.unwrap();
    assert_eq!(found.display_name, "OpenStack (Jetstream)");
    assert!(repo.find_by_slug("aws").await?.is_none());
    Ok(())
}
