//! Test utilities for database and HTTP testing.
//!
//! Sets up an in-memory SQLite database with migrations and provider seeds,
//! plus an application router backed by a simulated cloud the test controls.

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use atmosphere::cloud::{CloudRegistry, RemoteInstance, ResourceKind, SimulatedCloud};
use atmosphere::config::AppConfig;
use atmosphere::db;
use atmosphere::models::instance;
use atmosphere::repositories::{IdentityRepository, InstanceRepository, UserRepository};
use atmosphere::seeds::{EUCALYPTUS_SLUG, OPENSTACK_SLUG};
use atmosphere::server::{AppState, create_app};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use sea_orm::{Database, DatabaseConnection};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_TOKEN: &str = "test-operator-token";
pub const ACCOUNT_KEY: &str = "alice-key";

/// Sets up an in-memory SQLite database with all migrations and provider seeds applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    db::prepare(&db).await?;
    Ok(db)
}

pub fn test_config() -> AppConfig {
    AppConfig {
        operator_tokens: vec![TEST_TOKEN.to_string()],
        database_url: "sqlite::memory:".to_string(),
        ..Default::default()
    }
}

/// Creates a user with an identity on `provider_slug` holding key/secret credentials.
pub async fn create_identity(
    db: &DatabaseConnection,
    username: &str,
    provider_slug: &str,
    key: &str,
) -> Result<Uuid> {
    let (user, _) = UserRepository::new(db).get_or_create(username).await?;
    let identities = IdentityRepository::new(db);
    let (identity, _) = identities.get_or_create(provider_slug, user.id).await?;
    identities.set_credential(identity.id, "key", key).await?;
    identities
        .set_credential(identity.id, "secret", "s3cret")
        .await?;
    Ok(identity.id)
}

/// Application wired to a simulated OpenStack cloud and one identity on it.
pub struct TestApp {
    pub router: Router,
    pub db: DatabaseConnection,
    pub cloud: Arc<SimulatedCloud>,
    pub identity_id: Uuid,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        let config = test_config();
        let db = setup_test_db().await?;

        let cloud = Arc::new(SimulatedCloud::new(OPENSTACK_SLUG, "OpenStack", 1000));
        let mut clouds = CloudRegistry::new();
        clouds.register(cloud.clone());
        clouds.register(Arc::new(SimulatedCloud::new(
            EUCALYPTUS_SLUG,
            "Eucalyptus",
            1000,
        )));

        let identity_id = create_identity(&db, "alice", OPENSTACK_SLUG, ACCOUNT_KEY).await?;
        let state = AppState::with_clouds(config, db.clone(), clouds);

        Ok(Self {
            router: create_app(state),
            db,
            cloud,
            identity_id,
        })
    }

    /// Path under `/api/v1/identities/{identity_id}`
    pub fn identity_path(&self, suffix: &str) -> String {
        format!("/api/v1/identities/{}{}", self.identity_id, suffix)
    }

    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", TEST_TOKEN));
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Places a running instance on the provider and mirrors it locally.
    pub async fn seed_instance(&self, alias: &str) -> Result<instance::Model> {
        let remote = RemoteInstance {
            id: alias.to_string(),
            name: format!("{}-vm", alias),
            status: "active".to_string(),
            size_id: "m1.small".to_string(),
            source_type: ResourceKind::Image,
            source_id: "img-ubuntu-22".to_string(),
            ip_address: Some("10.0.0.9".to_string()),
            extra: serde_json::Map::new(),
        };
        self.cloud.seed_instance(ACCOUNT_KEY, remote.clone()).await;
        Ok(InstanceRepository::new(&self.db)
            .upsert_from_remote(OPENSTACK_SLUG, self.identity_id, &remote)
            .await?)
    }
}
