//! # Server Configuration
//!
//! Application state, router assembly and the server entry point.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::actions::ActionCatalog;
use crate::auth::auth_middleware;
use crate::cloud::CloudRegistry;
use crate::config::AppConfig;
use crate::db;
use crate::handlers::{self, actions, boot, identities, machine_requests, snapshots, volumes};
use crate::telemetry::{init_tracing, trace_middleware};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub clouds: Arc<CloudRegistry>,
    pub actions: Arc<ActionCatalog>,
}

impl AppState {
    /// State with the configured clouds and the built-in action catalog
    pub fn new(config: AppConfig, db: DatabaseConnection) -> Self {
        let clouds = CloudRegistry::from_config(&config);
        Self::with_clouds(config, db, clouds)
    }

    pub fn with_clouds(config: AppConfig, db: DatabaseConnection, clouds: CloudRegistry) -> Self {
        Self {
            config: Arc::new(config),
            db,
            clouds: Arc::new(clouds),
            actions: Arc::new(ActionCatalog::builtin()),
        }
    }
}

fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/identities/{identity_id}", get(identities::get_identity))
        .route(
            "/identities/{identity_id}/volumes",
            get(volumes::list_volumes).post(volumes::create_volume),
        )
        .route(
            "/identities/{identity_id}/volumes/snapshot",
            get(snapshots::list_snapshots).post(snapshots::create_snapshot_volume),
        )
        .route(
            "/identities/{identity_id}/volumes/snapshot/{snapshot_id}",
            get(snapshots::get_snapshot).delete(snapshots::delete_snapshot),
        )
        .route(
            "/identities/{identity_id}/volumes/boot",
            post(boot::boot_instance),
        )
        .route(
            "/identities/{identity_id}/volumes/{volume_id}",
            get(volumes::get_volume)
                .patch(volumes::patch_volume)
                .put(volumes::put_volume)
                .delete(volumes::destroy_volume),
        )
        .route(
            "/identities/{identity_id}/volumes/{volume_id}/boot",
            post(boot::boot_volume),
        )
        .route(
            "/identities/{identity_id}/machine_requests",
            get(machine_requests::list_machine_requests)
                .post(machine_requests::create_machine_request),
        )
        .route(
            "/identities/{identity_id}/machine_requests/{request_id}",
            get(machine_requests::get_machine_request)
                .patch(machine_requests::update_machine_request),
        )
        .route(
            "/instances/{instance_id}/action",
            get(actions::list_actions).post(actions::run_action),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ))
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let api = api_routes(&state);

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .nest("/api/v1", api)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(trace_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Initialise telemetry and the database, then serve until Ctrl-C
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    config.validate().context("Invalid configuration")?;
    init_tracing(&config).context("Failed to initialise telemetry")?;

    let addr = config.bind_addr().context("Invalid server address")?;

    let conn = db::init_pool(&config).await?;
    db::prepare(&conn).await?;

    let state = AppState::new(config, conn);
    tracing::info!(
        profile = %state.config.profile,
        providers = ?state.clouds.slugs(),
        actions = ?state.actions.names(),
        "Starting Atmosphere API"
    );

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::identities::get_identity,
        crate::handlers::volumes::list_volumes,
        crate::handlers::volumes::create_volume,
        crate::handlers::volumes::get_volume,
        crate::handlers::volumes::patch_volume,
        crate::handlers::volumes::put_volume,
        crate::handlers::volumes::destroy_volume,
        crate::handlers::snapshots::list_snapshots,
        crate::handlers::snapshots::create_snapshot_volume,
        crate::handlers::snapshots::get_snapshot,
        crate::handlers::snapshots::delete_snapshot,
        crate::handlers::boot::boot_instance,
        crate::handlers::boot::boot_volume,
        crate::handlers::actions::list_actions,
        crate::handlers::actions::run_action,
        crate::handlers::machine_requests::list_machine_requests,
        crate::handlers::machine_requests::create_machine_request,
        crate::handlers::machine_requests::get_machine_request,
        crate::handlers::machine_requests::update_machine_request,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::HealthResponse,
            crate::handlers::identities::IdentityResponse,
            crate::handlers::types::VolumeResponse,
            crate::handlers::types::SnapshotResponse,
            crate::handlers::types::InstanceResponse,
            crate::handlers::types::QuotaResponse,
            crate::handlers::types::MachineRequestResponse,
            crate::handlers::machine_requests::CreateMachineRequest,
            crate::handlers::machine_requests::UpdateMachineRequest,
            crate::actions::ActionInfo,
            crate::actions::ActionRequest,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Atmosphere API",
        description = "Cloud control plane for volumes, instances and machine requests",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
