//! # Resource Lifecycle Service
//!
//! Orchestrates volume, snapshot and instance operations for one identity:
//! authenticate, check preconditions, call the provider, then mirror the
//! result locally. Local rows are mirrors; the provider stays authoritative.

pub mod requests;
pub mod session;

use sea_orm::DatabaseConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cloud::{
    BootRequest, BootSource, CloudRegistry, RemoteSnapshot, ResourceKind, VolumeRequest,
};
use crate::error::LifecycleError;
use crate::models::{instance, snapshot, volume};
use crate::repositories::{InstanceRepository, SnapshotRepository, VolumeChanges, VolumeRepository};
use crate::server::AppState;

pub use requests::{BootVolume, CreateVolume, SnapshotVolume, SourceRef};
pub use session::{IdentitySession, open_session};

const VOLUME_CREATE_FAILED: &str = "Volume creation failed. Contact support";
const SNAPSHOT_CREATE_FAILED: &str = "Snapshot not created. Process aborted.";
const INSTANCE_LAUNCH_FAILED: &str = "Instance launch failed. Contact support";
const PROVIDER_REQUEST_FAILED: &str = "Provider request failed. Contact support";

fn not_found(kind: ResourceKind, id: &str) -> LifecycleError {
    LifecycleError::NotFound(format!("{} {} does not exist", kind.title(), id))
}

fn driver_failure(message: &'static str) -> impl Fn(crate::cloud::DriverError) -> LifecycleError {
    move |err| LifecycleError::from_driver(err, message)
}

pub struct LifecycleService<'a> {
    db: &'a DatabaseConnection,
    clouds: &'a CloudRegistry,
    image_size_headroom_gb: i64,
}

impl<'a> LifecycleService<'a> {
    pub fn new(
        db: &'a DatabaseConnection,
        clouds: &'a CloudRegistry,
        image_size_headroom_gb: i64,
    ) -> Self {
        Self {
            db,
            clouds,
            image_size_headroom_gb,
        }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(
            &state.db,
            &state.clouds,
            state.config.image_size_headroom_gb,
        )
    }

    async fn session(&self, identity_id: Uuid) -> Result<IdentitySession, LifecycleError> {
        open_session(self.db, self.clouds, identity_id).await
    }

    /// Mirror every volume the provider reports for the identity
    pub async fn list_volumes(&self, identity_id: Uuid) -> Result<Vec<volume::Model>, LifecycleError> {
        let session = self.session(identity_id).await?;
        let remote = session
            .driver
            .list_volumes()
            .await
            .map_err(driver_failure(PROVIDER_REQUEST_FAILED))?;

        let volumes = VolumeRepository::new(self.db);
        let mut mirrored = Vec::with_capacity(remote.len());
        for remote_volume in &remote {
            mirrored.push(
                volumes
                    .upsert_from_remote(
                        session.provider_slug(),
                        session.identity_id(),
                        &session.owner,
                        remote_volume,
                    )
                    .await?,
            );
        }
        Ok(mirrored)
    }

    pub async fn get_volume(
        &self,
        identity_id: Uuid,
        volume_id: &str,
    ) -> Result<volume::Model, LifecycleError> {
        let session = self.session(identity_id).await?;
        self.refresh_volume(&session, volume_id).await
    }

    async fn refresh_volume(
        &self,
        session: &IdentitySession,
        volume_id: &str,
    ) -> Result<volume::Model, LifecycleError> {
        let remote = session
            .driver
            .get_volume(volume_id)
            .await
            .map_err(driver_failure(PROVIDER_REQUEST_FAILED))?
            .ok_or_else(|| not_found(ResourceKind::Volume, volume_id))?;

        Ok(VolumeRepository::new(self.db)
            .upsert_from_remote(
                session.provider_slug(),
                session.identity_id(),
                &session.owner,
                &remote,
            )
            .await?)
    }

    /// Update local-only fields of a volume mirror. The provider is not told.
    pub async fn update_volume(
        &self,
        identity_id: Uuid,
        volume_id: &str,
        changes: VolumeChanges,
    ) -> Result<volume::Model, LifecycleError> {
        let session = self.session(identity_id).await?;
        let mirror = self.refresh_volume(&session, volume_id).await?;
        Ok(VolumeRepository::new(self.db)
            .apply_changes(mirror, changes)
            .await?)
    }

    pub async fn create_volume(
        &self,
        identity_id: Uuid,
        request: CreateVolume,
    ) -> Result<volume::Model, LifecycleError> {
        let session = self.session(identity_id).await?;
        let driver = &session.driver;

        let image = match request.image_id.as_deref() {
            Some(image_id) => {
                let image = driver
                    .get_machine(image_id)
                    .await
                    .map_err(driver_failure(VOLUME_CREATE_FAILED))?
                    .ok_or_else(|| not_found(ResourceKind::Image, image_id))?;
                if request.size > image.size_gb + self.image_size_headroom_gb {
                    return Err(LifecycleError::validation(format!(
                        "Volumes created from images can be no more than {}GB larger than the size of the image: {} GB",
                        self.image_size_headroom_gb, image.size_gb
                    )));
                }
                Some(image)
            }
            None => None,
        };

        let snapshot = match request.snapshot_id.as_deref() {
            Some(snapshot_id) => Some(
                driver
                    .get_snapshot(snapshot_id)
                    .await
                    .map_err(driver_failure(VOLUME_CREATE_FAILED))?
                    .ok_or_else(|| not_found(ResourceKind::Snapshot, snapshot_id))?,
            ),
            None => None,
        };

        let remote = driver
            .create_volume(VolumeRequest {
                name: request.name,
                size: request.size,
                description: request.description,
                metadata: request.metadata,
                snapshot,
                image,
            })
            .await
            .map_err(driver_failure(VOLUME_CREATE_FAILED))?;

        info!(
            identity_id = %session.identity_id(),
            volume = %remote.id,
            size = remote.size,
            "Volume created"
        );

        Ok(VolumeRepository::new(self.db)
            .upsert_from_remote(
                session.provider_slug(),
                session.identity_id(),
                &session.owner,
                &remote,
            )
            .await?)
    }

    /// Snapshot a volume (or reuse an existing snapshot), then create a new
    /// volume from it. A snapshot created here is deleted again if the
    /// volume cannot be created; if that fails too, a cleanup record is left.
    pub async fn create_snapshot_volume(
        &self,
        identity_id: Uuid,
        request: SnapshotVolume,
    ) -> Result<volume::Model, LifecycleError> {
        let session = self.session(identity_id).await?;
        let driver = &session.driver;
        let snapshots = SnapshotRepository::new(self.db);

        let (snapshot, created_here) = match request.snapshot_id.as_deref() {
            Some(snapshot_id) => {
                let existing = driver
                    .get_snapshot(snapshot_id)
                    .await
                    .map_err(driver_failure(SNAPSHOT_CREATE_FAILED))?
                    .ok_or_else(|| {
                        LifecycleError::validation(format!(
                            "Snapshot {} not found. Process aborted.",
                            snapshot_id
                        ))
                    })?;
                (existing, false)
            }
            None => {
                let source = driver
                    .get_volume(&request.volume_id)
                    .await
                    .map_err(driver_failure(SNAPSHOT_CREATE_FAILED))?
                    .ok_or_else(|| not_found(ResourceKind::Volume, &request.volume_id))?;

                if !source.status.eq_ignore_ascii_case("available") {
                    return Err(LifecycleError::InvalidState(
                        "Volume status must be 'available'. Did you detach the volume?"
                            .to_string(),
                    ));
                }

                let created = driver
                    .create_snapshot(
                        &source,
                        &request.display_name,
                        request.description.as_deref(),
                    )
                    .await
                    .map_err(driver_failure(SNAPSHOT_CREATE_FAILED))?;
                snapshots
                    .upsert_from_remote(session.provider_slug(), session.identity_id(), &created)
                    .await?;
                (created, true)
            }
        };

        let result = driver
            .create_volume(VolumeRequest {
                name: request.display_name,
                size: request.size,
                description: request.description,
                metadata: request.metadata,
                snapshot: Some(snapshot.clone()),
                image: None,
            })
            .await;

        let remote = match result {
            Ok(remote) => remote,
            Err(err) => {
                if created_here {
                    self.compensate_snapshot(&session, &snapshot, &err.to_string())
                        .await;
                }
                return Err(LifecycleError::from_driver(err, VOLUME_CREATE_FAILED));
            }
        };

        Ok(VolumeRepository::new(self.db)
            .upsert_from_remote(
                session.provider_slug(),
                session.identity_id(),
                &session.owner,
                &remote,
            )
            .await?)
    }

    /// Undo a snapshot created by a failed snapshot-then-volume run.
    async fn compensate_snapshot(
        &self,
        session: &IdentitySession,
        snapshot: &RemoteSnapshot,
        failure: &str,
    ) {
        let snapshots = SnapshotRepository::new(self.db);
        let reason = match session.driver.delete_snapshot(snapshot).await {
            Ok(true) => {
                info!(snapshot = %snapshot.id, "Deleted snapshot left by failed volume creation");
                match snapshots
                    .find_by_alias(session.provider_slug(), &snapshot.id)
                    .await
                {
                    Ok(Some(mirror)) => {
                        if let Err(err) = snapshots.end_date(mirror).await {
                            warn!(snapshot = %snapshot.id, error = %err, "Failed to end-date snapshot mirror");
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(snapshot = %snapshot.id, error = %err, "Failed to load snapshot mirror")
                    }
                }
                return;
            }
            Ok(false) => format!(
                "volume creation failed ({}); provider reported snapshot delete failure",
                failure
            ),
            Err(err) => format!(
                "volume creation failed ({}); snapshot delete errored: {}",
                failure, err
            ),
        };

        warn!(snapshot = %snapshot.id, reason = %reason, "Snapshot left behind; recording for cleanup");
        if let Err(err) = snapshots
            .record_cleanup(
                session.provider_slug(),
                session.identity_id(),
                &snapshot.id,
                &reason,
            )
            .await
        {
            tracing::error!(snapshot = %snapshot.id, error = %err, "Failed to record snapshot cleanup");
        }
    }

    /// Destroy a volume and end-date its mirror.
    ///
    /// The mirror is end-dated even when the provider reports failure.
    /// Destroying an already end-dated volume returns the mirror unchanged.
    pub async fn destroy_volume(
        &self,
        identity_id: Uuid,
        volume_id: &str,
    ) -> Result<volume::Model, LifecycleError> {
        let session = self.session(identity_id).await?;
        let volumes = VolumeRepository::new(self.db);

        let remote = session
            .driver
            .get_volume(volume_id)
            .await
            .map_err(driver_failure(PROVIDER_REQUEST_FAILED))?;
        let mirror = volumes
            .find_by_alias(session.provider_slug(), volume_id)
            .await?;

        let mirror = match (remote, mirror) {
            (None, None) => return Err(not_found(ResourceKind::Volume, volume_id)),
            (None, Some(mirror)) => {
                if mirror.is_active() {
                    info!(volume = volume_id, "Volume already gone from provider; end-dating mirror");
                }
                mirror
            }
            (Some(remote), existing) => {
                let mirror = match existing {
                    Some(mirror) if !mirror.is_active() => mirror,
                    _ => {
                        volumes
                            .upsert_from_remote(
                                session.provider_slug(),
                                session.identity_id(),
                                &session.owner,
                                &remote,
                            )
                            .await?
                    }
                };

                let destroyed = session
                    .driver
                    .destroy_volume(&remote)
                    .await
                    .map_err(driver_failure(PROVIDER_REQUEST_FAILED))?;
                if !destroyed {
                    warn!(
                        identity_id = %session.identity_id(),
                        volume = volume_id,
                        "Provider reported destroy failure; end-dating mirror anyway"
                    );
                }
                mirror
            }
        };

        Ok(volumes.end_date(mirror).await?)
    }

    pub async fn list_snapshots(
        &self,
        identity_id: Uuid,
    ) -> Result<Vec<snapshot::Model>, LifecycleError> {
        let session = self.session(identity_id).await?;
        let remote = session
            .driver
            .list_snapshots()
            .await
            .map_err(driver_failure(PROVIDER_REQUEST_FAILED))?;

        let snapshots = SnapshotRepository::new(self.db);
        let mut mirrored = Vec::with_capacity(remote.len());
        for remote_snapshot in &remote {
            mirrored.push(
                snapshots
                    .upsert_from_remote(session.provider_slug(), session.identity_id(), remote_snapshot)
                    .await?,
            );
        }
        Ok(mirrored)
    }

    pub async fn get_snapshot(
        &self,
        identity_id: Uuid,
        snapshot_id: &str,
    ) -> Result<snapshot::Model, LifecycleError> {
        let session = self.session(identity_id).await?;
        let remote = session
            .driver
            .get_snapshot(snapshot_id)
            .await
            .map_err(driver_failure(PROVIDER_REQUEST_FAILED))?
            .ok_or_else(|| not_found(ResourceKind::Snapshot, snapshot_id))?;

        Ok(SnapshotRepository::new(self.db)
            .upsert_from_remote(session.provider_slug(), session.identity_id(), &remote)
            .await?)
    }

    /// Delete a snapshot. The provider's boolean result is logged, not enforced.
    pub async fn delete_snapshot(
        &self,
        identity_id: Uuid,
        snapshot_id: &str,
    ) -> Result<snapshot::Model, LifecycleError> {
        let session = self.session(identity_id).await?;
        let remote = session
            .driver
            .get_snapshot(snapshot_id)
            .await
            .map_err(driver_failure(PROVIDER_REQUEST_FAILED))?
            .ok_or_else(|| not_found(ResourceKind::Snapshot, snapshot_id))?;

        let snapshots = SnapshotRepository::new(self.db);
        let mirror = snapshots
            .upsert_from_remote(session.provider_slug(), session.identity_id(), &remote)
            .await?;

        let deleted = session
            .driver
            .delete_snapshot(&remote)
            .await
            .map_err(driver_failure(PROVIDER_REQUEST_FAILED))?;
        if !deleted {
            warn!(snapshot = snapshot_id, "Provider reported snapshot delete failure");
        }

        Ok(snapshots.end_date(mirror).await?)
    }

    /// Launch an instance from an image, snapshot or volume
    pub async fn boot(
        &self,
        identity_id: Uuid,
        request: BootVolume,
    ) -> Result<instance::Model, LifecycleError> {
        let session = self.session(identity_id).await?;
        let driver = &session.driver;
        let lookup = driver_failure(INSTANCE_LAUNCH_FAILED);

        let source = match &request.source {
            SourceRef::Image(id) => driver
                .get_machine(id)
                .await
                .map_err(&lookup)?
                .map(BootSource::Image)
                .ok_or_else(|| not_found(ResourceKind::Image, id))?,
            SourceRef::Snapshot(id) => driver
                .get_snapshot(id)
                .await
                .map_err(&lookup)?
                .map(BootSource::Snapshot)
                .ok_or_else(|| not_found(ResourceKind::Snapshot, id))?,
            SourceRef::Volume(id) => driver
                .get_volume(id)
                .await
                .map_err(&lookup)?
                .map(BootSource::Volume)
                .ok_or_else(|| not_found(ResourceKind::Volume, id))?,
        };

        let size = driver
            .get_size(&request.size_id)
            .await
            .map_err(&lookup)?
            .ok_or_else(|| not_found(ResourceKind::Size, &request.size_id))?;

        let remote = driver
            .boot_volume(BootRequest {
                name: request.name,
                size,
                source,
                extra: request.extra,
            })
            .await
            .map_err(&lookup)?;

        info!(
            identity_id = %session.identity_id(),
            instance = %remote.id,
            source_type = %remote.source_type,
            source = %remote.source_id,
            "Instance launched"
        );

        Ok(InstanceRepository::new(self.db)
            .upsert_from_remote(session.provider_slug(), session.identity_id(), &remote)
            .await?)
    }
}
