//! In-process simulated cloud
//!
//! Keeps volumes, snapshots and instances per account in memory. Used for
//! local runs and tests; the knobs (`reject_key`, `set_fail_destroy`, ...)
//! reproduce the provider failure modes the lifecycle service has to handle.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::cloud::{
    BootRequest, BootSource, CloudDriver, CloudProvider, DriverError, IdentityCredentials,
    InstanceOperation, RemoteImage, RemoteInstance, RemoteSize, RemoteSnapshot, RemoteVolume,
    ResourceKind, VolumeRequest,
};

#[derive(Default)]
struct Account {
    volumes: BTreeMap<String, RemoteVolume>,
    snapshots: BTreeMap<String, RemoteSnapshot>,
    instances: BTreeMap<String, RemoteInstance>,
}

impl Account {
    fn storage_in_use(&self) -> i64 {
        self.volumes.values().map(|v| v.size).sum()
    }
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    rejected_keys: HashSet<String>,
    images: HashMap<String, RemoteImage>,
    sizes: HashMap<String, RemoteSize>,
    fail_destroy: bool,
    fail_volume_create: bool,
    fail_snapshot_delete: bool,
    rate_limited: bool,
    counter: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}-{:08x}", prefix, self.counter)
    }
}

pub struct SimulatedCloud {
    slug: String,
    display_name: String,
    storage_limit_gb: i64,
    state: Arc<Mutex<State>>,
}

impl SimulatedCloud {
    pub fn new(slug: &str, display_name: &str, storage_limit_gb: i64) -> Self {
        let mut state = State::default();
        for image in default_images() {
            state.images.insert(image.id.clone(), image);
        }
        for size in default_sizes() {
            state.sizes.insert(size.id.clone(), size);
        }

        Self {
            slug: slug.to_string(),
            display_name: display_name.to_string(),
            storage_limit_gb,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Reject every future `connect` made with this access key
    pub async fn reject_key(&self, key: &str) {
        self.state.lock().await.rejected_keys.insert(key.to_string());
    }

    pub async fn set_fail_destroy(&self, fail: bool) {
        self.state.lock().await.fail_destroy = fail;
    }

    pub async fn set_fail_volume_create(&self, fail: bool) {
        self.state.lock().await.fail_volume_create = fail;
    }

    pub async fn set_fail_snapshot_delete(&self, fail: bool) {
        self.state.lock().await.fail_snapshot_delete = fail;
    }

    pub async fn set_rate_limited(&self, limited: bool) {
        self.state.lock().await.rate_limited = limited;
    }

    /// Place a volume directly into an account, bypassing quota checks
    pub async fn seed_volume(&self, account_key: &str, volume: RemoteVolume) {
        let mut state = self.state.lock().await;
        state
            .accounts
            .entry(account_key.to_string())
            .or_default()
            .volumes
            .insert(volume.id.clone(), volume);
    }

    pub async fn seed_instance(&self, account_key: &str, instance: RemoteInstance) {
        let mut state = self.state.lock().await;
        state
            .accounts
            .entry(account_key.to_string())
            .or_default()
            .instances
            .insert(instance.id.clone(), instance);
    }

    pub async fn snapshot_ids(&self, account_key: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .accounts
            .get(account_key)
            .map(|account| account.snapshots.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn instance(&self, account_key: &str, instance_id: &str) -> Option<RemoteInstance> {
        let state = self.state.lock().await;
        state
            .accounts
            .get(account_key)
            .and_then(|account| account.instances.get(instance_id).cloned())
    }
}

#[async_trait]
impl CloudProvider for SimulatedCloud {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn connect(
        &self,
        credentials: &IdentityCredentials,
    ) -> Result<Arc<dyn CloudDriver>, DriverError> {
        let invalid = || DriverError::InvalidCredentials {
            provider: self.slug.clone(),
            identity: credentials.identity_id.to_string(),
        };

        let key = credentials.get("key").ok_or_else(invalid)?;
        if credentials.get("secret").is_none() {
            return Err(invalid());
        }
        if self.state.lock().await.rejected_keys.contains(key) {
            return Err(invalid());
        }

        Ok(Arc::new(SimulatedDriver {
            account_key: key.to_string(),
            storage_limit_gb: self.storage_limit_gb,
            state: Arc::clone(&self.state),
        }))
    }
}

struct SimulatedDriver {
    account_key: String,
    storage_limit_gb: i64,
    state: Arc<Mutex<State>>,
}

impl SimulatedDriver {
    fn check_rate_limit(state: &State) -> Result<(), DriverError> {
        if state.rate_limited {
            return Err(DriverError::RateLimited {
                retry_after: Some(60),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CloudDriver for SimulatedDriver {
    async fn list_volumes(&self) -> Result<Vec<RemoteVolume>, DriverError> {
        let state = self.state.lock().await;
        Self::check_rate_limit(&state)?;
        Ok(state
            .accounts
            .get(&self.account_key)
            .map(|account| account.volumes.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_volume(&self, volume_id: &str) -> Result<Option<RemoteVolume>, DriverError> {
        let state = self.state.lock().await;
        Self::check_rate_limit(&state)?;
        Ok(state
            .accounts
            .get(&self.account_key)
            .and_then(|account| account.volumes.get(volume_id).cloned()))
    }

    async fn create_volume(&self, request: VolumeRequest) -> Result<RemoteVolume, DriverError> {
        let mut state = self.state.lock().await;
        Self::check_rate_limit(&state)?;
        if state.fail_volume_create {
            return Err(DriverError::Backend {
                details: "volume backend unavailable".to_string(),
            });
        }

        let in_use = state
            .accounts
            .get(&self.account_key)
            .map(Account::storage_in_use)
            .unwrap_or(0);
        let total = in_use.checked_add(request.size);
        if total.is_none_or(|total| total > self.storage_limit_gb) {
            return Err(DriverError::OverQuota {
                message: format!(
                    "Storage quota exceeded: requested {} GB with {} of {} GB in use",
                    request.size, in_use, self.storage_limit_gb
                ),
            });
        }

        let volume = RemoteVolume {
            id: state.next_id("vol"),
            name: request.name,
            size: request.size,
            status: "available".to_string(),
            description: request.description,
            snapshot_id: request.snapshot.map(|snapshot| snapshot.id),
            image_id: request.image.map(|image| image.id),
            metadata: request.metadata,
            created_at: Utc::now(),
        };
        state
            .accounts
            .entry(self.account_key.clone())
            .or_default()
            .volumes
            .insert(volume.id.clone(), volume.clone());
        Ok(volume)
    }

    async fn destroy_volume(&self, volume: &RemoteVolume) -> Result<bool, DriverError> {
        let mut state = self.state.lock().await;
        Self::check_rate_limit(&state)?;
        if state.fail_destroy {
            return Ok(false);
        }
        Ok(state
            .accounts
            .get_mut(&self.account_key)
            .and_then(|account| account.volumes.remove(&volume.id))
            .is_some())
    }

    async fn list_snapshots(&self) -> Result<Vec<RemoteSnapshot>, DriverError> {
        let state = self.state.lock().await;
        Self::check_rate_limit(&state)?;
        Ok(state
            .accounts
            .get(&self.account_key)
            .map(|account| account.snapshots.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_snapshot(
        &self,
        snapshot_id: &str,
    ) -> Result<Option<RemoteSnapshot>, DriverError> {
        let state = self.state.lock().await;
        Self::check_rate_limit(&state)?;
        Ok(state
            .accounts
            .get(&self.account_key)
            .and_then(|account| account.snapshots.get(snapshot_id).cloned()))
    }

    async fn create_snapshot(
        &self,
        volume: &RemoteVolume,
        name: &str,
        description: Option<&str>,
    ) -> Result<RemoteSnapshot, DriverError> {
        let mut state = self.state.lock().await;
        Self::check_rate_limit(&state)?;
        let snapshot = RemoteSnapshot {
            id: state.next_id("snap"),
            name: name.to_string(),
            size: volume.size,
            status: "available".to_string(),
            description: description.map(str::to_string),
            volume_id: volume.id.clone(),
            created_at: Utc::now(),
        };
        state
            .accounts
            .entry(self.account_key.clone())
            .or_default()
            .snapshots
            .insert(snapshot.id.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn delete_snapshot(&self, snapshot: &RemoteSnapshot) -> Result<bool, DriverError> {
        let mut state = self.state.lock().await;
        Self::check_rate_limit(&state)?;
        if state.fail_snapshot_delete {
            return Ok(false);
        }
        Ok(state
            .accounts
            .get_mut(&self.account_key)
            .and_then(|account| account.snapshots.remove(&snapshot.id))
            .is_some())
    }

    async fn get_machine(&self, image_id: &str) -> Result<Option<RemoteImage>, DriverError> {
        let state = self.state.lock().await;
        Self::check_rate_limit(&state)?;
        Ok(state.images.get(image_id).cloned())
    }

    async fn get_size(&self, size_id: &str) -> Result<Option<RemoteSize>, DriverError> {
        let state = self.state.lock().await;
        Self::check_rate_limit(&state)?;
        Ok(state.sizes.get(size_id).cloned())
    }

    async fn boot_volume(&self, request: BootRequest) -> Result<RemoteInstance, DriverError> {
        let mut state = self.state.lock().await;
        Self::check_rate_limit(&state)?;

        if let BootSource::Volume(ref volume) = request.source
            && !volume.status.eq_ignore_ascii_case("available")
        {
            return Err(DriverError::Backend {
                details: format!("volume {} is {}", volume.id, volume.status),
            });
        }

        let id = state.next_id("i");
        let octet = (state.counter % 250) + 2;
        let instance = RemoteInstance {
            id,
            name: request.name,
            status: "active".to_string(),
            size_id: request.size.id,
            source_type: request.source.kind(),
            source_id: request.source.id().to_string(),
            ip_address: Some(format!("10.0.0.{}", octet)),
            extra: request.extra,
        };

        let account = state.accounts.entry(self.account_key.clone()).or_default();
        if let BootSource::Volume(volume) = &request.source
            && let Some(attached) = account.volumes.get_mut(&volume.id)
        {
            attached.status = "in-use".to_string();
        }
        account
            .instances
            .insert(instance.id.clone(), instance.clone());
        Ok(instance)
    }

    async fn get_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<RemoteInstance>, DriverError> {
        let state = self.state.lock().await;
        Self::check_rate_limit(&state)?;
        Ok(state
            .accounts
            .get(&self.account_key)
            .and_then(|account| account.instances.get(instance_id).cloned()))
    }

    async fn perform_instance_action(
        &self,
        instance_id: &str,
        operation: &InstanceOperation,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        Self::check_rate_limit(&state)?;

        if let InstanceOperation::Resize { size_id } = operation
            && !state.sizes.contains_key(size_id)
        {
            return Err(DriverError::NotFound {
                kind: ResourceKind::Size,
                id: size_id.clone(),
            });
        }

        let instance = state
            .accounts
            .get_mut(&self.account_key)
            .and_then(|account| account.instances.get_mut(instance_id))
            .ok_or_else(|| DriverError::NotFound {
                kind: ResourceKind::Instance,
                id: instance_id.to_string(),
            })?;

        let status = match operation {
            InstanceOperation::Start | InstanceOperation::Resume => "active",
            InstanceOperation::Stop => "shutoff",
            InstanceOperation::Suspend => "suspended",
            InstanceOperation::Reboot { hard: true } => "hard_reboot",
            InstanceOperation::Reboot { hard: false } => "reboot",
            InstanceOperation::Resize { size_id } => {
                instance.size_id = size_id.clone();
                "verify_resize"
            }
        };
        instance.status = status.to_string();
        Ok(())
    }
}

fn default_images() -> Vec<RemoteImage> {
    vec![
        RemoteImage {
            id: "img-ubuntu-22".to_string(),
            name: "Ubuntu 22.04".to_string(),
            size_gb: 10,
        },
        RemoteImage {
            id: "img-centos-7".to_string(),
            name: "CentOS 7".to_string(),
            size_gb: 8,
        },
    ]
}

fn default_sizes() -> Vec<RemoteSize> {
    [
        ("m1.small", 1, 2048, 20),
        ("m1.medium", 2, 4096, 40),
        ("m1.large", 4, 8192, 80),
    ]
    .into_iter()
    .map(|(id, cpu, ram_mb, disk_gb)| RemoteSize {
        id: id.to_string(),
        name: id.to_string(),
        cpu,
        ram_mb,
        disk_gb,
    })
    .collect()
}
