//! # Machine Request Repository
//!
//! Imaging requests are scoped to an identity through their source instance.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::{
    instance::{self, Entity as Instance},
    machine_request::{self, Entity as MachineRequest, STATUS_COMPLETED, STATUS_PENDING},
};

/// Fields supplied when a request is opened
#[derive(Debug, Clone)]
pub struct NewMachineRequest {
    pub instance_id: Uuid,
    pub parent_machine: String,
    pub iplant_sys_files: String,
    pub installed_software: String,
    pub exclude_files: String,
    pub access_list: String,
    pub new_machine_provider: String,
    pub new_machine_name: String,
    pub new_machine_owner: Uuid,
    pub new_machine_visibility: String,
    pub new_machine_description: String,
    pub new_machine_tags: String,
}

#[derive(Debug, Clone, Default)]
pub struct MachineRequestUpdate {
    pub status: Option<String>,
    /// Id of the finished image; completes the request
    pub new_machine: Option<String>,
}

pub struct MachineRequestRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> MachineRequestRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        request: NewMachineRequest,
    ) -> Result<machine_request::Model, RepositoryError> {
        let row = machine_request::ActiveModel {
            id: Set(Uuid::new_v4()),
            instance_id: Set(request.instance_id),
            status: Set(STATUS_PENDING.to_string()),
            parent_machine: Set(request.parent_machine),
            iplant_sys_files: Set(request.iplant_sys_files),
            installed_software: Set(request.installed_software),
            exclude_files: Set(request.exclude_files),
            access_list: Set(request.access_list),
            new_machine_provider: Set(request.new_machine_provider),
            new_machine_name: Set(request.new_machine_name),
            new_machine_owner: Set(request.new_machine_owner),
            new_machine_visibility: Set(request.new_machine_visibility),
            new_machine_description: Set(request.new_machine_description),
            new_machine_tags: Set(request.new_machine_tags),
            start_date: Set(Utc::now().into()),
            end_date: Set(None),
            new_machine: Set(None),
        };
        Ok(row.insert(self.db).await?)
    }

    pub async fn list_for_identity(
        &self,
        identity_id: Uuid,
    ) -> Result<Vec<machine_request::Model>, RepositoryError> {
        let instance_ids: Vec<Uuid> = Instance::find()
            .select_only()
            .column(instance::Column::Id)
            .filter(instance::Column::IdentityId.eq(identity_id))
            .into_tuple()
            .all(self.db)
            .await?;

        if instance_ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(MachineRequest::find()
            .filter(machine_request::Column::InstanceId.is_in(instance_ids))
            .order_by_asc(machine_request::Column::StartDate)
            .all(self.db)
            .await?)
    }

    /// Fetch a request, requiring its instance to belong to `identity_id`
    pub async fn find_for_identity(
        &self,
        identity_id: Uuid,
        request_id: Uuid,
    ) -> Result<Option<machine_request::Model>, RepositoryError> {
        let Some(request) = MachineRequest::find_by_id(request_id).one(self.db).await? else {
            return Ok(None);
        };
        let owned = Instance::find_by_id(request.instance_id)
            .one(self.db)
            .await?
            .is_some_and(|instance| instance.identity_id == identity_id);
        Ok(owned.then_some(request))
    }

    /// Apply a status change. Supplying `new_machine` completes the request
    /// and stamps `end_date` (first stamp wins).
    pub async fn update(
        &self,
        request: machine_request::Model,
        update: MachineRequestUpdate,
    ) -> Result<machine_request::Model, RepositoryError> {
        let already_ended = request.end_date.is_some();
        let mut active = request.into_active_model();

        if let Some(status) = update.status {
            active.status = Set(status);
        }
        if let Some(new_machine) = update.new_machine {
            active.new_machine = Set(Some(new_machine));
            active.status = Set(STATUS_COMPLETED.to_string());
            if !already_ended {
                active.end_date = Set(Some(Utc::now().into()));
            }
        }
        Ok(active.update(self.db).await?)
    }
}
