//! Backend contract for Time & Material work packages.
//!
//! [`TimeMaterialBackend`] is what the persistence synchronizer talks to. The
//! types here are already validated; raw wire shapes live in [`payloads`].

pub mod http;
pub mod payloads;

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::BackendResult;
use crate::ids::{CityId, CountryId, ProfileId, ProjectId, StepId, WorkPackageId};

pub use http::HttpBackend;
pub use payloads::StepPayload;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkPackageRef {
    pub id: WorkPackageId,
    pub name: String,
}

/// Values the backend stores for one year of a step.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyStepData {
    pub year: i32,
    pub process_time: f64,
    pub mng: f64,
    pub office: bool,
    pub hardware: bool,
}

/// A step as persisted on the backend.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedStep {
    pub id: StepId,
    pub work_package_id: Option<WorkPackageId>,
    pub profile_id: ProfileId,
    pub country_id: CountryId,
    pub city_id: CityId,
    pub process_time: f64,
    pub yearly_quantities: Option<Vec<u32>>,
    pub yearly_data: Vec<YearlyStepData>,
}

/// Canonical Time & Material state of a project.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeMaterialSnapshot {
    pub work_package: Option<WorkPackageRef>,
    pub margin_goal: Option<f64>,
    pub yearly_quantities: Vec<u32>,
    pub steps: Vec<PersistedStep>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepRef {
    pub id: StepId,
    pub work_package_id: Option<WorkPackageId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreatedWorkPackage {
    pub work_package: WorkPackageRef,
    pub steps: Vec<StepRef>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeleteOutcome {
    pub message: Option<String>,
    /// The step was the last one and the backend removed its work package too.
    pub work_package_deleted: bool,
}

#[async_trait]
pub trait TimeMaterialBackend: Send + Sync {
    async fn fetch_time_material(&self, project: &ProjectId)
        -> BackendResult<TimeMaterialSnapshot>;

    async fn create_time_material(
        &self,
        project: &ProjectId,
        steps: &[StepPayload],
    ) -> BackendResult<CreatedWorkPackage>;

    async fn update_step(
        &self,
        project: &ProjectId,
        work_package: WorkPackageId,
        step: StepId,
        payload: &StepPayload,
    ) -> BackendResult<StepRef>;

    async fn delete_step(
        &self,
        project: &ProjectId,
        work_package: WorkPackageId,
        step: StepId,
    ) -> BackendResult<DeleteOutcome>;
}
