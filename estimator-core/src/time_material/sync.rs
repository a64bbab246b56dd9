//! Persistence synchronizer
//!
//! Turns row mutations into backend calls and backend snapshots into rows.
//! Identifier preconditions are checked here so an ill-addressed request never
//! leaves the process.

use tracing::{debug, info, warn};

use super::row::AssignmentRow;
use super::year_grid::{YearSpan, YearValue, YearlyGrid};
use crate::backend::{
    CreatedWorkPackage, DeleteOutcome, PersistedStep, StepPayload, StepRef, TimeMaterialBackend,
    TimeMaterialSnapshot,
};
use crate::catalog::Catalogs;
use crate::errors::{AssignmentError, AssignmentResult, BackendError};
use crate::ids::{LocalRowId, ProjectId, StepId, WorkPackageId};

pub struct PersistenceSynchronizer<B> {
    backend: B,
    project_id: ProjectId,
}

impl<B: TimeMaterialBackend> PersistenceSynchronizer<B> {
    pub fn new(backend: B, project_id: ProjectId) -> Self {
        Self {
            backend,
            project_id,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    fn checked_project_id(&self) -> AssignmentResult<&ProjectId> {
        if !self.project_id.is_well_formed() {
            return Err(AssignmentError::precondition(format!(
                "project id '{}' is not well-formed",
                self.project_id
            )));
        }
        Ok(&self.project_id)
    }

    pub async fn fetch(&self) -> AssignmentResult<TimeMaterialSnapshot> {
        let project = self.checked_project_id()?;
        let snapshot = self.backend.fetch_time_material(project).await?;
        debug!(
            "Fetched {} steps for project {}",
            snapshot.steps.len(),
            project
        );
        Ok(snapshot)
    }

    /// Create a single step. Returns the step the backend created for it.
    pub async fn create(&self, payload: StepPayload) -> AssignmentResult<StepRef> {
        let project = self.checked_project_id()?;
        let created: CreatedWorkPackage = self
            .backend
            .create_time_material(project, std::slice::from_ref(&payload))
            .await
            .map_err(|e| {
                warn!("Failed to create step '{}': {}", payload.step_name, e);
                e
            })?;

        let step = created.steps.first().copied().ok_or_else(|| {
            AssignmentError::from(BackendError::invalid("create response contains no steps"))
        })?;
        info!(
            "Created step {} in work package {}",
            step.id, created.work_package.id
        );
        Ok(StepRef {
            id: step.id,
            work_package_id: step.work_package_id.or(Some(created.work_package.id)),
        })
    }

    pub async fn update(
        &self,
        step: Option<StepId>,
        work_package: Option<WorkPackageId>,
        payload: StepPayload,
    ) -> AssignmentResult<StepRef> {
        let (project, work_package, step) = self.address(step, work_package)?;
        let updated = self
            .backend
            .update_step(project, work_package, step, &payload)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    warn!("Step {} is gone from work package {}", step, work_package);
                } else {
                    warn!("Failed to update step {}: {}", step, e);
                }
                e
            })?;
        info!("Updated step {} in work package {}", step, work_package);
        Ok(updated)
    }

    pub async fn delete(
        &self,
        step: Option<StepId>,
        work_package: Option<WorkPackageId>,
    ) -> AssignmentResult<DeleteOutcome> {
        let (project, work_package, step) = self.address(step, work_package)?;
        let outcome = self
            .backend
            .delete_step(project, work_package, step)
            .await
            .map_err(|e| {
                warn!("Failed to delete step {}: {}", step, e);
                e
            })?;
        if outcome.work_package_deleted {
            info!(
                "Deleted step {} and its now empty work package {}",
                step, work_package
            );
        } else {
            info!("Deleted step {} from work package {}", step, work_package);
        }
        Ok(outcome)
    }

    fn address(
        &self,
        step: Option<StepId>,
        work_package: Option<WorkPackageId>,
    ) -> AssignmentResult<(&ProjectId, WorkPackageId, StepId)> {
        let project = self.checked_project_id()?;
        let work_package = work_package
            .ok_or_else(|| AssignmentError::precondition("work package id is missing"))?;
        let step = step.ok_or_else(|| AssignmentError::precondition("step id is missing"))?;
        Ok((project, work_package, step))
    }
}

/// Build the request body for a complete row.
pub fn build_payload(row: &AssignmentRow, catalogs: &Catalogs) -> AssignmentResult<StepPayload> {
    let profile_id = row
        .profile_id
        .ok_or(AssignmentError::MissingField("profile"))?;
    let country_id = row
        .country_id
        .clone()
        .ok_or(AssignmentError::MissingField("country"))?;
    let city_id = row.city_id.ok_or(AssignmentError::MissingField("city"))?;

    let profile_name = catalogs
        .profile_name(profile_id)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Profile {}", profile_id));
    let city_name = catalogs
        .city_name(&country_id, city_id)
        .map(str::to_string)
        .unwrap_or_else(|| format!("City {}", city_id));

    Ok(StepPayload {
        step_name: format!("{} - {}", profile_name, city_name),
        profile_id,
        country_id,
        city_id,
        process_time: row.process_time,
        units: row.grid.total_quantity()?,
        margin_goal: row.margin_goal,
        yearly_quantities: row.grid.yearly_quantities().to_vec(),
        process_time_per_year: row.grid.process_time_per_year().to_vec(),
        mng_per_year: row.grid.mng_per_year().to_vec(),
        office_per_year: row.grid.office_per_year().to_vec(),
        hardware_per_year: row.grid.hardware_per_year().to_vec(),
    })
}

/// Rows for every persisted step, with grids laid out on `span`.
pub fn rows_from_snapshot(
    snapshot: &TimeMaterialSnapshot,
    span: &YearSpan,
    default_margin_goal: f64,
) -> Vec<AssignmentRow> {
    let margin_goal = snapshot.margin_goal.unwrap_or(default_margin_goal);
    snapshot
        .steps
        .iter()
        .map(|step| AssignmentRow {
            local_id: LocalRowId::new(),
            profile_id: Some(step.profile_id),
            country_id: Some(step.country_id.clone()),
            city_id: Some(step.city_id),
            process_time: step.process_time,
            margin_goal,
            grid: grid_from_step(step, &snapshot.yearly_quantities, span),
            server_step_id: Some(step.id),
            server_work_package_id: step.work_package_id,
            is_editing: false,
            is_expanded: false,
        })
        .collect()
}

fn grid_from_step(step: &PersistedStep, deliverable_quantities: &[u32], span: &YearSpan) -> YearlyGrid {
    let mut grid = YearlyGrid::with_defaults(span.len());
    let quantities = step
        .yearly_quantities
        .as_deref()
        .unwrap_or(deliverable_quantities);

    for (index, quantity) in quantities.iter().take(span.len()).enumerate() {
        // Lengths match by construction, so this cannot fail.
        let _ = grid.set(index, YearValue::Quantity(*quantity));
    }

    for data in &step.yearly_data {
        let Some(index) = span.index_of(data.year) else {
            debug!("Dropping year {} outside the project span for step {}", data.year, step.id);
            continue;
        };
        for value in [
            YearValue::ProcessTime(data.process_time),
            YearValue::Mng(data.mng),
            YearValue::Office(data.office),
            YearValue::Hardware(data.hardware),
        ] {
            if let Err(e) = grid.set(index, value) {
                warn!("Ignoring yearly value for step {}: {}", step.id, e);
            }
        }
    }
    grid
}
