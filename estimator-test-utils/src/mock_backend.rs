use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use estimator::backend::{
    CreatedWorkPackage, DeleteOutcome, PersistedStep, StepPayload, StepRef, TimeMaterialBackend,
    TimeMaterialSnapshot, WorkPackageRef, YearlyStepData,
};
use estimator::catalog::{CatalogProvider, City, Country, Profile};
use estimator::errors::{BackendError, BackendResult};
use estimator::ids::{CityId, CountryId, ProfileId, ProjectId, StepId, WorkPackageId};
use estimator::time_material::YearSpan;

use crate::fixtures;

/// A request received by [`MockBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum MockCall {
    FetchTimeMaterial,
    CreateTimeMaterial(Vec<StepPayload>),
    UpdateStep {
        work_package: WorkPackageId,
        step: StepId,
        payload: StepPayload,
    },
    DeleteStep {
        work_package: WorkPackageId,
        step: StepId,
    },
    Profiles,
    Countries,
    Cities(CountryId),
}

impl MockCall {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            MockCall::CreateTimeMaterial(_) | MockCall::UpdateStep { .. } | MockCall::DeleteStep { .. }
        )
    }
}

struct MockWorkPackage {
    id: WorkPackageId,
    name: String,
    steps: Vec<PersistedStep>,
}

struct MockState {
    span: YearSpan,
    profiles: Vec<Profile>,
    countries: Vec<Country>,
    work_packages: Vec<MockWorkPackage>,
    margin_goal: Option<f64>,
    yearly_quantities: Vec<u32>,
    next_step_id: i64,
    next_work_package_id: i64,
    pending_failure: Option<(u16, Option<String>)>,
    report_step_work_packages: bool,
    report_current_work_package: bool,
    calls: Vec<MockCall>,
}

/// In-memory backend with the same cascade rules as the real service.
///
/// Every `create` opens a new work package; deleting the last step of a work
/// package removes the work package too. A saved `marginGoal` is stored on the
/// deliverable, as the real service does.
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Backend serving the fixture catalogs over the fixture project span.
    pub fn new() -> Self {
        Self::with_span(fixtures::project_span())
    }

    pub fn with_span(span: YearSpan) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                span,
                profiles: fixtures::profiles(),
                countries: fixtures::countries(),
                work_packages: Vec::new(),
                margin_goal: None,
                yearly_quantities: Vec::new(),
                next_step_id: 1,
                next_work_package_id: 1,
                pending_failure: None,
                report_step_work_packages: true,
                report_current_work_package: true,
                calls: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_profiles(&self, profiles: Vec<Profile>) {
        self.state().profiles = profiles;
    }

    pub fn set_next_step_id(&self, id: i64) {
        self.state().next_step_id = id;
    }

    pub fn set_deliverable(&self, margin_goal: Option<f64>, yearly_quantities: Vec<u32>) {
        let mut state = self.state();
        state.margin_goal = margin_goal;
        state.yearly_quantities = yearly_quantities;
    }

    /// Make the next request of any kind fail with `status`.
    pub fn fail_next_with_status(&self, status: u16, message: Option<&str>) {
        self.state().pending_failure = Some((status, message.map(str::to_string)));
    }

    /// Leave `workpackage_id` off the steps returned by fetch.
    pub fn omit_step_work_package_ids(&self) {
        self.state().report_step_work_packages = false;
    }

    /// Leave the top-level `workpackage` off fetch responses.
    pub fn omit_current_work_package(&self) {
        self.state().report_current_work_package = false;
    }

    /// Store a step in the first work package, creating it when needed.
    pub fn seed_step(
        &self,
        profile: ProfileId,
        country: &str,
        city: CityId,
        process_time: f64,
    ) -> StepRef {
        let mut state = self.state();
        let step_id = StepId(state.next_step_id);
        state.next_step_id += 1;

        if state.work_packages.is_empty() {
            let id = WorkPackageId(state.next_work_package_id);
            state.next_work_package_id += 1;
            state.work_packages.push(MockWorkPackage {
                id,
                name: "Time & Material".to_string(),
                steps: Vec::new(),
            });
        }

        let span = state.span;
        let work_package = &mut state.work_packages[0];
        work_package.steps.push(PersistedStep {
            id: step_id,
            work_package_id: Some(work_package.id),
            profile_id: profile,
            country_id: CountryId::from(country),
            city_id: city,
            process_time,
            yearly_quantities: Some(vec![1; span.len()]),
            yearly_data: Vec::new(),
        });
        StepRef {
            id: step_id,
            work_package_id: Some(work_package.id),
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    pub fn network_calls(&self) -> usize {
        self.state().calls.len()
    }

    pub fn mutation_calls(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn step_count(&self) -> usize {
        self.state()
            .work_packages
            .iter()
            .map(|work_package| work_package.steps.len())
            .sum()
    }

    pub fn work_package_ids(&self) -> Vec<WorkPackageId> {
        self.state()
            .work_packages
            .iter()
            .map(|work_package| work_package.id)
            .collect()
    }

    /// Record `call` and consume a pending failure, if any.
    fn begin(&self, call: MockCall) -> BackendResult<MutexGuard<'_, MockState>> {
        let mut state = self.state();
        state.calls.push(call);
        if let Some((status, message)) = state.pending_failure.take() {
            return Err(BackendError::Status { status, message });
        }
        Ok(state)
    }
}

fn not_found(what: &str) -> BackendError {
    BackendError::Status {
        status: 404,
        message: Some(format!("{} not found", what)),
    }
}

fn persisted(
    id: StepId,
    work_package: WorkPackageId,
    payload: &StepPayload,
    span: &YearSpan,
) -> PersistedStep {
    let yearly_data = span
        .years()
        .enumerate()
        .map(|(index, year)| YearlyStepData {
            year,
            process_time: payload.process_time_per_year.get(index).copied().unwrap_or(0.0),
            mng: payload.mng_per_year.get(index).copied().unwrap_or(0.0),
            office: payload.office_per_year.get(index).copied().unwrap_or(false),
            hardware: payload.hardware_per_year.get(index).copied().unwrap_or(false),
        })
        .collect();

    PersistedStep {
        id,
        work_package_id: Some(work_package),
        profile_id: payload.profile_id,
        country_id: payload.country_id.clone(),
        city_id: payload.city_id,
        process_time: payload.process_time,
        yearly_quantities: Some(payload.yearly_quantities.clone()),
        yearly_data,
    }
}

#[async_trait]
impl TimeMaterialBackend for MockBackend {
    async fn fetch_time_material(
        &self,
        _project: &ProjectId,
    ) -> BackendResult<TimeMaterialSnapshot> {
        let state = self.begin(MockCall::FetchTimeMaterial)?;
        let work_package = state
            .work_packages
            .first()
            .filter(|_| state.report_current_work_package)
            .map(|work_package| WorkPackageRef {
                id: work_package.id,
                name: work_package.name.clone(),
            });
        let steps = state
            .work_packages
            .iter()
            .flat_map(|work_package| work_package.steps.iter().cloned())
            .map(|mut step| {
                if !state.report_step_work_packages {
                    step.work_package_id = None;
                }
                step
            })
            .collect();
        Ok(TimeMaterialSnapshot {
            work_package,
            margin_goal: state.margin_goal,
            yearly_quantities: state.yearly_quantities.clone(),
            steps,
        })
    }

    async fn create_time_material(
        &self,
        _project: &ProjectId,
        steps: &[StepPayload],
    ) -> BackendResult<CreatedWorkPackage> {
        let mut state = self.begin(MockCall::CreateTimeMaterial(steps.to_vec()))?;
        if steps.is_empty() {
            return Err(BackendError::Status {
                status: 400,
                message: Some("At least one step is required".to_string()),
            });
        }

        let work_package_id = WorkPackageId(state.next_work_package_id);
        state.next_work_package_id += 1;
        let span = state.span;

        let mut created = Vec::with_capacity(steps.len());
        let mut refs = Vec::with_capacity(steps.len());
        for payload in steps {
            let id = StepId(state.next_step_id);
            state.next_step_id += 1;
            created.push(persisted(id, work_package_id, payload, &span));
            state.margin_goal = Some(payload.margin_goal);
            refs.push(StepRef {
                id,
                work_package_id: Some(work_package_id),
            });
        }

        let work_package = WorkPackageRef {
            id: work_package_id,
            name: "Time & Material".to_string(),
        };
        state.work_packages.push(MockWorkPackage {
            id: work_package_id,
            name: work_package.name.clone(),
            steps: created,
        });
        Ok(CreatedWorkPackage {
            work_package,
            steps: refs,
        })
    }

    async fn update_step(
        &self,
        _project: &ProjectId,
        work_package: WorkPackageId,
        step: StepId,
        payload: &StepPayload,
    ) -> BackendResult<StepRef> {
        let mut state = self.begin(MockCall::UpdateStep {
            work_package,
            step,
            payload: payload.clone(),
        })?;
        let span = state.span;
        let stored = state
            .work_packages
            .iter_mut()
            .find(|candidate| candidate.id == work_package)
            .ok_or_else(|| not_found("Work package"))?
            .steps
            .iter_mut()
            .find(|candidate| candidate.id == step)
            .ok_or_else(|| not_found("Step"))?;
        *stored = persisted(step, work_package, payload, &span);
        state.margin_goal = Some(payload.margin_goal);
        Ok(StepRef {
            id: step,
            work_package_id: Some(work_package),
        })
    }

    async fn delete_step(
        &self,
        _project: &ProjectId,
        work_package: WorkPackageId,
        step: StepId,
    ) -> BackendResult<DeleteOutcome> {
        let mut state = self.begin(MockCall::DeleteStep { work_package, step })?;
        let index = state
            .work_packages
            .iter()
            .position(|candidate| candidate.id == work_package)
            .ok_or_else(|| not_found("Work package"))?;

        let steps = &mut state.work_packages[index].steps;
        let before = steps.len();
        steps.retain(|candidate| candidate.id != step);
        if steps.len() == before {
            return Err(not_found("Step"));
        }

        let work_package_deleted = steps.is_empty();
        if work_package_deleted {
            state.work_packages.remove(index);
        }
        Ok(DeleteOutcome {
            message: Some("Step deleted".to_string()),
            work_package_deleted,
        })
    }
}

#[async_trait]
impl CatalogProvider for MockBackend {
    async fn profiles(&self) -> BackendResult<Vec<Profile>> {
        let state = self.begin(MockCall::Profiles)?;
        Ok(state.profiles.clone())
    }

    async fn countries(&self) -> BackendResult<Vec<Country>> {
        let state = self.begin(MockCall::Countries)?;
        Ok(state.countries.clone())
    }

    async fn cities(&self, country: &CountryId) -> BackendResult<Vec<City>> {
        self.begin(MockCall::Cities(country.clone()))?;
        Ok(fixtures::cities(country))
    }
}
