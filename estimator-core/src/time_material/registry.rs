//! Assignment registry
//!
//! Owns the list of Time & Material rows for one project and is the only way
//! to change it. Every mutation that reaches the backend ends with a full
//! reload, so local state always mirrors what the backend reports.

use tracing::{debug, info, warn};

use super::row::{AssignmentRow, RowPatch};
use super::sync::{build_payload, rows_from_snapshot, PersistenceSynchronizer};
use super::uniqueness::{UniquenessEnforcer, UsedPairs};
use super::year_grid::{YearSpan, YearValue};
use crate::backend::{StepRef, TimeMaterialBackend, TimeMaterialSnapshot};
use crate::catalog::{CatalogProvider, Catalogs, City, Profile};
use crate::errors::{AssignmentError, AssignmentResult};
use crate::ids::{CountryId, LocalRowId, ProfileId, ProjectId, StepId, WorkPackageId};

/// Project-level inputs the registry needs but does not own.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectSettings {
    pub span: YearSpan,
    /// Margin for new rows when the backend has no deliverable margin.
    pub default_margin_goal: f64,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            span: YearSpan::empty(),
            default_margin_goal: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AddRowMode {
    /// Prefill with the first unused profile and city.
    #[default]
    FirstAvailable,
    /// Unassigned placeholder.
    Empty,
}

pub struct AssignmentRegistry<B> {
    sync: PersistenceSynchronizer<B>,
    catalogs: Catalogs,
    settings: ProjectSettings,
    rows: Vec<AssignmentRow>,
    server_rows: Vec<AssignmentRow>,
    current_work_package_id: Option<WorkPackageId>,
    deliverable_margin_goal: Option<f64>,
}

impl<B> AssignmentRegistry<B>
where
    B: TimeMaterialBackend + CatalogProvider,
{
    /// Empty registry. Nothing is fetched until [`Self::reload`].
    pub fn new(backend: B, project_id: ProjectId, settings: ProjectSettings) -> Self {
        Self {
            sync: PersistenceSynchronizer::new(backend, project_id),
            catalogs: Catalogs::default(),
            settings,
            rows: Vec::new(),
            server_rows: Vec::new(),
            current_work_package_id: None,
            deliverable_margin_goal: None,
        }
    }

    /// Load catalogs and the project's persisted rows.
    pub async fn open(
        backend: B,
        project_id: ProjectId,
        settings: ProjectSettings,
    ) -> AssignmentResult<Self> {
        let mut registry = Self::new(backend, project_id, settings);
        registry.catalogs = Catalogs::load(registry.sync.backend()).await?;
        registry.reload().await?;
        info!(
            "Opened project {} with {} rows over {} years",
            registry.sync.project_id(),
            registry.rows.len(),
            registry.settings.span.len()
        );
        Ok(registry)
    }

    pub fn rows(&self) -> &[AssignmentRow] {
        &self.rows
    }

    pub fn row(&self, id: LocalRowId) -> Option<&AssignmentRow> {
        self.rows.iter().find(|row| row.local_id == id)
    }

    pub fn find_by_step(&self, step: StepId) -> Option<&AssignmentRow> {
        self.rows
            .iter()
            .find(|row| row.server_step_id == Some(step))
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn project_id(&self) -> &ProjectId {
        self.sync.project_id()
    }

    pub fn current_work_package_id(&self) -> Option<WorkPackageId> {
        self.current_work_package_id
    }

    pub fn available_cities_for(
        &self,
        profile: ProfileId,
        country: &CountryId,
        excluding: Option<LocalRowId>,
    ) -> Vec<&City> {
        UniquenessEnforcer::new(&self.rows, &self.catalogs).available_cities_for(
            profile, country, excluding,
        )
    }

    /// Profiles with a free city in some cached country. Call
    /// [`Self::load_all_cities`] first for an answer over the whole catalog.
    pub fn available_profiles(&self, excluding: Option<LocalRowId>) -> Vec<&Profile> {
        UniquenessEnforcer::new(&self.rows, &self.catalogs).available_profiles(excluding)
    }

    /// Fetch the city catalog of `country` unless it is already cached.
    pub async fn load_cities(&mut self, country: &CountryId) -> AssignmentResult<&[City]> {
        Ok(self
            .catalogs
            .ensure_cities(self.sync.backend(), country)
            .await?)
    }

    /// Refetch profiles and countries, and the cities of countries in use.
    pub async fn invalidate_catalogs(&mut self) -> AssignmentResult<()> {
        let mut catalogs = Catalogs::load(self.sync.backend()).await?;
        for country in self.countries_in_use() {
            catalogs.ensure_cities(self.sync.backend(), &country).await?;
        }
        self.catalogs = catalogs;
        debug!("Catalogs reloaded");
        Ok(())
    }

    pub async fn add_row(&mut self, mode: AddRowMode) -> AssignmentResult<LocalRowId> {
        self.load_all_cities().await?;
        if self.available_profiles(None).is_empty() {
            warn!("Cannot add a row: no profiles available");
            return Err(AssignmentError::NoProfilesAvailable);
        }

        let mut row = AssignmentRow::placeholder(self.settings.span.len(), self.margin_goal());
        if mode == AddRowMode::FirstAvailable {
            match UniquenessEnforcer::new(&self.rows, &self.catalogs).first_free_combination() {
                Some((profile, country, city)) => {
                    row.profile_id = Some(profile);
                    row.country_id = Some(country);
                    row.city_id = Some(city);
                }
                None => debug!("Every combination is taken, adding an empty row"),
            }
        }

        let id = row.local_id;
        self.rows.push(row);
        debug!("Added row {}", id);
        Ok(id)
    }

    pub async fn update_row(&mut self, id: LocalRowId, patch: RowPatch) -> AssignmentResult<()> {
        let index = self.index_of(id)?;
        let candidate = match self.patched(index, patch).await {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!("Rejected update of row {}: {}", id, e);
                return Err(e);
            }
        };
        self.rows[index] = candidate;
        debug!("Updated row {}", id);
        Ok(())
    }

    /// Apply `patch` to a copy of the row at `index`.
    async fn patched(&mut self, index: usize, patch: RowPatch) -> AssignmentResult<AssignmentRow> {
        let mut candidate = self.rows[index].clone();
        let used = UsedPairs::collect(&self.rows, Some(candidate.local_id));

        if let Some(days) = patch.process_time {
            check_non_negative("process-time", days)?;
            candidate.process_time = days;
        }
        if let Some(margin) = patch.margin_goal {
            check_non_negative("margin", margin)?;
            candidate.margin_goal = margin;
        }

        if let Some(profile) = patch.profile_id {
            candidate.profile_id = Some(profile);
            if let Some(city) = candidate.city_id {
                if used.contains(profile, city) {
                    debug!("Clearing city {} now taken for profile {}", city, profile);
                    candidate.city_id = None;
                }
            }
        }

        if let Some(country) = patch.country_id {
            if candidate.country_id.as_ref() != Some(&country) {
                self.catalogs
                    .ensure_cities(self.sync.backend(), &country)
                    .await?;
                candidate.country_id = Some(country);
                candidate.city_id = None;
            }
        }

        if let Some(city) = patch.city_id {
            if let Some(profile) = candidate.profile_id {
                if used.contains(profile, city) {
                    return Err(AssignmentError::DuplicateAssignment { profile, city });
                }
            }
            let country = candidate
                .country_id
                .clone()
                .ok_or(AssignmentError::MissingField("country"))?;
            self.catalogs
                .ensure_cities(self.sync.backend(), &country)
                .await?;
            if self.catalogs.city_belongs_to(&country, city) != Some(true) {
                return Err(AssignmentError::CityNotInCountry { city, country });
            }
            candidate.city_id = Some(city);
        }

        candidate.is_editing = true;
        Ok(candidate)
    }

    /// Replace one cell of the row's grid.
    pub fn set_year_value(
        &mut self,
        id: LocalRowId,
        year_index: usize,
        value: YearValue,
    ) -> AssignmentResult<()> {
        let index = self.index_of(id)?;
        let row = &mut self.rows[index];
        row.grid.set(year_index, value).map_err(|e| {
            warn!("Rejected year value for row {}: {}", id, e);
            e
        })?;
        row.is_editing = true;
        Ok(())
    }

    /// Persist the row, creating its step when it has none yet.
    pub async fn save_row(&mut self, id: LocalRowId) -> AssignmentResult<StepRef> {
        let index = self.index_of(id)?;
        let row = &self.rows[index];
        if let Some(field) = row.missing_required_field() {
            warn!("Cannot save row {}: {} is not set", id, field);
            return Err(AssignmentError::MissingField(field));
        }
        if row.process_time <= 0.0 || !row.process_time.is_finite() {
            warn!("Cannot save row {}: process time is {}", id, row.process_time);
            return Err(AssignmentError::NonPositiveProcessTime);
        }

        let payload = build_payload(row, &self.catalogs)?;
        let step = match row.server_step_id {
            None => self.sync.create(payload).await?,
            Some(step) => {
                let work_package = row
                    .server_work_package_id
                    .or(self.current_work_package_id);
                self.sync.update(Some(step), work_package, payload).await?
            }
        };

        let row = &mut self.rows[index];
        row.server_step_id = Some(step.id);
        row.server_work_package_id = step
            .work_package_id
            .or(row.server_work_package_id)
            .or(self.current_work_package_id);
        row.is_editing = false;

        self.reload().await?;
        Ok(step)
    }

    /// Remove a row, deleting its step first when it has been saved.
    pub async fn remove_row(&mut self, id: LocalRowId) -> AssignmentResult<()> {
        let index = self.index_of(id)?;
        let row = &self.rows[index];
        if !row.is_saved() {
            self.rows.remove(index);
            debug!("Dropped unsaved row {}", id);
            return Ok(());
        }

        let work_package = row.server_work_package_id.or(self.current_work_package_id);
        let outcome = self.sync.delete(row.server_step_id, work_package).await?;

        self.rows.remove(index);
        if outcome.work_package_deleted {
            self.current_work_package_id = None;
        }
        self.reload().await
    }

    /// Replace persisted rows with the backend's current state.
    pub async fn reload(&mut self) -> AssignmentResult<()> {
        let snapshot = self.sync.fetch().await?;

        let mut countries: Vec<CountryId> = Vec::new();
        for step in &snapshot.steps {
            if !countries.contains(&step.country_id) {
                countries.push(step.country_id.clone());
            }
        }
        for country in &countries {
            if let Err(e) = self
                .catalogs
                .ensure_cities(self.sync.backend(), country)
                .await
            {
                warn!("Could not load cities for {}: {}", country, e);
            }
        }

        self.apply_snapshot(snapshot);
        Ok(())
    }

    fn apply_snapshot(&mut self, snapshot: TimeMaterialSnapshot) {
        self.deliverable_margin_goal = snapshot.margin_goal;
        let mut rows = rows_from_snapshot(
            &snapshot,
            &self.settings.span,
            self.settings.default_margin_goal,
        );

        for row in &mut rows {
            if let Some(previous) = self
                .rows
                .iter()
                .find(|previous| previous.is_saved() && previous.server_step_id == row.server_step_id)
            {
                row.local_id = previous.local_id;
                row.is_expanded = previous.is_expanded;
            }
        }
        self.server_rows = rows.clone();

        let mut used = UsedPairs::collect(&rows, None);
        let mut retained = 0;
        for mut row in self.rows.drain(..).filter(|row| !row.is_saved()) {
            if let Some((profile, city)) = row.pair() {
                if !used.insert(profile, city) {
                    debug!("Clearing city {} on unsaved row {}", city, row.local_id);
                    row.city_id = None;
                }
            }
            rows.push(row);
            retained += 1;
        }

        self.current_work_package_id = snapshot
            .work_package
            .as_ref()
            .map(|work_package| work_package.id)
            .or_else(|| rows.iter().find_map(|row| row.server_work_package_id));
        self.rows = rows;
        debug!(
            "Synchronized {} persisted and {} unsaved rows",
            self.server_rows.len(),
            retained
        );
    }

    pub fn begin_edit(&mut self, id: LocalRowId) -> AssignmentResult<()> {
        let index = self.index_of(id)?;
        self.rows[index].is_editing = true;
        Ok(())
    }

    /// Discard local edits of a saved row. Unsaved rows just leave edit mode.
    pub fn cancel_edit(&mut self, id: LocalRowId) -> AssignmentResult<()> {
        let index = self.index_of(id)?;
        let row = &self.rows[index];
        let restored = row.server_step_id.and_then(|step| {
            self.server_rows
                .iter()
                .find(|server| server.server_step_id == Some(step))
        });

        match restored {
            Some(server) => {
                let mut server = server.clone();
                server.local_id = row.local_id;
                server.is_expanded = row.is_expanded;
                server.is_editing = false;
                self.rows[index] = server;
            }
            None => self.rows[index].is_editing = false,
        }
        Ok(())
    }

    /// Flip the row's expanded flag and return the new value.
    pub fn toggle_expanded(&mut self, id: LocalRowId) -> AssignmentResult<bool> {
        let index = self.index_of(id)?;
        let row = &mut self.rows[index];
        row.is_expanded = !row.is_expanded;
        Ok(row.is_expanded)
    }

    /// Re-align every grid to `span`, keeping values for years in both spans.
    pub fn set_year_span(&mut self, span: YearSpan) {
        let previous = self.settings.span;
        if previous == span {
            return;
        }
        for row in self.rows.iter_mut().chain(self.server_rows.iter_mut()) {
            row.grid = row.grid.realign(&previous, &span);
        }
        self.settings.span = span;
        info!("Project span changed to {} years", span.len());
    }

    fn margin_goal(&self) -> f64 {
        self.deliverable_margin_goal
            .unwrap_or(self.settings.default_margin_goal)
    }

    fn index_of(&self, id: LocalRowId) -> AssignmentResult<usize> {
        self.rows
            .iter()
            .position(|row| row.local_id == id)
            .ok_or(AssignmentError::RowNotFound(id))
    }

    fn countries_in_use(&self) -> Vec<CountryId> {
        let mut countries: Vec<CountryId> = Vec::new();
        for country in self.rows.iter().filter_map(|row| row.country_id.as_ref()) {
            if !countries.contains(country) {
                countries.push(country.clone());
            }
        }
        countries
    }

    /// Fetch the city catalog of every country not cached yet.
    pub async fn load_all_cities(&mut self) -> AssignmentResult<()> {
        let countries: Vec<CountryId> = self
            .catalogs
            .countries()
            .iter()
            .map(|country| country.id.clone())
            .collect();
        for country in &countries {
            self.catalogs
                .ensure_cities(self.sync.backend(), country)
                .await?;
        }
        Ok(())
    }
}

fn check_non_negative(field: &'static str, value: f64) -> AssignmentResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(AssignmentError::invalid_value(
            field,
            format!("{} must be a non-negative number", value),
        ));
    }
    Ok(())
}
