use serde::Serialize;

use super::year_grid::YearlyGrid;
use crate::ids::{CityId, CountryId, LocalRowId, ProfileId, StepId, WorkPackageId};

/// One profile–country–city assignment with its per-year parameters.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRow {
    pub local_id: LocalRowId,
    pub profile_id: Option<ProfileId>,
    pub country_id: Option<CountryId>,
    pub city_id: Option<CityId>,
    pub process_time: f64,
    pub margin_goal: f64,
    pub grid: YearlyGrid,
    pub server_step_id: Option<StepId>,
    pub server_work_package_id: Option<WorkPackageId>,
    pub is_editing: bool,
    pub is_expanded: bool,
}

impl AssignmentRow {
    /// Unassigned row with default grid values for `years` project years.
    pub fn placeholder(years: usize, margin_goal: f64) -> Self {
        Self {
            local_id: LocalRowId::new(),
            profile_id: None,
            country_id: None,
            city_id: None,
            process_time: 0.0,
            margin_goal,
            grid: YearlyGrid::with_defaults(years),
            server_step_id: None,
            server_work_package_id: None,
            is_editing: true,
            is_expanded: false,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.server_step_id.is_some()
    }

    /// The pair that must stay unique across the registry.
    pub fn pair(&self) -> Option<(ProfileId, CityId)> {
        self.profile_id.zip(self.city_id)
    }

    /// First required field still unset, in form order.
    pub fn missing_required_field(&self) -> Option<&'static str> {
        if self.profile_id.is_none() {
            Some("profile")
        } else if self.country_id.is_none() {
            Some("country")
        } else if self.city_id.is_none() {
            Some("city")
        } else {
            None
        }
    }
}

/// Partial update for [`AssignmentRow`]; `None` leaves a field as is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowPatch {
    pub profile_id: Option<ProfileId>,
    pub country_id: Option<CountryId>,
    pub city_id: Option<CityId>,
    pub process_time: Option<f64>,
    pub margin_goal: Option<f64>,
}

impl RowPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(mut self, profile_id: ProfileId) -> Self {
        self.profile_id = Some(profile_id);
        self
    }

    pub fn country(mut self, country_id: impl Into<CountryId>) -> Self {
        self.country_id = Some(country_id.into());
        self
    }

    pub fn city(mut self, city_id: CityId) -> Self {
        self.city_id = Some(city_id);
        self
    }

    pub fn process_time(mut self, days: f64) -> Self {
        self.process_time = Some(days);
        self
    }

    pub fn margin_goal(mut self, percentage: f64) -> Self {
        self.margin_goal = Some(percentage);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
