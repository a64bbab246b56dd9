//! Wire shapes for the Time & Material backend.
//!
//! Responses are decoded into the `*Dto` structs and then validated into the
//! domain types of [`crate::backend`]; nothing untyped crosses this boundary.

use serde::{Deserialize, Serialize};

use super::{
    CreatedWorkPackage, DeleteOutcome, PersistedStep, StepRef, TimeMaterialSnapshot,
    WorkPackageRef, YearlyStepData,
};
use crate::errors::{BackendError, BackendResult};
use crate::ids::{CityId, CountryId, ProfileId, StepId, WorkPackageId};

/// Body of a step create or update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepPayload {
    pub step_name: String,
    pub profile_id: ProfileId,
    pub country_id: CountryId,
    pub city_id: CityId,
    pub process_time: f64,
    pub units: u32,
    pub margin_goal: f64,
    pub yearly_quantities: Vec<u32>,
    pub process_time_per_year: Vec<f64>,
    pub mng_per_year: Vec<f64>,
    pub office_per_year: Vec<bool>,
    pub hardware_per_year: Vec<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateTimeMaterialRequest {
    pub steps: Vec<StepPayload>,
}

#[derive(Debug, Deserialize)]
pub struct WorkPackageDto {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverableDto {
    #[serde(default)]
    pub margin_goal: Option<f64>,
    #[serde(default)]
    pub yearly_quantities: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyDataDto {
    pub year: i32,
    #[serde(default)]
    pub process_time: Option<f64>,
    #[serde(default)]
    pub mng: Option<f64>,
    #[serde(default)]
    pub office: Option<bool>,
    #[serde(default)]
    pub hardware: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDto {
    pub id: i64,
    pub profile_id: i64,
    pub country_id: String,
    pub city_id: i64,
    #[serde(default)]
    pub process_time: Option<f64>,
    #[serde(rename = "workpackage_id", alias = "workpackageId", default)]
    pub workpackage_id: Option<i64>,
    #[serde(default)]
    pub yearly_quantities: Option<Vec<i64>>,
    #[serde(default)]
    pub yearly_data: Vec<YearlyDataDto>,
}

#[derive(Debug, Deserialize)]
pub struct TimeMaterialDto {
    #[serde(default)]
    pub workpackage: Option<WorkPackageDto>,
    #[serde(default)]
    pub deliverable: Option<DeliverableDto>,
    #[serde(default)]
    pub steps: Vec<StepDto>,
}

#[derive(Debug, Deserialize)]
pub struct StepRefDto {
    pub id: i64,
    #[serde(rename = "workpackage_id", alias = "workpackageId", default)]
    pub workpackage_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatedTimeMaterialDto {
    pub workpackage: WorkPackageDto,
    #[serde(default)]
    pub steps: Vec<StepRefDto>,
}

/// Update responses come either bare or wrapped in `{"step": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UpdatedStepDto {
    Wrapped { step: StepRefDto },
    Bare(StepRefDto),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteConfirmationDto {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "workpackage_deleted")]
    pub workpackage_deleted: bool,
}

fn positive_id(kind: &str, value: i64) -> BackendResult<i64> {
    if value <= 0 {
        return Err(BackendError::invalid(format!(
            "{} id must be positive, got {}",
            kind, value
        )));
    }
    Ok(value)
}

fn non_negative(field: &str, value: f64) -> BackendResult<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(BackendError::invalid(format!(
            "{} must be a non-negative number, got {}",
            field, value
        )));
    }
    Ok(value)
}

fn quantities(values: Vec<i64>) -> BackendResult<Vec<u32>> {
    values
        .into_iter()
        .map(|q| {
            u32::try_from(q)
                .map_err(|_| BackendError::invalid(format!("invalid yearly quantity {}", q)))
        })
        .collect()
}

impl TryFrom<WorkPackageDto> for WorkPackageRef {
    type Error = BackendError;

    fn try_from(dto: WorkPackageDto) -> BackendResult<Self> {
        Ok(Self {
            id: WorkPackageId(positive_id("work package", dto.id)?),
            name: dto.name.unwrap_or_default(),
        })
    }
}

impl TryFrom<YearlyDataDto> for YearlyStepData {
    type Error = BackendError;

    fn try_from(dto: YearlyDataDto) -> BackendResult<Self> {
        Ok(Self {
            year: dto.year,
            process_time: non_negative("yearly process time", dto.process_time.unwrap_or(0.0))?,
            mng: non_negative("yearly mng", dto.mng.unwrap_or(0.0))?,
            office: dto.office.unwrap_or(false),
            hardware: dto.hardware.unwrap_or(false),
        })
    }
}

impl TryFrom<StepDto> for PersistedStep {
    type Error = BackendError;

    fn try_from(dto: StepDto) -> BackendResult<Self> {
        let country = dto.country_id.trim();
        if country.is_empty() {
            return Err(BackendError::invalid(format!(
                "step {} has an empty country id",
                dto.id
            )));
        }

        Ok(Self {
            id: StepId(positive_id("step", dto.id)?),
            work_package_id: dto
                .workpackage_id
                .map(|id| positive_id("work package", id).map(WorkPackageId))
                .transpose()?,
            profile_id: ProfileId(positive_id("profile", dto.profile_id)?),
            country_id: CountryId::from(country),
            city_id: CityId(positive_id("city", dto.city_id)?),
            process_time: non_negative("process time", dto.process_time.unwrap_or(0.0))?,
            yearly_quantities: dto.yearly_quantities.map(quantities).transpose()?,
            yearly_data: dto
                .yearly_data
                .into_iter()
                .map(YearlyStepData::try_from)
                .collect::<BackendResult<Vec<_>>>()?,
        })
    }
}

impl TryFrom<TimeMaterialDto> for TimeMaterialSnapshot {
    type Error = BackendError;

    fn try_from(dto: TimeMaterialDto) -> BackendResult<Self> {
        let (margin_goal, yearly_quantities) = match dto.deliverable {
            Some(deliverable) => (
                deliverable.margin_goal,
                quantities(deliverable.yearly_quantities.unwrap_or_default())?,
            ),
            None => (None, Vec::new()),
        };

        Ok(Self {
            work_package: dto.workpackage.map(WorkPackageRef::try_from).transpose()?,
            margin_goal,
            yearly_quantities,
            steps: dto
                .steps
                .into_iter()
                .map(PersistedStep::try_from)
                .collect::<BackendResult<Vec<_>>>()?,
        })
    }
}

impl TryFrom<StepRefDto> for StepRef {
    type Error = BackendError;

    fn try_from(dto: StepRefDto) -> BackendResult<Self> {
        Ok(Self {
            id: StepId(positive_id("step", dto.id)?),
            work_package_id: dto
                .workpackage_id
                .map(|id| positive_id("work package", id).map(WorkPackageId))
                .transpose()?,
        })
    }
}

impl TryFrom<CreatedTimeMaterialDto> for CreatedWorkPackage {
    type Error = BackendError;

    fn try_from(dto: CreatedTimeMaterialDto) -> BackendResult<Self> {
        let work_package = WorkPackageRef::try_from(dto.workpackage)?;
        let steps = dto
            .steps
            .into_iter()
            .map(StepRef::try_from)
            .collect::<BackendResult<Vec<_>>>()?;
        if steps.is_empty() {
            return Err(BackendError::invalid("create response contains no steps"));
        }
        Ok(Self {
            work_package,
            steps,
        })
    }
}

impl TryFrom<UpdatedStepDto> for StepRef {
    type Error = BackendError;

    fn try_from(dto: UpdatedStepDto) -> BackendResult<Self> {
        match dto {
            UpdatedStepDto::Wrapped { step } | UpdatedStepDto::Bare(step) => {
                StepRef::try_from(step)
            }
        }
    }
}

impl TryFrom<DeleteConfirmationDto> for DeleteOutcome {
    type Error = BackendError;

    fn try_from(dto: DeleteConfirmationDto) -> BackendResult<Self> {
        if dto.success == Some(false) {
            return Err(BackendError::Rejected(
                dto.message
                    .unwrap_or_else(|| crate::errors::GENERIC_FAILURE_MESSAGE.to_string()),
            ));
        }
        Ok(Self {
            message: dto.message,
            work_package_deleted: dto.workpackage_deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_from_backend_json() {
        let dto: TimeMaterialDto = serde_json::from_value(json!({
            "workpackage": {"id": 7, "name": "Time & Material"},
            "deliverable": {"marginGoal": 25.0, "yearlyQuantities": [2, 3]},
            "steps": [{
                "id": 42,
                "profileId": 1,
                "countryId": "ES",
                "cityId": 10,
                "processTime": 1.5,
                "workpackage_id": 7,
                "yearlyData": [
                    {"year": 2024, "processTime": 1.0, "mng": 5.0, "office": true, "hardware": false}
                ]
            }]
        }))
        .unwrap();

        let snapshot = TimeMaterialSnapshot::try_from(dto).unwrap();
        assert_eq!(snapshot.work_package.as_ref().map(|wp| wp.id), Some(WorkPackageId(7)));
        assert_eq!(snapshot.margin_goal, Some(25.0));
        assert_eq!(snapshot.yearly_quantities, vec![2, 3]);
        let step = &snapshot.steps[0];
        assert_eq!(step.id, StepId(42));
        assert_eq!(step.work_package_id, Some(WorkPackageId(7)));
        assert_eq!(step.country_id, CountryId::from("ES"));
        assert!(step.yearly_data[0].office);
    }

    #[test]
    fn empty_snapshot_after_cascade() {
        let dto: TimeMaterialDto =
            serde_json::from_value(json!({"workpackage": null, "steps": []})).unwrap();
        let snapshot = TimeMaterialSnapshot::try_from(dto).unwrap();
        assert!(snapshot.work_package.is_none());
        assert!(snapshot.steps.is_empty());
    }

    #[test]
    fn rejects_invalid_ids_and_numbers() {
        let dto: StepDto = serde_json::from_value(json!({
            "id": 0, "profileId": 1, "countryId": "ES", "cityId": 10
        }))
        .unwrap();
        assert!(PersistedStep::try_from(dto).is_err());

        let dto: StepDto = serde_json::from_value(json!({
            "id": 3, "profileId": 1, "countryId": "ES", "cityId": 10, "processTime": -2.0
        }))
        .unwrap();
        assert!(PersistedStep::try_from(dto).is_err());

        let dto: TimeMaterialDto = serde_json::from_value(json!({
            "deliverable": {"yearlyQuantities": [1, -1]}
        }))
        .unwrap();
        assert!(TimeMaterialSnapshot::try_from(dto).is_err());
    }

    #[test]
    fn update_response_bare_or_wrapped() {
        let bare: UpdatedStepDto = serde_json::from_value(json!({"id": 5})).unwrap();
        assert_eq!(StepRef::try_from(bare).unwrap().id, StepId(5));

        let wrapped: UpdatedStepDto =
            serde_json::from_value(json!({"step": {"id": 6, "workpackage_id": 2}})).unwrap();
        let step = StepRef::try_from(wrapped).unwrap();
        assert_eq!(step.work_package_id, Some(WorkPackageId(2)));
    }

    #[test]
    fn delete_confirmation_failure_is_rejected() {
        let dto: DeleteConfirmationDto =
            serde_json::from_value(json!({"success": false, "message": "Step is locked"})).unwrap();
        let err = DeleteOutcome::try_from(dto).unwrap_err();
        assert_eq!(err.user_message(), "Step is locked");

        let dto: DeleteConfirmationDto =
            serde_json::from_value(json!({"success": true, "workpackageDeleted": true})).unwrap();
        assert!(DeleteOutcome::try_from(dto).unwrap().work_package_deleted);
    }

    #[test]
    fn step_payload_uses_camel_case() {
        let payload = StepPayload {
            step_name: "Consultant - Madrid".to_string(),
            profile_id: ProfileId(1),
            country_id: CountryId::from("ES"),
            city_id: CityId(10),
            process_time: 2.0,
            units: 3,
            margin_goal: 20.0,
            yearly_quantities: vec![1, 2],
            process_time_per_year: vec![0.0, 0.0],
            mng_per_year: vec![0.0, 0.0],
            office_per_year: vec![false, true],
            hardware_per_year: vec![false, false],
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["stepName"], "Consultant - Madrid");
        assert_eq!(value["countryId"], "ES");
        assert_eq!(value["processTimePerYear"], json!([0.0, 0.0]));
        assert_eq!(value["officePerYear"], json!([false, true]));
    }
}
