use anyhow::{anyhow, bail, Context, Result};
use estimator::backend::{HttpBackend, StepRef};
use estimator::catalog::{CatalogProvider, Catalogs};
use estimator::config::ClientConfig;
use estimator::ids::{CityId, CountryId, LocalRowId, ProfileId, StepId};
use estimator::time_material::{
    AddRowMode, AssignmentRegistry, AssignmentRow, RowPatch, YearField,
};
use serde_json::{json, Value};
use tracing::info;

type Registry = AssignmentRegistry<HttpBackend>;

/// Fields accepted by `assign` and `update`.
#[derive(Debug, Default)]
pub struct RowFields {
    pub profile: Option<i64>,
    pub country: Option<String>,
    pub city: Option<i64>,
    pub process_time: Option<f64>,
    pub margin: Option<f64>,
}

impl RowFields {
    fn into_patch(self) -> RowPatch {
        RowPatch {
            profile_id: self.profile.map(ProfileId),
            country_id: self.country.map(CountryId::from),
            city_id: self.city.map(CityId),
            process_time: self.process_time,
            margin_goal: self.margin,
        }
    }
}

fn backend(config: &ClientConfig) -> HttpBackend {
    HttpBackend::new(config.api_url.clone())
}

async fn open_registry(config: &ClientConfig) -> Result<Registry> {
    let project = config.project_id()?;
    AssignmentRegistry::open(backend(config), project, config.project_settings())
        .await
        .with_context(|| format!("failed to load Time & Material data from {}", config.api_url))
}

fn row_for_step(registry: &Registry, step: i64) -> Result<LocalRowId> {
    registry
        .find_by_step(StepId(step))
        .map(|row| row.local_id)
        .ok_or_else(|| anyhow!("step {} not found in project {}", step, registry.project_id()))
}

fn row_json(row: &AssignmentRow, catalogs: &Catalogs) -> Result<Value> {
    let mut value = serde_json::to_value(row)?;
    value["profileName"] = json!(row.profile_id.and_then(|id| catalogs.profile_name(id)));
    value["cityName"] = json!(row
        .country_id
        .as_ref()
        .zip(row.city_id)
        .and_then(|(country, city)| catalogs.city_name(country, city)));
    Ok(value)
}

fn step_json(step: &StepRef) -> Value {
    json!({
        "stepId": step.id,
        "workPackageId": step.work_package_id,
    })
}

pub async fn list(config: &ClientConfig) -> Result<Value> {
    let registry = open_registry(config).await?;
    let rows = registry
        .rows()
        .iter()
        .map(|row| row_json(row, registry.catalogs()))
        .collect::<Result<Vec<_>>>()?;
    Ok(json!({
        "years": registry.settings().span.years().collect::<Vec<_>>(),
        "workPackageId": registry.current_work_package_id(),
        "rows": rows,
    }))
}

pub async fn catalog_profiles(config: &ClientConfig) -> Result<Value> {
    Ok(json!(backend(config).profiles().await?))
}

pub async fn catalog_countries(config: &ClientConfig) -> Result<Value> {
    Ok(json!(backend(config).countries().await?))
}

pub async fn catalog_cities(config: &ClientConfig, country: String) -> Result<Value> {
    Ok(json!(backend(config).cities(&CountryId::from(country)).await?))
}

/// Free cities for a profile in a country, or profiles with any free city left.
pub async fn available(
    config: &ClientConfig,
    profile: Option<i64>,
    country: Option<String>,
) -> Result<Value> {
    let mut registry = open_registry(config).await?;
    match (profile, country) {
        (Some(profile), Some(country)) => {
            let country = CountryId::from(country);
            registry.load_cities(&country).await?;
            Ok(json!(registry.available_cities_for(ProfileId(profile), &country, None)))
        }
        (None, None) => {
            registry.load_all_cities().await?;
            Ok(json!(registry.available_profiles(None)))
        }
        (Some(_), None) => bail!("--profile requires --country"),
        (None, Some(_)) => bail!("--country requires --profile"),
    }
}

pub async fn assign(config: &ClientConfig, fields: RowFields) -> Result<Value> {
    let mut registry = open_registry(config).await?;
    let id = registry.add_row(AddRowMode::Empty).await?;
    registry.update_row(id, fields.into_patch()).await?;
    let step = registry.save_row(id).await?;
    info!("Assigned step {}", step.id);
    Ok(step_json(&step))
}

pub async fn update(config: &ClientConfig, step: i64, fields: RowFields) -> Result<Value> {
    let patch = fields.into_patch();
    if patch.is_empty() {
        bail!("nothing to update; pass at least one field");
    }

    let mut registry = open_registry(config).await?;
    let id = row_for_step(&registry, step)?;
    registry.update_row(id, patch).await?;
    let saved = registry.save_row(id).await?;
    Ok(step_json(&saved))
}

pub async fn set_year(
    config: &ClientConfig,
    step: i64,
    year: i32,
    field: YearField,
    value: &str,
) -> Result<Value> {
    let mut registry = open_registry(config).await?;
    let id = row_for_step(&registry, step)?;
    let index = registry
        .settings()
        .span
        .index_of(year)
        .ok_or_else(|| anyhow!("year {} is outside the project span", year))?;

    registry.set_year_value(id, index, field.parse_value(value)?)?;
    let saved = registry.save_row(id).await?;
    Ok(step_json(&saved))
}

pub async fn remove(config: &ClientConfig, step: i64) -> Result<Value> {
    let mut registry = open_registry(config).await?;
    let id = row_for_step(&registry, step)?;
    registry.remove_row(id).await?;
    info!("Removed step {}", step);
    Ok(json!({
        "removedStepId": step,
        "workPackageId": registry.current_work_package_id(),
        "remainingRows": registry.rows().len(),
    }))
}
