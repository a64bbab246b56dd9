use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::payloads::{
    CreateTimeMaterialRequest, CreatedTimeMaterialDto, DeleteConfirmationDto, StepPayload,
    TimeMaterialDto, UpdatedStepDto,
};
use super::{CreatedWorkPackage, DeleteOutcome, StepRef, TimeMaterialBackend, TimeMaterialSnapshot};
use crate::catalog::{CatalogProvider, City, Country, Profile};
use crate::errors::{BackendError, BackendResult};
use crate::ids::{CountryId, ProjectId, StepId, WorkPackageId};

/// [`TimeMaterialBackend`] and [`CatalogProvider`] over HTTP/JSON.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn step_url(&self, project: &ProjectId, work_package: WorkPackageId, step: StepId) -> String {
        self.url(&format!(
            "projects/{}/workpackages/{}/steps/{}",
            project, work_package, step
        ))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> BackendResult<T> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        read_json(response).await
    }
}

/// Message from a failed response body: `{"error": "..."}` or `{"error": {"message": "..."}}`.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    let message = match error {
        Value::String(message) => message.as_str(),
        Value::Object(fields) => fields.get("message")?.as_str()?,
        _ => return None,
    };
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

async fn read_json<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = extract_error_message(&body);
        debug!("Backend returned {}: {:?}", status, message);
        return Err(BackendError::Status {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body)
        .map_err(|e| BackendError::invalid(format!("could not decode response body: {}", e)))
}

#[async_trait]
impl TimeMaterialBackend for HttpBackend {
    async fn fetch_time_material(
        &self,
        project: &ProjectId,
    ) -> BackendResult<TimeMaterialSnapshot> {
        let dto: TimeMaterialDto = self
            .get_json(&format!("projects/{}/time-material", project))
            .await?;
        TimeMaterialSnapshot::try_from(dto)
    }

    async fn create_time_material(
        &self,
        project: &ProjectId,
        steps: &[StepPayload],
    ) -> BackendResult<CreatedWorkPackage> {
        let url = self.url(&format!("projects/{}/time-material", project));
        debug!("POST {} ({} steps)", url, steps.len());
        let request = CreateTimeMaterialRequest {
            steps: steps.to_vec(),
        };
        let response = self.client.post(&url).json(&request).send().await?;
        let dto: CreatedTimeMaterialDto = read_json(response).await?;
        CreatedWorkPackage::try_from(dto)
    }

    async fn update_step(
        &self,
        project: &ProjectId,
        work_package: WorkPackageId,
        step: StepId,
        payload: &StepPayload,
    ) -> BackendResult<StepRef> {
        let url = self.step_url(project, work_package, step);
        debug!("PUT {}", url);
        let response = self.client.put(&url).json(payload).send().await?;
        let dto: UpdatedStepDto = read_json(response).await?;
        StepRef::try_from(dto)
    }

    async fn delete_step(
        &self,
        project: &ProjectId,
        work_package: WorkPackageId,
        step: StepId,
    ) -> BackendResult<DeleteOutcome> {
        let url = self.step_url(project, work_package, step);
        debug!("DELETE {}", url);
        let response = self.client.delete(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }
        if body.trim().is_empty() {
            return Ok(DeleteOutcome::default());
        }
        let dto: DeleteConfirmationDto = serde_json::from_str(&body)
            .map_err(|e| BackendError::invalid(format!("could not decode response body: {}", e)))?;
        DeleteOutcome::try_from(dto)
    }
}

#[async_trait]
impl CatalogProvider for HttpBackend {
    async fn profiles(&self) -> BackendResult<Vec<Profile>> {
        self.get_json("profiles").await
    }

    async fn countries(&self) -> BackendResult<Vec<Country>> {
        self.get_json("countries").await
    }

    async fn cities(&self, country: &CountryId) -> BackendResult<Vec<City>> {
        self.get_json(&format!("countries/{}/cities", country)).await
    }
}
