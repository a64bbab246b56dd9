use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::registry::{AddRowMode, AssignmentRegistry};
use super::row::{AssignmentRow, RowPatch};
use super::year_grid::YearValue;
use crate::backend::{StepRef, TimeMaterialBackend};
use crate::catalog::{CatalogProvider, City, Profile};
use crate::errors::{AssignmentError, AssignmentResult};
use crate::ids::{CountryId, LocalRowId, ProfileId};

const COMMAND_BUFFER: usize = 64;

enum RegistryCommand {
    Rows {
        response: oneshot::Sender<Vec<AssignmentRow>>,
    },
    AddRow {
        mode: AddRowMode,
        response: oneshot::Sender<AssignmentResult<LocalRowId>>,
    },
    UpdateRow {
        id: LocalRowId,
        patch: RowPatch,
        response: oneshot::Sender<AssignmentResult<()>>,
    },
    SetYearValue {
        id: LocalRowId,
        year_index: usize,
        value: YearValue,
        response: oneshot::Sender<AssignmentResult<()>>,
    },
    SaveRow {
        id: LocalRowId,
        response: oneshot::Sender<AssignmentResult<StepRef>>,
    },
    RemoveRow {
        id: LocalRowId,
        response: oneshot::Sender<AssignmentResult<()>>,
    },
    Reload {
        response: oneshot::Sender<AssignmentResult<()>>,
    },
    AvailableCities {
        profile: ProfileId,
        country: CountryId,
        excluding: Option<LocalRowId>,
        response: oneshot::Sender<AssignmentResult<Vec<City>>>,
    },
    AvailableProfiles {
        excluding: Option<LocalRowId>,
        response: oneshot::Sender<AssignmentResult<Vec<Profile>>>,
    },
    Shutdown {
        response: oneshot::Sender<()>,
    },
}

/// Shared access to one registry from many tasks.
///
/// A single task owns the registry and handles one command at a time, so
/// mutations from different callers never interleave.
pub struct RegistryHandle {
    command_tx: mpsc::Sender<RegistryCommand>,
    task_handle: tokio::task::JoinHandle<()>,
}

impl RegistryHandle {
    pub fn spawn<B>(registry: AssignmentRegistry<B>) -> Self
    where
        B: TimeMaterialBackend + CatalogProvider + 'static,
    {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let project = registry.project_id().clone();
        let task_handle = tokio::spawn(run(registry, rx));
        debug!("Registry actor spawned for project {}", project);

        Self {
            command_tx: tx,
            task_handle,
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> AssignmentResult<T> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(command(tx))
            .await
            .map_err(|_| AssignmentError::Unavailable("registry actor stopped".to_string()))?;
        rx.await
            .map_err(|_| AssignmentError::Unavailable("response channel closed".to_string()))
    }

    pub async fn rows(&self) -> AssignmentResult<Vec<AssignmentRow>> {
        self.request(|response| RegistryCommand::Rows { response })
            .await
    }

    pub async fn add_row(&self, mode: AddRowMode) -> AssignmentResult<LocalRowId> {
        self.request(|response| RegistryCommand::AddRow { mode, response })
            .await?
    }

    pub async fn update_row(&self, id: LocalRowId, patch: RowPatch) -> AssignmentResult<()> {
        self.request(|response| RegistryCommand::UpdateRow {
            id,
            patch,
            response,
        })
        .await?
    }

    pub async fn set_year_value(
        &self,
        id: LocalRowId,
        year_index: usize,
        value: YearValue,
    ) -> AssignmentResult<()> {
        self.request(|response| RegistryCommand::SetYearValue {
            id,
            year_index,
            value,
            response,
        })
        .await?
    }

    pub async fn save_row(&self, id: LocalRowId) -> AssignmentResult<StepRef> {
        self.request(|response| RegistryCommand::SaveRow { id, response })
            .await?
    }

    pub async fn remove_row(&self, id: LocalRowId) -> AssignmentResult<()> {
        self.request(|response| RegistryCommand::RemoveRow { id, response })
            .await?
    }

    pub async fn reload(&self) -> AssignmentResult<()> {
        self.request(|response| RegistryCommand::Reload { response })
            .await?
    }

    /// Cities still free for `profile`, fetching the country's catalog if needed.
    pub async fn available_cities_for(
        &self,
        profile: ProfileId,
        country: CountryId,
        excluding: Option<LocalRowId>,
    ) -> AssignmentResult<Vec<City>> {
        self.request(|response| RegistryCommand::AvailableCities {
            profile,
            country,
            excluding,
            response,
        })
        .await?
    }

    /// Profiles with a free city, after loading every country's cities.
    pub async fn available_profiles(
        &self,
        excluding: Option<LocalRowId>,
    ) -> AssignmentResult<Vec<Profile>> {
        self.request(|response| RegistryCommand::AvailableProfiles {
            excluding,
            response,
        })
        .await?
    }

    pub async fn shutdown(self) {
        let (tx, rx) = oneshot::channel();
        let _ = self
            .command_tx
            .send(RegistryCommand::Shutdown { response: tx })
            .await;
        let _ = rx.await;
        let _ = self.task_handle.await;
    }
}

async fn run<B>(mut registry: AssignmentRegistry<B>, mut command_rx: mpsc::Receiver<RegistryCommand>)
where
    B: TimeMaterialBackend + CatalogProvider,
{
    debug!(
        "Registry event loop started for project {}",
        registry.project_id()
    );

    while let Some(command) = command_rx.recv().await {
        match command {
            RegistryCommand::Rows { response } => {
                let _ = response.send(registry.rows().to_vec());
            }
            RegistryCommand::AddRow { mode, response } => {
                let _ = response.send(registry.add_row(mode).await);
            }
            RegistryCommand::UpdateRow {
                id,
                patch,
                response,
            } => {
                let _ = response.send(registry.update_row(id, patch).await);
            }
            RegistryCommand::SetYearValue {
                id,
                year_index,
                value,
                response,
            } => {
                let _ = response.send(registry.set_year_value(id, year_index, value));
            }
            RegistryCommand::SaveRow { id, response } => {
                let _ = response.send(registry.save_row(id).await);
            }
            RegistryCommand::RemoveRow { id, response } => {
                let _ = response.send(registry.remove_row(id).await);
            }
            RegistryCommand::Reload { response } => {
                let _ = response.send(registry.reload().await);
            }
            RegistryCommand::AvailableCities {
                profile,
                country,
                excluding,
                response,
            } => {
                let loaded = registry.load_cities(&country).await.map(|_| ());
                let result = loaded.map(|()| {
                    registry
                        .available_cities_for(profile, &country, excluding)
                        .into_iter()
                        .cloned()
                        .collect()
                });
                let _ = response.send(result);
            }
            RegistryCommand::AvailableProfiles {
                excluding,
                response,
            } => {
                let loaded = registry.load_all_cities().await;
                let result = loaded.map(|()| {
                    registry
                        .available_profiles(excluding)
                        .into_iter()
                        .cloned()
                        .collect()
                });
                let _ = response.send(result);
            }
            RegistryCommand::Shutdown { response } => {
                let _ = response.send(());
                break;
            }
        }
    }

    debug!(
        "Registry event loop stopped for project {}",
        registry.project_id()
    );
}
