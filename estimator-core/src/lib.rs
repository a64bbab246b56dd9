pub mod backend;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod ids;
pub mod time_material;

pub use backend::{HttpBackend, TimeMaterialBackend};
pub use catalog::{CatalogProvider, Catalogs};
pub use config::ClientConfig;
pub use errors::{AssignmentError, AssignmentResult, BackendError, BackendResult};
pub use time_material::{AddRowMode, AssignmentRegistry, RegistryHandle, RowPatch};
