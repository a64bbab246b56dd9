//! Time & Material profile assignments
//!
//! [`AssignmentRegistry`] owns the rows of one project. [`RegistryHandle`]
//! shares a registry between tasks.

pub mod actor;
pub mod registry;
pub mod row;
pub mod sync;
pub mod uniqueness;
pub mod year_grid;

pub use actor::RegistryHandle;
pub use registry::{AddRowMode, AssignmentRegistry, ProjectSettings};
pub use row::{AssignmentRow, RowPatch};
pub use sync::PersistenceSynchronizer;
pub use uniqueness::{UniquenessEnforcer, UsedPairs};
pub use year_grid::{YearField, YearSpan, YearValue, YearlyGrid};
