pub mod fixtures;
pub mod mock_backend;

pub use mock_backend::{MockBackend, MockCall};
