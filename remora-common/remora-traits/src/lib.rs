pub mod backend;
pub mod error;
pub mod payload;

pub use backend::{Backend, BackendDefaults};
pub use error::BackendError;
pub use payload::{BulkOperation, Payload};
