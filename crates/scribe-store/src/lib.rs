pub mod database;
pub mod error;
pub mod jobs;
pub mod memory;
pub mod schema;

pub use database::Database;
pub use error::StoreError;
pub use jobs::{JobStore, SqliteJobStore};
pub use memory::MemoryJobStore;
