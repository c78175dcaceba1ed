pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod ids;
pub mod logging;
pub mod models;
pub mod snapshot;
pub mod storage;
pub mod store;
pub mod utils;

pub use config::Config;
pub use database::Database;
pub use error::StoreError;
pub use models::{AppKind, NewRecord, Query, Record, RecordEdit, RecordOptions, Stats, Status, StatusFilter};
pub use storage::{MemoryStorage, Storage, StorageError};
pub use store::RecordStore;
pub use utils::Profile;
