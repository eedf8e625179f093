pub mod web_server;
pub mod api;
pub mod storage;
pub mod query_processor;
pub mod log;
pub mod config;
pub mod error;

pub use api::ApiMgr;
pub use config::Config;
pub use error::ServiceError;
pub use query_processor::{DeleteOutcome, Page, Pagination};
pub use storage::{Record, SqliteStore, Store, StoreError};
