pub mod manager;
pub mod models;
pub mod query_builder;
pub mod repository;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use query_builder::{ExecOutcome, SqlParam, Statement};
pub use repository::PgStore;
pub use store::{MarkerUpdate, PhotoLocation, Store, Visibility};
