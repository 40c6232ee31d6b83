//! Persistence layer.

pub mod libsql_backend;
pub mod migrations;
pub mod models;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use models::*;
pub use traits::Store;
