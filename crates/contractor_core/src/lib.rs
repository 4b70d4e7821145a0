//! Core domain logic for contractor management.
//!
//! Contractors, their employees and login credentials live in SQLite;
//! the [`mapping`] layer turns named-parameter SQL into positional
//! statements and scans result rows into typed records.

pub mod config;
pub mod db;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, init_logging_from, logging_status};
pub use mapping::{FilterBuilder, MapError, Pagination, Scanner};
pub use model::{
    Contractor, ContractorSearchParameters, ContractorStatus, Credentials, Employee,
    EmployeeStatus,
};
pub use repo::contractor_repo::{
    ContractorRepository, RepoError, RepoResult, SqliteContractorRepository, Transactional,
};
pub use service::contractor_service::{ContractorService, PasswordHasher, MIN_PASSWORD_CHARS};
pub use service::error::{ErrorCode, ServiceError, ServiceResult};

/// Starts logging and opens the migrated database described by `config`.
///
/// # Errors
/// - Logging init failures, or database open/migration failures.
pub fn bootstrap(config: &CoreConfig) -> Result<rusqlite::Connection, String> {
    init_logging_from(config)?;
    open_db(&config.db_path).map_err(|err| err.to_string())
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
