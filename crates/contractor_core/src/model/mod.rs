//! Domain model for contractors and their employees.
//!
//! # Invariants
//! - A contractor exclusively owns its employee collection; reads rebuild
//!   it from scratch.
//! - Deletion is a soft-delete flag in storage, never a hard delete.

pub mod contractor;
pub mod search;

pub use contractor::{Contractor, ContractorStatus, Credentials, Employee, EmployeeStatus};
pub use search::ContractorSearchParameters;
