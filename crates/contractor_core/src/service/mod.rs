//! Use-case services on top of repositories.
//!
//! # Responsibility
//! - Orchestrate multi-statement writes inside one transaction.
//! - Translate repository failures into coded service errors.
//!
//! # Invariants
//! - Services never bypass repository persistence contracts.
//! - Any failure inside a transaction triggers an explicit rollback.

pub mod contractor_service;
pub mod error;
