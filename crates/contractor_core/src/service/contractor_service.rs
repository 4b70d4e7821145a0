//! Contractor use-case service.
//!
//! # Responsibility
//! - Enforce write rules (password length, unique email, block stamping).
//! - Wrap contractor + credential writes in one transaction.
//!
//! # Invariants
//! - A failed step rolls back the whole transaction before the error
//!   is returned; rollback failures are only logged.
//! - Blocking stamps `block_date`; any other status clears it.

use crate::mapping::Pagination;
use crate::model::{
    Contractor, ContractorSearchParameters, ContractorStatus, Credentials, Employee,
    EmployeeStatus,
};
use crate::repo::contractor_repo::{ContractorRepository, RepoError};
use crate::service::error::{ServiceError, ServiceResult};
use chrono::Utc;
use log::{error, info};
use rusqlite::Transaction;

/// Minimum accepted length of an agent password, in characters.
pub const MIN_PASSWORD_CHARS: usize = 12;

/// One-way password hashing supplied by the hosting application.
pub trait PasswordHasher {
    /// # Errors
    /// - Human-readable reason when hashing fails.
    fn hash_password(&self, raw: &str) -> Result<String, String>;
}

/// Use-case service wrapper for contractor operations.
pub struct ContractorService<R: ContractorRepository, H: PasswordHasher> {
    repo: R,
    hasher: H,
}

impl<R: ContractorRepository, H: PasswordHasher> ContractorService<R, H> {
    pub fn new(repo: R, hasher: H) -> Self {
        Self { repo, hasher }
    }

    /// Returns one page of contractors and the total match count.
    ///
    /// # Errors
    /// - Repository failures, unchanged apart from wrapping.
    pub fn find_contractors(
        &self,
        params: &ContractorSearchParameters,
    ) -> ServiceResult<(Vec<Contractor>, i64)> {
        Ok(self.repo.find_contractors(params)?)
    }

    /// # Errors
    /// - [`ServiceError::NotFound`] when no live contractor has `id`.
    /// - [`ServiceError::GetContractor`] on storage or decode failures.
    pub fn get_contractor(&self, id: i64) -> ServiceResult<Contractor> {
        match self.repo.get_contractor(id) {
            Ok(Some(contractor)) => Ok(contractor),
            Ok(None) => Err(ServiceError::NotFound(id)),
            Err(source) => Err(ServiceError::GetContractor { id, source }),
        }
    }

    /// Creates a contractor together with its agent credentials.
    ///
    /// On success `contractor.id` holds the generated id.
    ///
    /// # Errors
    /// - [`ServiceError::Validation`] for a short password.
    /// - [`ServiceError::CreateContractor`] for duplicate email or any
    ///   storage failure.
    pub fn create_contractor(&self, contractor: &mut Contractor) -> ServiceResult<()> {
        if contractor.agent_password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(ServiceError::Validation(format!(
                "agent password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }

        let duplicates = self
            .contractors_with_email(&contractor.email, None)
            .map_err(|err| ServiceError::create("email lookup failed", Some(err)))?;
        if duplicates > 0 {
            return Err(ServiceError::create(
                format!("email {} is already registered", contractor.email),
                None,
            ));
        }

        let result = self.in_transaction(create_failure, |tx| {
            self.repo
                .create_contractor(tx, contractor)
                .map_err(|err| ServiceError::create("contractor data was not stored", Some(err)))?;

            let mut credentials = Credentials {
                contractor_id: Some(contractor.id),
                password: self.hash(&contractor.agent_password, create_failure)?,
                ..Credentials::default()
            };
            self.repo
                .create_credentials(tx, &mut credentials)
                .map_err(|err| ServiceError::create("credentials were not stored", Some(err)))
        });

        log_outcome("contractor_create", contractor.id, &result);
        result
    }

    /// Updates contractor data and, when a new password is supplied, its
    /// credentials.
    ///
    /// # Errors
    /// - [`ServiceError::UpdateContractor`] for duplicate email, missing rows
    ///   or storage failures.
    pub fn update_contractor(&self, id: i64, contractor: &mut Contractor) -> ServiceResult<()> {
        let duplicates = self
            .contractors_with_email(&contractor.email, Some(id))
            .map_err(|err| ServiceError::update("email lookup failed", Some(err)))?;
        if duplicates > 0 {
            return Err(ServiceError::update(
                format!("email {} is already registered", contractor.email),
                None,
            ));
        }

        if contractor.status == ContractorStatus::Block {
            contractor.block_date = Some(Utc::now());
        } else {
            contractor.block_date = None;
            contractor.status = ContractorStatus::Active;
        }

        let result = self.in_transaction(update_failure, |tx| {
            self.repo
                .update_contractor_data(tx, id, contractor)
                .map_err(|err| ServiceError::update("contractor data was not updated", Some(err)))?;

            if contractor.agent_password.chars().count() >= MIN_PASSWORD_CHARS {
                let credentials = Credentials {
                    contractor_id: Some(id),
                    password: self.hash(&contractor.agent_password, update_failure)?,
                    ..Credentials::default()
                };
                self.repo
                    .update_contractor_credentials(tx, &credentials)
                    .map_err(|err| ServiceError::update("credentials were not updated", Some(err)))?;
            }
            Ok(())
        });

        log_outcome("contractor_update", id, &result);
        result
    }

    /// Soft-deletes a contractor.
    ///
    /// # Errors
    /// - [`ServiceError::NotFound`] when no live contractor has `id`.
    pub fn delete_contractor(&self, id: i64) -> ServiceResult<()> {
        Ok(self.repo.delete_contractor(id)?)
    }

    /// Adds an employee; on success `employee.id` holds the generated id.
    ///
    /// # Errors
    /// - Repository failures; the transaction is rolled back first.
    pub fn create_contractor_employee(
        &self,
        contractor_id: i64,
        employee: &mut Employee,
    ) -> ServiceResult<()> {
        self.in_transaction(repo_failure, |tx| {
            Ok(self
                .repo
                .create_contractor_employee(tx, contractor_id, employee)?)
        })
    }

    /// # Errors
    /// - [`ServiceError::NotFound`] when no live employee has `id`.
    pub fn update_contractor_employee(&self, id: i64, employee: &mut Employee) -> ServiceResult<()> {
        if employee.status == EmployeeStatus::Block {
            employee.block_date = Some(Utc::now());
        } else {
            employee.block_date = None;
        }

        self.in_transaction(repo_failure, |tx| {
            Ok(self.repo.update_contractor_employee_data(tx, id, employee)?)
        })
    }

    /// # Errors
    /// - [`ServiceError::NotFound`] when no live employee has `id`.
    pub fn delete_contractor_employee(&self, id: i64) -> ServiceResult<()> {
        Ok(self.repo.delete_contractor_employee(id)?)
    }

    /// Counts live contractors whose email equals `email`, ignoring case
    /// under Unicode rules.
    fn contractors_with_email(&self, email: &str, exclude_id: Option<i64>) -> Result<usize, RepoError> {
        let params = ContractorSearchParameters {
            pagination: Pagination::max(),
            email: Some(email.to_string()),
            exclude_ids: exclude_id.map(|id| vec![id]),
            ..ContractorSearchParameters::default()
        };

        let (candidates, _) = self.repo.find_contractors(&params)?;
        let wanted = email.to_uppercase();
        Ok(candidates
            .iter()
            .filter(|candidate| candidate.email.to_uppercase() == wanted)
            .count())
    }

    fn hash(
        &self,
        raw: &str,
        wrap: fn(String, Option<RepoError>) -> ServiceError,
    ) -> ServiceResult<String> {
        self.hasher
            .hash_password(raw)
            .map_err(|reason| wrap(format!("password hashing failed: {reason}"), None))
    }

    /// Runs `work` in a transaction: commit on success, explicit rollback
    /// on failure. `wrap` shapes begin/commit failures.
    fn in_transaction<T, F>(
        &self,
        wrap: fn(String, Option<RepoError>) -> ServiceError,
        work: F,
    ) -> ServiceResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> ServiceResult<T>,
    {
        let tx = self
            .repo
            .begin()
            .map_err(|err| wrap("transaction was not opened".to_string(), Some(err)))?;

        let value = match work(&tx) {
            Ok(value) => value,
            Err(err) => {
                self.repo.rollback_quietly(tx);
                return Err(err);
            }
        };

        // A failed commit drops `tx`, which rolls back.
        tx.commit()
            .map_err(|err| wrap("changes were not committed".to_string(), Some(err.into())))?;
        Ok(value)
    }
}

fn create_failure(reason: String, source: Option<RepoError>) -> ServiceError {
    ServiceError::create(reason, source)
}

fn update_failure(reason: String, source: Option<RepoError>) -> ServiceError {
    ServiceError::update(reason, source)
}

fn repo_failure(reason: String, source: Option<RepoError>) -> ServiceError {
    match source {
        Some(err) => ServiceError::from(err),
        None => ServiceError::Validation(reason),
    }
}

fn log_outcome(event: &str, id: i64, result: &ServiceResult<()>) {
    match result {
        Ok(()) => info!("event={event} module=service status=ok id={id}"),
        Err(err) => error!(
            "event={event} module=service status=error code={} error={err}",
            err.code().as_u32()
        ),
    }
}
