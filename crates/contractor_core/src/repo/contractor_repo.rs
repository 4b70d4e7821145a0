//! Contractor repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide search and CRUD over contractors, employees and credentials.
//! - Keep SQL text inside the persistence boundary.
//!
//! # Invariants
//! - Soft-deleted rows (`is_delete = 1`) are invisible to reads.
//! - Multi-statement writes run inside a caller-owned transaction.
//! - Rollback failures are logged and never replace the original error.

use crate::db::DbError;
use crate::mapping::values::optional_timestamp_value;
use crate::mapping::{
    execute_with_map, query_with_map, FilterBuilder, MapError, NamedArgs, LIKE_PREFIX,
};
use crate::model::contractor::CONTRACTOR_COLUMNS;
use crate::model::{Contractor, ContractorSearchParameters, ContractorStatus, Credentials, Employee};
use log::warn;
use rusqlite::types::Value;
use rusqlite::{Connection, Transaction};
use std::error::Error;
use std::fmt::{Display, Formatter};

const CONTRACTOR_FROM_SQL: &str = " from contractors_contractor c";
const CONTRACTOR_BASE_FILTER: &str = " where 1=1 and c.is_delete = 0";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for contractor persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Map(MapError),
    Db(DbError),
    /// No live row with this id.
    NotFound(i64),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Map(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Map(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<MapError> for RepoError {
    fn from(value: MapError) -> Self {
        Self::Map(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Transaction boundaries for multi-statement writes.
pub trait Transactional {
    /// # Errors
    /// - SQLite refuses to open a transaction.
    fn begin(&self) -> RepoResult<Transaction<'_>>;

    /// Best-effort rollback; failures are logged, never returned.
    fn rollback_quietly(&self, tx: Transaction<'_>);
}

/// Repository interface for contractor use-cases.
pub trait ContractorRepository: Transactional {
    /// Returns one page of matches plus the total match count.
    fn find_contractors(
        &self,
        params: &ContractorSearchParameters,
    ) -> RepoResult<(Vec<Contractor>, i64)>;
    fn get_contractor(&self, id: i64) -> RepoResult<Option<Contractor>>;
    /// Inserts with status `ACTIVE` and stores the generated id in `contractor.id`.
    fn create_contractor(&self, tx: &Transaction<'_>, contractor: &mut Contractor)
        -> RepoResult<()>;
    fn update_contractor_data(
        &self,
        tx: &Transaction<'_>,
        id: i64,
        contractor: &Contractor,
    ) -> RepoResult<()>;
    fn delete_contractor(&self, id: i64) -> RepoResult<()>;

    /// Stores the generated id in `employee.id`.
    fn create_contractor_employee(
        &self,
        tx: &Transaction<'_>,
        contractor_id: i64,
        employee: &mut Employee,
    ) -> RepoResult<()>;
    fn update_contractor_employee_data(
        &self,
        tx: &Transaction<'_>,
        id: i64,
        employee: &Employee,
    ) -> RepoResult<()>;
    fn delete_contractor_employee(&self, id: i64) -> RepoResult<()>;

    /// Stores the generated id in `credentials.id`.
    fn create_credentials(&self, tx: &Transaction<'_>, credentials: &mut Credentials)
        -> RepoResult<()>;
    /// Replaces the password of the contractor named by `credentials.contractor_id`.
    fn update_contractor_credentials(
        &self,
        tx: &Transaction<'_>,
        credentials: &Credentials,
    ) -> RepoResult<()>;
}

/// SQLite-backed contractor repository.
pub struct SqliteContractorRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContractorRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl Transactional for SqliteContractorRepository<'_> {
    fn begin(&self) -> RepoResult<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    fn rollback_quietly(&self, tx: Transaction<'_>) {
        if let Err(err) = tx.rollback() {
            warn!("event=tx_rollback module=repo status=error error={err}");
        }
    }
}

impl ContractorRepository for SqliteContractorRepository<'_> {
    fn find_contractors(
        &self,
        params: &ContractorSearchParameters,
    ) -> RepoResult<(Vec<Contractor>, i64)> {
        let mut filters = FilterBuilder::new(CONTRACTOR_BASE_FILTER);
        filters
            .equals("c.bin", params.bin.clone())
            .like("c.name", params.name.as_deref(), LIKE_PREFIX)
            .like("c.email", params.email.as_deref(), LIKE_PREFIX)
            .equals("c.status", params.status)
            .date("c.block_date", params.block_date.as_ref());
        filters
            .in_list("c.id", params.ids.as_deref())?
            .not_in_list("c.id", params.exclude_ids.as_deref())?;

        let mut total = 0_i64;
        let count_sql = format!("select count(*){CONTRACTOR_FROM_SQL}{}", filters.fragment());
        query_with_map(self.conn, &count_sql, filters.args(), |scanner| {
            scanner.scan((&mut total,))
        })?;

        if total == 0 {
            return Ok((Vec::new(), 0));
        }

        filters
            .push_sql(" order by c.id desc")
            .paginate(&params.pagination);
        let select_sql = format!(
            "select {CONTRACTOR_COLUMNS}{CONTRACTOR_FROM_SQL}{}",
            filters.fragment()
        );
        let contractors = query_with_map(self.conn, &select_sql, filters.args(), |scanner| {
            scanner.read_all::<Contractor>()
        })?;

        Ok((contractors, total))
    }

    fn get_contractor(&self, id: i64) -> RepoResult<Option<Contractor>> {
        let sql = format!(
            "select {CONTRACTOR_COLUMNS}{CONTRACTOR_FROM_SQL} where c.id = :id and c.is_delete = 0"
        );
        let args = named([("id", Value::Integer(id))]);

        Ok(query_with_map(self.conn, &sql, &args, |scanner| {
            scanner.read::<Contractor>()
        })?)
    }

    fn create_contractor(
        &self,
        tx: &Transaction<'_>,
        contractor: &mut Contractor,
    ) -> RepoResult<()> {
        let args = named([
            ("resident", Value::from(contractor.resident)),
            ("bin", Value::from(contractor.bin.clone())),
            ("name", Value::from(contractor.name.clone())),
            ("email", Value::from(contractor.email.clone())),
            ("status", Value::from(ContractorStatus::Active)),
            ("agent_name", Value::from(contractor.agent_name.clone())),
            ("agent_position", Value::from(contractor.agent_position.clone())),
        ]);

        let id = insert_returning_id(
            tx,
            "INSERT INTO contractors_contractor (
                resident, bin, name, email, status, agent_name, agent_position
            ) VALUES (
                :resident, :bin, :name, :email, :status, :agent_name, :agent_position
            ) RETURNING id",
            &args,
        )?;

        contractor.id = id;
        contractor.status = ContractorStatus::Active;
        Ok(())
    }

    fn update_contractor_data(
        &self,
        tx: &Transaction<'_>,
        id: i64,
        contractor: &Contractor,
    ) -> RepoResult<()> {
        let args = named([
            ("resident", Value::from(contractor.resident)),
            ("bin", Value::from(contractor.bin.clone())),
            ("name", Value::from(contractor.name.clone())),
            ("email", Value::from(contractor.email.clone())),
            ("block_date", optional_timestamp_value(contractor.block_date.as_ref())),
            ("status", Value::from(contractor.status)),
            ("id_value", Value::Integer(id)),
        ]);

        let changed = execute_with_map(
            tx,
            "UPDATE contractors_contractor
             SET
                resident = :resident,
                bin = :bin,
                name = :name,
                email = :email,
                block_date = :block_date,
                status = :status
             WHERE id = :id_value AND is_delete = 0",
            &args,
        )?;

        ensure_changed(changed, id)
    }

    fn delete_contractor(&self, id: i64) -> RepoResult<()> {
        let changed = execute_with_map(
            self.conn,
            "update contractors_contractor set is_delete = 1 where id = :id and is_delete = 0",
            &named([("id", Value::Integer(id))]),
        )?;

        ensure_changed(changed, id)
    }

    fn create_contractor_employee(
        &self,
        tx: &Transaction<'_>,
        contractor_id: i64,
        employee: &mut Employee,
    ) -> RepoResult<()> {
        let args = named([
            ("contractor_id", Value::Integer(contractor_id)),
            ("email", Value::from(employee.email.clone())),
            ("full_name", Value::from(employee.full_name.clone())),
            ("position", Value::from(employee.position.clone())),
        ]);

        let id = insert_returning_id(
            tx,
            "INSERT INTO contractors_contractor_employee (
                contractor_id, email, full_name, position
            ) VALUES (
                :contractor_id, :email, :full_name, :position
            ) RETURNING id",
            &args,
        )?;

        employee.id = id;
        employee.contractor_id = contractor_id;
        Ok(())
    }

    fn update_contractor_employee_data(
        &self,
        tx: &Transaction<'_>,
        id: i64,
        employee: &Employee,
    ) -> RepoResult<()> {
        let args = named([
            ("email", Value::from(employee.email.clone())),
            ("full_name", Value::from(employee.full_name.clone())),
            ("position", Value::from(employee.position.clone())),
            ("block_date", optional_timestamp_value(employee.block_date.as_ref())),
            ("status", Value::from(employee.status)),
            ("id_value", Value::Integer(id)),
        ]);

        let changed = execute_with_map(
            tx,
            "UPDATE contractors_contractor_employee
             SET
                email = :email,
                full_name = :full_name,
                position = :position,
                block_date = :block_date,
                status = :status
             WHERE id = :id_value AND is_delete = 0",
            &args,
        )?;

        ensure_changed(changed, id)
    }

    fn delete_contractor_employee(&self, id: i64) -> RepoResult<()> {
        let changed = execute_with_map(
            self.conn,
            "update contractors_contractor_employee set is_delete = 1 where id = :id and is_delete = 0",
            &named([("id", Value::Integer(id))]),
        )?;

        ensure_changed(changed, id)
    }

    fn create_credentials(
        &self,
        tx: &Transaction<'_>,
        credentials: &mut Credentials,
    ) -> RepoResult<()> {
        let args = named([
            ("contractor_id", Value::from(credentials.contractor_id)),
            ("employee_id", Value::from(credentials.employee_id)),
            ("password", Value::from(credentials.password.clone())),
        ]);

        credentials.id = insert_returning_id(
            tx,
            "INSERT INTO contractors_credentials (
                contractor_id, employee_id, password
            ) VALUES (
                :contractor_id, :employee_id, :password
            ) RETURNING id",
            &args,
        )?;
        Ok(())
    }

    fn update_contractor_credentials(
        &self,
        tx: &Transaction<'_>,
        credentials: &Credentials,
    ) -> RepoResult<()> {
        let contractor_id = credentials.contractor_id.ok_or_else(|| {
            RepoError::InvalidData("contractor credentials require contractor_id".to_string())
        })?;
        let args = named([
            ("contractor_id", Value::Integer(contractor_id)),
            ("password", Value::from(credentials.password.clone())),
        ]);

        let changed = execute_with_map(
            tx,
            "UPDATE contractors_credentials
             SET password = :password
             WHERE contractor_id = :contractor_id",
            &args,
        )?;

        ensure_changed(changed, contractor_id)
    }
}

fn named<const N: usize>(entries: [(&str, Value); N]) -> NamedArgs {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn insert_returning_id(conn: &Connection, sql: &str, args: &NamedArgs) -> RepoResult<i64> {
    let mut id = 0_i64;
    let found = query_with_map(conn, sql, args, |scanner| scanner.scan((&mut id,)))?;
    if !found {
        return Err(RepoError::InvalidData(
            "insert did not return a generated id".to_string(),
        ));
    }
    Ok(id)
}

fn ensure_changed(changed: usize, id: i64) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound(id));
    }
    Ok(())
}
