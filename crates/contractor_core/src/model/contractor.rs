//! Contractor, employee and credential records.
//!
//! # Responsibility
//! - Define the canonical shapes read and written by the repository.
//! - Decode contractor rows, including the aggregated employee column.
//!
//! # Invariants
//! - Status text in storage is exactly `ACTIVE` or `BLOCK`.
//! - A malformed employee record fails the whole contractor row.

use crate::mapping::values::{
    json_integer, json_optional_string, json_string, parse_optional_timestamp,
};
use crate::mapping::{DecodeRow, MapError, MapResult, RowSource};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Column list shared by every contractor read; order matches
/// [`Contractor::decode_row`].
pub const CONTRACTOR_COLUMNS: &str = "c.id, c.resident, c.bin, c.name, c.email,
    c.agent_name, c.agent_position, c.block_date, c.status,
    (
        SELECT json_group_array(json_object(
            'id', e.id,
            'contractor_id', e.contractor_id,
            'email', e.email,
            'full_name', e.full_name,
            'position', e.position,
            'block_date', e.block_date,
            'status', e.status
        ))
        FROM (
            SELECT *
            FROM contractors_contractor_employee
            WHERE contractor_id = c.id AND is_delete = 0
            ORDER BY id
        ) e
    ) AS employees";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContractorStatus {
    #[default]
    Active,
    Block,
}

impl ContractorStatus {
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Block => "BLOCK",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ACTIVE" => Some(Self::Active),
            "BLOCK" => Some(Self::Block),
            _ => None,
        }
    }
}

impl From<ContractorStatus> for Value {
    fn from(value: ContractorStatus) -> Self {
        Value::Text(value.as_db().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EmployeeStatus {
    #[default]
    Active,
    Block,
}

impl EmployeeStatus {
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Block => "BLOCK",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ACTIVE" => Some(Self::Active),
            "BLOCK" => Some(Self::Block),
            _ => None,
        }
    }
}

impl From<EmployeeStatus> for Value {
    fn from(value: EmployeeStatus) -> Self {
        Value::Text(value.as_db().to_string())
    }
}

/// Business partner organization managed by administrators.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contractor {
    pub id: i64,
    /// Residents must carry a `bin` (business identification number).
    pub resident: bool,
    pub bin: Option<String>,
    pub name: Option<String>,
    pub email: String,
    pub agent_name: String,
    /// Plain-text password supplied on write; never read back.
    #[serde(skip_serializing)]
    pub agent_password: String,
    pub agent_position: String,
    /// Set while the contractor is blocked.
    pub block_date: Option<DateTime<Utc>>,
    pub status: ContractorStatus,
    pub employees: Vec<Employee>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub contractor_id: i64,
    pub email: String,
    pub full_name: String,
    pub position: String,
    pub block_date: Option<DateTime<Utc>>,
    pub status: EmployeeStatus,
}

/// Login secret for a contractor agent or an employee.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub id: i64,
    pub contractor_id: Option<i64>,
    pub employee_id: Option<i64>,
    /// Already hashed by the time it reaches the repository.
    pub password: String,
}

impl DecodeRow for Contractor {
    fn decode_row<R: RowSource>(row: &R) -> MapResult<Self> {
        let block_date: Option<String> = row.column(7)?;
        let status_text: String = row.column(8)?;
        let status = ContractorStatus::parse(&status_text).ok_or_else(|| {
            MapError::Decode(format!(
                "invalid contractor status `{status_text}` in contractors_contractor.status"
            ))
        })?;
        let employees: Option<String> = row.column(9)?;

        Ok(Self {
            id: row.column(0)?,
            resident: row.column(1)?,
            bin: row.column(2)?,
            name: row.column(3)?,
            email: row.column(4)?,
            agent_name: row.column(5)?,
            agent_password: String::new(),
            agent_position: row.column(6)?,
            block_date: parse_optional_timestamp(
                block_date.as_deref(),
                "contractors_contractor.block_date",
            )?,
            status,
            employees: decode_employee_aggregate(employees.as_deref())?,
        })
    }
}

/// Decodes the aggregated employee column in aggregate order.
///
/// `NULL`, JSON `null` and `[]` all produce an empty collection.
///
/// # Errors
/// - [`MapError::Decode`] when the text is not a JSON array of employee
///   records or any record is malformed.
pub fn decode_employee_aggregate(text: Option<&str>) -> MapResult<Vec<Employee>> {
    let Some(text) = text else {
        return Ok(Vec::new());
    };

    let parsed: JsonValue = serde_json::from_str(text)
        .map_err(|err| MapError::Decode(format!("invalid employees aggregate: {err}")))?;

    match parsed {
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::Array(records) => records.iter().map(Employee::from_aggregate).collect(),
        other => Err(MapError::Decode(format!(
            "employees aggregate must be an array, got `{other}`"
        ))),
    }
}

impl Employee {
    fn from_aggregate(record: &JsonValue) -> MapResult<Self> {
        let JsonValue::Object(fields) = record else {
            return Err(MapError::Decode(format!(
                "employee record must be an object, got `{record}`"
            )));
        };

        let status_text = json_string(fields, "status")?;
        let status = EmployeeStatus::parse(&status_text).ok_or_else(|| {
            MapError::Decode(format!("invalid employee status `{status_text}`"))
        })?;
        let block_date = json_optional_string(fields, "block_date")?;

        Ok(Self {
            id: json_integer(fields, "id")?,
            contractor_id: json_integer(fields, "contractor_id")?,
            email: json_string(fields, "email")?,
            full_name: json_string(fields, "full_name")?,
            position: json_string(fields, "position")?,
            block_date: parse_optional_timestamp(block_date.as_deref(), "employee.block_date")?,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_employee_aggregate, ContractorStatus, EmployeeStatus};
    use chrono::{TimeZone, Utc};

    #[test]
    fn aggregate_decodes_records_in_order_with_float_ids() {
        let text = r#"[
            {"id": 2.0, "contractor_id": 1.0, "email": "b@x", "full_name": "B",
             "position": "dev", "block_date": null, "status": "ACTIVE"},
            {"id": 1, "contractor_id": 1, "email": "a@x", "full_name": "A",
             "position": "ops", "block_date": "2024-05-01T10:00:00Z", "status": "BLOCK"}
        ]"#;

        let employees = decode_employee_aggregate(Some(text)).unwrap();
        assert_eq!(employees.len(), 2);
        assert_eq!(employees[0].id, 2);
        assert_eq!(employees[0].block_date, None);
        assert_eq!(employees[1].status, EmployeeStatus::Block);
        assert_eq!(
            employees[1].block_date,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn empty_aggregates_yield_empty_collection() {
        assert!(decode_employee_aggregate(None).unwrap().is_empty());
        assert!(decode_employee_aggregate(Some("null")).unwrap().is_empty());
        assert!(decode_employee_aggregate(Some("[]")).unwrap().is_empty());
    }

    #[test]
    fn one_bad_record_fails_the_whole_aggregate() {
        let text = r#"[
            {"id": 1, "contractor_id": 1, "email": "a@x", "full_name": "A",
             "position": "ops", "block_date": null, "status": "ACTIVE"},
            {"id": 2, "contractor_id": 1, "email": "b@x", "full_name": "B",
             "position": "dev", "block_date": "yesterday", "status": "ACTIVE"}
        ]"#;

        let err = decode_employee_aggregate(Some(text)).unwrap_err();
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn status_text_round_trips() {
        assert_eq!(ContractorStatus::parse("BLOCK"), Some(ContractorStatus::Block));
        assert_eq!(ContractorStatus::parse("block"), None);
        assert_eq!(EmployeeStatus::Active.as_db(), "ACTIVE");
    }
}
