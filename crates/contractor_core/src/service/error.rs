//! Coded service errors.
//!
//! Codes are stable and shared with API consumers; the outer transport maps
//! them onto structured responses.

use crate::repo::contractor_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Stable numeric error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    GeneralServiceError,
    BadRequest,
    ConfigurationError,
    ResourceNotFound,
    CouldNotOpenDbConnection,
    CouldNotGetContractorById,
    CouldNotCreateContractor,
    CouldNotUpdateContractor,
}

impl ErrorCode {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::GeneralServiceError => 50000,
            Self::BadRequest => 50001,
            Self::ConfigurationError => 50002,
            Self::ResourceNotFound => 50004,
            Self::CouldNotOpenDbConnection => 51000,
            Self::CouldNotGetContractorById => 52000,
            Self::CouldNotCreateContractor => 52001,
            Self::CouldNotUpdateContractor => 52002,
        }
    }
}

#[derive(Debug)]
pub enum ServiceError {
    /// Caller input rejected before touching storage.
    Validation(String),
    NotFound(i64),
    GetContractor {
        id: i64,
        source: RepoError,
    },
    CreateContractor {
        reason: String,
        source: Option<RepoError>,
    },
    UpdateContractor {
        reason: String,
        source: Option<RepoError>,
    },
    Repo(RepoError),
}

impl ServiceError {
    pub fn create(reason: impl Into<String>, source: Option<RepoError>) -> Self {
        Self::CreateContractor {
            reason: reason.into(),
            source,
        }
    }

    pub fn update(reason: impl Into<String>, source: Option<RepoError>) -> Self {
        Self::UpdateContractor {
            reason: reason.into(),
            source,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::BadRequest,
            Self::NotFound(_) => ErrorCode::ResourceNotFound,
            Self::GetContractor { .. } => ErrorCode::CouldNotGetContractorById,
            Self::CreateContractor { .. } => ErrorCode::CouldNotCreateContractor,
            Self::UpdateContractor { .. } => ErrorCode::CouldNotUpdateContractor,
            Self::Repo(_) => ErrorCode::GeneralServiceError,
        }
    }

    /// Message safe to show to API users; omits the underlying cause.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => format!("validation failed: {message}"),
            Self::NotFound(id) => format!("record {id} not found"),
            Self::GetContractor { id, .. } => format!("failed to load contractor {id}"),
            Self::CreateContractor { reason, .. } => {
                format!("failed to create contractor: {reason}")
            }
            Self::UpdateContractor { reason, .. } => {
                format!("failed to update contractor: {reason}")
            }
            Self::Repo(_) => "unhandled service error".to_string(),
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.source() {
            Some(source) => write!(f, "{}: {source}", self.user_message()),
            None => write!(f, "{}", self.user_message()),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::GetContractor { source, .. } | Self::Repo(source) => Some(source),
            Self::CreateContractor { source, .. } | Self::UpdateContractor { source, .. } => {
                source.as_ref().map(|err| err as &(dyn Error + 'static))
            }
            Self::Validation(_) | Self::NotFound(_) => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, ServiceError};
    use crate::repo::contractor_repo::RepoError;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorCode::GeneralServiceError.as_u32(), 50000);
        assert_eq!(ErrorCode::CouldNotCreateContractor.as_u32(), 52001);
        assert_eq!(
            ServiceError::update("x", None).code(),
            ErrorCode::CouldNotUpdateContractor
        );
    }

    #[test]
    fn repo_not_found_becomes_service_not_found() {
        let err = ServiceError::from(RepoError::NotFound(9));
        assert!(matches!(err, ServiceError::NotFound(9)));
        assert_eq!(err.code().as_u32(), 50004);
    }

    #[test]
    fn display_appends_cause() {
        let err = ServiceError::create(
            "storage failed",
            Some(RepoError::InvalidData("bad".to_string())),
        );
        assert_eq!(
            err.to_string(),
            "failed to create contractor: storage failed: invalid persisted data: bad"
        );
    }
}
