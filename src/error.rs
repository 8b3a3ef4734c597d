use thiserror::Error;

/// All errors that can surface from the Houston core. Each variant maps to a
/// stable wire `type` name and an HTTP status code; see [`HoustonError::code`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HoustonError {
    #[error("The key was modified during the transaction.")]
    TransactionFailed,

    #[error("Too many requests.")]
    TooManyRequests,

    #[error("Key was not provided in the request.")]
    KeyNotProvided,

    #[error("Key not found.")]
    KeyNotFound,

    #[error("Plan '{0}' not found.")]
    PlanNotFound(String),

    #[error("mission with id '{0}' not found")]
    MissionNotFound(String),

    #[error("Incorrect username/password.")]
    BadCredentials,

    #[error("plan is invalid: {0}")]
    PlanValidation(String),

    #[error("invalid state change: {0}")]
    StageChange(String),

    #[error("mission has been completed, cannot operate further")]
    Completed,

    #[error("no stage found with name '{0}'")]
    StageNotFound(String),

    #[error("Memory usage is above the safe limit")]
    MemoryUsage,

    #[error("Houston, we have a problem. There was an error in the API server when processing the request.")]
    Internal,

    #[error("{0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl HoustonError {
    /// HTTP status code for the error. 572 is a non-standard sentinel that
    /// clients use to trigger a retry at a coarser cadence; 470 likewise
    /// signals an unknown access key.
    pub fn code(&self) -> u16 {
        match self {
            Self::TransactionFailed => 572,
            Self::TooManyRequests => 429,
            Self::KeyNotProvided => 401,
            Self::KeyNotFound => 470,
            Self::PlanNotFound(_) | Self::MissionNotFound(_) => 404,
            Self::BadCredentials => 403,
            Self::Internal | Self::MemoryUsage | Self::Configuration(_) | Self::Store(_) => 500,
            _ => 400,
        }
    }

    /// Stable wire identifier reported in the `type` field of error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransactionFailed => "TransactionFailedError",
            Self::TooManyRequests => "TooManyRequestsError",
            Self::KeyNotProvided => "KeyNotProvidedError",
            Self::KeyNotFound => "KeyNotFoundError",
            Self::PlanNotFound(_) => "PlanNotFoundError",
            Self::MissionNotFound(_) => "MissionNotFoundError",
            Self::BadCredentials => "BadCredentialsError",
            Self::PlanValidation(_) => "PlanValidationError",
            Self::StageChange(_) => "StageChangeError",
            Self::Completed => "CompletedError",
            Self::StageNotFound(_) => "StageNotFoundError",
            Self::MemoryUsage => "MemoryUsageError",
            Self::Internal => "InternalError",
            Self::BadRequest(_) => "BadRequestError",
            Self::Configuration(_) => "ConfigurationError",
            Self::Store(_) => "StoreError",
        }
    }
}

impl From<serde_json::Error> for HoustonError {
    fn from(error: serde_json::Error) -> Self {
        HoustonError::BadRequest(format!("invalid JSON: {error}"))
    }
}

pub type Result<T> = std::result::Result<T, HoustonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(HoustonError::TransactionFailed.code(), 572);
        assert_eq!(HoustonError::TooManyRequests.code(), 429);
        assert_eq!(HoustonError::KeyNotProvided.code(), 401);
        assert_eq!(HoustonError::KeyNotFound.code(), 470);
        assert_eq!(HoustonError::PlanNotFound("p".into()).code(), 404);
        assert_eq!(HoustonError::MissionNotFound("m0".into()).code(), 404);
        assert_eq!(HoustonError::BadCredentials.code(), 403);
        assert_eq!(HoustonError::Internal.code(), 500);
        assert_eq!(HoustonError::StageChange("x".into()).code(), 400);
        assert_eq!(HoustonError::PlanValidation("x".into()).code(), 400);
    }

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(
            HoustonError::TransactionFailed.kind(),
            "TransactionFailedError"
        );
        assert_eq!(HoustonError::Completed.kind(), "CompletedError");
        assert_eq!(
            HoustonError::StageNotFound("a".into()).kind(),
            "StageNotFoundError"
        );
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            HoustonError::PlanNotFound("etl".into()).to_string(),
            "Plan 'etl' not found."
        );
        assert_eq!(
            HoustonError::PlanValidation("plans must have more than 0 stages".into()).to_string(),
            "plan is invalid: plans must have more than 0 stages"
        );
    }
}
