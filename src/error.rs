//! # Error Handling
//!
//! Unified error handling for the Atmosphere API. Every failure leaves the
//! service as a problem+json body carrying the HTTP status, a stable error
//! code, a human-readable message and the request trace id.

use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::cloud::DriverError;
use crate::telemetry;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Numeric HTTP status mirrored into the body
    pub status_code: u16,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Suggested retry delay in seconds (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<C: Into<String>, M: Into<String>>(status: StatusCode, code: C, message: M) -> Self {
        Self {
            status,
            status_code: status.as_u16(),
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            retry_after: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Set retry after delay
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Extract current trace ID from the active request (falls back to generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]).into_boxed_str())
            })
    }
}

/// Returns true when the database rejected a write because of a unique index.
pub fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error
        .code()
        .map(|code| code.as_ref() == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code.as_ref()))
        .unwrap_or(false)
}

/// Errors raised by the repository layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),
}

/// Failure kinds of the resource lifecycle service and action dispatcher.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Malformed request field, user-fixable
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("Missing required POST data variables: [{}]", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    QuotaExceeded(String),
    #[error("Identity/Provider Authentication Failed")]
    Auth { provider: String, identity: String },
    #[error("{0}")]
    InvalidState(String),
    #[error("Source could not be acquired. Did you send: [snapshot_id/volume_id/image_id] ?")]
    MissingSource,
    #[error("Provider is rate limiting requests")]
    RateLimited { retry_after: Option<u64> },
    /// Opaque backend failure; the caller cannot act on it
    #[error("{message}")]
    Provisioning { message: String, details: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl LifecycleError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// Translate a driver failure, using `failure_message` for opaque backend errors.
    pub fn from_driver(error: DriverError, failure_message: &str) -> Self {
        match error {
            DriverError::InvalidCredentials { provider, identity } => {
                Self::Auth { provider, identity }
            }
            DriverError::OverQuota { message } => Self::QuotaExceeded(message),
            DriverError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            DriverError::NotFound { kind, id } => {
                Self::NotFound(format!("{} {} does not exist", kind.title(), id))
            }
            DriverError::Backend { details } => Self::Provisioning {
                message: failure_message.to_string(),
                details,
            },
        }
    }
}

impl From<sea_orm::DbErr> for LifecycleError {
    fn from(error: sea_orm::DbErr) -> Self {
        Self::Repository(RepositoryError::Database(error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        if let Some(retry_after) = self.retry_after
            && let Ok(header_value) = HeaderValue::from_str(&retry_after.to_string())
        {
            headers.insert("retry-after", header_value);
        }

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<LifecycleError> for ApiError {
    fn from(error: LifecycleError) -> Self {
        let message = error.to_string();
        match error {
            LifecycleError::Validation { details, .. } => {
                let api = ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message);
                match details {
                    Some(details) => api.with_details(details),
                    None => api,
                }
            }
            LifecycleError::MissingFields(fields) => {
                ApiError::new(StatusCode::BAD_REQUEST, "MISSING_FIELDS", message)
                    .with_details(json!({ "missing": fields }))
            }
            LifecycleError::NotFound(_) => {
                ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
            }
            LifecycleError::QuotaExceeded(_) => {
                ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "QUOTA_EXCEEDED", message)
            }
            LifecycleError::Auth { provider, identity } => {
                ApiError::new(StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", message)
                    .with_details(json!({ "provider": provider, "identity": identity }))
            }
            LifecycleError::InvalidState(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_STATE", message)
            }
            LifecycleError::MissingSource => {
                ApiError::new(StatusCode::BAD_REQUEST, "MISSING_SOURCE", message)
            }
            LifecycleError::RateLimited { retry_after } => {
                let api = ApiError::new(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", message);
                match retry_after {
                    Some(seconds) => api.with_retry_after(seconds),
                    None => api,
                }
            }
            LifecycleError::Provisioning { details, .. } => {
                tracing::error!(details = %details, "Provider operation failed");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PROVISIONING_FAILED",
                    message,
                )
            }
            LifecycleError::Repository(repo_error) => repo_error.into(),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { .. } => {
                ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", error.to_string())
            }
            RepositoryError::Database(db_error) => db_error.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        if is_unique_violation(&error) {
            tracing::debug!(?error, "Unique constraint violation detected");
            return Self::new(StatusCode::CONFLICT, "CONFLICT", "Resource already exists");
        }

        match error {
            sea_orm::DbErr::RecordNotFound(record) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Record not found: {}", record),
            ),
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
            }
            _ => {
                tracing::error!("Database error: {:?}", error);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Database error occurred",
                )
            }
        }
    }
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
}

/// Create a validation error with field details
pub fn validation_error(message: &str, field_errors: serde_json::Value) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message).with_details(field_errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::ResourceKind;

    #[test]
    fn test_api_error_body_mirrors_status() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", "bad size");
        let body = serde_json::to_value(&error).unwrap();

        assert_eq!(body["status_code"], 400);
        assert_eq!(body["code"], "VALIDATION_FAILED");
        assert_eq!(body["message"], "bad size");
        assert!(body.get("details").is_none());
        assert!(body.get("retry_after").is_none());
    }

    #[test]
    fn test_content_type_header() {
        let response = ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", "gone").into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
    }

    #[test]
    fn test_retry_after_header() {
        let error: ApiError = LifecycleError::RateLimited {
            retry_after: Some(60),
        }
        .into();
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "60");
    }

    #[test]
    fn test_trace_id_fallback() {
        let error = ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "X", "y");
        let trace_id = error.trace_id.unwrap();
        assert!(trace_id.starts_with("corr-"));
        assert_eq!(trace_id.len(), 13);
    }

    #[test]
    fn test_missing_fields_message() {
        let error = LifecycleError::MissingFields(vec!["name".into(), "size".into()]);
        assert_eq!(
            error.to_string(),
            "Missing required POST data variables: [name, size]"
        );

        let api: ApiError = error.into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.details, Some(Box::new(json!({"missing": ["name", "size"]}))));
    }

    #[test]
    fn test_driver_error_translation() {
        let over_quota = LifecycleError::from_driver(
            DriverError::OverQuota {
                message: "Storage quota exceeded".into(),
            },
            "Volume creation failed. Contact support",
        );
        let api: ApiError = over_quota.into();
        assert_eq!(api.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(api.message.as_ref(), "Storage quota exceeded");

        let creds = LifecycleError::from_driver(
            DriverError::InvalidCredentials {
                provider: "openstack".into(),
                identity: "abc".into(),
            },
            "unused",
        );
        let api: ApiError = creds.into();
        assert_eq!(api.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            api.message.as_ref(),
            "Identity/Provider Authentication Failed"
        );

        let backend = LifecycleError::from_driver(
            DriverError::Backend {
                details: "connection reset".into(),
            },
            "Volume creation failed. Contact support",
        );
        let api: ApiError = backend.into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            api.message.as_ref(),
            "Volume creation failed. Contact support"
        );
    }

    #[test]
    fn test_driver_not_found_names_kind() {
        let error = LifecycleError::from_driver(
            DriverError::NotFound {
                kind: ResourceKind::Snapshot,
                id: "snap-1".into(),
            },
            "unused",
        );
        assert_eq!(error.to_string(), "Snapshot snap-1 does not exist");
    }

    #[test]
    fn test_repository_errors() {
        let api: ApiError = RepositoryError::NotFound {
            entity: "Identity",
            id: "42".into(),
        }
        .into();
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert_eq!(api.message.as_ref(), "Identity 42 not found");

        let api: ApiError = sea_orm::DbErr::RecordNotFound("volume".into()).into();
        assert_eq!(api.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_from_anyhow_hides_details() {
        let api: ApiError = anyhow::anyhow!("secret detail").into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.message.contains("secret"));
    }
}
