//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load: {0}")]
    Load(String),
    #[error("config parse: {0}")]
    Parse(String),
    #[error("missing setting: {0}")]
    Missing(&'static str),
}

/// Which foreign-key rule a payload value broke. Rules are checked in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyRule {
    Missing,
    InvalidFormat,
    DoesNotExist,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ForeignKeyViolation {
    pub column: String,
    pub rule: ForeignKeyRule,
    pub value: Option<String>,
}

impl std::fmt::Display for ForeignKeyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self.value.as_deref().unwrap_or("");
        match self.rule {
            ForeignKeyRule::Missing => write!(f, "{} (foreign key) is missing", self.column),
            ForeignKeyRule::InvalidFormat => {
                write!(f, "{} (foreign key) format invalid: {}", self.column, value)
            }
            ForeignKeyRule::DoesNotExist => write!(f, "{} does not exist: {}", self.column, value),
        }
    }
}

/// Every foreign-key violation found in one payload, at most one per column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ViolationList(pub Vec<ForeignKeyViolation>);

impl std::fmt::Display for ViolationList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("; "))
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("metadata: {0}")]
    Metadata(String),
    #[error("cannot convert '{value}' to {expected} for column {column}")]
    Conversion {
        column: String,
        value: String,
        expected: String,
    },
    #[error("{0}")]
    ForeignKey(ViolationList),
    #[error("{column} already exists: {value}")]
    Uniqueness { column: String, value: String },
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl AppError {
    pub fn metadata(e: sqlx::Error) -> Self {
        AppError::Metadata(e.to_string())
    }

    /// Error kind reported to clients in `error.code`.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Metadata(_) => "metadata_error",
            AppError::Conversion { .. } => "conversion_error",
            AppError::ForeignKey(_) => "foreign_key_violation",
            AppError::Uniqueness { .. } => "uniqueness_violation",
            AppError::Configuration(_) => "configuration_error",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Conflict(_) => "conflict",
            AppError::Db(_) => "database_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Metadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Conversion { .. } => StatusCode::BAD_REQUEST,
            AppError::ForeignKey(_) => StatusCode::NOT_FOUND,
            AppError::Uniqueness { .. } => StatusCode::CONFLICT,
            AppError::Configuration(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        let details = match &self {
            AppError::ForeignKey(list) => serde_json::to_value(&list.0).ok(),
            AppError::Uniqueness { column, value } => {
                Some(serde_json::json!({ "column": column, "value": value }))
            }
            AppError::Conversion { column, expected, .. } => {
                Some(serde_json::json!({ "column": column, "expected": expected }))
            }
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violations_render_one_message_per_column() {
        let list = ViolationList(vec![
            ForeignKeyViolation {
                column: "region_guid".into(),
                rule: ForeignKeyRule::InvalidFormat,
                value: Some("not-a-uuid".into()),
            },
            ForeignKeyViolation {
                column: "zone_guid".into(),
                rule: ForeignKeyRule::Missing,
                value: None,
            },
        ]);
        assert_eq!(
            list.to_string(),
            "region_guid (foreign key) format invalid: not-a-uuid; zone_guid (foreign key) is missing"
        );
    }

    #[test]
    fn status_classes_follow_the_taxonomy() {
        let fk = AppError::ForeignKey(ViolationList::default());
        assert_eq!(fk.status(), StatusCode::NOT_FOUND);
        let dup = AppError::Uniqueness { column: "ward_code".into(), value: "ABC".into() };
        assert_eq!(dup.status(), StatusCode::CONFLICT);
        assert_eq!(dup.to_string(), "ward_code already exists: ABC");
        assert_eq!(AppError::Configuration("no primary key".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Metadata("down".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
