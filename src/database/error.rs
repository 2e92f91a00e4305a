use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde::Serialize;
use thiserror::Error as ThisError;
use warp::{http::StatusCode, reject::Rejection};

/// Messages keyed by the offending request field.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum ErrorKind {
    #[error("Authentication credentials were not provided or are invalid")]
    Unauthenticated,
    #[error("Not found")]
    NotFound,
    #[error("Invalid input")]
    InvalidInput,
    #[error("Conflict")]
    Conflict,
    #[error("Internal server error")]
    Internal,
}

impl ErrorKind {
    pub fn new(self, info: &str) -> Error {
        Error {
            kind: self,
            info: Some(info.to_owned()),
            fields: FieldErrors::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, ThisError)]
#[error("{kind}{}", .info.as_ref().map(|i| format!(": {i}")).unwrap_or_default())]
pub struct Error {
    pub kind: ErrorKind,
    pub info: Option<String>,
    pub fields: FieldErrors,
}

impl Error {
    /// Validation failure carrying per-field messages.
    pub fn invalid_fields(fields: FieldErrors) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            info: None,
            fields,
        }
    }

    pub fn not_found(entity: &str) -> Self {
        ErrorKind::NotFound.new(&format!("No {entity} found with the given id"))
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// Body sent to clients. Internal details never leave the process.
    pub fn body(&self) -> ErrorBody {
        let error = match self.kind {
            ErrorKind::Internal => self.kind.to_string(),
            _ => self.info.clone().unwrap_or_else(|| self.kind.to_string()),
        };

        ErrorBody {
            error,
            fields: (!self.fields.is_empty()).then(|| self.fields.clone()),
        }
    }
}

impl warp::reject::Reject for Error {}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

/// Storage failure. Converted into an `Internal` error; the detail is logged only.
#[derive(Debug)]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!(
                "{e} ({})",
                e.constraint().unwrap_or("no constraint")
            )),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(format!("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(format!("Unknown error")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        log::error!("Query failed: {}", value.info);
        ErrorKind::Internal.new(&value.info)
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        QueryError::from(value).into()
    }
}

/// A single field failed to parse or validate.
#[derive(Debug)]
pub struct TypeError {
    field: String,
    info: String,
}

impl TypeError {
    pub fn new(field: &str, info: &str) -> Self {
        Self {
            field: field.to_string(),
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(value.field, vec![value.info]);
        Error::invalid_fields(fields)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}: {})", self.field, self.info)
    }
}

impl std::error::Error for TypeError {}

impl From<TypeError> for Rejection {
    fn from(value: TypeError) -> Self {
        warp::reject::custom(Error::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_become_internal() {
        let error: Error = sqlx::Error::PoolTimedOut.into();

        assert_eq!(error.kind, ErrorKind::Internal);
        assert_eq!(error.info.as_deref(), Some("Pool timed out"));
    }

    #[test]
    fn type_errors_carry_their_field() {
        let error: Error = TypeError::new("assigned_only", "Must be 0 or 1.").into();

        assert_eq!(error.kind, ErrorKind::InvalidInput);
        assert_eq!(error.fields["assigned_only"], vec!["Must be 0 or 1.".to_string()]);
    }

    #[test]
    fn errors_propagate_as_rejections() {
        fn handler() -> Result<(), Rejection> {
            Err(ErrorKind::NotFound.new("No tag found with the given id"))?;
            Ok(())
        }
        fn query(value: &str) -> Result<(), Rejection> {
            Err(TypeError::new("tags", value))?;
            Ok(())
        }

        let rejection = handler().unwrap_err();
        assert_eq!(rejection.find::<Error>().unwrap().kind, ErrorKind::NotFound);

        let rejection = query("Expected a comma separated list of ids.").unwrap_err();
        let error = rejection.find::<Error>().unwrap();
        assert_eq!(error.kind, ErrorKind::InvalidInput);
        assert!(error.fields.contains_key("tags"));
    }

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(ErrorKind::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::InvalidInput.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(ErrorKind::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_details_are_hidden_from_body() {
        let error = ErrorKind::Internal.new("connection refused on 10.0.0.3");
        let body = error.body();

        assert_eq!(body.error, "Internal server error");
        assert!(body.fields.is_none());
        assert!(error.to_string().contains("connection refused"));
    }

    #[test]
    fn field_errors_are_serialized() {
        let mut fields = FieldErrors::new();
        fields.insert(
            "price".into(),
            vec!["Ensure this value is greater than or equal to 0.".into()],
        );

        let body = serde_json::to_value(Error::invalid_fields(fields).body()).unwrap();

        assert_eq!(body["error"], "Invalid input");
        assert_eq!(
            body["fields"]["price"][0],
            "Ensure this value is greater than or equal to 0."
        );
    }

    #[test]
    fn not_found_has_no_fields_key() {
        let body = serde_json::to_value(Error::not_found("tag").body()).unwrap();

        assert_eq!(body["error"], "No tag found with the given id");
        assert!(body.get("fields").is_none());
    }
}
