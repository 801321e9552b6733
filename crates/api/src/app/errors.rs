use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value, json};

use roster_infra::StoreError;

use crate::app::schema::{FieldErrors, single_error};

pub const MALFORMED_JSON: &str = "Could not parse the request body as JSON.";
pub const JSON_RESPONSES_ONLY: &str = "This API only supports responses encoded as JSON.";
pub const JSON_REQUESTS_ONLY: &str = "This API only supports requests encoded as JSON.";

/// Every way a request can fail, mapped onto one status code each.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("conflict: {0}")]
    Conflict(String),

    /// The client's `Accept` header rules out JSON responses.
    #[error("not acceptable: {0}")]
    NotAcceptable(String),

    /// A body-carrying request without a JSON content type.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// The path named an API version this resource does not serve.
    #[error("unsupported API version: {0}")]
    UnsupportedVersion(String),

    #[error("malformed body: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    Store(StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::UnsupportedVersion(_) | Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn missing_organisation(id: impl std::fmt::Display) -> Self {
        Self::Validation(single_error(
            "organisation_id",
            format!("Organisation with given ID ({id}) does not exist"),
        ))
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingOrganisation(id) => Self::missing_organisation(id),
            other => Self::Store(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Validation(errors) => json_error(status, None, Some(errors)),
            Self::NotFound | Self::MethodNotAllowed => json_error(status, None, None),
            Self::Conflict(description)
            | Self::MalformedBody(description)
            | Self::NotAcceptable(description)
            | Self::UnsupportedMediaType(description) => json_error(status, Some(description), None),
            Self::UnsupportedVersion(raw) => json_error(
                status,
                None,
                Some(single_error(
                    "api_version",
                    format!("Unsupported API version: {raw}"),
                )),
            ),
            Self::Store(err) => {
                tracing::error!(error = %err, "store failure");
                json_error(status, None, None)
            }
        }
    }
}

/// `{"title": "<code> <reason>"[, "description": ...][, "errors": {...}]}`
pub fn json_error(
    status: StatusCode,
    description: Option<String>,
    errors: Option<FieldErrors>,
) -> Response {
    let mut body = Map::new();
    body.insert("title".into(), Value::String(title(status)));
    if let Some(description) = description {
        body.insert("description".into(), Value::String(description));
    }
    if let Some(errors) = errors {
        body.insert("errors".into(), json!(errors));
    }

    (status, axum::Json(Value::Object(body))).into_response()
}

fn title(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}
