use std::convert::Infallible;

use serde::Serialize;
use warp::{
    body::BodyDeserializeError,
    http::StatusCode,
    reject::{InvalidQuery, MethodNotAllowed, PayloadTooLarge, Rejection, UnsupportedMediaType},
    reply::{self, Reply, Response},
};

use crate::error::{Error, ErrorBody};

pub(super) fn json<T: Serialize>(value: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(value), status).into_response()
}

pub(super) fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

fn plain_error(error: &str) -> ErrorBody {
    ErrorBody {
        error: error.to_string(),
        fields: None,
    }
}

/// Renders every rejection as a JSON error body with the matching status.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, body) = if let Some(error) = err.find::<Error>() {
        (error.status(), error.body())
    } else if let Some(error) = err.find::<BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            plain_error(&format!("Malformed request body: {error}")),
        )
    } else if err.find::<InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, plain_error("Malformed query string"))
    } else if err.find::<PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, plain_error("Payload too large"))
    } else if err.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            plain_error("Unsupported media type"),
        )
    } else if err.find::<MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, plain_error("Method not allowed"))
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, plain_error("Not found"))
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            plain_error("Internal server error"),
        )
    };

    if status.is_server_error() {
        log::warn!("Request failed with {status}");
    }

    Ok(json(&body, status))
}
