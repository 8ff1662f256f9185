use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use foodcart_types::domain::catalog::CatalogError;
use foodcart_types::domain::geo::GeocodeError;
use foodcart_types::domain::order::{OrderError, ValidationErrors};
use foodcart_types::ports::RepoError;
use serde::Serialize;
use thiserror::Error;

use crate::application::assignment::AssignmentError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Order has no products")]
    EmptyOrder,

    #[error("Address not found: {0}")]
    AddressNotFound(String),

    #[error("Geocoder unavailable: {0}")]
    GeocodeUnavailable(String),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        AppError::Internal(anyhow::anyhow!(e.to_string()))
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Validation(fields) => AppError::Validation(fields),
            OrderError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(e: CatalogError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<GeocodeError> for AppError {
    fn from(e: GeocodeError) -> Self {
        match e {
            GeocodeError::AddressNotFound(a) => AppError::AddressNotFound(a),
            GeocodeError::Unavailable(m) => AppError::GeocodeUnavailable(m),
        }
    }
}

impl From<AssignmentError> for AppError {
    fn from(e: AssignmentError) -> Self {
        match e {
            AssignmentError::EmptyOrder => AppError::EmptyOrder,
            AssignmentError::Repo(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a BTreeMap<String, Vec<String>>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, msg) = match &self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation failed".into()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            AppError::EmptyOrder | AppError::AddressNotFound(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::GeocodeUnavailable(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
            }
        };
        let fields = match &self {
            AppError::Validation(errors) => Some(errors.fields()),
            _ => None,
        };

        let body = serde_json::to_string(&ErrorBody { error: msg, fields })
            .unwrap_or_else(|_| "{\"error\":\"internal serialization\"}".into());
        (code, [("content-type", "application/json")], body).into_response()
    }
}
