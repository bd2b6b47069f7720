//! API handlers for the Sigma server.

use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sigma_db::{QueryResult, SqlParam};
use std::sync::Arc;
use thiserror::Error;

/// Message returned when a request carries no SQL text.
pub const QUERY_REQUIRED: &str = "SQL query is required in the request body.";

/// Message returned when `params` is not an array of scalars.
pub const PARAMS_INVALID: &str = "params must be an array of scalar values.";

/// Request body for `POST /sql`.
#[derive(Debug, Default, Deserialize)]
pub struct QueryRequest {
    /// The SQL text to run. Required and non-empty.
    #[serde(default)]
    pub query: Option<String>,
    /// Positional parameters; `null` or absent means none.
    #[serde(default)]
    pub params: Option<Value>,
}

/// Response body for a successfully executed statement.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    /// Rows for a read, `{changes, lastInsertId}` for a write.
    pub data: QueryResult,
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("database error: {0}")]
    Database(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::Database(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "success": false, "error": msg }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Converts the raw `params` field into bound values.
fn bind_params(raw: Option<Value>) -> Result<Vec<SqlParam>, ApiError> {
    match raw {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(values)) => SqlParam::from_json_list(&values).map_err(|e| {
            tracing::debug!(error = %e, "rejecting non-scalar parameter");
            ApiError::BadRequest(PARAMS_INVALID.to_string())
        }),
        Some(_) => Err(ApiError::BadRequest(PARAMS_INVALID.to_string())),
    }
}

/// Handler for `POST /sql`.
///
/// Validates the body before touching the database, then runs the statement
/// on the shared handle. Driver messages are returned to the client as-is.
pub async fn sql_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let request = match payload {
        Ok(Json(request)) => request,
        // No JSON body at all: treat it like an empty object.
        Err(JsonRejection::MissingJsonContentType(_)) => QueryRequest::default(),
        Err(rejection) => return Err(ApiError::BadRequest(rejection.body_text())),
    };

    let query = request
        .query
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest(QUERY_REQUIRED.to_string()))?;

    tracing::info!(query = %query, "received SQL query");
    if let Some(raw @ Value::Array(values)) = &request.params {
        if !values.is_empty() {
            tracing::info!(params = %raw, "with parameters");
        }
    }

    let params = bind_params(request.params)?;

    let data = state
        .db
        .execute_async(query, params)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "error executing SQL query");
            ApiError::Database(e.to_string())
        })?;

    Ok(Json(QueryResponse {
        success: true,
        data,
    }))
}
