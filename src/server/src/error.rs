/* src/server/src/error.rs */

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pyra_core::PyraError;

/// Newtype wrapper to implement `IntoResponse` for `PyraError`.
/// Required because Rust's orphan rule prevents `impl IntoResponse for
/// PyraError` when both types are foreign to this crate.
pub(crate) struct AxumError(pub PyraError);

impl IntoResponse for AxumError {
  fn into_response(self) -> Response {
    let err = self.0;
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::json!({
      "error": {
        "code": err.code(),
        "message": err.message(),
      }
    });
    (status, axum::Json(body)).into_response()
  }
}

impl From<PyraError> for AxumError {
  fn from(err: PyraError) -> Self {
    Self(err)
  }
}
