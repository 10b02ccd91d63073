/* src/core/src/errors.rs */

use std::fmt;

/// Error type threaded through the request pipeline and the build step.
///
/// A `status` is the one explicit channel for overriding the HTTP status of
/// an error response; anything thrown without one becomes a 500. `expose`
/// marks a message as safe to show in production error pages.
#[derive(Debug, Clone)]
pub struct PyraError {
  code: String,
  message: String,
  status: u16,
  expose: bool,
}

fn default_status(code: &str) -> u16 {
  match code {
    "BAD_REQUEST" => 400,
    "NOT_FOUND" => 404,
    "METHOD_NOT_ALLOWED" => 405,
    "SCAN_ERROR" => 500,
    "COMPILE_ERROR" => 500,
    "RENDER_ERROR" => 500,
    "INTERNAL_ERROR" => 500,
    _ => 500,
  }
}

impl PyraError {
  pub fn new(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
    Self { code: code.into(), message: message.into(), status, expose: false }
  }

  pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
    let code = code.into();
    let status = default_status(&code);
    Self { code, message: message.into(), status, expose: false }
  }

  pub fn bad_request(msg: impl Into<String>) -> Self {
    Self::with_code("BAD_REQUEST", msg)
  }

  pub fn not_found(msg: impl Into<String>) -> Self {
    Self::with_code("NOT_FOUND", msg)
  }

  pub fn method_not_allowed(msg: impl Into<String>) -> Self {
    Self::with_code("METHOD_NOT_ALLOWED", msg)
  }

  pub fn scan(msg: impl Into<String>) -> Self {
    Self::with_code("SCAN_ERROR", msg)
  }

  pub fn compile(msg: impl Into<String>) -> Self {
    Self::with_code("COMPILE_ERROR", msg)
  }

  pub fn render(msg: impl Into<String>) -> Self {
    Self::with_code("RENDER_ERROR", msg)
  }

  pub fn internal(msg: impl Into<String>) -> Self {
    Self::with_code("INTERNAL_ERROR", msg)
  }

  /// Mark the message as user-facing: it survives into production error
  /// pages instead of being replaced by the generic 500 text.
  pub fn expose(mut self) -> Self {
    self.expose = true;
    self
  }

  pub fn with_status(mut self, status: u16) -> Self {
    self.status = status;
    self
  }

  pub fn code(&self) -> &str {
    &self.code
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn status(&self) -> u16 {
    self.status
  }

  pub fn is_exposed(&self) -> bool {
    self.expose
  }
}

impl fmt::Display for PyraError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.code, self.message)
  }
}

impl std::error::Error for PyraError {}

impl From<std::io::Error> for PyraError {
  fn from(err: std::io::Error) -> Self {
    Self::internal(err.to_string())
  }
}

impl From<serde_json::Error> for PyraError {
  fn from(err: serde_json::Error) -> Self {
    Self::internal(err.to_string())
  }
}
