//! SDK status codes

use std::{error, fmt};

/// Result type returned by SDK calls
pub type SdkResult<T> = std::result::Result<T, SdkError>;

/// Unspecified failure
pub const ERROR_GENERIC: u32 = 0x8000;
/// File could not be written or read
pub const ERROR_FILE: u32 = 0x8100;
/// Connection to the camera failed or was lost
pub const ERROR_CONNECT: u32 = 0x8200;
/// Out of memory
pub const ERROR_MEMORY: u32 = 0x8300;
/// API misuse (bad argument, unsupported call)
pub const ERROR_API: u32 = 0x8400;
/// The SDK runtime is not initialized or could not start
pub const ERROR_INIT: u32 = 0x8500;
/// Transport adaptor failure
pub const ERROR_ADAPTOR: u32 = 0x8700;
/// The camera refused the request
pub const ERROR_DEVICE: u32 = 0x8800;

/// Error reported by the SDK
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct SdkError {
  code: u32,
}

impl SdkError {
  /// Creates an error from a raw status code
  pub const fn new(code: u32) -> Self {
    Self { code }
  }

  /// The raw status code
  pub fn code(&self) -> u32 {
    self.code
  }

  fn description(&self) -> &'static str {
    match self.code {
      ERROR_FILE => "file error",
      ERROR_CONNECT => "connection error",
      ERROR_MEMORY => "out of memory",
      ERROR_API => "invalid api call",
      ERROR_INIT => "sdk not initialized",
      ERROR_ADAPTOR => "adaptor error",
      ERROR_DEVICE => "device error",
      _ => "generic error",
    }
  }
}

impl fmt::Display for SdkError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} (0x{:04x})", self.description(), self.code)
  }
}

impl fmt::Debug for SdkError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    <Self as fmt::Display>::fmt(self, f)
  }
}

impl error::Error for SdkError {}
