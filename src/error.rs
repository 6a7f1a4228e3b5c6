//! Error handling

use remote_sdk::SdkError;
use std::{error, fmt};

/// Result type used in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ErrorKind {
  /// The SDK runtime could not start
  Initialization,
  /// No camera was found, or none matched the selection
  Enumeration,
  /// The camera rejected the handshake
  Connection,
  /// The property name is not in the registry
  PropertyNotFound,
  /// The camera refused to read or write the property
  PropertyRejected,
  /// The property value is not an integer
  InvalidValue,
  /// No image was downloaded within the capture timeout
  CaptureTimeout,
  /// The camera did not grant remote control
  RemoteControl,
  /// The session is not connected
  NotConnected,
  /// The session is in the wrong state for the operation
  InvalidState,
  /// The SDK reported an error on its own thread
  Device,
  /// The configuration file is invalid
  Config,
  /// Io error
  Io,
  /// Something else
  Other,
}

impl ErrorKind {
  fn message(self) -> &'static str {
    match self {
      ErrorKind::Initialization => "failed to initialize remote SDK",
      ErrorKind::Enumeration => "no cameras detected",
      ErrorKind::Connection => "unable to connect to camera",
      ErrorKind::PropertyNotFound => "property not found",
      ErrorKind::PropertyRejected => "unable to set/get property",
      ErrorKind::InvalidValue => "invalid property value",
      ErrorKind::CaptureTimeout => "unable to download image",
      ErrorKind::RemoteControl => "unable to start remote control",
      ErrorKind::NotConnected => "camera is not connected",
      ErrorKind::InvalidState => "invalid session state",
      ErrorKind::Device => "camera reported an error",
      ErrorKind::Config => "invalid configuration",
      ErrorKind::Io => "io error",
      ErrorKind::Other => "error",
    }
  }
}

/// General error
#[derive(Clone, PartialEq)]
pub struct Error {
  kind: ErrorKind,
  info: Option<String>,
}

impl Error {
  /// Creates a new error of the given kind
  pub fn new(kind: ErrorKind) -> Self {
    Self { kind, info: None }
  }

  /// Creates a new error with additional information
  pub fn with_info(kind: ErrorKind, info: impl Into<String>) -> Self {
    Self { kind, info: Some(info.into()) }
  }

  /// Wraps an SDK status as an error of the given kind
  pub fn sdk(kind: ErrorKind, error: SdkError) -> Self {
    Self::with_info(kind, error.to_string())
  }

  /// The kind of this error
  pub fn kind(&self) -> ErrorKind {
    self.kind
  }

  /// Additional information, if any
  pub fn info(&self) -> Option<&str> {
    self.info.as_deref()
  }
}

impl From<std::io::Error> for Error {
  fn from(err: std::io::Error) -> Self {
    Self::with_info(ErrorKind::Io, err.to_string())
  }
}

impl From<toml::de::Error> for Error {
  fn from(err: toml::de::Error) -> Self {
    Self::with_info(ErrorKind::Config, err.message())
  }
}

impl From<&str> for Error {
  fn from(message: &str) -> Self {
    Self::with_info(ErrorKind::Other, message)
  }
}

impl From<String> for Error {
  fn from(message: String) -> Self {
    Self::with_info(ErrorKind::Other, message)
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.kind.message())?;

    if let Some(error_info) = &self.info {
      f.write_fmt(format_args!(" [{}]", error_info))?;
    }

    Ok(())
  }
}

impl fmt::Debug for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    <Self as fmt::Display>::fmt(self, f)
  }
}

impl error::Error for Error {}
