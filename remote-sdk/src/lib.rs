//! Boundary to the vendor camera remote SDK.
//!
//! The SDK is consumed through three traits:
//!  - [`Sdk`]: the process-wide runtime (init, enumeration, release)
//!  - [`Device`]: one enumerated camera, driven by the caller's thread
//!  - [`DeviceCallback`]: notifications delivered on an SDK-owned thread
//!
//! [`VirtualSdk`](vcamera::VirtualSdk) implements them in-process.

#![deny(unused_must_use)]
#![deny(missing_docs)]

pub mod error;
pub mod property;
pub mod vcamera;

use std::{fmt, path::Path, sync::Arc};

#[doc(inline)]
pub use crate::{
  error::{SdkError, SdkResult},
  property::PropertyCode,
  vcamera::{DownloadBehavior, VirtualConfig, VirtualSdk, VirtualStats},
};

/// Control mode requested when connecting to a camera
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ControlMode {
  /// Shooting and property control
  Remote,
  /// Only file transfer from the camera storage
  ContentsTransfer,
}

/// Shutter release commands
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ShutterCommand {
  /// Shutter button pressed all the way down
  ReleaseDown,
  /// Shutter button released
  ReleaseUp,
}

/// Information about an enumerated camera
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CameraInfo {
  /// Camera model
  pub model: String,
  /// Connection identifier (serial number, port, ...)
  pub id: String,
}

impl fmt::Display for CameraInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.model, self.id)
  }
}

/// SDK runtime
pub trait Sdk: Send + Sync {
  /// Start the SDK runtime
  fn init(&self) -> SdkResult<()>;

  /// List all connected cameras
  fn enumerate(&self) -> SdkResult<Vec<CameraInfo>>;

  /// Create a device object for a camera.
  ///
  /// The callback is held by the SDK and invoked from its delivery thread.
  fn open(&self, camera: &CameraInfo, callback: Arc<dyn DeviceCallback>)
    -> SdkResult<Box<dyn Device>>;

  /// Shut down the SDK runtime
  fn release(&self);
}

/// One camera handled by the SDK
pub trait Device: Send {
  /// Handshake with the camera, blocking until it answers
  fn connect(&mut self, mode: ControlMode) -> SdkResult<()>;

  /// Close the connection
  fn disconnect(&mut self) -> SdkResult<()>;

  /// Control mode granted by the camera, if connected
  fn control_mode(&self) -> Option<ControlMode>;

  /// Read the current value of a property
  fn get_property(&self, code: PropertyCode) -> SdkResult<i64>;

  /// Write a property value
  fn set_property(&mut self, code: PropertyCode, value: i64) -> SdkResult<()>;

  /// Where the next downloaded image is stored.
  ///
  /// An empty directory keeps the SDK default, `None` keeps the device's
  /// file counter.
  fn set_save_path(&mut self, dir: &Path, prefix: &str, sequence_start: Option<u32>)
    -> SdkResult<()>;

  /// Send a shutter command
  fn send_command(&mut self, command: ShutterCommand) -> SdkResult<()>;
}

/// Notifications delivered by the SDK.
///
/// All methods may be called from a thread owned by the SDK.
pub trait DeviceCallback: Send + Sync {
  /// The handshake finished
  fn on_connected(&self) {}

  /// The connection was closed
  fn on_disconnected(&self) {}

  /// The camera accepted a shutter release and started the transfer
  fn on_capture_acknowledged(&self) {}

  /// An image was written to local storage
  fn on_download_complete(&self, path: &Path);

  /// Non-fatal warning reported by the camera
  fn on_warning(&self, _code: u32) {}

  /// Error reported by the SDK outside of a call
  fn on_error(&self, error: SdkError);
}
