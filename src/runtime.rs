//! Ownership of the process-wide SDK runtime

use crate::{Error, ErrorKind, Result};
use remote_sdk::{Device, Sdk};
use std::{
  mem,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, Weak,
  },
};
use tracing::{debug, info};

/// A device shared between its session and the runtime that tears it down
pub(crate) type SharedDevice = Arc<Mutex<Box<dyn Device>>>;

pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Guard over the SDK runtime.
///
/// The runtime is released at most once, by whichever of [`release`](SdkHandle::release)
/// or drop comes first. Devices attached to it are disconnected before that.
pub struct SdkHandle {
  sdk: Arc<dyn Sdk>,
  acquired: AtomicBool,
  released: AtomicBool,
  devices: Mutex<Vec<Weak<Mutex<Box<dyn Device>>>>>,
}

impl SdkHandle {
  /// Wrap an SDK that was not initialized yet
  pub fn new(sdk: Arc<dyn Sdk>) -> Self {
    Self {
      sdk,
      acquired: AtomicBool::new(false),
      released: AtomicBool::new(false),
      devices: Mutex::new(Vec::new()),
    }
  }

  /// Start the runtime.
  ///
  /// The runtime counts as acquired even if this fails, so it is still released.
  pub fn init(&self) -> Result<()> {
    self.acquired.store(true, Ordering::Release);

    self.sdk.init().map_err(|err| Error::sdk(ErrorKind::Initialization, err))?;
    info!("remote SDK initialized");

    Ok(())
  }

  /// The wrapped SDK
  pub fn sdk(&self) -> &dyn Sdk {
    self.sdk.as_ref()
  }

  /// Disconnect `device` on release if it is still alive and connected then
  pub(crate) fn attach(&self, device: &SharedDevice) {
    lock(&self.devices).push(Arc::downgrade(device));
  }

  /// Release the runtime.
  ///
  /// Returns `true` if this call performed the release.
  pub fn release(&self) -> bool {
    if self.released.swap(true, Ordering::AcqRel) {
      debug!("remote SDK already released");
      return false;
    }

    let devices = mem::take(&mut *lock(&self.devices));
    for device in devices.iter().filter_map(Weak::upgrade) {
      let mut device = lock(&device);
      if device.control_mode().is_some() {
        if let Err(err) = device.disconnect() {
          debug!("disconnect before release failed: {}", err);
        }
      }
    }

    if self.acquired.load(Ordering::Acquire) {
      self.sdk.release();
      info!("remote SDK released");
    }

    true
  }

  /// Whether the runtime was released
  pub fn is_released(&self) -> bool {
    self.released.load(Ordering::Acquire)
  }
}

impl Drop for SdkHandle {
  fn drop(&mut self) {
    self.release();
  }
}
