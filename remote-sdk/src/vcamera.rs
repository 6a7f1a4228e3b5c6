//! In-process virtual camera
//!
//! Implements the SDK traits without hardware. Property values live per
//! camera and survive across sessions, a shutter release is answered from a
//! dedicated delivery thread (like the real SDK does), and every call is
//! counted so callers can check how the SDK was driven.
//!
//! ```
//! use remote_sdk::{Sdk, VirtualConfig, VirtualSdk};
//!
//! let sdk = VirtualSdk::new(VirtualConfig::default());
//! sdk.init().unwrap();
//! assert_eq!(sdk.enumerate().unwrap().len(), 1);
//! sdk.release();
//! assert_eq!(sdk.stats().release, 1);
//! ```

use crate::{
  error::{ERROR_API, ERROR_CONNECT, ERROR_DEVICE, ERROR_FILE, ERROR_GENERIC, ERROR_INIT},
  property::{self, PropertyCode},
  CameraInfo, ControlMode, Device, DeviceCallback, Sdk, SdkError, SdkResult, ShutterCommand,
};
use std::{
  collections::HashMap,
  fs,
  ops::RangeInclusive,
  path::{Path, PathBuf},
  sync::{
    atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
    Arc, Mutex, PoisonError,
  },
  thread,
  time::Duration,
};
use tracing::{debug, warn};

/// Bytes written for every captured image
pub const SAMPLE_IMAGE: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x02, 0xFF, 0xD9];

/// What happens after the shutter is released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadBehavior {
  /// The image is downloaded after the given delay
  After(Duration),
  /// The capture is acknowledged but the download never completes
  Never,
  /// The SDK reports a file error after the given delay
  Fail(Duration),
}

/// Behavior of a [`VirtualSdk`]
#[derive(Debug, Clone)]
pub struct VirtualConfig {
  /// Models of the attached cameras, in enumeration order
  pub cameras: Vec<String>,
  /// Make [`Sdk::init`] fail
  pub fail_init: bool,
  /// Make [`Device::connect`] fail
  pub fail_connect: bool,
  /// Control mode granted on connect, whatever was requested
  pub control_mode: ControlMode,
  /// Outcome of a shutter release
  pub download: DownloadBehavior,
  /// Directory used when no save path was set
  pub default_dir: PathBuf,
}

impl Default for VirtualConfig {
  fn default() -> Self {
    Self {
      cameras: vec!["ILCE-7M4".to_owned()],
      fail_init: false,
      fail_connect: false,
      control_mode: ControlMode::Remote,
      download: DownloadBehavior::After(Duration::from_millis(200)),
      default_dir: std::env::temp_dir(),
    }
  }
}

/// Number of calls received by a [`VirtualSdk`], per operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualStats {
  /// [`Sdk::init`]
  pub init: usize,
  /// [`Sdk::release`]
  pub release: usize,
  /// [`Sdk::enumerate`]
  pub enumerate: usize,
  /// [`Sdk::open`]
  pub open: usize,
  /// [`Device::connect`]
  pub connect: usize,
  /// [`Device::disconnect`]
  pub disconnect: usize,
  /// [`Device::get_property`]
  pub get: usize,
  /// [`Device::set_property`]
  pub set: usize,
  /// [`Device::send_command`]
  pub commands: usize,
}

impl VirtualStats {
  /// Calls that reached a device (everything except init, release and enumerate)
  pub fn device_calls(&self) -> usize {
    self.open + self.connect + self.disconnect + self.get + self.set + self.commands
  }
}

#[derive(Default)]
struct Counters {
  init: AtomicUsize,
  release: AtomicUsize,
  enumerate: AtomicUsize,
  open: AtomicUsize,
  connect: AtomicUsize,
  disconnect: AtomicUsize,
  get: AtomicUsize,
  set: AtomicUsize,
  commands: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
  counter.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Clone)]
struct VirtualProperty {
  value: i64,
  range: RangeInclusive<i64>,
}

struct CameraState {
  info: CameraInfo,
  properties: Mutex<HashMap<PropertyCode, VirtualProperty>>,
  file_counter: AtomicU32,
}

fn default_properties() -> HashMap<PropertyCode, VirtualProperty> {
  let table = [
    (property::S1, property::UNLOCKED, property::UNLOCKED..=property::LOCKED),
    (property::AEL, property::UNLOCKED, property::UNLOCKED..=property::LOCKED),
    (property::F_NUMBER, 280, 100..=2200),
    (property::EXPOSURE_BIAS, 0, -5000..=5000),
    (property::FLASH_COMPENSATION, 0, -3000..=3000),
    (property::SHUTTER_SPEED, (1 << 16) | 125, 0..=0xFFFF_FFFF),
    (property::ISO, 100, 50..=409_600),
    (property::EXPOSURE_PROGRAM, 1, 1..=0x8050),
    (property::FILE_TYPE, 1, 1..=4),
    (property::JPEG_QUALITY, 2, 1..=4),
    (property::WHITE_BALANCE, 0, 0..=0x0120),
    (property::FOCUS_MODE, 2, 1..=7),
    (property::METERING_MODE, 1, 1..=6),
    (property::FLASH_MODE, 2, 1..=6),
    (property::DRIVE_MODE, 1, 1..=0x0000_FFFF),
  ];

  table.into_iter().map(|(code, value, range)| (code, VirtualProperty { value, range })).collect()
}

/// SDK runtime backed by virtual cameras
pub struct VirtualSdk {
  config: VirtualConfig,
  cameras: Vec<Arc<CameraState>>,
  counters: Arc<Counters>,
  initialized: Arc<AtomicBool>,
}

impl VirtualSdk {
  /// Create a runtime with the given behavior
  pub fn new(config: VirtualConfig) -> Self {
    let cameras = config
      .cameras
      .iter()
      .enumerate()
      .map(|(i, model)| {
        Arc::new(CameraState {
          info: CameraInfo { model: model.clone(), id: format!("vcam:{i}") },
          properties: Mutex::new(default_properties()),
          file_counter: AtomicU32::new(1),
        })
      })
      .collect();

    Self {
      config,
      cameras,
      counters: Default::default(),
      initialized: Arc::new(AtomicBool::new(false)),
    }
  }

  /// Calls received so far
  pub fn stats(&self) -> VirtualStats {
    let c = &self.counters;
    let load = |counter: &AtomicUsize| counter.load(Ordering::Relaxed);

    VirtualStats {
      init: load(&c.init),
      release: load(&c.release),
      enumerate: load(&c.enumerate),
      open: load(&c.open),
      connect: load(&c.connect),
      disconnect: load(&c.disconnect),
      get: load(&c.get),
      set: load(&c.set),
      commands: load(&c.commands),
    }
  }

  /// Whether [`Sdk::init`] succeeded and [`Sdk::release`] was not called since
  pub fn is_initialized(&self) -> bool {
    self.initialized.load(Ordering::Acquire)
  }

  /// Current value of a property on the camera at `index`
  pub fn property(&self, index: usize, code: PropertyCode) -> Option<i64> {
    let camera = self.cameras.get(index)?;
    let properties = camera.properties.lock().unwrap_or_else(PoisonError::into_inner);
    properties.get(&code).map(|property| property.value)
  }

  fn ensure_initialized(&self) -> SdkResult<()> {
    if self.is_initialized() {
      Ok(())
    } else {
      Err(SdkError::new(ERROR_INIT))
    }
  }
}

impl Sdk for VirtualSdk {
  fn init(&self) -> SdkResult<()> {
    bump(&self.counters.init);

    if self.config.fail_init {
      return Err(SdkError::new(ERROR_INIT));
    }

    self.initialized.store(true, Ordering::Release);
    debug!("virtual sdk initialized with {} camera(s)", self.cameras.len());
    Ok(())
  }

  fn enumerate(&self) -> SdkResult<Vec<CameraInfo>> {
    bump(&self.counters.enumerate);
    self.ensure_initialized()?;

    Ok(self.cameras.iter().map(|camera| camera.info.clone()).collect())
  }

  fn open(
    &self,
    camera: &CameraInfo,
    callback: Arc<dyn DeviceCallback>,
  ) -> SdkResult<Box<dyn Device>> {
    bump(&self.counters.open);
    self.ensure_initialized()?;

    let state = self
      .cameras
      .iter()
      .find(|state| state.info.id == camera.id)
      .ok_or(SdkError::new(ERROR_CONNECT))?;

    Ok(Box::new(VirtualDevice {
      camera: Arc::clone(state),
      callback,
      counters: Arc::clone(&self.counters),
      initialized: Arc::clone(&self.initialized),
      config: self.config.clone(),
      mode: None,
      save_dir: None,
      prefix: String::new(),
      pressed: false,
    }))
  }

  fn release(&self) {
    bump(&self.counters.release);

    if !self.initialized.swap(false, Ordering::AcqRel) {
      warn!("virtual sdk released while not initialized");
    }
  }
}

struct VirtualDevice {
  camera: Arc<CameraState>,
  callback: Arc<dyn DeviceCallback>,
  counters: Arc<Counters>,
  initialized: Arc<AtomicBool>,
  config: VirtualConfig,
  mode: Option<ControlMode>,
  save_dir: Option<PathBuf>,
  prefix: String,
  pressed: bool,
}

impl VirtualDevice {
  fn ensure_connected(&self) -> SdkResult<ControlMode> {
    if !self.initialized.load(Ordering::Acquire) {
      return Err(SdkError::new(ERROR_INIT));
    }

    self.mode.ok_or(SdkError::new(ERROR_CONNECT))
  }

  fn start_delivery(&self) -> SdkResult<()> {
    let callback = Arc::clone(&self.callback);
    let camera = Arc::clone(&self.camera);
    let dir = self.save_dir.clone().unwrap_or_else(|| self.config.default_dir.clone());
    let prefix = self.prefix.clone();
    let download = self.config.download;

    thread::Builder::new()
      .name("vcamera-delivery".to_string())
      .spawn(move || {
        callback.on_capture_acknowledged();

        match download {
          DownloadBehavior::Never => debug!("virtual camera will never finish the download"),
          DownloadBehavior::Fail(delay) => {
            thread::sleep(delay);
            callback.on_error(SdkError::new(ERROR_FILE));
          }
          DownloadBehavior::After(delay) => {
            thread::sleep(delay);

            let sequence = camera.file_counter.fetch_add(1, Ordering::AcqRel);
            match write_image(&dir, &prefix, sequence) {
              Ok(path) => callback.on_download_complete(&path),
              Err(err) => {
                warn!("virtual camera could not store image in {}: {}", dir.display(), err);
                callback.on_error(SdkError::new(ERROR_FILE));
              }
            }
          }
        }
      })
      .map(drop)
      .map_err(|_| SdkError::new(ERROR_GENERIC))
  }
}

fn write_image(dir: &Path, prefix: &str, sequence: u32) -> std::io::Result<PathBuf> {
  fs::create_dir_all(dir)?;

  let path = dir.join(format!("{prefix}{sequence:05}.JPG"));
  fs::write(&path, SAMPLE_IMAGE)?;

  Ok(path)
}

impl Device for VirtualDevice {
  fn connect(&mut self, mode: ControlMode) -> SdkResult<()> {
    bump(&self.counters.connect);

    if !self.initialized.load(Ordering::Acquire) {
      return Err(SdkError::new(ERROR_INIT));
    }
    if self.config.fail_connect {
      return Err(SdkError::new(ERROR_CONNECT));
    }

    if mode != self.config.control_mode {
      debug!("requested {:?}, camera granted {:?}", mode, self.config.control_mode);
    }
    self.mode = Some(self.config.control_mode);
    self.callback.on_connected();

    Ok(())
  }

  fn disconnect(&mut self) -> SdkResult<()> {
    bump(&self.counters.disconnect);

    if self.mode.take().is_some() {
      self.callback.on_disconnected();
    }

    Ok(())
  }

  fn control_mode(&self) -> Option<ControlMode> {
    self.mode
  }

  fn get_property(&self, code: PropertyCode) -> SdkResult<i64> {
    bump(&self.counters.get);
    self.ensure_connected()?;

    let properties = self.camera.properties.lock().unwrap_or_else(PoisonError::into_inner);
    properties.get(&code).map(|property| property.value).ok_or(SdkError::new(ERROR_API))
  }

  fn set_property(&mut self, code: PropertyCode, value: i64) -> SdkResult<()> {
    bump(&self.counters.set);
    self.ensure_connected()?;

    let mut properties = self.camera.properties.lock().unwrap_or_else(PoisonError::into_inner);
    let property = properties.get_mut(&code).ok_or(SdkError::new(ERROR_API))?;

    if !property.range.contains(&value) {
      return Err(SdkError::new(ERROR_DEVICE));
    }

    property.value = value;
    Ok(())
  }

  fn set_save_path(
    &mut self,
    dir: &Path,
    prefix: &str,
    sequence_start: Option<u32>,
  ) -> SdkResult<()> {
    self.save_dir = if dir.as_os_str().is_empty() { None } else { Some(dir.to_owned()) };
    self.prefix = prefix.to_owned();

    if let Some(start) = sequence_start {
      self.camera.file_counter.store(start, Ordering::Release);
    }

    Ok(())
  }

  fn send_command(&mut self, command: ShutterCommand) -> SdkResult<()> {
    bump(&self.counters.commands);

    if self.ensure_connected()? != ControlMode::Remote {
      return Err(SdkError::new(ERROR_API));
    }

    match command {
      ShutterCommand::ReleaseDown => {
        self.pressed = true;
        Ok(())
      }
      ShutterCommand::ReleaseUp if self.pressed => {
        self.pressed = false;
        self.start_delivery()
      }
      ShutterCommand::ReleaseUp => Err(SdkError::new(ERROR_API)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::mpsc;

  struct ChannelCallback(Mutex<mpsc::Sender<Result<PathBuf, SdkError>>>);

  impl DeviceCallback for ChannelCallback {
    fn on_download_complete(&self, path: &Path) {
      let _ = self.0.lock().unwrap().send(Ok(path.to_owned()));
    }

    fn on_error(&self, error: SdkError) {
      let _ = self.0.lock().unwrap().send(Err(error));
    }
  }

  fn open_device(
    sdk: &VirtualSdk,
  ) -> (Box<dyn Device>, mpsc::Receiver<Result<PathBuf, SdkError>>) {
    let (tx, rx) = mpsc::channel();
    sdk.init().unwrap();
    let camera = sdk.enumerate().unwrap().remove(0);
    let device = sdk.open(&camera, Arc::new(ChannelCallback(Mutex::new(tx)))).unwrap();
    (device, rx)
  }

  #[test]
  fn properties_require_connection() {
    let sdk = VirtualSdk::new(VirtualConfig::default());
    let (mut device, _rx) = open_device(&sdk);

    assert_eq!(device.get_property(property::ISO), Err(SdkError::new(ERROR_CONNECT)));

    device.connect(ControlMode::Remote).unwrap();
    device.set_property(property::ISO, 800).unwrap();
    assert_eq!(device.get_property(property::ISO), Ok(800));
    assert_eq!(sdk.property(0, property::ISO), Some(800));
  }

  #[test]
  fn rejects_unknown_codes_and_out_of_range_values() {
    let sdk = VirtualSdk::new(VirtualConfig::default());
    let (mut device, _rx) = open_device(&sdk);
    device.connect(ControlMode::Remote).unwrap();

    assert_eq!(device.get_property(PropertyCode(0xFFFF)), Err(SdkError::new(ERROR_API)));
    assert_eq!(device.set_property(property::ISO, 1), Err(SdkError::new(ERROR_DEVICE)));
    assert_eq!(device.get_property(property::ISO), Ok(100));
  }

  #[test]
  fn shutter_release_downloads_into_save_path() {
    let dir = std::env::temp_dir().join(format!("vcamera-test-{}", std::process::id()));
    let sdk = VirtualSdk::new(VirtualConfig {
      download: DownloadBehavior::After(Duration::from_millis(10)),
      ..Default::default()
    });
    let (mut device, rx) = open_device(&sdk);
    device.connect(ControlMode::Remote).unwrap();
    device.set_save_path(&dir, "IMG", Some(7)).unwrap();

    assert_eq!(device.send_command(ShutterCommand::ReleaseUp), Err(SdkError::new(ERROR_API)));
    device.send_command(ShutterCommand::ReleaseDown).unwrap();
    device.send_command(ShutterCommand::ReleaseUp).unwrap();

    let path = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(path, dir.join("IMG00007.JPG"));
    assert_eq!(fs::read(&path).unwrap(), SAMPLE_IMAGE);

    fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn failed_download_reports_file_error() {
    let sdk = VirtualSdk::new(VirtualConfig {
      download: DownloadBehavior::Fail(Duration::ZERO),
      ..Default::default()
    });
    let (mut device, rx) = open_device(&sdk);
    device.connect(ControlMode::Remote).unwrap();
    device.send_command(ShutterCommand::ReleaseDown).unwrap();
    device.send_command(ShutterCommand::ReleaseUp).unwrap();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Err(SdkError::new(ERROR_FILE)));
  }

  #[test]
  fn release_clears_initialization() {
    let sdk = VirtualSdk::new(VirtualConfig::default());
    sdk.init().unwrap();
    assert!(sdk.is_initialized());

    sdk.release();
    assert!(!sdk.is_initialized());
    assert_eq!(sdk.enumerate(), Err(SdkError::new(ERROR_INIT)));
    assert_eq!(sdk.stats(), VirtualStats { init: 1, release: 1, enumerate: 1, ..Default::default() });
  }

  #[test]
  fn contents_transfer_mode_cannot_shoot() {
    let sdk = VirtualSdk::new(VirtualConfig {
      control_mode: ControlMode::ContentsTransfer,
      ..Default::default()
    });
    let (mut device, _rx) = open_device(&sdk);
    device.connect(ControlMode::Remote).unwrap();

    assert_eq!(device.control_mode(), Some(ControlMode::ContentsTransfer));
    assert_eq!(device.send_command(ShutterCommand::ReleaseDown), Err(SdkError::new(ERROR_API)));
  }
}
