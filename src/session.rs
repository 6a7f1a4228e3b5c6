//! Connection to one camera
//!
//! A [`Session`] moves strictly forward through its states:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> CaptureTriggered -> Downloading -> Terminated
//! ```
//!
//! Property reads and writes keep it in `Connected`. A capture is single-use:
//! the download notification arrives on the SDK's own thread, and with
//! [`release_on_download`](SessionConfig::release_on_download) set it is that
//! thread which decides the successful exit through the [`ExitPolicy`].

use crate::{
  exit::ExitPolicy,
  runtime::{lock, SharedDevice},
  Error, ErrorKind, Result,
};
use remote_sdk::{
  property, CameraInfo, ControlMode, Device, DeviceCallback, PropertyCode, Sdk, SdkError,
  ShutterCommand,
};
use std::{
  path::{Path, PathBuf},
  sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex, MutexGuard,
  },
  thread,
  time::Duration,
};
use tracing::{debug, info, warn};

/// How long the shutter button stays fully pressed
const RELEASE_HOLD: Duration = Duration::from_millis(35);

static NEXT_SESSION_ID: AtomicU32 = AtomicU32::new(1);

/// State of a [`Session`]
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum SessionState {
  /// Not connected yet, or the handshake failed
  Disconnected,
  /// Handshake in progress
  Connecting,
  /// Ready for property operations or a capture
  Connected,
  /// Shutter released, waiting for the camera
  CaptureTriggered,
  /// The camera is transferring the image
  Downloading,
  /// The session is over
  Terminated,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
  /// Where downloaded images go, `None` keeps the SDK default
  pub save_dir: Option<PathBuf>,
  /// Decide a successful exit as soon as an image is downloaded
  pub release_on_download: bool,
  /// Print progress information
  pub verbose: bool,
  /// Pause after the handshake before the camera accepts commands
  pub settle_delay: Duration,
  /// Pause between the half press and the full press of the shutter
  pub half_press_delay: Duration,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      save_dir: None,
      release_on_download: true,
      verbose: false,
      settle_delay: Duration::from_millis(1000),
      half_press_delay: Duration::from_millis(500),
    }
  }
}

struct Shared {
  state: Mutex<SessionState>,
  downloaded: Mutex<Option<PathBuf>>,
}

impl Shared {
  fn state(&self) -> SessionState {
    *lock(&self.state)
  }

  /// Move from one of `from` to `to`, returning whether the transition happened
  fn transition(&self, id: u32, from: &[SessionState], to: SessionState) -> bool {
    let mut state = lock(&self.state);

    if from.contains(&*state) {
      debug!("session {}: {:?} -> {:?}", id, *state, to);
      *state = to;
      true
    } else {
      false
    }
  }

  fn set(&self, id: u32, to: SessionState) {
    let mut state = lock(&self.state);
    debug!("session {}: {:?} -> {:?}", id, *state, to);
    *state = to;
  }
}

const CAPTURE_IN_FLIGHT: &[SessionState] =
  &[SessionState::CaptureTriggered, SessionState::Downloading];

/// Receives the SDK notifications of one session
struct SessionEvents {
  id: u32,
  shared: Arc<Shared>,
  exit: Arc<ExitPolicy>,
  release_on_download: bool,
}

impl DeviceCallback for SessionEvents {
  fn on_connected(&self) {
    debug!("session {}: camera connected", self.id);
  }

  fn on_disconnected(&self) {
    debug!("session {}: camera disconnected", self.id);
  }

  fn on_capture_acknowledged(&self) {
    let triggered = &[SessionState::CaptureTriggered];
    if !self.shared.transition(self.id, triggered, SessionState::Downloading) {
      debug!("session {}: capture acknowledged in state {:?}", self.id, self.shared.state());
    }
  }

  fn on_download_complete(&self, path: &Path) {
    if !self.shared.transition(self.id, CAPTURE_IN_FLIGHT, SessionState::Terminated) {
      warn!(
        "session {}: ignoring download of {} in state {:?}",
        self.id,
        path.display(),
        self.shared.state()
      );
      return;
    }

    info!("session {}: downloaded {}", self.id, path.display());
    *lock(&self.shared.downloaded) = Some(path.to_owned());

    if self.release_on_download && !self.exit.exit_success() {
      warn!("session {}: download finished after the exit was decided", self.id);
    }
  }

  fn on_warning(&self, code: u32) {
    warn!("session {}: camera warning 0x{:04x}", self.id, code);
  }

  fn on_error(&self, error: SdkError) {
    if self.shared.transition(self.id, CAPTURE_IN_FLIGHT, SessionState::Terminated) {
      self.exit.exit_failure(Error::sdk(ErrorKind::Device, error));
    } else {
      warn!("session {}: sdk error {} in state {:?}", self.id, error, self.shared.state());
    }
  }
}

/// Connection to one camera.
///
/// The device is attached to the runtime of the [`ExitPolicy`], so whichever
/// path decides the exit disconnects it before the SDK is released.
pub struct Session {
  id: u32,
  camera: CameraInfo,
  shared: Arc<Shared>,
  config: SessionConfig,
  device: SharedDevice,
}

impl Session {
  /// Create a session for an enumerated camera.
  ///
  /// The camera is not contacted until [`connect`](Session::connect).
  pub fn open(
    sdk: &dyn Sdk,
    camera: &CameraInfo,
    config: SessionConfig,
    exit: Arc<ExitPolicy>,
  ) -> Result<Self> {
    let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
    let shared = Arc::new(Shared {
      state: Mutex::new(SessionState::Disconnected),
      downloaded: Mutex::new(None),
    });
    let events = SessionEvents {
      id,
      shared: Arc::clone(&shared),
      exit: Arc::clone(&exit),
      release_on_download: config.release_on_download,
    };

    let device =
      sdk.open(camera, Arc::new(events)).map_err(|err| Error::sdk(ErrorKind::Connection, err))?;
    let device = Arc::new(Mutex::new(device));
    exit.handle().attach(&device);
    debug!("session {}: opened {}", id, camera);

    Ok(Self { id, camera: camera.clone(), shared, config, device })
  }

  /// Unique id of the session
  pub fn id(&self) -> u32 {
    self.id
  }

  /// Current state
  pub fn state(&self) -> SessionState {
    self.shared.state()
  }

  /// Configuration the session was opened with
  pub fn config(&self) -> &SessionConfig {
    &self.config
  }

  /// Path of the downloaded image, once the download completed
  pub fn downloaded_file(&self) -> Option<PathBuf> {
    lock(&self.shared.downloaded).clone()
  }

  /// Control mode granted by the camera
  pub fn control_mode(&self) -> Option<ControlMode> {
    self.device().control_mode()
  }

  fn device(&self) -> MutexGuard<'_, Box<dyn Device>> {
    lock(&self.device)
  }

  fn expect_connected(&self) -> Result<()> {
    match self.state() {
      SessionState::Connected => Ok(()),
      SessionState::Disconnected | SessionState::Connecting => {
        Err(Error::new(ErrorKind::NotConnected))
      }
      state => Err(Error::with_info(ErrorKind::InvalidState, format!("{:?}", state))),
    }
  }

  /// Handshake with the camera.
  ///
  /// Blocks for the settle delay after a successful handshake. On failure
  /// the session stays disconnected.
  pub fn connect(&mut self, mode: ControlMode) -> Result<()> {
    if !self.shared.transition(self.id, &[SessionState::Disconnected], SessionState::Connecting) {
      return Err(Error::with_info(ErrorKind::InvalidState, format!("{:?}", self.state())));
    }

    if let Err(err) = self.device().connect(mode) {
      self.shared.set(self.id, SessionState::Disconnected);
      return Err(Error::sdk(ErrorKind::Connection, err));
    }

    self.shared.set(self.id, SessionState::Connected);
    info!("session {}: connected to {} in {:?} mode", self.id, self.camera, self.control_mode());

    thread::sleep(self.config.settle_delay);
    Ok(())
  }

  /// Read a property value
  pub fn read_property(&self, code: PropertyCode) -> Result<i64> {
    self.expect_connected()?;

    let value = self
      .device()
      .get_property(code)
      .map_err(|err| Error::sdk(ErrorKind::PropertyRejected, err))?;
    debug!("session {}: property {} = {}", self.id, code, value);

    Ok(value)
  }

  /// Write a property value
  pub fn write_property(&mut self, code: PropertyCode, value: i64) -> Result<()> {
    self.expect_connected()?;

    self
      .device()
      .set_property(code, value)
      .map_err(|err| Error::sdk(ErrorKind::PropertyRejected, err))?;
    debug!("session {}: property {} set to {}", self.id, code, value);

    Ok(())
  }

  /// Configure where the next image is downloaded.
  ///
  /// An empty `dir` keeps the SDK default. Ignored once a capture was triggered.
  pub fn set_save_path(
    &mut self,
    dir: &Path,
    prefix: &str,
    sequence_start: Option<u32>,
  ) -> Result<()> {
    match self.state() {
      SessionState::Disconnected | SessionState::Connecting | SessionState::Connected => {}
      state => {
        warn!("session {}: save path ignored in state {:?}", self.id, state);
        return Ok(());
      }
    }

    self
      .device()
      .set_save_path(dir, prefix, sequence_start)
      .map_err(|err| Error::sdk(ErrorKind::Device, err))?;
    debug!("session {}: saving images to {:?}", self.id, dir);

    Ok(())
  }

  /// Press the shutter halfway, then fully, then let go.
  ///
  /// The session is `CaptureTriggered` as soon as the full press is sent.
  /// Completion is reported through the SDK callback, not by this call.
  pub fn trigger_capture(&mut self) -> Result<()> {
    self.expect_connected()?;

    if self.control_mode() != Some(ControlMode::Remote) {
      return Err(Error::new(ErrorKind::RemoteControl));
    }

    self
      .device()
      .set_property(property::S1, property::LOCKED)
      .map_err(|err| Error::sdk(ErrorKind::Device, err))?;
    thread::sleep(self.config.half_press_delay);

    self.shared.set(self.id, SessionState::CaptureTriggered);

    let pressed = self.device().send_command(ShutterCommand::ReleaseDown);
    let released = pressed.and_then(|()| {
      thread::sleep(RELEASE_HOLD);
      self.device().send_command(ShutterCommand::ReleaseUp)
    });

    // The download may already have torn the device down.
    if let Err(err) = self.device().set_property(property::S1, property::UNLOCKED) {
      warn!("session {}: could not release half press: {}", self.id, err);
    }

    if let Err(err) = released {
      self.shared.set(self.id, SessionState::Terminated);
      return Err(Error::sdk(ErrorKind::Device, err));
    }

    info!("session {}: capture triggered", self.id);
    Ok(())
  }

  /// Give up on a capture in flight.
  ///
  /// Returns `false` if the download already finished (or failed) in the meantime.
  pub fn abort_capture(&self) -> bool {
    self.shared.transition(self.id, CAPTURE_IN_FLIGHT, SessionState::Terminated)
  }
}

impl Drop for Session {
  fn drop(&mut self) {
    let mut device = self.device();
    if device.control_mode().is_some() {
      if let Err(err) = device.disconnect() {
        debug!("session {}: disconnect failed: {}", self.id, err);
      }
    }
  }
}
