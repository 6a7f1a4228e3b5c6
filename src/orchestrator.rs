//! Runs one command against one camera
//!
//! ```no_run
//! use std::sync::Arc;
//! use tethercam::{Command, Orchestrator, Settings};
//! use remote_sdk::{VirtualConfig, VirtualSdk};
//!
//! let sdk = Arc::new(VirtualSdk::new(VirtualConfig::default()));
//! let orchestrator = Orchestrator::new(sdk, Settings::default());
//! let verdict = orchestrator.run(&Command::Get { property: "iso".into() }, &mut std::io::stdout());
//! ```

use crate::{
  config::Settings,
  exit::{ExitPolicy, Verdict},
  registry::{self, PropertyEntry},
  runtime::SdkHandle,
  select::DeviceSelector,
  session::Session,
  Error, ErrorKind, Result,
};
use remote_sdk::{ControlMode, Sdk};
use std::{
  fmt,
  io::Write,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};
use tracing::{debug, info, warn};

/// How long to wait for a callback that already claimed the capture to decide the exit
const DECISION_GRACE: Duration = Duration::from_secs(1);

/// A command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// Take a picture and wait for its download
  Capture {
    /// Output directory, overrides the configured one
    dir: Option<PathBuf>,
  },
  /// Print a property value
  Get {
    /// Property name
    property: String,
  },
  /// Change a property value
  Set {
    /// Property name
    property: String,
    /// New value, must be an integer
    value: String,
  },
}

/// A command whose parameters were checked
#[derive(Debug)]
enum Plan {
  Capture { dir: Option<PathBuf> },
  Get(&'static PropertyEntry),
  Set(&'static PropertyEntry, i64),
}

fn find_property(name: &str) -> Result<&'static PropertyEntry> {
  registry::lookup(name).ok_or_else(|| Error::with_info(ErrorKind::PropertyNotFound, name))
}

impl Plan {
  fn validate(command: &Command) -> Result<Self> {
    match command {
      Command::Capture { dir } => Ok(Plan::Capture { dir: dir.clone() }),
      Command::Get { property } => Ok(Plan::Get(find_property(property)?)),
      Command::Set { property, value } => {
        let entry = find_property(property)?;
        let value = value.trim().parse::<i64>().map_err(|_| {
          Error::with_info(ErrorKind::InvalidValue, format!("'{}' is not an integer", value))
        })?;

        Ok(Plan::Set(entry, value))
      }
    }
  }
}

/// How a command finished
#[derive(Debug, PartialEq, Eq)]
enum Completion {
  /// The command is done and the caller decides the exit
  Finished,
  /// The exit was decided elsewhere (by the download callback)
  Decided,
}

/// Drives a [`Session`] through a [`Command`] and turns the outcome into a [`Verdict`]
pub struct Orchestrator {
  sdk: Arc<dyn Sdk>,
  settings: Settings,
  selector: Box<dyn DeviceSelector>,
}

impl Orchestrator {
  /// Create an orchestrator selecting the camera from the settings
  pub fn new(sdk: Arc<dyn Sdk>, settings: Settings) -> Self {
    let selector = Box::new(settings.selection.clone());
    Self { sdk, settings, selector }
  }

  /// Use another camera selection strategy
  pub fn with_selector(mut self, selector: impl DeviceSelector + 'static) -> Self {
    self.selector = Box::new(selector);
    self
  }

  /// Run a command.
  ///
  /// User output (property values, progress) goes to `out`. The SDK is
  /// released exactly once before this returns, whichever path decided.
  pub fn run(&self, command: &Command, out: &mut dyn Write) -> Verdict {
    let exit = Arc::new(ExitPolicy::new(SdkHandle::new(Arc::clone(&self.sdk))));

    match self.execute(command, &exit, out) {
      Ok(Completion::Finished) => {
        exit.exit_success();
      }
      Ok(Completion::Decided) => debug!("exit was decided by the session"),
      Err(err) => {
        if !exit.exit_failure(err.clone()) {
          warn!("{} reported after the exit was decided", err);
        }
      }
    }

    exit.verdict()
  }

  fn progress(&self, out: &mut dyn Write, message: fmt::Arguments) -> Result<()> {
    if self.settings.verbose {
      writeln!(out, "{}", message)?;
    }
    Ok(())
  }

  fn execute(
    &self,
    command: &Command,
    exit: &Arc<ExitPolicy>,
    out: &mut dyn Write,
  ) -> Result<Completion> {
    let plan = Plan::validate(command)?;
    debug!("running {:?}", plan);

    let handle = exit.handle();
    handle.init()?;
    self.progress(out, format_args!("Remote SDK successfully initialized."))?;

    let cameras =
      handle.sdk().enumerate().map_err(|err| Error::sdk(ErrorKind::Enumeration, err))?;
    if cameras.is_empty() {
      return Err(Error::new(ErrorKind::Enumeration));
    }
    self.progress(out, format_args!("Camera enumeration successful. {} detected", cameras.len()))?;

    let index = self.selector.select(&cameras).ok_or_else(|| {
      Error::with_info(
        ErrorKind::Enumeration,
        format!("{} not found among {} camera(s)", self.selector, cameras.len()),
      )
    })?;
    let camera = &cameras[index];
    info!("selected {}", camera);

    let dir = match &plan {
      Plan::Capture { dir } => dir.as_deref(),
      _ => None,
    };
    let config = self.settings.session_config(dir);
    let mut session = Session::open(handle.sdk(), camera, config, Arc::clone(exit))?;
    session.connect(ControlMode::Remote)?;

    match plan {
      Plan::Get(entry) => {
        let value = session.read_property(entry.code)?;
        writeln!(out, "{}: {}", entry.name, value)?;
        Ok(Completion::Finished)
      }
      Plan::Set(entry, value) => {
        session.write_property(entry.code, value)?;
        info!("{} set to {}", entry.name, value);
        Ok(Completion::Finished)
      }
      Plan::Capture { .. } => self.capture(&mut session, exit, out),
    }
  }

  fn capture(
    &self,
    session: &mut Session,
    exit: &ExitPolicy,
    out: &mut dyn Write,
  ) -> Result<Completion> {
    let save_dir = session.config().save_dir.clone();
    let naming = !self.settings.prefix.is_empty() || self.settings.sequence_start.is_some();
    if save_dir.is_some() || naming {
      let dir = save_dir.as_deref().unwrap_or(Path::new(""));
      session.set_save_path(dir, &self.settings.prefix, self.settings.sequence_start)?;
    }

    self.progress(out, format_args!("Capturing"))?;
    session.trigger_capture()?;

    let completion = await_download(session, exit, self.settings.timing.capture_timeout)?;
    if let Some(file) = session.downloaded_file() {
      self.progress(out, format_args!("Downloaded {}", file.display()))?;
    }

    Ok(completion)
  }
}

/// Wait for the capture in flight to end, giving up after `timeout`.
///
/// Never returns [`Completion::Decided`] unless a verdict was actually published.
fn await_download(session: &Session, exit: &ExitPolicy, timeout: Duration) -> Result<Completion> {
  if exit.wait(timeout).is_some() {
    return Ok(Completion::Decided);
  }
  if session.abort_capture() {
    return Err(Error::new(ErrorKind::CaptureTimeout));
  }

  debug!("capture ended right at the deadline");
  match exit.wait(DECISION_GRACE) {
    Some(_) => Ok(Completion::Decided),
    None if session.downloaded_file().is_some() => Ok(Completion::Finished),
    None => Err(Error::new(ErrorKind::CaptureTimeout)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{config::Timing, select::Selection, session::SessionConfig};
  use remote_sdk::{
    property, CameraInfo, Device, DeviceCallback, DownloadBehavior, PropertyCode, SdkResult,
    ShutterCommand, VirtualConfig, VirtualSdk, VirtualStats,
  };
  use std::{
    sync::Mutex,
    thread,
    time::{Duration, Instant},
  };

  fn settings(capture_timeout: Duration) -> Settings {
    Settings {
      timing: Timing {
        settle_delay: Duration::ZERO,
        half_press_delay: Duration::ZERO,
        capture_timeout,
      },
      ..Default::default()
    }
  }

  fn run(sdk: &Arc<VirtualSdk>, settings: Settings, command: Command) -> (Verdict, String) {
    let mut out = Vec::new();
    let verdict = Orchestrator::new(sdk.clone(), settings).run(&command, &mut out);
    (verdict, String::from_utf8(out).unwrap())
  }

  fn failure_kind(verdict: &Verdict) -> Option<ErrorKind> {
    match verdict {
      Verdict::Failure(err) => Some(err.kind()),
      Verdict::Success => None,
    }
  }

  fn get(name: &str) -> Command {
    Command::Get { property: name.into() }
  }

  fn set(name: &str, value: &str) -> Command {
    Command::Set { property: name.into(), value: value.into() }
  }

  #[test]
  fn set_then_get_round_trips() {
    let sdk = Arc::new(VirtualSdk::new(VirtualConfig::default()));

    for (name, value) in [("iso", "400"), ("aperture", "560"), ("exposure_bias", "-1000")] {
      let (verdict, out) = run(&sdk, settings(Duration::ZERO), set(name, value));
      assert_eq!(verdict, Verdict::Success);
      assert_eq!(out, "");

      let (verdict, out) = run(&sdk, settings(Duration::ZERO), get(name));
      assert_eq!(verdict, Verdict::Success);
      assert_eq!(out, format!("{}: {}\n", name, value));
    }

    assert_eq!(sdk.property(0, property::ISO), Some(400));
    assert_eq!(sdk.stats().release, 6);
  }

  #[test]
  fn unknown_property_never_touches_the_device() {
    let sdk = Arc::new(VirtualSdk::new(VirtualConfig::default()));

    for command in [get("zoom"), set("zoom", "3")] {
      let (verdict, out) = run(&sdk, settings(Duration::ZERO), command);
      assert_eq!(failure_kind(&verdict), Some(ErrorKind::PropertyNotFound));
      assert_eq!(out, "");
    }

    assert_eq!(sdk.stats(), VirtualStats::default());
  }

  #[test]
  fn non_numeric_value_is_rejected_before_any_device_call() {
    let sdk = Arc::new(VirtualSdk::new(VirtualConfig::default()));

    let (verdict, _) = run(&sdk, settings(Duration::ZERO), set("iso", "fast"));
    insta::assert_snapshot!(
      match verdict { Verdict::Failure(err) => err.to_string(), Verdict::Success => String::new() },
      @"invalid property value ['fast' is not an integer]"
    );
    assert_eq!(sdk.stats().device_calls(), 0);
    assert_eq!(sdk.stats().connect, 0);
  }

  #[test]
  fn connect_failure_releases_once_for_every_command() {
    let commands = [Command::Capture { dir: None }, get("iso"), set("iso", "200")];

    for command in commands {
      let sdk =
        Arc::new(VirtualSdk::new(VirtualConfig { fail_connect: true, ..Default::default() }));
      let (verdict, _) = run(&sdk, settings(Duration::from_secs(5)), command);

      assert_eq!(failure_kind(&verdict), Some(ErrorKind::Connection));
      assert_eq!(sdk.stats().init, 1);
      assert_eq!(sdk.stats().release, 1);
      assert_eq!(sdk.stats().commands, 0);
    }
  }

  #[test]
  fn init_failure_is_reported_and_released() {
    let sdk = Arc::new(VirtualSdk::new(VirtualConfig { fail_init: true, ..Default::default() }));
    let (verdict, _) = run(&sdk, settings(Duration::ZERO), get("iso"));

    assert_eq!(failure_kind(&verdict), Some(ErrorKind::Initialization));
    assert_eq!(sdk.stats().release, 1);
    assert_eq!(sdk.stats().enumerate, 0);
  }

  #[test]
  fn no_camera_is_an_enumeration_failure() {
    let sdk = Arc::new(VirtualSdk::new(VirtualConfig { cameras: vec![], ..Default::default() }));
    let (verdict, _) = run(&sdk, settings(Duration::ZERO), get("iso"));

    assert_eq!(failure_kind(&verdict), Some(ErrorKind::Enumeration));
    assert_eq!(sdk.stats().open, 0);
    assert_eq!(sdk.stats().release, 1);
  }

  #[test]
  fn selector_picks_among_many_cameras() {
    let sdk = Arc::new(VirtualSdk::new(VirtualConfig {
      cameras: vec!["ILCE-7M4".into(), "ILCE-1".into(), "ZV-E10".into()],
      ..Default::default()
    }));

    let settings =
      Settings { selection: Selection::Model("ILCE-1".into()), ..settings(Duration::ZERO) };
    let (verdict, _) = run(&sdk, settings.clone(), set("iso", "3200"));
    assert_eq!(verdict, Verdict::Success);
    assert_eq!(sdk.property(1, property::ISO), Some(3200));
    assert_eq!(sdk.property(0, property::ISO), Some(100));

    let mut out = Vec::new();
    let verdict = Orchestrator::new(sdk.clone(), settings)
      .with_selector(Selection::Index(7))
      .run(&get("iso"), &mut out);
    assert_eq!(failure_kind(&verdict), Some(ErrorKind::Enumeration));
  }

  #[test]
  fn rejected_value_fails() {
    let sdk = Arc::new(VirtualSdk::new(VirtualConfig::default()));
    let (verdict, _) = run(&sdk, settings(Duration::ZERO), set("iso", "1"));

    assert_eq!(failure_kind(&verdict), Some(ErrorKind::PropertyRejected));
    assert_eq!(sdk.property(0, property::ISO), Some(100));
    assert_eq!(sdk.stats().release, 1);
  }

  #[test]
  fn capture_completes_before_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let sdk = Arc::new(VirtualSdk::new(VirtualConfig {
      download: DownloadBehavior::After(Duration::from_millis(200)),
      ..Default::default()
    }));

    let started = Instant::now();
    let (verdict, out) = run(
      &sdk,
      settings(Duration::from_secs(5)),
      Command::Capture { dir: Some(dir.path().to_owned()) },
    );

    assert_eq!(verdict, Verdict::Success);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(out, "");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    assert_eq!(sdk.stats().release, 1);
  }

  #[test]
  fn capture_without_download_times_out() {
    let sdk = Arc::new(VirtualSdk::new(VirtualConfig {
      download: DownloadBehavior::Never,
      ..Default::default()
    }));

    let started = Instant::now();
    let capture = Command::Capture { dir: None };
    let (verdict, _) = run(&sdk, settings(Duration::from_millis(300)), capture);

    assert!(started.elapsed() >= Duration::from_millis(300));
    match verdict {
      Verdict::Failure(err) => insta::assert_snapshot!(err, @"unable to download image"),
      Verdict::Success => panic!("capture should time out"),
    }
    assert_eq!(sdk.stats().release, 1);
  }

  #[test]
  fn late_download_after_timeout_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let sdk = Arc::new(VirtualSdk::new(VirtualConfig {
      download: DownloadBehavior::After(Duration::from_millis(150)),
      ..Default::default()
    }));

    let (verdict, _) = run(
      &sdk,
      settings(Duration::from_millis(20)),
      Command::Capture { dir: Some(dir.path().to_owned()) },
    );
    assert_eq!(failure_kind(&verdict), Some(ErrorKind::CaptureTimeout));

    thread::sleep(Duration::from_millis(400));
    assert_eq!(sdk.stats().release, 1);
  }

  #[test]
  fn capture_download_error_fails() {
    let sdk = Arc::new(VirtualSdk::new(VirtualConfig {
      download: DownloadBehavior::Fail(Duration::from_millis(10)),
      ..Default::default()
    }));
    let (verdict, _) = run(&sdk, settings(Duration::from_secs(5)), Command::Capture { dir: None });

    assert_eq!(failure_kind(&verdict), Some(ErrorKind::Device));
    assert_eq!(sdk.stats().release, 1);
  }

  #[test]
  fn capture_requires_remote_control() {
    let sdk = Arc::new(VirtualSdk::new(VirtualConfig {
      control_mode: ControlMode::ContentsTransfer,
      ..Default::default()
    }));
    let (verdict, _) = run(&sdk, settings(Duration::from_secs(5)), Command::Capture { dir: None });

    assert_eq!(failure_kind(&verdict), Some(ErrorKind::RemoteControl));
    assert_eq!(sdk.stats().release, 1);
  }

  #[test]
  fn verbose_capture_reports_progress() {
    let dir = tempfile::tempdir().unwrap();
    let sdk = Arc::new(VirtualSdk::new(VirtualConfig {
      download: DownloadBehavior::After(Duration::from_millis(10)),
      ..Default::default()
    }));
    let settings =
      Settings { verbose: true, prefix: "IMG".into(), ..settings(Duration::from_secs(5)) };

    let (verdict, out) =
      run(&sdk, settings, Command::Capture { dir: Some(dir.path().to_owned()) });
    assert_eq!(verdict, Verdict::Success);

    let lines: Vec<_> = out.lines().collect();
    assert_eq!(
      lines[..3],
      ["Remote SDK successfully initialized.", "Camera enumeration successful. 1 detected", "Capturing"]
    );
    assert!(lines[3].starts_with("Downloaded "));
    assert!(lines[3].contains("IMG"));
  }

  /// Logs teardown calls of a virtual camera in order
  struct TeardownLog {
    sdk: VirtualSdk,
    calls: Arc<Mutex<Vec<&'static str>>>,
  }

  struct LoggedDevice {
    device: Box<dyn Device>,
    calls: Arc<Mutex<Vec<&'static str>>>,
  }

  impl TeardownLog {
    fn new(config: VirtualConfig) -> Arc<Self> {
      Arc::new(Self { sdk: VirtualSdk::new(config), calls: Default::default() })
    }

    fn calls(&self) -> Vec<&'static str> {
      self.calls.lock().unwrap().clone()
    }
  }

  impl Sdk for TeardownLog {
    fn init(&self) -> SdkResult<()> {
      self.sdk.init()
    }

    fn enumerate(&self) -> SdkResult<Vec<CameraInfo>> {
      self.sdk.enumerate()
    }

    fn open(
      &self,
      camera: &CameraInfo,
      callback: Arc<dyn DeviceCallback>,
    ) -> SdkResult<Box<dyn Device>> {
      let device = self.sdk.open(camera, callback)?;
      Ok(Box::new(LoggedDevice { device, calls: Arc::clone(&self.calls) }))
    }

    fn release(&self) {
      self.calls.lock().unwrap().push("release");
      self.sdk.release()
    }
  }

  impl Device for LoggedDevice {
    fn connect(&mut self, mode: ControlMode) -> SdkResult<()> {
      self.device.connect(mode)
    }

    fn disconnect(&mut self) -> SdkResult<()> {
      self.calls.lock().unwrap().push("disconnect");
      self.device.disconnect()
    }

    fn control_mode(&self) -> Option<ControlMode> {
      self.device.control_mode()
    }

    fn get_property(&self, code: PropertyCode) -> SdkResult<i64> {
      self.device.get_property(code)
    }

    fn set_property(&mut self, code: PropertyCode, value: i64) -> SdkResult<()> {
      self.device.set_property(code, value)
    }

    fn set_save_path(&mut self, dir: &Path, prefix: &str, start: Option<u32>) -> SdkResult<()> {
      self.device.set_save_path(dir, prefix, start)
    }

    fn send_command(&mut self, command: ShutterCommand) -> SdkResult<()> {
      self.device.send_command(command)
    }
  }

  #[test]
  fn device_disconnects_before_release_on_every_path() {
    let dir = tempfile::tempdir().unwrap();
    let capture = Command::Capture { dir: Some(dir.path().to_owned()) };
    let cases = [
      (DownloadBehavior::After(Duration::ZERO), get("iso")),
      (DownloadBehavior::After(Duration::from_millis(50)), capture.clone()),
      (DownloadBehavior::Never, capture.clone()),
      (DownloadBehavior::Fail(Duration::from_millis(10)), capture),
    ];

    for (download, command) in cases {
      let sdk = TeardownLog::new(VirtualConfig { download, ..Default::default() });
      let mut out = Vec::new();
      let settings = settings(Duration::from_millis(500));
      let _ = Orchestrator::new(sdk.clone(), settings).run(&command, &mut out);

      assert_eq!(sdk.calls(), ["disconnect", "release"], "{:?} with {:?}", command, download);
    }
  }

  #[test]
  fn download_without_release_flag_is_finished_by_the_caller() {
    let dir = tempfile::tempdir().unwrap();
    let sdk = Arc::new(VirtualSdk::new(VirtualConfig {
      download: DownloadBehavior::After(Duration::ZERO),
      ..Default::default()
    }));
    let exit = Arc::new(ExitPolicy::new(SdkHandle::new(sdk.clone())));
    exit.handle().init().unwrap();

    let camera = sdk.enumerate().unwrap().remove(0);
    let config = SessionConfig {
      save_dir: Some(dir.path().to_owned()),
      release_on_download: false,
      settle_delay: Duration::ZERO,
      half_press_delay: Duration::ZERO,
      ..Default::default()
    };
    let mut session = Session::open(sdk.as_ref(), &camera, config, Arc::clone(&exit)).unwrap();
    session.connect(ControlMode::Remote).unwrap();
    session.set_save_path(dir.path(), "", None).unwrap();
    session.trigger_capture().unwrap();

    let started = Instant::now();
    let completion = await_download(&session, &exit, Duration::from_millis(100)).unwrap();

    assert_eq!(completion, Completion::Finished);
    assert!(started.elapsed() < Duration::from_millis(100) + DECISION_GRACE * 2);
    assert!(!exit.is_decided());
    assert!(session.downloaded_file().is_some());
  }
}
