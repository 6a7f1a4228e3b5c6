//! Configuration file and effective settings
//!
//! The file is optional and lives at `<config dir>/tethercam/config.toml`
//! unless another path is given. Command-line flags override it.

use crate::{select::Selection, session::SessionConfig, Error, ErrorKind, Result};
use remote_sdk::{ControlMode, DownloadBehavior, VirtualConfig};
use serde::Deserialize;
use std::{
  fs,
  path::{Path, PathBuf},
  time::Duration,
};
use tracing::debug;

/// Configuration file structure
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
  /// Which camera to control
  #[serde(default)]
  pub camera: CameraConfig,
  /// Delays and timeouts
  #[serde(default)]
  pub timing: TimingConfig,
  /// Where captured images go
  #[serde(default)]
  pub capture: CaptureConfig,
  /// External application launched by `sdk`
  #[serde(default)]
  pub remote_app: RemoteAppConfig,
  /// Behavior of the virtual camera backend
  #[serde(default)]
  pub virtual_camera: VirtualCameraConfig,
}

/// `[camera]` section
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CameraConfig {
  /// Position in the enumeration order
  #[serde(default)]
  pub index: usize,
  /// Model name, takes precedence over the index
  pub model: Option<String>,
}

/// `[timing]` section, all values in milliseconds
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct TimingConfig {
  /// Pause after connecting
  pub settle_ms: u64,
  /// Pause between half press and full press
  pub half_press_ms: u64,
  /// How long to wait for the image download
  pub capture_timeout_ms: u64,
}

impl Default for TimingConfig {
  fn default() -> Self {
    Self { settle_ms: 1000, half_press_ms: 500, capture_timeout_ms: 5000 }
  }
}

/// `[capture]` section
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CaptureConfig {
  /// Output directory
  pub dir: Option<PathBuf>,
  /// File name prefix
  #[serde(default)]
  pub prefix: String,
  /// First file number, the camera's counter is kept if unset
  pub sequence_start: Option<u32>,
}

/// `[remote_app]` section
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RemoteAppConfig {
  /// Program to run
  pub path: Option<PathBuf>,
  /// Arguments passed before the ones given on the command line
  #[serde(default)]
  pub args: Vec<String>,
}

/// Download outcome of the virtual camera
#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
  /// Download after `download_delay_ms`
  #[default]
  After,
  /// Never finish the download
  Never,
  /// Report a file error after `download_delay_ms`
  Fail,
}

/// `[virtual_camera]` section
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct VirtualCameraConfig {
  /// Models of the attached cameras
  pub cameras: Vec<String>,
  /// Fail SDK initialization
  pub fail_init: bool,
  /// Fail the connection handshake
  pub fail_connect: bool,
  /// Grant only contents transfer instead of remote control
  pub transfer_only: bool,
  /// Download outcome
  pub download: DownloadMode,
  /// Delay before the download outcome
  pub download_delay_ms: u64,
  /// Directory used when no output directory is given
  pub default_dir: Option<PathBuf>,
}

impl Default for VirtualCameraConfig {
  fn default() -> Self {
    Self {
      cameras: vec!["ILCE-7M4".to_owned()],
      fail_init: false,
      fail_connect: false,
      transfer_only: false,
      download: DownloadMode::After,
      download_delay_ms: 200,
      default_dir: None,
    }
  }
}

impl VirtualCameraConfig {
  /// Configuration of the virtual SDK
  pub fn to_sdk_config(&self) -> VirtualConfig {
    let delay = Duration::from_millis(self.download_delay_ms);
    let defaults = VirtualConfig::default();

    VirtualConfig {
      cameras: self.cameras.clone(),
      fail_init: self.fail_init,
      fail_connect: self.fail_connect,
      control_mode: if self.transfer_only {
        ControlMode::ContentsTransfer
      } else {
        ControlMode::Remote
      },
      download: match self.download {
        DownloadMode::After => DownloadBehavior::After(delay),
        DownloadMode::Never => DownloadBehavior::Never,
        DownloadMode::Fail => DownloadBehavior::Fail(delay),
      },
      default_dir: self.default_dir.clone().unwrap_or(defaults.default_dir),
    }
  }
}

impl Config {
  /// Load the configuration.
  ///
  /// A missing file at the default location yields the defaults; a missing
  /// file at an explicit path, or a malformed file, is an error.
  pub fn load(path: Option<&Path>) -> Result<Self> {
    let (path, explicit) = match path {
      Some(path) => (path.to_owned(), true),
      None => match default_path() {
        Some(path) => (path, false),
        None => return Ok(Config::default()),
      },
    };

    if !explicit && !path.exists() {
      debug!("no configuration file at {}", path.display());
      return Ok(Config::default());
    }

    let content = fs::read_to_string(&path).map_err(|err| {
      Error::with_info(ErrorKind::Config, format!("{}: {}", path.display(), err))
    })?;
    debug!("loaded configuration from {}", path.display());

    Self::parse(&content)
  }

  /// Parse configuration text
  pub fn parse(content: &str) -> Result<Self> {
    Ok(toml::from_str(content)?)
  }
}

/// Default location of the configuration file
pub fn default_path() -> Option<PathBuf> {
  dirs::config_dir().map(|dir| dir.join("tethercam").join("config.toml"))
}

/// Delays and timeouts used by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
  /// Pause after connecting
  pub settle_delay: Duration,
  /// Pause between half press and full press
  pub half_press_delay: Duration,
  /// How long a capture waits for its download
  pub capture_timeout: Duration,
}

impl Default for Timing {
  fn default() -> Self {
    TimingConfig::default().into()
  }
}

impl From<TimingConfig> for Timing {
  fn from(config: TimingConfig) -> Self {
    Self {
      settle_delay: Duration::from_millis(config.settle_ms),
      half_press_delay: Duration::from_millis(config.half_press_ms),
      capture_timeout: Duration::from_millis(config.capture_timeout_ms),
    }
  }
}

/// Effective settings of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
  /// Which camera to control
  pub selection: Selection,
  /// Delays and timeouts
  pub timing: Timing,
  /// Default output directory of a capture
  pub capture_dir: Option<PathBuf>,
  /// File name prefix of captured images
  pub prefix: String,
  /// First file number of captured images
  pub sequence_start: Option<u32>,
  /// Print progress information
  pub verbose: bool,
}

impl Settings {
  /// Settings from a configuration file, before command-line overrides
  pub fn from_config(config: &Config) -> Self {
    let selection = match &config.camera.model {
      Some(model) => Selection::Model(model.clone()),
      None => Selection::Index(config.camera.index),
    };

    Self {
      selection,
      timing: config.timing.into(),
      capture_dir: config.capture.dir.clone(),
      prefix: config.capture.prefix.clone(),
      sequence_start: config.capture.sequence_start,
      verbose: false,
    }
  }

  /// Session configuration for a capture into `dir`, or the default directory
  pub fn session_config(&self, dir: Option<&Path>) -> SessionConfig {
    SessionConfig {
      save_dir: dir.map(Path::to_owned).or_else(|| self.capture_dir.clone()),
      release_on_download: true,
      verbose: self.verbose,
      settle_delay: self.timing.settle_delay,
      half_press_delay: self.timing.half_press_delay,
    }
  }
}
