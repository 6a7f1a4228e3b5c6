//! Hand-off to the SDK's sample application

use crate::{config::RemoteAppConfig, Error, ErrorKind, Result};
use std::process::{Command, ExitStatus};
use tracing::info;

/// Run the configured application with inherited stdio and wait for it.
///
/// `args` are appended to the configured arguments.
pub fn launch(config: &RemoteAppConfig, args: &[String]) -> Result<ExitStatus> {
  let path = config.path.as_ref().ok_or_else(|| {
    Error::with_info(ErrorKind::Config, "no remote application configured ([remote_app] path)")
  })?;

  info!("launching {}", path.display());
  let status = Command::new(path).args(&config.args).args(args).status().map_err(|err| {
    Error::with_info(ErrorKind::Io, format!("cannot run {}: {}", path.display(), err))
  })?;
  info!("{} exited with {}", path.display(), status);

  Ok(status)
}
