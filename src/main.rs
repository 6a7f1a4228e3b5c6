use clap::Parser;
use remote_sdk::VirtualSdk;
use std::{io, process::ExitCode, sync::Arc};
use tethercam::{
  cli::{Args, CliCommand},
  config::RemoteAppConfig,
  logging, remote_app, Config, Orchestrator, Settings, Verdict,
};

fn launch_remote_app(config: &RemoteAppConfig, args: &[String]) -> ExitCode {
  match remote_app::launch(config, args) {
    Ok(status) => match status.code().and_then(|code| u8::try_from(code).ok()) {
      Some(code) => ExitCode::from(code),
      None if status.success() => ExitCode::SUCCESS,
      None => ExitCode::FAILURE,
    },
    Err(err) => {
      eprintln!("error: {}", err);
      ExitCode::FAILURE
    }
  }
}

fn main() -> ExitCode {
  let args = Args::parse();
  logging::setup();

  let config = match Config::load(args.config.as_deref()) {
    Ok(config) => config,
    Err(err) => {
      eprintln!("error: {}", err);
      return ExitCode::FAILURE;
    }
  };

  if let CliCommand::Sdk { args: extra } = &args.command {
    return launch_remote_app(&config.remote_app, extra);
  }
  let Some(command) = args.command.to_command() else {
    return ExitCode::FAILURE;
  };

  let mut settings = Settings::from_config(&config);
  args.apply(&mut settings);

  let sdk = Arc::new(VirtualSdk::new(config.virtual_camera.to_sdk_config()));
  let verdict = Orchestrator::new(sdk, settings).run(&command, &mut io::stdout());

  if let Verdict::Failure(err) = &verdict {
    eprintln!("error: {}", err);
  }

  verdict.exit_code()
}
