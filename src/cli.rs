//! Command-line arguments

use crate::{config::Settings, orchestrator::Command, registry, select::Selection};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Control a tethered camera
#[derive(Parser, Debug)]
#[command(name = "tethercam", version, about, long_about = None, arg_required_else_help = true)]
pub struct Args {
  /// Command to run
  #[command(subcommand)]
  pub command: CliCommand,

  /// Configuration file
  #[arg(long, short, global = true)]
  pub config: Option<PathBuf>,

  /// Camera index in enumeration order
  #[arg(long, global = true)]
  pub camera: Option<usize>,

  /// Print progress information
  #[arg(long, short, global = true)]
  pub verbose: bool,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
  /// Capture an image and wait for its download
  Capture {
    /// Output directory
    #[arg(long)]
    dir: Option<PathBuf>,
  },
  /// Get the value of a camera property
  Get {
    /// Property name
    #[arg(long, long_help = property_help())]
    prop: String,
  },
  /// Set the value of a camera property
  Set {
    /// Property name
    #[arg(long, long_help = property_help())]
    prop: String,
    /// New value
    #[arg(long, allow_hyphen_values = true)]
    value: String,
  },
  /// Load the sample application of the camera SDK
  #[command(alias = "remote-app")]
  Sdk {
    /// Arguments passed to the application
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
  },
}

fn property_help() -> String {
  format!("Property name, one of: {}", registry::names().collect::<Vec<_>>().join(", "))
}

impl CliCommand {
  /// The orchestrator command, `None` for `sdk`
  pub fn to_command(&self) -> Option<Command> {
    match self {
      CliCommand::Capture { dir } => Some(Command::Capture { dir: dir.clone() }),
      CliCommand::Get { prop } => Some(Command::Get { property: prop.clone() }),
      CliCommand::Set { prop, value } => {
        Some(Command::Set { property: prop.clone(), value: value.clone() })
      }
      CliCommand::Sdk { .. } => None,
    }
  }
}

impl Args {
  /// Apply command-line overrides to the settings
  pub fn apply(&self, settings: &mut Settings) {
    if let Some(index) = self.camera {
      settings.selection = Selection::Index(index);
    }
    settings.verbose = self.verbose;
  }
}
