//! Command-line controller for a tethered camera
//!
//! One invocation runs one [`Command`]: capture an image, read a property or
//! write a property. The [`Orchestrator`] opens a [`Session`] on the selected
//! camera and every path ends in a single [`Verdict`] decided through the
//! [`ExitPolicy`], which also releases the SDK runtime exactly once.

#![deny(unused_must_use)]
#![deny(missing_docs)] // Force documentation on all public API's

pub mod cli;
pub mod config;
pub mod error;
pub mod exit;
pub mod logging;
pub mod orchestrator;
pub mod registry;
pub mod remote_app;
pub mod runtime;
pub mod select;
pub mod session;

#[doc(inline)]
pub use crate::{
  config::{Config, Settings},
  error::{Error, ErrorKind, Result},
  exit::{ExitPolicy, Verdict},
  orchestrator::{Command, Orchestrator},
  session::{Session, SessionConfig, SessionState},
};

/// The SDK boundary and the virtual camera.
pub use remote_sdk;
