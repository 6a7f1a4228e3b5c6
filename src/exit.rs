//! Single authority deciding how the invocation ends
//!
//! The decision can come from the caller's thread (errors, timeout) or from
//! the SDK delivery thread (download finished). Both go through
//! [`ExitPolicy`], which honors the first one and ignores the rest.

use crate::{runtime::SdkHandle, Error};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::{
  process::ExitCode,
  sync::{
    atomic::{AtomicBool, Ordering},
    OnceLock,
  },
  time::Duration,
};
use tracing::{debug, info};

/// Final outcome of an invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
  /// Everything went fine
  Success,
  /// The invocation failed
  Failure(Error),
}

impl Verdict {
  /// Process exit code for this verdict
  pub fn exit_code(&self) -> ExitCode {
    match self {
      Verdict::Success => ExitCode::SUCCESS,
      Verdict::Failure(_) => ExitCode::FAILURE,
    }
  }
}

/// Releases the SDK and records the verdict, exactly once
pub struct ExitPolicy {
  handle: SdkHandle,
  decided: AtomicBool,
  tx: Sender<Verdict>,
  rx: Receiver<Verdict>,
  received: OnceLock<Verdict>,
}

impl ExitPolicy {
  /// Create a policy guarding the given runtime
  pub fn new(handle: SdkHandle) -> Self {
    let (tx, rx) = bounded(1);

    Self { handle, decided: AtomicBool::new(false), tx, rx, received: OnceLock::new() }
  }

  /// The guarded runtime
  pub fn handle(&self) -> &SdkHandle {
    &self.handle
  }

  /// Decide a successful exit.
  ///
  /// Returns `false` if the exit was already decided.
  pub fn exit_success(&self) -> bool {
    self.decide(Verdict::Success)
  }

  /// Decide a failed exit.
  ///
  /// Returns `false` if the exit was already decided.
  pub fn exit_failure(&self, error: Error) -> bool {
    self.decide(Verdict::Failure(error))
  }

  /// Whether an exit was decided
  pub fn is_decided(&self) -> bool {
    self.decided.load(Ordering::Acquire)
  }

  fn decide(&self, verdict: Verdict) -> bool {
    if self.decided.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
      debug!("exit already decided, ignoring {:?}", verdict);
      return false;
    }

    self.handle.release();
    info!("exit decided: {:?}", verdict);

    // The channel holds one verdict and only the winner sends.
    let _ = self.tx.try_send(verdict);
    true
  }

  /// Block until an exit is decided or the timeout elapses.
  ///
  /// Returns once the winner finished releasing the runtime.
  pub fn wait(&self, timeout: Duration) -> Option<Verdict> {
    if let Some(verdict) = self.received.get() {
      return Some(verdict.clone());
    }

    let verdict = self.rx.recv_timeout(timeout).ok()?;
    Some(self.received.get_or_init(|| verdict).clone())
  }

  /// The decided verdict, blocking until somebody decides
  pub fn verdict(&self) -> Verdict {
    if let Some(verdict) = self.received.get() {
      return verdict.clone();
    }

    let verdict = self
      .rx
      .recv()
      .unwrap_or_else(|_| Verdict::Failure(Error::from("exit decision channel closed")));
    self.received.get_or_init(|| verdict).clone()
  }
}
