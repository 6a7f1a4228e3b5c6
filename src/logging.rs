//! Log output

use tracing_subscriber::{prelude::*, EnvFilter};

/// Install the log subscriber.
///
/// Logs go to stderr and are filtered with `RUST_LOG`, warnings only by default.
pub fn setup() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

  let _ = tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .with(filter)
    .try_init();
}
