//! tracing-subscriber setup for the `pews` binary. Logs go to stderr so that
//! decoded output on stdout stays machine-readable.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ClientError;

/// Default filter: `info`, or `debug` with `--verbose`. `RUST_LOG` wins.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

pub fn init(verbose: bool) -> Result<(), ClientError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(ClientError::logging_init)
}
