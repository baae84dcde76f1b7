//! Diagnostic log setup.
//!
//! Library crates log through the `log` facade; the subscriber's `log`
//! bridge turns those records into tracing events. Without `--log`, only
//! warnings reach stderr and change events stay off (the console printer
//! already shows them). With `--log`, everything from `debug` up is appended
//! to the file. `RUST_LOG` replaces either default.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

const CONSOLE_FILTER: &str = "warn,groupsync::changes=off";
const FILE_FILTER: &str = "debug";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(log_file: Option<&Path>) -> Result<(), String> {
    let result = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("cannot open log file {}: {e}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter(FILE_FILTER))
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter(CONSOLE_FILTER))
            .with_writer(std::io::stderr)
            .try_init(),
    };
    if let Err(e) = result {
        log::debug!("log subscriber already installed: {e}");
    }
    Ok(())
}
