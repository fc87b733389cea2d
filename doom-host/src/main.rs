use std::process::ExitCode;

use doom_host::{HostConfig, StopHandle};
use tracing::{info, warn};

fn main() -> ExitCode {
    let config = HostConfig::default();

    tracing_subscriber::fmt()
        .with_env_filter(config.log_filter.as_str())
        .with_writer(std::io::stderr)
        .init();

    let stop = StopHandle::default();
    if let Err(err) = doom_host::signal::forward_termination(stop.clone()) {
        warn!(%err, "cannot listen for termination signals");
    }

    match doom_host::driver::run(&config, stop) {
        Ok(summary) => {
            info!(?summary, "guest finished");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
