//! Runs the SPSC and the MPMC demos and exits with a non-zero code if either
//! of them loses, duplicates or reorders a value.
//!
//! The log level is read from `RUST_LOG` (`info` by default) and the demo
//! parameters from the `HPC_RING_*` environment variables, see
//! [`DemoConfig::from_env`].
use hpc_ring::demo::{run_mpmc_demo, run_spsc_demo, DemoConfig};
use hpc_ring::error::DemoError;
use std::process::ExitCode;
use tracing::{error, info};

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .init();
}

fn run() -> Result<(), DemoError> {
    let config = DemoConfig::from_env()?;

    info!(?config, "loaded demo config");

    run_spsc_demo(&config)?.verify()?;
    run_mpmc_demo(&config)?.verify()?;

    Ok(())
}

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(()) => {
            info!("all demos passed");

            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "demo failed");

            ExitCode::FAILURE
        }
    }
}
