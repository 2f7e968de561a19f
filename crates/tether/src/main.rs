//! Tether
//!
//! Command line host for the embedded JavaScript runtime.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tether::{Args, run};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tether=warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    // Not locked: scripts print to stdout from the agent thread
    let code = run(&args, &mut io::stdout(), &mut io::stderr());
    ExitCode::from(code)
}
