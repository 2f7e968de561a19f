//! Tether command line
//!
//! Evaluates expressions and scripts on the main environment of a fresh
//! runtime. The process exits with status 1 when a script throws.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context as _, anyhow};
use clap::Parser;

use tether_conv::Displayed;
use tether_runtime::{EngineError, Environment, EnvironmentError, Runtime, RuntimeConfig};

/// Tether JavaScript host
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Run JavaScript on an embedded QuickJS runtime", long_about = None)]
pub struct Args {
    /// Script to run as the main module
    pub file: Option<PathBuf>,

    /// Evaluate an expression and print its result (repeatable)
    #[arg(short, long = "eval", value_name = "EXPR")]
    pub eval: Vec<String>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Run the command and return the process exit status.
pub fn run(args: &Args, out: &mut dyn Write, err: &mut dyn Write) -> u8 {
    match execute(args, out) {
        Ok(()) => 0,
        Err(failure) => {
            report(err, &failure);
            1
        }
    }
}

fn execute(args: &Args, out: &mut dyn Write) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => {
            RuntimeConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => RuntimeConfig::from_env()?,
    };

    let runtime = Runtime::create(config)?;
    let env = runtime.main_environment();

    for expression in &args.eval {
        let source = expression.clone();
        let task = move |env: &Environment| env.evaluate_script::<Displayed>(&source, "<eval>");
        let shown = env.run_now_blocking(task)??;
        writeln!(out, "{}", shown)?;
    }

    if let Some(file) = &args.file {
        let path = std::path::absolute(file)?;
        tracing::debug!("Running {}", path.display());
        runtime
            .execution_platform()
            .wait(env.import::<()>(&path.to_string_lossy()))
            .ok_or_else(|| anyhow!("execution platform shut down"))??;
    }

    out.flush()?;
    Ok(())
}

fn report(err: &mut dyn Write, failure: &anyhow::Error) {
    let written = match failure.downcast_ref::<EnvironmentError>() {
        Some(EnvironmentError::Engine(EngineError::Script { message, stack, .. })) => {
            match stack.as_deref().map(str::trim_end).filter(|s| !s.is_empty()) {
                Some(stack) => writeln!(err, "JS Exception: {}\n{}", message, stack),
                None => writeln!(err, "JS Exception: {}", message),
            }
        }
        _ => writeln!(err, "Error: {:#}", failure),
    };
    if written.is_err() {
        tracing::error!("Failed to report error: {:#}", failure);
    }
}
