//! modkit CLI entrypoint.
//!
//! This is the main entrypoint for the modkit command-line tool.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use modkit::build::Severity;
use modkit::cli::{Cli, Commands, OutputFormatter, TargetArgs};
use modkit::config::PlatformSettings;
use modkit::deployer::{platform_lookup, BuildOptions, DeployOptions, Deployer};
use modkit::error::{ExecuteError, Result};
use modkit::planner::Mode;
use modkit::platform::{PlatformClient, ResourceLookup};

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output, cli.verbose);
    match runtime.block_on(run(cli, &formatter)) {
        Ok(code) => code,
        Err(e) => {
            emit(&formatter, &formatter.format_error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<ExitCode> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current batch");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let deployer = Deployer::new(&cli.root, &cli.env).with_cancel(cancel);
    match cli.command {
        Commands::Build {
            build_dir,
            no_clean,
            verify,
            strict,
        } => {
            let options = BuildOptions {
                build_dir,
                clean: !no_clean,
            };
            cmd_build(&deployer, &options, verify, strict, formatter).await
        }
        Commands::Deploy { target, drop } => {
            cmd_apply(&deployer, Mode::Deploy, &deploy_options(target, drop), formatter).await
        }
        Commands::Clean { target } => {
            cmd_apply(&deployer, Mode::Clean, &deploy_options(target, false), formatter).await
        }
    }
}

fn deploy_options(target: TargetArgs, drop: bool) -> DeployOptions {
    DeployOptions {
        build_dir: target.build_dir,
        dry_run: target.dry_run,
        drop,
        drop_data: target.drop_data,
        include: target.include,
    }
}

/// Creates the platform client for the configured project.
fn connect(deployer: &Deployer) -> Result<PlatformClient> {
    let config = deployer.load_environment()?;
    let settings = PlatformSettings::from_env(&config.environment.project);
    debug!("Connecting to {} for project {}", settings.base_url, settings.project);
    PlatformClient::new(&settings)
}

/// Build the modules.
async fn cmd_build(
    deployer: &Deployer,
    options: &BuildOptions,
    verify: bool,
    strict: bool,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    info!("Building {}", deployer.root().display());

    let client = if verify { Some(connect(deployer)?) } else { None };
    let lookup = client.as_ref().map(platform_lookup);
    let outcome = deployer
        .build(options, lookup.as_ref().map(|l| l as &dyn ResourceLookup))
        .await?;

    emit(formatter, &formatter.format_build(&outcome));

    let errors = outcome.issues.iter().any(|i| i.severity == Severity::Error);
    let warnings = outcome.issues.iter().any(|i| i.severity == Severity::Warning);
    if errors || (strict && warnings) {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Deploy or clean the build output.
async fn cmd_apply(
    deployer: &Deployer,
    mode: Mode,
    options: &DeployOptions,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let client = connect(deployer)?;
    let outcome = match mode {
        Mode::Deploy => deployer.deploy(&client, options).await?,
        Mode::Clean => deployer.clean(&client, options).await?,
    };

    emit(formatter, &formatter.format_deploy(&outcome));

    if outcome.report.as_ref().is_some_and(|r| r.cancelled) {
        return Err(ExecuteError::Cancelled {
            reason: String::from("interrupted by the user"),
        }
        .into());
    }
    if outcome.failed() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Writes command output: JSON to stdout, text to stderr.
fn emit(formatter: &OutputFormatter, output: &str) {
    if output.is_empty() {
        return;
    }
    if formatter.is_json() {
        let _ = writeln!(std::io::stdout().lock(), "{output}");
    } else {
        eprint!("{output}");
    }
}
