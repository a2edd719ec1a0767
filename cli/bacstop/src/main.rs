//! BACstop CLI: breathalyzer-gated git hooks.

mod commands;

use std::future::Future;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bacstop_policy::{parse_threshold, HookKind, Spice};
use bacstop_protocol::Bac;

use commands::device::DeviceOptions;

#[derive(Parser)]
#[command(name = "bacstop", version, about = "Breathalyzer-gated git hooks")]
struct Cli {
    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct DeviceArgs {
    /// Bluetooth address of the device (default: first device named BACtrack)
    #[arg(long)]
    address: Option<String>,
    /// Seconds of device silence before the test times out
    #[arg(long, default_value_t = 30)]
    timeout: u64,
    /// Replay a scripted test ending at this BAC instead of using Bluetooth
    #[arg(long, value_name = "BAC", value_parser = parse_threshold)]
    simulate: Option<Bac>,
}

impl DeviceArgs {
    fn options(self) -> DeviceOptions {
        DeviceOptions {
            address: self.address,
            inactivity: Duration::from_secs(self.timeout),
            simulate: self.simulate,
            pace: commands::device::SIMULATED_PACE,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Take a breath test and print the result
    Test {
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Gate a git operation on a breath test (run by the installed hook)
    Check {
        /// Path to the git repository
        #[arg(long, short, default_value = ".")]
        repo: PathBuf,
        /// BAC threshold in percent, overriding .bacstop
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<Bac>,
        /// Hook being run, overriding .bacstop
        #[arg(long)]
        hook: Option<HookKind>,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Install the BACstop hook into a repository
    Install {
        /// Path to the git repository
        #[arg(long, short, default_value = ".")]
        repo: PathBuf,
        /// BAC threshold in percent
        #[arg(long, default_value = "0.00", value_parser = parse_threshold)]
        threshold: Bac,
        /// Spice level: verde, hot, diablo
        #[arg(long, short, default_value = "hot")]
        spice: Spice,
        /// Hook type: pre-commit or pre-push
        #[arg(long, default_value = "pre-push")]
        hook: HookKind,
    },
    /// Remove BACstop hooks and config from a repository
    Uninstall {
        /// Path to the git repository
        #[arg(long, short, default_value = ".")]
        repo: PathBuf,
    },
    /// Show build features and device information
    Info {
        #[command(flatten)]
        device: DeviceArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(commands::EXIT_ERROR);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Test { device } => block_on(commands::test::run(&device.options())),

        Commands::Check {
            repo,
            threshold,
            hook,
            quiet,
            json,
            device,
        } => block_on(commands::check::run(
            &repo,
            threshold,
            hook,
            quiet,
            json,
            &device.options(),
        )),

        Commands::Install {
            repo,
            threshold,
            spice,
            hook,
        } => {
            let config = bacstop_policy::PolicyConfig {
                threshold,
                spice,
                hook,
            };
            commands::install::run(&repo, &config)?;
            Ok(commands::EXIT_OK)
        }

        Commands::Uninstall { repo } => {
            commands::uninstall::run(&repo)?;
            Ok(commands::EXIT_OK)
        }

        Commands::Info { device } => block_on(commands::info::run(&device.options())),
    }
}

fn block_on<T>(future: impl Future<Output = anyhow::Result<T>>) -> anyhow::Result<T> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(future)
}
