mod commands;
mod output;

use clap::{Parser, Subcommand};
use dr_core::artifacts::DEFAULT_BUILD_INFO_PATH;
use dr_core::config::{load_config, DEFAULT_PIPELINE};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "devrun")]
#[command(author, version, about = "Run, build and check a local full-stack dev environment")]
struct Cli {
    /// Project root containing the `.devrun/` directory
    #[arg(short = 'C', long, global = true, default_value = ".")]
    root: PathBuf,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start every service and supervise it until Ctrl+C or a crash
    Run {
        /// Only start the named service (repeatable)
        #[arg(long = "only", value_name = "NAME")]
        only: Vec<String>,

        /// Seconds to wait for a graceful stop before killing
        #[arg(long, value_name = "SECS")]
        shutdown_timeout: Option<u64>,
    },
    /// Run a build pipeline
    Build {
        /// Pipeline to run
        #[arg(long, default_value = DEFAULT_PIPELINE)]
        pipeline: String,

        /// Only run the named step (repeatable)
        #[arg(long = "step", value_name = "NAME")]
        steps: Vec<String>,

        /// Skip the toolchain check
        #[arg(long)]
        skip_preflight: bool,
    },
    /// Report whether services are reachable and the workspace is built
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check tools, install dependencies and create `.env`
    Setup,
    /// Create a `.devrun/` directory with default configuration
    Init {
        /// Overwrite an existing `.devrun/` directory
        #[arg(long)]
        force: bool,

        /// Skip the pipeline definitions
        #[arg(long)]
        minimal: bool,
    },
    /// Remove build output and caches
    Clean,
    /// Write build information into the build output directory
    BuildInfo {
        /// Output file, relative to the project root
        #[arg(long, default_value = DEFAULT_BUILD_INFO_PATH)]
        output: PathBuf,

        /// Version recorded in the file
        #[arg(long, default_value = "1.0.0")]
        app_version: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "devrun=debug,dr_core=debug"
    } else {
        "devrun=info,dr_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let root = cli.root;
    let code = match cli.command {
        Commands::Init { force, minimal } => commands::init(&root, force, minimal).await?,
        Commands::Clean => commands::clean(&root)?,
        Commands::BuildInfo {
            output,
            app_version,
        } => commands::build_info(&root, &output, &app_version).await?,
        Commands::Run {
            only,
            shutdown_timeout,
        } => {
            let config = load_config(&root).await?;
            commands::run(&config, &only, shutdown_timeout).await?
        }
        Commands::Build {
            pipeline,
            steps,
            skip_preflight,
        } => {
            let config = load_config(&root).await?;
            commands::build(&config, &pipeline, &steps, skip_preflight).await?
        }
        Commands::Setup => {
            let config = load_config(&root).await?;
            commands::setup(&config).await?
        }
        Commands::Status { json } => {
            let config = load_config(&root).await?;
            commands::status(&config, json).await?
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
