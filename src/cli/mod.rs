//! Command-line entry point: argument parsing, runtime bootstrap, and
//! the exit-code policy (0 only on full success).

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use directories::BaseDirs;

use crate::core::constants::{DEFAULT_INSTALL_DIR, REPO_URL};
use crate::core::orchestrator::{run, SetupOptions};

#[derive(Parser)]
#[command(name = "strava-mcp-setup")]
#[command(about = "Set up the Strava MCP server for Claude Desktop")]
#[command(
    long_about = "Guided installer for the Strava MCP server. It clones the \
companion repository, provisions a Python environment, walks you through \
authorizing a Strava API application in your browser, stores the resulting \
tokens locally, and wires the server into Claude Desktop's configuration.\n\n\
Re-running is always safe: completed steps are detected and skipped or \
refreshed, and configuration files are only ever replaced whole."
)]
pub struct Args {
    /// Install directory for the companion server
    #[arg(long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Skip cloning and environment setup when already installed
    #[arg(long)]
    pub skip_install: bool,

    /// Do not offer the initial data sync
    #[arg(long)]
    pub skip_sync: bool,

    /// Do not offer to restart Claude Desktop
    #[arg(long)]
    pub no_restart: bool,

    /// Ignore stored tokens and run the browser authorization again
    #[arg(long)]
    pub reauth: bool,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let install_dir = match args.dir {
        Some(dir) => dir,
        None => default_install_dir()?,
    };

    let options = SetupOptions {
        install_dir,
        repo_url: REPO_URL.to_string(),
        skip_install: args.skip_install,
        skip_sync: args.skip_sync,
        no_restart: args.no_restart,
        reauth: args.reauth,
    };

    if let Err(err) = run(&options).await {
        eprintln!("\n❌ Setup failed during {}: {err}", err.step());
        std::process::exit(1);
    }
    Ok(())
}

fn default_install_dir() -> Result<PathBuf, Box<dyn Error>> {
    let base = BaseDirs::new().ok_or("could not determine your home directory; pass --dir")?;
    Ok(base.home_dir().join(DEFAULT_INSTALL_DIR))
}
