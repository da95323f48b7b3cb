//! Lightbridge CLI - worker session host and CORS-rewriting proxy.
//!
//! This is the binary entry point. See the `lightbridge` library for the
//! core functionality.

use std::io::{BufRead, Write};

use anyhow::Result;
use clap::{Parser, Subcommand};
use lightbridge::{proxy, Config, RpcEngineFactory, Session};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// CLI
#[derive(Parser)]
#[command(name = "lightbridge")]
#[command(version)]
#[command(about = "Worker messaging layer and CORS-rewriting proxy for a browser-hosted light client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a worker session over stdin/stdout, one raw message per line.
    Worker,
    /// Run the CORS-rewriting forwarding proxy.
    Proxy {
        /// Listen port (overrides the config file and PORT).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the effective configuration.
    Config,
}

/// Drive one worker session over stdio.
///
/// Stdout carries the worker protocol, nothing else; logs go to stderr.
/// The main thread is the session's single execution context: one line in,
/// zero or one line out, and any bridge call blocks the loop for its
/// duration, which is the intended ordering guarantee.
fn run_worker() -> Result<()> {
    let config = Config::load()?;
    let mut session = Session::new(RpcEngineFactory::new(config.bridge_timeout()));

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }
        if let Some(outbound) = session.handle_inbound(raw) {
            writeln!(stdout, "{outbound}")?;
            stdout.flush()?;
        }
    }

    log::info!("stdin closed, worker session ending");
    Ok(())
}

/// Run the forwarding proxy until ctrl-c.
fn run_proxy(port: Option<u16>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = port {
        config.proxy_port = port;
    }
    tokio::runtime::Runtime::new()?.block_on(proxy::run(&config))
}

fn main() -> Result<()> {
    // Logs go to stderr: stdout is the worker protocol channel.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Worker => run_worker(),
        Commands::Proxy { port } => run_proxy(port),
        Commands::Config => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
