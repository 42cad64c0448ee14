use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use calcflow::agent::Agent;
use calcflow::config::Config;
use calcflow::core::OperationGraph;
use calcflow::orchestration::{ExpressionStore, LeaseSweeper};
use calcflow::{api, clog, clog_error, parser, Result};

/// calcflow - distributed arithmetic expression evaluator
#[derive(Parser, Debug)]
#[command(name = "calcflow")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    CALCFLOW_DEBUG=1     Enable debug logging (alternative to --debug)\n    PORT, LEASE_MS, SWEEP_INTERVAL_MS, TIME_ADDITION_MS, TIME_SUBTRACTION_MS,\n    TIME_MULTIPLICATIONS_MS, TIME_DIVISIONS_MS, COMPUTING_POWER, ORCHESTRATOR_URL"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.calcflow/calcflow.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the orchestrator HTTP service
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Lease duration for dispatched tasks, in milliseconds
        #[arg(long)]
        lease_ms: Option<u64>,
    },

    /// Run compute workers against an orchestrator
    Agent {
        /// Orchestrator base URL
        #[arg(long)]
        url: Option<String>,

        /// Number of concurrent worker loops
        #[arg(long, short = 'w')]
        workers: Option<usize>,
    },

    /// Parse an expression and print its operation graph
    Parse {
        /// The arithmetic expression
        expression: String,
    },

    /// Print the effective configuration
    Config {
        /// Also write it to ~/.calcflow/calcflow.toml
        #[arg(long)]
        write: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let long_running = matches!(cli.command, Command::Serve { .. } | Command::Agent { .. });
    calcflow::log::init_with_debug(cli.debug, long_running);

    match cli.command {
        Command::Serve { port, lease_ms } => run_serve(port, lease_ms),
        Command::Agent { url, workers } => run_agent(url, workers),
        Command::Parse { expression } => run_parse(&expression),
        Command::Config { write } => run_config(write),
    }
}

fn run_serve(port: Option<u16>, lease_ms: Option<u64>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(lease_ms) = lease_ms {
        config.lease_ms = lease_ms;
    }
    config.validate()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let store = ExpressionStore::new(config.lease_duration(), config.timings());
        let sweeper = LeaseSweeper::new(store.clone())
            .with_interval(config.sweep_interval())
            .spawn();

        let cancel = CancellationToken::new();
        spawn_ctrl_c(cancel.clone());

        clog!(
            "Lease {:?}, sweep every {:?}",
            config.lease_duration(),
            config.sweep_interval()
        );
        let result = api::serve(config.bind_addr(), store, cancel).await;
        sweeper.shutdown();
        result
    })
}

fn run_agent(url: Option<String>, workers: Option<usize>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(url) = url {
        config.orchestrator_url = url.trim_end_matches('/').to_string();
    }
    if let Some(workers) = workers {
        config.computing_power = workers;
    }
    config.validate()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let cancel = CancellationToken::new();
        spawn_ctrl_c(cancel.clone());
        Agent::from_config(&config).run(cancel).await;
    });
    Ok(())
}

fn run_parse(expression: &str) -> Result<()> {
    match parser::parse(expression) {
        Ok(ast) => {
            println!("{}", OperationGraph::from_expr(&ast));
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {}", e);
            if let Some(position) = e.position() {
                eprintln!("  {}", expression);
                eprintln!("  {}", caret_line(expression, position));
            }
            std::process::exit(1);
        }
    }
}

/// A caret under the character at byte offset `position`.
fn caret_line(expression: &str, position: usize) -> String {
    let column = expression
        .get(..position)
        .map(|prefix| prefix.chars().count())
        .unwrap_or(position);
    format!("{}^", " ".repeat(column))
}

fn run_config(write: bool) -> Result<()> {
    let config = Config::load()?;
    print!("{}", toml::to_string_pretty(&config)?);
    if write {
        config.save()?;
        println!("# written to {}", Config::config_path()?.display());
    }
    Ok(())
}

/// Cancel `token` on Ctrl-C.
fn spawn_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => clog!("Ctrl-C received, shutting down"),
            Err(e) => clog_error!("Failed to listen for Ctrl-C: {}", e),
        }
        token.cancel();
    });
}
