//! Designlink CLI
//!
//! Command-line front end for the designlink extraction pipeline.
//! Progress goes to stderr and the final report to stdout, so the output
//! can be piped straight into other tools.

use clap::{Parser, Subcommand};
use designlink_core::config::defaults;
use designlink_core::{ClientConfig, RetryPolicy, TimeoutStrategy};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;
mod render;

/// Designlink - resilient design extraction over an SSE JSON-RPC service
#[derive(Parser, Debug)]
#[command(name = "designlink")]
#[command(version, about, long_about = None)]
struct Args {
    /// Base URL of the design service
    #[arg(long, env = "DESIGNLINK_SERVER_URL", default_value = defaults::DEFAULT_SERVER_URL, global = true)]
    server_url: String,

    /// Per-call timeout in milliseconds
    #[arg(long, env = "DESIGNLINK_REQUEST_TIMEOUT_MS", default_value_t = defaults::DEFAULT_REQUEST_TIMEOUT_MS, global = true)]
    request_timeout_ms: u64,

    /// Attempts per call, including the first
    #[arg(long, env = "DESIGNLINK_MAX_ATTEMPTS", default_value_t = defaults::DEFAULT_MAX_ATTEMPTS, global = true)]
    max_attempts: u32,

    /// How long successful responses stay cached, in seconds
    #[arg(long, env = "DESIGNLINK_CACHE_TTL_SECS", default_value_t = defaults::DEFAULT_CACHE_TTL_SECS, global = true)]
    cache_ttl_secs: u64,

    /// Only accept responses whose id matches the request id
    #[arg(long, env = "DESIGNLINK_STRICT_IDS", global = true)]
    strict_ids: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract variables, components and code for a design link
    Extract {
        /// Design link, e.g. https://www.figma.com/design/<file>/<name>?node-id=1-2
        url: String,

        /// Skip code generation
        #[arg(long)]
        no_code: bool,

        /// What to do when the time budget runs out
        #[arg(long, default_value = "graceful")]
        timeout_strategy: StrategyArg,

        /// Overall time budget in milliseconds (5000..=60000)
        #[arg(long, default_value_t = defaults::DEFAULT_MAX_WAIT_MS)]
        max_wait_ms: u64,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Check that the design service answers
    Ping,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum StrategyArg {
    Graceful,
    Partial,
    Fail,
}

impl From<StrategyArg> for TimeoutStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Graceful => TimeoutStrategy::Graceful,
            StrategyArg::Partial => TimeoutStrategy::Partial,
            StrategyArg::Fail => TimeoutStrategy::Fail,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        let retry = RetryPolicy {
            max_attempts: self.max_attempts,
            ..RetryPolicy::default()
        };
        ClientConfig::new(self.server_url.clone())
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
            .with_retry(retry)
            .with_cache_ttl(Duration::from_secs(self.cache_ttl_secs))
            .with_strict_id_matching(self.strict_ids)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs share stderr with progress; stdout carries only the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.client_config();

    let outcome = match args.command {
        Command::Extract {
            url,
            no_code,
            timeout_strategy,
            max_wait_ms,
            format,
        } => {
            let options = designlink_core::ExtractOptions {
                include_code: !no_code,
                timeout_strategy: timeout_strategy.into(),
                max_wait_time: max_wait_ms,
            };
            commands::run_extract(config, url, options, format).await
        }
        Command::Ping => commands::run_ping(config).await,
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
