use {
    crate::domain::Chain,
    anyhow::{Context, Result},
    std::{num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration},
};

#[derive(Debug, clap::Parser)]
pub struct Args {
    /// Path to the configuration file. This file should be in TOML format. For
    /// an example see `crates/curve-tvl/example.toml`.
    #[clap(long, env)]
    pub config: PathBuf,

    /// The log filter.
    #[clap(long, env, default_value = "warn,curve_tvl=info,ethrpc=info")]
    pub log: String,

    /// At which log level logs should be printed to stderr instead of stdout.
    /// Logs are only written to stdout if this is set.
    #[clap(long, env)]
    pub stderr_threshold: Option<tracing::Level>,

    /// Whether to use JSON format for the logs.
    #[clap(long, env, default_value = "false")]
    pub use_json_logs: bool,

    /// Chains to snapshot. Defaults to every configured chain.
    #[clap(long = "chain", env = "CHAINS", value_delimiter = ',')]
    pub chains: Vec<Chain>,

    /// Unix timestamp of the snapshot. Defaults to now.
    #[clap(long, env)]
    pub timestamp: Option<u64>,

    /// Block height per chain, e.g. `--block ethereum=15000000`.
    #[clap(long = "block", env = "BLOCKS", value_delimiter = ',')]
    pub blocks: Vec<ChainBlock>,

    /// The maximum number of concurrent requests to each node.
    #[clap(long, env, default_value = "10")]
    pub max_concurrent_requests: NonZeroUsize,

    /// Maximum number of calls sent to a node in one JSON-RPC batch.
    #[clap(long, env, default_value = "20")]
    pub max_batch_size: usize,

    /// How long to wait for more calls before sending an incomplete batch.
    #[clap(long, env, default_value = "5ms", value_parser = humantime::parse_duration)]
    pub batch_delay: Duration,

    /// Overrides the timeout of requests to price services.
    #[clap(long, env, value_parser = humantime::parse_duration)]
    pub http_timeout: Option<Duration>,

    /// Print the protocol's hallmarks instead of taking a snapshot.
    #[clap(long)]
    pub hallmarks: bool,
}

/// A `chain=block` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainBlock {
    pub chain: Chain,
    pub block: u64,
}

impl FromStr for ChainBlock {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (chain, block) = s
            .split_once('=')
            .context("expected a chain=block pair")?;
        Ok(Self {
            chain: Chain::new(chain),
            block: block
                .trim()
                .parse()
                .with_context(|| format!("invalid block height {block:?}"))?,
        })
    }
}
