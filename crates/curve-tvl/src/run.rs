use {
    crate::{
        cli,
        config::{self, Config},
        domain::{Chain, Ledger},
        infra::{
            BatchReading,
            NodeReader,
            observe,
            prices::{ExchangeRateHost, StakeDaoLockers},
        },
        pipeline::{Adapter, Request},
    },
    anyhow::{Context, Result},
    clap::Parser,
    futures::future::join_all,
    serde::Serialize,
    std::{collections::BTreeMap, sync::Arc},
};

pub async fn start(args: impl Iterator<Item = String>) {
    let args = cli::Args::parse_from(args);
    let mut log = ::observe::Config::new(&args.log, args.stderr_threshold, args.use_json_logs);
    if args.stderr_threshold.is_none() {
        log = log.with_stderr_only();
    }
    ::observe::tracing::initialize(&log);
    ::observe::metrics::setup_registry(Some("curve_tvl".to_owned()), None);
    tracing::info!("running curve-tvl with {args:#?}");

    let config = config::load(&args.config).await;
    let result = run(&args, config).await;
    observe::metrics_summary();
    match result {
        Ok(report) => {
            println!("{}", report.output);
            if !report.failed.is_empty() {
                tracing::error!(chains = ?report.failed, "some snapshots failed");
                std::process::exit(1);
            }
        }
        Err(err) => {
            tracing::error!(?err, "snapshot failed");
            std::process::exit(1);
        }
    }
}

/// Rendered output of a run and the chains that could not be snapshotted.
struct Report {
    output: String,
    failed: Vec<Chain>,
}

/// What a snapshot of one chain produced.
#[derive(Serialize)]
struct Snapshot {
    tvl: Ledger,
    #[serde(skip_serializing_if = "Option::is_none")]
    staking: Option<Ledger>,
}

/// Takes the snapshots the arguments ask for and renders them as JSON.
async fn run(args: &cli::Args, mut config: Config) -> Result<Report> {
    if args.hallmarks {
        let output = serde_json::to_string_pretty(crate::domain::hallmarks::hallmarks())
            .context("serializing hallmarks")?;
        return Ok(Report {
            output,
            failed: Vec::new(),
        });
    }
    if let Some(timeout) = args.http_timeout {
        config.services.http_timeout = timeout;
    }

    let adapter = adapter(args, config)?;
    let chains: Vec<Chain> = if args.chains.is_empty() {
        adapter.chains().cloned().collect()
    } else {
        args.chains.clone()
    };
    let request = Request {
        timestamp: match args.timestamp {
            Some(timestamp) => timestamp,
            None => u64::try_from(time::OffsetDateTime::now_utc().unix_timestamp())
                .context("system clock is before the unix epoch")?,
        },
        blocks: args
            .blocks
            .iter()
            .map(|pair| (pair.chain.clone(), pair.block))
            .collect(),
    };

    let (snapshots, failed) = snapshot(&adapter, &chains, &request).await;
    Ok(Report {
        output: serde_json::to_string_pretty(&snapshots).context("serializing snapshots")?,
        failed,
    })
}

/// Snapshots every chain independently. A chain that fails is reported and
/// left out without affecting the others.
async fn snapshot(
    adapter: &Adapter,
    chains: &[Chain],
    request: &Request,
) -> (BTreeMap<Chain, Snapshot>, Vec<Chain>) {
    let results = join_all(chains.iter().map(|chain| async move {
        (chain.clone(), adapter.tvl(chain, request).await)
    }))
    .await;

    let mut snapshots = BTreeMap::new();
    let mut failed = Vec::new();
    for (chain, result) in results {
        match result {
            Ok(tvl) => {
                snapshots.insert(chain, Snapshot { tvl, staking: None });
            }
            Err(err) => {
                let block = request.blocks.get(&chain);
                tracing::error!(%chain, ?block, ?err, "chain snapshot failed");
                failed.push(chain);
            }
        }
    }

    let staking = adapter
        .staking_chain()
        .filter(|chain| snapshots.contains_key(*chain))
        .cloned();
    if let Some(chain) = staking {
        match adapter.staking(request).await {
            Ok(ledger) => {
                if let Some(snapshot) = snapshots.get_mut(&chain) {
                    snapshot.staking = ledger;
                }
            }
            Err(err) => {
                tracing::error!(%chain, ?err, "staking snapshot failed");
                failed.push(chain);
            }
        }
    }
    (snapshots, failed)
}

fn adapter(args: &cli::Args, config: Config) -> Result<Adapter> {
    let ethrpc = ethrpc::Config {
        max_concurrent_requests: args.max_concurrent_requests,
        max_batch_size: args.max_batch_size,
        batch_delay: args.batch_delay,
    };
    let readers = config
        .chains
        .iter()
        .map(|(chain, table)| {
            let provider = ethrpc::provider(&table.node_url, chain.as_str(), &ethrpc);
            let reader: Arc<dyn BatchReading> = Arc::new(NodeReader::new(provider, &ethrpc));
            (chain.clone(), reader)
        })
        .collect();

    let client = reqwest::Client::builder()
        .timeout(config.services.http_timeout)
        .build()
        .context("building HTTP client")?;
    let lockers = Arc::new(StakeDaoLockers::new(
        client.clone(),
        config.services.locker_prices_url.clone(),
    ));
    let rates = Arc::new(ExchangeRateHost::new(
        client,
        config.services.exchange_rates_url.clone(),
    ));

    Adapter::new(config, readers, lockers, rates)
}
