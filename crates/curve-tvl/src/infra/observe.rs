//! Events that are meaningful to a snapshot run. Each function logs the event
//! and updates the metrics if the event is worth measuring.

use {
    crate::domain::{Address, Chain, Ledger, registry},
    std::time::Duration,
    url::Url,
};

#[derive(Debug, Clone, prometheus_metric_storage::MetricStorage)]
#[metric(subsystem = "snapshot")]
struct Metrics {
    /// Time spent computing one snapshot.
    #[metric(labels("chain", "kind"), buckets(0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0))]
    duration_seconds: prometheus::HistogramVec,
    /// Number of keys in the last snapshot ledger.
    #[metric(labels("chain", "kind"))]
    ledger_keys: prometheus::IntGaugeVec,
    /// Number of pools listed per registry kind.
    #[metric(labels("chain", "registry"))]
    pools: prometheus::IntGaugeVec,
    /// Snapshots that failed.
    #[metric(labels("chain", "kind"))]
    failures: prometheus::IntCounterVec,
}

fn metrics() -> &'static Metrics {
    Metrics::instance(::observe::metrics::get_storage_registry())
        .expect("unexpected error getting metrics instance")
}

pub fn snapshot_started(chain: &Chain, kind: &str, block: Option<u64>, timestamp: u64) {
    tracing::info!(%chain, kind, ?block, timestamp, "computing snapshot");
}

pub fn snapshot_finished(chain: &Chain, kind: &str, ledger: &Ledger, elapsed: Duration) {
    tracing::info!(%chain, kind, keys = ledger.len(), ?elapsed, "computed snapshot");
    let metrics = metrics();
    metrics
        .duration_seconds
        .with_label_values(&[chain.as_str(), kind])
        .observe(elapsed.as_secs_f64());
    metrics
        .ledger_keys
        .with_label_values(&[chain.as_str(), kind])
        .set(i64::try_from(ledger.len()).unwrap_or(i64::MAX));
}

pub fn snapshot_failed(chain: &Chain, kind: &str, err: &anyhow::Error) {
    tracing::warn!(%chain, kind, ?err, "failed to compute snapshot");
    metrics()
        .failures
        .with_label_values(&[chain.as_str(), kind])
        .inc();
}

pub fn cutover_reached(chain: &Chain, timestamp: u64, cutover: u64, reason: &str) {
    tracing::debug!(%chain, timestamp, cutover, reason, "chain is past its cutover");
}

pub fn resolved_registries(chain: &Chain, mapping: &registry::Mapping) {
    tracing::debug!(%chain, ?mapping, "resolved registries");
}

pub fn reused_registries(chain: &Chain) {
    tracing::trace!(%chain, "reusing cached registries");
}

pub fn dropped_registry(chain: &Chain, code: u64) {
    tracing::debug!(%chain, code, "registry not deployed");
}

pub fn listed_pools(chain: &Chain, kind: registry::Kind, count: usize) {
    tracing::debug!(%chain, %kind, count, "listed pools");
    metrics()
        .pools
        .with_label_values(&[chain.as_str(), &kind.to_string()])
        .set(i64::try_from(count).unwrap_or(i64::MAX));
}

pub fn dropped_pool(chain: &Chain, kind: registry::Kind, index: u64) {
    tracing::debug!(%chain, %kind, index, "dropped pool without address");
}

pub fn duplicate_pool(chain: &Chain, kind: registry::Kind, pool: Address, listed_by: registry::Kind) {
    tracing::debug!(%chain, %kind, ?pool, %listed_by, "skipped pool listed by another registry");
}

pub fn unwrapped(chain: &Chain, pass: &str, tokens: usize) {
    if tokens > 0 {
        tracing::debug!(%chain, pass, tokens, "unwrapped tokens");
    }
}

pub fn http_request(endpoint: &Url) {
    tracing::trace!(%endpoint, "sending request");
}

pub fn http_response(endpoint: &Url, res: Result<&String, &reqwest::Error>) {
    match res {
        Ok(res) => tracing::trace!(%endpoint, ?res, "received response"),
        Err(err) => tracing::warn!(%endpoint, ?err, "failed to receive response"),
    }
}

/// Logs all collected metrics. The binary is short-lived, so they are never
/// scraped.
pub fn metrics_summary() {
    tracing::debug!(
        metrics = ::observe::metrics::encode(::observe::metrics::get_registry()),
        "collected metrics"
    );
}
