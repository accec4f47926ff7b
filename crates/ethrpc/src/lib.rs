//! Construction of node providers shared by all chain readers.

mod batching;
pub mod errors;
mod instrumentation;

use {
    alloy::{
        providers::{DynProvider, Provider, ProviderBuilder},
        rpc::client::ClientBuilder,
    },
    batching::BatchingLayer,
    instrumentation::InstrumentationLayer,
    std::{num::NonZeroUsize, time::Duration},
    url::Url,
};

pub type AlloyProvider = DynProvider;

#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of requests a single fan-out keeps in flight against
    /// one node.
    pub max_concurrent_requests: NonZeroUsize,
    /// Maximum number of calls sent to the node in one JSON-RPC batch.
    pub max_batch_size: usize,
    /// How long to wait for more calls before sending an incomplete batch.
    pub batch_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_requests: NonZeroUsize::new(10).unwrap(),
            max_batch_size: 20,
            batch_delay: Duration::from_millis(5),
        }
    }
}

/// Creates a provider talking to the node at `url`. Every request sent
/// through it is logged and measured under `label`, which is usually the
/// name of the chain the node serves. Concurrent calls are sent to the node
/// as JSON-RPC batches.
pub fn provider(url: &Url, label: &str, config: &Config) -> AlloyProvider {
    let rpc = ClientBuilder::default()
        .layer(InstrumentationLayer::new(label))
        .layer(BatchingLayer::new(config))
        .http(url.clone());
    ProviderBuilder::new().connect_client(rpc).erased()
}
