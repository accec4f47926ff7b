//! Transport layer that folds individual RPC requests into JSON-RPC batch
//! requests.
//!
//! Calls are not executed by the layer itself. They are queued for a
//! background task which groups whatever arrives within the configured delay
//! (up to the maximum batch size), sends the group as one batch to the inner
//! transport and routes every response back to the caller waiting for it.
use {
    crate::Config,
    alloy::{
        rpc::json_rpc::{Id, RequestPacket, Response, ResponsePacket, SerializedRequest},
        transports::{TransportError, TransportErrorKind},
    },
    futures::{
        channel::{mpsc, oneshot},
        stream::StreamExt as _,
    },
    std::{
        collections::{HashMap, VecDeque, hash_map::Entry},
        pin::Pin,
        task::{Context, Poll},
    },
    tokio_stream::StreamExt as _,
    tower::{Layer, Service},
};

pub(crate) struct BatchingLayer {
    config: Config,
}

impl BatchingLayer {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl<S> Layer<S> for BatchingLayer
where
    S: Service<RequestPacket, Response = ResponsePacket, Error = TransportError>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    type Service = BatchingTransport;

    fn layer(&self, inner: S) -> Self::Service {
        BatchingTransport::spawn(inner, &self.config)
    }
}

type Reply = oneshot::Sender<Result<Response, TransportError>>;

/// Handle to the background task batching requests.
#[derive(Debug, Clone)]
pub(crate) struct BatchingTransport {
    queue: mpsc::UnboundedSender<(Reply, SerializedRequest)>,
}

/// Callers waiting for responses with the same request id, in the order
/// their requests were queued.
#[derive(Default)]
struct Waiting(VecDeque<Reply>);

impl Waiting {
    fn push(&mut self, reply: Reply) {
        self.0.push_back(reply);
    }

    fn next(&mut self) -> Option<Reply> {
        self.0.pop_front()
    }

    fn into_replies(self) -> impl Iterator<Item = Reply> {
        self.0.into_iter()
    }
}

impl BatchingTransport {
    fn spawn<S>(inner: S, config: &Config) -> Self
    where
        S: Service<RequestPacket, Response = ResponsePacket, Error = TransportError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let (queue, requests) = mpsc::unbounded();
        tokio::task::spawn(
            requests
                .chunks_timeout(config.max_batch_size.max(1), config.batch_delay)
                .for_each_concurrent(config.max_concurrent_requests.get(), move |batch| {
                    send_batch(inner.clone(), batch)
                }),
        );
        Self { queue }
    }
}

async fn send_batch<S>(mut inner: S, batch: Vec<(Reply, SerializedRequest)>)
where
    S: Service<RequestPacket, Response = ResponsePacket, Error = TransportError>,
{
    // Ids are usually unique but nothing guarantees it, so responses are
    // handed out first come first served per id.
    let mut waiting: HashMap<Id, Waiting> = HashMap::with_capacity(batch.len());
    let mut requests = Vec::with_capacity(batch.len());
    for (reply, request) in batch {
        if reply.is_canceled() {
            continue;
        }
        match waiting.entry(request.id().clone()) {
            Entry::Occupied(mut entry) => entry.get_mut().push(reply),
            Entry::Vacant(entry) => entry.insert(Waiting::default()).push(reply),
        }
        requests.push(request);
    }
    if requests.is_empty() {
        return;
    }

    let responses = match inner.call(RequestPacket::Batch(requests)).await {
        Ok(ResponsePacket::Batch(responses)) => responses,
        Ok(ResponsePacket::Single(response)) => {
            tracing::warn!("node answered a batch with a single response");
            vec![response]
        }
        Err(err) => {
            let err = format!("batch request failed: {err:?}");
            for reply in waiting.into_values().flat_map(Waiting::into_replies) {
                let _ = reply.send(Err(TransportErrorKind::custom_str(&err)));
            }
            return;
        }
    };

    for response in responses {
        let Some(reply) = waiting.get_mut(&response.id).and_then(Waiting::next) else {
            tracing::warn!(id = %response.id, "response without a waiting request");
            continue;
        };
        let _ = reply.send(Ok(response));
    }
    // Replies still waiting are dropped here, which their callers see as an
    // error.
}

impl Service<RequestPacket> for BatchingTransport {
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
    type Response = ResponsePacket;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.queue.is_closed() {
            Poll::Ready(Err(TransportErrorKind::custom_str(
                "request batching task stopped",
            )))
        } else {
            Poll::Ready(Ok(()))
        }
    }

    fn call(&mut self, packet: RequestPacket) -> Self::Future {
        let RequestPacket::Single(request) = packet else {
            return Box::pin(async {
                Err(TransportErrorKind::custom_str(
                    "requests are batched automatically, manual batches are not supported",
                ))
            });
        };
        let (reply, response) = oneshot::channel();
        let queued = self.queue.unbounded_send((reply, request));
        Box::pin(async move {
            if queued.is_err() {
                return Err(TransportErrorKind::custom_str("request batching task stopped"));
            }
            let response = response.await.map_err(|_| {
                TransportErrorKind::custom_str("batch response missing for request")
            })??;
            Ok(ResponsePacket::Single(response))
        })
    }
}
