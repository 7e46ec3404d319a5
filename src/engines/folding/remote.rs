use super::protocol::{correlation_id, decode_reply, parse_correlation_id, RpcRequest};
use super::FoldingBackend;
use crate::error::{CodonOptError, Result};
use crate::types::RawFolding;
use async_trait::async_trait;
use lapin::message::DeliveryResult;
use lapin::options::{BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use uuid::Uuid;

pub const URL_ENV: &str = "CODONOPT_FOLD_URL";
pub const QUEUE_ENV: &str = "CODONOPT_FOLD_QUEUE";

type CallReply = Result<Vec<RawFolding>>;

struct PendingCall {
    remaining: usize,
    slots: Vec<Option<RawFolding>>,
    reply: oneshot::Sender<CallReply>,
}

/// Matches replies from the shared reply queue to the call waiting for them.
///
/// Replies may arrive in any order. Ids of unknown calls and repeated replies
/// for an already filled slot are dropped.
#[derive(Default)]
pub struct RpcCorrelator {
    pending: Mutex<HashMap<String, PendingCall>>,
}

impl RpcCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, call_id: &str, count: usize) -> oneshot::Receiver<CallReply> {
        let (reply, receiver) = oneshot::channel();
        if count == 0 {
            let _ = reply.send(Ok(Vec::new()));
            return receiver;
        }

        let call = PendingCall {
            remaining: count,
            slots: vec![None; count],
            reply,
        };
        self.lock().insert(call_id.to_string(), call);
        receiver
    }

    pub fn deliver(&self, correlation: Option<&str>, body: &[u8]) {
        let Some((call_id, index)) = correlation.and_then(parse_correlation_id) else {
            debug!("Ignoring folding reply without a usable correlation id");
            return;
        };

        let mut pending = self.lock();
        let Some(call) = pending.get_mut(call_id) else {
            debug!("Ignoring folding reply for unknown call {}", call_id);
            return;
        };
        if index >= call.slots.len() || call.slots[index].is_some() {
            warn!("Ignoring unexpected folding reply {}:{}", call_id, index);
            return;
        }

        match decode_reply(body) {
            Ok(folding) => {
                call.slots[index] = Some(folding);
                call.remaining -= 1;
                if call.remaining > 0 {
                    return;
                }
                if let Some(call) = pending.remove(call_id) {
                    let results = call.slots.into_iter().flatten().collect();
                    let _ = call.reply.send(Ok(results));
                }
            }
            Err(e) => {
                if let Some(call) = pending.remove(call_id) {
                    let _ = call.reply.send(Err(e));
                }
            }
        }
    }

    /// Forget a call whose requests could not all be published
    pub fn abandon(&self, call_id: &str) {
        self.lock().remove(call_id);
    }

    pub fn outstanding(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingCall>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolved connection parameters of the remote folding service
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEndpoint {
    pub url: String,
    pub queue: String,
    pub fold_method: String,
    pub partition_method: String,
}

struct Session {
    connection: Connection,
    channel: Channel,
    reply_queue: String,
}

impl Session {
    fn is_open(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }
}

async fn open_session(url: &str, correlator: Arc<RpcCorrelator>) -> Result<Session> {
    let connection = Connection::connect(url, ConnectionProperties::default()).await?;
    let channel = connection.create_channel().await?;
    let queue = channel
        .queue_declare(
            "",
            QueueDeclareOptions {
                exclusive: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;
    let reply_queue = queue.name().as_str().to_string();

    let consumer = channel
        .basic_consume(
            &reply_queue,
            "codonopt-replies",
            BasicConsumeOptions {
                no_ack: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;
    consumer.set_delegate(move |delivery: DeliveryResult| {
        let correlator = Arc::clone(&correlator);
        async move {
            match delivery {
                Ok(Some(delivery)) => {
                    let id = delivery.properties.correlation_id().as_ref().map(|id| id.as_str());
                    correlator.deliver(id, &delivery.data);
                }
                Ok(None) => {}
                Err(e) => warn!("Folding reply consumer failed: {}", e),
            }
        }
    });

    Ok(Session {
        connection,
        channel,
        reply_queue,
    })
}

/// Folding over AMQP RPC: one message per sequence on the work queue, replies
/// collected on an exclusive queue through a single listener.
///
/// No timeout is applied; a lost reply stalls its batch.
pub struct RemoteFoldingClient {
    endpoint: RemoteEndpoint,
    correlator: Arc<RpcCorrelator>,
    session: tokio::sync::Mutex<Session>,
}

impl RemoteFoldingClient {
    pub async fn connect(endpoint: RemoteEndpoint) -> Result<Self> {
        let correlator = Arc::new(RpcCorrelator::new());
        let session = open_session(&endpoint.url, Arc::clone(&correlator))
            .await
            .map_err(|e| CodonOptError::BackendConnectivity(e.to_string()))?;
        info!(
            "Connected to folding service, queue {} (reply queue {})",
            endpoint.queue, session.reply_queue
        );
        Ok(Self {
            endpoint,
            correlator,
            session: tokio::sync::Mutex::new(session),
        })
    }

    /// Connect from synchronous startup code
    pub fn connect_blocking(endpoint: RemoteEndpoint) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        runtime.block_on(Self::connect(endpoint))
    }

    /// Channel and reply queue to publish on, reopening a closed session first
    async fn channel(&self) -> Result<(Channel, String)> {
        let mut session = self.session.lock().await;
        if !session.is_open() {
            info!("Folding service channel closed; reconnecting");
            *session = open_session(&self.endpoint.url, Arc::clone(&self.correlator)).await?;
        }
        Ok((session.channel.clone(), session.reply_queue.clone()))
    }

    async fn call(&self, method: &str, seqs: &[String]) -> Result<Vec<RawFolding>> {
        if seqs.is_empty() {
            return Ok(Vec::new());
        }

        let call_id = Uuid::new_v4().simple().to_string();
        let receiver = self.correlator.register(&call_id, seqs.len());

        let published = async {
            let (channel, reply_queue) = self.channel().await?;
            for (index, seq) in seqs.iter().enumerate() {
                let payload = RpcRequest::new(method, seq).to_bytes()?;
                let properties = BasicProperties::default()
                    .with_reply_to(reply_queue.as_str().into())
                    .with_correlation_id(correlation_id(&call_id, index).into());
                channel
                    .basic_publish(
                        "",
                        &self.endpoint.queue,
                        BasicPublishOptions::default(),
                        &payload,
                        properties,
                    )
                    .await?;
            }
            Ok::<(), CodonOptError>(())
        };
        if let Err(e) = published.await {
            self.correlator.abandon(&call_id);
            return Err(e);
        }
        debug!("Published {} {} requests as call {}", seqs.len(), method, call_id);

        receiver.await.map_err(|_| {
            CodonOptError::Folding(format!("reply listener closed before call {} completed", call_id))
        })?
    }
}

#[async_trait]
impl FoldingBackend for RemoteFoldingClient {
    fn name(&self) -> String {
        format!(
            "remote ({} / {} via {})",
            self.endpoint.fold_method, self.endpoint.partition_method, self.endpoint.queue
        )
    }

    async fn fold(&self, seqs: &[String]) -> Result<Vec<RawFolding>> {
        self.call(&self.endpoint.fold_method, seqs).await
    }

    async fn partition(&self, seqs: &[String]) -> Result<Vec<RawFolding>> {
        let mut results = self.call(&self.endpoint.partition_method, seqs).await?;
        for folding in &mut results {
            folding.base_pairs.get_or_insert_with(Vec::new);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::folding::protocol::encode_reply;

    fn reply(structure: &str, energy: f64) -> Vec<u8> {
        encode_reply(&RawFolding {
            structure: structure.to_string(),
            free_energy: energy,
            base_pairs: None,
        })
    }

    #[test]
    fn test_out_of_order_replies_land_in_their_slots() {
        let correlator = RpcCorrelator::new();
        let mut receiver = correlator.register("call", 3);

        correlator.deliver(Some("call:2"), &reply("..", -2.0));
        correlator.deliver(Some("call:0"), &reply("...", 0.0));
        assert!(receiver.try_recv().is_err());
        correlator.deliver(Some("call:1"), &reply("....", -1.0));

        let results = receiver.try_recv().unwrap().unwrap();
        let energies: Vec<f64> = results.iter().map(|r| r.free_energy).collect();
        assert_eq!(energies, vec![0.0, -1.0, -2.0]);
        assert_eq!(correlator.outstanding(), 0);
    }

    #[test]
    fn test_unknown_and_duplicate_replies_ignored() {
        let correlator = RpcCorrelator::new();
        let mut receiver = correlator.register("call", 2);

        correlator.deliver(None, &reply(".", 0.0));
        correlator.deliver(Some("other:0"), &reply(".", 0.0));
        correlator.deliver(Some("call:9"), &reply(".", 0.0));
        correlator.deliver(Some("call:0"), &reply(".", -1.0));
        correlator.deliver(Some("call:0"), &reply(".", -5.0));
        assert!(receiver.try_recv().is_err());
        assert_eq!(correlator.outstanding(), 1);

        correlator.deliver(Some("call:1"), &reply(".", -3.0));
        let results = receiver.try_recv().unwrap().unwrap();
        assert_eq!(results[0].free_energy, -1.0);
        assert_eq!(results[1].free_energy, -3.0);
    }

    #[test]
    fn test_malformed_reply_fails_call() {
        let correlator = RpcCorrelator::new();
        let mut receiver = correlator.register("call", 2);
        correlator.deliver(Some("call:0"), &[1, 2, 3]);

        let outcome = receiver.try_recv().unwrap();
        assert!(matches!(outcome, Err(CodonOptError::Protocol(_))));
        assert_eq!(correlator.outstanding(), 0);
    }

    #[test]
    fn test_empty_call_resolves_immediately() {
        let correlator = RpcCorrelator::new();
        let mut receiver = correlator.register("call", 0);
        assert!(receiver.try_recv().unwrap().unwrap().is_empty());
        assert_eq!(correlator.outstanding(), 0);
    }

    #[test]
    fn test_abandon_drops_call() {
        let correlator = RpcCorrelator::new();
        let mut receiver = correlator.register("call", 1);
        correlator.abandon("call");
        correlator.deliver(Some("call:0"), &reply(".", 0.0));
        assert!(receiver.try_recv().is_err());
        assert_eq!(correlator.outstanding(), 0);
    }
}
