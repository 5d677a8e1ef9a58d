use std::time::Duration;

use rama::{
    error::{BoxError, ErrorContext as _},
    telemetry::tracing,
};
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord, Producer as _},
};

use super::{Broker, Connection};

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const QUEUE_TIMEOUT: Duration = Duration::from_secs(5);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Apache Kafka producer, one per client group.
#[derive(Debug, Default, Clone)]
#[non_exhaustive]
pub struct KafkaBroker;

impl KafkaBroker {
    pub fn new() -> Self {
        Self
    }
}

pub struct KafkaConnection {
    client_id: String,
    producer: FutureProducer,
}

impl Broker for KafkaBroker {
    type Connection = KafkaConnection;

    async fn connect(
        &self,
        client_id: &str,
        addresses: &[String],
    ) -> Result<Self::Connection, BoxError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", addresses.join(","))
            .set("client.id", client_id)
            .set("message.timeout.ms", "5000")
            .create()
            .context("create kafka producer")
            .context_str_field("client", client_id)?;

        // producer creation is lazy; only a metadata round trip proves the cluster is reachable
        let probe = producer.clone();
        let broker_count = tokio::task::spawn_blocking(move || {
            probe
                .client()
                .fetch_metadata(None, METADATA_TIMEOUT)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .context("join kafka metadata probe")?
        .context("fetch kafka cluster metadata")
        .context_str_field("client", client_id)?;

        tracing::debug!(%client_id, %broker_count, "kafka cluster metadata fetched");

        Ok(KafkaConnection {
            client_id: client_id.to_owned(),
            producer,
        })
    }
}

impl Connection for KafkaConnection {
    async fn send(&self, topic: &str, payload: &[u8]) -> Result<(), BoxError> {
        let record = FutureRecord::<(), [u8]>::to(topic).payload(payload);
        self.producer
            .send(record, QUEUE_TIMEOUT)
            .await
            .map_err(|(err, _)| err)
            .context("publish kafka record")
            .context_str_field("topic", topic)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BoxError> {
        tracing::trace!(client_id = %self.client_id, "flushing kafka producer");
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(FLUSH_TIMEOUT))
            .await
            .context("join kafka producer flush")?
            .context("flush kafka producer")?;
        Ok(())
    }
}
