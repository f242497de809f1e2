//! The Message Bus Adapter: durable-queue publish/consume over
//! AMQP, with publisher confirms so a publish failure surfaces to the
//! caller rather than being silently dropped, and a fixed reconnect
//! backoff that discards in-flight consumer work rather than resuming it
//! against a possibly-stale channel.

use crate::error::{from_lapin, BusError};
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    BasicQosOptions, ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use std::time::Duration;

/// How long to wait before attempting to reconnect after the AMQP
/// connection drops.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// A connected handle to the message bus, scoped to one AMQP channel.
pub struct BusAdapter {
    channel: Channel,
}

impl BusAdapter {
    /// Connects once to `amqp_url` and opens a confirm-mode channel.
    /// Publishes on this channel block until the broker acknowledges them.
    pub async fn connect(amqp_url: &str) -> Result<Self, BusError> {
        let connection = Connection::connect(
            amqp_url,
            ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio),
        )
        .await
        .map_err(from_lapin)?;
        let channel = connection.create_channel().await.map_err(from_lapin)?;
        channel
        .confirm_select(ConfirmSelectOptions::default())
        .await
        .map_err(from_lapin)?;
        Ok(Self { channel })
    }

    /// Retries [`Self::connect`] on a fixed backoff until it succeeds.
    /// There is no cap: a bus outage is something an operator fixes, and
    /// the worker has no useful work to do until the bus is back.
    pub async fn connect_with_retry(amqp_url: &str) -> Self {
        loop {
            match Self::connect(amqp_url).await {
                Ok(adapter) => return adapter,
                Err(e) => {
                    tracing::warn!(error = %e, "bus connection failed, retrying");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                }
            }
        }
    }

    async fn declare(&self, queue: &str) -> Result<(), BusError> {
        self.channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(from_lapin)?;
        Ok(())
    }

    /// Publishes `payload` to `queue`, waiting for the broker's confirm.
    /// A broker-side nack (e.g. queue overflow) surfaces as
    /// [`BusError::PublishFailed`] rather than being swallowed.
    pub async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BusError> {
        self.declare(queue).await?;
        let confirm = self
        .channel
        .basic_publish(
            "",
            queue,
            BasicPublishOptions::default(),
            payload,
            BasicProperties::default().with_delivery_mode(2),
        )
        .await
        .map_err(from_lapin)?
        .await
        .map_err(from_lapin)?;
        if confirm.is_nack() {
            return Err(BusError::PublishFailed(format!(
                        "broker nacked publish to {queue}"
            )));
        }
        Ok(())
    }

    /// Publishes a JSON-serializable value to `queue`.
    pub async fn publish_json<T: serde::Serialize>(
        &self,
        queue: &str,
        value: &T,
    ) -> Result<(), BusError> {
        let bytes = serde_json::to_vec(value)
        .map_err(|e| BusError::UndecodableBody(e.to_string()))?;
        self.publish(queue, &bytes).await
    }

    /// Begins consuming `queue` with `prefetch` unacknowledged deliveries
    /// in flight at once, the throttle that keeps one slow worker from
    /// starving the rest of the fleet.
    pub async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        prefetch: u16,
    ) -> Result<Consumer, BusError> {
        self.declare(queue).await?;
        self.channel
        .basic_qos(prefetch, BasicQosOptions::default())
        .await
        .map_err(from_lapin)?;
        self.channel
        .basic_consume(
            queue,
            consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(from_lapin)
    }
}

/// Acknowledges a delivery as successfully processed.
pub async fn ack(delivery: &lapin::message::Delivery) -> Result<(), BusError> {
    delivery
    .ack(BasicAckOptions::default())
    .await
    .map_err(from_lapin)
}

/// Negatively acknowledges a delivery. `requeue` controls whether the
/// broker redelivers it or routes it to a dead-letter queue/discards it.
pub async fn nack(delivery: &lapin::message::Delivery, requeue: bool) -> Result<(), BusError> {
    delivery
    .nack(BasicNackOptions {
            requeue,
            ..Default::default()
    })
    .await
    .map_err(from_lapin)
}

/// Drains and discards any remaining items in `consumer` without
/// acknowledging them, used when a reconnect makes in-flight work
/// unsafe to continue processing against the new channel.
pub async fn discard_in_flight(mut consumer: Consumer) {
    while let Some(delivery) = consumer.next().await {
        if let Ok(delivery) = delivery {
            let _ = nack(&delivery, true).await;
        }
    }
}
