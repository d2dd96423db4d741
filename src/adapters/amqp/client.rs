use super::delivery::AmqpDelivery;
use futures::{Stream, StreamExt};
use lapin::options::{
    BasicConsumeOptions, BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::{error, info};

/// Exchange, queues and routing keys the worker uses.
#[derive(Clone, Debug)]
pub struct Topology {
    pub exchange: String,
    pub conversion_queue: String,
    pub conversion_key: String,
    pub confirmation_queue: String,
    pub confirmation_key: String,
    pub dead_letter_queue: String,
    pub dead_letter_key: String,
    /// Broker-side cap on deliveries of one conversion message
    pub delivery_limit: u32,
}

// Quorum queues stamp `x-delivery-count` on every redelivery; classic queues
// only set the redelivered flag, which cannot count attempts.
const QUEUE_TYPE_QUORUM: &str = "quorum";

/// Arguments of the conversion queue: quorum type, delivery limit, and the
/// dead-letter route rejected messages take.
pub(crate) fn conversion_queue_arguments(topology: &Topology) -> FieldTable {
    let mut arguments = FieldTable::default();
    arguments.insert(
        "x-queue-type".into(),
        AMQPValue::LongString(QUEUE_TYPE_QUORUM.to_string().into()),
    );
    arguments.insert(
        "x-delivery-limit".into(),
        AMQPValue::LongInt(i32::try_from(topology.delivery_limit).unwrap_or(i32::MAX)),
    );
    arguments.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(topology.exchange.clone().into()),
    );
    arguments.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(topology.dead_letter_key.clone().into()),
    );
    arguments
}

pub struct AmqpClient {
    connection: Connection,
    channel: Channel,
}

impl AmqpClient {
    pub async fn connect(url: &str) -> Result<Self, lapin::Error> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        info!("Connected to RabbitMQ");
        Ok(Self {
            connection,
            channel,
        })
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Declare the direct exchange and bind the conversion, confirmation and
    /// dead-letter queues. The conversion queue is a quorum queue; rejected
    /// conversion messages are routed to the dead-letter key.
    pub async fn declare(&self, topology: &Topology) -> Result<(), lapin::Error> {
        self.channel
            .exchange_declare(
                &topology.exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        // quorum queues cannot be auto-deleted
        self.bind_queue(
            topology,
            &topology.conversion_queue,
            &topology.conversion_key,
            false,
            conversion_queue_arguments(topology),
        )
        .await?;
        self.bind_queue(
            topology,
            &topology.confirmation_queue,
            &topology.confirmation_key,
            true,
            FieldTable::default(),
        )
        .await?;
        self.bind_queue(
            topology,
            &topology.dead_letter_queue,
            &topology.dead_letter_key,
            true,
            FieldTable::default(),
        )
        .await?;
        Ok(())
    }

    async fn bind_queue(
        &self,
        topology: &Topology,
        queue: &str,
        routing_key: &str,
        auto_delete: bool,
        arguments: FieldTable,
    ) -> Result<(), lapin::Error> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    auto_delete,
                    ..Default::default()
                },
                arguments,
            )
            .await?;
        self.channel
            .queue_bind(
                queue,
                &topology.exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    /// Start consuming the conversion queue with at most `prefetch`
    /// unacknowledged deliveries in flight.
    pub async fn consume(
        &self,
        topology: &Topology,
        consumer_tag: &str,
        prefetch: u16,
    ) -> Result<impl Stream<Item = AmqpDelivery>, lapin::Error> {
        self.channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;
        let consumer = self
            .channel
            .basic_consume(
                &topology.conversion_queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        info!(queue = %topology.conversion_queue, prefetch, "Consuming messages");

        Ok(consumer.filter_map(|delivery| async move {
            match delivery {
                Ok(delivery) => Some(AmqpDelivery::new(delivery)),
                Err(e) => {
                    error!(error = %e, "Error receiving delivery");
                    None
                }
            }
        }))
    }

    pub async fn close(&self) {
        if let Err(e) = self.channel.close(200, "bye").await {
            error!(error = %e, "Error closing channel");
        }
        if let Err(e) = self.connection.close(200, "bye").await {
            error!(error = %e, "Error closing connection");
        }
    }
}
