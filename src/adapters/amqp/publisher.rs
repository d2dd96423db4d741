use crate::ports::publisher::MessagePublisher;
use crate::ports::BoxError;
use async_trait::async_trait;
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel};
use tracing::info;

/// Publishes confirmation events to a fixed exchange and routing key.
#[derive(Clone)]
pub struct AmqpPublisher {
    channel: Channel,
    exchange: String,
    routing_key: String,
}

impl AmqpPublisher {
    pub fn new(channel: Channel, exchange: String, routing_key: String) -> Self {
        Self {
            channel,
            exchange,
            routing_key,
        }
    }
}

#[async_trait]
impl MessagePublisher for AmqpPublisher {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), BoxError> {
        self.channel
            .basic_publish(
                &self.exchange,
                &self.routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await?
            .await?;
        info!(exchange = %self.exchange, routing_key = %self.routing_key, "Message published");
        Ok(())
    }
}
