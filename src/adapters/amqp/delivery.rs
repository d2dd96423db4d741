use crate::ports::delivery::InboundMessage;
use crate::ports::BoxError;
use async_trait::async_trait;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicRejectOptions};
use lapin::types::{AMQPValue, FieldTable};

// Set by quorum queues on every redelivery.
const DELIVERY_COUNT_HEADER: &str = "x-delivery-count";

pub struct AmqpDelivery {
    inner: Delivery,
    attempt: u32,
}

impl AmqpDelivery {
    pub fn new(inner: Delivery) -> Self {
        let attempt = attempt_from(inner.properties.headers().as_ref(), inner.redelivered);
        Self { inner, attempt }
    }
}

fn attempt_from(headers: Option<&FieldTable>, redelivered: bool) -> u32 {
    let count = headers.and_then(|headers| {
        headers
            .inner()
            .iter()
            .find(|(key, _)| key.as_str() == DELIVERY_COUNT_HEADER)
            .and_then(|(_, value)| as_count(value))
    });

    match count {
        Some(count) => count.saturating_add(1),
        // classic queues only say whether this is a redelivery
        None if redelivered => 2,
        None => 1,
    }
}

fn as_count(value: &AMQPValue) -> Option<u32> {
    let count = match value {
        AMQPValue::ShortShortUInt(n) => i64::from(*n),
        AMQPValue::ShortUInt(n) => i64::from(*n),
        AMQPValue::LongUInt(n) => i64::from(*n),
        AMQPValue::ShortShortInt(n) => i64::from(*n),
        AMQPValue::ShortInt(n) => i64::from(*n),
        AMQPValue::LongInt(n) => i64::from(*n),
        AMQPValue::LongLongInt(n) => *n,
        _ => return None,
    };
    u32::try_from(count).ok()
}

#[async_trait]
impl InboundMessage for AmqpDelivery {
    fn body(&self) -> &[u8] {
        &self.inner.data
    }

    fn attempt(&self) -> u32 {
        self.attempt
    }

    async fn ack(&self) -> Result<(), BoxError> {
        self.inner.acker.ack(BasicAckOptions::default()).await?;
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), BoxError> {
        self.inner
            .acker
            .reject(BasicRejectOptions { requeue })
            .await?;
        Ok(())
    }
}
