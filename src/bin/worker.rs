//! Conversion Worker Binary
//!
//! Consumes conversion tasks from RabbitMQ, merges each video's chunks,
//! packages the result as MPEG-DASH with ffmpeg, records the outcome in
//! PostgreSQL and publishes a confirmation event.
//!
//! See `WorkerConfig` for the environment variables.

use dashcast::adapters::amqp::{AmqpClient, AmqpPublisher};
use dashcast::adapters::ffmpeg::FfmpegEncoder;
use dashcast::adapters::postgres::PgLedger;
use dashcast::application::dispatcher::Dispatcher;
use dashcast::application::retry::RetryPolicy;
use dashcast::application::worker::WorkerPool;
use dashcast::domain::dash::Transcoder;
use dashcast::telemetry;
use dashcast::WorkerConfig;
use std::error::Error;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = WorkerConfig::from_env();

    telemetry::init_tracing();

    // 1. Adapters
    let ledger = PgLedger::connect(&config.database.url(), config.database.max_connections)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to connect to database"))?;

    let client = AmqpClient::connect(&config.broker.url)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to connect to RabbitMQ"))?;
    let topology = config.broker.topology(config.max_attempts);
    client.declare(&topology).await?;

    let publisher = AmqpPublisher::new(
        client.channel().clone(),
        topology.exchange.clone(),
        topology.confirmation_key.clone(),
    );
    let transcoder = Transcoder::new(FfmpegEncoder::new(&config.ffmpeg_bin))
        .with_timeout(config.encoder_timeout);

    // 2. Application services
    let dispatcher = Arc::new(
        Dispatcher::new(ledger.clone(), ledger, publisher, transcoder)
            .with_retry_policy(RetryPolicy::new(config.max_attempts)),
    );
    let pool = WorkerPool::start(dispatcher, config.workers, config.queue_capacity);

    // 3. Consume until the stream ends or we are interrupted
    let deliveries = client
        .consume(&topology, &config.broker.consumer_tag, config.prefetch())
        .await?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    info!(workers = config.workers, "Conversion worker started");
    pool.run(deliveries, shutdown).await;
    pool.shutdown().await;
    client.close().await;
    info!("Conversion worker stopped");

    Ok(())
}
