use fairy_floss::amqp::{AmqpConnectionFactory, BrokerSettings};
use fairy_floss::pool::QueuedPool;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::BasicProperties;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Out-of-the-box parameters for the default RabbitMq Docker image.
    let settings = BrokerSettings::default();
    let factory = AmqpConnectionFactory::new_from_config(&settings)?;

    // A steady pool of up to 10 connections, with room for 10 more under
    // burst load. Connections are replaced once they are an hour old or
    // have sat idle for 45 seconds, and acquisitions on a saturated pool
    // give up after 10 seconds.
    //
    // A connection maps to an open TCP socket, so the steady size is the
    // number of sockets you are willing to keep open towards the broker;
    // the overflow allowance is how far you let bursts stretch that
    // before callers start queueing.
    let pool = QueuedPool::builder(factory)
        .max_size(10)
        .max_overflow(10)
        .recycle(Duration::from_secs(3600))
        .stale(Duration::from_secs(45))
        .timeout(Duration::from_secs(10))
        .build();

    // The lease derefs to the underlying `lapin::Connection`, so opening
    // a channel is a plain pass-through.
    let lease = pool.acquire().await?;
    let channel = lease.create_channel().await?;
    channel
        .queue_declare(
            "fruits",
            QueueDeclareOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let payload = serde_json::to_vec(&serde_json::json!({
        "type": "banana",
        "description": "they are yellow",
    }))?;
    channel
        .basic_publish(
            "",
            "fruits",
            BasicPublishOptions::default(),
            &payload,
            BasicProperties::default().with_delivery_mode(2),
        )
        .await?
        .await?;

    // Handing the lease back keeps the connection warm for the next
    // publisher; a failed publish should call `invalidate` instead (or go
    // through `with_connection`, which picks the right one).
    lease.release();
    println!("published one banana; {} connection(s) now idle", pool.idle());

    Ok(())
}
