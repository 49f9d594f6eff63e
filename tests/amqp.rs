//! Smoke tests against a live RabbitMq broker.
//!
//! These are `#[ignore]`d by default; run them with a stock broker
//! listening on localhost (e.g. the official Docker image) via
//! `cargo test -- --ignored`.

use config::{Config, Environment, File};
use fairy_floss::amqp::AmqpConnectionFactory;
use fairy_floss::amqp::BrokerSettings;
use fairy_floss::pool::QueuedPool;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct TestSettings {
    broker: BrokerSettings,
}

/// Load broker settings for the test instance from the YAML fixture,
/// overridable through `APP_`-prefixed environment variables.
fn get_broker_factory() -> AmqpConnectionFactory {
    let mut fixture = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap());
    fixture.push("tests/fixtures/test_config.yml");

    let settings: TestSettings = Config::builder()
        .add_source(File::from(fixture))
        .add_source(Environment::with_prefix("app").separator("__"))
        .build()
        .expect("failed to assemble test configuration")
        .try_deserialize()
        .expect("failed to deserialize test configuration");

    AmqpConnectionFactory::new_from_config(&settings.broker)
        .expect("failed to build connection factory")
}

#[tokio::test]
#[ignore = "requires a running RabbitMq broker"]
async fn a_pooled_connection_can_open_a_channel() {
    let pool = QueuedPool::builder(get_broker_factory()).max_size(1).build();

    let lease = pool.acquire().await.unwrap();
    let channel = lease.create_channel().await.unwrap();

    assert!(channel.status().connected());
    lease.release();
}

#[tokio::test]
#[ignore = "requires a running RabbitMq broker"]
async fn the_pool_replaces_a_connection_closed_under_it() {
    let pool = QueuedPool::builder(get_broker_factory()).max_size(1).build();

    let lease = pool.acquire().await.unwrap();
    lease
        .close(0, "closing for test")
        .await
        .expect("failed to close connection");
    assert!(!lease.status().connected());
    lease.release();

    // The dead connection must not be pooled; the next acquisition gets a
    // healthy replacement.
    let fresh = pool.acquire().await.unwrap();
    assert!(fresh.status().connected());
    fresh.release();
}
