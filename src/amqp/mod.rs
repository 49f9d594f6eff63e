//! Connecting to a RabbitMq broker.

pub mod configuration;
mod factory;

pub use configuration::BrokerSettings;
pub use factory::AmqpConnectionFactory;

pub use lapin::{Channel, Connection};
