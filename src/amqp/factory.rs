use crate::amqp::configuration::BrokerSettings;
use crate::pool::{ConnectionFactory, PoolableConnection};
use anyhow::Context;
use lapin::{
    tcp::{AMQPUriTcpExt, NativeTlsConnector},
    uri::{AMQPScheme, AMQPUri},
    ConnectionProperties,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Establishes RabbitMq connections on behalf of a pool.
///
/// Implements [`ConnectionFactory`], so it can feed both
/// [`QueuedPool`](crate::pool::QueuedPool) and
/// [`NullPool`](crate::pool::NullPool).
#[derive(Clone)]
pub struct AmqpConnectionFactory {
    uri: AMQPUri,
    /// The timeout observed when trying to connect to RabbitMq.
    connection_timeout: Duration,
    /// TLS configuration for the connection to RabbitMq.
    /// If `None`, the connection will not be encrypted.
    tls: Option<Arc<Tls>>,
}

#[derive(Clone)]
struct Tls {
    connector: NativeTlsConnector,
    domain: String,
}

impl AmqpConnectionFactory {
    /// Create a new connection factory from settings.
    pub fn new_from_config(settings: &BrokerSettings) -> Result<Self, anyhow::Error> {
        let tls = settings
            .tls
            .as_ref()
            .map(|tls_settings| {
                let domain = tls_settings
                    .domain
                    .clone()
                    .unwrap_or_else(|| settings.host.clone());
                let mut builder = NativeTlsConnector::builder();
                if let Some(certificate) = tls_settings.ca_certificate()? {
                    builder.add_root_certificate(certificate);
                }
                let connector = builder
                    .build()
                    .context("Failed to assemble the RabbitMq TLS connector.")?;
                Ok::<_, anyhow::Error>(Tls { connector, domain })
            })
            .transpose()?;
        let connection_timeout = settings
            .connection_timeout()
            .unwrap_or_else(|| Duration::from_secs(10));
        Ok(Self {
            uri: settings.amqp_uri(),
            connection_timeout,
            tls: tls.map(Arc::new),
        })
    }

    /// Connect to the broker, encrypted if TLS parameters were configured.
    #[tracing::instrument(name = "rabbitmq_connect", skip(self))]
    pub async fn connect(&self) -> Result<lapin::Connection, anyhow::Error> {
        let properties =
            ConnectionProperties::default().with_executor(tokio_executor_trait::Tokio::current());
        let connection = tokio::time::timeout(self.connection_timeout, async {
            match &self.tls {
                None => self.connect_without_tls(properties).await,
                Some(tls) => self.connect_with_tls(properties, Arc::clone(tls)).await,
            }
        })
        .await
        .context("Timed out while trying to connect to RabbitMq.")?
        .context("Failed to connect to RabbitMq.")?;
        // Log broken connections; the pool notices through `is_open` at
        // the next hand-out.
        connection.on_error(|e| {
            warn!("RabbitMq broken connection: {e:?}");
        });
        Ok(connection)
    }

    async fn connect_without_tls(
        &self,
        properties: ConnectionProperties,
    ) -> Result<lapin::Connection, lapin::Error> {
        lapin::Connection::connect_uri(self.uri.clone(), properties).await
    }

    async fn connect_with_tls(
        &self,
        properties: ConnectionProperties,
        tls: Arc<Tls>,
    ) -> Result<lapin::Connection, lapin::Error> {
        lapin::Connection::connector(
            self.uri.clone(),
            Box::new(move |uri| {
                // Establish the plain TCP connection first, then perform a
                // TLS handshake expecting the configured domain on the
                // server certificate.
                let mut amqp_uri = uri.clone();
                amqp_uri.scheme = AMQPScheme::AMQP;
                amqp_uri
                    .connect()
                    .and_then(|tcp| tcp.into_native_tls(&tls.connector, &tls.domain))
            }),
            properties,
        )
        .await
    }
}

#[async_trait::async_trait]
impl ConnectionFactory for AmqpConnectionFactory {
    type Connection = lapin::Connection;

    async fn new_connection(&self) -> Result<lapin::Connection, anyhow::Error> {
        self.connect().await
    }
}

impl PoolableConnection for lapin::Connection {
    fn is_open(&self) -> bool {
        self.status().connected()
    }

    fn close(&self) {
        // lapin tears the socket down when the connection is dropped;
        // nothing to flush here.
        debug!(state = ?self.status().state(), "disposing of amqp connection");
    }
}
