use crate::confirm::ConfirmWaiter;
use crate::errors::*;
use crate::{PublisherConfig, ReindexMessage};
use amiquip::{
    Auth, Channel, Connection, ConnectionOptions, ConnectionTuning, ExchangeDeclareOptions,
    ExchangeType, FieldTable, QueueDeclareOptions,
};
use log::{debug, warn};
use snafu::ResultExt;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

/// The broker operations the publisher needs, in the order it needs them.
///
/// [`AmqpBroker`](struct.AmqpBroker.html) is the real implementation; tests substitute an
/// in-memory recorder.
pub trait Broker {
    /// Declare `queue`. Declaring an existing queue with the same settings is a no-op.
    fn declare_queue(&mut self, queue: &str, durable: bool) -> Result<()>;

    /// Declare a direct exchange named `exchange`. Declaring an existing exchange with the same
    /// settings is a no-op.
    fn declare_direct_exchange(&mut self, exchange: &str, durable: bool) -> Result<()>;

    /// Bind `queue` to `exchange` under `routing_key`.
    fn bind_queue(&mut self, queue: &str, exchange: &str, routing_key: &str) -> Result<()>;

    /// Put the channel into publisher confirm mode; subsequent publishes block until the broker
    /// acks them.
    fn enable_confirms(&mut self) -> Result<()>;

    /// Publish `message` to `exchange` under `routing_key`.
    fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message: &ReindexMessage,
    ) -> Result<()>;

    /// Release the connection.
    fn close(self) -> Result<()>;
}

/// A [`Broker`](trait.Broker.html) backed by one amiquip connection and one channel.
pub struct AmqpBroker {
    connection: Connection,
    channel: Channel,
    confirms: Option<ConfirmWaiter>,
}

impl AmqpBroker {
    /// Connect to the broker described by `config` and open a channel.
    ///
    /// Every address the host resolves to is tried in turn; the error from the last one is
    /// returned if none succeeds.
    pub fn open(config: &PublisherConfig) -> Result<AmqpBroker> {
        let host = config.host_name();
        let port = config.port_number();
        let addrs = (host, port)
            .to_socket_addrs()
            .context(ResolveAddressSnafu { host, port })?;

        let mut last_err = None;
        for addr in addrs {
            match open_connection(config, addr) {
                Ok(mut connection) => {
                    debug!("connected to {}", addr);
                    let channel = connection.open_channel(None).context(OpenChannelSnafu)?;
                    return Ok(AmqpBroker {
                        connection,
                        channel,
                        confirms: None,
                    });
                }
                Err(err) => {
                    debug!("connection to {} failed: {}", addr, err.report());
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| NoAddressesSnafu { host, port }.build()))
    }
}

fn open_connection(config: &PublisherConfig, addr: SocketAddr) -> Result<Connection> {
    let stream = match config.timeout() {
        Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
        None => TcpStream::connect(addr),
    }
    .context(TcpConnectSnafu { addr })?;
    let stream = mio::net::TcpStream::from_stream(stream).context(TcpConnectSnafu { addr })?;

    let options = config.connection_options();
    if config.uses_tls() {
        open_tls(config.host_name(), addr, stream, options)
    } else {
        Connection::insecure_open_stream(stream, options, ConnectionTuning::default())
            .context(HandshakeSnafu { addr })
    }
}

#[cfg(feature = "native-tls")]
fn open_tls(
    domain: &str,
    addr: SocketAddr,
    stream: mio::net::TcpStream,
    options: ConnectionOptions<Auth>,
) -> Result<Connection> {
    let connector = native_tls::TlsConnector::new().context(TlsConnectorSnafu)?;
    Connection::open_tls_stream(
        connector,
        domain,
        stream,
        options,
        ConnectionTuning::default(),
    )
    .context(HandshakeSnafu { addr })
}

#[cfg(not(feature = "native-tls"))]
fn open_tls(
    _: &str,
    _: SocketAddr,
    _: mio::net::TcpStream,
    _: ConnectionOptions<Auth>,
) -> Result<Connection> {
    TlsFeatureNotEnabledSnafu.fail()
}

impl Broker for AmqpBroker {
    fn declare_queue(&mut self, queue: &str, durable: bool) -> Result<()> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable,
                    ..QueueDeclareOptions::default()
                },
            )
            .context(DeclareQueueSnafu { queue })?;
        Ok(())
    }

    fn declare_direct_exchange(&mut self, exchange: &str, durable: bool) -> Result<()> {
        self.channel
            .exchange_declare(
                ExchangeType::Direct,
                exchange,
                ExchangeDeclareOptions {
                    durable,
                    ..ExchangeDeclareOptions::default()
                },
            )
            .context(DeclareExchangeSnafu { exchange })?;
        Ok(())
    }

    fn bind_queue(&mut self, queue: &str, exchange: &str, routing_key: &str) -> Result<()> {
        self.channel
            .queue_bind(queue, exchange, routing_key, FieldTable::default())
            .context(BindQueueSnafu {
                queue,
                exchange,
                routing_key,
            })
    }

    fn enable_confirms(&mut self) -> Result<()> {
        // register the listener before entering confirm mode so no confirm is missed
        let receiver = self
            .channel
            .listen_for_publisher_confirms()
            .context(EnableConfirmsSnafu)?;
        self.channel
            .enable_publisher_confirms()
            .context(EnableConfirmsSnafu)?;
        self.confirms = Some(ConfirmWaiter::new(receiver));
        Ok(())
    }

    fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message: &ReindexMessage,
    ) -> Result<()> {
        self.channel
            .basic_publish(exchange, message.to_publish(routing_key))
            .context(PublishSnafu { id: message.id() })?;
        match &mut self.confirms {
            Some(confirms) => confirms.wait(message.id()),
            None => Ok(()),
        }
    }

    fn close(self) -> Result<()> {
        let AmqpBroker {
            connection,
            channel,
            ..
        } = self;

        let channel_result = channel.close().context(CloseChannelSnafu);
        let connection_result = connection.close().context(CloseConnectionSnafu);
        if let (Err(_), Err(err)) = (&channel_result, &connection_result) {
            warn!("{}", err.report());
        }
        channel_result.and(connection_result)
    }
}
