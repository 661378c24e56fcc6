use crate::errors::*;
use amiquip::{Auth, ConnectionOptions};
use percent_encoding::percent_decode_str;
use snafu::{OptionExt, ResultExt};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use url::{Host, Url};

/// Token appended (after a single space) to every published id.
pub const DEFAULT_SUFFIX: &str = "1257279827";

/// Everything needed to connect to the broker, set up the reindex topology, and build messages.
///
/// `PublisherConfig` uses the builder pattern. The default settings are equivalent to
///
/// ```rust
/// use reindex_post::PublisherConfig;
///
/// # fn default_publisher_config() -> PublisherConfig {
/// PublisherConfig::default()
///     .host("localhost")
///     .port(5672)
///     .username("guest")
///     .password("helpful!")
///     .virtual_host("/")
///     .heartbeat(60)
///     .connection_timeout(None)
///     .tls(false)
///     .queue("reindex")
///     .exchange("publicearth")
///     .routing_key("indexer")
///     .suffix("1257279827")
///     .confirm(false)
/// # }
/// ```
#[derive(Clone, PartialEq)]
pub struct PublisherConfig {
    host: String,
    port: u16,
    username: String,
    password: String,
    virtual_host: String,
    heartbeat: u16,
    connection_timeout: Option<Duration>,
    tls: bool,
    queue: String,
    exchange: String,
    routing_key: String,
    suffix: String,
    confirm: bool,
}

impl Default for PublisherConfig {
    // NOTE: If we change this, make sure to change the doc comment above.
    fn default() -> Self {
        PublisherConfig {
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "helpful!".to_string(),
            virtual_host: "/".to_string(),
            heartbeat: 60,
            connection_timeout: None,
            tls: false,
            queue: "reindex".to_string(),
            exchange: "publicearth".to_string(),
            routing_key: "indexer".to_string(),
            suffix: DEFAULT_SUFFIX.to_string(),
            confirm: false,
        }
    }
}

impl PublisherConfig {
    /// Build a config from an `amqp://` or `amqps://` URL.
    ///
    /// Anything the URL does not mention keeps its default value. The port defaults to 5672 for
    /// `amqp` and 5671 for `amqps`. The single path segment, if present, is the (percent-decoded)
    /// virtual host. The `heartbeat` (seconds) and `connection_timeout` (milliseconds) query
    /// parameters are recognized; any other parameter is an error.
    pub fn from_url(url: &str) -> Result<PublisherConfig> {
        let parsed = Url::parse(url).context(InvalidUrlSnafu { url })?;
        let (tls, default_port) = match parsed.scheme() {
            "amqp" => (false, 5672),
            "amqps" => (true, 5671),
            other => return UnsupportedSchemeSnafu { scheme: other }.fail(),
        };

        let mut config = PublisherConfig::default()
            .tls(tls)
            .port(parsed.port().unwrap_or(default_port));
        match parsed.host() {
            Some(Host::Domain("")) | None => (),
            Some(Host::Domain(domain)) => config = config.host(domain),
            Some(Host::Ipv4(addr)) => config = config.host(addr.to_string()),
            // host_str() keeps the brackets, which the resolver does not accept
            Some(Host::Ipv6(addr)) => config = config.host(addr.to_string()),
        }

        if let Some(mut path_segments) = parsed.path_segments() {
            let vhost = path_segments.next().unwrap_or("");

            // we can't distinguish "amqp://host" from "amqp://host/", so an empty vhost
            // always means the default
            if !vhost.is_empty() {
                config = config.virtual_host(decode(vhost, "virtual host")?);
            }
            if path_segments.next().is_some() {
                return InvalidUrlParameterSnafu {
                    parameter: "path",
                    value: parsed.path(),
                }
                .fail();
            }
        }

        if !parsed.username().is_empty() {
            config = config.username(decode(parsed.username(), "username")?);
        }
        if let Some(password) = parsed.password() {
            config = config.password(decode(password, "password")?);
        }

        for (k, v) in parsed.query_pairs() {
            let invalid = || {
                InvalidUrlParameterSnafu {
                    parameter: k.as_ref(),
                    value: v.as_ref(),
                }
                .build()
            };
            match k.as_ref() {
                "heartbeat" => {
                    let v = v.parse::<u16>().map_err(|_| invalid())?;
                    config = config.heartbeat(v);
                }
                "connection_timeout" => {
                    let v = v.parse::<u64>().map_err(|_| invalid())?;
                    config = config.connection_timeout(Some(Duration::from_millis(v)));
                }
                other => return UnknownUrlParameterSnafu { parameter: other }.fail(),
            }
        }

        Ok(config)
    }

    /// Sets the broker host name.
    pub fn host<T: Into<String>>(self, host: T) -> Self {
        PublisherConfig {
            host: host.into(),
            ..self
        }
    }

    /// Sets the broker port.
    pub fn port(self, port: u16) -> Self {
        PublisherConfig { port, ..self }
    }

    /// Sets the username for PLAIN authentication.
    pub fn username<T: Into<String>>(self, username: T) -> Self {
        PublisherConfig {
            username: username.into(),
            ..self
        }
    }

    /// Sets the password for PLAIN authentication.
    pub fn password<T: Into<String>>(self, password: T) -> Self {
        PublisherConfig {
            password: password.into(),
            ..self
        }
    }

    /// Sets the AMQP virtual host.
    pub fn virtual_host<T: Into<String>>(self, virtual_host: T) -> Self {
        PublisherConfig {
            virtual_host: virtual_host.into(),
            ..self
        }
    }

    /// Sets the heartbeat interval in seconds. 0 disables heartbeats.
    pub fn heartbeat(self, heartbeat: u16) -> Self {
        PublisherConfig { heartbeat, ..self }
    }

    /// Sets the timeout for the initial TCP connection. If None (the default), there is no
    /// timeout.
    pub fn connection_timeout(self, connection_timeout: Option<Duration>) -> Self {
        PublisherConfig {
            connection_timeout,
            ..self
        }
    }

    /// Sets whether to wrap the connection in TLS.
    pub fn tls(self, tls: bool) -> Self {
        PublisherConfig { tls, ..self }
    }

    /// Sets the name of the durable queue that receives reindex requests.
    pub fn queue<T: Into<String>>(self, queue: T) -> Self {
        PublisherConfig {
            queue: queue.into(),
            ..self
        }
    }

    /// Sets the name of the durable direct exchange messages are published to.
    pub fn exchange<T: Into<String>>(self, exchange: T) -> Self {
        PublisherConfig {
            exchange: exchange.into(),
            ..self
        }
    }

    /// Sets the routing key used for both the binding and every publish.
    pub fn routing_key<T: Into<String>>(self, routing_key: T) -> Self {
        PublisherConfig {
            routing_key: routing_key.into(),
            ..self
        }
    }

    /// Sets the token appended to every id.
    pub fn suffix<T: Into<String>>(self, suffix: T) -> Self {
        PublisherConfig {
            suffix: suffix.into(),
            ..self
        }
    }

    /// Sets whether to wait for a publisher confirm after every message.
    pub fn confirm(self, confirm: bool) -> Self {
        PublisherConfig { confirm, ..self }
    }

    pub fn host_name(&self) -> &str {
        &self.host
    }

    pub fn port_number(&self) -> u16 {
        self.port
    }

    pub fn uses_tls(&self) -> bool {
        self.tls
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.connection_timeout
    }

    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    pub fn exchange_name(&self) -> &str {
        &self.exchange
    }

    pub fn routing_key_name(&self) -> &str {
        &self.routing_key
    }

    pub fn message_suffix(&self) -> &str {
        &self.suffix
    }

    pub fn confirms_enabled(&self) -> bool {
        self.confirm
    }

    /// The amiquip connection options for these settings.
    pub fn connection_options(&self) -> ConnectionOptions<Auth> {
        ConnectionOptions::default()
            .auth(Auth::Plain {
                username: self.username.clone(),
                password: self.password.clone(),
            })
            .virtual_host(self.virtual_host.clone())
            .heartbeat(self.heartbeat)
            .connection_timeout(self.connection_timeout)
            .information(Some(client_information()))
    }
}

// Shown as "information" under the connection's client properties in the RabbitMQ UI.
fn client_information() -> String {
    use crate::built_info::*;
    format!(
        "{} {} ({} / {})",
        PKG_NAME, PKG_VERSION, CFG_OS, RUSTC_VERSION
    )
}

fn decode<'a>(s: &'a str, field: &'static str) -> Result<Cow<'a, str>> {
    percent_decode_str(s)
        .decode_utf8()
        .ok()
        .context(UrlNotUtf8Snafu { field })
}

impl fmt::Debug for PublisherConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PublisherConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("virtual_host", &self.virtual_host)
            .field("heartbeat", &self.heartbeat)
            .field("connection_timeout", &self.connection_timeout)
            .field("tls", &self.tls)
            .field("queue", &self.queue)
            .field("exchange", &self.exchange)
            .field("routing_key", &self.routing_key)
            .field("suffix", &self.suffix)
            .field("confirm", &self.confirm)
            .finish()
    }
}

impl fmt::Display for PublisherConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}://{}@{}:{} vhost={} queue={} exchange={} routing_key={}",
            if self.tls { "amqps" } else { "amqp" },
            self.username,
            self.host,
            self.port,
            self.virtual_host,
            self.queue,
            self.exchange,
            self.routing_key
        )
    }
}
