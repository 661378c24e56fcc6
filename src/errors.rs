use snafu::Snafu;
use std::net::SocketAddr;
use std::{fmt, io};

/// A type alias for handling errors throughout reindex-post.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Broad classification of an [`Error`](enum.Error.html), matching the points in a run at which
/// it can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The broker settings could not be turned into something we can connect to.
    Configuration,

    /// The broker could not be reached, refused us, or the handshake failed.
    Connection,

    /// Declaring or binding the queue and exchange failed.
    Declaration,

    /// Publishing (or confirming) a message failed.
    Publish,

    /// Writing the `Posted` line to the output failed.
    Output,

    /// A publisher operation was invoked out of order.
    State,
}

/// An error that can occur from reindex-post.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// The broker URL could not be parsed.
    #[snafu(display("invalid broker URL {}", url))]
    InvalidUrl { url: String, source: url::ParseError },

    /// The broker URL does not use the `amqp` or `amqps` scheme.
    #[snafu(display("unsupported URL scheme {} (expected amqp or amqps)", scheme))]
    UnsupportedScheme { scheme: String },

    /// The broker URL contains percent-encoded data that is not valid UTF-8.
    #[snafu(display("broker URL field {} is not valid UTF-8", field))]
    UrlNotUtf8 { field: &'static str },

    /// The broker URL has a query parameter we do not understand.
    #[snafu(display("unsupported URL parameter {}", parameter))]
    UnknownUrlParameter { parameter: String },

    /// The broker URL has a query parameter with an unparseable value.
    #[snafu(display("invalid value for URL parameter {}: {}", parameter, value))]
    InvalidUrlParameter { parameter: String, value: String },

    /// An `amqps` connection was requested but TLS support was not compiled in.
    #[snafu(display("amqps requested but reindex-post was built without the native-tls feature"))]
    TlsFeatureNotEnabled,

    /// The TLS connector could not be created.
    #[cfg(feature = "native-tls")]
    #[snafu(display("could not create TLS connector"))]
    TlsConnector { source: native_tls::Error },

    /// The broker host name could not be resolved.
    #[snafu(display("could not resolve broker address {}:{}", host, port))]
    ResolveAddress {
        host: String,
        port: u16,
        source: io::Error,
    },

    /// The broker host name resolved to no addresses.
    #[snafu(display("broker address {}:{} resolved to nothing", host, port))]
    NoAddresses { host: String, port: u16 },

    /// The TCP connection to the broker failed.
    #[snafu(display("could not connect to broker at {}", addr))]
    TcpConnect { addr: SocketAddr, source: io::Error },

    /// The AMQP handshake with the broker failed (including rejected credentials).
    #[snafu(display("AMQP handshake with broker at {} failed", addr))]
    Handshake {
        addr: SocketAddr,
        source: amiquip::Error,
    },

    /// A channel could not be opened on the connection.
    #[snafu(display("could not open channel"))]
    OpenChannel { source: amiquip::Error },

    /// The queue declaration was rejected by the broker.
    #[snafu(display("could not declare queue {}", queue))]
    DeclareQueue {
        queue: String,
        source: amiquip::Error,
    },

    /// The exchange declaration was rejected by the broker.
    #[snafu(display("could not declare exchange {}", exchange))]
    DeclareExchange {
        exchange: String,
        source: amiquip::Error,
    },

    /// The queue could not be bound to the exchange.
    #[snafu(display(
        "could not bind queue {} to exchange {} with routing key {}",
        queue,
        exchange,
        routing_key
    ))]
    BindQueue {
        queue: String,
        exchange: String,
        routing_key: String,
        source: amiquip::Error,
    },

    /// The channel could not be put into publisher confirm mode.
    #[snafu(display("could not enable publisher confirms"))]
    EnableConfirms { source: amiquip::Error },

    /// Sending the message for `id` failed.
    #[snafu(display("could not publish {}", id))]
    Publish { id: String, source: amiquip::Error },

    /// The broker rejected the message for `id`.
    #[snafu(display("broker rejected {} (delivery tag {})", id, delivery_tag))]
    PublishNacked { id: String, delivery_tag: u64 },

    /// The channel went away while waiting for the broker to confirm `id`.
    #[snafu(display("confirm stream closed while waiting for {}", id))]
    ConfirmStreamClosed { id: String },

    /// Writing the output line for `id` failed.
    #[snafu(display("could not write output for {}", id))]
    WriteOutput { id: String, source: io::Error },

    /// Closing the channel failed.
    #[snafu(display("could not close channel"))]
    CloseChannel { source: amiquip::Error },

    /// Closing the connection failed.
    #[snafu(display("could not close connection"))]
    CloseConnection { source: amiquip::Error },

    /// A publisher operation was called in the wrong state.
    #[snafu(display("cannot {} while {}", operation, state))]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}

impl Error {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        use self::Error::*;
        match self {
            InvalidUrl { .. }
            | UnsupportedScheme { .. }
            | UrlNotUtf8 { .. }
            | UnknownUrlParameter { .. }
            | InvalidUrlParameter { .. } => ErrorCategory::Configuration,
            TlsFeatureNotEnabled
            | ResolveAddress { .. }
            | NoAddresses { .. }
            | TcpConnect { .. }
            | Handshake { .. }
            | OpenChannel { .. }
            | CloseChannel { .. }
            | CloseConnection { .. } => ErrorCategory::Connection,
            #[cfg(feature = "native-tls")]
            TlsConnector { .. } => ErrorCategory::Connection,
            DeclareQueue { .. } | DeclareExchange { .. } | BindQueue { .. } => {
                ErrorCategory::Declaration
            }
            EnableConfirms { .. }
            | Publish { .. }
            | PublishNacked { .. }
            | ConfirmStreamClosed { .. } => ErrorCategory::Publish,
            WriteOutput { .. } => ErrorCategory::Output,
            InvalidState { .. } => ErrorCategory::State,
        }
    }

    /// Wrap this error so that displaying it also displays every underlying cause, separated by
    /// `": "`.
    pub fn report(&self) -> Report<'_> {
        Report(self)
    }
}

/// Display adapter returned by [`Error::report`](enum.Error.html#method.report).
pub struct Report<'a>(&'a Error);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = std::error::Error::source(self.0);
        while let Some(err) = source {
            write!(f, ": {}", err)?;
            source = err.source();
        }
        Ok(())
    }
}
