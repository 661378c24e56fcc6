use crate::errors::*;
use crate::{Broker, PublisherConfig, ReindexMessage};
use log::{debug, info, warn};
use snafu::ResultExt;
use std::fmt;
use std::io::Write;

// Queue and exchange must survive a broker restart along with the persistent messages in them.
const DURABLE: bool = true;

/// Where a [`Publisher`](struct.Publisher.html) is in its lifecycle.
///
/// States only ever advance: `Connected -> Declared -> Bound -> Publishing(n)`. There is no
/// disconnected state to observe: a `Publisher` only exists while connected, and
/// [`close`](struct.Publisher.html#method.close) consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Connected,
    Declared,
    Bound,
    /// `n` messages have been published.
    Publishing(usize),
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            State::Connected => write!(f, "connected"),
            State::Declared => write!(f, "declared"),
            State::Bound => write!(f, "bound"),
            State::Publishing(n) => write!(f, "publishing (after {} messages)", n),
        }
    }
}

/// Publishes reindex requests over a single broker connection.
pub struct Publisher<B: Broker> {
    broker: B,
    config: PublisherConfig,
    state: State,
}

impl<B: Broker> Publisher<B> {
    /// Connect using `connect`. Nothing is declared yet.
    pub fn connect<F>(config: PublisherConfig, connect: F) -> Result<Publisher<B>>
    where
        F: FnOnce(&PublisherConfig) -> Result<B>,
    {
        debug!("connecting to {}", config);
        let broker = connect(&config)?;
        Ok(Publisher {
            broker,
            config,
            state: State::Connected,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Declare the durable queue and the durable direct exchange.
    pub fn declare(&mut self) -> Result<()> {
        self.expect_state("declare", State::Connected)?;
        let queue = self.config.queue_name();
        let exchange = self.config.exchange_name();
        debug!("declaring queue {} and exchange {}", queue, exchange);
        self.broker.declare_queue(queue, DURABLE)?;
        self.broker.declare_direct_exchange(exchange, DURABLE)?;
        self.state = State::Declared;
        Ok(())
    }

    /// Bind the queue to the exchange, and enter confirm mode if configured to.
    pub fn bind(&mut self) -> Result<()> {
        self.expect_state("bind", State::Declared)?;
        let config = &self.config;
        debug!(
            "binding queue {} to exchange {} with routing key {}",
            config.queue_name(),
            config.exchange_name(),
            config.routing_key_name()
        );
        self.broker.bind_queue(
            config.queue_name(),
            config.exchange_name(),
            config.routing_key_name(),
        )?;
        if config.confirms_enabled() {
            self.broker.enable_confirms()?;
        }
        self.state = State::Bound;
        Ok(())
    }

    /// Publish the message for `id`, then write `Posted <id>` to `out`.
    pub fn publish<W: Write>(&mut self, id: &str, out: &mut W) -> Result<()> {
        let published = match self.state {
            State::Bound => 0,
            State::Publishing(n) => n,
            _ => return self.invalid_state("publish"),
        };

        let message = ReindexMessage::new(id, self.config.message_suffix());
        self.broker.publish(
            self.config.exchange_name(),
            self.config.routing_key_name(),
            &message,
        )?;
        self.state = State::Publishing(published + 1);

        writeln!(out, "Posted {}", id)
            .and_then(|()| out.flush())
            .context(WriteOutputSnafu { id })
    }

    /// Close the underlying connection.
    pub fn close(self) -> Result<()> {
        debug!("closing connection ({})", self.state);
        self.broker.close()
    }

    fn expect_state(&self, operation: &'static str, expected: State) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            self.invalid_state(operation)
        }
    }

    fn invalid_state<T>(&self, operation: &'static str) -> Result<T> {
        InvalidStateSnafu {
            operation,
            state: self.state.to_string(),
        }
        .fail()
    }
}

/// Connect, declare, bind, and publish one message per id, writing a `Posted` line to `out`
/// after each. Returns the number of messages published.
///
/// The connection is closed whether or not anything failed. If publishing failed, that error is
/// returned and any error from closing is only logged.
pub fn run<B, F, I, S, W>(
    config: PublisherConfig,
    connect: F,
    ids: I,
    out: &mut W,
) -> Result<usize>
where
    B: Broker,
    F: FnOnce(&PublisherConfig) -> Result<B>,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    W: Write,
{
    let mut publisher = Publisher::connect(config, connect)?;
    let result = publish_all(&mut publisher, ids, out);
    let close_result = publisher.close();
    match result {
        Ok(count) => {
            close_result?;
            info!("posted {} reindex request(s)", count);
            Ok(count)
        }
        Err(err) => {
            if let Err(close_err) = close_result {
                warn!("{}", close_err.report());
            }
            Err(err)
        }
    }
}

fn publish_all<B, I, S, W>(publisher: &mut Publisher<B>, ids: I, out: &mut W) -> Result<usize>
where
    B: Broker,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    W: Write,
{
    publisher.declare()?;
    publisher.bind()?;
    let mut count = 0;
    for id in ids {
        publisher.publish(id.as_ref(), out)?;
        count += 1;
    }
    Ok(count)
}
