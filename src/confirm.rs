use crate::errors::*;
use amiquip::{Confirm, ConfirmSmoother};
use crossbeam_channel::Receiver;
use log::trace;

/// Waits for the broker to confirm messages one at a time.
///
/// Every publish on a channel in confirm mode is assigned the next delivery tag, starting at 1.
/// Because we wait after every publish, the confirm we are waiting for is always the one the
/// smoother hands out next.
pub(crate) struct ConfirmWaiter {
    receiver: Receiver<Confirm>,
    smoother: ConfirmSmoother,
}

impl ConfirmWaiter {
    pub(crate) fn new(receiver: Receiver<Confirm>) -> ConfirmWaiter {
        ConfirmWaiter {
            receiver,
            smoother: ConfirmSmoother::new(),
        }
    }

    /// Block until the broker acks or nacks the most recent publish (made for `id`).
    pub(crate) fn wait(&mut self, id: &str) -> Result<()> {
        loop {
            let raw = match self.receiver.recv() {
                Ok(raw) => raw,
                Err(_) => return ConfirmStreamClosedSnafu { id }.fail(),
            };
            trace!("raw confirm {:?} while waiting for {}", raw, id);
            // process() may return nothing if raw is out of order, but since we only have one
            // message in flight it will return at most one confirm
            if let Some(confirm) = self.smoother.process(raw).next() {
                return match confirm {
                    Confirm::Ack(_) => Ok(()),
                    Confirm::Nack(payload) => PublishNackedSnafu {
                        id,
                        delivery_tag: payload.delivery_tag,
                    }
                    .fail(),
                };
            }
        }
    }
}
