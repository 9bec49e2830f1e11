use std::fmt;

use coppermq_codec::frame::{self, FieldTable, MethodFrameArgs};
use log::trace;

use crate::callback::{Callbacks, Entity, Event};
use crate::message::DeliveredMessage;

/// Hook receiving every message the server pushes to the consumer.
pub type DeliveryCallback = Box<dyn FnMut(&mut Consumer, &DeliveredMessage) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerStatus {
    /// Consume was sent, the server has not confirmed yet.
    Starting,
    Active,
    Cancelled,
}

/// A subscription on a queue, identified by its consumer tag.
///
/// The tag can be picked by the caller, generated locally or left empty so
/// the server assigns one in the consume confirmation.
pub struct Consumer {
    pub consumer_tag: String,
    pub no_ack: bool,
    pub exclusive: bool,
    pub no_local: bool,
    pub arguments: Option<FieldTable>,
    status: ConsumerStatus,
    pub(crate) callbacks: Callbacks<Consumer>,
    on_delivery: Option<DeliveryCallback>,
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("consumer_tag", &self.consumer_tag)
            .field("no_ack", &self.no_ack)
            .field("exclusive", &self.exclusive)
            .field("status", &self.status)
            .finish()
    }
}

impl Entity for Consumer {
    fn callbacks_mut(&mut self) -> &mut Callbacks<Self> {
        &mut self.callbacks
    }
}

impl Consumer {
    /// A consumer with a caller-picked tag, or an empty tag for a
    /// server-assigned one.
    pub fn new(consumer_tag: &str) -> Self {
        Self {
            consumer_tag: consumer_tag.to_string(),
            no_ack: false,
            exclusive: false,
            no_local: false,
            arguments: None,
            status: ConsumerStatus::Starting,
            callbacks: Callbacks::default(),
            on_delivery: None,
        }
    }

    /// A consumer with a locally generated, unique tag.
    pub fn with_generated_tag() -> Self {
        Consumer::new(&format!("coppermq-{}", rand::random::<u128>()))
    }

    pub fn no_ack(mut self, mode: bool) -> Self {
        self.no_ack = mode;
        self
    }

    pub fn exclusive(mut self, mode: bool) -> Self {
        self.exclusive = mode;
        self
    }

    pub fn no_local(mut self, mode: bool) -> Self {
        self.no_local = mode;
        self
    }

    pub fn arguments(mut self, arguments: FieldTable) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// Set the hook which receives the delivered messages.
    pub fn on_delivery(mut self, callback: DeliveryCallback) -> Self {
        self.on_delivery = Some(callback);
        self
    }

    pub fn status(&self) -> ConsumerStatus {
        self.status
    }

    pub(crate) fn consume_args(&self, queue_name: &str) -> frame::BasicConsumeArgs {
        let mut args = frame::BasicConsumeArgs::default()
            .queue(queue_name)
            .consumer_tag(&self.consumer_tag)
            .no_ack(self.no_ack)
            .exclusive(self.exclusive)
            .no_local(self.no_local);
        args.args = self.arguments.clone();

        args
    }

    pub(crate) fn handle_consume_ok(&mut self, args: frame::BasicConsumeOkArgs) {
        trace!("Consumer confirmed with tag {:?}", args.consumer_tag);

        if !args.consumer_tag.is_empty() {
            self.consumer_tag = args.consumer_tag.clone();
        }
        self.status = ConsumerStatus::Active;

        let reply = MethodFrameArgs::BasicConsumeOk(args);
        self.fire(Event::Consume, &reply);
    }

    /// Cancel confirmation, or a broker-initiated cancel when the queue
    /// goes away under the consumer.
    pub(crate) fn handle_cancelled(&mut self, reply: &MethodFrameArgs) {
        self.status = ConsumerStatus::Cancelled;
        self.fire(Event::Cancel, reply);
    }

    pub(crate) fn deliver(&mut self, message: &DeliveredMessage) {
        if let Some(mut hook) = self.on_delivery.take() {
            hook(self, message);

            // the hook may have installed a fresh one while it ran
            if self.on_delivery.is_none() {
                self.on_delivery = Some(hook);
            }
        }
    }
}
