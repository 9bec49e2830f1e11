//! Channel state machine: lifecycle, flow control, transactions and the
//! FIFO reply correlation for the entity operations running on it.
//!
//! AMQP guarantees that replies of a method class arrive on a channel in
//! the order the requests were sent, so every reply class has a FIFO of
//! pending entities and the head of the FIFO is always the one the next
//! reply belongs to. Pushing the entity always happens before the request
//! frame is handed to the transport.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use anyhow::Result;
use coppermq_codec::frame::{self, AMQPFrame, MethodFrameArgs};
use log::{debug, trace, warn};

use crate::callback::{Callback, Callbacks, Entity, Event};
use crate::client_error;
use crate::consumer::Consumer;
use crate::exchange::{Exchange, ExchangeType};
use crate::message::{self, Content, DeliveredMessage, GetMessage, MessageProperties, PublishedMessage, ReturnedMessage};
use crate::model::{ChannelError, ChannelNumber, ClassMethod, ConnectionError};
use crate::queue::Queue;
use crate::FrameSink;

/// Prefetch count applied when qos is requested without explicit values.
pub const DEFAULT_PREFETCH_COUNT: u16 = 32;

/// Method frame plus frame end, content header and body frames carry this
/// much besides the payload.
const FRAME_OVERHEAD: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelStatus {
    New,
    Opening,
    Opened,
    Closing,
    Closed,
}

/// Result of a single get operation.
#[derive(Debug)]
pub enum GetSignal {
    GetOk(Box<GetMessage>),
    GetEmpty,
}

/// Hook resolving a single get, either with a message or empty-handed.
pub type GetCallback = Box<dyn FnOnce(&mut Channel, GetSignal) + Send>;

/// Hook receiving the messages the server returned as unroutable.
pub type ReturnCallback = Box<dyn FnMut(&mut Channel, &ReturnedMessage) + Send>;

pub(crate) struct PendingGet {
    pub(crate) queue_name: String,
    on_response: Option<GetCallback>,
}

impl fmt::Debug for PendingGet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PendingGet({})", self.queue_name)
    }
}

/// One FIFO per reply class. The entity pushed at request time is popped
/// when the confirmation of that class arrives.
#[derive(Debug, Default)]
pub(crate) struct AwaitingReplies {
    pub(crate) queue_declare: VecDeque<Queue>,
    pub(crate) queue_bind: VecDeque<String>,
    pub(crate) queue_unbind: VecDeque<String>,
    pub(crate) queue_purge: VecDeque<String>,
    pub(crate) queue_delete: VecDeque<String>,
    pub(crate) consume: VecDeque<Consumer>,
    pub(crate) cancel: VecDeque<String>,
    pub(crate) get: VecDeque<PendingGet>,
    pub(crate) exchange_declare: VecDeque<Exchange>,
    pub(crate) exchange_delete: VecDeque<String>,
}

impl AwaitingReplies {
    fn clear(&mut self) {
        self.queue_declare.clear();
        self.queue_bind.clear();
        self.queue_unbind.clear();
        self.queue_purge.clear();
        self.queue_delete.clear();
        self.consume.clear();
        self.cancel.clear();
        self.get.clear();
        self.exchange_declare.clear();
        self.exchange_delete.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue_declare.is_empty()
            && self.queue_bind.is_empty()
            && self.queue_unbind.is_empty()
            && self.queue_purge.is_empty()
            && self.queue_delete.is_empty()
            && self.consume.is_empty()
            && self.cancel.is_empty()
            && self.get.is_empty()
            && self.exchange_declare.is_empty()
            && self.exchange_delete.is_empty()
    }
}

/// The recipient a reassembled content belongs to.
#[derive(Debug)]
enum IncomingKind {
    Delivered {
        consumer_tag: String,
        delivery_tag: u64,
        redelivered: bool,
        exchange: String,
        routing_key: String,
    },
    Get {
        awaiter: Option<PendingGet>,
        delivery_tag: u64,
        redelivered: bool,
        exchange: String,
        routing_key: String,
        message_count: u32,
    },
    Returned {
        reply_code: u16,
        reply_text: String,
        exchange: String,
        routing_key: String,
    },
}

#[derive(Debug)]
struct IncomingContent {
    kind: IncomingKind,
    properties: MessageProperties,
    body_size: u64,
    body: Vec<u8>,
}

impl IncomingContent {
    fn new(kind: IncomingKind) -> Self {
        Self {
            kind,
            properties: MessageProperties::default(),
            body_size: 0,
            body: Vec::new(),
        }
    }
}

/// A channel assembles at most one inbound content at a time: the
/// content-bearing method puts it into the awaiting-header state, the
/// header brings the body size and the body frames fill it up.
#[derive(Debug, Default)]
enum ContentState {
    #[default]
    Idle,
    AwaitingHeader(IncomingContent),
    AwaitingBody(IncomingContent),
}

/// A single AMQP channel multiplexed over the connection.
pub struct Channel {
    id: ChannelNumber,
    status: ChannelStatus,
    flow_is_active: bool,
    frame_max: u32,
    outgoing: FrameSink,
    queues: HashMap<String, Queue>,
    exchanges: HashMap<String, Exchange>,
    consumers: HashMap<String, Consumer>,
    pub(crate) awaiting: AwaitingReplies,
    content: ContentState,
    pub(crate) callbacks: Callbacks<Channel>,
    on_return: Option<ReturnCallback>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("flow_is_active", &self.flow_is_active)
            .field("queues", &self.queues.len())
            .field("exchanges", &self.exchanges.len())
            .field("consumers", &self.consumers.len())
            .finish()
    }
}

impl Entity for Channel {
    fn callbacks_mut(&mut self) -> &mut Callbacks<Self> {
        &mut self.callbacks
    }
}

impl Channel {
    pub(crate) fn new(id: ChannelNumber, outgoing: FrameSink, frame_max: u32) -> Self {
        Self {
            id,
            status: ChannelStatus::New,
            flow_is_active: true,
            frame_max,
            outgoing,
            queues: HashMap::new(),
            exchanges: HashMap::new(),
            consumers: HashMap::new(),
            awaiting: AwaitingReplies::default(),
            content: ContentState::default(),
            callbacks: Callbacks::default(),
            on_return: None,
        }
    }

    pub fn id(&self) -> ChannelNumber {
        self.id
    }

    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    pub fn is_flow_active(&self) -> bool {
        self.flow_is_active
    }

    pub fn queue(&self, name: &str) -> Option<&Queue> {
        self.queues.get(name)
    }

    pub fn exchange(&self, name: &str) -> Option<&Exchange> {
        self.exchanges.get(name)
    }

    pub fn consumer(&self, consumer_tag: &str) -> Option<&Consumer> {
        self.consumers.get(consumer_tag)
    }

    /// Hook receiving messages returned as unroutable by the server.
    pub fn set_on_return(&mut self, callback: ReturnCallback) {
        self.on_return = Some(callback);
    }

    fn send(&self, frame: AMQPFrame) -> Result<()> {
        crate::send_frame(&self.outgoing, frame)
    }

    fn send_all(&self, frames: Vec<AMQPFrame>) -> Result<()> {
        crate::send_frames(&self.outgoing, frames)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.status != ChannelStatus::Opened {
            return client_error!(
                Some(self.id),
                ConnectionError::ChannelError.into(),
                "Channel is not open",
                0
            );
        }

        Ok(())
    }

    fn max_body_payload(&self) -> usize {
        std::cmp::max(1, (self.frame_max as usize).saturating_sub(FRAME_OVERHEAD))
    }

    // Channel scoped operations

    pub(crate) fn open(&mut self, callback: Option<Callback<Channel>>) -> Result<()> {
        if let Some(cb) = callback {
            self.once(Event::Open, cb);
        }

        self.send(frame::channel_open(self.id))?;
        self.status = ChannelStatus::Opening;

        Ok(())
    }

    /// Close the channel with the default success report.
    pub fn close(&mut self, callback: Option<Callback<Channel>>) -> Result<()> {
        self.close_with(ChannelError::Success.into(), "Goodbye", 0, callback)
    }

    /// Close the channel with an explicit reply code, text and the method
    /// which provoked the close.
    pub fn close_with(
        &mut self,
        code: u16,
        text: &str,
        class_method: ClassMethod,
        callback: Option<Callback<Channel>>,
    ) -> Result<()> {
        self.ensure_open()?;

        if let Some(cb) = callback {
            self.once(Event::Close, cb);
        }

        self.send(frame::channel_close(self.id, code, text, class_method))?;
        self.status = ChannelStatus::Closing;

        Ok(())
    }

    pub fn flow(&mut self, active: bool, callback: Option<Callback<Channel>>) -> Result<()> {
        self.ensure_open()?;

        if let Some(cb) = callback {
            self.once(Event::Flow, cb);
        }

        self.send(frame::ChannelFlowArgs::default().active(active).frame(self.id))
    }

    /// Ask the server to limit deliveries; `None` applies the default
    /// prefetch window.
    pub fn qos(&mut self, qos: Option<frame::BasicQosArgs>, callback: Option<Callback<Channel>>) -> Result<()> {
        self.ensure_open()?;

        if let Some(cb) = callback {
            self.once(Event::Qos, cb);
        }

        let args = qos.unwrap_or_else(|| frame::BasicQosArgs::default().prefetch_count(DEFAULT_PREFETCH_COUNT));

        self.send(args.frame(self.id))
    }

    pub fn recover(&mut self, requeue: bool, callback: Option<Callback<Channel>>) -> Result<()> {
        self.ensure_open()?;

        if let Some(cb) = callback {
            self.once(Event::Recover, cb);
        }

        self.send(frame::BasicRecoverArgs::default().requeue(requeue).frame(self.id))
    }

    pub fn tx_select(&mut self, callback: Option<Callback<Channel>>) -> Result<()> {
        self.ensure_open()?;

        if let Some(cb) = callback {
            self.once(Event::TxSelect, cb);
        }

        self.send(frame::tx_select(self.id))
    }

    pub fn tx_commit(&mut self, callback: Option<Callback<Channel>>) -> Result<()> {
        self.ensure_open()?;

        if let Some(cb) = callback {
            self.once(Event::TxCommit, cb);
        }

        self.send(frame::tx_commit(self.id))
    }

    pub fn tx_rollback(&mut self, callback: Option<Callback<Channel>>) -> Result<()> {
        self.ensure_open()?;

        if let Some(cb) = callback {
            self.once(Event::TxRollback, cb);
        }

        self.send(frame::tx_rollback(self.id))
    }

    /// Put the channel into confirm mode. Publish confirmations arrive
    /// through the `Ack` event.
    pub fn confirm_select(&mut self, callback: Option<Callback<Channel>>) -> Result<()> {
        self.ensure_open()?;

        if let Some(cb) = callback {
            self.once(Event::Confirm, cb);
        }

        self.send(frame::confirm_select(self.id))
    }

    pub fn basic_ack(&mut self, delivery_tag: u64, multiple: bool) -> Result<()> {
        self.ensure_open()?;

        self.send(
            frame::BasicAckArgs::default()
                .delivery_tag(delivery_tag)
                .multiple(multiple)
                .frame(self.id),
        )
    }

    pub fn basic_reject(&mut self, delivery_tag: u64, requeue: bool) -> Result<()> {
        self.ensure_open()?;

        self.send(
            frame::BasicRejectArgs::default()
                .delivery_tag(delivery_tag)
                .requeue(requeue)
                .frame(self.id),
        )
    }

    pub fn basic_nack(&mut self, delivery_tag: u64, multiple: bool, requeue: bool) -> Result<()> {
        self.ensure_open()?;

        self.send(
            frame::BasicNackArgs::default()
                .delivery_tag(delivery_tag)
                .multiple(multiple)
                .requeue(requeue)
                .frame(self.id),
        )
    }

    /// Publish a message, cutting the body into as many frames as the
    /// negotiated frame size requires.
    pub fn basic_publish(&mut self, exchange: &str, routing_key: &str, message: PublishedMessage) -> Result<()> {
        self.ensure_open()?;

        if !self.flow_is_active {
            debug!("Publishing on channel {} while flow is stopped", self.id);
        }

        let args = frame::BasicPublishArgs::new(exchange)
            .routing_key(routing_key)
            .mandatory(message.mandatory)
            .immediate(message.immediate);

        let class_id = (frame::BASIC_PUBLISH >> 16) as u16;
        let (header, bodies) = message::to_content_frames(self.id, class_id, message.message, self.max_body_payload());

        let mut frames = Vec::with_capacity(bodies.len() + 2);
        frames.push(args.frame(self.id));
        frames.push(header.frame());
        frames.extend(bodies.into_iter().map(|b| b.frame()));

        self.send_all(frames)
    }

    // Entity delegated operations, all of them enqueue the entity before
    // the request frame goes out.

    pub fn queue_declare(&mut self, mut queue: Queue, callback: Option<Callback<Queue>>) -> Result<()> {
        self.ensure_open()?;

        if let Some(cb) = callback {
            queue.once(Event::Declare, cb);
        }

        let args = queue.declare_args();

        self.awaiting.queue_declare.push_back(queue);
        self.send(args.frame(self.id))
    }

    pub fn queue_bind(
        &mut self,
        queue_name: &str,
        exchange_name: &str,
        routing_key: &str,
        callback: Option<Callback<Queue>>,
    ) -> Result<()> {
        self.ensure_open()?;

        let queue = self
            .queues
            .entry(queue_name.to_string())
            .or_insert_with(|| Queue::new(queue_name));

        if let Some(cb) = callback {
            queue.once(Event::Bind, cb);
        }

        self.awaiting.queue_bind.push_back(queue_name.to_string());
        self.send(
            frame::QueueBindArgs::new(queue_name, exchange_name)
                .routing_key(routing_key)
                .frame(self.id),
        )
    }

    pub fn queue_unbind(
        &mut self,
        queue_name: &str,
        exchange_name: &str,
        routing_key: &str,
        callback: Option<Callback<Queue>>,
    ) -> Result<()> {
        self.ensure_open()?;

        let queue = self
            .queues
            .entry(queue_name.to_string())
            .or_insert_with(|| Queue::new(queue_name));

        if let Some(cb) = callback {
            queue.once(Event::Unbind, cb);
        }

        self.awaiting.queue_unbind.push_back(queue_name.to_string());
        self.send(
            frame::QueueUnbindArgs::new(queue_name, exchange_name)
                .routing_key(routing_key)
                .frame(self.id),
        )
    }

    pub fn queue_purge(&mut self, queue_name: &str, callback: Option<Callback<Queue>>) -> Result<()> {
        self.ensure_open()?;

        let queue = self
            .queues
            .entry(queue_name.to_string())
            .or_insert_with(|| Queue::new(queue_name));

        if let Some(cb) = callback {
            queue.once(Event::Purge, cb);
        }

        self.awaiting.queue_purge.push_back(queue_name.to_string());
        self.send(frame::QueuePurgeArgs::default().queue_name(queue_name).frame(self.id))
    }

    pub fn queue_delete(
        &mut self,
        queue_name: &str,
        if_unused: bool,
        if_empty: bool,
        callback: Option<Callback<Queue>>,
    ) -> Result<()> {
        self.ensure_open()?;

        let queue = self
            .queues
            .entry(queue_name.to_string())
            .or_insert_with(|| Queue::new(queue_name));

        if let Some(cb) = callback {
            queue.once(Event::Delete, cb);
        }

        self.awaiting.queue_delete.push_back(queue_name.to_string());
        self.send(
            frame::QueueDeleteArgs::default()
                .queue_name(queue_name)
                .if_unused(if_unused)
                .if_empty(if_empty)
                .frame(self.id),
        )
    }

    pub fn exchange_declare(&mut self, mut exchange: Exchange, callback: Option<Callback<Exchange>>) -> Result<()> {
        self.ensure_open()?;

        if let Some(cb) = callback {
            exchange.once(Event::Declare, cb);
        }

        let args = exchange.declare_args();

        self.awaiting.exchange_declare.push_back(exchange);
        self.send(args.frame(self.id))
    }

    pub fn exchange_delete(
        &mut self,
        exchange_name: &str,
        if_unused: bool,
        callback: Option<Callback<Exchange>>,
    ) -> Result<()> {
        self.ensure_open()?;

        let exchange = self
            .exchanges
            .entry(exchange_name.to_string())
            .or_insert_with(|| Exchange::new(exchange_name, ExchangeType::Direct));

        if let Some(cb) = callback {
            exchange.once(Event::Delete, cb);
        }

        self.awaiting.exchange_delete.push_back(exchange_name.to_string());
        self.send(
            frame::ExchangeDeleteArgs::default()
                .exchange_name(exchange_name)
                .if_unused(if_unused)
                .frame(self.id),
        )
    }

    pub fn basic_consume(
        &mut self,
        queue_name: &str,
        mut consumer: Consumer,
        callback: Option<Callback<Consumer>>,
    ) -> Result<()> {
        self.ensure_open()?;

        if let Some(cb) = callback {
            consumer.once(Event::Consume, cb);
        }

        let args = consumer.consume_args(queue_name);

        self.awaiting.consume.push_back(consumer);
        self.send(args.frame(self.id))
    }

    pub fn basic_cancel(&mut self, consumer_tag: &str, callback: Option<Callback<Consumer>>) -> Result<()> {
        self.ensure_open()?;

        match self.consumers.get_mut(consumer_tag) {
            Some(consumer) => {
                if let Some(cb) = callback {
                    consumer.once(Event::Cancel, cb);
                }
            }
            None => {
                return client_error!(
                    Some(self.id),
                    ChannelError::NotFound.into(),
                    "No consumer with this tag",
                    frame::BASIC_CANCEL
                )
            }
        }

        self.awaiting.cancel.push_back(consumer_tag.to_string());
        self.send(frame::BasicCancelArgs::new(consumer_tag).frame(self.id))
    }

    pub fn basic_get(&mut self, queue_name: &str, no_ack: bool, on_response: GetCallback) -> Result<()> {
        self.ensure_open()?;

        self.awaiting.get.push_back(PendingGet {
            queue_name: queue_name.to_string(),
            on_response: Some(on_response),
        });
        self.send(frame::BasicGetArgs::new(queue_name).no_ack(no_ack).frame(self.id))
    }

    // Handlers of the frames the server sends on this channel

    pub(crate) fn handle_open_ok(&mut self) -> Result<()> {
        self.status = ChannelStatus::Opened;
        self.fire(Event::Open, &MethodFrameArgs::ChannelOpenOk);

        Ok(())
    }

    pub(crate) fn handle_close_ok(&mut self) -> Result<()> {
        self.status = ChannelStatus::Closed;
        self.fire(Event::Close, &MethodFrameArgs::ChannelCloseOk);
        self.reset_state();

        Ok(())
    }

    /// The server closed the channel, reporting the offending method and
    /// the reason. The error hook fires with the decoded close method,
    /// the close is confirmed and the channel state is dropped.
    pub(crate) fn handle_close(&mut self, args: frame::ChannelCloseArgs) -> Result<()> {
        debug!(
            "Channel {} closed by the server: {} {}",
            self.id, args.code, args.text
        );

        self.status = ChannelStatus::Closed;

        let reply = MethodFrameArgs::ChannelClose(args);
        self.fire(Event::Error, &reply);

        self.send(frame::channel_close_ok(self.id))?;
        self.reset_state();

        Ok(())
    }

    pub(crate) fn handle_flow(&mut self, args: frame::ChannelFlowArgs) -> Result<()> {
        self.flow_is_active = args.active;

        let reply = MethodFrameArgs::ChannelFlow(args);
        self.fire(Event::Flow, &reply);

        self.send(frame::ChannelFlowOkArgs::new(self.flow_is_active).frame(self.id))
    }

    pub(crate) fn handle_flow_ok(&mut self, args: frame::ChannelFlowOkArgs) -> Result<()> {
        self.flow_is_active = args.active;

        let reply = MethodFrameArgs::ChannelFlowOk(args);
        self.fire(Event::Flow, &reply);

        Ok(())
    }

    pub(crate) fn handle_qos_ok(&mut self) -> Result<()> {
        self.fire(Event::Qos, &MethodFrameArgs::BasicQosOk);

        Ok(())
    }

    pub(crate) fn handle_recover_ok(&mut self) -> Result<()> {
        self.fire(Event::Recover, &MethodFrameArgs::BasicRecoverOk);

        Ok(())
    }

    pub(crate) fn handle_tx_select_ok(&mut self) -> Result<()> {
        self.fire(Event::TxSelect, &MethodFrameArgs::TxSelectOk);

        Ok(())
    }

    pub(crate) fn handle_tx_commit_ok(&mut self) -> Result<()> {
        self.fire(Event::TxCommit, &MethodFrameArgs::TxCommitOk);

        Ok(())
    }

    pub(crate) fn handle_tx_rollback_ok(&mut self) -> Result<()> {
        self.fire(Event::TxRollback, &MethodFrameArgs::TxRollbackOk);

        Ok(())
    }

    pub(crate) fn handle_confirm_select_ok(&mut self) -> Result<()> {
        self.fire(Event::Confirm, &MethodFrameArgs::ConfirmSelectOk);

        Ok(())
    }

    /// Publish confirmation in confirm mode.
    pub(crate) fn handle_basic_ack(&mut self, args: frame::BasicAckArgs) -> Result<()> {
        let reply = MethodFrameArgs::BasicAck(args);
        self.fire(Event::Ack, &reply);

        Ok(())
    }

    pub(crate) fn handle_queue_declare_ok(&mut self, args: frame::QueueDeclareOkArgs) -> Result<()> {
        match self.awaiting.queue_declare.pop_front() {
            Some(mut queue) => {
                queue.handle_declare_ok(args);
                self.queues.insert(queue.name.clone(), queue);
            }
            None => warn!("Queue declare confirmed on channel {} without a pending declare", self.id),
        }

        Ok(())
    }

    pub(crate) fn handle_queue_bind_ok(&mut self) -> Result<()> {
        match self.awaiting.queue_bind.pop_front() {
            Some(name) => {
                if let Some(queue) = self.queues.get_mut(&name) {
                    queue.handle_bind_ok();
                }
            }
            None => warn!("Queue bind confirmed on channel {} without a pending bind", self.id),
        }

        Ok(())
    }

    pub(crate) fn handle_queue_unbind_ok(&mut self) -> Result<()> {
        match self.awaiting.queue_unbind.pop_front() {
            Some(name) => {
                if let Some(queue) = self.queues.get_mut(&name) {
                    queue.handle_unbind_ok();
                }
            }
            None => warn!("Queue unbind confirmed on channel {} without a pending unbind", self.id),
        }

        Ok(())
    }

    pub(crate) fn handle_queue_purge_ok(&mut self, args: frame::QueuePurgeOkArgs) -> Result<()> {
        match self.awaiting.queue_purge.pop_front() {
            Some(name) => {
                if let Some(queue) = self.queues.get_mut(&name) {
                    queue.handle_purge_ok(args);
                }
            }
            None => warn!("Queue purge confirmed on channel {} without a pending purge", self.id),
        }

        Ok(())
    }

    pub(crate) fn handle_queue_delete_ok(&mut self, args: frame::QueueDeleteOkArgs) -> Result<()> {
        match self.awaiting.queue_delete.pop_front() {
            Some(name) => {
                if let Some(mut queue) = self.queues.remove(&name) {
                    queue.handle_delete_ok(args);
                }
            }
            None => warn!("Queue delete confirmed on channel {} without a pending delete", self.id),
        }

        Ok(())
    }

    pub(crate) fn handle_exchange_declare_ok(&mut self) -> Result<()> {
        match self.awaiting.exchange_declare.pop_front() {
            Some(mut exchange) => {
                exchange.handle_declare_ok();
                self.exchanges.insert(exchange.name.clone(), exchange);
            }
            None => warn!(
                "Exchange declare confirmed on channel {} without a pending declare",
                self.id
            ),
        }

        Ok(())
    }

    pub(crate) fn handle_exchange_delete_ok(&mut self) -> Result<()> {
        match self.awaiting.exchange_delete.pop_front() {
            Some(name) => {
                if let Some(mut exchange) = self.exchanges.remove(&name) {
                    exchange.handle_delete_ok();
                }
            }
            None => warn!(
                "Exchange delete confirmed on channel {} without a pending delete",
                self.id
            ),
        }

        Ok(())
    }

    pub(crate) fn handle_consume_ok(&mut self, args: frame::BasicConsumeOkArgs) -> Result<()> {
        match self.awaiting.consume.pop_front() {
            Some(mut consumer) => {
                consumer.handle_consume_ok(args);
                self.consumers.insert(consumer.consumer_tag.clone(), consumer);
            }
            None => warn!("Consume confirmed on channel {} without a pending consume", self.id),
        }

        Ok(())
    }

    pub(crate) fn handle_cancel_ok(&mut self, args: frame::BasicCancelOkArgs) -> Result<()> {
        match self.awaiting.cancel.pop_front() {
            Some(tag) => {
                if let Some(mut consumer) = self.consumers.remove(&tag) {
                    consumer.handle_cancelled(&MethodFrameArgs::BasicCancelOk(args));
                }
            }
            None => warn!("Cancel confirmed on channel {} without a pending cancel", self.id),
        }

        Ok(())
    }

    /// The server cancelled the consumer, for example because its queue
    /// was deleted.
    pub(crate) fn handle_basic_cancel(&mut self, args: frame::BasicCancelArgs) -> Result<()> {
        let no_wait = args.no_wait;
        let tag = args.consumer_tag.clone();

        if let Some(mut consumer) = self.consumers.remove(&tag) {
            consumer.handle_cancelled(&MethodFrameArgs::BasicCancel(args));
        }

        if !no_wait {
            self.send(frame::BasicCancelOkArgs::new(&tag).frame(self.id))?;
        }

        Ok(())
    }

    pub(crate) fn handle_basic_deliver(&mut self, args: frame::BasicDeliverArgs) -> Result<()> {
        self.content = ContentState::AwaitingHeader(IncomingContent::new(IncomingKind::Delivered {
            consumer_tag: args.consumer_tag,
            delivery_tag: args.delivery_tag,
            redelivered: args.redelivered,
            exchange: args.exchange_name,
            routing_key: args.routing_key,
        }));

        Ok(())
    }

    pub(crate) fn handle_basic_get_ok(&mut self, args: frame::BasicGetOkArgs) -> Result<()> {
        let awaiter = self.awaiting.get.pop_front();

        if awaiter.is_none() {
            warn!("GetOk on channel {} without a pending get", self.id);
        }

        self.content = ContentState::AwaitingHeader(IncomingContent::new(IncomingKind::Get {
            awaiter,
            delivery_tag: args.delivery_tag,
            redelivered: args.redelivered,
            exchange: args.exchange_name,
            routing_key: args.routing_key,
            message_count: args.message_count,
        }));

        Ok(())
    }

    pub(crate) fn handle_basic_get_empty(&mut self) -> Result<()> {
        match self.awaiting.get.pop_front() {
            Some(mut pending) => {
                if let Some(on_response) = pending.on_response.take() {
                    on_response(self, GetSignal::GetEmpty);
                }
            }
            None => warn!("GetEmpty on channel {} without a pending get", self.id),
        }

        Ok(())
    }

    pub(crate) fn handle_basic_return(&mut self, args: frame::BasicReturnArgs) -> Result<()> {
        self.content = ContentState::AwaitingHeader(IncomingContent::new(IncomingKind::Returned {
            reply_code: args.reply_code,
            reply_text: args.reply_text,
            exchange: args.exchange_name,
            routing_key: args.routing_key,
        }));

        Ok(())
    }

    // Content assembly

    pub(crate) fn content_idle(&self) -> bool {
        matches!(self.content, ContentState::Idle)
    }

    /// A method frame showed up in the middle of a content. The content is
    /// dropped and the channel is closed reporting the unexpected frame.
    pub(crate) fn interrupt_content(&mut self, offender: ClassMethod) -> Result<()> {
        warn!("Method {:08X} interleaved a content on channel {}", offender, self.id);

        self.content = ContentState::Idle;

        if self.status != ChannelStatus::Opened {
            return Ok(());
        }

        self.close_with(
            ConnectionError::UnexpectedFrame.into(),
            "UNEXPECTED_FRAME",
            offender,
            None,
        )
    }

    /// Returns false if no content-bearing method preceded the header, in
    /// which case the connection must treat it as a protocol violation.
    pub(crate) fn handle_content_header(&mut self, header: frame::ContentHeaderFrame) -> bool {
        match std::mem::take(&mut self.content) {
            ContentState::AwaitingHeader(mut content) => {
                content.body_size = header.body_size;
                content.properties = MessageProperties::from(header);

                if content.body_size == 0 {
                    self.complete_content(content);
                } else {
                    self.content = ContentState::AwaitingBody(content);
                }

                true
            }
            state => {
                self.content = state;
                false
            }
        }
    }

    /// Returns false on a body frame without a pending content or on more
    /// body bytes than the header announced.
    pub(crate) fn handle_content_body(&mut self, body: frame::ContentBodyFrame) -> bool {
        match std::mem::take(&mut self.content) {
            ContentState::AwaitingBody(mut content) => {
                content.body.extend_from_slice(&body.body);

                if (content.body.len() as u64) > content.body_size {
                    return false;
                }

                if (content.body.len() as u64) == content.body_size {
                    self.complete_content(content);
                } else {
                    self.content = ContentState::AwaitingBody(content);
                }

                true
            }
            state => {
                self.content = state;
                false
            }
        }
    }

    fn complete_content(&mut self, content: IncomingContent) {
        let message = Content {
            body: content.body,
            properties: content.properties,
        };

        match content.kind {
            IncomingKind::Delivered {
                consumer_tag,
                delivery_tag,
                redelivered,
                exchange,
                routing_key,
            } => {
                let delivery = DeliveredMessage {
                    message,
                    consumer_tag: consumer_tag.clone(),
                    delivery_tag,
                    redelivered,
                    exchange,
                    routing_key,
                };

                match self.consumers.get_mut(&consumer_tag) {
                    Some(consumer) => consumer.deliver(&delivery),
                    None => trace!("Delivery for unknown consumer {:?} dropped", consumer_tag),
                }
            }
            IncomingKind::Get {
                awaiter,
                delivery_tag,
                redelivered,
                exchange,
                routing_key,
                message_count,
            } => {
                let get_message = GetMessage {
                    message,
                    delivery_tag,
                    redelivered,
                    exchange,
                    routing_key,
                    message_count,
                };

                if let Some(mut pending) = awaiter {
                    if let Some(on_response) = pending.on_response.take() {
                        on_response(self, GetSignal::GetOk(Box::new(get_message)));
                    }
                }
            }
            IncomingKind::Returned {
                reply_code,
                reply_text,
                exchange,
                routing_key,
            } => {
                let returned = ReturnedMessage {
                    message,
                    reply_code,
                    reply_text,
                    exchange,
                    routing_key,
                };

                if let Some(mut hook) = self.on_return.take() {
                    hook(self, &returned);

                    if self.on_return.is_none() {
                        self.on_return = Some(hook);
                    }
                }
            }
        }
    }

    /// Drop everything the channel accumulated: pending continuations are
    /// discarded, hooks are dropped and flow goes back to active. Invoked
    /// on every transition to the closed state, including connection
    /// interruption, and safe to run repeatedly.
    pub(crate) fn reset_state(&mut self) {
        self.flow_is_active = true;
        self.awaiting.clear();
        self.callbacks.clear();
        self.content = ContentState::Idle;
        self.on_return = None;
        self.queues.clear();
        self.exchanges.clear();
        self.consumers.clear();
    }

    pub(crate) fn handle_connection_interruption(&mut self) {
        self.status = ChannelStatus::Closed;
        self.reset_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coppermq_codec::codec::Frame;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn new_channel() -> (Channel, UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();

        (Channel::new(1, tx, 131_072), rx)
    }

    fn opened_channel() -> (Channel, UnboundedReceiver<Frame>) {
        let (mut channel, mut rx) = new_channel();

        channel.open(None).unwrap();
        channel.handle_open_ok().unwrap();

        // drop the open frame, the tests care about what comes after
        rx.try_recv().unwrap();

        (channel, rx)
    }

    fn next_method(rx: &mut UnboundedReceiver<Frame>) -> (ChannelNumber, frame::ClassMethod, MethodFrameArgs) {
        match rx.try_recv().unwrap() {
            Frame::Frame(AMQPFrame::Method(ch, cm, args)) => (ch, cm, args),
            other => panic!("expected a method frame, got {:?}", other),
        }
    }

    #[test]
    fn open_walks_through_the_lifecycle() {
        let (mut channel, mut rx) = new_channel();
        let opened = Arc::new(Mutex::new(0));
        let hits = opened.clone();

        assert_eq!(ChannelStatus::New, channel.status());

        channel
            .open(Some(Box::new(move |_, reply| {
                assert!(matches!(reply, MethodFrameArgs::ChannelOpenOk));
                *hits.lock().unwrap() += 1;
            })))
            .unwrap();

        assert_eq!(ChannelStatus::Opening, channel.status());

        let (ch, cm, _) = next_method(&mut rx);
        assert_eq!((1, frame::CHANNEL_OPEN), (ch, cm));

        channel.handle_open_ok().unwrap();

        assert_eq!(ChannelStatus::Opened, channel.status());
        assert_eq!(1, *opened.lock().unwrap());

        // a stray second confirmation does not re-run the one-shot hook
        channel.handle_open_ok().unwrap();
        assert_eq!(1, *opened.lock().unwrap());
    }

    #[test]
    fn operations_fail_on_an_unopened_channel() {
        let (mut channel, _rx) = new_channel();

        let err = channel.queue_declare(Queue::new("inbox"), None).unwrap_err();
        let client_error = err.downcast_ref::<crate::error::ClientError>().unwrap();

        assert_eq!(Some(1), client_error.channel);
        assert_eq!(504, client_error.code);
    }

    #[test]
    fn declare_confirmations_pop_in_request_order() {
        let (mut channel, mut rx) = opened_channel();
        let names = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let sink = names.clone();
            channel
                .queue_declare(
                    Queue::new(""),
                    Some(Box::new(move |queue, _| {
                        sink.lock().unwrap().push(queue.name.clone());
                    })),
                )
                .unwrap();
        }

        assert_eq!(2, channel.awaiting.queue_declare.len());
        assert!(matches!(next_method(&mut rx), (1, frame::QUEUE_DECLARE, _)));
        assert!(matches!(next_method(&mut rx), (1, frame::QUEUE_DECLARE, _)));

        channel
            .handle_queue_declare_ok(frame::QueueDeclareOkArgs::default().name("amq.gen-1"))
            .unwrap();
        channel
            .handle_queue_declare_ok(frame::QueueDeclareOkArgs::default().name("amq.gen-2"))
            .unwrap();

        assert_eq!(vec!["amq.gen-1", "amq.gen-2"], *names.lock().unwrap());
        assert!(channel.queue("amq.gen-1").is_some());
        assert!(channel.queue("amq.gen-2").is_some());
        assert!(channel.awaiting.queue_declare.is_empty());
    }

    #[test]
    fn broker_close_reports_and_resets() {
        let (mut channel, mut rx) = opened_channel();
        let error = Arc::new(Mutex::new(None));
        let sink = error.clone();

        channel.queue_declare(Queue::new("a"), None).unwrap();
        channel.queue_declare(Queue::new("b"), None).unwrap();

        channel.once(
            Event::Error,
            Box::new(move |_, reply| {
                if let MethodFrameArgs::ChannelClose(args) = reply {
                    *sink.lock().unwrap() = Some((args.code, args.text.clone(), args.class_id, args.method_id));
                }
            }),
        );

        channel
            .handle_close(frame::ChannelCloseArgs {
                code: 406,
                text: "PRECONDITION_FAILED".to_string(),
                class_id: 50,
                method_id: 10,
            })
            .unwrap();

        assert_eq!(
            Some((406, "PRECONDITION_FAILED".to_string(), 50, 10)),
            *error.lock().unwrap()
        );
        assert_eq!(ChannelStatus::Closed, channel.status());
        assert!(channel.awaiting.is_empty());
        assert!(channel.callbacks.is_empty());

        // two declares went out, then the close confirmation
        assert!(matches!(next_method(&mut rx), (1, frame::QUEUE_DECLARE, _)));
        assert!(matches!(next_method(&mut rx), (1, frame::QUEUE_DECLARE, _)));
        assert!(matches!(next_method(&mut rx), (1, frame::CHANNEL_CLOSE_OK, _)));
    }

    #[test]
    fn server_flow_stops_and_replies() {
        let (mut channel, mut rx) = opened_channel();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();

        channel.on(
            Event::Flow,
            Box::new(move |_, reply| {
                if let MethodFrameArgs::ChannelFlow(args) = reply {
                    *sink.lock().unwrap() = Some(args.active);
                }
            }),
        );

        channel
            .handle_flow(frame::ChannelFlowArgs { active: false })
            .unwrap();

        assert!(!channel.is_flow_active());
        assert_eq!(Some(false), *seen.lock().unwrap());

        match next_method(&mut rx) {
            (1, frame::CHANNEL_FLOW_OK, MethodFrameArgs::ChannelFlowOk(args)) => assert!(!args.active),
            other => panic!("expected flow-ok, got {:?}", other),
        }
    }

    #[test]
    fn transaction_callbacks_fire_in_order() {
        let (mut channel, _rx) = opened_channel();
        let order = Arc::new(Mutex::new(Vec::new()));

        let sink = order.clone();
        channel
            .tx_select(Some(Box::new(move |_, _| sink.lock().unwrap().push("select"))))
            .unwrap();
        channel.handle_tx_select_ok().unwrap();

        let sink = order.clone();
        channel
            .tx_commit(Some(Box::new(move |_, _| sink.lock().unwrap().push("commit"))))
            .unwrap();
        channel.handle_tx_commit_ok().unwrap();

        assert_eq!(vec!["select", "commit"], *order.lock().unwrap());
    }

    #[test]
    fn delivered_content_is_reassembled() {
        let (mut channel, _rx) = opened_channel();
        let received = Arc::new(Mutex::new(None));
        let sink = received.clone();

        let consumer = Consumer::new("ct").on_delivery(Box::new(move |_, message| {
            *sink.lock().unwrap() = Some((
                message.message.body.clone(),
                message.delivery_tag,
                message.exchange.clone(),
                message.routing_key.clone(),
            ));
        }));

        channel.basic_consume("q", consumer, None).unwrap();
        channel
            .handle_consume_ok(frame::BasicConsumeOkArgs::new("ct"))
            .unwrap();

        channel
            .handle_basic_deliver(frame::BasicDeliverArgs::new("ct", 7, "e").routing_key("rk"))
            .unwrap();

        assert!(!channel.content_idle());

        assert!(channel.handle_content_header(frame::ContentHeaderFrame {
            channel: 1,
            class_id: 0x3C,
            body_size: 11,
            ..Default::default()
        }));

        assert!(channel.handle_content_body(frame::ContentBodyFrame {
            channel: 1,
            body: b"hello ".to_vec(),
        }));

        // nothing is dispatched until the full body arrived
        assert!(received.lock().unwrap().is_none());

        assert!(channel.handle_content_body(frame::ContentBodyFrame {
            channel: 1,
            body: b"world".to_vec(),
        }));

        assert!(channel.content_idle());
        assert_eq!(
            Some((b"hello world".to_vec(), 7, "e".to_string(), "rk".to_string())),
            *received.lock().unwrap()
        );
    }

    #[test]
    fn content_frames_without_a_method_are_rejected() {
        let (mut channel, _rx) = opened_channel();

        assert!(!channel.handle_content_header(frame::ContentHeaderFrame {
            channel: 1,
            body_size: 5,
            ..Default::default()
        }));

        assert!(!channel.handle_content_body(frame::ContentBodyFrame {
            channel: 1,
            body: b"stray".to_vec(),
        }));
    }

    #[test]
    fn method_interleaving_a_content_closes_the_channel() {
        let (mut channel, mut rx) = opened_channel();

        channel
            .handle_basic_deliver(frame::BasicDeliverArgs::new("ct", 1, "e"))
            .unwrap();

        channel.interrupt_content(frame::QUEUE_DECLARE).unwrap();

        assert!(channel.content_idle());
        assert_eq!(ChannelStatus::Closing, channel.status());

        match next_method(&mut rx) {
            (1, frame::CHANNEL_CLOSE, MethodFrameArgs::ChannelClose(args)) => {
                assert_eq!(505, args.code);
                assert_eq!(50, args.class_id);
                assert_eq!(10, args.method_id);
            }
            other => panic!("expected channel close, got {:?}", other),
        }
    }

    #[test]
    fn get_resolves_with_a_message_or_empty() {
        let (mut channel, _rx) = opened_channel();
        let responses = Arc::new(Mutex::new(Vec::new()));

        let sink = responses.clone();
        channel
            .basic_get(
                "q",
                true,
                Box::new(move |_, signal| match signal {
                    GetSignal::GetOk(message) => sink.lock().unwrap().push(format!(
                        "ok:{}:{}",
                        message.delivery_tag,
                        String::from_utf8_lossy(&message.message.body)
                    )),
                    GetSignal::GetEmpty => sink.lock().unwrap().push("empty".to_string()),
                }),
            )
            .unwrap();

        channel
            .handle_basic_get_ok(frame::BasicGetOkArgs::new(3, "e").message_count(1))
            .unwrap();
        assert!(channel.handle_content_header(frame::ContentHeaderFrame {
            channel: 1,
            body_size: 2,
            ..Default::default()
        }));
        assert!(channel.handle_content_body(frame::ContentBodyFrame {
            channel: 1,
            body: b"ok".to_vec(),
        }));

        let sink = responses.clone();
        channel
            .basic_get(
                "q",
                true,
                Box::new(move |_, signal| {
                    if matches!(signal, GetSignal::GetEmpty) {
                        sink.lock().unwrap().push("empty".to_string());
                    }
                }),
            )
            .unwrap();

        channel.handle_basic_get_empty().unwrap();

        assert_eq!(vec!["ok:3:ok".to_string(), "empty".to_string()], *responses.lock().unwrap());
        assert!(channel.awaiting.get.is_empty());
    }

    #[test]
    fn broker_cancel_drops_the_consumer_and_confirms() {
        let (mut channel, mut rx) = opened_channel();
        let cancelled = Arc::new(Mutex::new(false));
        let sink = cancelled.clone();

        let consumer = Consumer::new("ct");
        channel.basic_consume("q", consumer, None).unwrap();
        channel
            .handle_consume_ok(frame::BasicConsumeOkArgs::new("ct"))
            .unwrap();

        channel
            .consumers
            .get_mut("ct")
            .unwrap()
            .once(Event::Cancel, Box::new(move |_, _| *sink.lock().unwrap() = true));

        channel
            .handle_basic_cancel(frame::BasicCancelArgs::new("ct"))
            .unwrap();

        assert!(*cancelled.lock().unwrap());
        assert!(channel.consumer("ct").is_none());

        // consume request went out first, then the cancel confirmation
        assert!(matches!(next_method(&mut rx), (1, frame::BASIC_CONSUME, _)));
        assert!(matches!(next_method(&mut rx), (1, frame::BASIC_CANCEL_OK, _)));
    }

    #[test]
    fn publish_splits_the_body_by_frame_size() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut channel = Channel::new(1, tx, 16);

        channel.open(None).unwrap();
        channel.handle_open_ok().unwrap();
        rx.try_recv().unwrap();

        channel
            .basic_publish("e", "rk", PublishedMessage::from("0123456789"))
            .unwrap();

        match rx.try_recv().unwrap() {
            Frame::Frames(frames) => {
                assert_eq!(4, frames.len());
                assert!(matches!(frames[0], AMQPFrame::Method(1, frame::BASIC_PUBLISH, _)));

                match &frames[1] {
                    AMQPFrame::ContentHeader(header) => assert_eq!(10, header.body_size),
                    other => panic!("expected content header, got {:?}", other),
                }

                match (&frames[2], &frames[3]) {
                    (AMQPFrame::ContentBody(first), AMQPFrame::ContentBody(second)) => {
                        assert_eq!(b"01234567".to_vec(), first.body);
                        assert_eq!(b"89".to_vec(), second.body);
                    }
                    other => panic!("expected body frames, got {:?}", other),
                }
            }
            other => panic!("expected a frame batch, got {:?}", other),
        }
    }

    #[test]
    fn reset_state_is_idempotent() {
        let (mut channel, _rx) = opened_channel();

        channel.queue_declare(Queue::new("a"), None).unwrap();
        channel
            .handle_flow_ok(frame::ChannelFlowOkArgs::new(false))
            .unwrap();

        channel.reset_state();

        assert!(channel.is_flow_active());
        assert!(channel.awaiting.is_empty());
        assert!(channel.callbacks.is_empty());

        channel.reset_state();

        assert!(channel.is_flow_active());
        assert!(channel.awaiting.is_empty());
        assert!(channel.callbacks.is_empty());
    }
}
