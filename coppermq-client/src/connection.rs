//! Connection state machine: the opening handshake, the channel table and
//! the routing of inbound frames to the channels.

use std::collections::HashMap;

use anyhow::Result;
use coppermq_codec::frame::{self, AMQPFrame, FieldTable, MethodFrameArgs};
use log::{debug, info, trace, warn};

use crate::callback::{Callback, Callbacks, Entity, Event};
use crate::channel::{Channel, ChannelStatus};
use crate::client_error;
use crate::config::ConnectionOptions;
use crate::dispatcher;
use crate::error::ChannelOutOfBounds;
use crate::model::{ChannelError, ChannelNumber, ClassMethod, ConnectionError};
use crate::FrameSink;

/// Channel number bound used before the tune negotiation fixed the real
/// one, or when the server does not limit channels.
pub const FALLBACK_CHANNEL_MAX: u32 = 65_536;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    New,
    /// The protocol header went out, authentication is in progress.
    Starting,
    /// Limits are negotiated, the virtual host open is in progress.
    Opening,
    Opened,
    Closing,
    Closed,
}

/// An AMQP connection multiplexing channels over one transport.
///
/// The connection does no I/O on its own. Outbound frames go into the
/// injected [`FrameSink`] the I/O integration drains, inbound decoded
/// frames are pushed in through [`Connection::handle_frame`] and transport
/// loss is signalled with [`Connection::handle_disconnect`].
#[derive(Debug)]
pub struct Connection {
    status: ConnectionStatus,
    options: ConnectionOptions,
    channel_max: u16,
    frame_max: u32,
    heartbeat: u16,
    server_properties: Option<FieldTable>,
    channels: HashMap<ChannelNumber, Channel>,
    outgoing: FrameSink,
    pub(crate) callbacks: Callbacks<Connection>,
}

impl Entity for Connection {
    fn callbacks_mut(&mut self) -> &mut Callbacks<Self> {
        &mut self.callbacks
    }
}

/// Both peers offer a limit, zero meaning no preference, and the smaller
/// real limit wins.
fn negotiate<T: Ord + Default + Copy>(client: T, server: T) -> T {
    let zero = T::default();

    match (client, server) {
        (c, s) if c == zero => s,
        (c, s) if s == zero => c,
        (c, s) => std::cmp::min(c, s),
    }
}

impl Connection {
    pub fn new(options: ConnectionOptions, outgoing: FrameSink) -> Self {
        let frame_max = options.frame_max;
        let heartbeat = options.heartbeat;

        Self {
            status: ConnectionStatus::New,
            options,
            channel_max: 0,
            frame_max,
            heartbeat,
            server_properties: None,
            channels: HashMap::new(),
            outgoing,
            callbacks: Callbacks::default(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == ConnectionStatus::Opened
    }

    /// Negotiated channel number bound. Falls back to a permissive bound
    /// while the connection is not open or when the server reported zero.
    pub fn channel_max(&self) -> u32 {
        if !self.is_open() || self.channel_max == 0 {
            FALLBACK_CHANNEL_MAX
        } else {
            self.channel_max as u32
        }
    }

    pub fn frame_max(&self) -> u32 {
        self.frame_max
    }

    pub fn heartbeat_interval(&self) -> u16 {
        self.heartbeat
    }

    /// Properties the server advertised in the start method.
    pub fn server_properties(&self) -> Option<&FieldTable> {
        self.server_properties.as_ref()
    }

    pub fn channels(&self) -> &HashMap<ChannelNumber, Channel> {
        &self.channels
    }

    pub fn channel(&self, id: ChannelNumber) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub fn channel_mut(&mut self, id: ChannelNumber) -> Option<&mut Channel> {
        self.channels.get_mut(&id)
    }

    pub fn send_frame(&self, frame: AMQPFrame) -> Result<()> {
        crate::send_frame(&self.outgoing, frame)
    }

    pub fn send_heartbeat(&self) -> Result<()> {
        self.send_frame(frame::heartbeat())
    }

    /// Kick off the handshake by announcing the protocol version. The rest
    /// of the opening sequence runs on the inbound start and tune methods.
    pub fn start(&mut self) -> Result<()> {
        self.send_frame(AMQPFrame::Header)?;
        self.status = ConnectionStatus::Starting;

        Ok(())
    }

    /// Close the connection with the default success report.
    pub fn close(&mut self, callback: Option<Callback<Connection>>) -> Result<()> {
        if let Some(cb) = callback {
            self.once(Event::Close, cb);
        }

        self.send_frame(frame::connection_close(ChannelError::Success.into(), "Goodbye", 0))?;
        self.status = ConnectionStatus::Closing;

        Ok(())
    }

    /// Open a channel, validating the number against the negotiated bound.
    /// The callback fires when the server confirms the open.
    pub fn open_channel(&mut self, id: ChannelNumber, callback: Option<Callback<Channel>>) -> Result<()> {
        let bound = self.channel_max();

        if (id as u32) > bound {
            return Err(anyhow::Error::new(ChannelOutOfBounds {
                channel: id,
                channel_max: bound,
            }));
        }

        if let Some(existing) = self.channels.get(&id) {
            if existing.status() != ChannelStatus::Closed {
                return client_error!(
                    Some(id),
                    ConnectionError::ChannelError.into(),
                    "Channel number is already in use",
                    frame::CHANNEL_OPEN
                );
            }
        }

        let mut channel = Channel::new(id, self.outgoing.clone(), self.frame_max);
        channel.open(callback)?;
        self.channels.insert(id, channel);

        Ok(())
    }

    /// Entry point of the inbound side: the I/O integration pushes every
    /// decoded frame through here.
    pub fn handle_frame(&mut self, frame: AMQPFrame) -> Result<()> {
        trace!("Incoming frame {:?}", frame);

        match frame {
            AMQPFrame::Header => Ok(()),
            AMQPFrame::Method(channel, cm, args) => dispatcher::dispatch(self, channel, cm, args),
            AMQPFrame::ContentHeader(header) => self.handle_content_header(header),
            AMQPFrame::ContentBody(body) => self.handle_content_body(body),
            AMQPFrame::Heartbeat(_) => Ok(()),
        }
    }

    /// The transport is gone. For the upper layers this is the same
    /// cascade as a server initiated close, except nothing can be sent.
    pub fn handle_disconnect(&mut self) {
        if self.status == ConnectionStatus::Closed {
            return;
        }

        info!("Transport lost, resetting {} channels", self.channels.len());

        self.status = ConnectionStatus::Closed;

        let reason = frame::ConnectionCloseArgs {
            code: ConnectionError::ConnectionForced.into(),
            text: "Transport closed".to_string(),
            class_id: 0,
            method_id: 0,
        };
        let reply = MethodFrameArgs::ConnectionClose(reason);
        self.fire(Event::Error, &reply);

        self.interrupt_channels();
        self.channels.clear();
    }

    // Handshake and close handlers

    pub(crate) fn handle_start(&mut self, args: frame::ConnectionStartArgs) -> Result<()> {
        info!(
            "Connected to AMQP {}.{} server, mechanisms {}",
            args.version_major, args.version_minor, args.mechanisms
        );

        self.server_properties = args.properties;

        self.send_frame(frame::ConnectionStartOkArgs::new(&self.options.username, &self.options.password).frame())
    }

    pub(crate) fn handle_tune(&mut self, args: frame::ConnectionTuneArgs) -> Result<()> {
        self.channel_max = negotiate(self.options.channel_max, args.channel_max);
        self.frame_max = negotiate(self.options.frame_max, args.frame_max);
        self.heartbeat = negotiate(self.options.heartbeat, args.heartbeat);

        debug!(
            "Tuned to channel_max={} frame_max={} heartbeat={}",
            self.channel_max, self.frame_max, self.heartbeat
        );

        self.send_frame(frame::connection_tune_ok(self.channel_max, self.frame_max, self.heartbeat))?;
        self.send_frame(
            frame::ConnectionOpenArgs::default()
                .virtual_host(&self.options.virtual_host)
                .frame(),
        )?;
        self.status = ConnectionStatus::Opening;

        Ok(())
    }

    pub(crate) fn handle_open_ok(&mut self) -> Result<()> {
        self.status = ConnectionStatus::Opened;
        self.fire(Event::Open, &MethodFrameArgs::ConnectionOpenOk);

        Ok(())
    }

    pub(crate) fn handle_close_ok(&mut self) -> Result<()> {
        self.status = ConnectionStatus::Closed;
        self.fire(Event::Close, &MethodFrameArgs::ConnectionCloseOk);

        self.interrupt_channels();
        self.channels.clear();

        Ok(())
    }

    /// The server closed the connection. The error hook fires with the
    /// decoded close method, the close is confirmed and every channel is
    /// torn down.
    pub(crate) fn handle_close(&mut self, args: frame::ConnectionCloseArgs) -> Result<()> {
        debug!("Connection closed by the server: {} {}", args.code, args.text);

        self.status = ConnectionStatus::Closed;

        let reply = MethodFrameArgs::ConnectionClose(args);
        self.fire(Event::Error, &reply);

        self.send_frame(frame::connection_close_ok())?;

        self.interrupt_channels();
        self.channels.clear();

        Ok(())
    }

    // Channel routing

    /// Run a channel handler with the content assembly guard: a method
    /// frame interleaving an unfinished content closes the channel.
    pub(crate) fn on_channel<F>(&mut self, id: ChannelNumber, cm: ClassMethod, f: F) -> Result<()>
    where
        F: FnOnce(&mut Channel) -> Result<()>,
    {
        match self.channels.get_mut(&id) {
            Some(channel) => {
                if !channel.content_idle() {
                    return channel.interrupt_content(cm);
                }

                f(channel)
            }
            None => self.protocol_violation(ConnectionError::ChannelError, "Frame on an unknown channel"),
        }
    }

    pub(crate) fn handle_channel_close(&mut self, id: ChannelNumber, args: frame::ChannelCloseArgs) -> Result<()> {
        match self.channels.get_mut(&id) {
            Some(channel) => {
                channel.handle_close(args)?;
                self.channels.remove(&id);

                Ok(())
            }
            None => self.protocol_violation(ConnectionError::ChannelError, "Close on an unknown channel"),
        }
    }

    pub(crate) fn handle_channel_close_ok(&mut self, id: ChannelNumber) -> Result<()> {
        match self.channels.get_mut(&id) {
            Some(channel) => {
                channel.handle_close_ok()?;
                self.channels.remove(&id);

                Ok(())
            }
            None => self.protocol_violation(ConnectionError::ChannelError, "CloseOk on an unknown channel"),
        }
    }

    fn handle_content_header(&mut self, header: frame::ContentHeaderFrame) -> Result<()> {
        let accepted = match self.channels.get_mut(&header.channel) {
            Some(channel) => channel.handle_content_header(header),
            None => false,
        };

        if accepted {
            Ok(())
        } else {
            self.protocol_violation(
                ConnectionError::UnexpectedFrame,
                "Content header without a content method",
            )
        }
    }

    fn handle_content_body(&mut self, body: frame::ContentBodyFrame) -> Result<()> {
        let accepted = match self.channels.get_mut(&body.channel) {
            Some(channel) => channel.handle_content_body(body),
            None => false,
        };

        if accepted {
            Ok(())
        } else {
            self.protocol_violation(ConnectionError::UnexpectedFrame, "Content body without a content header")
        }
    }

    pub(crate) fn unexpected_method(&mut self, channel: ChannelNumber, cm: ClassMethod) -> Result<()> {
        warn!("No handler for method {:08X} on channel {}", cm, channel);

        self.protocol_violation(ConnectionError::CommandInvalid, "Unexpected method")
    }

    /// The peer violated the framing rules. The connection reports the
    /// violation, sends a close and tears down every channel.
    pub(crate) fn protocol_violation(&mut self, code: ConnectionError, text: &str) -> Result<()> {
        if self.status == ConnectionStatus::Closing || self.status == ConnectionStatus::Closed {
            return Ok(());
        }

        warn!("Protocol violation ({:?}): {}", code, text);

        let reason = frame::ConnectionCloseArgs {
            code: code.into(),
            text: text.to_string(),
            class_id: 0,
            method_id: 0,
        };
        let reply = MethodFrameArgs::ConnectionClose(reason);
        self.fire(Event::Error, &reply);

        self.send_frame(frame::connection_close(code.into(), text, 0))?;

        self.interrupt_channels();
        self.channels.clear();
        self.status = ConnectionStatus::Closing;

        Ok(())
    }

    fn interrupt_channels(&mut self) {
        for channel in self.channels.values_mut() {
            channel.handle_connection_interruption();
        }
    }
}
