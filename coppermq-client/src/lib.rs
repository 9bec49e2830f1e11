//! AMQP 0.9.1 client core.
//!
//! The crate drives the protocol state machines for connections, channels,
//! queues, exchanges and consumers over a transport it does not own.
//! Outbound frames are pushed into an injected channel the I/O integration
//! writes to the socket, inbound frames decoded by
//! [`coppermq_codec::codec::AMQPCodec`] are fed back through
//! [`Connection::handle_frame`]. Every operation returns immediately and
//! its outcome is observable through the callback registered for it.
//!
//! # Examples
//!
//! ```no_run
//! use coppermq_client::{Connection, ConnectionOptions, Entity, Event};
//! use tokio::sync::mpsc;
//!
//! fn open_and_declare() -> anyhow::Result<()> {
//!     let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
//!     let mut conn = Connection::new(ConnectionOptions::default(), frame_tx);
//!
//!     // the I/O integration writes everything popping out of frame_rx to
//!     // the socket and pushes the decoded replies into handle_frame
//!     conn.start()?;
//!
//!     conn.once(
//!         Event::Open,
//!         Box::new(|conn, _| {
//!             conn.open_channel(1, None).unwrap();
//!         }),
//!     );
//!
//!     Ok(())
//! }
//! ```

pub mod callback;
pub mod channel;
pub mod config;
pub mod connection;
pub mod consumer;
pub mod error;
pub mod exchange;
pub mod message;
pub mod model;
pub mod queue;

mod dispatcher;

use std::io::Write;

use anyhow::Result;
use coppermq_codec::codec::Frame;
use coppermq_codec::frame::AMQPFrame;
use env_logger::Builder;
use tokio::sync::mpsc;

pub use callback::{Callback, Callbacks, Entity, Event};
pub use channel::{Channel, ChannelStatus, GetCallback, GetSignal, ReturnCallback};
pub use config::{parse_options, ConnectionOptions};
pub use connection::{Connection, ConnectionStatus};
pub use consumer::{Consumer, ConsumerStatus, DeliveryCallback};
pub use error::{ChannelOutOfBounds, ClientError};
pub use exchange::{Exchange, ExchangeStatus, ExchangeType};
pub use message::{Content, DeliveredMessage, GetMessage, MessageProperties, PublishedMessage, ReturnedMessage};
pub use model::{ChannelError, ChannelNumber, ClassId, ClassMethod, ConnectionError};
pub use queue::{Queue, QueueStatus};

/// Sink of the outbound frames, drained by the I/O integration.
pub type FrameSink = mpsc::UnboundedSender<Frame>;

pub(crate) fn send_frame(sink: &FrameSink, frame: AMQPFrame) -> Result<()> {
    if sink.send(Frame::Frame(frame)).is_err() {
        return client_error!(
            None,
            model::ConnectionError::FrameError.into(),
            "Cannot send frame, the transport is gone",
            0
        );
    }

    Ok(())
}

pub(crate) fn send_frames(sink: &FrameSink, frames: Vec<AMQPFrame>) -> Result<()> {
    if sink.send(Frame::Frames(frames)).is_err() {
        return client_error!(
            None,
            model::ConnectionError::FrameError.into(),
            "Cannot send frames, the transport is gone",
            0
        );
    }

    Ok(())
}

/// Convenience function for setting up `env_logger` to see log messages.
pub fn setup_logger() {
    let mut builder = Builder::from_default_env();

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - [{:5}] {}:{} - {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or_default(),
                record.line().unwrap_or_default(),
                record.args()
            )
        })
        .init();
}
