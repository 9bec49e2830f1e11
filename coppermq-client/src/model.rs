//! Protocol-level identifiers and the standard reply codes.
//!
//! A reply code below 300 reports success, soft errors close only the
//! channel they happened on, hard errors take the whole connection down.
//! The enums carry the codes of AMQP 0.9.1; their numeric values go into
//! close frames via the `u16` conversions.

use coppermq_codec::frame;

/// Channel number as it appears in the frame header.
pub type ChannelNumber = frame::Channel;
/// Identifier of a method class.
pub type ClassId = frame::ClassId;
/// Class id and method id packed into one word, class in the high half.
pub type ClassMethod = frame::ClassMethod;

/// Reply codes which end the whole connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionError {
    /// An operator or the server itself shut the connection down.
    ConnectionForced = 320,
    /// The virtual host named in the open request does not exist.
    InvalidPath = 402,
    /// The authenticated user may not work with the requested resource.
    AccessRefused = 403,
    /// A frame arrived which breaks the framing rules.
    FrameError = 501,
    /// A method arrived whose arguments cannot be parsed.
    SyntaxError = 502,
    /// A method arrived which is illegal in the current sequence, for
    /// example during the handshake.
    CommandInvalid = 503,
    /// Traffic referred to a channel number which is not open.
    ChannelError = 504,
    /// A content frame arrived with no content method to attach it to,
    /// or a method cut an unfinished content short.
    UnexpectedFrame = 505,
    /// A limit agreed in the tune negotiation was exceeded.
    ResourceError = 506,
    /// The request is well-formed but forbidden for this connection.
    NotAllowed = 530,
    /// The request needs functionality this peer does not provide.
    NotImplemented = 540,
    /// The server hit an internal fault and gave up on the request.
    InternalError = 541,
}

/// Reply codes scoped to a single channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// Nothing went wrong, used in clean close frames.
    Success = 200,
    /// The published content is larger than the server accepts.
    ContentTooLarge = 311,
    /// A mandatory publish matched no queue.
    NoRoute = 312,
    /// An immediate publish found no consumer ready to take it.
    NoConsumers = 313,
    /// The user may not touch the named resource.
    AccessRefused = 403,
    /// No queue, exchange or consumer with the given name.
    NotFound = 404,
    /// Another connection holds the resource, typically an exclusive
    /// queue.
    ResourceLocked = 405,
    /// The request contradicts how the resource already exists, for
    /// example redeclaring a queue with different flags.
    PreconditionFailed = 406,
}

impl From<ConnectionError> for u16 {
    fn from(e: ConnectionError) -> u16 {
        e as u16
    }
}

impl From<ChannelError> for u16 {
    fn from(e: ChannelError) -> u16 {
        e as u16
    }
}
