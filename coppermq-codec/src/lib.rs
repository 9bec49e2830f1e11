//! Frame types and wire codec for AMQP 0.9.1.
//!
//! The `frame` module holds the typed representation of every method,
//! content header and content body frame the client core works with, the
//! `codec` module encodes and decodes them to and from the byte stream.
pub mod codec;
pub mod frame;


use std::fmt;

/// Errors surfaced by the frame decoder.
///
/// A short read is not an error, the decoder simply yields no frame until
/// enough bytes are buffered.
#[derive(Debug)]
pub enum FrameError {
    /// The byte stream violates the framing rules: bad frame-end sentinel,
    /// payload larger than the negotiated maximum, truncated arguments or
    /// invalid string data.
    Malformed(String),
    /// The frame carried a (class id, method id) pair the codec does not
    /// know about.
    UnknownMethod(u32),
    Io(std::io::Error),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Malformed(reason) => write!(f, "malformed frame: {}", reason),
            FrameError::UnknownMethod(cm) => write!(f, "unknown method {:08X}", cm),
            FrameError::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<std::io::Error> for FrameError {
    fn from(e: std::io::Error) -> Self {
        FrameError::Io(e)
    }
}

/// Type alias for results of decoding functions.
pub type Result<T> = std::result::Result<T, FrameError>;

/// Shorthand for failing a decode with a malformed frame error.
#[macro_export]
macro_rules! malformed {
    ($($arg:tt)*) => {
        return ::std::result::Result::Err($crate::FrameError::Malformed(format!($($arg)*)))
    };
}
