use crate::model;
use std::fmt;

/// A failure reported through the AMQP reply-code machinery.
///
/// `channel` names the channel the report belongs to and is empty for
/// connection scoped failures. `class_method` points at the method which
/// triggered the report, zero when no single method is to blame.
#[derive(Clone, Debug)]
pub struct ClientError {
    pub channel: Option<model::ChannelNumber>,
    pub code: u16,
    pub message: String,
    pub class_method: model::ClassMethod,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel {
            Some(channel) => write!(f, "channel {} error {}: {}", channel, self.code, self.message)?,
            None => write!(f, "connection error {}: {}", self.code, self.message)?,
        }

        if self.class_method != 0 {
            write!(f, " (method {:08X})", self.class_method)?;
        }

        Ok(())
    }
}

impl std::error::Error for ClientError {}

/// A channel was opened with a number outside the range the connection
/// tune negotiated.
#[derive(Clone, Debug)]
pub struct ChannelOutOfBounds {
    pub channel: model::ChannelNumber,
    pub channel_max: u32,
}

impl fmt::Display for ChannelOutOfBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "channel number {} is out of the allowed [0, {}] range",
            self.channel, self.channel_max
        )
    }
}

impl std::error::Error for ChannelOutOfBounds {}

/// Build an `Err` holding a [`ClientError`] from a scope, a reply code,
/// a text and the offending class-method.
#[macro_export]
macro_rules! client_error {
    ($channel:expr, $code:expr, $message:expr, $cm:expr) => {
        ::std::result::Result::Err(::anyhow::Error::new($crate::error::ClientError {
            channel: $channel,
            code: $code,
            message: ($message).to_string(),
            class_method: $cm,
        }))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_error;

    #[test]
    fn errors_built_by_the_macro_downcast_from_anyhow() {
        let res: anyhow::Result<()> = client_error!(Some(3), 406, "PRECONDITION_FAILED", 0x0032000A);

        let err = res.unwrap_err();
        let client_error = err.downcast_ref::<ClientError>().unwrap();

        assert_eq!(Some(3), client_error.channel);
        assert_eq!(406, client_error.code);
        assert_eq!("PRECONDITION_FAILED", client_error.message);
        assert_eq!(0x0032000A, client_error.class_method);
    }

    #[test]
    fn display_names_the_error_scope() {
        let on_channel = ClientError {
            channel: Some(2),
            code: 404,
            message: "no queue named inbox".to_string(),
            class_method: 0,
        };

        assert_eq!("channel 2 error 404: no queue named inbox", on_channel.to_string());

        let on_connection = ClientError {
            channel: None,
            code: 320,
            message: "shutting down".to_string(),
            class_method: 0x000A0032,
        };

        assert_eq!(
            "connection error 320: shutting down (method 000A0032)",
            on_connection.to_string()
        );
    }
}
