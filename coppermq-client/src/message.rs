use std::collections::HashMap;

use coppermq_codec::frame::{
    AMQPFieldValue, ContentBodyFrame, ContentHeaderFrame, FieldTable, HeaderPropertyFlags,
};

use crate::model::ChannelNumber;

/// A message body with its properties, sent to or received from the server.
#[derive(Debug, Default)]
pub struct Content {
    pub body: Vec<u8>,
    pub properties: MessageProperties,
}

/// Standard set of message properties.
#[derive(Debug, Default)]
pub struct MessageProperties {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub headers: HashMap<String, String>,
    /// 1 - non-persistent, 2 - persistent
    pub delivery_mode: Option<u8>,
    pub priority: Option<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub expiration: Option<String>,
    pub message_id: Option<String>,
    pub timestamp: Option<u64>,
    pub message_type: Option<String>,
    pub user_id: Option<String>,
    pub app_id: Option<String>,
    pub cluster_id: Option<String>,
}

/// A message pushed by the server to a consumer.
///
/// With the `consumer_tag` and `delivery_tag` the client can send back
/// acknowledgements, saying that the message was successfully processed.
#[derive(Debug, Default)]
pub struct DeliveredMessage {
    pub message: Content,
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
}

/// A message fetched with a single get.
#[derive(Debug, Default)]
pub struct GetMessage {
    pub message: Content,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    pub message_count: u32,
}

/// An unroutable message sent back to the publisher.
#[derive(Debug, Default)]
pub struct ReturnedMessage {
    pub message: Content,
    pub reply_code: u16,
    pub reply_text: String,
    pub exchange: String,
    pub routing_key: String,
}

/// A message published by the client.
#[derive(Debug, Default)]
pub struct PublishedMessage {
    pub message: Content,
    pub mandatory: bool,
    pub immediate: bool,
}

impl From<&str> for PublishedMessage {
    fn from(value: &str) -> Self {
        Self {
            message: Content {
                body: value.as_bytes().to_vec(),
                properties: MessageProperties::default(),
            },
            ..Default::default()
        }
    }
}

impl PublishedMessage {
    pub fn text(mut self, value: &str) -> Self {
        self.message.body = value.as_bytes().to_vec();
        self
    }

    /// Mandatory messages are returned to the publisher if the exchange
    /// cannot route them to any queue.
    pub fn mandatory(mut self, value: bool) -> Self {
        self.mandatory = value;
        self
    }

    /// Immediate messages are returned to the publisher if no consumer can
    /// receive them right away.
    pub fn immediate(mut self, value: bool) -> Self {
        self.immediate = value;
        self
    }
}

/// Cut the content into a header frame and as many body frames as the
/// maximum frame size requires.
pub(crate) fn to_content_frames(
    channel: ChannelNumber,
    class_id: u16,
    content: Content,
    max_payload: usize,
) -> (ContentHeaderFrame, Vec<ContentBodyFrame>) {
    let mut header = properties_to_header(content.properties);
    header.channel = channel;
    header.class_id = class_id;
    header.body_size = content.body.len() as u64;

    let bodies = content
        .body
        .chunks(std::cmp::max(1, max_payload))
        .map(|chunk| ContentBodyFrame {
            channel,
            body: chunk.to_vec(),
        })
        .collect();

    (header, bodies)
}

fn properties_to_header(props: MessageProperties) -> ContentHeaderFrame {
    let mut header = ContentHeaderFrame::default();
    let flags = &mut header.prop_flags;

    if props.content_type.is_some() {
        flags.set(HeaderPropertyFlags::CONTENT_TYPE, true);
    }
    if props.content_encoding.is_some() {
        flags.set(HeaderPropertyFlags::CONTENT_ENCODING, true);
    }
    if !props.headers.is_empty() {
        flags.set(HeaderPropertyFlags::HEADERS, true);

        let mut table = FieldTable::new();
        for (k, v) in props.headers {
            table.insert(k, AMQPFieldValue::LongString(v));
        }
        header.headers = Some(table);
    }
    if props.delivery_mode.is_some() {
        flags.set(HeaderPropertyFlags::DELIVERY_MODE, true);
    }
    if props.priority.is_some() {
        flags.set(HeaderPropertyFlags::PRIORITY, true);
    }
    if props.correlation_id.is_some() {
        flags.set(HeaderPropertyFlags::CORRELATION_ID, true);
    }
    if props.reply_to.is_some() {
        flags.set(HeaderPropertyFlags::REPLY_TO, true);
    }
    if props.expiration.is_some() {
        flags.set(HeaderPropertyFlags::EXPIRATION, true);
    }
    if props.message_id.is_some() {
        flags.set(HeaderPropertyFlags::MESSAGE_ID, true);
    }
    if props.timestamp.is_some() {
        flags.set(HeaderPropertyFlags::TIMESTAMP, true);
    }
    if props.message_type.is_some() {
        flags.set(HeaderPropertyFlags::MESSAGE_TYPE, true);
    }
    if props.user_id.is_some() {
        flags.set(HeaderPropertyFlags::USER_ID, true);
    }
    if props.app_id.is_some() {
        flags.set(HeaderPropertyFlags::APP_ID, true);
    }
    if props.cluster_id.is_some() {
        flags.set(HeaderPropertyFlags::CLUSTER_ID, true);
    }

    header.content_type = props.content_type;
    header.content_encoding = props.content_encoding;
    header.delivery_mode = props.delivery_mode;
    header.priority = props.priority;
    header.correlation_id = props.correlation_id;
    header.reply_to = props.reply_to;
    header.expiration = props.expiration;
    header.message_id = props.message_id;
    header.timestamp = props.timestamp;
    header.message_type = props.message_type;
    header.user_id = props.user_id;
    header.app_id = props.app_id;
    header.cluster_id = props.cluster_id;

    header
}

impl From<ContentHeaderFrame> for MessageProperties {
    fn from(header: ContentHeaderFrame) -> Self {
        let mut headers = HashMap::new();

        if let Some(table) = header.headers {
            for (k, v) in table {
                match v {
                    AMQPFieldValue::Bool(b) => {
                        headers.insert(k, b.to_string());
                    }
                    AMQPFieldValue::LongString(s) => {
                        headers.insert(k, s);
                    }
                    AMQPFieldValue::EmptyFieldTable | AMQPFieldValue::FieldTable(_) => (),
                }
            }
        }

        MessageProperties {
            content_type: header.content_type,
            content_encoding: header.content_encoding,
            headers,
            delivery_mode: header.delivery_mode,
            priority: header.priority,
            correlation_id: header.correlation_id,
            reply_to: header.reply_to,
            expiration: header.expiration,
            message_id: header.message_id,
            timestamp: header.timestamp,
            message_type: header.message_type,
            user_id: header.user_id,
            app_id: header.app_id,
            cluster_id: header.cluster_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_is_split_by_the_frame_size() {
        let content = Content {
            body: vec![7u8; 10],
            properties: MessageProperties::default(),
        };

        let (header, bodies) = to_content_frames(3, 0x3C, content, 4);

        assert_eq!(10, header.body_size);
        assert_eq!(3, bodies.len());
        assert_eq!(vec![4, 4, 2], bodies.iter().map(|b| b.body.len()).collect::<Vec<_>>());
        assert!(bodies.iter().all(|b| b.channel == 3));
    }

    #[test]
    fn small_body_is_a_single_frame() {
        let content = Content {
            body: b"hello".to_vec(),
            properties: MessageProperties::default(),
        };

        let (header, bodies) = to_content_frames(1, 0x3C, content, 131_064);

        assert_eq!(5, header.body_size);
        assert_eq!(1, bodies.len());
    }

    #[test]
    fn properties_survive_the_header_conversion() {
        let mut props = MessageProperties::default();
        props.content_type = Some("application/json".to_string());
        props.delivery_mode = Some(2);
        props.cluster_id = Some("cluster-a".to_string());
        props.headers.insert("retries".to_string(), "3".to_string());

        let content = Content {
            body: vec![],
            properties: props,
        };

        let (header, _) = to_content_frames(1, 0x3C, content, 1024);

        assert!(header.prop_flags.contains(HeaderPropertyFlags::CONTENT_TYPE));
        assert!(header.prop_flags.contains(HeaderPropertyFlags::DELIVERY_MODE));
        assert!(header.prop_flags.contains(HeaderPropertyFlags::HEADERS));
        assert!(header.prop_flags.contains(HeaderPropertyFlags::CLUSTER_ID));

        let props = MessageProperties::from(header);

        assert_eq!(Some("application/json".to_string()), props.content_type);
        assert_eq!(Some(2), props.delivery_mode);
        assert_eq!(Some("cluster-a".to_string()), props.cluster_id);
        assert_eq!(Some(&"3".to_string()), props.headers.get("retries"));
    }
}
