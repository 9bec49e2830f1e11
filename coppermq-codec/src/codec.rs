use crate::frame::*;
use crate::{malformed, FrameError};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

const FRAME_METHOD: u8 = 0x01;
const FRAME_CONTENT_HEADER: u8 = 0x02;
const FRAME_CONTENT_BODY: u8 = 0x03;
const FRAME_HEARTBEAT: u8 = 0x08;
const FRAME_PROTOCOL_HEADER: u8 = 0x41;
const FRAME_END: u8 = 0xCE;

/// Frame size the codec accepts before the connection tune negotiates the
/// real limit.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 131_072;

const PROTOCOL_HEADER: &[u8] = b"AMQP\x00\x00\x09\x01";

/// AMQP frame encoder and decoder.
///
/// `max_frame_size` bounds the payload length the decoder accepts; the
/// I/O integration lowers it to the value negotiated in Connection.Tune.
/// Zero disables the check.
pub struct AMQPCodec {
    max_frame_size: usize,
}

impl AMQPCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.max_frame_size = max_frame_size;
    }
}

impl Default for AMQPCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// A single frame or a batch of frames to be written out in one go, for
/// example a publish with its content header and body frames.
#[derive(Debug)]
pub enum Frame {
    Frame(AMQPFrame),
    Frames(Vec<AMQPFrame>),
}

impl From<AMQPFrame> for Frame {
    fn from(f: AMQPFrame) -> Self {
        Frame::Frame(f)
    }
}

impl Encoder<Frame> for AMQPCodec {
    type Error = FrameError;

    fn encode(&mut self, event: Frame, buf: &mut BytesMut) -> Result<(), Self::Error> {
        match event {
            Frame::Frame(frame) => encode_amqp_frame(buf, frame),
            Frame::Frames(frames) => {
                for frame in frames {
                    encode_amqp_frame(buf, frame);
                }
            }
        }

        Ok(())
    }
}

impl Decoder for AMQPCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        if src[0] == FRAME_PROTOCOL_HEADER {
            if src.len() < 8 {
                return Ok(None);
            }

            let head = src.split_to(8);
            if &head[..] != PROTOCOL_HEADER {
                malformed!("invalid protocol header {:?}", &head[..]);
            }

            return Ok(Some(Frame::Frame(AMQPFrame::Header)));
        }

        if src.len() < 7 {
            return Ok(None);
        }

        let payload_len = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;

        if self.max_frame_size > 0 && payload_len > self.max_frame_size {
            malformed!("frame payload of {} bytes exceeds maximum {}", payload_len, self.max_frame_size);
        }

        // type (1) + channel (2) + length (4) + payload + frame end (1)
        if src.len() < payload_len + 8 {
            return Ok(None);
        }

        let frame_type = src.get_u8();
        let channel = src.get_u16();
        let _ = src.get_u32();
        let mut payload = src.split_to(payload_len);

        if src.get_u8() != FRAME_END {
            malformed!("missing frame end on channel {}", channel);
        }

        let frame = match frame_type {
            FRAME_METHOD => decode_method_frame(&mut payload, channel)?,
            FRAME_CONTENT_HEADER => decode_content_header_frame(&mut payload, channel)?,
            FRAME_CONTENT_BODY => AMQPFrame::ContentBody(ContentBodyFrame {
                channel,
                body: payload.to_vec(),
            }),
            FRAME_HEARTBEAT => AMQPFrame::Heartbeat(channel),
            t => malformed!("unknown frame type {}", t),
        };

        Ok(Some(Frame::Frame(frame)))
    }
}

fn take_u8(buf: &mut BytesMut) -> crate::Result<u8> {
    if buf.remaining() < 1 {
        malformed!("truncated method arguments");
    }
    Ok(buf.get_u8())
}

fn take_u16(buf: &mut BytesMut) -> crate::Result<u16> {
    if buf.remaining() < 2 {
        malformed!("truncated method arguments");
    }
    Ok(buf.get_u16())
}

fn take_u32(buf: &mut BytesMut) -> crate::Result<u32> {
    if buf.remaining() < 4 {
        malformed!("truncated method arguments");
    }
    Ok(buf.get_u32())
}

fn take_u64(buf: &mut BytesMut) -> crate::Result<u64> {
    if buf.remaining() < 8 {
        malformed!("truncated method arguments");
    }
    Ok(buf.get_u64())
}

fn take_bool(buf: &mut BytesMut) -> crate::Result<bool> {
    Ok(take_u8(buf)? != 0)
}

fn decode_short_string(buf: &mut BytesMut) -> crate::Result<String> {
    let len = take_u8(buf)? as usize;

    if buf.remaining() < len {
        malformed!("truncated short string");
    }

    let sb = buf.split_to(len);

    match String::from_utf8(sb.to_vec()) {
        Ok(s) => Ok(s),
        Err(_) => Err(FrameError::Malformed("short string is not valid utf-8".to_string())),
    }
}

fn decode_long_string(buf: &mut BytesMut) -> crate::Result<String> {
    let len = take_u32(buf)? as usize;

    if buf.remaining() < len {
        malformed!("truncated long string");
    }

    let sb = buf.split_to(len);

    match String::from_utf8(sb.to_vec()) {
        Ok(s) => Ok(s),
        Err(_) => Err(FrameError::Malformed("long string is not valid utf-8".to_string())),
    }
}

fn decode_value(buf: &mut BytesMut) -> crate::Result<AMQPFieldValue> {
    match take_u8(buf)? {
        b't' => Ok(AMQPFieldValue::Bool(take_u8(buf)? != 0)),
        b'S' => Ok(AMQPFieldValue::LongString(decode_long_string(buf)?)),
        b'F' => match decode_field_table(buf)? {
            None => Ok(AMQPFieldValue::EmptyFieldTable),
            Some(table) => Ok(AMQPFieldValue::FieldTable(Box::new(table))),
        },
        t => Err(FrameError::Malformed(format!("unknown field value type {}", t))),
    }
}

/// Decode a field table.
///
/// The buffer points to the beginning of the field table which is a `u32`
/// length information.
fn decode_field_table(buf: &mut BytesMut) -> crate::Result<Option<FieldTable>> {
    let ft_len = take_u32(buf)? as usize;

    if ft_len == 0 {
        return Ok(None);
    }

    if buf.remaining() < ft_len {
        malformed!("truncated field table");
    }

    let mut ft_buf = buf.split_to(ft_len);
    let mut table = FieldTable::new();

    while ft_buf.has_remaining() {
        let field_name = decode_short_string(&mut ft_buf)?;
        let field_value = decode_value(&mut ft_buf)?;

        table.insert(field_name, field_value);
    }

    Ok(Some(table))
}

fn decode_method_frame(src: &mut BytesMut, channel: u16) -> crate::Result<AMQPFrame> {
    let class_method = take_u32(src)?;

    let args = match class_method {
        CONNECTION_START => decode_connection_start(src)?,
        CONNECTION_START_OK => decode_connection_start_ok(src)?,
        CONNECTION_TUNE => MethodFrameArgs::ConnectionTune(decode_tune_values(src)?),
        CONNECTION_TUNE_OK => {
            let v = decode_tune_values(src)?;
            MethodFrameArgs::ConnectionTuneOk(ConnectionTuneOkArgs {
                channel_max: v.channel_max,
                frame_max: v.frame_max,
                heartbeat: v.heartbeat,
            })
        }
        CONNECTION_OPEN => decode_connection_open(src)?,
        CONNECTION_OPEN_OK => {
            let _reserved = decode_short_string(src)?;
            MethodFrameArgs::ConnectionOpenOk
        }
        CONNECTION_CLOSE => MethodFrameArgs::ConnectionClose(ConnectionCloseArgs {
            code: take_u16(src)?,
            text: decode_short_string(src)?,
            class_id: take_u16(src)?,
            method_id: take_u16(src)?,
        }),
        CONNECTION_CLOSE_OK => MethodFrameArgs::ConnectionCloseOk,
        CHANNEL_OPEN => {
            let _reserved = decode_short_string(src)?;
            MethodFrameArgs::ChannelOpen
        }
        CHANNEL_OPEN_OK => {
            let _reserved = decode_long_string(src)?;
            MethodFrameArgs::ChannelOpenOk
        }
        CHANNEL_FLOW => MethodFrameArgs::ChannelFlow(ChannelFlowArgs {
            active: take_bool(src)?,
        }),
        CHANNEL_FLOW_OK => MethodFrameArgs::ChannelFlowOk(ChannelFlowOkArgs {
            active: take_bool(src)?,
        }),
        CHANNEL_CLOSE => MethodFrameArgs::ChannelClose(ChannelCloseArgs {
            code: take_u16(src)?,
            text: decode_short_string(src)?,
            class_id: take_u16(src)?,
            method_id: take_u16(src)?,
        }),
        CHANNEL_CLOSE_OK => MethodFrameArgs::ChannelCloseOk,
        EXCHANGE_DECLARE => decode_exchange_declare(src)?,
        EXCHANGE_DECLARE_OK => MethodFrameArgs::ExchangeDeclareOk,
        EXCHANGE_DELETE => decode_exchange_delete(src)?,
        EXCHANGE_DELETE_OK => MethodFrameArgs::ExchangeDeleteOk,
        QUEUE_DECLARE => decode_queue_declare(src)?,
        QUEUE_DECLARE_OK => MethodFrameArgs::QueueDeclareOk(QueueDeclareOkArgs {
            name: decode_short_string(src)?,
            message_count: take_u32(src)?,
            consumer_count: take_u32(src)?,
        }),
        QUEUE_BIND => decode_queue_bind(src)?,
        QUEUE_BIND_OK => MethodFrameArgs::QueueBindOk,
        QUEUE_PURGE => decode_queue_purge(src)?,
        QUEUE_PURGE_OK => MethodFrameArgs::QueuePurgeOk(QueuePurgeOkArgs {
            message_count: take_u32(src)?,
        }),
        QUEUE_DELETE => decode_queue_delete(src)?,
        QUEUE_DELETE_OK => MethodFrameArgs::QueueDeleteOk(QueueDeleteOkArgs {
            message_count: take_u32(src)?,
        }),
        QUEUE_UNBIND => decode_queue_unbind(src)?,
        QUEUE_UNBIND_OK => MethodFrameArgs::QueueUnbindOk,
        BASIC_QOS => MethodFrameArgs::BasicQos(BasicQosArgs {
            prefetch_size: take_u32(src)?,
            prefetch_count: take_u16(src)?,
            global: take_bool(src)?,
        }),
        BASIC_QOS_OK => MethodFrameArgs::BasicQosOk,
        BASIC_CONSUME => decode_basic_consume(src)?,
        BASIC_CONSUME_OK => MethodFrameArgs::BasicConsumeOk(BasicConsumeOkArgs {
            consumer_tag: decode_short_string(src)?,
        }),
        BASIC_CANCEL => MethodFrameArgs::BasicCancel(BasicCancelArgs {
            consumer_tag: decode_short_string(src)?,
            no_wait: take_bool(src)?,
        }),
        BASIC_CANCEL_OK => MethodFrameArgs::BasicCancelOk(BasicCancelOkArgs {
            consumer_tag: decode_short_string(src)?,
        }),
        BASIC_PUBLISH => decode_basic_publish(src)?,
        BASIC_RETURN => MethodFrameArgs::BasicReturn(BasicReturnArgs {
            reply_code: take_u16(src)?,
            reply_text: decode_short_string(src)?,
            exchange_name: decode_short_string(src)?,
            routing_key: decode_short_string(src)?,
        }),
        BASIC_DELIVER => MethodFrameArgs::BasicDeliver(BasicDeliverArgs {
            consumer_tag: decode_short_string(src)?,
            delivery_tag: take_u64(src)?,
            redelivered: take_bool(src)?,
            exchange_name: decode_short_string(src)?,
            routing_key: decode_short_string(src)?,
        }),
        BASIC_GET => decode_basic_get(src)?,
        BASIC_GET_OK => MethodFrameArgs::BasicGetOk(BasicGetOkArgs {
            delivery_tag: take_u64(src)?,
            redelivered: take_bool(src)?,
            exchange_name: decode_short_string(src)?,
            routing_key: decode_short_string(src)?,
            message_count: take_u32(src)?,
        }),
        BASIC_GET_EMPTY => {
            let _reserved = decode_short_string(src)?;
            MethodFrameArgs::BasicGetEmpty
        }
        BASIC_ACK => MethodFrameArgs::BasicAck(BasicAckArgs {
            delivery_tag: take_u64(src)?,
            multiple: take_bool(src)?,
        }),
        BASIC_REJECT => MethodFrameArgs::BasicReject(BasicRejectArgs {
            delivery_tag: take_u64(src)?,
            requeue: take_bool(src)?,
        }),
        BASIC_RECOVER => MethodFrameArgs::BasicRecover(BasicRecoverArgs {
            requeue: take_bool(src)?,
        }),
        BASIC_RECOVER_OK => MethodFrameArgs::BasicRecoverOk,
        BASIC_NACK => decode_basic_nack(src)?,
        TX_SELECT => MethodFrameArgs::TxSelect,
        TX_SELECT_OK => MethodFrameArgs::TxSelectOk,
        TX_COMMIT => MethodFrameArgs::TxCommit,
        TX_COMMIT_OK => MethodFrameArgs::TxCommitOk,
        TX_ROLLBACK => MethodFrameArgs::TxRollback,
        TX_ROLLBACK_OK => MethodFrameArgs::TxRollbackOk,
        CONFIRM_SELECT => MethodFrameArgs::ConfirmSelect(ConfirmSelectArgs {
            no_wait: take_bool(src)?,
        }),
        CONFIRM_SELECT_OK => MethodFrameArgs::ConfirmSelectOk,
        cm => return Err(FrameError::UnknownMethod(cm)),
    };

    Ok(AMQPFrame::Method(channel, class_method, args))
}

fn decode_connection_start(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    Ok(MethodFrameArgs::ConnectionStart(ConnectionStartArgs {
        version_major: take_u8(src)?,
        version_minor: take_u8(src)?,
        properties: decode_field_table(src)?,
        mechanisms: decode_long_string(src)?,
        locales: decode_long_string(src)?,
    }))
}

fn decode_connection_start_ok(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    Ok(MethodFrameArgs::ConnectionStartOk(ConnectionStartOkArgs {
        properties: decode_field_table(src)?,
        mechanism: decode_short_string(src)?,
        response: decode_long_string(src)?,
        locale: decode_short_string(src)?,
    }))
}

fn decode_tune_values(src: &mut BytesMut) -> crate::Result<ConnectionTuneArgs> {
    Ok(ConnectionTuneArgs {
        channel_max: take_u16(src)?,
        frame_max: take_u32(src)?,
        heartbeat: take_u16(src)?,
    })
}

fn decode_connection_open(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let virtual_host = decode_short_string(src)?;
    let _reserved = decode_short_string(src)?;
    let flags = take_u8(src)?;

    Ok(MethodFrameArgs::ConnectionOpen(ConnectionOpenArgs {
        virtual_host,
        insist: flags & 0x01 != 0,
    }))
}

fn decode_exchange_declare(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _reserved = take_u16(src)?;
    let mut args = ExchangeDeclareArgs::default();
    args.exchange_name = decode_short_string(src)?;
    args.exchange_type = decode_short_string(src)?;
    args.flags = ExchangeDeclareFlags::from_bits(take_u8(src)?).unwrap_or_default();
    args.args = decode_field_table(src)?;

    Ok(MethodFrameArgs::ExchangeDeclare(args))
}

fn decode_exchange_delete(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _reserved = take_u16(src)?;
    let mut args = ExchangeDeleteArgs::default();
    args.exchange_name = decode_short_string(src)?;
    args.flags = ExchangeDeleteFlags::from_bits(take_u8(src)?).unwrap_or_default();

    Ok(MethodFrameArgs::ExchangeDelete(args))
}

fn decode_queue_declare(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _reserved = take_u16(src)?;
    let mut args = QueueDeclareArgs::default();
    args.name = decode_short_string(src)?;
    args.flags = QueueDeclareFlags::from_bits(take_u8(src)?).unwrap_or_default();
    args.args = decode_field_table(src)?;

    Ok(MethodFrameArgs::QueueDeclare(args))
}

fn decode_queue_bind(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _reserved = take_u16(src)?;
    let mut args = QueueBindArgs::default();
    args.queue_name = decode_short_string(src)?;
    args.exchange_name = decode_short_string(src)?;
    args.routing_key = decode_short_string(src)?;
    args.no_wait = take_bool(src)?;
    args.args = decode_field_table(src)?;

    Ok(MethodFrameArgs::QueueBind(args))
}

fn decode_queue_purge(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _reserved = take_u16(src)?;

    Ok(MethodFrameArgs::QueuePurge(QueuePurgeArgs {
        queue_name: decode_short_string(src)?,
        no_wait: take_bool(src)?,
    }))
}

fn decode_queue_delete(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _reserved = take_u16(src)?;
    let mut args = QueueDeleteArgs::default();
    args.queue_name = decode_short_string(src)?;
    args.flags = QueueDeleteFlags::from_bits(take_u8(src)?).unwrap_or_default();

    Ok(MethodFrameArgs::QueueDelete(args))
}

fn decode_queue_unbind(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _reserved = take_u16(src)?;
    let mut args = QueueUnbindArgs::default();
    args.queue_name = decode_short_string(src)?;
    args.exchange_name = decode_short_string(src)?;
    args.routing_key = decode_short_string(src)?;
    args.args = decode_field_table(src)?;

    Ok(MethodFrameArgs::QueueUnbind(args))
}

fn decode_basic_consume(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _reserved = take_u16(src)?;
    let mut args = BasicConsumeArgs::default();
    args.queue = decode_short_string(src)?;
    args.consumer_tag = decode_short_string(src)?;
    args.flags = BasicConsumeFlags::from_bits(take_u8(src)?).unwrap_or_default();
    args.args = decode_field_table(src)?;

    Ok(MethodFrameArgs::BasicConsume(args))
}

fn decode_basic_publish(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _reserved = take_u16(src)?;
    let mut args = BasicPublishArgs::default();
    args.exchange_name = decode_short_string(src)?;
    args.routing_key = decode_short_string(src)?;
    args.flags = BasicPublishFlags::from_bits(take_u8(src)?).unwrap_or_default();

    Ok(MethodFrameArgs::BasicPublish(args))
}

fn decode_basic_get(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _reserved = take_u16(src)?;

    Ok(MethodFrameArgs::BasicGet(BasicGetArgs {
        queue: decode_short_string(src)?,
        no_ack: take_bool(src)?,
    }))
}

fn decode_basic_nack(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let mut args = BasicNackArgs::default();
    args.delivery_tag = take_u64(src)?;
    args.flags = BasicNackFlags::from_bits(take_u8(src)?).unwrap_or_default();

    Ok(MethodFrameArgs::BasicNack(args))
}

fn decode_content_header_frame(src: &mut BytesMut, channel: u16) -> crate::Result<AMQPFrame> {
    let mut header = ContentHeaderFrame {
        channel,
        class_id: take_u16(src)?,
        weight: take_u16(src)?,
        body_size: take_u64(src)?,
        prop_flags: HeaderPropertyFlags::from_bits_truncate(take_u16(src)?),
        ..Default::default()
    };

    if header.prop_flags.contains(HeaderPropertyFlags::CONTENT_TYPE) {
        header.content_type = Some(decode_short_string(src)?);
    }
    if header.prop_flags.contains(HeaderPropertyFlags::CONTENT_ENCODING) {
        header.content_encoding = Some(decode_short_string(src)?);
    }
    if header.prop_flags.contains(HeaderPropertyFlags::HEADERS) {
        header.headers = decode_field_table(src)?;
    }
    if header.prop_flags.contains(HeaderPropertyFlags::DELIVERY_MODE) {
        header.delivery_mode = Some(take_u8(src)?);
    }
    if header.prop_flags.contains(HeaderPropertyFlags::PRIORITY) {
        header.priority = Some(take_u8(src)?);
    }
    if header.prop_flags.contains(HeaderPropertyFlags::CORRELATION_ID) {
        header.correlation_id = Some(decode_short_string(src)?);
    }
    if header.prop_flags.contains(HeaderPropertyFlags::REPLY_TO) {
        header.reply_to = Some(decode_short_string(src)?);
    }
    if header.prop_flags.contains(HeaderPropertyFlags::EXPIRATION) {
        header.expiration = Some(decode_short_string(src)?);
    }
    if header.prop_flags.contains(HeaderPropertyFlags::MESSAGE_ID) {
        header.message_id = Some(decode_short_string(src)?);
    }
    if header.prop_flags.contains(HeaderPropertyFlags::TIMESTAMP) {
        header.timestamp = Some(take_u64(src)?);
    }
    if header.prop_flags.contains(HeaderPropertyFlags::MESSAGE_TYPE) {
        header.message_type = Some(decode_short_string(src)?);
    }
    if header.prop_flags.contains(HeaderPropertyFlags::USER_ID) {
        header.user_id = Some(decode_short_string(src)?);
    }
    if header.prop_flags.contains(HeaderPropertyFlags::APP_ID) {
        header.app_id = Some(decode_short_string(src)?);
    }
    if header.prop_flags.contains(HeaderPropertyFlags::CLUSTER_ID) {
        header.cluster_id = Some(decode_short_string(src)?);
    }

    Ok(AMQPFrame::ContentHeader(header))
}

fn encode_amqp_frame(buf: &mut BytesMut, frame: AMQPFrame) {
    match frame {
        AMQPFrame::Header => buf.put(PROTOCOL_HEADER),

        AMQPFrame::Method(ch, cm, args) => encode_method_frame(buf, ch, cm, &args),

        AMQPFrame::ContentHeader(header_frame) => encode_content_header_frame(buf, &header_frame),

        AMQPFrame::ContentBody(body_frame) => encode_content_body_frame(buf, &body_frame),

        AMQPFrame::Heartbeat(channel) => encode_heartbeat_frame(buf, channel),
    }
}

fn encode_method_frame(buf: &mut BytesMut, channel: Channel, cm: ClassMethod, args: &MethodFrameArgs) {
    buf.put_u8(FRAME_METHOD);
    buf.put_u16(channel);

    let mut fr = BytesMut::with_capacity(4096);
    fr.put_u32(cm);

    match args {
        MethodFrameArgs::ConnectionStart(args) => encode_connection_start(&mut fr, args),
        MethodFrameArgs::ConnectionStartOk(args) => encode_connection_start_ok(&mut fr, args),
        MethodFrameArgs::ConnectionTune(args) => encode_tune_values(&mut fr, args.channel_max, args.frame_max, args.heartbeat),
        MethodFrameArgs::ConnectionTuneOk(args) => encode_tune_values(&mut fr, args.channel_max, args.frame_max, args.heartbeat),
        MethodFrameArgs::ConnectionOpen(args) => encode_connection_open(&mut fr, args),
        MethodFrameArgs::ConnectionOpenOk => encode_short_string(&mut fr, ""),
        MethodFrameArgs::ConnectionClose(args) => encode_connection_close(&mut fr, args),
        MethodFrameArgs::ConnectionCloseOk => (),
        MethodFrameArgs::ChannelOpen => encode_short_string(&mut fr, ""),
        MethodFrameArgs::ChannelOpenOk => encode_long_string(&mut fr, ""),
        MethodFrameArgs::ChannelFlow(args) => fr.put_u8(args.active as u8),
        MethodFrameArgs::ChannelFlowOk(args) => fr.put_u8(args.active as u8),
        MethodFrameArgs::ChannelClose(args) => encode_channel_close(&mut fr, args),
        MethodFrameArgs::ChannelCloseOk => (),
        MethodFrameArgs::ExchangeDeclare(args) => encode_exchange_declare(&mut fr, args),
        MethodFrameArgs::ExchangeDeclareOk => (),
        MethodFrameArgs::ExchangeDelete(args) => encode_exchange_delete(&mut fr, args),
        MethodFrameArgs::ExchangeDeleteOk => (),
        MethodFrameArgs::QueueDeclare(args) => encode_queue_declare(&mut fr, args),
        MethodFrameArgs::QueueDeclareOk(args) => encode_queue_declare_ok(&mut fr, args),
        MethodFrameArgs::QueueBind(args) => encode_queue_bind(&mut fr, args),
        MethodFrameArgs::QueueBindOk => (),
        MethodFrameArgs::QueuePurge(args) => encode_queue_purge(&mut fr, args),
        MethodFrameArgs::QueuePurgeOk(args) => fr.put_u32(args.message_count),
        MethodFrameArgs::QueueDelete(args) => encode_queue_delete(&mut fr, args),
        MethodFrameArgs::QueueDeleteOk(args) => fr.put_u32(args.message_count),
        MethodFrameArgs::QueueUnbind(args) => encode_queue_unbind(&mut fr, args),
        MethodFrameArgs::QueueUnbindOk => (),
        MethodFrameArgs::BasicQos(args) => encode_basic_qos(&mut fr, args),
        MethodFrameArgs::BasicQosOk => (),
        MethodFrameArgs::BasicConsume(args) => encode_basic_consume(&mut fr, args),
        MethodFrameArgs::BasicConsumeOk(args) => encode_short_string(&mut fr, &args.consumer_tag),
        MethodFrameArgs::BasicCancel(args) => encode_basic_cancel(&mut fr, args),
        MethodFrameArgs::BasicCancelOk(args) => encode_short_string(&mut fr, &args.consumer_tag),
        MethodFrameArgs::BasicPublish(args) => encode_basic_publish(&mut fr, args),
        MethodFrameArgs::BasicReturn(args) => encode_basic_return(&mut fr, args),
        MethodFrameArgs::BasicDeliver(args) => encode_basic_deliver(&mut fr, args),
        MethodFrameArgs::BasicGet(args) => encode_basic_get(&mut fr, args),
        MethodFrameArgs::BasicGetOk(args) => encode_basic_get_ok(&mut fr, args),
        MethodFrameArgs::BasicGetEmpty => encode_short_string(&mut fr, ""),
        MethodFrameArgs::BasicAck(args) => {
            fr.put_u64(args.delivery_tag);
            fr.put_u8(args.multiple as u8);
        }
        MethodFrameArgs::BasicReject(args) => {
            fr.put_u64(args.delivery_tag);
            fr.put_u8(args.requeue as u8);
        }
        MethodFrameArgs::BasicRecover(args) => fr.put_u8(args.requeue as u8),
        MethodFrameArgs::BasicRecoverOk => (),
        MethodFrameArgs::BasicNack(args) => {
            fr.put_u64(args.delivery_tag);
            fr.put_u8(args.flags.bits());
        }
        MethodFrameArgs::TxSelect
        | MethodFrameArgs::TxSelectOk
        | MethodFrameArgs::TxCommit
        | MethodFrameArgs::TxCommitOk
        | MethodFrameArgs::TxRollback
        | MethodFrameArgs::TxRollbackOk => (),
        MethodFrameArgs::ConfirmSelect(args) => fr.put_u8(args.no_wait as u8),
        MethodFrameArgs::ConfirmSelectOk => (),
    }

    buf.put_u32(fr.len() as u32);
    buf.put(fr);
    buf.put_u8(FRAME_END);
}

fn encode_connection_start(buf: &mut BytesMut, args: &ConnectionStartArgs) {
    buf.put_u8(args.version_major);
    buf.put_u8(args.version_minor);
    encode_field_table(buf, args.properties.as_ref());
    encode_long_string(buf, &args.mechanisms);
    encode_long_string(buf, &args.locales);
}

fn encode_connection_start_ok(buf: &mut BytesMut, args: &ConnectionStartOkArgs) {
    encode_field_table(buf, args.properties.as_ref());
    encode_short_string(buf, &args.mechanism);
    encode_long_string(buf, &args.response);
    encode_short_string(buf, &args.locale);
}

fn encode_tune_values(buf: &mut BytesMut, channel_max: u16, frame_max: u32, heartbeat: u16) {
    buf.put_u16(channel_max);
    buf.put_u32(frame_max);
    buf.put_u16(heartbeat);
}

fn encode_connection_open(buf: &mut BytesMut, args: &ConnectionOpenArgs) {
    encode_short_string(buf, &args.virtual_host);
    encode_short_string(buf, "");
    buf.put_u8(args.insist as u8);
}

fn encode_connection_close(buf: &mut BytesMut, args: &ConnectionCloseArgs) {
    buf.put_u16(args.code);
    encode_short_string(buf, &args.text);
    buf.put_u16(args.class_id);
    buf.put_u16(args.method_id);
}

fn encode_channel_close(buf: &mut BytesMut, args: &ChannelCloseArgs) {
    buf.put_u16(args.code);
    encode_short_string(buf, &args.text);
    buf.put_u16(args.class_id);
    buf.put_u16(args.method_id);
}

fn encode_exchange_declare(buf: &mut BytesMut, args: &ExchangeDeclareArgs) {
    buf.put_u16(0);
    encode_short_string(buf, &args.exchange_name);
    encode_short_string(buf, &args.exchange_type);
    buf.put_u8(args.flags.bits());
    encode_field_table(buf, args.args.as_ref());
}

fn encode_exchange_delete(buf: &mut BytesMut, args: &ExchangeDeleteArgs) {
    buf.put_u16(0);
    encode_short_string(buf, &args.exchange_name);
    buf.put_u8(args.flags.bits());
}

fn encode_queue_declare(buf: &mut BytesMut, args: &QueueDeclareArgs) {
    buf.put_u16(0);
    encode_short_string(buf, &args.name);
    buf.put_u8(args.flags.bits());
    encode_field_table(buf, args.args.as_ref());
}

fn encode_queue_declare_ok(buf: &mut BytesMut, args: &QueueDeclareOkArgs) {
    encode_short_string(buf, &args.name);
    buf.put_u32(args.message_count);
    buf.put_u32(args.consumer_count);
}

fn encode_queue_bind(buf: &mut BytesMut, args: &QueueBindArgs) {
    buf.put_u16(0);
    encode_short_string(buf, &args.queue_name);
    encode_short_string(buf, &args.exchange_name);
    encode_short_string(buf, &args.routing_key);
    buf.put_u8(args.no_wait as u8);
    encode_field_table(buf, args.args.as_ref());
}

fn encode_queue_purge(buf: &mut BytesMut, args: &QueuePurgeArgs) {
    buf.put_u16(0);
    encode_short_string(buf, &args.queue_name);
    buf.put_u8(args.no_wait as u8);
}

fn encode_queue_delete(buf: &mut BytesMut, args: &QueueDeleteArgs) {
    buf.put_u16(0);
    encode_short_string(buf, &args.queue_name);
    buf.put_u8(args.flags.bits());
}

fn encode_queue_unbind(buf: &mut BytesMut, args: &QueueUnbindArgs) {
    buf.put_u16(0);
    encode_short_string(buf, &args.queue_name);
    encode_short_string(buf, &args.exchange_name);
    encode_short_string(buf, &args.routing_key);
    encode_field_table(buf, args.args.as_ref());
}

fn encode_basic_qos(buf: &mut BytesMut, args: &BasicQosArgs) {
    buf.put_u32(args.prefetch_size);
    buf.put_u16(args.prefetch_count);
    buf.put_u8(args.global as u8);
}

fn encode_basic_consume(buf: &mut BytesMut, args: &BasicConsumeArgs) {
    buf.put_u16(0);
    encode_short_string(buf, &args.queue);
    encode_short_string(buf, &args.consumer_tag);
    buf.put_u8(args.flags.bits());
    encode_field_table(buf, args.args.as_ref());
}

fn encode_basic_cancel(buf: &mut BytesMut, args: &BasicCancelArgs) {
    encode_short_string(buf, &args.consumer_tag);
    buf.put_u8(args.no_wait as u8);
}

fn encode_basic_publish(buf: &mut BytesMut, args: &BasicPublishArgs) {
    buf.put_u16(0);
    encode_short_string(buf, &args.exchange_name);
    encode_short_string(buf, &args.routing_key);
    buf.put_u8(args.flags.bits());
}

fn encode_basic_return(buf: &mut BytesMut, args: &BasicReturnArgs) {
    buf.put_u16(args.reply_code);
    encode_short_string(buf, &args.reply_text);
    encode_short_string(buf, &args.exchange_name);
    encode_short_string(buf, &args.routing_key);
}

fn encode_basic_deliver(buf: &mut BytesMut, args: &BasicDeliverArgs) {
    encode_short_string(buf, &args.consumer_tag);
    buf.put_u64(args.delivery_tag);
    buf.put_u8(args.redelivered as u8);
    encode_short_string(buf, &args.exchange_name);
    encode_short_string(buf, &args.routing_key);
}

fn encode_basic_get(buf: &mut BytesMut, args: &BasicGetArgs) {
    buf.put_u16(0);
    encode_short_string(buf, &args.queue);
    buf.put_u8(args.no_ack as u8);
}

fn encode_basic_get_ok(buf: &mut BytesMut, args: &BasicGetOkArgs) {
    buf.put_u64(args.delivery_tag);
    buf.put_u8(args.redelivered as u8);
    encode_short_string(buf, &args.exchange_name);
    encode_short_string(buf, &args.routing_key);
    buf.put_u32(args.message_count);
}

fn encode_content_header_frame(buf: &mut BytesMut, hf: &ContentHeaderFrame) {
    buf.put_u8(FRAME_CONTENT_HEADER);
    buf.put_u16(hf.channel);

    let mut fr = BytesMut::with_capacity(4096);
    fr.put_u16(hf.class_id);
    fr.put_u16(hf.weight);
    fr.put_u64(hf.body_size);
    fr.put_u16(hf.prop_flags.bits());

    if hf.prop_flags.contains(HeaderPropertyFlags::CONTENT_TYPE) {
        encode_short_string(&mut fr, hf.content_type.as_deref().unwrap_or(""));
    }
    if hf.prop_flags.contains(HeaderPropertyFlags::CONTENT_ENCODING) {
        encode_short_string(&mut fr, hf.content_encoding.as_deref().unwrap_or(""));
    }
    if hf.prop_flags.contains(HeaderPropertyFlags::HEADERS) {
        encode_field_table(&mut fr, hf.headers.as_ref());
    }
    if hf.prop_flags.contains(HeaderPropertyFlags::DELIVERY_MODE) {
        fr.put_u8(hf.delivery_mode.unwrap_or(1));
    }
    if hf.prop_flags.contains(HeaderPropertyFlags::PRIORITY) {
        fr.put_u8(hf.priority.unwrap_or(0));
    }
    if hf.prop_flags.contains(HeaderPropertyFlags::CORRELATION_ID) {
        encode_short_string(&mut fr, hf.correlation_id.as_deref().unwrap_or(""));
    }
    if hf.prop_flags.contains(HeaderPropertyFlags::REPLY_TO) {
        encode_short_string(&mut fr, hf.reply_to.as_deref().unwrap_or(""));
    }
    if hf.prop_flags.contains(HeaderPropertyFlags::EXPIRATION) {
        encode_short_string(&mut fr, hf.expiration.as_deref().unwrap_or(""));
    }
    if hf.prop_flags.contains(HeaderPropertyFlags::MESSAGE_ID) {
        encode_short_string(&mut fr, hf.message_id.as_deref().unwrap_or(""));
    }
    if hf.prop_flags.contains(HeaderPropertyFlags::TIMESTAMP) {
        fr.put_u64(hf.timestamp.unwrap_or(0));
    }
    if hf.prop_flags.contains(HeaderPropertyFlags::MESSAGE_TYPE) {
        encode_short_string(&mut fr, hf.message_type.as_deref().unwrap_or(""));
    }
    if hf.prop_flags.contains(HeaderPropertyFlags::USER_ID) {
        encode_short_string(&mut fr, hf.user_id.as_deref().unwrap_or(""));
    }
    if hf.prop_flags.contains(HeaderPropertyFlags::APP_ID) {
        encode_short_string(&mut fr, hf.app_id.as_deref().unwrap_or(""));
    }
    if hf.prop_flags.contains(HeaderPropertyFlags::CLUSTER_ID) {
        encode_short_string(&mut fr, hf.cluster_id.as_deref().unwrap_or(""));
    }

    buf.put_u32(fr.len() as u32);
    buf.put(fr);
    buf.put_u8(FRAME_END);
}

fn encode_content_body_frame(buf: &mut BytesMut, bf: &ContentBodyFrame) {
    buf.reserve(bf.body.len() + 8);
    buf.put_u8(FRAME_CONTENT_BODY);
    buf.put_u16(bf.channel);
    buf.put_u32(bf.body.len() as u32);
    buf.put(bf.body.as_slice());
    buf.put_u8(FRAME_END);
}

fn encode_heartbeat_frame(buf: &mut BytesMut, channel: Channel) {
    buf.put_u8(FRAME_HEARTBEAT);
    buf.put_u16(channel);
    buf.put_u32(0);
    buf.put_u8(FRAME_END);
}

fn encode_short_string(buf: &mut BytesMut, s: &str) {
    debug_assert!(s.len() < 256);
    buf.put_u8(s.len() as u8);
    buf.put(s.as_bytes());
}

fn encode_long_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put(s.as_bytes());
}

fn encode_field_table(buf: &mut BytesMut, ft: Option<&FieldTable>) {
    match ft {
        None => buf.put_u32(0),
        Some(t) => {
            let mut ft_buf = BytesMut::with_capacity(4096);

            for (name, value) in t {
                encode_short_string(&mut ft_buf, name);
                encode_field_value(&mut ft_buf, value);
            }

            buf.put_u32(ft_buf.len() as u32);
            buf.put(ft_buf);
        }
    }
}

fn encode_field_value(buf: &mut BytesMut, value: &AMQPFieldValue) {
    match value {
        AMQPFieldValue::Bool(v) => {
            buf.put_u8(b't');
            buf.put_u8(*v as u8);
        }
        AMQPFieldValue::LongString(v) => {
            buf.put_u8(b'S');
            encode_long_string(buf, v);
        }
        AMQPFieldValue::EmptyFieldTable => {
            buf.put_u8(b'F');
            buf.put_u32(0);
        }
        AMQPFieldValue::FieldTable(v) => {
            buf.put_u8(b'F');
            encode_field_table(buf, Some(v));
        }
    }
}
