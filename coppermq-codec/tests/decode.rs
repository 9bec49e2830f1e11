use bytes::{BufMut, BytesMut};
use coppermq_codec::codec::{AMQPCodec, Frame};
use coppermq_codec::frame::{self, AMQPFrame};
use tokio_util::codec::{Decoder, Encoder};

/// Encode a handful of frames into one byte run and feed it back to the
/// decoder in fixed size chunks, the way a socket would deliver it.
#[test]
fn decode_stream_in_chunks() {
    let mut encoder = AMQPCodec::new();
    let mut wire = BytesMut::new();

    let outgoing = vec![
        AMQPFrame::Header,
        frame::channel_open(1),
        frame::QueueDeclareArgs::default().name("inbox").frame(1),
        frame::BasicPublishArgs::new("").routing_key("inbox").frame(1),
        AMQPFrame::Heartbeat(0),
    ];
    let frame_count = outgoing.len();

    encoder.encode(Frame::Frames(outgoing), &mut wire).unwrap();

    for chunk_size in [1usize, 3, 7, 64] {
        let mut decoder = AMQPCodec::new();
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        let mut rest = &wire[..];

        while !rest.is_empty() {
            let n = std::cmp::min(chunk_size, rest.len());
            buf.put(&rest[..n]);
            rest = &rest[n..];

            while let Some(Frame::Frame(frame)) = decoder.decode(&mut buf).unwrap() {
                decoded.push(frame);
            }
        }

        assert_eq!(frame_count, decoded.len(), "chunk size {}", chunk_size);
        assert!(matches!(decoded[0], AMQPFrame::Header));
        assert!(matches!(decoded[1], AMQPFrame::Method(1, frame::CHANNEL_OPEN, _)));
        assert!(matches!(decoded[4], AMQPFrame::Heartbeat(0)));
    }
}

#[test]
fn decode_protocol_header_rejects_wrong_version() {
    let mut decoder = AMQPCodec::new();
    let mut buf = BytesMut::new();
    buf.put(&b"AMQP\x01\x01\x00\x00"[..]);

    assert!(decoder.decode(&mut buf).is_err());
}

#[test]
fn decode_content_frames_of_a_delivery() {
    let mut encoder = AMQPCodec::new();
    let mut buf = BytesMut::new();

    let header = frame::ContentHeaderFrame {
        channel: 4,
        class_id: 0x3C,
        body_size: 5,
        ..Default::default()
    };

    encoder
        .encode(
            Frame::Frames(vec![
                frame::BasicDeliverArgs::new("ctag", 1, "x").frame(4),
                header.frame(),
                frame::ContentBodyFrame {
                    channel: 4,
                    body: b"hello".to_vec(),
                }
                .frame(),
            ]),
            &mut buf,
        )
        .unwrap();

    let mut decoder = AMQPCodec::new();

    assert!(matches!(
        decoder.decode(&mut buf).unwrap(),
        Some(Frame::Frame(AMQPFrame::Method(4, frame::BASIC_DELIVER, _)))
    ));

    match decoder.decode(&mut buf).unwrap() {
        Some(Frame::Frame(AMQPFrame::ContentHeader(h))) => {
            assert_eq!(4, h.channel);
            assert_eq!(5, h.body_size);
        }
        other => panic!("expected content header, got {:?}", other),
    }

    match decoder.decode(&mut buf).unwrap() {
        Some(Frame::Frame(AMQPFrame::ContentBody(b))) => {
            assert_eq!(b"hello".to_vec(), b.body);
        }
        other => panic!("expected content body, got {:?}", other),
    }
}
