use bencher::Bencher;
use bytes::BytesMut;
use coppermq_codec::codec::{AMQPCodec, Frame};
use coppermq_codec::frame;
use tokio_util::codec::Encoder;

fn encode_method_frame(b: &mut Bencher) {
    let mut codec = AMQPCodec::new();

    b.iter(move || {
        let frame = generate_frame();
        let mut buf = BytesMut::with_capacity(1024);

        codec.encode(frame, &mut buf)
    });
}

fn generate_frame() -> Frame {
    Frame::Frame(frame::QueueDeclareArgs::default().name("test queue").frame(12))
}

bencher::benchmark_group!(encoder, encode_method_frame);

bencher::benchmark_main!(encoder);
