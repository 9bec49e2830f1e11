use coppermq_client::{Connection, ConnectionOptions};
use coppermq_codec::codec::Frame;
use coppermq_codec::frame::{self, AMQPFrame, MethodFrameArgs};
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// A connection driven through the whole opening handshake, with the
/// emitted frames drained.
pub fn connected() -> (Connection, UnboundedReceiver<Frame>) {
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
    let mut conn = Connection::new(ConnectionOptions::default(), frame_tx);

    conn.start().unwrap();
    conn.handle_frame(frame::ConnectionStartArgs::default().frame()).unwrap();
    conn.handle_frame(
        frame::ConnectionTuneArgs {
            channel_max: 2047,
            frame_max: 131_072,
            heartbeat: 60,
        }
        .frame(),
    )
    .unwrap();
    conn.handle_frame(frame::connection_open_ok()).unwrap();

    drain(&mut frame_rx);

    (conn, frame_rx)
}

/// Open a channel on the connection and confirm it, leaving the outgoing
/// queue empty.
pub fn open_channel(conn: &mut Connection, rx: &mut UnboundedReceiver<Frame>, id: u16) {
    conn.open_channel(id, None).unwrap();
    conn.handle_frame(frame::channel_open_ok(id)).unwrap();

    drain(rx);
}

pub fn next_method(rx: &mut UnboundedReceiver<Frame>) -> (u16, u32, MethodFrameArgs) {
    match rx.try_recv().unwrap() {
        Frame::Frame(AMQPFrame::Method(ch, cm, args)) => (ch, cm, args),
        other => panic!("expected a method frame, got {:?}", other),
    }
}

pub fn drain(rx: &mut UnboundedReceiver<Frame>) {
    while rx.try_recv().is_ok() {}
}
