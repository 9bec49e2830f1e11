mod helper;

use std::sync::{Arc, Mutex};

use coppermq_client::{ChannelStatus, Entity, Event};
use coppermq_codec::frame::{self, MethodFrameArgs};

#[test]
fn open_flow_and_transactions_on_one_channel() {
    let (mut conn, mut rx) = helper::connected();
    let order = Arc::new(Mutex::new(Vec::new()));

    let sink = order.clone();
    conn.open_channel(
        1,
        Some(Box::new(move |_, _| sink.lock().unwrap().push("open"))),
    )
    .unwrap();

    assert!(matches!(helper::next_method(&mut rx), (1, frame::CHANNEL_OPEN, _)));

    conn.handle_frame(frame::channel_open_ok(1)).unwrap();

    assert_eq!(ChannelStatus::Opened, conn.channel(1).unwrap().status());

    let sink = order.clone();
    conn.channel_mut(1)
        .unwrap()
        .flow(false, Some(Box::new(move |_, _| sink.lock().unwrap().push("flow"))))
        .unwrap();

    assert!(matches!(helper::next_method(&mut rx), (1, frame::CHANNEL_FLOW, _)));

    conn.handle_frame(frame::ChannelFlowOkArgs::new(false).frame(1)).unwrap();

    assert!(!conn.channel(1).unwrap().is_flow_active());

    let sink = order.clone();
    conn.channel_mut(1)
        .unwrap()
        .tx_select(Some(Box::new(move |_, _| sink.lock().unwrap().push("tx_select"))))
        .unwrap();
    conn.handle_frame(frame::tx_select_ok(1)).unwrap();

    let sink = order.clone();
    conn.channel_mut(1)
        .unwrap()
        .tx_commit(Some(Box::new(move |_, _| sink.lock().unwrap().push("tx_commit"))))
        .unwrap();
    conn.handle_frame(frame::tx_commit_ok(1)).unwrap();

    assert_eq!(vec!["open", "flow", "tx_select", "tx_commit"], *order.lock().unwrap());
}

#[test]
fn qos_and_recover_confirmations_fire_their_hooks() {
    let (mut conn, mut rx) = helper::connected();

    helper::open_channel(&mut conn, &mut rx, 1);

    let confirmed = Arc::new(Mutex::new(Vec::new()));

    let sink = confirmed.clone();
    conn.channel_mut(1)
        .unwrap()
        .qos(None, Some(Box::new(move |_, _| sink.lock().unwrap().push("qos"))))
        .unwrap();

    match helper::next_method(&mut rx) {
        (1, frame::BASIC_QOS, MethodFrameArgs::BasicQos(args)) => {
            assert_eq!(0, args.prefetch_size);
            assert_eq!(32, args.prefetch_count);
            assert!(!args.global);
        }
        other => panic!("expected qos, got {:?}", other),
    }

    conn.handle_frame(frame::basic_qos_ok(1)).unwrap();

    let sink = confirmed.clone();
    conn.channel_mut(1)
        .unwrap()
        .recover(true, Some(Box::new(move |_, _| sink.lock().unwrap().push("recover"))))
        .unwrap();

    conn.handle_frame(frame::basic_recover_ok(1)).unwrap();

    assert_eq!(vec!["qos", "recover"], *confirmed.lock().unwrap());
}

#[test]
fn caller_close_confirms_and_removes_the_channel() {
    let (mut conn, mut rx) = helper::connected();

    helper::open_channel(&mut conn, &mut rx, 1);

    let closed = Arc::new(Mutex::new(false));
    let sink = closed.clone();

    conn.channel_mut(1)
        .unwrap()
        .close(Some(Box::new(move |_, _| *sink.lock().unwrap() = true)))
        .unwrap();

    match helper::next_method(&mut rx) {
        (1, frame::CHANNEL_CLOSE, MethodFrameArgs::ChannelClose(args)) => {
            assert_eq!(200, args.code);
            assert_eq!("Goodbye", args.text);
        }
        other => panic!("expected channel close, got {:?}", other),
    }

    assert_eq!(ChannelStatus::Closing, conn.channel(1).unwrap().status());

    conn.handle_frame(frame::channel_close_ok(1)).unwrap();

    assert!(*closed.lock().unwrap());
    assert!(conn.channel(1).is_none());
}

#[test]
fn confirm_mode_routes_publish_acks() {
    let (mut conn, mut rx) = helper::connected();

    helper::open_channel(&mut conn, &mut rx, 1);

    let acks = Arc::new(Mutex::new(Vec::new()));

    conn.channel_mut(1)
        .unwrap()
        .confirm_select(None)
        .unwrap();
    conn.handle_frame(frame::confirm_select_ok(1)).unwrap();

    let sink = acks.clone();
    conn.channel_mut(1).unwrap().on(
        Event::Ack,
        Box::new(move |_, reply| {
            if let MethodFrameArgs::BasicAck(args) = reply {
                sink.lock().unwrap().push((args.delivery_tag, args.multiple));
            }
        }),
    );

    conn.handle_frame(frame::BasicAckArgs::default().delivery_tag(1).frame(1)).unwrap();
    conn.handle_frame(
        frame::BasicAckArgs::default()
            .delivery_tag(3)
            .multiple(true)
            .frame(1),
    )
    .unwrap();

    assert_eq!(vec![(1, false), (3, true)], *acks.lock().unwrap());
}
