mod helper;

use std::sync::{Arc, Mutex};

use coppermq_client::{Exchange, ExchangeType, GetSignal, Queue, QueueStatus};
use coppermq_codec::frame::{self, MethodFrameArgs};

#[test]
fn server_named_queues_correlate_in_declare_order() {
    let (mut conn, mut rx) = helper::connected();

    helper::open_channel(&mut conn, &mut rx, 1);

    let names = Arc::new(Mutex::new(Vec::new()));

    for _ in 0..2 {
        let sink = names.clone();
        conn.channel_mut(1)
            .unwrap()
            .queue_declare(
                Queue::new("").exclusive(true),
                Some(Box::new(move |queue, _| {
                    sink.lock().unwrap().push(queue.name.clone());
                })),
            )
            .unwrap();
    }

    conn.handle_frame(frame::QueueDeclareOkArgs::default().name("amq.gen-1").frame(1))
        .unwrap();
    conn.handle_frame(frame::QueueDeclareOkArgs::default().name("amq.gen-2").frame(1))
        .unwrap();

    assert_eq!(vec!["amq.gen-1", "amq.gen-2"], *names.lock().unwrap());

    let channel = conn.channel(1).unwrap();
    assert_eq!(QueueStatus::Declared, channel.queue("amq.gen-1").unwrap().status());
    assert_eq!(QueueStatus::Declared, channel.queue("amq.gen-2").unwrap().status());
}

#[test]
fn bind_purge_and_delete_follow_the_queue() {
    let (mut conn, mut rx) = helper::connected();

    helper::open_channel(&mut conn, &mut rx, 1);

    let events = Arc::new(Mutex::new(Vec::new()));

    let sink = events.clone();
    conn.channel_mut(1)
        .unwrap()
        .exchange_declare(
            Exchange::new("logs", ExchangeType::Topic),
            Some(Box::new(move |exchange, _| {
                sink.lock().unwrap().push(format!("exchange:{}", exchange.name));
            })),
        )
        .unwrap();
    conn.handle_frame(frame::exchange_declare_ok(1)).unwrap();

    conn.channel_mut(1)
        .unwrap()
        .queue_declare(Queue::new("inbox"), None)
        .unwrap();
    conn.handle_frame(frame::QueueDeclareOkArgs::default().name("inbox").frame(1))
        .unwrap();

    let sink = events.clone();
    conn.channel_mut(1)
        .unwrap()
        .queue_bind(
            "inbox",
            "logs",
            "a.#",
            Some(Box::new(move |queue, _| {
                sink.lock().unwrap().push(format!("bind:{}", queue.name));
            })),
        )
        .unwrap();
    conn.handle_frame(frame::queue_bind_ok(1)).unwrap();

    let sink = events.clone();
    conn.channel_mut(1)
        .unwrap()
        .queue_purge(
            "inbox",
            Some(Box::new(move |_, reply| {
                if let MethodFrameArgs::QueuePurgeOk(args) = reply {
                    sink.lock().unwrap().push(format!("purge:{}", args.message_count));
                }
            })),
        )
        .unwrap();
    conn.handle_frame(frame::QueuePurgeOkArgs::default().message_count(7).frame(1))
        .unwrap();

    let sink = events.clone();
    conn.channel_mut(1)
        .unwrap()
        .queue_delete(
            "inbox",
            false,
            false,
            Some(Box::new(move |_, reply| {
                if let MethodFrameArgs::QueueDeleteOk(args) = reply {
                    sink.lock().unwrap().push(format!("delete:{}", args.message_count));
                }
            })),
        )
        .unwrap();
    conn.handle_frame(frame::QueueDeleteOkArgs::default().message_count(0).frame(1))
        .unwrap();

    assert_eq!(
        vec!["exchange:logs", "bind:inbox", "purge:7", "delete:0"],
        *events.lock().unwrap()
    );
    assert!(conn.channel(1).unwrap().queue("inbox").is_none());
    assert!(conn.channel(1).unwrap().exchange("logs").is_some());
}

#[test]
fn get_delivers_a_message_or_reports_empty() {
    let (mut conn, mut rx) = helper::connected();

    helper::open_channel(&mut conn, &mut rx, 1);

    let responses = Arc::new(Mutex::new(Vec::new()));

    let sink = responses.clone();
    conn.channel_mut(1)
        .unwrap()
        .basic_get(
            "inbox",
            false,
            Box::new(move |_, signal| match signal {
                GetSignal::GetOk(message) => sink.lock().unwrap().push(format!(
                    "ok:{}:{}",
                    message.delivery_tag,
                    String::from_utf8_lossy(&message.message.body)
                )),
                GetSignal::GetEmpty => sink.lock().unwrap().push("empty".to_string()),
            }),
        )
        .unwrap();

    conn.handle_frame(frame::BasicGetOkArgs::new(12, "logs").routing_key("a.b").frame(1))
        .unwrap();
    conn.handle_frame(
        frame::ContentHeaderFrame {
            channel: 1,
            class_id: 0x3C,
            body_size: 6,
            ..Default::default()
        }
        .frame(),
    )
    .unwrap();
    conn.handle_frame(
        frame::ContentBodyFrame {
            channel: 1,
            body: b"cheese".to_vec(),
        }
        .frame(),
    )
    .unwrap();

    let sink = responses.clone();
    conn.channel_mut(1)
        .unwrap()
        .basic_get(
            "inbox",
            false,
            Box::new(move |_, signal| {
                if matches!(signal, GetSignal::GetEmpty) {
                    sink.lock().unwrap().push("empty".to_string());
                }
            }),
        )
        .unwrap();

    conn.handle_frame(frame::basic_get_empty(1)).unwrap();

    assert_eq!(
        vec!["ok:12:cheese".to_string(), "empty".to_string()],
        *responses.lock().unwrap()
    );
}
