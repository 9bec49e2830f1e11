//! Routing of decoded inbound methods to the connection or the channel
//! they belong to.
//!
//! The table is fixed at compile time, one arm per (class id, method id)
//! pair the client expects from the server. The arms do no work on their
//! own, they only locate the target and hand the arguments over. A method
//! without an arm is a protocol error on the connection.

use anyhow::Result;
use coppermq_codec::frame::MethodFrameArgs;
use log::trace;

use crate::connection::Connection;
use crate::model::{ChannelNumber, ClassMethod};

pub(crate) fn dispatch(
    conn: &mut Connection,
    channel: ChannelNumber,
    cm: ClassMethod,
    args: MethodFrameArgs,
) -> Result<()> {
    use MethodFrameArgs::*;

    trace!("Dispatching {:08X} on channel {}", cm, channel);

    match args {
        ConnectionStart(args) => conn.handle_start(args),
        ConnectionTune(args) => conn.handle_tune(args),
        ConnectionOpenOk => conn.handle_open_ok(),
        ConnectionClose(args) => conn.handle_close(args),
        ConnectionCloseOk => conn.handle_close_ok(),
        ChannelOpenOk => conn.on_channel(channel, cm, |ch| ch.handle_open_ok()),
        ChannelFlow(args) => conn.on_channel(channel, cm, |ch| ch.handle_flow(args)),
        ChannelFlowOk(args) => conn.on_channel(channel, cm, |ch| ch.handle_flow_ok(args)),
        ChannelClose(args) => conn.handle_channel_close(channel, args),
        ChannelCloseOk => conn.handle_channel_close_ok(channel),
        ExchangeDeclareOk => conn.on_channel(channel, cm, |ch| ch.handle_exchange_declare_ok()),
        ExchangeDeleteOk => conn.on_channel(channel, cm, |ch| ch.handle_exchange_delete_ok()),
        QueueDeclareOk(args) => conn.on_channel(channel, cm, |ch| ch.handle_queue_declare_ok(args)),
        QueueBindOk => conn.on_channel(channel, cm, |ch| ch.handle_queue_bind_ok()),
        QueueUnbindOk => conn.on_channel(channel, cm, |ch| ch.handle_queue_unbind_ok()),
        QueuePurgeOk(args) => conn.on_channel(channel, cm, |ch| ch.handle_queue_purge_ok(args)),
        QueueDeleteOk(args) => conn.on_channel(channel, cm, |ch| ch.handle_queue_delete_ok(args)),
        BasicQosOk => conn.on_channel(channel, cm, |ch| ch.handle_qos_ok()),
        BasicConsumeOk(args) => conn.on_channel(channel, cm, |ch| ch.handle_consume_ok(args)),
        BasicCancelOk(args) => conn.on_channel(channel, cm, |ch| ch.handle_cancel_ok(args)),
        BasicCancel(args) => conn.on_channel(channel, cm, |ch| ch.handle_basic_cancel(args)),
        BasicDeliver(args) => conn.on_channel(channel, cm, |ch| ch.handle_basic_deliver(args)),
        BasicGetOk(args) => conn.on_channel(channel, cm, |ch| ch.handle_basic_get_ok(args)),
        BasicGetEmpty => conn.on_channel(channel, cm, |ch| ch.handle_basic_get_empty()),
        BasicReturn(args) => conn.on_channel(channel, cm, |ch| ch.handle_basic_return(args)),
        BasicAck(args) => conn.on_channel(channel, cm, |ch| ch.handle_basic_ack(args)),
        BasicRecoverOk => conn.on_channel(channel, cm, |ch| ch.handle_recover_ok()),
        TxSelectOk => conn.on_channel(channel, cm, |ch| ch.handle_tx_select_ok()),
        TxCommitOk => conn.on_channel(channel, cm, |ch| ch.handle_tx_commit_ok()),
        TxRollbackOk => conn.on_channel(channel, cm, |ch| ch.handle_tx_rollback_ok()),
        ConfirmSelectOk => conn.on_channel(channel, cm, |ch| ch.handle_confirm_select_ok()),
        _ => conn.unexpected_method(channel, cm),
    }
}
