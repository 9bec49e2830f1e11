use super::{AMQPFrame, Channel, MethodFrameArgs};

pub fn tx_select(channel: Channel) -> AMQPFrame {
    AMQPFrame::Method(channel, super::TX_SELECT, MethodFrameArgs::TxSelect)
}

pub fn tx_select_ok(channel: Channel) -> AMQPFrame {
    AMQPFrame::Method(channel, super::TX_SELECT_OK, MethodFrameArgs::TxSelectOk)
}

pub fn tx_commit(channel: Channel) -> AMQPFrame {
    AMQPFrame::Method(channel, super::TX_COMMIT, MethodFrameArgs::TxCommit)
}

pub fn tx_commit_ok(channel: Channel) -> AMQPFrame {
    AMQPFrame::Method(channel, super::TX_COMMIT_OK, MethodFrameArgs::TxCommitOk)
}

pub fn tx_rollback(channel: Channel) -> AMQPFrame {
    AMQPFrame::Method(channel, super::TX_ROLLBACK, MethodFrameArgs::TxRollback)
}

pub fn tx_rollback_ok(channel: Channel) -> AMQPFrame {
    AMQPFrame::Method(channel, super::TX_ROLLBACK_OK, MethodFrameArgs::TxRollbackOk)
}
