use coppermq_codec::frame::{self, FieldTable, MethodFrameArgs};
use log::trace;

use crate::callback::{Callbacks, Entity, Event};

/// Where the queue is in its lifecycle. A queue starts as a local record
/// and becomes `Declared` once the server confirmed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueStatus {
    New,
    Declared,
    Deleted,
}

/// A queue as this channel sees it.
///
/// The name may start out empty, in which case the server picks one and
/// the declare confirmation brings it back.
#[derive(Debug)]
pub struct Queue {
    pub name: String,
    pub passive: bool,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    pub arguments: Option<FieldTable>,
    /// Message count the last declare or purge confirmation reported.
    pub message_count: u32,
    /// Consumer count the last declare confirmation reported.
    pub consumer_count: u32,
    status: QueueStatus,
    pub(crate) callbacks: Callbacks<Queue>,
}

impl Entity for Queue {
    fn callbacks_mut(&mut self) -> &mut Callbacks<Self> {
        &mut self.callbacks
    }
}

impl Queue {
    /// A queue record with the given name, empty for a server-named queue.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            passive: false,
            durable: false,
            exclusive: false,
            auto_delete: false,
            arguments: None,
            message_count: 0,
            consumer_count: 0,
            status: QueueStatus::New,
            callbacks: Callbacks::default(),
        }
    }

    pub fn passive(mut self, mode: bool) -> Self {
        self.passive = mode;
        self
    }

    pub fn durable(mut self, mode: bool) -> Self {
        self.durable = mode;
        self
    }

    pub fn exclusive(mut self, mode: bool) -> Self {
        self.exclusive = mode;
        self
    }

    pub fn auto_delete(mut self, mode: bool) -> Self {
        self.auto_delete = mode;
        self
    }

    pub fn arguments(mut self, arguments: FieldTable) -> Self {
        self.arguments = Some(arguments);
        self
    }

    pub fn status(&self) -> QueueStatus {
        self.status
    }

    pub(crate) fn declare_args(&self) -> frame::QueueDeclareArgs {
        let mut args = frame::QueueDeclareArgs::default()
            .name(&self.name)
            .passive(self.passive)
            .durable(self.durable)
            .exclusive(self.exclusive)
            .auto_delete(self.auto_delete);
        args.args = self.arguments.clone();

        args
    }

    pub(crate) fn handle_declare_ok(&mut self, args: frame::QueueDeclareOkArgs) {
        trace!("Queue {:?} declared as {:?}", self.name, args.name);

        self.name = args.name.clone();
        self.message_count = args.message_count;
        self.consumer_count = args.consumer_count;
        self.status = QueueStatus::Declared;

        let reply = MethodFrameArgs::QueueDeclareOk(args);
        self.fire(Event::Declare, &reply);
    }

    pub(crate) fn handle_bind_ok(&mut self) {
        self.fire(Event::Bind, &MethodFrameArgs::QueueBindOk);
    }

    pub(crate) fn handle_unbind_ok(&mut self) {
        self.fire(Event::Unbind, &MethodFrameArgs::QueueUnbindOk);
    }

    pub(crate) fn handle_purge_ok(&mut self, args: frame::QueuePurgeOkArgs) {
        self.message_count = 0;

        let reply = MethodFrameArgs::QueuePurgeOk(args);
        self.fire(Event::Purge, &reply);
    }

    pub(crate) fn handle_delete_ok(&mut self, args: frame::QueueDeleteOkArgs) {
        self.status = QueueStatus::Deleted;

        let reply = MethodFrameArgs::QueueDeleteOk(args);
        self.fire(Event::Delete, &reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_ok_assigns_the_server_name() {
        let mut queue = Queue::new("").exclusive(true);

        assert_eq!(QueueStatus::New, queue.status());

        queue.handle_declare_ok(frame::QueueDeclareOkArgs::default().name("amq.gen-1").message_count(2));

        assert_eq!("amq.gen-1", queue.name);
        assert_eq!(2, queue.message_count);
        assert_eq!(QueueStatus::Declared, queue.status());
    }

    #[test]
    fn declare_args_carry_the_flags() {
        let queue = Queue::new("inbox").durable(true).auto_delete(true);
        let args = queue.declare_args();

        assert_eq!("inbox", args.name);
        assert!(args.flags.contains(frame::QueueDeclareFlags::DURABLE));
        assert!(args.flags.contains(frame::QueueDeclareFlags::AUTO_DELETE));
        assert!(!args.flags.contains(frame::QueueDeclareFlags::EXCLUSIVE));
    }
}
