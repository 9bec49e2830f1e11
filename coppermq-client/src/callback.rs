//! The callback substrate shared by every protocol entity.
//!
//! Lifecycle events are identified by an [`Event`] key and the hooks are
//! tagged at registration time: a `once` hook is dropped after it fired, an
//! `on` hook stays registered. Firing an event nobody listens to is a
//! no-op. All of Connection, Channel, Queue, Exchange and Consumer carry
//! such a registry through the [`Entity`] trait.

use coppermq_codec::frame::MethodFrameArgs;
use std::fmt;

/// Lifecycle events an entity can fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    Open,
    Close,
    Flow,
    Qos,
    Recover,
    TxSelect,
    TxCommit,
    TxRollback,
    Confirm,
    Declare,
    Delete,
    Bind,
    Unbind,
    Purge,
    Consume,
    Cancel,
    /// Publish acknowledged by the server in confirm mode.
    Ack,
    /// Broker reported an error, the payload is the decoded close method.
    Error,
}

/// A hook invoked with the entity itself and the decoded reply method.
pub type Callback<E> = Box<dyn FnMut(&mut E, &MethodFrameArgs) + Send>;

enum Hook<E> {
    Once(Callback<E>),
    Many(Callback<E>),
}

/// Registration-ordered hook registry of a single entity.
pub struct Callbacks<E> {
    hooks: Vec<(Event, Hook<E>)>,
}

impl<E> Default for Callbacks<E> {
    fn default() -> Self {
        Self { hooks: Vec::new() }
    }
}

impl<E> fmt::Debug for Callbacks<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callbacks({})", self.hooks.len())
    }
}

impl<E> Callbacks<E> {
    fn append(&mut self, event: Event, hook: Hook<E>) {
        self.hooks.push((event, hook));
    }

    fn remove(&mut self, event: Event) -> Vec<Hook<E>> {
        let mut taken = Vec::new();
        let mut rest = Vec::with_capacity(self.hooks.len());

        for (ev, hook) in self.hooks.drain(..) {
            if ev == event {
                taken.push(hook);
            } else {
                rest.push((ev, hook));
            }
        }

        self.hooks = rest;
        taken
    }

    pub fn clear(&mut self) {
        self.hooks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// A protocol entity with a status and a callback registry.
pub trait Entity: Sized {
    fn callbacks_mut(&mut self) -> &mut Callbacks<Self>;

    /// Register a hook which stays after firing.
    fn on(&mut self, event: Event, callback: Callback<Self>) {
        self.callbacks_mut().append(event, Hook::Many(callback));
    }

    /// Register a hook which is dropped after it fired once.
    fn once(&mut self, event: Event, callback: Callback<Self>) {
        self.callbacks_mut().append(event, Hook::Once(callback));
    }

    /// Drop whatever was registered for the event and register the hook.
    fn replace(&mut self, event: Event, callback: Callback<Self>) {
        self.callbacks_mut().remove(event);
        self.on(event, callback);
    }

    /// Invoke the hooks of the event in registration order with the reply
    /// method. One-shot hooks are dropped, the rest is kept registered.
    fn fire(&mut self, event: Event, reply: &MethodFrameArgs) {
        let hooks = self.callbacks_mut().remove(event);

        if hooks.is_empty() {
            return;
        }

        let mut kept = Vec::new();

        for hook in hooks {
            match hook {
                Hook::Once(mut f) => f(self, reply),
                Hook::Many(mut f) => {
                    f(self, reply);
                    kept.push(Hook::Many(f));
                }
            }
        }

        for hook in kept {
            self.callbacks_mut().append(event, hook);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coppermq_codec::frame;

    #[derive(Default)]
    struct Probe {
        callbacks: Callbacks<Probe>,
        hits: Vec<&'static str>,
    }

    impl Entity for Probe {
        fn callbacks_mut(&mut self) -> &mut Callbacks<Self> {
            &mut self.callbacks
        }
    }

    fn reply() -> MethodFrameArgs {
        MethodFrameArgs::ChannelOpenOk
    }

    #[test]
    fn firing_without_hooks_is_a_no_op() {
        let mut probe = Probe::default();

        probe.fire(Event::Open, &reply());

        assert!(probe.hits.is_empty());
    }

    #[test]
    fn once_hooks_fire_a_single_time() {
        let mut probe = Probe::default();

        probe.once(Event::Open, Box::new(|p, _| p.hits.push("once")));

        probe.fire(Event::Open, &reply());
        probe.fire(Event::Open, &reply());

        assert_eq!(vec!["once"], probe.hits);
        assert!(probe.callbacks.is_empty());
    }

    #[test]
    fn many_hooks_stay_registered() {
        let mut probe = Probe::default();

        probe.on(Event::Flow, Box::new(|p, _| p.hits.push("flow")));

        probe.fire(Event::Flow, &reply());
        probe.fire(Event::Flow, &reply());

        assert_eq!(vec!["flow", "flow"], probe.hits);
    }

    #[test]
    fn hooks_fire_in_registration_order() {
        let mut probe = Probe::default();

        probe.once(Event::Open, Box::new(|p, _| p.hits.push("first")));
        probe.once(Event::Open, Box::new(|p, _| p.hits.push("second")));
        probe.once(Event::Close, Box::new(|p, _| p.hits.push("other")));

        probe.fire(Event::Open, &reply());

        assert_eq!(vec!["first", "second"], probe.hits);
        assert!(!probe.callbacks.is_empty());
    }

    #[test]
    fn replace_drops_earlier_hooks() {
        let mut probe = Probe::default();

        probe.on(Event::Open, Box::new(|p, _| p.hits.push("old")));
        probe.replace(Event::Open, Box::new(|p, _| p.hits.push("new")));

        probe.fire(Event::Open, &reply());

        assert_eq!(vec!["new"], probe.hits);
    }

    #[test]
    fn reply_payload_reaches_the_hook() {
        let mut probe = Probe::default();

        probe.once(
            Event::Error,
            Box::new(|p, reply| {
                if let MethodFrameArgs::ChannelClose(args) = reply {
                    assert_eq!(406, args.code);
                    p.hits.push("error");
                }
            }),
        );

        let close = frame::ChannelCloseArgs {
            code: 406,
            text: "PRECONDITION_FAILED".to_string(),
            class_id: 50,
            method_id: 10,
        };

        probe.fire(Event::Error, &MethodFrameArgs::ChannelClose(close));

        assert_eq!(vec!["error"], probe.hits);
    }
}
