#![forbid(unsafe_code)]

//! Listener bookkeeping with explicit disposers.
//!
//! Every [`ListenerRegistry::add`] yields a [`Disposer`]; handing the disposer
//! back detaches exactly the registrations it names. The registry itself can
//! detach everything at once, which is what teardown uses.
//!
//! # Invariants
//!
//! 1. Each live registration corresponds to exactly one `Host::listen` call,
//!    and is matched by exactly one `Host::unlisten` call when it goes away.
//! 2. A (target, event, handler) triple is registered at most once. A
//!    repeated `add` returns a disposer for the existing registration.
//! 3. Disposing twice, or after `remove_all`, is a no-op.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::host::{EventKind, EventTarget, Host, HostError};

bitflags! {
    /// `addEventListener` options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ListenerOptions: u8 {
        const CAPTURE = 1 << 0;
        const PASSIVE = 1 << 1;
        const ONCE    = 1 << 2;
    }
}

/// Identifier of one registration, unique for the registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// One registered handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration<N, A> {
    pub target: EventTarget<N>,
    pub kind: EventKind,
    pub options: ListenerOptions,
    pub action: A,
}

/// Detaches the registrations it was created for.
#[derive(Debug, Default, PartialEq, Eq)]
#[must_use = "dropping a Disposer leaks its listeners until teardown"]
pub struct Disposer {
    ids: SmallVec<[ListenerId; 3]>,
}

impl Disposer {
    /// A disposer that detaches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    fn single(id: ListenerId) -> Self {
        let mut ids = SmallVec::new();
        ids.push(id);
        Self { ids }
    }

    /// Merge another disposer into this one.
    pub fn merge(mut self, other: Disposer) -> Self {
        self.ids.extend(other.ids);
        self
    }

    /// Add another disposer's registrations to this one.
    pub fn absorb(&mut self, other: Disposer) {
        self.ids.extend(other.ids);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn ids(&self) -> &[ListenerId] {
        &self.ids
    }

    /// Detach every registration this disposer names.
    pub fn dispose<H: Host, A: PartialEq>(
        self,
        registry: &mut ListenerRegistry<H::Node, A>,
        host: &mut H,
    ) {
        for id in self.ids {
            registry.remove(host, id);
        }
    }
}

/// Live listener registrations, in insertion order.
#[derive(Debug)]
pub struct ListenerRegistry<N, A> {
    entries: Vec<(ListenerId, Registration<N, A>)>,
    next_id: u64,
}

impl<N, A> Default for ListenerRegistry<N, A> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }
}

impl<N: Clone + PartialEq, A: PartialEq> ListenerRegistry<N, A> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `action` to `kind` events on `target`.
    ///
    /// When the host cannot attach (for example no extension runtime) the
    /// failure is logged and an empty disposer is returned.
    pub fn add<H: Host<Node = N>>(
        &mut self,
        host: &mut H,
        target: EventTarget<N>,
        kind: EventKind,
        options: ListenerOptions,
        action: A,
    ) -> Disposer {
        if let Some((id, _)) = self
            .entries
            .iter()
            .find(|(_, reg)| reg.kind == kind && reg.target == target && reg.action == action)
        {
            tracing::debug!(
                listener = id.0,
                event = kind.dom_name(),
                "listener already registered"
            );
            return Disposer::single(*id);
        }

        let id = ListenerId(self.next_id);
        self.next_id += 1;
        match host.listen(id, &target, kind, options) {
            Ok(()) => {}
            Err(err @ HostError::Unavailable(_)) => {
                tracing::debug!(
                    event = kind.dom_name(),
                    error = %err,
                    "listener target unavailable"
                );
                return Disposer::empty();
            }
            Err(err) => {
                tracing::warn!(event = kind.dom_name(), error = %err, "listener not attached");
                return Disposer::empty();
            }
        }
        self.entries.push((
            id,
            Registration {
                target,
                kind,
                options,
                action,
            },
        ));
        Disposer::single(id)
    }

    /// Detach one registration. Returns `false` if it was already gone.
    pub fn remove<H: Host<Node = N>>(&mut self, host: &mut H, id: ListenerId) -> bool {
        let Some(pos) = self.entries.iter().position(|(entry, _)| *entry == id) else {
            return false;
        };
        self.entries.remove(pos);
        host.unlisten(id);
        true
    }

    /// Detach everything.
    pub fn remove_all<H: Host<Node = N>>(&mut self, host: &mut H) {
        for (id, _) in self.entries.drain(..) {
            host.unlisten(id);
        }
    }

    #[must_use]
    pub fn get(&self, id: ListenerId) -> Option<&Registration<N, A>> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == id)
            .map(|(_, reg)| reg)
    }

    #[must_use]
    pub fn contains(&self, id: ListenerId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ListenerId, &Registration<N, A>)> {
        self.entries.iter().map(|(id, reg)| (*id, reg))
    }
}
