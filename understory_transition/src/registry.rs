// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Listener registry: generational subscription slots, the transition phase,
//! and the deferred registration queue.
//!
//! ## Entry lifecycle
//!
//! Every subscription moves through a small state machine:
//!
//! - **Pending**: the slot is reserved and the id is handed out, but the
//!   listener does not receive events yet. An entry stays pending while it
//!   waits for the host's after-navigate hook, or while it sits on the
//!   deferred queue because it was registered mid-transition.
//! - **Active**: the listener receives events of its kind, in activation order.
//! - **Removed**: the slot is vacated. The id is stale from now on and can
//!   never alias a later subscription because the slot generation is bumped
//!   on reuse.
//!
//! Removal is valid from both live states, so a subscription can be cancelled
//! at any point, including before a deferred registration is flushed.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ListenerError;
use crate::events::EventKind;

/// Type-erased listener callback. The payload is downcast by the typed
/// wrapper built in [`EventBus::register`](crate::bus::EventBus::register).
pub(crate) type Listener = Rc<RefCell<dyn FnMut(&(dyn Any + 'static)) -> Result<(), ListenerError>>>;

/// Opaque handle to one subscription.
///
/// Returned at registration time and used for removal. Registering the same
/// closure twice yields two distinct handles.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    slot: u32,
    generation: u32,
    kind: EventKind,
}

impl SubscriptionId {
    /// The event kind this subscription listens to.
    pub fn kind(self) -> EventKind {
        self.kind
    }

    const fn idx(self) -> usize {
        self.slot as usize
    }
}

bitflags::bitflags! {
    /// Registration options.
    ///
    /// The default is `AUTO_CLEAN | AUTO_WRAP`: a one-shot listener whose
    /// activation waits for the current navigation to settle, and which is
    /// deferred while a transition is in flight.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SubscribeOptions: u8 {
        /// Activate immediately even while a transition is in flight.
        /// Without it, a registration made mid-transition is queued until
        /// `transition-finished` has been emitted.
        const REGISTER_DURING_TRANSITION = 0b0000_0001;
        /// Remove the listener after its first invocation.
        const AUTO_CLEAN = 0b0000_0010;
        /// Run the (de)registration through the host's after-navigate hook.
        /// Only honoured by [`ViewTransitions`](crate::root::ViewTransitions);
        /// the bus itself always acts immediately.
        const AUTO_WRAP = 0b0000_0100;
    }
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self::AUTO_CLEAN | Self::AUTO_WRAP
    }
}

/// Whether a native transition is currently in flight.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Phase {
    /// No transition in flight; registrations activate immediately.
    #[default]
    Idle,
    /// Between the native update callback starting and `transition-finished`.
    InTransition,
}

/// Live state of a subscription.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EntryState {
    /// Reserved, not yet receiving events.
    Pending,
    /// Receiving events.
    Active,
}

struct Entry {
    generation: u32,
    kind: EventKind,
    listener: Listener,
    auto_clean: bool,
    state: EntryState,
}

/// One listener captured at the start of an emission.
pub(crate) struct Snapshot {
    pub(crate) id: SubscriptionId,
    pub(crate) listener: Listener,
    pub(crate) auto_clean: bool,
}

pub(crate) struct Registry {
    entries: Vec<Option<Entry>>, // slots
    generations: Vec<u32>,       // last generation per slot (persists across frees)
    free_list: Vec<usize>,
    // Active slots per kind, in activation order. Each list only allocates
    // once its kind gets its first listener.
    active: [Vec<usize>; EventKind::COUNT],
    deferred: Vec<SubscriptionId>,
    phase: Phase,
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let alive = self.entries.iter().filter(|e| e.is_some()).count();
        f.debug_struct("Registry")
            .field("entries_alive", &alive)
            .field("free_list", &self.free_list.len())
            .field("deferred", &self.deferred.len())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            active: core::array::from_fn(|_| Vec::new()),
            deferred: Vec::new(),
            phase: Phase::Idle,
        }
    }

    /// Reserve a slot for `listener`. The entry starts out pending.
    pub(crate) fn reserve(
        &mut self,
        kind: EventKind,
        listener: Listener,
        auto_clean: bool,
    ) -> SubscriptionId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            // Slots with an exhausted generation never reach the free list.
            let generation = self.generations[idx] + 1;
            self.generations[idx] = generation;
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.entries.push(None);
            self.generations.push(generation);
            (self.entries.len() - 1, generation)
        };
        self.entries[idx] = Some(Entry {
            generation,
            kind,
            listener,
            auto_clean,
            state: EntryState::Pending,
        });
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Subscription slots are 32-bit by design."
        )]
        let slot = idx as u32;
        SubscriptionId {
            slot,
            generation,
            kind,
        }
    }

    fn entry(&self, id: SubscriptionId) -> Option<&Entry> {
        self.entries
            .get(id.idx())?
            .as_ref()
            .filter(|e| e.generation == id.generation)
    }

    fn entry_mut(&mut self, id: SubscriptionId) -> Option<&mut Entry> {
        self.entries
            .get_mut(id.idx())?
            .as_mut()
            .filter(|e| e.generation == id.generation)
    }

    /// State of a live subscription, `None` once removed.
    pub(crate) fn state(&self, id: SubscriptionId) -> Option<EntryState> {
        self.entry(id).map(|e| e.state)
    }

    /// Move a pending entry to active. Returns false if it is not pending.
    pub(crate) fn activate(&mut self, id: SubscriptionId) -> bool {
        let Some(entry) = self.entry_mut(id) else {
            return false;
        };
        if entry.state != EntryState::Pending {
            return false;
        }
        entry.state = EntryState::Active;
        let kind = entry.kind;
        self.active[kind.index()].push(id.idx());
        true
    }

    /// Activate a pending entry now, or queue it until the current transition
    /// ends when a transition is in flight and `during_transition` is false.
    pub(crate) fn settle(&mut self, id: SubscriptionId, during_transition: bool) -> Option<EntryState> {
        if self.state(id)? != EntryState::Pending {
            return self.state(id);
        }
        if self.phase == Phase::InTransition && !during_transition {
            self.deferred.push(id);
            Some(EntryState::Pending)
        } else {
            self.activate(id);
            Some(EntryState::Active)
        }
    }

    /// Remove a subscription in any live state. Returns false for unknown or
    /// stale ids.
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        if entry.state == EntryState::Active {
            let order = &mut self.active[id.kind.index()];
            if let Some(pos) = order.iter().position(|&slot| slot == id.idx()) {
                order.remove(pos);
            }
        }
        self.entries[id.idx()] = None;
        // Retire the slot once its generation is exhausted so that stale ids
        // can never match a later occupant.
        if id.generation < u32::MAX {
            self.free_list.push(id.idx());
        }
        true
    }

    /// Active listeners of `kind` in activation order.
    pub(crate) fn snapshot(&self, kind: EventKind) -> Vec<Snapshot> {
        self.active[kind.index()]
            .iter()
            .filter_map(|&slot| {
                let entry = self.entries[slot].as_ref()?;
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "Subscription slots are 32-bit by design."
                )]
                let slot = slot as u32;
                let id = SubscriptionId {
                    slot,
                    generation: entry.generation,
                    kind: entry.kind,
                };
                Some(Snapshot {
                    id,
                    listener: Rc::clone(&entry.listener),
                    auto_clean: entry.auto_clean,
                })
            })
            .collect()
    }

    pub(crate) fn is_active(&self, id: SubscriptionId) -> bool {
        self.state(id) == Some(EntryState::Active)
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    /// Enter the in-transition phase. Returns false if already in it.
    pub(crate) fn begin_transition(&mut self) -> bool {
        let changed = self.phase == Phase::Idle;
        self.phase = Phase::InTransition;
        changed
    }

    /// Leave the in-transition phase and flush the deferred queue, activating
    /// every still-pending entry in insertion order. Returns how many entries
    /// were activated.
    pub(crate) fn end_transition(&mut self) -> usize {
        self.phase = Phase::Idle;
        let queued = core::mem::take(&mut self.deferred);
        queued.into_iter().filter(|&id| self.activate(id)).count()
    }

    /// Number of active listeners for `kind`.
    pub(crate) fn active_count(&self, kind: EventKind) -> usize {
        self.active[kind.index()].len()
    }

    /// Number of queued registrations still waiting for the transition to end.
    pub(crate) fn deferred_count(&self) -> usize {
        self.deferred
            .iter()
            .filter(|&&id| self.state(id) == Some(EntryState::Pending))
            .count()
    }
}
