//! Event routing between DOM callbacks, the controller and the host
//!
//! DOM callbacks can fire while the controller is mid-operation (hls.js
//! reporting an error from inside `loadSource`, the initial resize sample
//! taken while the viewport watch is built). Every callback therefore queues
//! its event here, and the queue is applied only when the controller is free.
//!
//! Controller events are handed to the host one at a time with the
//! controller released, so a host callback may call straight back into the
//! player. The live generation is re-read before each delivery: once a
//! callback starts a new session, whatever the old one left in the channel
//! is dropped.

use std::cell::{RefCell, RefMut};
use std::collections::VecDeque;

use gofilm_core::{
    EngineEvent, EngineFactory, EventReceiver, Generation, PlaybackController, PlaybackEvent,
    ViewportEvent,
};

enum Routed {
    Engine(Generation, EngineEvent),
    Viewport(Generation, ViewportEvent),
}

pub(crate) struct Router<F: EngineFactory> {
    controller: RefCell<PlaybackController<F>>,
    events: RefCell<EventReceiver>,
    pending: RefCell<VecDeque<Routed>>,
}

impl<F: EngineFactory> Router<F> {
    pub(crate) fn new(controller: PlaybackController<F>, events: EventReceiver) -> Self {
        Self {
            controller: RefCell::new(controller),
            events: RefCell::new(events),
            pending: RefCell::new(VecDeque::new()),
        }
    }

    pub(crate) fn controller(&self) -> &RefCell<PlaybackController<F>> {
        &self.controller
    }

    /// Mutable controller, or `None` while an operation is in progress
    pub(crate) fn try_controller_mut(&self) -> Option<RefMut<'_, PlaybackController<F>>> {
        self.controller.try_borrow_mut().ok()
    }

    pub(crate) fn queue_engine(&self, generation: Generation, event: EngineEvent) {
        self.pending
            .borrow_mut()
            .push_back(Routed::Engine(generation, event));
    }

    pub(crate) fn queue_viewport(&self, generation: Generation, event: ViewportEvent) {
        self.pending
            .borrow_mut()
            .push_back(Routed::Viewport(generation, event));
    }

    /// Apply queued DOM events, then hand each controller event to `deliver`.
    ///
    /// Returns early while the controller is borrowed; the caller holding the
    /// borrow flushes once it is done.
    pub(crate) fn flush(&self, mut deliver: impl FnMut(PlaybackEvent)) {
        loop {
            if !self.apply_pending() {
                return;
            }

            let next = self.events.borrow_mut().try_recv().ok();
            let Some(event) = next else {
                if self.pending.borrow().is_empty() {
                    return;
                }
                continue;
            };

            if self.is_current(&event) {
                deliver(event);
            }
        }
    }

    fn apply_pending(&self) -> bool {
        let Ok(mut controller) = self.controller.try_borrow_mut() else {
            return false;
        };
        loop {
            let next = self.pending.borrow_mut().pop_front();
            match next {
                Some(Routed::Engine(generation, event)) => {
                    controller.handle_engine_event(generation, event);
                }
                Some(Routed::Viewport(generation, event)) => {
                    controller.handle_viewport_event(generation, event);
                }
                None => return true,
            }
        }
    }

    fn is_current(&self, event: &PlaybackEvent) -> bool {
        let Some(generation) = event.generation() else {
            return true;
        };
        self.controller
            .try_borrow()
            .map(|controller| controller.generation() == generation)
            .unwrap_or(true)
    }
}
