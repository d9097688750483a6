//! Readiness gate
//!
//! The registry is ready once both the base configuration and the farbling
//! configuration have loaded. Callbacks registered before that are queued and
//! run exactly once, in registration order, when the second flag is set.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

type ReadyCallback = Box<dyn FnOnce()>;

/// The two independent initialization events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessFlag {
    BaseConfig,
    FarblingConfig,
}

#[derive(Default)]
pub struct ReadinessGate {
    base_loaded: Cell<bool>,
    farbling_loaded: Cell<bool>,
    pending: RefCell<VecDeque<ReadyCallback>>,
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("base_loaded", &self.base_loaded.get())
            .field("farbling_loaded", &self.farbling_loaded.get())
            .field("pending", &self.pending.borrow().len())
            .finish()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.base_loaded.get() && self.farbling_loaded.get()
    }

    /// Run `callback` now if ready, otherwise queue it.
    pub fn on_ready(&self, callback: impl FnOnce() + 'static) {
        if self.is_ready() {
            callback();
        } else {
            self.pending.borrow_mut().push_back(Box::new(callback));
        }
    }

    /// Record one initialization event, draining the queue when both are in.
    ///
    /// Later calls (configuration reloads) find the queue empty.
    pub fn mark(&self, flag: ReadinessFlag) {
        match flag {
            ReadinessFlag::BaseConfig => self.base_loaded.set(true),
            ReadinessFlag::FarblingConfig => self.farbling_loaded.set(true),
        }
        if !self.is_ready() {
            return;
        }
        // Take the queue first: a callback may register further callbacks.
        let drained = std::mem::take(&mut *self.pending.borrow_mut());
        if !drained.is_empty() {
            log::debug!("Configuration ready, running {} callbacks", drained.len());
        }
        for callback in drained {
            callback();
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_queue_drains_once_in_order() {
        let gate = ReadinessGate::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = Rc::clone(&log);
            gate.on_ready(move || log.borrow_mut().push(i));
        }
        gate.mark(ReadinessFlag::BaseConfig);
        assert!(log.borrow().is_empty());
        assert_eq!(gate.pending(), 3);

        gate.mark(ReadinessFlag::FarblingConfig);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(gate.pending(), 0);

        gate.mark(ReadinessFlag::BaseConfig);
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn test_ready_runs_immediately() {
        let gate = ReadinessGate::new();
        gate.mark(ReadinessFlag::FarblingConfig);
        gate.mark(ReadinessFlag::BaseConfig);

        let hit = Rc::new(Cell::new(false));
        let flag = Rc::clone(&hit);
        gate.on_ready(move || flag.set(true));
        assert!(hit.get());
    }
}
