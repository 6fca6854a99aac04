//! Input forwarding: keyboard and touch events become guest calls.
//!
//! Listeners are installed once, after the guest instance exists. Events
//! delivered before that are dropped, so no guest handler ever runs
//! without a handle to pass it.

use tilebridge_types::{BridgeResult, EventKind, InputEvent, InstanceHandle, TouchPhase};

use crate::capability::HostCapabilities;
use crate::session::BridgeSession;

/// Where a listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerTarget {
    /// Keyboard events are taken page-wide.
    Window,
    /// Touch events are taken on the drawing surface.
    Canvas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Listener {
    pub target: ListenerTarget,
    pub kind: EventKind,
}

const LISTENERS: [Listener; 6] = [
    Listener {
        target: ListenerTarget::Window,
        kind: EventKind::KeyDown,
    },
    Listener {
        target: ListenerTarget::Window,
        kind: EventKind::KeyUp,
    },
    Listener {
        target: ListenerTarget::Canvas,
        kind: EventKind::TouchStart,
    },
    Listener {
        target: ListenerTarget::Canvas,
        kind: EventKind::TouchEnd,
    },
    Listener {
        target: ListenerTarget::Canvas,
        kind: EventKind::TouchCancel,
    },
    Listener {
        target: ListenerTarget::Canvas,
        kind: EventKind::TouchMove,
    },
];

/// The installed listeners and the handle they forward with.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    listeners: Vec<Listener>,
    handle: Option<InstanceHandle>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the keyboard and touch listeners for `handle`. Only the
    /// first call has any effect; returns whether it installed anything.
    pub fn install(&mut self, handle: InstanceHandle) -> bool {
        if self.handle.is_some() {
            return false;
        }
        self.listeners.extend_from_slice(&LISTENERS);
        self.handle = Some(handle);
        log::info!("installed {} input listeners", self.listeners.len());
        true
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    pub fn handle(&self) -> Option<InstanceHandle> {
        self.handle
    }

    fn listens_for(&self, kind: EventKind) -> bool {
        self.listeners.iter().any(|l| l.kind == kind)
    }
}

/// What delivering one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Guest handler calls made.
    pub forwarded: usize,
    pub default_prevented: bool,
}

/// Routes input events to the guest's handlers.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    registry: ListenerRegistry,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, handle: InstanceHandle) -> bool {
        self.registry.install(handle)
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// Forward `event` to the guest. Key events make one call; touch
    /// events suppress their default action and make one call per changed
    /// contact. The first failing call ends delivery.
    pub fn deliver<H: HostCapabilities>(
        &self,
        session: &mut BridgeSession<H>,
        event: &mut InputEvent,
    ) -> BridgeResult<DispatchOutcome> {
        let Some(handle) = self.registry.handle() else {
            log::trace!("dropping {:?} before listeners are installed", event.kind());
            return Ok(DispatchOutcome::default());
        };
        if !self.registry.listens_for(event.kind()) {
            return Ok(DispatchOutcome::default());
        }

        match event {
            InputEvent::Key(key) => {
                session.key_event(handle, key)?;
                Ok(DispatchOutcome {
                    forwarded: 1,
                    default_prevented: false,
                })
            }
            InputEvent::Touch(touch) => {
                touch.prevent_default();
                let phase: TouchPhase = touch.phase;
                let mut outcome = DispatchOutcome {
                    forwarded: 0,
                    default_prevented: true,
                };
                for point in &touch.changed_touches {
                    session.touch(handle, phase, point)?;
                    outcome.forwarded += 1;
                }
                Ok(outcome)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_registers_six_listeners_once() {
        let mut registry = ListenerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.install(InstanceHandle::from_abi(16)));
        assert!(!registry.install(InstanceHandle::from_abi(32)));
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.handle(), Some(InstanceHandle::from_abi(16)));
        let window = registry
            .listeners()
            .iter()
            .filter(|l| l.target == ListenerTarget::Window)
            .count();
        assert_eq!(window, 2);
    }
}
