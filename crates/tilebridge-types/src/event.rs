//! Input event records forwarded from the host environment to the guest.
//!
//! Records are transient: each lives only for the single dispatch that
//! forwards it.

use serde::{Deserialize, Serialize};

/// DOM event types the bridge listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    KeyDown,
    KeyUp,
    TouchStart,
    TouchEnd,
    TouchCancel,
    TouchMove,
}

/// Phase of a touch event; each phase has its own guest handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchPhase {
    Start,
    End,
    Cancel,
    Move,
}

impl TouchPhase {
    pub const ALL: [TouchPhase; 4] = [Self::Start, Self::End, Self::Cancel, Self::Move];

    pub fn event_kind(self) -> EventKind {
        match self {
            Self::Start => EventKind::TouchStart,
            Self::End => EventKind::TouchEnd,
            Self::Cancel => EventKind::TouchCancel,
            Self::Move => EventKind::TouchMove,
        }
    }
}

/// A key-down or key-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key_code: i32,
    pub pressed: bool,
}

impl KeyEvent {
    pub fn down(key_code: i32) -> Self {
        Self {
            key_code,
            pressed: true,
        }
    }

    pub fn up(key_code: i32) -> Self {
        Self {
            key_code,
            pressed: false,
        }
    }
}

/// One contact point in a touch event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    /// Stable per-contact identifier for the duration of the contact.
    pub id: i32,
    pub page_x: f64,
    pub page_y: f64,
}

impl TouchPoint {
    pub fn new(id: i32, page_x: f64, page_y: f64) -> Self {
        Self { id, page_x, page_y }
    }
}

/// A touch event carrying the contacts that changed in this event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub phase: TouchPhase,
    pub changed_touches: Vec<TouchPoint>,
    #[serde(skip)]
    default_prevented: bool,
}

impl TouchEvent {
    pub fn new(phase: TouchPhase, changed_touches: Vec<TouchPoint>) -> Self {
        Self {
            phase,
            changed_touches,
            default_prevented: false,
        }
    }

    /// Suppress the environment's default action (scroll, zoom).
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// Any input event the bridge forwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputEvent {
    Key(KeyEvent),
    Touch(TouchEvent),
}

impl InputEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Key(key) if key.pressed => EventKind::KeyDown,
            Self::Key(_) => EventKind::KeyUp,
            Self::Touch(touch) => touch.phase.event_kind(),
        }
    }

    pub fn default_prevented(&self) -> bool {
        match self {
            Self::Key(_) => false,
            Self::Touch(touch) => touch.default_prevented(),
        }
    }
}
