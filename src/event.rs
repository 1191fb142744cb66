//! Input event records
//!
//! [`Event`] is a small, owned copy of one kernel input event. The dispatch
//! loop only looks at key/button events, but every category is carried so
//! tests and logs can show what the device actually produced.

use std::fmt;

/// Value of a key event for a release transition
pub const VALUE_RELEASE: i32 = 0;
/// Value of a key event for a press transition
pub const VALUE_PRESS: i32 = 1;
/// Value of a key event for an autorepeat
pub const VALUE_REPEAT: i32 = 2;

/// Event category (evdev event type)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// EV_KEY: keyboard keys and mouse buttons
    Key,
    /// EV_SYN: report separators
    Sync,
    /// EV_REL: pointer motion and wheels
    Relative,
    /// EV_ABS: absolute axes
    Absolute,
    /// Anything else, with the raw type number
    Other(u16),
}

impl EventKind {
    /// Map a raw evdev event type number to a category
    pub fn from_raw(ty: u16) -> Self {
        match ty {
            0x00 => EventKind::Sync,
            0x01 => EventKind::Key,
            0x02 => EventKind::Relative,
            0x03 => EventKind::Absolute,
            other => EventKind::Other(other),
        }
    }
}

/// One input event, consumed once by the dispatch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub code: u16,
    pub value: i32,
}

impl Event {
    pub fn new(kind: EventKind, code: u16, value: i32) -> Self {
        Self { kind, code, value }
    }

    /// Key/button press (`value == 1`)
    pub fn press(code: u16) -> Self {
        Self::new(EventKind::Key, code, VALUE_PRESS)
    }

    /// Key/button release (`value == 0`)
    pub fn release(code: u16) -> Self {
        Self::new(EventKind::Key, code, VALUE_RELEASE)
    }

    /// Key autorepeat (`value == 2`)
    pub fn repeat(code: u16) -> Self {
        Self::new(EventKind::Key, code, VALUE_REPEAT)
    }

    /// True for a button press transition. Releases and repeats are not.
    pub fn is_button_press(&self) -> bool {
        self.kind == EventKind::Key && self.value == VALUE_PRESS
    }
}

impl From<evdev::InputEvent> for Event {
    fn from(ev: evdev::InputEvent) -> Self {
        Self {
            kind: EventKind::from_raw(ev.event_type().0),
            code: ev.code(),
            value: ev.value(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EventKind::Key => write!(
                f,
                "{} (code: {}) value={}",
                crate::action::button_name(self.code),
                self.code,
                self.value
            ),
            kind => write!(f, "{:?} code={} value={}", kind, self.code, self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_key_value_one_is_press() {
        assert!(Event::press(275).is_button_press());
        assert!(!Event::release(275).is_button_press());
        assert!(!Event::repeat(275).is_button_press());
        assert!(!Event::new(EventKind::Relative, 8, 1).is_button_press());
    }

    #[test]
    fn test_kind_from_raw() {
        assert_eq!(EventKind::from_raw(0), EventKind::Sync);
        assert_eq!(EventKind::from_raw(1), EventKind::Key);
        assert_eq!(EventKind::from_raw(2), EventKind::Relative);
        assert_eq!(EventKind::from_raw(3), EventKind::Absolute);
        assert_eq!(EventKind::from_raw(0x11), EventKind::Other(0x11));
    }

    #[test]
    fn test_display() {
        assert_eq!(Event::press(275).to_string(), "BTN_SIDE (code: 275) value=1");
        assert_eq!(
            Event::new(EventKind::Relative, 8, -1).to_string(),
            "Relative code=8 value=-1"
        );
    }

    #[test]
    fn test_from_evdev_event() {
        let raw = evdev::InputEvent::new(evdev::EventType::KEY, 276, 1);
        let ev = Event::from(raw);
        assert_eq!(ev, Event::press(276));
    }
}
