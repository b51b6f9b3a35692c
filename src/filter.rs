//! Per-event filter.

use crate::bits::EV_KEY;
use crate::event::InputEvent;

/// `BTN_MODE`, the guide/home button on gamepads.
pub const BTN_MODE: u16 = 0x13c;

/// Drops key events for at most one button code; everything else passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    suppressed: Option<u16>,
}

impl EventFilter {
    /// A filter that passes every record.
    pub const fn pass_all() -> Self {
        Self { suppressed: None }
    }

    /// A filter that drops `EV_KEY` records for `code`.
    pub const fn suppress(code: u16) -> Self {
        Self {
            suppressed: Some(code),
        }
    }

    /// The suppressed button code, if any.
    pub const fn suppressed(&self) -> Option<u16> {
        self.suppressed
    }

    /// Whether `event` should be forwarded.
    #[inline]
    pub fn allows(&self, event: &InputEvent) -> bool {
        match self.suppressed {
            Some(code) => !(event.event_type() == EV_KEY && event.code() == code),
            None => true,
        }
    }
}

impl From<Option<u16>> for EventFilter {
    fn from(suppressed: Option<u16>) -> Self {
        Self { suppressed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::EV_ABS;

    #[test]
    fn test_pass_all() {
        let filter = EventFilter::pass_all();
        assert!(filter.allows(&InputEvent::new(EV_KEY, BTN_MODE, 1)));
    }

    #[test]
    fn test_suppress_only_matching_key() {
        let filter = EventFilter::suppress(BTN_MODE);
        assert!(!filter.allows(&InputEvent::new(EV_KEY, BTN_MODE, 1)));
        assert!(!filter.allows(&InputEvent::new(EV_KEY, BTN_MODE, 0)));
        assert!(filter.allows(&InputEvent::new(EV_KEY, 0x130, 1)));
        // Same numeric code under another event type is not a button.
        assert!(filter.allows(&InputEvent::new(EV_ABS, BTN_MODE, 5)));
    }

    #[test]
    fn test_btn_mode_matches_evdev() {
        assert_eq!(evdev::Key::BTN_MODE.code(), BTN_MODE);
    }
}
