//! Rising-edge detection over polled button state.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use tracing::debug;

/// A false -> true transition of one button on one gamepad slot
#[derive(Debug, Clone)]
pub struct ButtonPress {
    pub button: u32,
    pub slot: usize,
    pub timestamp: DateTime<Local>,
}

/// Remembers the last seen pressed state per slot and button.
#[derive(Debug, Default)]
pub struct ButtonEdgeDetector {
    previous: HashMap<usize, Vec<bool>>,
}

impl ButtonEdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device appeared in `slot`: forget anything remembered for it
    pub fn connect(&mut self, slot: usize, button_count: usize) {
        debug!("Resetting button memory for slot {}", slot);
        self.previous.insert(slot, vec![false; button_count]);
    }

    pub fn disconnect(&mut self, slot: usize) {
        debug!("Dropping button memory for slot {}", slot);
        self.previous.remove(&slot);
    }

    pub fn tracked_slots(&self) -> usize {
        self.previous.len()
    }

    /// Compares one frame of button state against the previous frame.
    ///
    /// `pads` yields `(slot, pressed-per-button)` for every connected device.
    /// Presses are reported in slot then button order; the new state is
    /// stored whether or not anything changed.
    pub fn scan<'a, I>(&mut self, pads: I) -> Vec<ButtonPress>
    where
        I: IntoIterator<Item = (usize, &'a [bool])>,
    {
        let now = Local::now();
        let mut presses = Vec::new();

        for (slot, buttons) in pads {
            let previous = self
                .previous
                .entry(slot)
                .or_insert_with(|| vec![false; buttons.len()]);
            if previous.len() < buttons.len() {
                previous.resize(buttons.len(), false);
            }

            for (index, &pressed) in buttons.iter().enumerate() {
                if pressed && !previous[index] {
                    presses.push(ButtonPress {
                        button: index as u32,
                        slot,
                        timestamp: now,
                    });
                }
                previous[index] = pressed;
            }
        }
        presses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buttons_of(presses: &[ButtonPress]) -> Vec<(usize, u32)> {
        presses.iter().map(|p| (p.slot, p.button)).collect()
    }

    #[test]
    fn holding_a_button_fires_once() {
        let mut detector = ButtonEdgeDetector::new();
        let held = [false, true, false];

        assert_eq!(buttons_of(&detector.scan([(0, &held[..])])), vec![(0, 1)]);
        assert!(detector.scan([(0, &held[..])]).is_empty());
        assert!(detector.scan([(0, &held[..])]).is_empty());
    }

    #[test]
    fn release_and_repress_fires_again() {
        let mut detector = ButtonEdgeDetector::new();
        let down = [true];
        let up = [false];

        assert_eq!(detector.scan([(0, &down[..])]).len(), 1);
        assert!(detector.scan([(0, &up[..])]).is_empty());
        assert_eq!(detector.scan([(0, &down[..])]).len(), 1);
    }

    #[test]
    fn slots_are_independent() {
        let mut detector = ButtonEdgeDetector::new();
        let a = [true, false];
        let b = [false, true];

        let presses = detector.scan([(0, &a[..]), (3, &b[..])]);
        assert_eq!(buttons_of(&presses), vec![(0, 0), (3, 1)]);
        assert_eq!(detector.tracked_slots(), 2);
    }

    #[test]
    fn reconnect_resets_memory() {
        let mut detector = ButtonEdgeDetector::new();
        let down = [true, true];

        assert_eq!(detector.scan([(1, &down[..])]).len(), 2);
        detector.disconnect(1);
        assert_eq!(detector.tracked_slots(), 0);

        detector.connect(1, 2);
        // Still held across the reconnect, but memory was reset
        assert_eq!(detector.scan([(1, &down[..])]).len(), 2);
    }
}
