use super::edge_detector::{ButtonEdgeDetector, ButtonPress};
use super::gate::GamepadGate;
use gilrs::{Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Buttons in W3C "standard gamepad" index order, so host mappings keyed by
/// browser button numbers line up.
pub const STANDARD_BUTTONS: [Button; 17] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::Mode,
];

#[derive(Clone, Debug)]
pub struct PollerSettings {
    pub frame_interval: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GamepadError {
    #[error("Failed to initialize gamepad backend: {0}")]
    InitializationError(String),

    #[error("Failed to start poller thread: {0}")]
    ThreadError(#[from] std::io::Error),
}

#[state]
#[derive(Debug, Clone)]
pub enum PollerState {
    Initializing,
    Polling,
}

#[machine]
#[derive(Debug)]
pub struct GamepadPoller<S: PollerState> {
    gilrs: Gilrs,
    detector: ButtonEdgeDetector,
    gate: GamepadGate,
    settings: PollerSettings,
    press_sender: mpsc::UnboundedSender<ButtonPress>,
}

impl GamepadPoller<Initializing> {
    pub fn create(
        settings: PollerSettings,
        gate: GamepadGate,
        press_sender: mpsc::UnboundedSender<ButtonPress>,
    ) -> Result<Self, GamepadError> {
        info!("Initializing gilrs gamepad backend");
        let gilrs = match Gilrs::new() {
            Ok(g) => g,
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(GamepadError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(
            gilrs,
            ButtonEdgeDetector::new(),
            gate,
            settings,
            press_sender,
        ))
    }

    /// Seeds button memory for pads already present at startup
    pub fn initialize(mut self) -> GamepadPoller<Polling> {
        let pads: Vec<(GamepadId, String)> = self
            .gilrs
            .gamepads()
            .map(|(id, pad)| (id, pad.name().to_string()))
            .collect();

        if pads.is_empty() {
            warn!("No gamepad connected, waiting for one");
        }
        for (id, name) in pads {
            info!("Found gamepad {} ({})", name, id);
            self.detector.connect(usize::from(id), STANDARD_BUTTONS.len());
        }

        info!(
            "Gamepad poller ready, frame interval {:?}",
            self.settings.frame_interval
        );
        self.transition()
    }
}

impl GamepadPoller<Polling> {
    /// Drains backend events and, while the gate is open, reports new presses.
    /// Returns false once nobody listens for presses anymore.
    pub fn poll_frame(&mut self) -> bool {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    info!("Gamepad {} connected", id);
                    self.detector.connect(usize::from(id), STANDARD_BUTTONS.len());
                }
                EventType::Disconnected => {
                    info!("Gamepad {} disconnected", id);
                    self.detector.disconnect(usize::from(id));
                }
                _ => {}
            }
        }

        if !self.gate.is_enabled() {
            return !self.press_sender.is_closed();
        }

        let snapshots: Vec<(usize, [bool; 17])> = self
            .gilrs
            .gamepads()
            .filter(|(_, pad)| pad.is_connected())
            .map(|(id, pad)| (usize::from(id), snapshot(&pad)))
            .collect();

        let presses = scan_frame(&self.gate, &mut self.detector, &snapshots);

        for press in presses {
            debug!(
                "Button {} pressed on slot {} at {}",
                press.button,
                press.slot,
                press.timestamp.format("%H:%M:%S.%3f")
            );
            if self.press_sender.send(press).is_err() {
                return false;
            }
        }
        true
    }

    pub fn run_poll_loop(&mut self) {
        info!("Starting gamepad poll loop");
        while self.poll_frame() {
            std::thread::sleep(self.settings.frame_interval);
        }
        info!("Press receiver dropped, stopping gamepad poll loop");
    }
}

/// One frame of edge detection. A closed gate reports nothing and leaves the
/// detector's memory as it was.
pub fn scan_frame<S: AsRef<[bool]>>(
    gate: &GamepadGate,
    detector: &mut ButtonEdgeDetector,
    snapshots: &[(usize, S)],
) -> Vec<ButtonPress> {
    if !gate.is_enabled() {
        return Vec::new();
    }
    detector.scan(
        snapshots
            .iter()
            .map(|(slot, state)| (*slot, state.as_ref())),
    )
}

fn snapshot(pad: &Gamepad<'_>) -> [bool; 17] {
    let mut state = [false; 17];
    for (index, button) in STANDARD_BUTTONS.iter().enumerate() {
        state[index] = pad.is_pressed(*button);
    }
    state
}

/// Owns the dedicated polling thread
pub struct PollerHandle {
    _thread: JoinHandle<()>,
}

impl PollerHandle {
    pub fn spawn(
        settings: PollerSettings,
        gate: GamepadGate,
        press_sender: mpsc::UnboundedSender<ButtonPress>,
    ) -> Result<Self, GamepadError> {
        let poller = GamepadPoller::create(settings, gate, press_sender)?;

        let thread = std::thread::Builder::new()
            .name("gamepad-poller".to_string())
            .spawn(move || {
                let mut polling = poller.initialize();
                polling.run_poll_loop();
            })?;

        info!("Gamepad poller started");
        Ok(Self { _thread: thread })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_order_matches_browser_indices() {
        assert_eq!(STANDARD_BUTTONS[0], Button::South);
        assert_eq!(STANDARD_BUTTONS[3], Button::North);
        assert_eq!(STANDARD_BUTTONS[9], Button::Start);
        assert_eq!(STANDARD_BUTTONS[12], Button::DPadUp);
        assert_eq!(STANDARD_BUTTONS[16], Button::Mode);
    }

    fn pressed(buttons: &[u32]) -> [bool; 17] {
        let mut state = [false; 17];
        for &button in buttons {
            state[button as usize] = true;
        }
        state
    }

    #[test]
    fn closed_gate_ignores_presses_without_touching_memory() {
        let gate = GamepadGate::default();
        let mut detector = ButtonEdgeDetector::new();
        detector.connect(0, STANDARD_BUTTONS.len());

        let guard = gate.suspend();
        let presses = scan_frame(&gate, &mut detector, &[(0, pressed(&[5]))]);
        assert!(presses.is_empty());
        drop(guard);

        // Still held after the launch returns: memory never saw it, so it counts now
        let presses = scan_frame(&gate, &mut detector, &[(0, pressed(&[5]))]);
        assert_eq!(presses.len(), 1);
        assert_eq!(presses[0].button, 5);
        assert_eq!(presses[0].slot, 0);

        let presses = scan_frame(&gate, &mut detector, &[(0, pressed(&[5]))]);
        assert!(presses.is_empty());
    }

    #[test]
    fn open_gate_reports_rising_edges_per_slot() {
        let gate = GamepadGate::default();
        let mut detector = ButtonEdgeDetector::new();

        let frame = vec![(1, pressed(&[0, 9])), (0, pressed(&[]))];
        let presses = scan_frame(&gate, &mut detector, &frame);
        let seen: Vec<_> = presses.iter().map(|p| (p.slot, p.button)).collect();
        assert_eq!(seen, vec![(1, 0), (1, 9)]);
        assert_eq!(detector.tracked_slots(), 2);
    }
}
