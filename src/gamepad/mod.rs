//! Gamepad Poller - frame-based button polling on a dedicated thread
//!
//! ```text
//! gilrs ──► GamepadPoller<Polling> ──(gate open?)──► ButtonEdgeDetector
//!                                                          │ rising edges
//!                                                          ▼
//!                                           mpsc<ButtonPress> ──► session
//! ```
//!
//! Only the primary window runs a poller. A press is reported once per
//! false -> true transition; holding a button does not repeat.

pub mod edge_detector;
pub mod gate;
pub mod poller;

pub use edge_detector::{ButtonEdgeDetector, ButtonPress};
pub use gate::{GamepadGate, GateGuard};
pub use poller::{
    scan_frame, GamepadError, GamepadPoller, PollerHandle, PollerSettings, STANDARD_BUTTONS,
};
