//! Event Dispatcher - fan-out of host-pushed events
//!
//! ```text
//! event frame ──► playSound? ──yes──► SoundPlayer (stop)
//!                     │ no
//!                     ▼
//!               local receiver
//!                     │ forward_iframe
//!                     ▼
//!          main-menu receiver ──► collection-menu receiver
//! ```
//!
//! Theme code subscribes per event type with `register_event_handler`; those
//! handlers run sequentially via `run_handlers`.

pub mod dispatcher;
pub mod sound;

pub use dispatcher::{event_handler, DeliveryReport, EventDispatcher, EventHandler};
pub use sound::{HostSoundPlayer, SoundPlayer};
