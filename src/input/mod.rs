//! Input Router - keyboard and gamepad input to abstract action tokens
//!
//! ```text
//! KeyInput ──► KeyBindings ──► KeyCommand ─┐
//!                                          ├──► InputRouter ──► handlers
//! button ──► ButtonActionMap ──► actions ──┘    (by OverlayState)
//! ```

pub mod actions;
pub mod button_map;
pub mod keyboard;
pub mod router;

pub use actions::InputAction;
pub use button_map::ButtonActionMap;
pub use keyboard::{KeyBindings, KeyCommand, KeyInput};
pub use router::{input_handler, HandlerRegistry, InputHandler, InputRouter};
