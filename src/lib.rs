//! Window-side bridge between a pinball cabinet frontend and its host process.
//!
//! Each frontend window runs one [`session::WindowSession`] connected to the
//! host over a WebSocket. The session correlates host calls, fans out pushed
//! events, and on the primary window turns keyboard and gamepad input into
//! action tokens for theme and menu code.

pub mod assets;
pub mod config;
pub mod events;
pub mod gamepad;
pub mod host;
pub mod input;
pub mod overlay;
pub mod protocol;
pub mod rpc;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;
