//! Relays this window's log output to the host console.
//!
//! [`HostConsoleLayer`] formats and queues lines without blocking;
//! [`forward_to_host`] drains the queue through `console_out` in order.
//! Events from the call and transport plumbing are never relayed: sending a
//! line emits them.

use super::HostApi;
use std::fmt;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{debug, Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

const CRATE_TARGET: &str = "cabinet_bridge";

const SILENT_TARGETS: [&str; 3] = [
    "cabinet_bridge::rpc",
    "cabinet_bridge::transport",
    "cabinet_bridge::host::console",
];

/// A [`tracing_subscriber::Layer`] that queues `level:message` lines for the
/// host console.
///
/// Relays INFO and above from this crate, WARN and above from dependencies.
pub struct HostConsoleLayer {
    lines: mpsc::UnboundedSender<String>,
}

impl HostConsoleLayer {
    /// Returns the layer and the queue [`forward_to_host`] drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (lines, queue) = mpsc::unbounded_channel();
        (Self { lines }, queue)
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for HostConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();
        if SILENT_TARGETS.iter().any(|silent| target.starts_with(silent)) {
            return;
        }

        let floor = if target.starts_with(CRATE_TARGET) {
            Level::INFO
        } else {
            Level::WARN
        };
        if *metadata.level() > floor {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut line = format!(
            "{}:{}",
            metadata.level().as_str().to_ascii_lowercase(),
            visitor.message
        );
        if !visitor.fields.is_empty() {
            line.push(' ');
            line.push_str(&visitor.fields.join(" "));
        }
        // Nobody forwards anymore: drop the line
        let _ = self.lines.send(line);
    }
}

/// Sends queued lines to the host until the queue closes. Lines the host
/// cannot take are dropped.
pub async fn forward_to_host(host: HostApi, mut queue: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = queue.recv().await {
        if let Err(e) = host.console_out(&line).await {
            debug!("Dropped console line: {}", e);
        }
    }
    debug!("Console relay stopped");
}
