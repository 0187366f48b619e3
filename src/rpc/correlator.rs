//! Turns host method invocations into awaitable results keyed by a generated id.
//!
//! # Lifecycle of a call
//!
//! ```text
//! call() ──► PendingCall{id, deadline} ──► api_call frame ──► host
//!                  │
//!      ┌───────────┴────────────┐
//!      ▼                        ▼
//! api_response(id)         deadline expires
//! resolve / reject         reject with Timeout, entry dropped
//! entry removed            (late response ignored)
//! ```
//!
//! A `PendingCall` owns a oneshot sender, so each call settles exactly once.

use crate::protocol::{ApiResponse, OutboundFrame};
use crate::transport::{Transport, TransportError};
use chrono::{DateTime, Local};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The channel was down when the call was issued
    #[error("cannot call `{method}`: not connected to host")]
    NotConnected { method: String },

    #[error("call to `{method}` timed out after {}ms", .after.as_millis())]
    Timeout { method: String, after: Duration },

    /// The host answered with an `error` field
    #[error("{message}")]
    Host { method: String, message: String },

    #[error("failed to encode call to `{method}`: {source}")]
    Encode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected result from `{method}`: {reason}")]
    Decode { method: String, reason: String },

    /// The correlator was dropped while the call was in flight
    #[error("call to `{method}` was abandoned")]
    Abandoned { method: String },
}

type CallOutcome = Result<Value, String>;

struct PendingCall {
    method: String,
    issued_at: DateTime<Local>,
    deadline: Instant,
    reply: oneshot::Sender<CallOutcome>,
}

/// Tracks in-flight host calls and settles them from `api_response` frames.
pub struct CallCorrelator {
    transport: Arc<dyn Transport>,
    pending: Mutex<HashMap<String, PendingCall>>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl CallCorrelator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_timeout(transport, DEFAULT_CALL_TIMEOUT)
    }

    pub fn with_timeout(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            timeout,
        }
    }

    /// Number of calls still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    /// Invokes `method` on the host and waits for its result.
    ///
    /// # Errors
    ///
    /// * [`CallError::NotConnected`] - the channel is down, nothing was sent
    /// * [`CallError::Timeout`] - no response within the call timeout
    /// * [`CallError::Host`] - the host reported a failure
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, CallError> {
        let id = self.next_id();
        let (reply, outcome) = oneshot::channel();
        let deadline = Instant::now() + self.timeout;

        self.lock_pending().insert(
            id.clone(),
            PendingCall {
                method: method.to_string(),
                issued_at: Local::now(),
                deadline,
                reply,
            },
        );

        let frame = OutboundFrame::ApiCall {
            id: id.clone(),
            method: method.to_string(),
            args,
        };
        if let Err(e) = self.transport.send(&frame) {
            self.lock_pending().remove(&id);
            return Err(match e {
                TransportError::NotConnected => CallError::NotConnected {
                    method: method.to_string(),
                },
                TransportError::Encode(source) => CallError::Encode {
                    method: method.to_string(),
                    source,
                },
            });
        }
        debug!("Call {} -> {}", id, method);

        match tokio::time::timeout_at(deadline, outcome).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(message))) => Err(CallError::Host {
                method: method.to_string(),
                message,
            }),
            Ok(Err(_)) => Err(CallError::Abandoned {
                method: method.to_string(),
            }),
            Err(_) => {
                self.lock_pending().remove(&id);
                warn!(
                    "Call {} to `{}` timed out after {}ms",
                    id,
                    method,
                    self.timeout.as_millis()
                );
                Err(CallError::Timeout {
                    method: method.to_string(),
                    after: self.timeout,
                })
            }
        }
    }

    /// Settles the pending call matching `response.id`.
    ///
    /// Returns `false` when no call is waiting for that id (already timed out,
    /// or never issued by this window).
    pub fn resolve(&self, response: ApiResponse) -> bool {
        let Some(pending) = self.lock_pending().remove(&response.id) else {
            debug!("Ignoring response for unknown call {}", response.id);
            return false;
        };

        let elapsed = Local::now() - pending.issued_at;
        debug!(
            "Call {} (`{}`) answered after {}ms",
            response.id,
            pending.method,
            elapsed.num_milliseconds()
        );
        if Instant::now() > pending.deadline {
            // Timer has not fired yet but the bound is already exceeded
            debug!("Call {} answered past its deadline", response.id);
        }

        let outcome = match response.error {
            Some(message) => Err(message),
            None => Ok(response.result.unwrap_or(Value::Null)),
        };
        // The caller may have stopped waiting; that is not an error
        let _ = pending.reply.send(outcome);
        true
    }

    /// Drops every pending call. Waiting callers observe [`CallError::Abandoned`].
    pub fn abandon_all(&self) {
        let drained: Vec<_> = self.lock_pending().drain().collect();
        if !drained.is_empty() {
            info!("Abandoning {} pending host calls", drained.len());
        }
    }

    fn next_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("call-{}", n)
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, PendingCall>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
