//! In-memory host double used by unit tests.

use crate::protocol::{ApiResponse, OutboundFrame};
use crate::rpc::CallCorrelator;
use crate::transport::{Transport, TransportError};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Responder = Box<dyn Fn(&str, &[Value]) -> Result<Value, String> + Send + Sync>;

/// Records every outbound call and answers synchronously through a script.
///
/// Methods listed with [`ScriptedTransport::withhold`] are recorded but left
/// unanswered until [`ScriptedTransport::release`].
pub struct ScriptedTransport {
    open: AtomicBool,
    sent: Mutex<Vec<(String, String, Vec<Value>)>>,
    responder: Mutex<Option<(Arc<CallCorrelator>, Responder)>>,
    withheld: Mutex<HashSet<String>>,
}

impl ScriptedTransport {
    pub fn open() -> Arc<Self> {
        Arc::new(Self::with_state(true))
    }

    pub fn closed() -> Arc<Self> {
        Arc::new(Self::with_state(false))
    }

    fn with_state(open: bool) -> Self {
        Self {
            open: AtomicBool::new(open),
            sent: Mutex::new(Vec::new()),
            responder: Mutex::new(None),
            withheld: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn answer_with<F>(&self, correlator: Arc<CallCorrelator>, script: F)
    where
        F: Fn(&str, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        *self.responder.lock().unwrap() = Some((correlator, Box::new(script)));
    }

    pub fn withhold(&self, method: &str) {
        self.withheld.lock().unwrap().insert(method.to_string());
    }

    /// Answers the most recent withheld call to `method`
    pub fn release(&self, method: &str, result: Result<Value, String>) {
        self.withheld.lock().unwrap().remove(method);
        let id = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(_, m, _)| m == method)
            .map(|(id, _, _)| id.clone())
            .expect("no call recorded for method");
        let guard = self.responder.lock().unwrap();
        let (correlator, _) = guard.as_ref().expect("no responder installed");
        correlator.resolve(to_response(id, result));
    }

    pub fn sent_frames(&self) -> Vec<(String, String, Vec<Value>)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_methods(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, method, _)| method.clone())
            .collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, frame: &OutboundFrame) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotConnected);
        }
        let OutboundFrame::ApiCall { id, method, args } = frame;
        self.sent
            .lock()
            .unwrap()
            .push((id.clone(), method.clone(), args.clone()));

        if self.withheld.lock().unwrap().contains(method) {
            return Ok(());
        }
        let guard = self.responder.lock().unwrap();
        if let Some((correlator, script)) = guard.as_ref() {
            correlator.resolve(to_response(id.clone(), script(method, args)));
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

fn to_response(id: String, result: Result<Value, String>) -> ApiResponse {
    match result {
        Ok(value) => ApiResponse {
            id,
            result: Some(value),
            error: None,
        },
        Err(message) => ApiResponse {
            id,
            result: None,
            error: Some(message),
        },
    }
}
