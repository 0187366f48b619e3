//! Call Correlator - request/response matching for host calls

pub mod correlator;

pub use correlator::{CallCorrelator, CallError, DEFAULT_CALL_TIMEOUT};
