//! Test doubles for the transport boundary.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SignalError;
use crate::session::{Connection, ConnectionState};

/// An in-memory [`Connection`] that records everything sent through it.
///
/// Cloning shares the underlying record, so tests keep one handle for
/// inspection while the session owns a boxed clone.
#[derive(Clone)]
pub struct RecordingConnection {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    sent: Vec<String>,
    state: ConnectionState,
    fail_sends: bool,
    close_calls: usize,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sent: Vec::new(),
                state: ConnectionState::Open,
                fail_sends: false,
                close_calls: 0,
            })),
        }
    }

    /// A boxed clone for handing to a session.
    pub fn boxed(&self) -> Box<dyn Connection> {
        Box::new(self.clone())
    }

    pub fn sent(&self) -> Vec<String> {
        self.inner.lock().sent.clone()
    }

    pub fn last_sent(&self) -> Option<String> {
        self.inner.lock().sent.last().cloned()
    }

    pub fn sent_count(&self) -> usize {
        self.inner.lock().sent.len()
    }

    pub fn close_calls(&self) -> usize {
        self.inner.lock().close_calls
    }

    /// Make every subsequent send fail, as a dead socket would.
    pub fn break_sends(&self) {
        self.inner.lock().fail_sends = true;
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.inner.lock().state = state;
    }
}

impl Connection for RecordingConnection {
    fn send(&self, payload: &str) -> Result<(), SignalError> {
        let mut inner = self.inner.lock();
        if inner.fail_sends {
            return Err(SignalError::ConnectionClosed);
        }
        inner.sent.push(payload.to_string());
        Ok(())
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        inner.close_calls += 1;
        inner.state = ConnectionState::Closed;
    }

    fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }
}
