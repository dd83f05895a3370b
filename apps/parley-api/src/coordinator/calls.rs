//! Call-signaling state machine.
//!
//! Per-pair lifecycle: Idle (no record) → Ringing → Active → Idle. A record
//! is stored under both participants so the one-call-per-user invariant is a
//! key-existence check. A single mutex serializes every transition.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::CoordinatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// Caller initiated, awaiting the callee's answer.
    Ringing,
    /// Callee accepted; both parties are in the call.
    Active,
}

/// One call between an ordered pair of users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub caller: String,
    pub callee: String,
    pub phase: CallPhase,
}

impl CallRecord {
    /// The other party, from `username`'s point of view.
    pub fn partner_of(&self, username: &str) -> &str {
        if self.caller == username {
            &self.callee
        } else {
            &self.caller
        }
    }
}

pub struct CallRegistry {
    /// Keyed by *both* participants; the two entries are identical clones.
    inner: Mutex<HashMap<String, CallRecord>>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Create a Ringing record for the pair.
    ///
    /// A second call while either party has any record is rejected, never
    /// queued.
    pub fn start(&self, caller: &str, callee: &str) -> Result<(), CoordinatorError> {
        if caller == callee {
            return Err(CoordinatorError::SelfCall);
        }
        let mut calls = self.inner.lock();
        if calls.contains_key(caller) {
            return Err(CoordinatorError::CallerBusy);
        }
        if calls.contains_key(callee) {
            return Err(CoordinatorError::CalleeBusy(callee.to_string()));
        }
        let record = CallRecord {
            caller: caller.to_string(),
            callee: callee.to_string(),
            phase: CallPhase::Ringing,
        };
        calls.insert(caller.to_string(), record.clone());
        calls.insert(callee.to_string(), record);
        Ok(())
    }

    /// Transition Ringing → Active. Only the callee of a ringing record with
    /// a matching pair may accept.
    pub fn accept(&self, callee: &str, caller: &str) -> Result<(), CoordinatorError> {
        let mut calls = self.inner.lock();
        match calls.get(callee) {
            Some(r)
                if r.phase == CallPhase::Ringing && r.caller == caller && r.callee == callee => {}
            Some(_) => {
                return Err(CoordinatorError::InvalidCallTransition(format!(
                    "no ringing call from {caller}"
                )));
            }
            None => {
                return Err(CoordinatorError::InvalidCallTransition(
                    "no incoming call".to_string(),
                ));
            }
        }
        for key in [callee, caller] {
            if let Some(r) = calls.get_mut(key) {
                r.phase = CallPhase::Active;
            }
        }
        Ok(())
    }

    /// Delete a Ringing record. Only the callee may reject.
    pub fn reject(&self, callee: &str, caller: &str) -> Result<(), CoordinatorError> {
        let mut calls = self.inner.lock();
        match calls.get(callee) {
            Some(r)
                if r.phase == CallPhase::Ringing && r.caller == caller && r.callee == callee =>
            {
                calls.remove(callee);
                calls.remove(caller);
                Ok(())
            }
            _ => Err(CoordinatorError::InvalidCallTransition(format!(
                "no ringing call from {caller}"
            ))),
        }
    }

    /// Delete an Active record; either party may hang up. Returns the
    /// partner's username.
    pub fn end(&self, username: &str) -> Result<String, CoordinatorError> {
        let mut calls = self.inner.lock();
        match calls.get(username) {
            Some(r) if r.phase == CallPhase::Active => {
                let partner = r.partner_of(username).to_string();
                calls.remove(username);
                calls.remove(&partner);
                Ok(partner)
            }
            _ => Err(CoordinatorError::InvalidCallTransition(
                "no active call".to_string(),
            )),
        }
    }

    /// Tear down whatever record involves `username`, Ringing or Active.
    /// Used on disconnect; no client confirmation is required. Returns the
    /// removed record.
    pub fn teardown(&self, username: &str) -> Option<CallRecord> {
        let mut calls = self.inner.lock();
        let record = calls.remove(username)?;
        calls.remove(record.partner_of(username));
        Some(record)
    }

    /// The record involving `username`, if any.
    pub fn record_for(&self, username: &str) -> Option<CallRecord> {
        self.inner.lock().get(username).cloned()
    }
}
