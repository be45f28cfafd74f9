use std::sync::Mutex;

use super::{Miner, MiningOutcome, StopHandle};
use crate::crypto::pow_hash_text;

#[derive(Debug, Clone)]
struct LastRun {
    message: String,
    nonce: u64,
    winner: bool,
}

/// Node-owned miner: at most one active session, plus the result of the
/// last finished one for the remote `is_winner`/`nonce`/`hash` queries.
pub struct MinerHandle {
    miner: Miner,
    active: Mutex<Option<StopHandle>>,
    last: Mutex<Option<LastRun>>,
}

impl MinerHandle {
    pub fn new(miner: Miner) -> Self {
        Self {
            miner,
            active: Mutex::new(None),
            last: Mutex::new(None),
        }
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    /// Run one session to completion. Returns `None` without mining when a
    /// session is already working.
    pub fn run(&self, message: &str, difficulty: u32) -> Option<MiningOutcome> {
        let (session, own) = {
            let mut active = self.active.lock().expect("mutex poisoned");
            if active.as_ref().is_some_and(StopHandle::is_working) {
                return None;
            }
            let session = self.miner.start(message, difficulty);
            let own = session.stop_handle();
            *active = Some(own.clone());
            (session, own)
        };

        let outcome = session.wait();

        {
            // a newer session may already have taken the slot
            let mut active = self.active.lock().expect("mutex poisoned");
            if active.as_ref().is_some_and(|h| h.same_session(&own)) {
                *active = None;
            }
        }
        let last = match outcome {
            MiningOutcome::Solved(nonce) => Some(LastRun {
                message: message.to_string(),
                nonce,
                winner: true,
            }),
            MiningOutcome::Stopped(nonce) => Some(LastRun {
                message: message.to_string(),
                nonce,
                winner: false,
            }),
            MiningOutcome::Exhausted => None,
        };
        *self.last.lock().expect("mutex poisoned") = last;
        Some(outcome)
    }

    /// Stop the working session, if any. Returns whether one was stopped.
    pub fn stop(&self, nonce: u64) -> bool {
        let active = self.active.lock().expect("mutex poisoned");
        match active.as_ref() {
            Some(handle) if handle.is_working() => handle.stop(nonce),
            _ => false,
        }
    }

    pub fn is_mining(&self) -> bool {
        self.active
            .lock()
            .expect("mutex poisoned")
            .as_ref()
            .is_some_and(StopHandle::is_working)
    }

    /// Whether the last finished session was won by a local worker.
    pub fn is_winner(&self) -> bool {
        self.last
            .lock()
            .expect("mutex poisoned")
            .as_ref()
            .is_some_and(|l| l.winner)
    }

    pub fn nonce(&self) -> Option<u64> {
        self.last.lock().expect("mutex poisoned").as_ref().map(|l| l.nonce)
    }

    /// Text hash of the last session's message with its nonce.
    pub fn hash(&self) -> Option<String> {
        self.last
            .lock()
            .expect("mutex poisoned")
            .as_ref()
            .map(|l| pow_hash_text(&l.message, l.nonce))
    }
}
