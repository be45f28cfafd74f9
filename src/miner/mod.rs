//! Parallel proof-of-work search.
//!
//! A [`Miner`] is a reusable engine configuration. Each call to
//! [`Miner::start`] returns an owned [`MiningSession`] holding the shared
//! atomics for that attempt, so independent sessions never interfere.
//!
//! Workers claim candidate nonces from a shared ticket counter and race to
//! compare-and-swap the solution slot. An external [`StopHandle::stop`]
//! writes the slot directly and every worker exits on its next check.

mod handle;

pub use handle::MinerHandle;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use log::{debug, info};
use rand::Rng;

use crate::crypto::{meets_difficulty, pow_hash_text};

/// Per-session attempt cap; reaching it ends the session as `Exhausted`.
pub const DEFAULT_MAX_ATTEMPTS: u64 = 1_000_000_000;

/// Ticket counters start somewhere in `[0, TICKET_SEED_SPAN)`.
const TICKET_SEED_SPAN: u64 = 1 << 31;

// Slot encoding: 0 = unsolved, otherwise nonce + 1.
const UNSOLVED: u64 = 0;

fn encode_slot(nonce: u64) -> u64 {
    nonce.saturating_add(1)
}

fn decode_slot(slot: u64) -> Option<u64> {
    slot.checked_sub(1)
}

/// How a mining session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningOutcome {
    /// A local worker found this nonce.
    Solved(u64),
    /// The session was stopped externally with this value.
    Stopped(u64),
    /// The attempt cap was reached without a solution.
    Exhausted,
}

impl MiningOutcome {
    pub fn solved(&self) -> Option<u64> {
        match self {
            MiningOutcome::Solved(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Miner {
    workers: usize,
    max_attempts: u64,
}

impl Default for Miner {
    fn default() -> Self {
        Self::new(num_cpus::get(), DEFAULT_MAX_ATTEMPTS)
    }
}

impl Miner {
    pub fn new(workers: usize, max_attempts: u64) -> Self {
        Self {
            workers: workers.max(1),
            max_attempts,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn max_attempts(&self) -> u64 {
        self.max_attempts
    }

    /// Spawn the workers with a random ticket seed.
    pub fn start(&self, message: impl Into<String>, difficulty: u32) -> MiningSession {
        let seed = rand::thread_rng().gen_range(0..TICKET_SEED_SPAN);
        self.start_at(message, difficulty, seed)
    }

    /// Spawn the workers with the ticket counter starting at `seed`.
    pub fn start_at(&self, message: impl Into<String>, difficulty: u32, seed: u64) -> MiningSession {
        let state = Arc::new(SessionState {
            message: message.into(),
            difficulty,
            slot: AtomicU64::new(UNSOLVED),
            ticket: AtomicU64::new(seed),
            seed,
            limit: self.max_attempts,
            working: AtomicBool::new(true),
            winner: AtomicBool::new(false),
        });
        debug!(
            "MINER - session start: difficulty={} workers={} seed={}",
            difficulty, self.workers, seed
        );

        let workers = (0..self.workers)
            .map(|_| {
                let state = Arc::clone(&state);
                thread::spawn(move || work(&state))
            })
            .collect();

        MiningSession { state, workers }
    }

    /// Start a session and block until it ends.
    pub fn solve(&self, message: &str, difficulty: u32) -> MiningOutcome {
        self.start(message, difficulty).wait()
    }
}

struct SessionState {
    message: String,
    difficulty: u32,
    slot: AtomicU64,
    ticket: AtomicU64,
    seed: u64,
    limit: u64,
    working: AtomicBool,
    winner: AtomicBool,
}

fn work(state: &SessionState) {
    while state.slot.load(Ordering::Acquire) == UNSOLVED {
        let n = state.ticket.fetch_add(1, Ordering::Relaxed);
        if n.wrapping_sub(state.seed) >= state.limit {
            break;
        }
        let text = pow_hash_text(&state.message, n);
        if meets_difficulty(&text, state.difficulty) {
            if state
                .slot
                .compare_exchange(UNSOLVED, encode_slot(n), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                state.winner.store(true, Ordering::Release);
                info!("MINER - nonce {} found (hash={})", n, text);
            }
            break;
        }
    }
}

/// One running search. Dropping it without [`MiningSession::wait`] detaches
/// the workers; they still end when the slot fills or the cap is reached.
pub struct MiningSession {
    state: Arc<SessionState>,
    workers: Vec<JoinHandle<()>>,
}

impl MiningSession {
    /// A cloneable handle that can stop this session from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Block until every worker has exited and report the outcome.
    pub fn wait(self) -> MiningOutcome {
        for worker in self.workers {
            // a panicking worker only loses its share of the search space
            let _ = worker.join();
        }
        self.state.working.store(false, Ordering::Release);

        let slot = decode_slot(self.state.slot.load(Ordering::Acquire));
        match slot {
            Some(n) if self.state.winner.load(Ordering::Acquire) => MiningOutcome::Solved(n),
            Some(n) => MiningOutcome::Stopped(n),
            None => MiningOutcome::Exhausted,
        }
    }
}

#[derive(Clone)]
pub struct StopHandle {
    state: Arc<SessionState>,
}

impl StopHandle {
    /// Fill the slot with `nonce` if no worker has won yet. Returns whether
    /// the stop took effect.
    pub fn stop(&self, nonce: u64) -> bool {
        self.state.working.store(false, Ordering::Release);
        self.state
            .slot
            .compare_exchange(UNSOLVED, encode_slot(nonce), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_working(&self) -> bool {
        self.state.working.load(Ordering::Acquire)
    }

    /// Whether both handles control the same session.
    pub fn same_session(&self, other: &StopHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub fn message(&self) -> &str {
        &self.state.message
    }

    pub fn difficulty(&self) -> u32 {
        self.state.difficulty
    }
}
