use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters. Connections only ever bump them.
#[derive(Default)]
pub struct Stats {
    next_id: AtomicU64,
    pub accepted: AtomicU64,
    pub active: AtomicU64,
    pub sniff_failed: AtomicU64,
    pub dial_failed: AtomicU64,
    pub relayed: AtomicU64,
    /// client -> backend, captured prefix included
    pub bytes_up: AtomicU64,
    /// backend -> client
    pub bytes_down: AtomicU64,
}

impl Stats {
    /// Ids start at 1.
    pub fn next_conn_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn conn_opened(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }
    pub fn conn_closed(&self) { self.active.fetch_sub(1, Ordering::Relaxed); }

    pub fn inc_sniff_failed(&self) { self.sniff_failed.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_dial_failed(&self) { self.dial_failed.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_relayed(&self) { self.relayed.fetch_add(1, Ordering::Relaxed); }
    pub fn add_up(&self, n: u64) { self.bytes_up.fetch_add(n, Ordering::Relaxed); }
    pub fn add_down(&self, n: u64) { self.bytes_down.fetch_add(n, Ordering::Relaxed); }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            sniff_failed: self.sniff_failed.load(Ordering::Relaxed),
            dial_failed: self.dial_failed.load(Ordering::Relaxed),
            relayed: self.relayed.load(Ordering::Relaxed),
            bytes_up: self.bytes_up.load(Ordering::Relaxed),
            bytes_down: self.bytes_down.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub active: u64,
    pub sniff_failed: u64,
    pub dial_failed: u64,
    pub relayed: u64,
    pub bytes_up: u64,
    pub bytes_down: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accepted={} active={} sniff_failed={} dial_failed={} relayed={} up={}B down={}B",
            self.accepted,
            self.active,
            self.sniff_failed,
            self.dial_failed,
            self.relayed,
            self.bytes_up,
            self.bytes_down
        )
    }
}
