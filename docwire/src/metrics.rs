//! Listener and handler metrics.
//!
//! Values are reported through the [`metrics`] facade, the recorder is
//! installed by the binary before the [`Metrics`] context is created.
use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use metrics::{counter, describe_counter, describe_gauge, gauge};

const CONNECTED: &str = "docwire_connected_clients";
const ACCEPTED: &str = "docwire_accepted_connections_total";
const REQUESTS: &str = "docwire_requests_total";
const RESPONSES: &str = "docwire_responses_total";
const DIFFS: &str = "docwire_diffs_total";

/// Shared metrics context, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    connected: Arc<AtomicUsize>,
    diffs: Arc<AtomicU64>,
}

impl Metrics {
    /// Create the context and describe every metric to the installed recorder.
    pub fn new() -> Metrics {
        describe_gauge!(CONNECTED, "The current number of connected clients.");
        describe_counter!(ACCEPTED, "Total number of accepted client connections.");
        describe_counter!(REQUESTS, "Total number of requests, by opcode and command.");
        describe_counter!(RESPONSES, "Total number of responses, by opcode, command and result.");
        describe_counter!(DIFFS, "Total number of recorded response diffs.");
        Metrics::default()
    }

    /// Number of live client connections.
    pub fn connected(&self) -> usize {
        self.connected.load(Ordering::Acquire)
    }

    /// Number of non empty diffs recorded in diff modes.
    pub fn diffs(&self) -> u64 {
        self.diffs.load(Ordering::Acquire)
    }

    /// Count a new connection, the returned guard uncount it on drop.
    pub fn connection(&self) -> ConnectionGuard {
        let n = self.connected.fetch_add(1, Ordering::AcqRel) + 1;
        gauge!(CONNECTED).set(n as f64);
        counter!(ACCEPTED).increment(1);
        ConnectionGuard { metrics: self.clone() }
    }

    pub(crate) fn request(&self, opcode: &'static str, command: &'static str) {
        counter!(REQUESTS, "opcode" => opcode, "command" => command).increment(1);
    }

    pub(crate) fn response(&self, opcode: &'static str, command: &'static str, result: &'static str) {
        counter!(RESPONSES, "opcode" => opcode, "command" => command, "result" => result).increment(1);
    }

    pub(crate) fn diff(&self) {
        self.diffs.fetch_add(1, Ordering::AcqRel);
        counter!(DIFFS).increment(1);
    }
}

/// Live connection count guard.
#[derive(Debug)]
pub struct ConnectionGuard {
    metrics: Metrics,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let n = self.metrics.connected.fetch_sub(1, Ordering::AcqRel) - 1;
        gauge!(CONNECTED).set(n as f64);
    }
}
