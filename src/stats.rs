// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 AuraIO Contributors


//! Engine statistics

use crate::op::OpKind;
use std::cell::Cell;

/// Engine statistics snapshot
///
/// Retrieved via `Proactor::stats()` or `MockEngine::stats()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    ops_submitted: u64,
    ops_completed: u64,
    ops_failed: u64,
    bytes_read: u64,
    bytes_written: u64,
    current_in_flight: usize,
    peak_in_flight: usize,
}

impl Stats {
    /// Total operations handed to the engine
    pub fn ops_submitted(&self) -> u64 {
        self.ops_submitted
    }

    /// Total operations completed (successfully or not)
    pub fn ops_completed(&self) -> u64 {
        self.ops_completed
    }

    /// Operations that completed with a negative result
    pub fn ops_failed(&self) -> u64 {
        self.ops_failed
    }

    /// Bytes transferred by read operations
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Bytes transferred by write operations
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Total bytes transferred (read + written)
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_read + self.bytes_written
    }

    /// Operations submitted but not yet completed
    pub fn current_in_flight(&self) -> usize {
        self.current_in_flight
    }

    /// Peak in-flight count (high-water mark)
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight
    }
}

/// Live counters owned by an engine. Single-threaded, so plain cells.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    submitted: Cell<u64>,
    completed: Cell<u64>,
    failed: Cell<u64>,
    bytes_read: Cell<u64>,
    bytes_written: Cell<u64>,
    in_flight: Cell<usize>,
    peak: Cell<usize>,
}

impl Counters {
    pub(crate) fn on_submit(&self) {
        self.submitted.set(self.submitted.get() + 1);
        let in_flight = self.in_flight.get() + 1;
        self.in_flight.set(in_flight);
        if in_flight > self.peak.get() {
            self.peak.set(in_flight);
        }
    }

    pub(crate) fn on_complete(&self, kind: OpKind, res: i32) {
        self.completed.set(self.completed.get() + 1);
        self.in_flight.set(self.in_flight.get().saturating_sub(1));
        if res < 0 {
            self.failed.set(self.failed.get() + 1);
            return;
        }
        let n = res as u64;
        match kind {
            OpKind::ReadV | OpKind::Read => self.bytes_read.set(self.bytes_read.get() + n),
            OpKind::WriteV => self.bytes_written.set(self.bytes_written.get() + n),
            OpKind::OpenAt | OpKind::Close | OpKind::Fadvise => {}
        }
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.get()
    }

    pub(crate) fn snapshot(&self) -> Stats {
        Stats {
            ops_submitted: self.submitted.get(),
            ops_completed: self.completed.get(),
            ops_failed: self.failed.get(),
            bytes_read: self.bytes_read.get(),
            bytes_written: self.bytes_written.get(),
            current_in_flight: self.in_flight.get(),
            peak_in_flight: self.peak.get(),
        }
    }
}
