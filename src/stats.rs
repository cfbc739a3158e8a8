//! # Error bookkeeping
//!
//! Counters are plain atomics so they can be bumped from the error interrupt
//! and from thread mode without a critical section.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::hal::HalError;

const NO_CHANNEL: u8 = 0xFF;
const NO_STATUS: u8 = 0;

/// Snapshot of the error counters
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorStats {
    /// Failures since the last reset
    pub total_errors: u32,
    /// Channel of the last failure, if it concerned one channel
    pub last_failed_channel: Option<u8>,
    /// Peripheral status of the last failure
    pub last_status: Option<HalError>,
    /// Acquisitions started successfully since the last reset
    pub conversions: u32,
}

pub struct ErrorCounters {
    total: AtomicU32,
    conversions: AtomicU32,
    last_channel: AtomicU8,
    last_status: AtomicU8,
}

impl ErrorCounters {
    pub const fn new() -> Self {
        Self {
            total: AtomicU32::new(0),
            conversions: AtomicU32::new(0),
            last_channel: AtomicU8::new(NO_CHANNEL),
            last_status: AtomicU8::new(NO_STATUS),
        }
    }

    pub fn record(&self, channel: Option<u8>, status: HalError) {
        self.last_channel
            .store(channel.unwrap_or(NO_CHANNEL), Ordering::Relaxed);
        self.last_status.store(status.code(), Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Release);
    }

    /// Overwrites the last status without counting a new failure
    pub fn note_status(&self, status: HalError) {
        self.last_status.store(status.code(), Ordering::Relaxed);
    }

    pub fn conversion_started(&self) {
        self.conversions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> u32 {
        self.total.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ErrorStats {
        let total_errors = self.total.load(Ordering::Acquire);
        let channel = self.last_channel.load(Ordering::Relaxed);
        ErrorStats {
            total_errors,
            last_failed_channel: (channel != NO_CHANNEL).then_some(channel),
            last_status: HalError::from_code(self.last_status.load(Ordering::Relaxed)),
            conversions: self.conversions.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.conversions.store(0, Ordering::Relaxed);
        self.last_channel.store(NO_CHANNEL, Ordering::Relaxed);
        self.last_status.store(NO_STATUS, Ordering::Release);
    }
}

impl Default for ErrorCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_counters_are_empty() {
        let counters = ErrorCounters::new();
        assert_eq!(counters.snapshot(), ErrorStats::default());
    }

    #[test]
    fn record_keeps_last_failure() {
        let counters = ErrorCounters::new();
        counters.record(Some(2), HalError::Timeout);
        counters.record(None, HalError::Error);
        counters.conversion_started();

        let stats = counters.snapshot();
        assert_eq!(stats.total_errors, 2);
        assert_eq!(stats.last_failed_channel, None);
        assert_eq!(stats.last_status, Some(HalError::Error));
        assert_eq!(stats.conversions, 1);
    }

    #[test]
    fn note_status_does_not_count() {
        let counters = ErrorCounters::new();
        counters.note_status(HalError::Busy);
        assert_eq!(counters.total(), 0);
        assert_eq!(counters.snapshot().last_status, Some(HalError::Busy));
    }

    #[test]
    fn reset_clears_everything() {
        let counters = ErrorCounters::new();
        counters.record(Some(1), HalError::Busy);
        counters.reset();
        assert_eq!(counters.snapshot(), ErrorStats::default());
    }
}
