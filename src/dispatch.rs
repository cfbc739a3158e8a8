//! # Transfer interrupt dispatch
//!
//! The interrupt handler owns nothing but a [`HandlerSlot`]. The acquisition
//! object registers itself into the slot once at initialization, and the
//! handler forwards decoded flags with [`HandlerSlot::dispatch`].
//!
//! ```rust, ignore
//! static SENSORS: Acquisition<AdcDmaScan> = ...;
//! static DMA_DONE: HandlerSlot<'static> = HandlerSlot::new();
//!
//! // init, before unmasking the interrupt
//! SENSORS.register(&DMA_DONE).ok();
//!
//! #[interrupt]
//! fn DMA1_CHANNEL1() {
//!     DMA_DONE.dispatch(AdcDmaScan::take_events());
//! }
//! ```

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU8, Ordering};

bitflags::bitflags! {
    /// Pending DMA channel flags
    pub struct Events: u8 {
        const TRANSFER_COMPLETE = 1 << 0;
        const HALF_TRANSFER = 1 << 1;
        const TRANSFER_ERROR = 1 << 2;
    }
}

/// Receiver of transfer notifications
///
/// Both methods run in interrupt context: they must not block and must not
/// wait for the transfer they are being told about.
pub trait TransferEvents {
    fn on_transfer_complete(&self);
    fn on_transfer_error(&self);
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyRegistered;

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const READY: u8 = 2;

/// Write-once holder of the transfer handler
pub struct HandlerSlot<'a> {
    state: AtomicU8,
    handler: UnsafeCell<Option<&'a (dyn TransferEvents + Sync)>>,
}

// NOTE(unsafe) `handler` is written exactly once, by the thread that won the
// EMPTY -> WRITING exchange, and only read after READY is observed.
unsafe impl Sync for HandlerSlot<'_> {}

impl<'a> HandlerSlot<'a> {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            handler: UnsafeCell::new(None),
        }
    }

    pub fn register(&self, handler: &'a (dyn TransferEvents + Sync)) -> Result<(), AlreadyRegistered> {
        self.state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| AlreadyRegistered)?;
        // NOTE(unsafe) exclusive: we are the only one past the exchange above
        unsafe { *self.handler.get() = Some(handler) };
        self.state.store(READY, Ordering::Release);
        Ok(())
    }

    pub fn is_registered(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    fn handler(&self) -> Option<&'a (dyn TransferEvents + Sync)> {
        if self.is_registered() {
            // NOTE(unsafe) READY means the write is done and will not happen again
            unsafe { *self.handler.get() }
        } else {
            None
        }
    }

    /// Forwards `events` to the registered handler
    ///
    /// An error wins over a completion flagged in the same interrupt. Half
    /// transfers carry no meaning for single-shot scans and are dropped.
    /// Returns `false` when nothing was delivered.
    pub fn dispatch(&self, events: Events) -> bool {
        let handler = match self.handler() {
            Some(handler) => handler,
            None => return false,
        };
        if events.contains(Events::TRANSFER_ERROR) {
            handler.on_transfer_error();
            true
        } else if events.contains(Events::TRANSFER_COMPLETE) {
            handler.on_transfer_complete();
            true
        } else {
            false
        }
    }
}

impl Default for HandlerSlot<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct Counter {
        complete: AtomicU32,
        error: AtomicU32,
    }

    impl TransferEvents for Counter {
        fn on_transfer_complete(&self) {
            self.complete.fetch_add(1, Ordering::Relaxed);
        }
        fn on_transfer_error(&self) {
            self.error.fetch_add(1, Ordering::Relaxed);
        }
    }

    impl Counter {
        fn counts(&self) -> (u32, u32) {
            (
                self.complete.load(Ordering::Relaxed),
                self.error.load(Ordering::Relaxed),
            )
        }
    }

    #[test]
    fn dispatch_without_handler_is_a_no_op() {
        let slot = HandlerSlot::new();
        assert!(!slot.is_registered());
        assert!(!slot.dispatch(Events::TRANSFER_COMPLETE));
    }

    #[test]
    fn registers_only_once() {
        let first = Counter::default();
        let second = Counter::default();
        let slot = HandlerSlot::new();

        assert_eq!(slot.register(&first), Ok(()));
        assert_eq!(slot.register(&second), Err(AlreadyRegistered));

        slot.dispatch(Events::TRANSFER_COMPLETE);
        assert_eq!(first.counts(), (1, 0));
        assert_eq!(second.counts(), (0, 0));
    }

    #[test]
    fn error_takes_precedence() {
        let counter = Counter::default();
        let slot = HandlerSlot::new();
        slot.register(&counter).unwrap();

        assert!(slot.dispatch(Events::TRANSFER_COMPLETE | Events::TRANSFER_ERROR));
        assert_eq!(counter.counts(), (0, 1));
    }

    #[test]
    fn half_transfer_is_ignored() {
        let counter = Counter::default();
        let slot = HandlerSlot::new();
        slot.register(&counter).unwrap();

        assert!(!slot.dispatch(Events::HALF_TRANSFER));
        assert!(!slot.dispatch(Events::empty()));
        assert_eq!(counter.counts(), (0, 0));
    }
}
