//! # Peripheral boundary
//!
//! The acquisition code never touches registers itself. It drives whatever
//! implements these traits: the register-level backend in [`crate::stm32`]
//! on hardware, or a mock in tests.

use embedded_dma::WriteBuffer;

/// Status reported by the peripheral layer when it refuses an operation
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// Generic failure
    Error,
    /// The peripheral is in use
    Busy,
    /// An operation did not finish in time
    Timeout,
}

impl HalError {
    /// Numeric status code, `0` being reserved for success
    pub const fn code(self) -> u8 {
        match self {
            HalError::Error => 1,
            HalError::Busy => 2,
            HalError::Timeout => 3,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(HalError::Error),
            2 => Some(HalError::Busy),
            3 => Some(HalError::Timeout),
            _ => None,
        }
    }
}

pub type HalResult<T = ()> = Result<T, HalError>;

/// Scan-mode conversion of the whole regular sequence into memory via DMA
///
/// Methods take `&self` because the transfer is stopped from the error
/// interrupt as well as from thread mode.
pub trait ScanTransfer {
    /// Starts a single-shot transfer of one result per channel into `buffer`
    ///
    /// Completion and failure are reported asynchronously through
    /// [`crate::dispatch::HandlerSlot::dispatch`].
    ///
    /// # Safety
    ///
    /// `buffer` must stay valid and must not be read through another path that
    /// assumes it is stable until the transfer completes, fails or is stopped.
    unsafe fn start_scan<B>(&self, buffer: B) -> HalResult
    where
        B: WriteBuffer<Word = u16>;

    /// Stops the transfer; safe to call when nothing is running
    fn stop_scan(&self) -> HalResult;
}

/// One-shot conversion of a single channel, polled for completion
pub trait SingleConversion {
    /// Selects `channel` as the only entry of the regular sequence
    fn configure_channel(&mut self, channel: u8) -> HalResult;

    fn start(&mut self) -> HalResult;

    /// Returns `WouldBlock` until the end of conversion flag is set
    fn poll(&mut self) -> nb::Result<(), HalError>;

    /// Reads the data register
    fn read(&mut self) -> u16;

    fn stop(&mut self) -> HalResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for status in [HalError::Error, HalError::Busy, HalError::Timeout] {
            assert_eq!(HalError::from_code(status.code()), Some(status));
        }
        assert_eq!(HalError::from_code(0), None);
    }
}
