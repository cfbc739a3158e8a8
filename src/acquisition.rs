//! # DMA acquisition of all sensor channels
//!
//! One call to [`Acquisition::start`] converts the whole regular sequence in
//! scan mode and lets the DMA move the six results into a buffer owned by the
//! acquisition object. The transfer interrupt then moves the state machine
//! forward:
//!
//! ```text
//!  Idle --start--> Converting --complete--> Complete --reset/stop--> Idle
//!                   ^  |                        |
//!                   |  +--------error-----> Error ----reset/stop--> Idle
//!                   +---------start-------------+
//! ```
//!
//! A refused start also lands in `Error`. Results are only handed out in
//! `Complete`, so a reader never observes a half written buffer.

use core::sync::atomic::{compiler_fence, AtomicU8, Ordering};

use embedded_dma::WriteBuffer;
use fugit::{MillisDurationU32, TimerDurationU32};
use vcell::VolatileCell;

use crate::dispatch::{AlreadyRegistered, HandlerSlot, TransferEvents};
use crate::hal::{HalError, ScanTransfer};
use crate::sample::{ChannelId, ReadError, CHANNEL_COUNT};
use crate::stats::{ErrorCounters, ErrorStats};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    /// Ready for a new acquisition
    Idle = 0,
    /// Transfer in flight
    Converting = 1,
    /// Results are in the buffer
    Complete = 2,
    /// The last acquisition failed
    Error = 3,
}

impl State {
    const fn from_bits(bits: u8) -> Self {
        match bits {
            0 => State::Idle,
            1 => State::Converting,
            2 => State::Complete,
            _ => State::Error,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A conversion is in flight
    Busy,
    /// The last acquisition failed and has not been cleared with `reset` or `stop`
    Faulted,
    /// Output slice shorter than [`CHANNEL_COUNT`]
    BufferTooSmall,
    /// The acquisition being waited on failed
    Failed,
    /// Nothing is being converted
    NotStarted,
    /// The acquisition did not complete before the deadline and was stopped
    Timeout,
    /// The deadline timer could not be used
    Timer,
    /// The peripheral refused the request
    Hal(HalError),
}

impl From<HalError> for Error {
    fn from(e: HalError) -> Self {
        Error::Hal(e)
    }
}

/// DMA target for one result per channel
///
/// Every access is volatile: the DMA writes behind the compiler's back.
pub struct DmaBuffer {
    words: [VolatileCell<u16>; CHANNEL_COUNT],
}

// NOTE(unsafe) the words are only read after the transfer that writes them is
// over, as tracked by the acquisition state.
unsafe impl Sync for DmaBuffer {}

impl DmaBuffer {
    #[allow(clippy::declare_interior_mutable_const)]
    const ZERO: VolatileCell<u16> = VolatileCell::new(0);

    pub const fn new() -> Self {
        Self {
            words: [Self::ZERO; CHANNEL_COUNT],
        }
    }

    fn get(&self, i: usize) -> u16 {
        self.words[i].get()
    }
}

impl Default for DmaBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view of the [`DmaBuffer`] handed to [`ScanTransfer::start_scan`]
pub struct ScanTarget<'a>(&'a DmaBuffer);

unsafe impl WriteBuffer for ScanTarget<'_> {
    type Word = u16;

    unsafe fn write_buffer(&mut self) -> (*mut u16, usize) {
        // `VolatileCell` is a transparent `UnsafeCell`, writing through it is allowed
        (self.0.words.as_ptr() as *mut u16, CHANNEL_COUNT)
    }
}

/// Single-shot, scan-mode, DMA driven acquisition of the six sensor channels
pub struct Acquisition<P> {
    state: AtomicU8,
    buffer: DmaBuffer,
    errors: ErrorCounters,
    peripheral: P,
}

impl<P> Acquisition<P> {
    pub const fn new(peripheral: P) -> Self {
        Self {
            state: AtomicU8::new(State::Idle as u8),
            buffer: DmaBuffer::new(),
            errors: ErrorCounters::new(),
            peripheral,
        }
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    pub fn state(&self) -> State {
        State::from_bits(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: State) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// `true` once the results of the last acquisition can be read
    pub fn is_complete(&self) -> bool {
        self.state() == State::Complete
    }

    /// Result of one channel of the last acquisition
    ///
    /// `NotComplete` means "ask again later", `Failed` means this attempt is
    /// lost and the machine has to be reset. An invalid index is reported
    /// before the state is looked at.
    pub fn channel_value(&self, channel: usize) -> Result<u16, ReadError> {
        let id = ChannelId::try_from(channel)?;
        match self.state() {
            State::Complete => Ok(self.buffer.get(id.index())),
            State::Error => Err(ReadError::Failed),
            State::Idle | State::Converting => Err(ReadError::NotComplete),
        }
    }

    /// Same as [`channel_value`](Self::channel_value) with errors as sentinel words
    pub fn channel_raw(&self, channel: usize) -> u32 {
        match self.channel_value(channel) {
            Ok(v) => v as u32,
            Err(e) => e.code(),
        }
    }

    /// Copies all results in channel order into the start of `out`
    ///
    /// Nothing is written unless the whole set is available.
    pub fn read_all(&self, out: &mut [u16]) -> Result<(), Error> {
        let out = out
            .get_mut(..CHANNEL_COUNT)
            .ok_or(Error::BufferTooSmall)?;
        let values = self.values()?;
        out.copy_from_slice(&values);
        Ok(())
    }

    /// All results of the last acquisition
    pub fn values(&self) -> Result<[u16; CHANNEL_COUNT], Error> {
        if !self.is_complete() {
            return Err(Error::Busy);
        }
        let mut values = [0; CHANNEL_COUNT];
        for (i, v) in values.iter_mut().enumerate() {
            *v = self.buffer.get(i);
        }
        // A restart, reset or stop during the copy may have let the DMA overwrite it
        if !self.is_complete() {
            return Err(Error::Busy);
        }
        Ok(values)
    }

    /// Forces `Idle` so the next acquisition can start; counters are kept
    pub fn reset(&self) {
        self.set_state(State::Idle);
    }

    pub fn stats(&self) -> ErrorStats {
        self.errors.snapshot()
    }

    pub fn reset_stats(&self) {
        self.errors.reset();
    }
}

impl<P: ScanTransfer> Acquisition<P> {
    /// Requests a scan of all channels
    ///
    /// Accepted from `Idle` and from `Complete`, the latter discarding the
    /// previous results. The state is `Converting` before the
    /// peripheral is touched, so neither a second caller nor a completion
    /// interrupt firing early can slip in between.
    pub fn start(&self) -> Result<(), Error> {
        let claimed = self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            match State::from_bits(bits) {
                State::Idle | State::Complete => Some(State::Converting as u8),
                State::Converting | State::Error => None,
            }
        });
        if let Err(current) = claimed {
            return Err(match State::from_bits(current) {
                State::Error => Error::Faulted,
                _ => Error::Busy,
            });
        }

        // NOTE(unsafe) the buffer lives as long as `self` and is only read
        // back once the state reports `Complete`.
        let started = unsafe { self.peripheral.start_scan(ScanTarget(&self.buffer)) };
        match started {
            Ok(()) => {
                self.errors.conversion_started();
                Ok(())
            }
            Err(e) => {
                self.set_state(State::Error);
                self.errors.record(None, e);
                warn!("scan start refused: {}", e);
                Err(Error::Hal(e))
            }
        }
    }

    /// Transfer complete notification, called from the DMA interrupt
    pub fn on_conversion_complete(&self) {
        compiler_fence(Ordering::SeqCst);
        // Spurious completions outside of `Converting` are dropped
        let _ = self.state.compare_exchange(
            State::Converting as u8,
            State::Complete as u8,
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
    }

    /// Transfer error notification, called from the DMA interrupt
    ///
    /// Always stops the peripheral so it can be restarted afterwards.
    pub fn on_conversion_error(&self) {
        self.set_state(State::Error);
        self.errors.record(None, HalError::Error);
        if let Err(e) = self.peripheral.stop_scan() {
            self.errors.note_status(e);
        }
        error!("scan transfer error");
    }

    /// Stops the peripheral and forces `Idle`, whatever happened before
    ///
    /// A failure to stop is returned, but the state is `Idle` regardless.
    pub fn stop(&self) -> Result<(), Error> {
        let stopped = self.peripheral.stop_scan();
        self.set_state(State::Idle);
        stopped.map_err(|e| {
            warn!("scan stop refused: {}", e);
            Error::Hal(e)
        })
    }

    /// Waits for the running acquisition for at most `timeout`
    ///
    /// On expiry the acquisition is stopped, the timeout is counted and
    /// `Error::Timeout` is returned.
    pub fn wait_complete<T, const HZ: u32>(
        &self,
        timer: &mut T,
        timeout: MillisDurationU32,
    ) -> Result<(), Error>
    where
        T: fugit_timer::Timer<HZ>,
    {
        let duration: TimerDurationU32<HZ> = timeout.convert();
        timer.start(duration).map_err(|_| Error::Timer)?;
        loop {
            let done = match self.state() {
                State::Converting => None,
                State::Complete => Some(Ok(())),
                State::Error => Some(Err(Error::Failed)),
                State::Idle => Some(Err(Error::NotStarted)),
            };
            if let Some(res) = done {
                timer.cancel().ok();
                return res;
            }
            match timer.wait() {
                Ok(()) => break,
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(_)) => return Err(Error::Timer),
            }
        }

        // The interrupt may have fired between the last check and the expiry
        if self.is_complete() {
            return Ok(());
        }
        self.errors.record(None, HalError::Timeout);
        debug!("scan timed out after {} ms", timeout.to_millis());
        self.stop().ok();
        Err(Error::Timeout)
    }
}

impl<P: ScanTransfer + Sync> Acquisition<P> {
    /// Installs this acquisition as the handler of the transfer interrupt
    pub fn register<'a>(&'a self, slot: &HandlerSlot<'a>) -> Result<(), AlreadyRegistered> {
        slot.register(self)
    }
}

impl<P: ScanTransfer> TransferEvents for Acquisition<P> {
    fn on_transfer_complete(&self) {
        self.on_conversion_complete();
    }

    fn on_transfer_error(&self) {
        self.on_conversion_error();
    }
}
