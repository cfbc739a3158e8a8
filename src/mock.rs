//! Host-side stand-ins for the ADC/DMA peripheral and a millisecond timer

use core::ptr;
use core::sync::atomic::{AtomicPtr, AtomicU32, AtomicU8, AtomicUsize, Ordering};

use embedded_dma::WriteBuffer;
use fugit::{TimerDurationU32, TimerInstantU32};

use crate::hal::{HalError, HalResult, ScanTransfer, SingleConversion};

const OK: u8 = 0;

fn outcome(code: u8) -> HalResult {
    match HalError::from_code(code) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Scan peripheral that remembers the target buffer so tests can play DMA
#[derive(Default)]
pub struct MockScan {
    target: AtomicPtr<u16>,
    len: AtomicUsize,
    start_result: AtomicU8,
    stop_result: AtomicU8,
    pub starts: AtomicU32,
    pub stops: AtomicU32,
}

impl MockScan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_start(&self, err: HalError) {
        self.start_result.store(err.code(), Ordering::Relaxed);
    }

    pub fn refuse_stop(&self, err: HalError) {
        self.stop_result.store(err.code(), Ordering::Relaxed);
    }

    pub fn accept_all(&self) {
        self.start_result.store(OK, Ordering::Relaxed);
        self.stop_result.store(OK, Ordering::Relaxed);
    }

    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::Relaxed)
    }

    pub fn stops(&self) -> u32 {
        self.stops.load(Ordering::Relaxed)
    }

    /// Writes `values` into the buffer of the running transfer, like the DMA would
    pub fn transfer(&self, values: &[u16]) {
        let target = self.target.load(Ordering::Acquire);
        let len = self.len.load(Ordering::Acquire);
        assert!(!target.is_null(), "no transfer started");
        assert!(values.len() <= len);
        for (i, &v) in values.iter().enumerate() {
            // NOTE(unsafe) the buffer handed to `start_scan` outlives the test
            unsafe { ptr::write_volatile(target.add(i), v) };
        }
    }
}

impl ScanTransfer for MockScan {
    unsafe fn start_scan<B>(&self, mut buffer: B) -> HalResult
    where
        B: WriteBuffer<Word = u16>,
    {
        self.starts.fetch_add(1, Ordering::Relaxed);
        outcome(self.start_result.load(Ordering::Relaxed))?;
        let (ptr, len) = buffer.write_buffer();
        self.target.store(ptr, Ordering::Release);
        self.len.store(len, Ordering::Release);
        Ok(())
    }

    fn stop_scan(&self) -> HalResult {
        self.stops.fetch_add(1, Ordering::Relaxed);
        outcome(self.stop_result.load(Ordering::Relaxed))
    }
}

/// Which step of a polled conversion the mock should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Config(HalError),
    Start(HalError),
    /// Never raise end of conversion
    Hang,
    Poll(HalError),
}

/// Single-conversion ADC returning `values[channel]`
pub struct MockOneShot {
    pub values: [u16; 18],
    pub fail: Option<(u8, FailAt)>,
    pub selected: Option<u8>,
    pub running: bool,
    pub configured: [u32; 18],
    pub stops: u32,
    /// Number of `WouldBlock` polls before the end of conversion
    pub busy_polls: u32,
    polls_left: u32,
}

impl MockOneShot {
    pub fn new(values: [u16; 18]) -> Self {
        Self {
            values,
            fail: None,
            selected: None,
            running: false,
            configured: [0; 18],
            stops: 0,
            busy_polls: 0,
            polls_left: 0,
        }
    }

    pub fn fail_channel(mut self, channel: u8, at: FailAt) -> Self {
        self.fail = Some((channel, at));
        self
    }

    fn failure(&self) -> Option<FailAt> {
        match (self.fail, self.selected) {
            (Some((ch, at)), Some(sel)) if ch == sel => Some(at),
            _ => None,
        }
    }
}

impl SingleConversion for MockOneShot {
    fn configure_channel(&mut self, channel: u8) -> HalResult {
        self.selected = Some(channel);
        self.configured[channel as usize] += 1;
        match self.failure() {
            Some(FailAt::Config(err)) => Err(err),
            _ => Ok(()),
        }
    }

    fn start(&mut self) -> HalResult {
        if let Some(FailAt::Start(err)) = self.failure() {
            return Err(err);
        }
        self.running = true;
        self.polls_left = self.busy_polls;
        Ok(())
    }

    fn poll(&mut self) -> nb::Result<(), HalError> {
        match self.failure() {
            Some(FailAt::Hang) => Err(nb::Error::WouldBlock),
            Some(FailAt::Poll(err)) => Err(nb::Error::Other(err)),
            _ if self.polls_left > 0 => {
                self.polls_left -= 1;
                Err(nb::Error::WouldBlock)
            }
            _ => Ok(()),
        }
    }

    fn read(&mut self) -> u16 {
        self.selected.map(|ch| self.values[ch as usize]).unwrap_or(0)
    }

    fn stop(&mut self) -> HalResult {
        self.running = false;
        self.stops += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFault;

/// Millisecond timer where every `wait` advances time by one tick
#[derive(Default)]
pub struct MockTimer {
    now: u32,
    deadline: Option<u32>,
    pub started: u32,
    pub cancelled: u32,
    pub broken: bool,
}

impl fugit_timer::Timer<1_000> for MockTimer {
    type Error = TimerFault;

    fn now(&mut self) -> TimerInstantU32<1_000> {
        TimerInstantU32::from_ticks(self.now)
    }

    fn start(&mut self, duration: TimerDurationU32<1_000>) -> Result<(), Self::Error> {
        if self.broken {
            return Err(TimerFault);
        }
        self.started += 1;
        self.deadline = Some(self.now + duration.ticks());
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        self.cancelled += 1;
        self.deadline = None;
        Ok(())
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        let deadline = self.deadline.ok_or(nb::Error::Other(TimerFault))?;
        self.now += 1;
        if self.now >= deadline {
            self.deadline = None;
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}
