//! Millisecond SysTick counter and busy-wait delay shared by the demos
//!
//! The demos run on the reset clock configuration: 8 MHz HSI as core clock.

use cortex_m::peripheral::{syst::SystClkSource, SYST};
use fugit::{TimerDurationU32, TimerInstantU32};

pub const SYSCLK_HZ: u32 = 8_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `wait` called without a running countdown
    Disabled,
}

/// Counts milliseconds on SysTick wraps, polled from `now` and `wait`
pub struct SysCounterMs {
    tim: SYST,
    ticks: u32,
    deadline: Option<u32>,
}

impl SysCounterMs {
    pub fn new(mut tim: SYST) -> Self {
        tim.set_clock_source(SystClkSource::Core);
        tim.set_reload(SYSCLK_HZ / 1_000 - 1);
        tim.clear_current();
        tim.enable_counter();
        Self {
            tim,
            ticks: 0,
            deadline: None,
        }
    }

    fn update(&mut self) {
        if self.tim.has_wrapped() {
            self.ticks = self.ticks.wrapping_add(1);
        }
    }
}

impl fugit_timer::Timer<1_000> for SysCounterMs {
    type Error = Error;

    fn now(&mut self) -> TimerInstantU32<1_000> {
        self.update();
        TimerInstantU32::from_ticks(self.ticks)
    }

    fn start(&mut self, duration: TimerDurationU32<1_000>) -> Result<(), Self::Error> {
        self.update();
        self.deadline = Some(self.ticks.wrapping_add(duration.ticks()));
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        self.deadline = None;
        Ok(())
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        let deadline = self.deadline.ok_or(nb::Error::Other(Error::Disabled))?;
        self.update();
        if self.ticks.wrapping_sub(deadline) < u32::MAX / 2 {
            self.deadline = None;
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

/// Cycle-counting delay, good enough for the ADC power-up wait
pub struct AsmDelay;

impl embedded_hal::delay::DelayNs for AsmDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = (ns as u64 * SYSCLK_HZ as u64 / 1_000_000_000) as u32;
        cortex_m::asm::delay(cycles.max(1));
    }
}
