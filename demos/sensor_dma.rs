//! Scans the six sensor channels (PA0..PA5) once per loop through DMA.
//!
//! The DMA1 channel 1 interrupt only forwards the transfer flags to the
//! acquisition registered in `DMA_DONE`. Readings and error counters are kept
//! in `LAST` for inspection with a debugger.

#![no_main]
#![no_std]

use panic_halt as _;

use cortex_m::peripheral::NVIC;
use cortex_m::singleton;
use cortex_m_rt::entry;

use stm32f1xx_analog_sensor::{
    acquisition::{self, Acquisition},
    config::{Config, SampleTime},
    dispatch::HandlerSlot,
    pac::{self, interrupt},
    stm32::AdcDmaScan,
    CHANNEL_COUNT,
};

#[path = "systick.rs"]
mod systick;

use systick::{AsmDelay, SysCounterMs};

static DMA_DONE: HandlerSlot<'static> = HandlerSlot::new();

static mut LAST: [u16; CHANNEL_COUNT] = [0; CHANNEL_COUNT];

#[interrupt]
fn DMA1_CHANNEL1() {
    DMA_DONE.dispatch(AdcDmaScan::take_events());
}

#[entry]
fn main() -> ! {
    // Acquire peripherals
    let cp = cortex_m::Peripherals::take().unwrap();
    let p = pac::Peripherals::take().unwrap();

    // PA0..PA5 are in analog mode after reset, no GPIO setup needed
    let config = Config::default().sample_time(SampleTime::T_55);
    let timeout = config.timeout;
    let scan = AdcDmaScan::new(p.ADC1, p.DMA1, &p.RCC, config, &mut AsmDelay).unwrap();

    let sensors: &'static Acquisition<AdcDmaScan> =
        singleton!(: Acquisition<AdcDmaScan> = Acquisition::new(scan)).unwrap();
    sensors.register(&DMA_DONE).unwrap();

    unsafe { NVIC::unmask(pac::Interrupt::DMA1_CHANNEL1) };

    let mut timer = SysCounterMs::new(cp.SYST);

    loop {
        match sensors.start() {
            Ok(()) => {}
            Err(acquisition::Error::Faulted) => {
                sensors.reset();
                continue;
            }
            Err(_) => continue,
        }

        match sensors.wait_complete::<_, 1_000>(&mut timer, timeout) {
            Ok(()) => {
                if let Ok(values) = sensors.values() {
                    unsafe { LAST = values };
                }
                sensors.reset();
            }
            // The error counters already hold the cause
            Err(_) => sensors.reset(),
        }
    }
}
