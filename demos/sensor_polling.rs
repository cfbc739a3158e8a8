//! Converts the six sensor channels one at a time, without DMA or interrupts.
//!
//! Each conversion is bounded by the configured timeout. A channel that
//! fails keeps its sentinel in `samples()` until the next good conversion.

#![no_main]
#![no_std]

use panic_halt as _;

use cortex_m_rt::entry;

use stm32f1xx_analog_sensor::{
    config::{Config, SampleTime},
    pac,
    polling::PollingSensor,
    stm32::AdcDmaScan,
    CHANNEL_COUNT,
};

#[path = "systick.rs"]
mod systick;

use systick::{AsmDelay, SysCounterMs};

static mut RAW: [u32; CHANNEL_COUNT] = [0; CHANNEL_COUNT];

#[entry]
fn main() -> ! {
    // Acquire peripherals
    let cp = cortex_m::Peripherals::take().unwrap();
    let p = pac::Peripherals::take().unwrap();

    let config = Config::default().sample_time(SampleTime::T_239);
    let adc = AdcDmaScan::new(p.ADC1, p.DMA1, &p.RCC, config, &mut AsmDelay).unwrap();
    let timer = SysCounterMs::new(cp.SYST);

    let mut sensor: PollingSensor<_, _, 1_000> = PollingSensor::new(adc, timer, config);

    loop {
        let ok = sensor.operation_all_channels(CHANNEL_COUNT as u8);
        if ok < CHANNEL_COUNT && sensor.error_count() > 1_000 {
            sensor.reset_errors();
        }
        unsafe { RAW = sensor.raw_samples() };
    }
}
