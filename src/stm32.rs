//! # ADC1 + DMA1 channel 1 backend
//!
//! Implements [`ScanTransfer`] and [`SingleConversion`] on the bare
//! registers. Clock tree and analog pin setup are left to the application;
//! only the ADC1 and DMA1 bus clocks are switched on here.
//!
//! The backend keeps no handle to the register blocks: both paths go through
//! `ADC1::ptr()` / `DMA1::ptr()` so that `stop_scan` can run from the DMA
//! interrupt while thread mode holds a shared reference.

use core::sync::atomic::{compiler_fence, Ordering};

use embedded_dma::WriteBuffer;
use embedded_hal::delay::DelayNs;

use crate::config::{Config, ConfigError, SampleTime};
use crate::dispatch::Events;
use crate::hal::{HalError, HalResult, ScanTransfer, SingleConversion};
use crate::pac::{adc1, dma1, ADC1, DMA1, RCC};
use crate::sample::CHANNEL_COUNT;

fn adc() -> &'static adc1::RegisterBlock {
    // NOTE(unsafe) ADC1 was handed over to `AdcDmaScan::new`
    unsafe { &*ADC1::ptr() }
}

fn dma() -> &'static dma1::RegisterBlock {
    // NOTE(unsafe) DMA1 was handed over to `AdcDmaScan::new`
    unsafe { &*DMA1::ptr() }
}

fn dma_ch() -> &'static dma1::CH {
    dma().ch(0)
}

/// ADC1 in scan mode feeding DMA1 channel 1, or converting one channel at a time
pub struct AdcDmaScan {
    config: Config,
}

impl AdcDmaScan {
    /// Takes ADC1 and DMA1, powers up and calibrates the ADC
    ///
    /// The ADC clock must already be configured to at most 14 MHz.
    pub fn new<D: DelayNs>(
        _adc: ADC1,
        _dma: DMA1,
        rcc: &RCC,
        config: Config,
        delay: &mut D,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        rcc.apb2enr().modify(|_, w| w.adc1en().set_bit());
        rcc.ahbenr().modify(|_, w| w.dma1en().set_bit());

        let mut s = Self { config };
        s.power_down();
        s.setup_scan();
        s.power_up(delay);
        s.calibrate();
        Ok(s)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reads and clears the pending DMA1 channel 1 flags
    ///
    /// Meant for the `DMA1_CHANNEL1` interrupt handler, feeding
    /// [`HandlerSlot::dispatch`](crate::dispatch::HandlerSlot::dispatch).
    pub fn take_events() -> Events {
        let isr = dma().isr().read();
        let mut events = Events::empty();
        events.set(Events::TRANSFER_COMPLETE, isr.tcif1().bit_is_set());
        events.set(Events::HALF_TRANSFER, isr.htif1().bit_is_set());
        events.set(Events::TRANSFER_ERROR, isr.teif1().bit_is_set());

        // Clearing GIF1 clears all channel 1 flags, other channels are untouched
        dma().ifcr().write(|w| w.cgif1().set_bit());
        events
    }

    fn power_up<D: DelayNs>(&mut self, delay: &mut D) {
        adc().cr2().modify(|_, w| w.adon().set_bit());

        // The reference manual asks for a stabilization time after power-up,
        // about 1us according to the datasheets.
        delay.delay_us(1);
    }

    fn power_down(&mut self) {
        adc().cr2().modify(|_, w| w.adon().clear_bit());
    }

    fn calibrate(&mut self) {
        /* reset calibration */
        adc().cr2().modify(|_, w| w.rstcal().set_bit());
        while adc().cr2().read().rstcal().bit_is_set() {}

        /* calibrate */
        adc().cr2().modify(|_, w| w.cal().set_bit());
        while adc().cr2().read().cal().bit_is_set() {}
    }

    fn setup_scan(&mut self) {
        // Right alignment keeps DR within 0..=4095
        adc().cr2().modify(|_, w| {
            w.cont().clear_bit();
            w.align().clear_bit();
            w.exttrig().set_bit();
            unsafe { w.extsel().bits(0b111) }
        });
        adc().cr1().modify(|_, w| w.scan().set_bit().discen().clear_bit());

        let channels = self.config.channels;
        for &ch in &channels {
            set_channel_sample_time(ch, self.config.sample_time);
        }
        set_regular_sequence(&channels);
        adc().cr2().modify(|_, w| w.dma().set_bit());
    }

    fn dma_running() -> bool {
        dma_ch().cr().read().en().bit_is_set()
    }
}

fn set_channel_sample_time(chan: u8, sample_time: SampleTime) {
    let sample_time = sample_time.into();
    match chan {
        0 => adc().smpr2().modify(|_, w| unsafe { w.smp0().bits(sample_time) }),
        1 => adc().smpr2().modify(|_, w| unsafe { w.smp1().bits(sample_time) }),
        2 => adc().smpr2().modify(|_, w| unsafe { w.smp2().bits(sample_time) }),
        3 => adc().smpr2().modify(|_, w| unsafe { w.smp3().bits(sample_time) }),
        4 => adc().smpr2().modify(|_, w| unsafe { w.smp4().bits(sample_time) }),
        5 => adc().smpr2().modify(|_, w| unsafe { w.smp5().bits(sample_time) }),
        6 => adc().smpr2().modify(|_, w| unsafe { w.smp6().bits(sample_time) }),
        7 => adc().smpr2().modify(|_, w| unsafe { w.smp7().bits(sample_time) }),
        8 => adc().smpr2().modify(|_, w| unsafe { w.smp8().bits(sample_time) }),
        9 => adc().smpr2().modify(|_, w| unsafe { w.smp9().bits(sample_time) }),

        10 => adc().smpr1().modify(|_, w| unsafe { w.smp10().bits(sample_time) }),
        11 => adc().smpr1().modify(|_, w| unsafe { w.smp11().bits(sample_time) }),
        12 => adc().smpr1().modify(|_, w| unsafe { w.smp12().bits(sample_time) }),
        13 => adc().smpr1().modify(|_, w| unsafe { w.smp13().bits(sample_time) }),
        14 => adc().smpr1().modify(|_, w| unsafe { w.smp14().bits(sample_time) }),
        15 => adc().smpr1().modify(|_, w| unsafe { w.smp15().bits(sample_time) }),
        16 => adc().smpr1().modify(|_, w| unsafe { w.smp16().bits(sample_time) }),
        17 => adc().smpr1().modify(|_, w| unsafe { w.smp17().bits(sample_time) }),
        // rejected by `Config::validate` and `configure_channel`
        _ => return,
    };
}

fn set_regular_sequence(channels: &[u8]) {
    let len = channels.len();
    let bits = channels
        .iter()
        .take(6)
        .enumerate()
        .fold(0u32, |s, (i, c)| s | ((*c as u32) << (i * 5)));
    adc().sqr3().write(|w| unsafe { w.bits(bits) });
    if len > 6 {
        let bits = channels
            .iter()
            .skip(6)
            .take(6)
            .enumerate()
            .fold(0u32, |s, (i, c)| s | ((*c as u32) << (i * 5)));
        adc().sqr2().write(|w| unsafe { w.bits(bits) });
    }
    adc()
        .sqr1()
        .modify(|_, w| unsafe { w.l().bits(len.saturating_sub(1) as u8) });
}

impl ScanTransfer for AdcDmaScan {
    unsafe fn start_scan<B>(&self, mut buffer: B) -> HalResult
    where
        B: WriteBuffer<Word = u16>,
    {
        if Self::dma_running() {
            return Err(HalError::Busy);
        }
        let (ptr, len) = buffer.write_buffer();
        if len < CHANNEL_COUNT {
            return Err(HalError::Error);
        }

        // A polled conversion may have left a single-entry sequence behind
        adc().cr1().modify(|_, w| w.scan().set_bit());
        set_regular_sequence(&self.config.channels);
        adc().cr2().modify(|_, w| w.dma().set_bit());

        let ch = dma_ch();
        dma().ifcr().write(|w| w.cgif1().set_bit());
        ch.par().write(|w| w.pa().bits(adc().dr().as_ptr() as u32));
        ch.mar().write(|w| w.ma().bits(ptr as u32));
        ch.ndtr().write(|w| w.ndt().bits(CHANNEL_COUNT as u16));

        compiler_fence(Ordering::Release);

        ch.cr().write(|w| {
            w.mem2mem()
                .clear_bit()
                .pl()
                .medium()
                .msize()
                .bits16()
                .psize()
                .bits16()
                .minc()
                .set_bit()
                .pinc()
                .clear_bit()
                .circ()
                .clear_bit()
                .dir()
                .clear_bit()
                .teie()
                .set_bit()
                .htie()
                .clear_bit()
                .tcie()
                .set_bit()
        });
        ch.cr().modify(|_, w| w.en().set_bit());

        adc().cr2().modify(|_, w| w.swstart().set_bit());
        Ok(())
    }

    fn stop_scan(&self) -> HalResult {
        dma_ch().cr().modify(|_, w| w.en().clear_bit());
        dma().ifcr().write(|w| w.cgif1().set_bit());
        compiler_fence(Ordering::SeqCst);

        if Self::dma_running() {
            Err(HalError::Error)
        } else {
            Ok(())
        }
    }
}

impl SingleConversion for AdcDmaScan {
    fn configure_channel(&mut self, channel: u8) -> HalResult {
        if channel > 17 {
            return Err(HalError::Error);
        }
        if Self::dma_running() {
            return Err(HalError::Busy);
        }
        adc().cr2().modify(|_, w| w.dma().clear_bit());
        adc().cr1().modify(|_, w| w.scan().clear_bit());
        set_channel_sample_time(channel, self.config.sample_time);
        set_regular_sequence(&[channel]);
        Ok(())
    }

    fn start(&mut self) -> HalResult {
        if adc().cr2().read().adon().bit_is_clear() {
            return Err(HalError::Error);
        }
        adc().sr().modify(|_, w| w.eoc().clear_bit());
        adc().cr2().modify(|_, w| w.swstart().set_bit());
        Ok(())
    }

    fn poll(&mut self) -> nb::Result<(), HalError> {
        if adc().sr().read().eoc().bit_is_set() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn read(&mut self) -> u16 {
        // Reading DR clears EOC
        adc().dr().read().data().bits()
    }

    fn stop(&mut self) -> HalResult {
        adc().sr().modify(|_, w| w.eoc().clear_bit().strt().clear_bit());
        Ok(())
    }
}
