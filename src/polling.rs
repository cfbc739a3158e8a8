//! # Polled acquisition, one channel at a time
//!
//! Each sensor is converted with its own configure → start → poll → read →
//! stop sequence. Polling is bounded by the configured timeout, measured
//! with a [`fugit_timer::Timer`]. A failed step leaves a [`Fault`] in the
//! sample slot of that sensor instead of a value.

use fugit::TimerDurationU32;

use crate::config::Config;
use crate::hal::{HalError, SingleConversion};
use crate::sample::{ChannelId, Fault, Sample, CHANNEL_COUNT};
use crate::stats::{ErrorCounters, ErrorStats};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Sensor index is not below [`CHANNEL_COUNT`]
    InvalidChannel,
    /// A step of the conversion failed; the fault is also stored in the sample slot
    Fault(Fault, HalError),
}

/// Outcome of the last call of each conversion step, `None` meaning success
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugStatus {
    pub config: Option<HalError>,
    pub start: Option<HalError>,
    pub poll: Option<HalError>,
}

/// Six sensors sampled by polling a single-conversion ADC
pub struct PollingSensor<A, T, const HZ: u32> {
    adc: A,
    timer: T,
    config: Config,
    samples: [Sample; CHANNEL_COUNT],
    errors: ErrorCounters,
    debug: DebugStatus,
}

impl<A, T, const HZ: u32> PollingSensor<A, T, HZ>
where
    A: SingleConversion,
    T: fugit_timer::Timer<HZ>,
{
    pub fn new(adc: A, timer: T, config: Config) -> Self {
        Self {
            adc,
            timer,
            config,
            samples: [Sample::default(); CHANNEL_COUNT],
            errors: ErrorCounters::new(),
            debug: DebugStatus::default(),
        }
    }

    /// Converts sensor `id` and stores the result or the fault in its slot
    ///
    /// An out of range `id` is counted as an error but touches no slot.
    pub fn operation(&mut self, id: u8) -> Result<u16, Error> {
        let sensor = match ChannelId::new(id) {
            Some(sensor) => sensor,
            None => {
                self.errors.record(Some(id), HalError::Error);
                warn!("sensor {} out of range", id);
                return Err(Error::InvalidChannel);
            }
        };

        match self.convert(sensor) {
            Ok(word) => {
                let sample = Sample::from_conversion(word);
                self.samples[sensor.index()] = sample;
                self.errors.conversion_started();
                Ok(sample.value().unwrap_or_default())
            }
            Err((fault, status)) => {
                self.samples[sensor.index()] = Sample::Fault(fault);
                self.errors.record(Some(id), status);
                warn!("sensor {}: {} ({})", id, fault, status);
                Err(Error::Fault(fault, status))
            }
        }
    }

    /// Converts sensors `0..total`, `total` being clamped to [`CHANNEL_COUNT`]
    ///
    /// Returns how many of them produced a value.
    pub fn operation_all_channels(&mut self, total: u8) -> usize {
        let total = total.min(CHANNEL_COUNT as u8);
        (0..total).filter(|&id| self.operation(id).is_ok()).count()
    }

    fn convert(&mut self, sensor: ChannelId) -> Result<u16, (Fault, HalError)> {
        let channel = self.config.channels[sensor.index()];

        let configured = self.adc.configure_channel(channel);
        self.debug.config = configured.err();
        configured.map_err(|e| (Fault::Config, e))?;

        let started = self.adc.start();
        self.debug.start = started.err();
        started.map_err(|e| (Fault::Start, e))?;

        let polled = self.wait_end_of_conversion();
        self.debug.poll = polled.err();
        if let Err(e) = polled {
            self.adc.stop().ok();
            return Err((Fault::Timeout, e));
        }

        let value = self.adc.read();
        self.adc.stop().ok();
        Ok(value)
    }

    fn wait_end_of_conversion(&mut self) -> Result<(), HalError> {
        let timeout: TimerDurationU32<HZ> = self.config.timeout.convert();
        self.timer.start(timeout).map_err(|_| HalError::Error)?;
        loop {
            match self.adc.poll() {
                Ok(()) => {
                    self.timer.cancel().ok();
                    return Ok(());
                }
                Err(nb::Error::Other(e)) => {
                    self.timer.cancel().ok();
                    return Err(e);
                }
                Err(nb::Error::WouldBlock) => {}
            }
            match self.timer.wait() {
                Ok(()) => return Err(HalError::Timeout),
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(_)) => return Err(HalError::Error),
            }
        }
    }

    pub fn sample(&self, id: u8) -> Option<Sample> {
        ChannelId::new(id).map(|sensor| self.samples[sensor.index()])
    }

    pub fn samples(&self) -> &[Sample; CHANNEL_COUNT] {
        &self.samples
    }

    /// Slots as sentinel-coded words
    pub fn raw_samples(&self) -> [u32; CHANNEL_COUNT] {
        self.samples.map(Sample::to_raw)
    }

    pub fn error_count(&self) -> u32 {
        self.errors.total()
    }

    pub fn errors(&self) -> ErrorStats {
        self.errors.snapshot()
    }

    pub fn debug_status(&self) -> DebugStatus {
        self.debug
    }

    /// Clears counters and step statuses, samples are kept
    pub fn reset_errors(&mut self) {
        self.errors.reset();
        self.debug = DebugStatus::default();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn release(self) -> (A, T) {
        (self.adc, self.timer)
    }
}
