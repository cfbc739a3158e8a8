//! # Acquisition configuration

use fugit::{ExtU32, MillisDurationU32};

use crate::sample::CHANNEL_COUNT;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[allow(non_camel_case_types)]
/// ADC sampling time
///
/// Options for the sampling time, each is T + 0.5 ADC clock cycles.
pub enum SampleTime {
    /// 1.5 cycles sampling time
    T_1,
    /// 7.5 cycles sampling time
    T_7,
    /// 13.5 cycles sampling time
    #[default]
    T_13,
    /// 28.5 cycles sampling time
    T_28,
    /// 41.5 cycles sampling time
    T_41,
    /// 55.5 cycles sampling time
    T_55,
    /// 71.5 cycles sampling time
    T_71,
    /// 239.5 cycles sampling time
    T_239,
}

impl From<SampleTime> for u8 {
    fn from(val: SampleTime) -> Self {
        use SampleTime::*;
        match val {
            T_1 => 0,
            T_7 => 1,
            T_13 => 2,
            T_28 => 3,
            T_41 => 4,
            T_55 => 5,
            T_71 => 6,
            T_239 => 7,
        }
    }
}

/// Default deadline for one polled conversion and for waiting on a DMA acquisition
pub const DEFAULT_TIMEOUT_MS: u32 = 10;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// ADC1 has 18 channels
    ChannelOutOfRange(u8),
    /// The same ADC channel appears twice in the sequence
    DuplicateChannel(u8),
    TimeoutZero,
}

/// How the six sensors are sampled
///
/// `channels[i]` is the ADC input converted for sensor `i`, both in the scan
/// sequence and when sensor `i` is polled on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub channels: [u8; CHANNEL_COUNT],
    pub sample_time: SampleTime,
    pub timeout: MillisDurationU32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channels: [0, 1, 2, 3, 4, 5],
            sample_time: SampleTime::default(),
            timeout: DEFAULT_TIMEOUT_MS.millis(),
        }
    }
}

impl Config {
    pub fn channels(mut self, channels: [u8; CHANNEL_COUNT]) -> Self {
        self.channels = channels;
        self
    }

    pub fn sample_time(mut self, sample_time: SampleTime) -> Self {
        self.sample_time = sample_time;
        self
    }

    pub fn timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.timeout = timeout;
        self
    }

    /// ADC input of sensor `sensor`
    pub fn channel(&self, sensor: usize) -> Option<u8> {
        self.channels.get(sensor).copied()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, &ch) in self.channels.iter().enumerate() {
            if ch > 17 {
                return Err(ConfigError::ChannelOutOfRange(ch));
            }
            if self.channels[..i].contains(&ch) {
                return Err(ConfigError::DuplicateChannel(ch));
            }
        }
        if self.timeout.ticks() == 0 {
            return Err(ConfigError::TimeoutZero);
        }
        Ok(())
    }
}
