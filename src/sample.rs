//! # Sensor samples and sentinel codes
//!
//! A reading is either a right-aligned 12-bit conversion result or a failure
//! kind. The failure kinds are tagged types in this crate; the `u32` sentinel
//! codes are kept for code that still exchanges raw words with the hardware
//! side (e.g. a debugger watch window or a C shim).

/// Number of sensor channels converted per acquisition
pub const CHANNEL_COUNT: usize = 6;

/// Largest valid 12-bit conversion result
pub const MAX_SAMPLE: u16 = (1 << 12) - 1;

/// Raw sentinel codes, all above the 12-bit range
pub mod sentinel {
    /// Channel index out of range
    pub const INVALID_CHANNEL: u32 = 0xFFFF;
    /// DMA read: conversion not complete
    pub const NOT_COMPLETE: u32 = 0xFFFE;
    /// DMA read: transfer failed
    pub const DMA_FAILED: u32 = 0xFFFD;
    /// Polling: channel configuration failed
    pub const CONFIG: u32 = 0xFFFE;
    /// Polling: conversion start failed
    pub const START: u32 = 0xFFFD;
    /// Polling: conversion did not finish before the deadline
    pub const TIMEOUT: u32 = 0xFFFC;
}

/// Why a channel value could not be read from a DMA acquisition
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    /// Channel index is not below [`CHANNEL_COUNT`]
    InvalidChannel,
    /// No result yet, ask again later
    NotComplete,
    /// The last acquisition failed
    Failed,
}

impl ReadError {
    pub const fn code(self) -> u32 {
        match self {
            ReadError::InvalidChannel => sentinel::INVALID_CHANNEL,
            ReadError::NotComplete => sentinel::NOT_COMPLETE,
            ReadError::Failed => sentinel::DMA_FAILED,
        }
    }
}

/// Step of a polled conversion that failed
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Selecting the channel and its sampling time was refused
    Config,
    /// Starting the conversion was refused
    Start,
    /// End of conversion was not observed before the deadline
    Timeout,
}

impl Fault {
    pub const fn code(self) -> u32 {
        match self {
            Fault::Config => sentinel::CONFIG,
            Fault::Start => sentinel::START,
            Fault::Timeout => sentinel::TIMEOUT,
        }
    }
}

/// One slot of the polling sample buffer
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    /// Valid conversion result in `0..=MAX_SAMPLE`
    Value(u16),
    /// The last conversion of this channel failed
    Fault(Fault),
}

impl Default for Sample {
    fn default() -> Self {
        Sample::Value(0)
    }
}

impl Sample {
    /// Wraps a conversion result, keeping only the 12 data bits
    pub const fn from_conversion(raw: u16) -> Self {
        Sample::Value(raw & MAX_SAMPLE)
    }

    pub const fn value(self) -> Option<u16> {
        match self {
            Sample::Value(v) => Some(v),
            Sample::Fault(_) => None,
        }
    }

    pub const fn is_valid(self) -> bool {
        matches!(self, Sample::Value(_))
    }

    /// Raw word as stored in the sentinel-coded sample array
    pub const fn to_raw(self) -> u32 {
        match self {
            Sample::Value(v) => v as u32,
            Sample::Fault(f) => f.code(),
        }
    }

    /// Decodes a raw word, `None` for codes that are neither data nor a polling fault
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0..=0x0FFF => Some(Sample::Value(raw as u16)),
            sentinel::CONFIG => Some(Sample::Fault(Fault::Config)),
            sentinel::START => Some(Sample::Fault(Fault::Start)),
            sentinel::TIMEOUT => Some(Sample::Fault(Fault::Timeout)),
            _ => None,
        }
    }
}

/// Validated channel index
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChannelId(u8);

impl ChannelId {
    pub const fn new(id: u8) -> Option<Self> {
        if (id as usize) < CHANNEL_COUNT {
            Some(ChannelId(id))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = ChannelId> {
        (0..CHANNEL_COUNT as u8).map(ChannelId)
    }
}

impl From<ChannelId> for u8 {
    fn from(id: ChannelId) -> u8 {
        id.0
    }
}

impl TryFrom<usize> for ChannelId {
    type Error = ReadError;

    fn try_from(id: usize) -> Result<Self, ReadError> {
        u8::try_from(id)
            .ok()
            .and_then(ChannelId::new)
            .ok_or(ReadError::InvalidChannel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_outside_the_data_range() {
        for code in [
            sentinel::INVALID_CHANNEL,
            sentinel::NOT_COMPLETE,
            sentinel::DMA_FAILED,
            sentinel::TIMEOUT,
        ] {
            assert!(code > MAX_SAMPLE as u32);
        }
    }

    #[test]
    fn read_errors_map_to_distinct_codes() {
        let codes = [
            ReadError::InvalidChannel.code(),
            ReadError::NotComplete.code(),
            ReadError::Failed.code(),
        ];
        assert_eq!(codes, [0xFFFF, 0xFFFE, 0xFFFD]);
    }

    #[test]
    fn raw_decoding() {
        assert_eq!(Sample::from_raw(4095), Some(Sample::Value(4095)));
        assert_eq!(Sample::from_raw(0xFFFC), Some(Sample::Fault(Fault::Timeout)));
        assert_eq!(Sample::from_raw(0x1000), None);
        assert_eq!(Sample::from_raw(0xFFFF), None);
        assert_eq!(Sample::Fault(Fault::Start).to_raw(), 0xFFFD);
    }

    #[test]
    fn conversion_result_is_masked_to_12_bits() {
        assert_eq!(Sample::from_conversion(0xF123), Sample::Value(0x123));
        assert!(!Sample::Fault(Fault::Config).is_valid());
        assert_eq!(Sample::default().value(), Some(0));
    }

    #[test]
    fn channel_ids() {
        assert!(ChannelId::new(5).is_some());
        assert!(ChannelId::new(6).is_none());
        assert_eq!(ChannelId::try_from(300usize), Err(ReadError::InvalidChannel));
        assert_eq!(ChannelId::all().count(), CHANNEL_COUNT);
    }
}
