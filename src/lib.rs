//! # Six-channel analog sensor acquisition for the STM32F1
//!
//! Samples six analog sensor channels through ADC1. Two ways of doing it are
//! provided:
//!
//! - [`acquisition::Acquisition`]: one scan of all six channels per request,
//!   transferred by DMA and completed from the DMA interrupt. Thread mode
//!   starts the scan, then polls [`Acquisition::is_complete`] or blocks in
//!   [`Acquisition::wait_complete`] and reads the buffer.
//! - [`polling::PollingSensor`]: one software-triggered conversion per
//!   channel, each bounded by a timeout. Failed channels keep a sentinel
//!   value in place of the sample.
//!
//! Both sides keep [`stats::ErrorStats`] so the application can see what went
//! wrong without a debugger.
//!
//! # Usage
//!
//! Select the microcontroller with one of the `stm32f100`, `stm32f101` or
//! `stm32f103` features to get the register backend in [`stm32`], and enable
//! `rt` when building an application.
//!
//! ```toml
//! [dependencies.stm32f1xx-analog-sensor]
//! version = "0.1.0"
//! features = ["stm32f103", "rt"]
//! ```
//!
//! Without a device feature the PAC dependency is left out and only the
//! hardware-agnostic part is built, so `cargo test` runs on the host with no
//! feature selected.
//!
//! # Examples
//!
//! See the `demos/` folder: `sensor_dma` for the interrupt-driven scan and
//! `sensor_polling` for the polled conversions.

#![no_std]

#[cfg(feature = "stm32f100")]
pub use stm32f1::stm32f100 as pac;

#[cfg(feature = "stm32f101")]
pub use stm32f1::stm32f101 as pac;

#[cfg(feature = "stm32f103")]
pub use stm32f1::stm32f103 as pac;

#[macro_use]
mod fmt;

pub mod acquisition;
pub mod config;
pub mod dispatch;
pub mod hal;
pub mod polling;
pub mod sample;
pub mod stats;

#[cfg(any(feature = "stm32f100", feature = "stm32f101", feature = "stm32f103"))]
pub mod stm32;

#[cfg(test)]
mod mock;

pub use crate::acquisition::{Acquisition, DmaBuffer, State};
pub use crate::config::Config;
pub use crate::dispatch::{Events, HandlerSlot, TransferEvents};
pub use crate::polling::PollingSensor;
pub use crate::sample::{ChannelId, Sample, CHANNEL_COUNT};
pub use crate::stats::ErrorStats;
