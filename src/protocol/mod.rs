//! Micronet protocol implementation: wire frame layout, codec, TDMA
//! network map, RF driver state machine, and virtual slave device.
//!
//! ## Micronet RF and Timing Constants
//!
//! These constants are part of the on-air protocol as observed on real
//! Tacktick devices. They are not configurable.

pub mod codec;
pub mod frame;
pub mod network_map;
pub mod rf;
pub mod slave;

/// RF center frequency of the European 868 MHz variant, in MHz.
pub const RF_CENTER_FREQUENCY_868_MHZ: f32 = 869.778;

/// RF center frequency of the North American 915 MHz variant, in MHz.
pub const RF_CENTER_FREQUENCY_915_MHZ: f32 = 915.450;

/// 2-FSK deviation in kHz.
pub const RF_DEVIATION_KHZ: f32 = 34.0;

/// On-air baud rate. One byte takes ten bit periods on the link.
pub const RF_BAUDRATE_BAUD: u32 = 76_800;

/// Preamble byte, repeated [`RF_PREAMBLE_LENGTH`] - 1 times before the sync byte.
pub const RF_PREAMBLE_BYTE: u8 = 0x55;

/// Sync byte closing the preamble. Radios with 16-bit sync-word hardware
/// detect the pair `0x55 0x99`.
pub const RF_SYNC_BYTE: u8 = 0x99;

/// Number of preamble bytes including the closing sync byte.
pub const RF_PREAMBLE_LENGTH: usize = 14;

/// Duration of a single bit on the air, in nanoseconds.
pub const BIT_LENGTH_NS: u64 = 13_021;

/// Preamble length in bit periods.
pub const PREAMBLE_LENGTH_BITS: u64 = 136;

/// Header length on the air, in bit periods.
pub const HEADER_LENGTH_BITS: u64 = 112;

/// Inter-slot guard time, in bit periods.
pub const GUARD_TIME_BITS: u64 = 155;

/// Preamble duration in microseconds.
pub const PREAMBLE_LENGTH_US: u64 = (PREAMBLE_LENGTH_BITS * BIT_LENGTH_NS) / 1000;

/// Header duration in microseconds.
pub const HEADER_LENGTH_US: u64 = (HEADER_LENGTH_BITS * BIT_LENGTH_NS) / 1000;

/// Guard time in microseconds.
pub const GUARD_TIME_US: u64 = (GUARD_TIME_BITS * BIT_LENGTH_NS) / 1000;

/// Duration of one payload byte (ten bit periods) in microseconds.
pub const BYTE_LENGTH_US: u64 = (10 * BIT_LENGTH_NS) / 1000;

/// Granularity of the synchronous slot raster: every slot length is rounded
/// up to a multiple of this value (150 bit periods).
pub const WINDOW_ROUNDING_TIME_US: u64 = 1953;

/// Gap between the end of the last synchronous slot and the start of the
/// asynchronous slot (600 bit periods).
pub const ASYNC_WINDOW_OFFSET_US: u64 = 7812;

/// Length of the asynchronous slot.
pub const ASYNC_WINDOW_LENGTH_US: u64 = 7812;

/// Payload budget of the asynchronous slot, in bytes.
pub const ASYNC_WINDOW_PAYLOAD: u8 = 24;

/// Length of one acknowledgment slot (300 bit periods).
pub const ACK_WINDOW_LENGTH_US: u64 = 3906;

/// Payload budget of an acknowledgment slot, in bytes.
pub const ACK_WINDOW_PAYLOAD: u8 = 10;

/// Nominal period of the TDMA cycle: the master transmits a request every
/// second.
pub const CYCLE_PERIOD_US: u64 = 1_000_000;
