//! `micronet-bridge` library: primitives and protocol logic required to
//! participate in a Micronet (Tacktick) wireless instrument network and
//! bridge it to NMEA0183, in a `no_std` environment. The crate exposes the
//! infrastructure modules (message FIFO), the Micronet protocol logic
//! (wire codec, TDMA network map, RF state machine, slave device), and the
//! NMEA0183 bridge (sentence codec, data routing, foreground runner).
#![no_std]
//==================================================================================
/// NMEA0183 side of the bridge: sentence reassembly and codec, SOG/COG
/// filtering, data routing, and the foreground runner.
pub mod bridge;
/// Core data types shared by the codec, the slave device, and the bridge.
pub mod core;
/// Domain and low-level errors (frame validation, network map construction,
/// RF driver, NMEA parsing, and related issues).
pub mod error;
/// Interrupt-safe infrastructure: the bounded message FIFO between the
/// radio ISR and the foreground task.
pub mod infra;
/// Micronet protocol implementation: wire codec, TDMA network map,
/// RF driver state machine, and virtual slave device.
pub mod protocol;
//==================================================================================
