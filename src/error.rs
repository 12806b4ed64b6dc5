//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (frame validation, network
//! map construction, RF driver, NMEA sentence handling, etc.).
use thiserror_no_std::Error;

#[derive(Error, Debug, PartialEq, Eq)]
/// Errors detected while validating or accessing a Micronet frame.
pub enum FrameError {
    /// The frame is shorter than the 14-byte header.
    #[error("Frame too short: {len} bytes")]
    TooShort { len: u8 },
    /// The two duplicated length bytes disagree.
    #[error("Length bytes mismatch")]
    LengthMismatch,
    /// The declared length does not match the captured byte count.
    #[error("Declared length out of bounds")]
    LengthOutOfBounds,
    /// The 8-bit header checksum does not match.
    #[error("Invalid header checksum")]
    InvalidHeaderCrc,
}

#[derive(Error, Debug, PartialEq, Eq)]
/// Errors raised while deriving a TDMA network map from a master request.
pub enum NetworkMapError {
    /// The frame is not a master request.
    #[error("Not a master request message")]
    NotAMasterRequest,
    /// The master request payload checksum does not match.
    #[error("Invalid master request payload checksum")]
    InvalidPayloadCrc,
    /// The payload does not contain a whole number of device records.
    #[error("Malformed device list: {payload_len} payload bytes")]
    MalformedDeviceList { payload_len: usize },
    /// More devices are declared than the map can hold.
    #[error("Too many devices declared: {declared}")]
    TooManyDevices { declared: usize },
}

#[derive(Error, Debug, PartialEq, Eq)]
/// Errors reported by the RF driver.
pub enum RfError {
    /// The transceiver did not answer the connectivity probe at init.
    #[error("RF chip not detected")]
    ChipNotDetected,
    /// No free entry in the transmit list; the message was dropped.
    #[error("Transmit list full")]
    TransmitListFull,
}

#[derive(Error, Debug, PartialEq, Eq)]
/// Failures while handling an NMEA0183 sentence.
pub enum NmeaError {
    /// The XOR checksum does not match the two trailing hex digits.
    #[error("Invalid sentence checksum")]
    InvalidChecksum,
    /// The sentence does not start with '$' or '!'.
    #[error("Invalid sentence start")]
    InvalidStart,
    /// The sentence exceeds the 128-byte NMEA0183 limit.
    #[error("Sentence too long")]
    Overflow,
    /// A numeric field could not be parsed.
    #[error("Malformed field")]
    MalformedField,
}
