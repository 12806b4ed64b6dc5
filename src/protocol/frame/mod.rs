//! Micronet wire frame: byte layout, header accessors, and the header
//! checksum / duplicated length discipline shared by every encoder.
use crate::error::FrameError;
use crate::protocol::{BYTE_LENGTH_US, GUARD_TIME_US, PREAMBLE_LENGTH_US};

//==================================================================================Constants

/// Maximum length of a Micronet frame, header included.
pub const MAX_MESSAGE_LENGTH: usize = 96;

/// Minimum length of a frame accepted into higher layers (full header).
pub const MIN_MESSAGE_LENGTH: usize = 14;

/// Offset of the big-endian network identifier.
pub const NUID_OFFSET: usize = 0;
/// Offset of the big-endian device identifier.
pub const DUID_OFFSET: usize = 4;
/// Offset of the message identifier byte.
pub const MI_OFFSET: usize = 8;
/// Offset of the message-info byte.
pub const SOURCE_INFO_OFFSET: usize = 9;
/// Offset of the quantized signal-strength byte (0..9).
pub const SS_OFFSET: usize = 10;
/// Offset of the header checksum (8-bit sum of bytes 0..10).
pub const CRC_OFFSET: usize = 11;
/// Offset of the first length byte (total length - 2).
pub const LEN_OFFSET_1: usize = 12;
/// Offset of the duplicated length byte.
pub const LEN_OFFSET_2: usize = 13;
/// Offset of the first payload byte.
pub const PAYLOAD_OFFSET: usize = 14;

//==================================================================================Enums and Structs

/// Message identifiers observed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MessageId {
    /// TDMA cycle start; carries the device list of the network.
    MasterRequest = 0x01,
    /// Data fields from a sensor or display.
    SendData = 0x02,
    /// Request for a new synchronous slot, sent in the async slot.
    SlotRequest = 0x03,
    /// Request to resize an existing slot, sent in the async slot.
    SlotUpdate = 0x05,
    /// Calibration parameter write from a display.
    SetParameter = 0x06,
    /// Acknowledgment of a parameter write.
    AckParameter = 0x07,
    /// Presence probe.
    Ping = 0x0a,
}

impl MessageId {
    /// Decode a wire value; unknown identifiers are handled by the caller.
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::MasterRequest),
            0x02 => Some(Self::SendData),
            0x03 => Some(Self::SlotRequest),
            0x05 => Some(Self::SlotUpdate),
            0x06 => Some(Self::SetParameter),
            0x07 => Some(Self::AckParameter),
            0x0a => Some(Self::Ping),
            _ => None,
        }
    }
}

/// Power-state transition attached to a transmit-list entry. Entries with
/// an action other than [`PowerAction::None`] carry no frame; they inject
/// radio power transitions into the transmit timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerAction {
    #[default]
    None,
    /// Put the radio to sleep at the scheduled time.
    LowPower,
    /// Wake the radio at the scheduled time.
    ActivePower,
}

/// A Micronet frame with its capture metadata. Frames are born in the RF
/// driver ISR, move through the message FIFO, and are consumed by exactly
/// one pop.
#[derive(Debug, Clone, Copy)]
pub struct MicronetMessage {
    pub len: u8,
    /// RSSI captured at sync-word detection, in dBm.
    pub rssi_dbm: i16,
    /// Estimated start of the frame on the air (preamble included), in
    /// microseconds of the free-running monotonic clock.
    pub start_time_us: u64,
    /// End of the frame plus guard time, in microseconds.
    pub end_time_us: u64,
    pub action: PowerAction,
    pub data: [u8; MAX_MESSAGE_LENGTH],
}

impl Default for MicronetMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl MicronetMessage {
    pub const fn new() -> Self {
        Self {
            len: 0,
            rssi_dbm: 0,
            start_time_us: 0,
            end_time_us: 0,
            action: PowerAction::None,
            data: [0; MAX_MESSAGE_LENGTH],
        }
    }

    /// Build a frame-less power transition entry for the transmit list.
    pub const fn power_action(action: PowerAction, start_time_us: u64) -> Self {
        Self {
            len: 0,
            rssi_dbm: 0,
            start_time_us,
            end_time_us: 0,
            action,
            data: [0; MAX_MESSAGE_LENGTH],
        }
    }

    //==================================================================================Header accessors

    /// Big-endian network identifier (header bytes 0..4).
    pub fn network_id(&self) -> u32 {
        u32::from_be_bytes([
            self.data[NUID_OFFSET],
            self.data[NUID_OFFSET + 1],
            self.data[NUID_OFFSET + 2],
            self.data[NUID_OFFSET + 3],
        ])
    }

    /// Big-endian device identifier (header bytes 4..8).
    pub fn device_id(&self) -> u32 {
        u32::from_be_bytes([
            self.data[DUID_OFFSET],
            self.data[DUID_OFFSET + 1],
            self.data[DUID_OFFSET + 2],
            self.data[DUID_OFFSET + 3],
        ])
    }

    /// Device type byte, the most significant byte of the device identifier.
    pub fn device_type(&self) -> u8 {
        self.data[DUID_OFFSET]
    }

    /// Raw message identifier byte.
    pub fn message_id(&self) -> u8 {
        self.data[MI_OFFSET]
    }

    /// Decoded message identifier, when known.
    pub fn message(&self) -> Option<MessageId> {
        MessageId::from_wire(self.data[MI_OFFSET])
    }

    /// Quantized signal-strength byte reported by the sender.
    pub fn signal_strength(&self) -> u8 {
        self.data[SS_OFFSET]
    }

    /// Stored header checksum byte.
    pub fn header_crc(&self) -> u8 {
        self.data[CRC_OFFSET]
    }

    /// Payload view (bytes 14..len). Empty for frames shorter than a header.
    pub fn payload(&self) -> &[u8] {
        if (self.len as usize) <= PAYLOAD_OFFSET {
            &[]
        } else {
            &self.data[PAYLOAD_OFFSET..self.len as usize]
        }
    }

    //==================================================================================Header validation

    /// Validate the header invariants: minimum length, duplicated length
    /// bytes, and the 8-bit sum checksum over bytes 0..10. Only frames
    /// passing this check may reach the codec.
    pub fn check_header(&self) -> Result<(), FrameError> {
        if (self.len as usize) < MIN_MESSAGE_LENGTH {
            return Err(FrameError::TooShort { len: self.len });
        }
        if self.data[LEN_OFFSET_1] != self.data[LEN_OFFSET_2] {
            return Err(FrameError::LengthMismatch);
        }
        if self.data[LEN_OFFSET_1] as usize + 2 != self.len as usize {
            return Err(FrameError::LengthOutOfBounds);
        }

        let mut crc: u8 = 0;
        for byte in &self.data[..CRC_OFFSET] {
            crc = crc.wrapping_add(*byte);
        }
        if crc != self.data[CRC_OFFSET] {
            return Err(FrameError::InvalidHeaderCrc);
        }

        Ok(())
    }

    /// Convenience form of [`Self::check_header`].
    pub fn header_is_valid(&self) -> bool {
        self.check_header().is_ok()
    }

    //==================================================================================Header construction

    /// Write the fixed part of the header and position the write cursor at
    /// the start of the payload. Length bytes and checksum are left blank
    /// until [`Self::finalize`].
    pub fn init_header(
        &mut self,
        network_id: u32,
        device_id: u32,
        message_id: MessageId,
        source_info: u8,
        signal_strength: u8,
    ) {
        self.data[NUID_OFFSET..NUID_OFFSET + 4].copy_from_slice(&network_id.to_be_bytes());
        self.data[DUID_OFFSET..DUID_OFFSET + 4].copy_from_slice(&device_id.to_be_bytes());
        self.data[MI_OFFSET] = message_id as u8;
        self.data[SOURCE_INFO_OFFSET] = source_info;
        self.data[SS_OFFSET] = signal_strength;
        self.data[CRC_OFFSET] = 0;
        self.data[LEN_OFFSET_1] = 0;
        self.data[LEN_OFFSET_2] = 0;
        self.len = PAYLOAD_OFFSET as u8;
    }

    /// Write the duplicated length bytes and the header checksum once the
    /// payload is complete.
    pub fn finalize(&mut self) {
        self.data[LEN_OFFSET_1] = self.len - 2;
        self.data[LEN_OFFSET_2] = self.len - 2;

        let mut crc: u8 = 0;
        for byte in &self.data[..CRC_OFFSET] {
            crc = crc.wrapping_add(*byte);
        }
        self.data[CRC_OFFSET] = crc;
    }

    /// Expected on-air duration of this frame: preamble, bytes, and guard.
    pub fn airtime_us(&self) -> u64 {
        PREAMBLE_LENGTH_US + self.len as u64 * BYTE_LENGTH_US + GUARD_TIME_US
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
