//! TDMA network map: the per-cycle schedule of synchronous, asynchronous,
//! and acknowledgment transmit slots, derived from one master request.
//!
//! The master request payload is a list of `(device id, payload bytes)`
//! records in slot order, closed by a three-byte trailer whose last byte is
//! the 8-bit sum of the payload. A payload budget of zero marks a device
//! without a reserved slot.
use crate::error::NetworkMapError;
use crate::protocol::frame::{MessageId, MicronetMessage, PAYLOAD_OFFSET};
use crate::protocol::{
    ACK_WINDOW_LENGTH_US, ACK_WINDOW_PAYLOAD, ASYNC_WINDOW_LENGTH_US, ASYNC_WINDOW_OFFSET_US,
    ASYNC_WINDOW_PAYLOAD, BYTE_LENGTH_US, CYCLE_PERIOD_US, GUARD_TIME_US, HEADER_LENGTH_US,
    PREAMBLE_LENGTH_US, WINDOW_ROUNDING_TIME_US,
};

/// Maximum number of devices a master request may declare.
pub const MAX_DEVICES_PER_NETWORK: usize = 32;

/// One transmit window within the cycle. A slot with `start_us == 0` is
/// reserved/empty: the device is declared but holds no airtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxSlot {
    pub device_id: u32,
    pub start_us: u64,
    pub length_us: u32,
    pub payload_bytes: u8,
}

impl TxSlot {
    pub const fn empty() -> Self {
        Self {
            device_id: 0,
            start_us: 0,
            length_us: 0,
            payload_bytes: 0,
        }
    }

    /// Whether the slot grants airtime.
    pub fn is_assigned(&self) -> bool {
        self.start_us != 0
    }
}

/// Per-cycle schedule derived from a master request. No state survives
/// between cycles; a fresh map is built from every master request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkMap {
    pub network_id: u32,
    pub master_device: u32,
    /// Start of the cycle: on-air start of the master request.
    pub network_start_us: u64,
    /// Start of the first synchronous slot: end of the master request.
    pub first_slot_us: u64,
    pub nb_sync_slots: usize,
    pub sync_slots: [TxSlot; MAX_DEVICES_PER_NETWORK],
    pub async_slot: TxSlot,
    pub nb_ack_slots: usize,
    pub ack_slots: [TxSlot; MAX_DEVICES_PER_NETWORK + 1],
    /// End of the last acknowledgment slot.
    pub network_end_us: u64,
}

/// Length of a synchronous slot for a payload budget: preamble, header,
/// payload bytes, and guard, rounded up to the slot raster.
pub fn sync_slot_length_us(payload_bytes: u8) -> u32 {
    let raw = PREAMBLE_LENGTH_US
        + HEADER_LENGTH_US
        + payload_bytes as u64 * BYTE_LENGTH_US
        + GUARD_TIME_US;
    (raw.div_ceil(WINDOW_ROUNDING_TIME_US) * WINDOW_ROUNDING_TIME_US) as u32
}

impl NetworkMap {
    /// Build the schedule from a master request. The caller has already
    /// validated the frame header.
    pub fn build(message: &MicronetMessage) -> Result<Self, NetworkMapError> {
        if message.message() != Some(MessageId::MasterRequest) {
            return Err(NetworkMapError::NotAMasterRequest);
        }

        let payload = message.payload();
        if payload.len() < 8 || (payload.len() - 3) % 5 != 0 {
            return Err(NetworkMapError::MalformedDeviceList {
                payload_len: payload.len(),
            });
        }

        let mut crc: u8 = 0;
        for byte in &payload[..payload.len() - 1] {
            crc = crc.wrapping_add(*byte);
        }
        if crc != payload[payload.len() - 1] {
            return Err(NetworkMapError::InvalidPayloadCrc);
        }

        let nb_devices = (payload.len() - 3) / 5;
        if nb_devices > MAX_DEVICES_PER_NETWORK {
            return Err(NetworkMapError::TooManyDevices {
                declared: nb_devices,
            });
        }

        let mut map = Self {
            network_id: message.network_id(),
            master_device: device_record(payload, 0).0,
            network_start_us: message.start_time_us,
            first_slot_us: message.end_time_us,
            nb_sync_slots: 0,
            sync_slots: [TxSlot::empty(); MAX_DEVICES_PER_NETWORK],
            async_slot: TxSlot::empty(),
            nb_ack_slots: 0,
            ack_slots: [TxSlot::empty(); MAX_DEVICES_PER_NETWORK + 1],
            network_end_us: 0,
        };

        // Synchronous slots, in listing order. The running offset only
        // advances over assigned slots.
        let mut slot_delay_us: u64 = 0;
        for index in 1..nb_devices {
            let (device_id, payload_bytes) = device_record(payload, index);
            let slot = &mut map.sync_slots[map.nb_sync_slots];
            slot.device_id = device_id;
            slot.payload_bytes = payload_bytes;

            if payload_bytes != 0 {
                slot.start_us = message.end_time_us + slot_delay_us;
                slot.length_us = sync_slot_length_us(payload_bytes);
                slot_delay_us += slot.length_us as u64;
            }

            map.nb_sync_slots += 1;
        }

        // Asynchronous slot, a fixed gap after the last synchronous slot.
        slot_delay_us += ASYNC_WINDOW_OFFSET_US;
        map.async_slot = TxSlot {
            device_id: 0,
            start_us: message.end_time_us + slot_delay_us,
            length_us: ASYNC_WINDOW_LENGTH_US as u32,
            payload_bytes: ASYNC_WINDOW_PAYLOAD,
        };
        slot_delay_us += ASYNC_WINDOW_LENGTH_US;

        // Acknowledgment slots: one per declared device in reverse listing
        // order, then one for the master. The reverse order is a protocol
        // invariant observed on real networks.
        for index in 0..map.nb_sync_slots {
            map.ack_slots[index] = TxSlot {
                device_id: map.sync_slots[map.nb_sync_slots - 1 - index].device_id,
                start_us: message.end_time_us + slot_delay_us,
                length_us: ACK_WINDOW_LENGTH_US as u32,
                payload_bytes: ACK_WINDOW_PAYLOAD,
            };
            slot_delay_us += ACK_WINDOW_LENGTH_US;
        }
        map.ack_slots[map.nb_sync_slots] = TxSlot {
            device_id: map.master_device,
            start_us: message.end_time_us + slot_delay_us,
            length_us: ACK_WINDOW_LENGTH_US as u32,
            payload_bytes: ACK_WINDOW_PAYLOAD,
        };
        map.nb_ack_slots = map.nb_sync_slots + 1;
        slot_delay_us += ACK_WINDOW_LENGTH_US;

        map.network_end_us = message.end_time_us + slot_delay_us;

        Ok(map)
    }

    /// Synchronous slot of a device, or an empty slot when the device is
    /// not listed or holds no airtime.
    pub fn sync_slot(&self, device_id: u32) -> TxSlot {
        self.sync_slots[..self.nb_sync_slots]
            .iter()
            .find(|slot| slot.device_id == device_id)
            .copied()
            .unwrap_or(TxSlot::empty())
    }

    /// The shared asynchronous slot.
    pub fn async_slot(&self) -> TxSlot {
        self.async_slot
    }

    /// Acknowledgment slot of a device, or an empty slot for unknown ids.
    pub fn ack_slot(&self, device_id: u32) -> TxSlot {
        self.ack_slots[..self.nb_ack_slots]
            .iter()
            .find(|slot| slot.device_id == device_id)
            .copied()
            .unwrap_or(TxSlot::empty())
    }

    /// Expected start of the next cycle.
    pub fn next_network_start_us(&self) -> u64 {
        self.network_start_us + CYCLE_PERIOD_US
    }
}

fn device_record(payload: &[u8], index: usize) -> (u32, u8) {
    let offset = index * 5;
    let device_id = u32::from_be_bytes([
        payload[offset],
        payload[offset + 1],
        payload[offset + 2],
        payload[offset + 3],
    ]);
    (device_id, payload[offset + 4])
}
