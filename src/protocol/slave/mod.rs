//! Micronet virtual slave device: the per-cycle participant logic.
//!
//! A single physical node claims several consecutive device identities
//! ("virtual slaves") to obtain several synchronous slots per cycle, and
//! splits the requested data fields across them so each payload fits a
//! slot budget. On every master request the slave schedules its slot
//! transmissions plus the power gating of the radio; on parameter writes
//! it schedules one acknowledgment per virtual slave.
use heapless::Vec;

use crate::core::NavigationData;
use crate::protocol::codec::{self, DecodeResult};
use crate::protocol::frame::{MessageId, MicronetMessage, PowerAction};
use crate::protocol::network_map::NetworkMap;

//==================================================================================Constants

/// Device identities claimed by this node.
pub const NUMBER_OF_VIRTUAL_SLAVES: usize = 3;

/// Master silence threshold before the network is considered lost.
const NETWORK_TIMEOUT_US: u64 = 3_000_000;

/// Delay before the wake transmission injected on network loss.
const WAKE_DELAY_US: u64 = 100_000;

/// Wake lead before the expected next cycle start, allowing the radio PLL
/// to relock.
const PLL_LOCK_LEAD_US: u64 = 1000;

/// Largest number of entries one processing call can emit: a wake, the two
/// power-gating entries, and one frame per virtual slave.
pub const TRANSMIT_BATCH_SIZE: usize = 8;

/// Transmit decisions of one processing call, in schedule order. The
/// foreground hands the batch to the RF driver.
pub type TransmitBatch = Vec<MicronetMessage, TRANSMIT_BATCH_SIZE>;

/// Whether the attached network has been heard from recently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkStatus {
    NotFound,
    Found,
}

//==================================================================================Slave device

/// Per-cycle slave logic. Holds no radio access: all transmissions travel
/// through the returned batch.
pub struct SlaveDevice {
    network_id: u32,
    device_id: u32,
    data_fields: u32,
    split_data_fields: [u32; NUMBER_OF_VIRTUAL_SLAVES],
    latest_signal_strength: u8,
    network_status: NetworkStatus,
    last_master_request_us: u64,
    network_map: Option<NetworkMap>,
}

impl SlaveDevice {
    pub fn new(network_id: u32, device_id: u32) -> Self {
        Self {
            network_id,
            device_id,
            data_fields: 0,
            split_data_fields: [0; NUMBER_OF_VIRTUAL_SLAVES],
            latest_signal_strength: 0,
            network_status: NetworkStatus::NotFound,
            last_master_request_us: 0,
            network_map: None,
        }
    }

    /// Replace the set of fields this node offers to the network.
    pub fn set_data_fields(&mut self, data_fields: u32) {
        self.data_fields = data_fields;
        self.split_data_fields();
    }

    /// Add fields to the offered set.
    pub fn add_data_fields(&mut self, data_fields: u32) {
        self.data_fields |= data_fields;
        self.split_data_fields();
    }

    pub fn network_status(&self) -> NetworkStatus {
        self.network_status
    }

    /// Fields assigned to one virtual slave.
    pub fn fields_of_slave(&self, index: usize) -> u32 {
        self.split_data_fields[index]
    }

    /// Run the master watchdog without traffic. On master silence beyond
    /// the network timeout the status drops to NotFound and a wake entry
    /// is scheduled so the receiver is guaranteed to be listening.
    pub fn poll_network(&mut self, now_us: u64, batch: &mut TransmitBatch) {
        if self.network_status == NetworkStatus::Found
            && now_us.saturating_sub(self.last_master_request_us) > NETWORK_TIMEOUT_US
        {
            self.network_status = NetworkStatus::NotFound;
            log::warn!("master silent, scheduling receiver wake");
            let _ = batch.push(MicronetMessage::power_action(
                PowerAction::ActivePower,
                now_us + WAKE_DELAY_US,
            ));
        }
    }

    /// Consume one frame popped from the message FIFO.
    ///
    /// Master requests rebuild the network map and schedule the cycle:
    /// power gating entries, then one transmission per virtual slave —
    /// data in its synchronous slot when the budget fits, otherwise a
    /// slot update (or a slot request when no slot is assigned) in the
    /// asynchronous slot. Other frames are decoded into `nav`; a decoded
    /// parameter write schedules one ack per virtual slave.
    pub fn process_message(
        &mut self,
        message: &MicronetMessage,
        nav: &mut NavigationData,
        now_us: u64,
        now_ms: u32,
        batch: &mut TransmitBatch,
    ) {
        self.poll_network(now_us, batch);

        if message.network_id() != self.network_id || !message.header_is_valid() {
            return;
        }

        if message.message() == Some(MessageId::MasterRequest) {
            self.process_master_request(message, nav, batch);
        } else if codec::decode_message(message, nav, now_ms) == DecodeResult::Ack {
            self.schedule_param_acks(batch);
        }
    }

    fn process_master_request(
        &mut self,
        message: &MicronetMessage,
        nav: &NavigationData,
        batch: &mut TransmitBatch,
    ) {
        let map = match NetworkMap::build(message) {
            Ok(map) => map,
            Err(error) => {
                log::warn!("master request rejected: {error:?}");
                return;
            }
        };

        self.network_status = NetworkStatus::Found;
        self.last_master_request_us = message.start_time_us;
        self.latest_signal_strength = codec::signal_strength(message.rssi_dbm);

        // Sleep at the end of the cycle, wake shortly before the next
        // master request so the PLL is locked when it arrives.
        let _ = batch.push(MicronetMessage::power_action(
            PowerAction::LowPower,
            map.network_end_us,
        ));
        let _ = batch.push(MicronetMessage::power_action(
            PowerAction::ActivePower,
            map.next_network_start_us() - PLL_LOCK_LEAD_US,
        ));

        for index in 0..NUMBER_OF_VIRTUAL_SLAVES {
            let device_id = self.device_id + index as u32;
            let fields = self.split_data_fields[index];
            let mut tx_message = MicronetMessage::new();
            let mut slot = map.sync_slot(device_id);

            if slot.is_assigned() {
                let payload_length = codec::encode_data_message(
                    &mut tx_message,
                    self.latest_signal_strength,
                    self.network_id,
                    device_id,
                    nav,
                    fields,
                );
                if slot.payload_bytes < payload_length {
                    // The assigned slot is too small: ask for a bigger one
                    // in the asynchronous slot instead of transmitting.
                    slot = map.async_slot();
                    codec::encode_slot_update_message(
                        &mut tx_message,
                        self.latest_signal_strength,
                        self.network_id,
                        device_id,
                        payload_length,
                    );
                }
            } else {
                slot = map.async_slot();
                codec::encode_slot_request_message(
                    &mut tx_message,
                    self.latest_signal_strength,
                    self.network_id,
                    device_id,
                    codec::data_message_length(fields),
                );
            }

            tx_message.action = PowerAction::None;
            tx_message.start_time_us = slot.start_us;
            let _ = batch.push(tx_message);
        }

        self.network_map = Some(map);
    }

    fn schedule_param_acks(&mut self, batch: &mut TransmitBatch) {
        let Some(map) = &self.network_map else {
            // No schedule yet: nothing to align the acks to.
            return;
        };

        for index in 0..NUMBER_OF_VIRTUAL_SLAVES {
            let device_id = self.device_id + index as u32;
            let slot = map.ack_slot(device_id);
            if !slot.is_assigned() {
                continue;
            }

            let mut tx_message = MicronetMessage::new();
            codec::encode_ack_param_message(
                &mut tx_message,
                self.latest_signal_strength,
                self.network_id,
                device_id,
            );
            tx_message.action = PowerAction::None;
            tx_message.start_time_us = slot.start_us;
            let _ = batch.push(tx_message);
        }
    }

    /// Distribute the offered fields over the virtual slaves: each field
    /// goes to the slave whose payload is currently the smallest, keeping
    /// the per-slot payloads balanced.
    fn split_data_fields(&mut self) {
        self.split_data_fields = [0; NUMBER_OF_VIRTUAL_SLAVES];

        for bit in 0..32 {
            let field = self.data_fields & (1 << bit);
            if field != 0 {
                let index = self.shortest_slave();
                self.split_data_fields[index] |= field;
            }
        }

        for (index, fields) in self.split_data_fields.iter().enumerate() {
            log::debug!(
                "virtual slave {} fields {:#x} ({} bytes)",
                index,
                fields,
                codec::data_message_length(*fields)
            );
        }
    }

    fn shortest_slave(&self) -> usize {
        let mut min_length = u8::MAX;
        let mut min_index = 0;

        for (index, fields) in self.split_data_fields.iter().enumerate() {
            let length = codec::data_message_length(*fields);
            if length < min_length {
                min_length = length;
                min_index = index;
            }
        }

        min_index
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
