//! Virtual slave cycle logic tests.
use super::*;
use crate::protocol::codec::{
    DATA_FIELD_BTW, DATA_FIELD_DATE, DATA_FIELD_DTW, DATA_FIELD_HDG, DATA_FIELD_NODE_INFO,
    DATA_FIELD_POSITION, DATA_FIELD_SOGCOG, DATA_FIELD_TIME, DATA_FIELD_VMGWP, DATA_FIELD_XTE,
};
use crate::protocol::frame::MessageId;

const NETWORK_ID: u32 = 0x8300_1122;
const MASTER: u32 = 0x8300_1122;
const DEVICE: u32 = 0x0100_0010;

const ALL_NAV_FIELDS: u32 = DATA_FIELD_TIME
    | DATA_FIELD_DATE
    | DATA_FIELD_SOGCOG
    | DATA_FIELD_POSITION
    | DATA_FIELD_XTE
    | DATA_FIELD_DTW
    | DATA_FIELD_BTW
    | DATA_FIELD_VMGWP
    | DATA_FIELD_HDG
    | DATA_FIELD_NODE_INFO;

/// Master request declaring the given `(device, payload)` pairs.
fn master_request(devices: &[(u32, u8)], start_us: u64, end_us: u64) -> MicronetMessage {
    let mut message = MicronetMessage::new();
    message.init_header(NETWORK_ID, MASTER, MessageId::MasterRequest, 0x01, 9);
    message.rssi_dbm = -72;

    let mut payload = heapless::Vec::<u8, 80>::new();
    payload.extend_from_slice(&MASTER.to_be_bytes()).unwrap();
    payload.push(0).unwrap();
    for (device_id, payload_bytes) in devices {
        payload.extend_from_slice(&device_id.to_be_bytes()).unwrap();
        payload.push(*payload_bytes).unwrap();
    }
    payload.push(0x00).unwrap();
    payload.push(0x00).unwrap();
    let crc = payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    payload.push(crc).unwrap();

    for byte in &payload {
        message.data[message.len as usize] = *byte;
        message.len += 1;
    }
    message.finalize();
    message.start_time_us = start_us;
    message.end_time_us = end_us;
    message
}

fn set_parameter_frame() -> MicronetMessage {
    let mut message = MicronetMessage::new();
    message.init_header(NETWORK_ID, MASTER, MessageId::SetParameter, 0x01, 9);
    for byte in [0x01, codec::PARAM_ID_WATER_SPEED_FACTOR, 0x01, 0x3c] {
        message.data[message.len as usize] = byte;
        message.len += 1;
    }
    message.finalize();
    message
}

fn populated_nav() -> NavigationData {
    let mut nav = NavigationData::new();
    nav.time.set(12, 35, 0);
    nav.date.set(23, 3, 94, 0);
    nav.sog_kt.set(6.4, 0);
    nav.cog_deg.set(84.0, 0);
    nav.latitude_deg.set(48.1, 0);
    nav.longitude_deg.set(11.5, 0);
    nav.xte_nm.set(0.2, 0);
    nav.dtw_nm.set(3.5, 0);
    nav.btw_deg.set(270.0, 0);
    nav.vmgwp_kt.set(4.2, 0);
    nav.mag_hdg_deg.set(123.0, 0);
    nav
}

#[test]
fn field_split_is_balanced() {
    let mut slave = SlaveDevice::new(NETWORK_ID, DEVICE);
    slave.set_data_fields(ALL_NAV_FIELDS);

    let mut union = 0u32;
    let mut max_length = 0u8;
    for index in 0..NUMBER_OF_VIRTUAL_SLAVES {
        let fields = slave.fields_of_slave(index);
        assert_eq!(union & fields, 0, "field assigned twice");
        union |= fields;
        max_length = max_length.max(codec::data_message_length(fields));
    }
    assert_eq!(union, ALL_NAV_FIELDS);

    // No slave carries more than its fair share plus one record.
    let total = codec::data_message_length(ALL_NAV_FIELDS);
    let fair = total.div_ceil(NUMBER_OF_VIRTUAL_SLAVES as u8);
    assert!(max_length <= fair + 12, "{max_length} vs fair {fair}");
}

#[test]
fn master_request_schedules_power_gating_and_slot_transmissions() {
    let mut slave = SlaveDevice::new(NETWORK_ID, DEVICE);
    slave.set_data_fields(ALL_NAV_FIELDS);
    let mut nav = populated_nav();

    // All three virtual slaves have generous slots.
    let request = master_request(
        &[(DEVICE, 90), (DEVICE + 1, 90), (DEVICE + 2, 90)],
        0,
        45_000,
    );
    let map = NetworkMap::build(&request).unwrap();

    let mut batch = TransmitBatch::new();
    slave.process_message(&request, &mut nav, 45_000, 45, &mut batch);

    assert_eq!(slave.network_status(), NetworkStatus::Found);
    assert_eq!(batch.len(), 2 + NUMBER_OF_VIRTUAL_SLAVES);

    // Power gating first: sleep at cycle end, wake 1 ms before next start.
    assert_eq!(batch[0].action, PowerAction::LowPower);
    assert_eq!(batch[0].start_time_us, map.network_end_us);
    assert_eq!(batch[1].action, PowerAction::ActivePower);
    assert_eq!(batch[1].start_time_us, map.next_network_start_us() - 1000);

    // One data frame per virtual slave, aligned to its sync slot.
    for index in 0..NUMBER_OF_VIRTUAL_SLAVES {
        let entry = &batch[2 + index];
        assert_eq!(entry.action, PowerAction::None);
        assert_eq!(entry.message(), Some(MessageId::SendData));
        assert_eq!(entry.device_id(), DEVICE + index as u32);
        assert_eq!(
            entry.start_time_us,
            map.sync_slot(DEVICE + index as u32).start_us
        );
        assert!(entry.header_is_valid());
        // The slave echoes the master's link quality (-72 dBm -> 5).
        assert_eq!(entry.signal_strength(), 5);
    }
}

#[test]
fn undersized_slot_triggers_a_slot_update_in_the_async_slot() {
    let mut slave = SlaveDevice::new(NETWORK_ID, DEVICE);
    slave.set_data_fields(ALL_NAV_FIELDS);
    let mut nav = populated_nav();

    // First slave has a 4-byte slot, far too small for its payload.
    let request = master_request(
        &[(DEVICE, 4), (DEVICE + 1, 90), (DEVICE + 2, 90)],
        0,
        45_000,
    );
    let map = NetworkMap::build(&request).unwrap();

    let mut batch = TransmitBatch::new();
    slave.process_message(&request, &mut nav, 45_000, 45, &mut batch);

    let entry = &batch[2];
    assert_eq!(entry.message(), Some(MessageId::SlotUpdate));
    assert_eq!(entry.start_time_us, map.async_slot().start_us);
    // The update asks for the room the data frame actually needs.
    assert_eq!(
        entry.payload()[0],
        codec::data_message_length(slave.fields_of_slave(0))
    );
}

#[test]
fn missing_slot_triggers_a_slot_request_in_the_async_slot() {
    let mut slave = SlaveDevice::new(NETWORK_ID, DEVICE);
    slave.set_data_fields(ALL_NAV_FIELDS);
    let mut nav = populated_nav();

    // Only the first two virtual slaves are declared.
    let request = master_request(&[(DEVICE, 90), (DEVICE + 1, 90)], 0, 45_000);
    let map = NetworkMap::build(&request).unwrap();

    let mut batch = TransmitBatch::new();
    slave.process_message(&request, &mut nav, 45_000, 45, &mut batch);

    let entry = &batch[4];
    assert_eq!(entry.message(), Some(MessageId::SlotRequest));
    assert_eq!(entry.device_id(), DEVICE + 2);
    assert_eq!(entry.start_time_us, map.async_slot().start_us);
}

#[test]
fn parameter_write_is_acked_once_per_virtual_slave() {
    let mut slave = SlaveDevice::new(NETWORK_ID, DEVICE);
    slave.set_data_fields(ALL_NAV_FIELDS);
    let mut nav = populated_nav();

    let request = master_request(
        &[(DEVICE, 90), (DEVICE + 1, 90), (DEVICE + 2, 90)],
        0,
        45_000,
    );
    let map = NetworkMap::build(&request).unwrap();
    let mut batch = TransmitBatch::new();
    slave.process_message(&request, &mut nav, 45_000, 45, &mut batch);

    let mut batch = TransmitBatch::new();
    slave.process_message(&set_parameter_frame(), &mut nav, 100_000, 100, &mut batch);

    assert!(nav.calibration_updated);
    assert!((nav.water_speed_factor_per - 1.10).abs() < 1e-6);

    assert_eq!(batch.len(), NUMBER_OF_VIRTUAL_SLAVES);
    for index in 0..NUMBER_OF_VIRTUAL_SLAVES {
        let entry = &batch[index];
        assert_eq!(entry.message(), Some(MessageId::AckParameter));
        assert_eq!(entry.device_id(), DEVICE + index as u32);
        assert_eq!(
            entry.start_time_us,
            map.ack_slot(DEVICE + index as u32).start_us
        );
    }
}

#[test]
fn foreign_network_frames_are_ignored() {
    let mut slave = SlaveDevice::new(NETWORK_ID, DEVICE);
    slave.set_data_fields(ALL_NAV_FIELDS);
    let mut nav = NavigationData::new();

    let mut request = master_request(&[(DEVICE, 90)], 0, 45_000);
    request.data[0] ^= 0xff; // different network, stale header checksum too
    let mut batch = TransmitBatch::new();
    slave.process_message(&request, &mut nav, 45_000, 45, &mut batch);

    assert!(batch.is_empty());
    assert_eq!(slave.network_status(), NetworkStatus::NotFound);
}

#[test]
fn corrupted_header_leaves_navigation_data_untouched() {
    let mut slave = SlaveDevice::new(NETWORK_ID, DEVICE);
    let mut nav = NavigationData::new();
    nav.dpt_m.set(3.0, 10);

    let mut frame = set_parameter_frame();
    frame.data[crate::protocol::frame::CRC_OFFSET] =
        frame.data[crate::protocol::frame::CRC_OFFSET].wrapping_add(1);

    let mut batch = TransmitBatch::new();
    slave.process_message(&frame, &mut nav, 50_000, 50, &mut batch);

    assert!(batch.is_empty());
    assert!(!nav.calibration_updated);
    assert!((nav.water_speed_factor_per - 1.0).abs() < 1e-6);
    assert!(nav.dpt_m.valid);
}

#[test]
fn master_silence_drops_the_network_and_schedules_a_wake() {
    let mut slave = SlaveDevice::new(NETWORK_ID, DEVICE);
    slave.set_data_fields(ALL_NAV_FIELDS);
    let mut nav = populated_nav();

    let request = master_request(
        &[(DEVICE, 90), (DEVICE + 1, 90), (DEVICE + 2, 90)],
        1_000_000,
        1_045_000,
    );
    let mut batch = TransmitBatch::new();
    slave.process_message(&request, &mut nav, 1_045_000, 1_045, &mut batch);
    assert_eq!(slave.network_status(), NetworkStatus::Found);

    // Three seconds of silence later.
    let mut batch = TransmitBatch::new();
    slave.poll_network(4_100_000, &mut batch);

    assert_eq!(slave.network_status(), NetworkStatus::NotFound);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].action, PowerAction::ActivePower);
    assert_eq!(batch[0].start_time_us, 4_100_000 + 100_000);
}
