//! Micronet wire codec: pure, stateless functions over byte buffers.
//!
//! Decoding walks the typed data records of send-data messages and applies
//! unit conversion plus calibration to [`NavigationData`]; encoding
//! produces fully framed messages including header checksum and per-record
//! checksums. Only frames with a valid header may reach [`decode_message`].
use crate::core::NavigationData;
use crate::protocol::frame::{MessageId, MicronetMessage, PAYLOAD_OFFSET};
use libm::{atan2f, cosf, floorf, sinf, sqrtf};

//==================================================================================Constants

/// Field identifiers carried by send-data records.
pub const FIELD_ID_STW: u8 = 0x01;
pub const FIELD_ID_LOG: u8 = 0x02;
pub const FIELD_ID_STP: u8 = 0x03;
pub const FIELD_ID_DPT: u8 = 0x04;
pub const FIELD_ID_AWS: u8 = 0x05;
pub const FIELD_ID_AWA: u8 = 0x06;
pub const FIELD_ID_HDG: u8 = 0x07;
pub const FIELD_ID_SOGCOG: u8 = 0x08;
pub const FIELD_ID_LATLON: u8 = 0x09;
pub const FIELD_ID_BTW: u8 = 0x0a;
pub const FIELD_ID_XTE: u8 = 0x0b;
pub const FIELD_ID_TIME: u8 = 0x0c;
pub const FIELD_ID_DATE: u8 = 0x0d;
pub const FIELD_ID_NODE_INFO: u8 = 0x10;
pub const FIELD_ID_VMGWP: u8 = 0x12;
pub const FIELD_ID_VCC: u8 = 0x1b;
pub const FIELD_ID_DTW: u8 = 0x1f;

/// Calibration parameter identifiers of set-parameter messages.
pub const PARAM_ID_WATER_SPEED_FACTOR: u8 = 0x00;
pub const PARAM_ID_WATER_TEMP_OFFSET: u8 = 0x02;
pub const PARAM_ID_DEPTH_OFFSET: u8 = 0x03;
pub const PARAM_ID_SPEED_FILTERING: u8 = 0x04;
pub const PARAM_ID_WIND_SPEED_FACTOR: u8 = 0x06;
pub const PARAM_ID_WINDIR_OFFSET: u8 = 0x07;
pub const PARAM_ID_HEADING_OFFSET: u8 = 0x09;
pub const PARAM_ID_MAGVAR: u8 = 0x0d;
pub const PARAM_ID_WIND_SHIFT: u8 = 0x0e;

/// Requestable data fields, as a bitmask.
pub const DATA_FIELD_TIME: u32 = 1 << 0;
pub const DATA_FIELD_DATE: u32 = 1 << 1;
pub const DATA_FIELD_SOGCOG: u32 = 1 << 2;
pub const DATA_FIELD_POSITION: u32 = 1 << 3;
pub const DATA_FIELD_XTE: u32 = 1 << 4;
pub const DATA_FIELD_DTW: u32 = 1 << 5;
pub const DATA_FIELD_BTW: u32 = 1 << 6;
pub const DATA_FIELD_VMGWP: u32 = 1 << 7;
pub const DATA_FIELD_HDG: u32 = 1 << 8;
pub const DATA_FIELD_DPT: u32 = 1 << 9;
pub const DATA_FIELD_SPD: u32 = 1 << 10;
pub const DATA_FIELD_AWS: u32 = 1 << 11;
pub const DATA_FIELD_AWA: u32 = 1 << 12;
pub const DATA_FIELD_NODE_INFO: u32 = 1 << 13;

/// Depth readings at or above this raw value (tenths of feet) are
/// transducer error codes, not measurements.
const MAXIMUM_VALID_DEPTH_FT: i16 = 500;

/// Record property byte of measured values.
const FIELD_PROPS_MEASURED: u8 = 0x05;
/// Record property byte of the node-info record.
const FIELD_PROPS_NODE_INFO: u8 = 0x03;

const SW_MAJOR_VERSION: u8 = 1;
const SW_MINOR_VERSION: u8 = 0;

//==================================================================================Decoding

/// Outcome of decoding one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeResult {
    /// The frame requires an acknowledgment (a parameter write landed).
    Ack,
    /// Nothing to acknowledge.
    NoAck,
}

/// Value of a decoded record, dispatched to the field update logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldValue {
    I8(i8),
    I16(i16),
    Dual32(i32, i32),
    Position {
        lat_deg: u8,
        lat_min_x60000: u16,
        lon_deg: u8,
        lon_min_x60000: u16,
        flags: u8,
    },
}

/// Decode a header-valid frame into the navigation data set.
///
/// Send-data messages update fields record by record; set-parameter
/// messages apply the calibration write, raise `calibration_updated`, and
/// request an ack. Unknown message identifiers are ignored.
pub fn decode_message(
    message: &MicronetMessage,
    nav: &mut NavigationData,
    now_ms: u32,
) -> DecodeResult {
    match message.message() {
        Some(MessageId::SendData) => {
            decode_send_data(message, nav, now_ms);
            DecodeResult::NoAck
        }
        Some(MessageId::SetParameter) => {
            decode_set_parameter(message, nav);
            DecodeResult::Ack
        }
        _ => DecodeResult::NoAck,
    }
}

fn decode_send_data(message: &MicronetMessage, nav: &mut NavigationData, now_ms: u32) {
    let mut offset = PAYLOAD_OFFSET;
    while offset < message.len as usize {
        offset = decode_data_field(message, offset, nav, now_ms);
    }
    calculate_true_wind(nav, now_ms);
}

/// Decode one typed record and return the offset of the next one. A record
/// with a failing checksum is skipped without touching the data set; a
/// record overrunning the frame ends the walk.
fn decode_data_field(
    message: &MicronetMessage,
    offset: usize,
    nav: &mut NavigationData,
    now_ms: u32,
) -> usize {
    let data = &message.data[..message.len as usize];
    let record_len = data[offset] as usize;
    let crc_offset = offset + record_len + 1;

    if crc_offset >= data.len() {
        // Truncated record, nothing more to parse.
        return data.len();
    }

    let mut crc: u8 = 0;
    for byte in &data[offset..crc_offset] {
        crc = crc.wrapping_add(*byte);
    }
    if crc != data[crc_offset] {
        return offset + record_len + 2;
    }

    let field_id = data[offset + 1];
    let value = match record_len {
        3 => Some(FieldValue::I8(data[offset + 3] as i8)),
        // Length 5 records carry an extra trailing byte after the value.
        4 | 5 => Some(FieldValue::I16(i16::from_be_bytes([
            data[offset + 3],
            data[offset + 4],
        ]))),
        9 if field_id == FIELD_ID_LATLON => Some(FieldValue::Position {
            lat_deg: data[offset + 3],
            lat_min_x60000: u16::from_be_bytes([data[offset + 4], data[offset + 5]]),
            lon_deg: data[offset + 6],
            lon_min_x60000: u16::from_be_bytes([data[offset + 7], data[offset + 8]]),
            flags: data[offset + 9],
        }),
        10 => Some(FieldValue::Dual32(
            i32::from_be_bytes([
                data[offset + 3],
                data[offset + 4],
                data[offset + 5],
                data[offset + 6],
            ]),
            i32::from_be_bytes([
                data[offset + 7],
                data[offset + 8],
                data[offset + 9],
                data[offset + 10],
            ]),
        )),
        _ => None,
    };

    if let Some(value) = value {
        apply_field(field_id, value, nav, now_ms);
    }

    offset + record_len + 2
}

/// Apply one decoded record to the data set, with unit conversion and
/// calibration. Calibration is applied here and nowhere else.
fn apply_field(field_id: u8, value: FieldValue, nav: &mut NavigationData, now_ms: u32) {
    match (field_id, value) {
        (FIELD_ID_STP, FieldValue::I8(raw)) => {
            let temp = raw as f32 / 2.0 + nav.water_temperature_offset_degc;
            nav.stp_degc.set(temp, now_ms);
        }
        (FIELD_ID_STW, FieldValue::I16(raw)) => {
            let stw = raw as f32 / 100.0 * nav.water_speed_factor_per;
            nav.stw_kt.set(stw, now_ms);
        }
        (FIELD_ID_DPT, FieldValue::I16(raw)) => {
            if raw < MAXIMUM_VALID_DEPTH_FT * 10 {
                let dpt = raw as f32 * 0.3048 / 10.0 + nav.depth_offset_m;
                nav.dpt_m.set(dpt, now_ms);
            } else {
                nav.dpt_m.valid = false;
            }
        }
        (FIELD_ID_AWS, FieldValue::I16(raw)) => {
            let aws = raw as f32 / 10.0 * nav.wind_speed_factor_per;
            nav.aws_kt.set(aws, now_ms);
        }
        (FIELD_ID_AWA, FieldValue::I16(raw)) => {
            let mut awa = raw as f32 + nav.wind_direction_offset_deg;
            if awa > 180.0 {
                awa -= 360.0;
            }
            if awa < -180.0 {
                awa += 360.0;
            }
            nav.awa_deg.set(awa, now_ms);
        }
        (FIELD_ID_VCC, FieldValue::I16(raw)) => {
            nav.vcc_v.set(raw as f32 / 10.0, now_ms);
        }
        (FIELD_ID_LOG, FieldValue::Dual32(trip, log)) => {
            nav.trip_nm.set(trip as f32 / 100.0, now_ms);
            nav.log_nm.set(log as f32 / 10.0, now_ms);
        }
        (
            FIELD_ID_LATLON,
            FieldValue::Position {
                lat_deg,
                lat_min_x60000,
                lon_deg,
                lon_min_x60000,
                flags,
            },
        ) => {
            let mut latitude = lat_deg as f32 + lat_min_x60000 as f32 / 60000.0;
            let mut longitude = lon_deg as f32 + lon_min_x60000 as f32 / 60000.0;
            if flags & 0x01 == 0 {
                latitude = -latitude;
            }
            if flags & 0x02 == 0 {
                longitude = -longitude;
            }
            nav.latitude_deg.set(latitude, now_ms);
            nav.longitude_deg.set(longitude, now_ms);
        }
        // Unknown fields and unexpected widths are ignored.
        _ => {}
    }
}

fn decode_set_parameter(message: &MicronetMessage, nav: &mut NavigationData) {
    let payload = message.payload();
    if payload.len() < 3 {
        return;
    }

    let param_id = payload[1];
    let value_len = payload[2] as usize;
    if payload.len() < 3 + value_len {
        return;
    }
    let values = &payload[3..3 + value_len];

    match (param_id, value_len) {
        (PARAM_ID_WATER_SPEED_FACTOR, 1) => {
            // Stored as percent with a +50 offset.
            let raw = values[0] as i32 - 0x32;
            nav.water_speed_factor_per = 1.0 + raw as f32 / 100.0;
            nav.calibration_updated = true;
        }
        (PARAM_ID_WIND_SPEED_FACTOR, 1) => {
            nav.wind_speed_factor_per = 1.0 + (values[0] as i8) as f32 / 100.0;
            nav.calibration_updated = true;
        }
        (PARAM_ID_WATER_TEMP_OFFSET, 1) => {
            // Half-degree units.
            nav.water_temperature_offset_degc = (values[0] as i8) as f32 / 2.0;
            nav.calibration_updated = true;
        }
        (PARAM_ID_DEPTH_OFFSET, 1) => {
            // Tenths of feet, converted to metres.
            nav.depth_offset_m = (values[0] as i8) as f32 * 0.3048 / 10.0;
            nav.calibration_updated = true;
        }
        (PARAM_ID_WINDIR_OFFSET, 2) => {
            let raw = i16::from_le_bytes([values[0], values[1]]);
            nav.wind_direction_offset_deg = raw as f32;
            nav.calibration_updated = true;
        }
        (PARAM_ID_HEADING_OFFSET, 2) => {
            let raw = i16::from_le_bytes([values[0], values[1]]);
            nav.heading_offset_deg = raw as f32;
            nav.calibration_updated = true;
        }
        (PARAM_ID_MAGVAR, 1) => {
            nav.magnetic_variation_deg = (values[0] as i8) as f32;
            nav.calibration_updated = true;
        }
        (PARAM_ID_WIND_SHIFT, 1) => {
            nav.wind_shift_min = values[0] as f32;
            nav.calibration_updated = true;
        }
        // Unrecognized parameters are ignored; the message is still acked.
        _ => {}
    }
}

/// Derive true wind from apparent wind and speed through water. Only
/// recomputes when one of the inputs is fresher than the current TWA/TWS.
pub fn calculate_true_wind(nav: &mut NavigationData, now_ms: u32) {
    if !(nav.awa_deg.valid && nav.aws_kt.valid && nav.stw_kt.valid) {
        return;
    }

    let stale = !nav.twa_deg.valid
        || !nav.tws_kt.valid
        || nav.awa_deg.timestamp_ms > nav.twa_deg.timestamp_ms
        || nav.aws_kt.timestamp_ms > nav.tws_kt.timestamp_ms
        || nav.stw_kt.timestamp_ms > nav.twa_deg.timestamp_ms;
    if !stale {
        return;
    }

    let awa_rad = nav.awa_deg.value * core::f32::consts::PI / 180.0;
    let tw_x = nav.aws_kt.value * cosf(awa_rad) - nav.stw_kt.value;
    let tw_y = nav.aws_kt.value * sinf(awa_rad);

    nav.tws_kt.set(sqrtf(tw_x * tw_x + tw_y * tw_y), now_ms);
    nav.twa_deg
        .set(atan2f(tw_y, tw_x) * 180.0 / core::f32::consts::PI, now_ms);
}

//==================================================================================Signal strength

/// Quantize a raw RSSI into the 0..9 link quality scale carried in frame
/// headers: 5 dB buckets from -95 dBm, saturating at 9 above -55 dBm.
pub fn signal_strength(rssi_dbm: i16) -> u8 {
    if rssi_dbm >= -55 {
        9
    } else if rssi_dbm < -95 {
        0
    } else {
        ((rssi_dbm + 95) / 5 + 1) as u8
    }
}

/// Diagnostic variant of [`signal_strength`] with sub-bucket resolution.
pub fn signal_strength_float(rssi_dbm: i16) -> f32 {
    let strength = (rssi_dbm + 95) as f32 / 5.0;
    if strength < 0.0 {
        0.0
    } else {
        strength
    }
}

//==================================================================================Encoding

/// Payload byte count [`encode_data_message`] produces for `fields` when
/// every requested value is valid. The slave uses this to check its slot
/// budget before encoding.
pub fn data_message_length(fields: u32) -> u8 {
    let mut length: u8 = 0;

    if fields & DATA_FIELD_TIME != 0 {
        length += 6;
    }
    if fields & DATA_FIELD_DATE != 0 {
        length += 7;
    }
    if fields & DATA_FIELD_SOGCOG != 0 {
        length += 8;
    }
    if fields & DATA_FIELD_POSITION != 0 {
        length += 11;
    }
    if fields & DATA_FIELD_XTE != 0 {
        length += 6;
    }
    if fields & DATA_FIELD_DTW != 0 {
        length += 8;
    }
    if fields & DATA_FIELD_BTW != 0 {
        length += 12;
    }
    if fields & DATA_FIELD_VMGWP != 0 {
        length += 6;
    }
    if fields & DATA_FIELD_HDG != 0 {
        length += 6;
    }
    if fields & DATA_FIELD_DPT != 0 {
        length += 6;
    }
    if fields & DATA_FIELD_SPD != 0 {
        length += 6;
    }
    if fields & DATA_FIELD_AWS != 0 {
        length += 6;
    }
    if fields & DATA_FIELD_AWA != 0 {
        length += 6;
    }
    if fields & DATA_FIELD_NODE_INFO != 0 {
        length += 8;
    }

    length
}

/// Encode a send-data message carrying the masked fields of `nav` that are
/// currently valid, in the canonical record order. Returns the payload
/// byte count.
pub fn encode_data_message(
    message: &mut MicronetMessage,
    signal_strength: u8,
    network_id: u32,
    device_id: u32,
    nav: &NavigationData,
    fields: u32,
) -> u8 {
    message.init_header(network_id, device_id, MessageId::SendData, 0x01, signal_strength);

    if fields & DATA_FIELD_TIME != 0 && nav.time.valid {
        let value = ((nav.time.hour as i16) << 8) + nav.time.minute as i16;
        add_16bit_field(message, FIELD_ID_TIME, value);
    }
    if fields & DATA_FIELD_DATE != 0 && nav.date.valid {
        let value =
            ((nav.date.day as i32) << 16) + ((nav.date.month as i32) << 8) + nav.date.year as i32;
        add_24bit_field(message, FIELD_ID_DATE, value);
    }
    if fields & DATA_FIELD_SOGCOG != 0 && (nav.sog_kt.valid || nav.cog_deg.valid) {
        add_dual_16bit_field(
            message,
            FIELD_ID_SOGCOG,
            (nav.sog_kt.value * 10.0) as i16,
            nav.cog_deg.value as i16,
        );
    }
    if fields & DATA_FIELD_POSITION != 0 && (nav.latitude_deg.valid || nav.longitude_deg.valid) {
        add_position_field(message, nav.latitude_deg.value, nav.longitude_deg.value);
    }
    if fields & DATA_FIELD_XTE != 0 && nav.xte_nm.valid {
        add_16bit_field(message, FIELD_ID_XTE, (nav.xte_nm.value * 100.0) as i16);
    }
    if fields & DATA_FIELD_DTW != 0 && nav.dtw_nm.valid {
        add_32bit_field(message, FIELD_ID_DTW, (nav.dtw_nm.value * 100.0) as i32);
    }
    if fields & DATA_FIELD_BTW != 0 && nav.btw_deg.valid {
        add_quad_16bit_field(message, FIELD_ID_BTW, nav.btw_deg.value as i16, 0, 0, 0);
    }
    if fields & DATA_FIELD_VMGWP != 0 && nav.vmgwp_kt.valid {
        add_16bit_field(message, FIELD_ID_VMGWP, (nav.vmgwp_kt.value * 100.0) as i16);
    }
    if fields & DATA_FIELD_HDG != 0 && nav.mag_hdg_deg.valid {
        add_16bit_field(message, FIELD_ID_HDG, nav.mag_hdg_deg.value as i16);
    }
    if fields & DATA_FIELD_DPT != 0 && nav.dpt_m.valid {
        add_16bit_field(message, FIELD_ID_DPT, (nav.dpt_m.value * 10.0 / 0.3048) as i16);
    }
    if fields & DATA_FIELD_SPD != 0 && nav.stw_kt.valid {
        add_16bit_field(message, FIELD_ID_STW, (nav.stw_kt.value * 100.0) as i16);
    }
    if fields & DATA_FIELD_AWS != 0 && nav.aws_kt.valid {
        add_16bit_field(message, FIELD_ID_AWS, (nav.aws_kt.value * 10.0) as i16);
    }
    if fields & DATA_FIELD_AWA != 0 && nav.awa_deg.valid {
        add_16bit_field(message, FIELD_ID_AWA, nav.awa_deg.value as i16);
    }
    if fields & DATA_FIELD_NODE_INFO != 0 {
        add_node_info_field(message, signal_strength);
    }

    message.finalize();
    message.len - PAYLOAD_OFFSET as u8
}

/// Encode a slot-update message asking the master to grow the slot of
/// `device_id` to `payload_length` bytes.
pub fn encode_slot_update_message(
    message: &mut MicronetMessage,
    signal_strength: u8,
    network_id: u32,
    device_id: u32,
    payload_length: u8,
) -> u8 {
    message.init_header(network_id, device_id, MessageId::SlotUpdate, 0x09, signal_strength);
    push_byte(message, payload_length);
    append_payload_crc(message);
    message.finalize();
    message.len - PAYLOAD_OFFSET as u8
}

/// Encode a slot-request message asking the master for a new synchronous
/// slot of `payload_length` bytes.
pub fn encode_slot_request_message(
    message: &mut MicronetMessage,
    signal_strength: u8,
    network_id: u32,
    device_id: u32,
    payload_length: u8,
) -> u8 {
    message.init_header(network_id, device_id, MessageId::SlotRequest, 0x09, signal_strength);
    push_byte(message, 0x00);
    push_byte(message, payload_length);
    append_payload_crc(message);
    message.finalize();
    message.len - PAYLOAD_OFFSET as u8
}

/// Encode the acknowledgment of a parameter write.
pub fn encode_ack_param_message(
    message: &mut MicronetMessage,
    signal_strength: u8,
    network_id: u32,
    device_id: u32,
) -> u8 {
    message.init_header(network_id, device_id, MessageId::AckParameter, 0x01, signal_strength);
    message.finalize();
    message.len - PAYLOAD_OFFSET as u8
}

/// Encode a presence ping.
pub fn encode_ping_message(
    message: &mut MicronetMessage,
    signal_strength: u8,
    network_id: u32,
    device_id: u32,
) -> u8 {
    message.init_header(network_id, device_id, MessageId::Ping, 0x09, signal_strength);
    append_payload_crc(message);
    message.finalize();
    message.len - PAYLOAD_OFFSET as u8
}

/// Encode the network reset command ("OFF" parameter write).
pub fn encode_reset_message(
    message: &mut MicronetMessage,
    signal_strength: u8,
    network_id: u32,
    device_id: u32,
) -> u8 {
    message.init_header(network_id, device_id, MessageId::SetParameter, 0x09, signal_strength);
    for byte in [0xfa, 0x4f, 0x46, 0x46, 0x26] {
        push_byte(message, byte);
    }
    append_payload_crc(message);
    message.finalize();
    message.len - PAYLOAD_OFFSET as u8
}

//==================================================================================Record helpers

#[inline]
fn push_byte(message: &mut MicronetMessage, byte: u8) {
    message.data[message.len as usize] = byte;
    message.len += 1;
}

/// Append one typed record: `[len][field_id][props][values…][crc]` where
/// `len` covers field id, props, and values, and `crc` is the 8-bit sum of
/// everything before it.
fn add_record(message: &mut MicronetMessage, field_id: u8, props: u8, values: &[u8]) {
    let start = message.len as usize;
    push_byte(message, (values.len() + 2) as u8);
    push_byte(message, field_id);
    push_byte(message, props);
    for byte in values {
        push_byte(message, *byte);
    }

    let mut crc: u8 = 0;
    for byte in &message.data[start..message.len as usize] {
        crc = crc.wrapping_add(*byte);
    }
    push_byte(message, crc);
}

fn add_16bit_field(message: &mut MicronetMessage, field_id: u8, value: i16) {
    add_record(message, field_id, FIELD_PROPS_MEASURED, &value.to_be_bytes());
}

fn add_24bit_field(message: &mut MicronetMessage, field_id: u8, value: i32) {
    let bytes = value.to_be_bytes();
    add_record(message, field_id, FIELD_PROPS_MEASURED, &bytes[1..4]);
}

fn add_32bit_field(message: &mut MicronetMessage, field_id: u8, value: i32) {
    add_record(message, field_id, FIELD_PROPS_MEASURED, &value.to_be_bytes());
}

fn add_dual_16bit_field(message: &mut MicronetMessage, field_id: u8, value1: i16, value2: i16) {
    let mut values = [0u8; 4];
    values[0..2].copy_from_slice(&value1.to_be_bytes());
    values[2..4].copy_from_slice(&value2.to_be_bytes());
    add_record(message, field_id, FIELD_PROPS_MEASURED, &values);
}

fn add_quad_16bit_field(
    message: &mut MicronetMessage,
    field_id: u8,
    value1: i16,
    value2: i16,
    value3: i16,
    value4: i16,
) {
    let mut values = [0u8; 8];
    values[0..2].copy_from_slice(&value1.to_be_bytes());
    values[2..4].copy_from_slice(&value2.to_be_bytes());
    values[4..6].copy_from_slice(&value3.to_be_bytes());
    values[6..8].copy_from_slice(&value4.to_be_bytes());
    add_record(message, field_id, FIELD_PROPS_MEASURED, &values);
}

fn add_node_info_field(message: &mut MicronetMessage, signal_strength: u8) {
    add_record(
        message,
        FIELD_ID_NODE_INFO,
        FIELD_PROPS_NODE_INFO,
        &[SW_MINOR_VERSION, SW_MAJOR_VERSION, 0x33, signal_strength],
    );
}

/// Append the position record: integer degrees, minutes x60000, and the
/// north/east direction flags. Signs are folded into the flags.
fn add_position_field(message: &mut MicronetMessage, latitude: f32, longitude: f32) {
    let mut flags: u8 = 0;
    let mut latitude = latitude;
    let mut longitude = longitude;

    if latitude > 0.0 {
        flags |= 0x01;
    } else {
        latitude = -latitude;
    }
    if longitude > 0.0 {
        flags |= 0x02;
    } else {
        longitude = -longitude;
    }

    let lat_min = (60000.0 * (latitude - floorf(latitude))) as u16;
    let lon_min = (60000.0 * (longitude - floorf(longitude))) as u16;

    let mut values = [0u8; 7];
    values[0] = floorf(latitude) as u8;
    values[1..3].copy_from_slice(&lat_min.to_be_bytes());
    values[3] = floorf(longitude) as u8;
    values[4..6].copy_from_slice(&lon_min.to_be_bytes());
    values[6] = flags;
    add_record(message, FIELD_ID_LATLON, FIELD_PROPS_MEASURED, &values);
}

/// Append the 8-bit sum of the payload written so far. Control messages
/// (slot update/request, ping, reset) carry this trailing checksum.
fn append_payload_crc(message: &mut MicronetMessage) {
    let mut crc: u8 = 0;
    for byte in &message.data[PAYLOAD_OFFSET..message.len as usize] {
        crc = crc.wrapping_add(*byte);
    }
    push_byte(message, crc);
}
