//! Header layout and checksum tests.
use super::*;

fn framed(network_id: u32, device_id: u32, id: MessageId) -> MicronetMessage {
    let mut message = MicronetMessage::new();
    message.init_header(network_id, device_id, id, 0x01, 5);
    message.finalize();
    message
}

#[test]
fn header_round_trip() {
    let message = framed(0x8321_4567, 0x8321_4568, MessageId::SendData);

    assert_eq!(message.network_id(), 0x8321_4567);
    assert_eq!(message.device_id(), 0x8321_4568);
    assert_eq!(message.device_type(), 0x83);
    assert_eq!(message.message(), Some(MessageId::SendData));
    assert_eq!(message.signal_strength(), 5);
    assert!(message.check_header().is_ok());
}

#[test]
fn length_bytes_are_duplicated() {
    let message = framed(0x0001_0002, 0x0100_0001, MessageId::Ping);

    assert_eq!(message.data[LEN_OFFSET_1], message.len - 2);
    assert_eq!(message.data[LEN_OFFSET_2], message.len - 2);
}

#[test]
fn corrupted_checksum_is_rejected() {
    let mut message = framed(0x8321_4567, 0x8321_4568, MessageId::SendData);
    message.data[CRC_OFFSET] = message.data[CRC_OFFSET].wrapping_add(1);

    assert_eq!(message.check_header(), Err(FrameError::InvalidHeaderCrc));
}

#[test]
fn mismatched_length_bytes_are_rejected() {
    let mut message = framed(0x8321_4567, 0x8321_4568, MessageId::SendData);
    message.data[LEN_OFFSET_2] = message.data[LEN_OFFSET_2].wrapping_add(1);

    assert_eq!(message.check_header(), Err(FrameError::LengthMismatch));
}

#[test]
fn short_frame_is_rejected() {
    let mut message = MicronetMessage::new();
    message.len = 10;

    assert_eq!(message.check_header(), Err(FrameError::TooShort { len: 10 }));
}

#[test]
fn unknown_message_id_decodes_to_none() {
    let mut message = framed(0, 0, MessageId::SendData);
    message.data[MI_OFFSET] = 0x42;

    assert_eq!(message.message(), None);
    assert_eq!(message.message_id(), 0x42);
}
