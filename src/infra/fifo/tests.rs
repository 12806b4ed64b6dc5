//! FIFO ordering and overflow tests.
use super::*;

fn tagged(tag: u8) -> MicronetMessage {
    let mut message = MicronetMessage::new();
    message.len = 14;
    message.data[0] = tag;
    message
}

#[test]
fn frames_come_out_in_capture_order() {
    let fifo: MessageFifo<4> = MessageFifo::new();

    assert!(fifo.push(&tagged(1)));
    assert!(fifo.push(&tagged(2)));
    assert!(fifo.push(&tagged(3)));

    assert_eq!(fifo.pop().unwrap().data[0], 1);
    assert_eq!(fifo.pop().unwrap().data[0], 2);
    assert_eq!(fifo.pop().unwrap().data[0], 3);
    assert!(fifo.pop().is_none());
}

#[test]
fn full_fifo_drops_the_newest_frame() {
    let fifo: MessageFifo<2> = MessageFifo::new();

    assert!(fifo.push(&tagged(1)));
    assert!(fifo.push(&tagged(2)));
    assert!(!fifo.push(&tagged(3)));
    assert_eq!(fifo.len(), 2);

    // The queued frames are intact; the overflowing one is gone.
    assert_eq!(fifo.pop().unwrap().data[0], 1);
    assert_eq!(fifo.pop().unwrap().data[0], 2);
}

#[test]
fn ring_wraps_around() {
    let fifo: MessageFifo<2> = MessageFifo::new();

    for round in 0..10u8 {
        assert!(fifo.push(&tagged(round)));
        assert_eq!(fifo.pop().unwrap().data[0], round);
    }
    assert!(fifo.is_empty());
}

#[test]
fn reset_discards_everything() {
    let fifo: MessageFifo<4> = MessageFifo::new();
    fifo.push(&tagged(1));
    fifo.push(&tagged(2));

    fifo.reset();

    assert!(fifo.is_empty());
    assert!(fifo.pop().is_none());
    // The ring is still usable after a reset.
    assert!(fifo.push(&tagged(9)));
    assert_eq!(fifo.pop().unwrap().data[0], 9);
}
