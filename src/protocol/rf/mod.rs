//! Interrupt-driven RF state machine for the half-duplex Micronet link.
//!
//! Reception discovers the packet length on the fly: as soon as the two
//! duplicated length bytes are drained from the chip FIFO, the fixed
//! packet length register is rewritten so frames longer than the FIFO are
//! captured without truncation races. Completed frames are timestamped,
//! pushed to the message FIFO, and reception restarts before any further
//! processing so the next frame is never missed.
//!
//! Transmission is driven by a bounded list of `{start_us, action, frame}`
//! entries and a one-shot microsecond timer. Power-mode pseudo-entries
//! travel through the same list, injecting radio sleep/wake transitions
//! into the transmit timeline.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::core::FrequencySystem;
use crate::error::RfError;
use crate::infra::fifo::{MessageFifo, MESSAGE_STORE_SIZE};
use crate::protocol::frame::{
    MessageId, MicronetMessage, PowerAction, LEN_OFFSET_1, LEN_OFFSET_2, MAX_MESSAGE_LENGTH,
    PAYLOAD_OFFSET,
};
use crate::protocol::{
    BYTE_LENGTH_US, PREAMBLE_LENGTH_US, RF_CENTER_FREQUENCY_868_MHZ, RF_CENTER_FREQUENCY_915_MHZ,
    RF_PREAMBLE_BYTE, RF_PREAMBLE_LENGTH, RF_SYNC_BYTE,
};

pub mod traits;

use traits::monotonic::Monotonic;
use traits::transceiver::{RfBandwidth, RfTransceiver};
use traits::tx_timer::TxTimer;

//==================================================================================Constants

/// Number of entries in the transmit list.
pub const TRANSMIT_LIST_SIZE: usize = 8;

/// Usable chip FIFO depth per refill during transmission.
const RADIO_FIFO_MAX_SIZE: usize = 60;

/// An RX FIFO reading above this level means the chip overflowed.
const RX_FIFO_OVERFLOW_LIMIT: u8 = 64;

/// Transmissions scheduled further out than this are stale garbage; the
/// TDMA cycle is one second.
const TRANSMIT_HORIZON_US: i64 = 3_000_000;

/// Preamble bytes preloaded into the TX FIFO before the payload.
const PREAMBLE_AND_SYNC: [u8; RF_PREAMBLE_LENGTH] = {
    let mut bytes = [RF_PREAMBLE_BYTE; RF_PREAMBLE_LENGTH];
    bytes[RF_PREAMBLE_LENGTH - 1] = RF_SYNC_BYTE;
    bytes
};

//==================================================================================State machine

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RfState {
    /// Listening for a sync word.
    RxWaitSync,
    /// Draining header bytes, packet length not yet known.
    RxHeader,
    /// Packet length known, draining the remainder.
    RxPayload,
    /// Feeding payload bytes to the TX FIFO.
    TxTransmit,
    /// All bytes loaded, waiting for the TX FIFO underflow.
    TxLastTransmit,
}

struct Inner<R: RfTransceiver, T: TxTimer> {
    radio: R,
    timer: T,
    state: RfState,
    rx_message: MicronetMessage,
    rx_offset: usize,
    /// Discovered total length of the frame under reception.
    rx_packet_length: Option<usize>,
    rx_start_time_us: u64,
    transmit_list: [MicronetMessage; TRANSMIT_LIST_SIZE],
    /// Entry currently armed on the one-shot timer.
    next_transmit_index: Option<usize>,
    message_bytes_sent: usize,
    frequency_offset_mhz: f32,
    /// Network id whose master requests drive frequency tracking; zero
    /// disables tracking.
    freq_tracking_nid: u32,
}

/// The RF driver. Owns the radio chip exclusively; the slave device and
/// the codec never touch it. `on_radio_irq` and `on_timer_irq` are the
/// interrupt entry points and must be wired to the chip GPIO and the
/// one-shot timer respectively.
pub struct RfDriver<'a, R, T, C, const N: usize = MESSAGE_STORE_SIZE>
where
    R: RfTransceiver,
    T: TxTimer,
    C: Monotonic,
{
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner<R, T>>>,
    clock: C,
    rx_fifo: &'a MessageFifo<N>,
}

impl<'a, R, T, C, const N: usize> RfDriver<'a, R, T, C, N>
where
    R: RfTransceiver,
    T: TxTimer,
    C: Monotonic,
{
    /// Probe the radio and start listening. Fails when the chip does not
    /// answer; the core refuses to run without it.
    pub fn new(
        mut radio: R,
        timer: T,
        clock: C,
        rx_fifo: &'a MessageFifo<N>,
        frequency_offset_mhz: f32,
    ) -> Result<Self, RfError> {
        if !radio.is_connected() {
            return Err(RfError::ChipNotDetected);
        }

        let driver = Self {
            inner: Mutex::new(RefCell::new(Inner {
                radio,
                timer,
                state: RfState::RxWaitSync,
                rx_message: MicronetMessage::new(),
                rx_offset: 0,
                rx_packet_length: None,
                rx_start_time_us: 0,
                transmit_list: [MicronetMessage::new(); TRANSMIT_LIST_SIZE],
                next_transmit_index: None,
                message_bytes_sent: 0,
                frequency_offset_mhz,
                freq_tracking_nid: 0,
            })),
            clock,
            rx_fifo,
        };
        driver.restart_reception();
        Ok(driver)
    }

    //==================================================================================Tuning

    /// Update the additive crystal trim.
    pub fn set_frequency_offset(&self, offset_mhz: f32) {
        self.inner
            .lock(|inner| inner.borrow_mut().frequency_offset_mhz = offset_mhz);
    }

    /// Tune to an absolute frequency, trim included.
    pub fn set_frequency(&self, frequency_mhz: f32) {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            let trimmed = frequency_mhz + inner.frequency_offset_mhz;
            inner.radio.set_frequency_mhz(trimmed);
        });
    }

    /// Tune to the regional Micronet center frequency.
    pub fn set_frequency_system(&self, system: FrequencySystem) {
        let center = match system {
            FrequencySystem::Mhz868 => RF_CENTER_FREQUENCY_868_MHZ,
            FrequencySystem::Mhz915 => RF_CENTER_FREQUENCY_915_MHZ,
        };
        self.set_frequency(center);
    }

    pub fn set_bandwidth(&self, bandwidth: RfBandwidth) {
        self.inner
            .lock(|inner| inner.borrow_mut().radio.set_bandwidth(bandwidth));
    }

    /// Track the master frequency of `network_id`: every received master
    /// request of that network latches the chip's frequency-offset
    /// estimate, countering crystal drift on both ends.
    pub fn enable_frequency_tracking(&self, network_id: u32) {
        self.inner
            .lock(|inner| inner.borrow_mut().freq_tracking_nid = network_id);
    }

    pub fn disable_frequency_tracking(&self) {
        self.inner
            .lock(|inner| inner.borrow_mut().freq_tracking_nid = 0);
    }

    //==================================================================================Interrupt entry points

    /// Radio GPIO interrupt: sync word detected, RX FIFO threshold, TX
    /// FIFO threshold, or TX underflow depending on the current state.
    pub fn on_radio_irq(&self) {
        let now_us = self.clock.now_us();
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            match inner.state {
                RfState::TxTransmit | RfState::TxLastTransmit => {
                    Self::isr_tx(&mut inner, now_us)
                }
                _ => Self::isr_rx(&mut inner, now_us, self.rx_fifo),
            }
        });
    }

    /// One-shot timer interrupt: time to transmit or to switch power mode.
    pub fn on_timer_irq(&self) {
        let now_us = self.clock.now_us();
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            Self::transmit_callback(&mut inner, now_us);
        });
    }

    //==================================================================================Foreground API

    /// Queue a frame (or power pseudo-entry) for transmission at its
    /// `start_time_us`. Entries in the past or beyond the scheduling
    /// horizon expire naturally at scheduling time.
    pub fn transmit(&self, message: &MicronetMessage) -> Result<(), RfError> {
        let now_us = self.clock.now_us();
        let queued = self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            let free = inner
                .transmit_list
                .iter()
                .position(|entry| entry.start_time_us == 0);
            match free {
                Some(index) => {
                    inner.transmit_list[index] = *message;
                    Self::schedule_next(&mut inner, now_us);
                    Ok(())
                }
                None => Err(RfError::TransmitListFull),
            }
        });
        if queued.is_err() {
            log::warn!("transmit list full, frame dropped");
        }
        queued
    }

    /// Abort any reception in progress and restart sync-word hunting.
    pub fn restart_reception(&self) {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            Self::restart_reception_inner(&mut inner);
        });
    }

    //==================================================================================Receive path

    fn isr_rx(inner: &mut Inner<R, T>, now_us: u64, rx_fifo: &MessageFifo<N>) {
        let pending = match inner.state {
            RfState::RxWaitSync => {
                // A packet is under reception right now. Collect bytes
                // immediately instead of waiting for the end of packet, so
                // the length register can be rewritten while it arrives.
                inner.state = RfState::RxHeader;
                inner.rx_packet_length = None;
                inner.rx_offset = 0;

                let pending = inner.radio.rx_fifo_level();
                if pending > RX_FIFO_OVERFLOW_LIMIT {
                    Self::restart_reception_inner(inner);
                    return;
                }

                // The sync IRQ fires one preamble (plus any already drained
                // bytes) after the frame really started on the air.
                inner.rx_start_time_us = now_us
                    .wrapping_sub(PREAMBLE_LENGTH_US)
                    .wrapping_sub(pending as u64 * BYTE_LENGTH_US);
                pending as usize
            }
            RfState::RxHeader | RfState::RxPayload => {
                let pending = inner.radio.rx_fifo_level();
                if pending > RX_FIFO_OVERFLOW_LIMIT {
                    Self::restart_reception_inner(inner);
                    return;
                }
                pending as usize
            }
            _ => {
                // The RX IRQ is not supposed to fire in TX states.
                return;
            }
        };

        let expected = inner.rx_packet_length;

        if pending > 0 && expected.map_or(true, |len| inner.rx_offset < len) {
            if inner.rx_offset + pending > MAX_MESSAGE_LENGTH {
                // More bytes than any legal frame: restart listening.
                Self::restart_reception_inner(inner);
                return;
            }
            let offset = inner.rx_offset;
            inner
                .radio
                .read_rx_fifo(&mut inner.rx_message.data[offset..offset + pending]);
            inner.rx_offset += pending;

            if inner.state == RfState::RxHeader && inner.rx_offset >= LEN_OFFSET_2 + 1 {
                inner.state = RfState::RxPayload;
                let len_a = inner.rx_message.data[LEN_OFFSET_1];
                let len_b = inner.rx_message.data[LEN_OFFSET_2];
                if len_a == len_b
                    && (len_a as usize) < MAX_MESSAGE_LENGTH - 3
                    && (len_a as usize + 2) >= PAYLOAD_OFFSET
                {
                    let total = len_a as usize + 2;
                    inner.rx_packet_length = Some(total);
                    // Rewrite the chip's fixed length on the fly so frames
                    // longer than the FIFO complete without truncation.
                    inner.radio.set_packet_length(total as u8);
                } else {
                    Self::restart_reception_inner(inner);
                    return;
                }
            }
        }

        let Some(packet_length) = inner.rx_packet_length else {
            return;
        };
        if inner.rx_offset < packet_length {
            return;
        }

        // Frame complete. Restart reception first so the next frame is
        // never missed, then publish the captured one.
        let rssi = inner.radio.rssi_dbm();
        Self::restart_reception_inner(inner);

        inner.rx_message.len = packet_length as u8;
        inner.rx_message.rssi_dbm = rssi;
        inner.rx_message.start_time_us = inner.rx_start_time_us;
        inner.rx_message.end_time_us = inner.rx_start_time_us + inner.rx_message.airtime_us();
        inner.rx_message.action = PowerAction::None;
        rx_fifo.push(&inner.rx_message);

        // Master requests of the tracked network carry the reference
        // crystal; latch the chip's offset estimate against it.
        if inner.freq_tracking_nid != 0
            && inner.rx_message.message() == Some(MessageId::MasterRequest)
            && inner.rx_message.network_id() == inner.freq_tracking_nid
        {
            inner.radio.latch_frequency_offset();
        }
    }

    fn restart_reception_inner(inner: &mut Inner<R, T>) {
        inner.radio.set_idle();
        inner.radio.flush_rx_fifo();
        inner.radio.irq_on_rx_fifo_threshold();
        inner.radio.set_sync_detection(true);
        inner.radio.set_packet_length(RADIO_FIFO_MAX_SIZE as u8);
        inner.state = RfState::RxWaitSync;
        inner.radio.set_rx();
    }

    //==================================================================================Transmit path

    fn isr_tx(inner: &mut Inner<R, T>, now_us: u64) {
        let Some(index) = inner.next_transmit_index else {
            return;
        };

        if inner.state == RfState::TxTransmit {
            let total = inner.transmit_list[index].len as usize;
            let mut to_load = total - inner.message_bytes_sent;
            let in_fifo = inner.radio.tx_fifo_level() as usize;
            if to_load + in_fifo > RADIO_FIFO_MAX_SIZE {
                to_load = RADIO_FIFO_MAX_SIZE - in_fifo;
            }

            let sent = inner.message_bytes_sent;
            let chunk = &inner.transmit_list[index].data[sent..sent + to_load];
            inner.radio.write_tx_fifo(chunk);
            inner.message_bytes_sent += to_load;

            if inner.message_bytes_sent >= total {
                inner.state = RfState::TxLastTransmit;
                inner.radio.irq_on_tx_underflow();
            }
        } else {
            // TX FIFO underflow: the last byte left the air. Release the
            // entry and hand the radio back to reception.
            inner.transmit_list[index].start_time_us = 0;
            inner.next_transmit_index = None;

            Self::restart_reception_inner(inner);
            Self::schedule_next(inner, now_us);
        }
    }

    fn transmit_callback(inner: &mut Inner<R, T>, now_us: u64) {
        let Some(index) = inner.next_transmit_index else {
            Self::restart_reception_inner(inner);
            return;
        };

        let start_time_us = inner.transmit_list[index].start_time_us;
        if now_us < start_time_us {
            // The hardware timer fired early (bounded period); re-arm for
            // the remainder without entering transmission.
            Self::schedule_next(inner, now_us);
            return;
        }

        match inner.transmit_list[index].action {
            PowerAction::LowPower => {
                inner.transmit_list[index].start_time_us = 0;
                inner.next_transmit_index = None;
                inner.radio.low_power();
                inner.state = RfState::RxWaitSync;
                Self::schedule_next(inner, now_us);
            }
            PowerAction::ActivePower => {
                inner.transmit_list[index].start_time_us = 0;
                inner.next_transmit_index = None;
                inner.radio.active_power();
                Self::schedule_next(inner, now_us);
                Self::restart_reception_inner(inner);
            }
            PowerAction::None => {
                if inner.state == RfState::RxWaitSync {
                    inner.state = RfState::TxTransmit;

                    // Reconfigure for transmission and start as soon as the
                    // first preamble byte is loaded to minimize latency.
                    inner.radio.set_idle();
                    inner.radio.irq_on_tx_fifo_threshold();
                    inner.radio.set_sync_detection(false);
                    inner.radio.flush_tx_fifo();
                    inner.radio.write_tx_fifo(&PREAMBLE_AND_SYNC[..1]);
                    inner.radio.set_tx();
                    inner.radio.write_tx_fifo(&PREAMBLE_AND_SYNC[1..]);

                    inner.message_bytes_sent = 0;
                } else {
                    // Mid-reception: skip this transmission; it will expire
                    // as stale on the next scheduling pass.
                    Self::schedule_next(inner, now_us);
                }
            }
        }
    }

    /// Arm the one-shot timer for the earliest pending entry, expiring
    /// stale ones. Idempotent with respect to the list state; at most one
    /// transmission is armed at any instant.
    fn schedule_next(inner: &mut Inner<R, T>, now_us: u64) {
        if inner.state == RfState::TxTransmit || inner.state == RfState::TxLastTransmit {
            // A transmission is streaming from the list right now; the
            // underflow handler reschedules once it completes.
            return;
        }

        loop {
            let candidate = inner
                .transmit_list
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.start_time_us != 0)
                .min_by_key(|(_, entry)| entry.start_time_us)
                .map(|(index, _)| index);

            let Some(index) = candidate else {
                inner.timer.stop();
                return;
            };

            let delay = inner.transmit_list[index].start_time_us as i64 - now_us as i64;
            if delay <= 0 || delay > TRANSMIT_HORIZON_US {
                // Already in the past, or garbage: drop and try the next.
                inner.transmit_list[index].start_time_us = 0;
                continue;
            }

            inner.next_transmit_index = Some(index);
            inner.timer.arm(delay as u32);
            return;
        }
    }
}
