//! Minimal abstraction of a half-duplex sub-GHz FSK transceiver. This is
//! the only coupling between the core and the radio chip; register-level
//! programming stays in the implementation.

/// Receive filter bandwidth selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RfBandwidth {
    /// Narrow filter (~95 kHz), used once frequency tracking has locked.
    Low,
    /// Medium filter (~125 kHz).
    Medium,
    /// Wide filter (~250 kHz), tolerant to crystal offsets.
    High,
}

/// Contract the RF driver requires from the radio chip.
///
/// All methods are called with interrupts masked and must not block. The
/// driver relies on the chip accepting a new fixed packet length *during*
/// reception; implementations for chips without this feature must emulate
/// it by capturing up to the maximum frame length and letting the driver's
/// length-consistency check reject the excess.
pub trait RfTransceiver {
    /// Probe chip presence; checked once at driver construction.
    fn is_connected(&mut self) -> bool;

    /// Enter idle state (neither receiving nor transmitting).
    fn set_idle(&mut self);
    /// Start receiving.
    fn set_rx(&mut self);
    /// Start transmitting whatever the TX FIFO holds.
    fn set_tx(&mut self);

    fn flush_rx_fifo(&mut self);
    fn flush_tx_fifo(&mut self);
    /// Number of unread bytes pending in the RX FIFO.
    fn rx_fifo_level(&mut self) -> u8;
    /// Number of bytes waiting in the TX FIFO.
    fn tx_fifo_level(&mut self) -> u8;
    /// Drain `buffer.len()` bytes from the RX FIFO.
    fn read_rx_fifo(&mut self, buffer: &mut [u8]);
    /// Append bytes to the TX FIFO.
    fn write_tx_fifo(&mut self, data: &[u8]);

    /// Reconfigure the fixed packet length; legal while a packet is being
    /// received.
    fn set_packet_length(&mut self, length: u8);
    /// Enable or disable sync-word detection in RX.
    fn set_sync_detection(&mut self, enabled: bool);

    /// Route the chip IRQ line to "RX FIFO above threshold" (also fires on
    /// sync-word detection when the FIFO fills).
    fn irq_on_rx_fifo_threshold(&mut self);
    /// Route the chip IRQ line to "TX FIFO below threshold".
    fn irq_on_tx_fifo_threshold(&mut self);
    /// Route the chip IRQ line to "TX FIFO underflow".
    fn irq_on_tx_underflow(&mut self);

    /// RSSI captured at the most recent sync-word detection, in dBm.
    fn rssi_dbm(&mut self) -> i16;

    fn set_bandwidth(&mut self, bandwidth: RfBandwidth);
    /// Tune the synthesizer, in MHz. Any configured trim is already folded
    /// in by the driver.
    fn set_frequency_mhz(&mut self, frequency_mhz: f32);
    /// Latch the hardware frequency-offset estimate of the last reception
    /// so subsequent RX/TX are implicitly corrected.
    fn latch_frequency_offset(&mut self);

    /// Enter low-power sleep between network cycles.
    fn low_power(&mut self);
    /// Leave low-power sleep; the PLL needs about a millisecond to relock.
    fn active_power(&mut self);
}
