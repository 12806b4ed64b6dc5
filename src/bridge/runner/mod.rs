//! Foreground glue task: the single cooperative loop of the bridge.
//!
//! The firmware provides pre-allocated [`embassy_sync::channel::Channel`]
//! instances for the UART character streams and the compass samples, plus
//! the shared frame FIFO filled by the RF driver. The runner drains all of
//! them, drives the slave device and the NMEA emitters, and hands transmit
//! batches to the RF driver. ISR contexts never suspend; all waiting
//! happens here.
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Ticker};
use futures_util::future::{select, Either};
use futures_util::pin_mut;

use crate::bridge::{DataBridge, NmeaSink};
use crate::core::{DeviceConfig, LinkId, NavigationData};
use crate::infra::fifo::MessageFifo;
use crate::protocol::rf::traits::monotonic::Monotonic;
use crate::protocol::rf::traits::transceiver::RfTransceiver;
use crate::protocol::rf::traits::tx_timer::TxTimer;
use crate::protocol::rf::RfDriver;
use crate::protocol::slave::{SlaveDevice, TransmitBatch};

/// Capacity of one UART character channel.
pub const NMEA_CHAR_QUEUE_SIZE: usize = 64;

/// Capacity of the compass sample channel.
pub const COMPASS_QUEUE_SIZE: usize = 4;

/// Housekeeping cadence: emitter polling and validity expiry.
const TICK_PERIOD_MS: u64 = 100;

/// Channel of raw UART characters.
pub type CharChannel = Channel<CriticalSectionRawMutex, u8, NMEA_CHAR_QUEUE_SIZE>;

/// Channel of tilt-compensated compass samples.
pub type CompassChannel = Channel<CriticalSectionRawMutex, CompassSample, COMPASS_QUEUE_SIZE>;

/// One heading/roll sample from the external compass module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompassSample {
    pub heading_deg: f32,
    pub roll_deg: f32,
}

/// The foreground loop. Owns the navigation data set; every other
/// component receives it explicitly.
pub struct BridgeRunner<'a, R, T, C, W, const N: usize>
where
    R: RfTransceiver,
    T: TxTimer,
    C: Monotonic,
    W: NmeaSink,
{
    rf: &'a RfDriver<'a, R, T, C, N>,
    rx_fifo: &'a MessageFifo<N>,
    clock: &'a C,
    slave: SlaveDevice,
    bridge: DataBridge,
    nav: NavigationData,
    plotter_chars: Option<&'a CharChannel>,
    gnss_chars: Option<&'a CharChannel>,
    ais_chars: Option<&'a CharChannel>,
    compass_samples: Option<&'a CompassChannel>,
    sink: W,
    /// Invoked when a decoded parameter write changed the calibration;
    /// the firmware persists the new values.
    calibration_hook: Option<fn(&NavigationData)>,
}

impl<'a, R, T, C, W, const N: usize> BridgeRunner<'a, R, T, C, W, N>
where
    R: RfTransceiver,
    T: TxTimer,
    C: Monotonic,
    W: NmeaSink,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &DeviceConfig,
        rf: &'a RfDriver<'a, R, T, C, N>,
        rx_fifo: &'a MessageFifo<N>,
        clock: &'a C,
        slave: SlaveDevice,
        plotter_chars: Option<&'a CharChannel>,
        gnss_chars: Option<&'a CharChannel>,
        ais_chars: Option<&'a CharChannel>,
        compass_samples: Option<&'a CompassChannel>,
        sink: W,
        calibration_hook: Option<fn(&NavigationData)>,
    ) -> Self {
        let mut nav = NavigationData::new();
        nav.load_calibration(config);

        Self {
            rf,
            rx_fifo,
            clock,
            slave,
            bridge: DataBridge::new(config),
            nav,
            plotter_chars,
            gnss_chars,
            ais_chars,
            compass_samples,
            sink,
            calibration_hook,
        }
    }

    /// Drive the bridge forever. Between iterations the task sleeps until
    /// the next housekeeping tick, waking early for incoming NMEA
    /// characters.
    pub async fn drive(mut self) -> ! {
        let mut ticker = Ticker::every(Duration::from_millis(TICK_PERIOD_MS));

        loop {
            let now_us = self.clock.now_us();
            let now_ms = (now_us / 1000) as u32;

            self.drain_inputs(now_ms);
            self.process_frames(now_us, now_ms);

            self.nav.update_validity(now_ms);
            self.bridge
                .send_updated_sentences(&self.nav, &mut self.sink, now_ms);

            self.wait_for_work(&mut ticker).await;
        }
    }

    /// Pull everything currently queued on the character and compass
    /// channels.
    fn drain_inputs(&mut self, now_ms: u32) {
        for (channel, link) in [
            (self.plotter_chars, LinkId::Plotter),
            (self.gnss_chars, LinkId::Gnss),
            (self.ais_chars, LinkId::Ais),
        ] {
            if let Some(channel) = channel {
                while let Ok(c) = channel.try_receive() {
                    self.bridge
                        .push_nmea_char(c, link, &mut self.nav, &mut self.sink, now_ms);
                }
            }
        }

        if let Some(channel) = self.compass_samples {
            while let Ok(sample) = channel.try_receive() {
                self.bridge.update_compass(
                    sample.heading_deg,
                    sample.roll_deg,
                    &mut self.nav,
                    &mut self.sink,
                    now_ms,
                );
            }
        }
    }

    /// Drain the frame FIFO through the slave device and hand its
    /// transmit decisions to the RF driver.
    fn process_frames(&mut self, now_us: u64, now_ms: u32) {
        let mut batch = TransmitBatch::new();

        while let Some(frame) = self.rx_fifo.pop() {
            self.slave
                .process_message(&frame, &mut self.nav, now_us, now_ms, &mut batch);
            self.flush_batch(&mut batch);

            if self.nav.calibration_updated {
                if let Some(hook) = self.calibration_hook {
                    hook(&self.nav);
                }
                self.nav.calibration_updated = false;
            }
        }

        self.slave.poll_network(now_us, &mut batch);
        self.flush_batch(&mut batch);
    }

    fn flush_batch(&mut self, batch: &mut TransmitBatch) {
        for entry in batch.iter() {
            // A full transmit list already logged the drop.
            let _ = self.rf.transmit(entry);
        }
        batch.clear();
    }

    /// Sleep until the next tick, or until a character arrives on one of
    /// the NMEA inputs.
    async fn wait_for_work(&mut self, ticker: &mut Ticker) {
        let now_ms = (self.clock.now_us() / 1000) as u32;
        let tick = ticker.next();
        pin_mut!(tick);

        match (self.plotter_chars, self.gnss_chars) {
            (Some(plotter), Some(gnss)) => {
                let plotter_char = plotter.receive();
                let gnss_char = gnss.receive();
                pin_mut!(plotter_char);
                pin_mut!(gnss_char);
                let chars = select(plotter_char, gnss_char);
                pin_mut!(chars);
                match select(tick, chars).await {
                    Either::Left(((), _)) => {}
                    Either::Right((Either::Left((c, _)), _)) => {
                        self.bridge
                            .push_nmea_char(c, LinkId::Plotter, &mut self.nav, &mut self.sink, now_ms);
                    }
                    Either::Right((Either::Right((c, _)), _)) => {
                        self.bridge
                            .push_nmea_char(c, LinkId::Gnss, &mut self.nav, &mut self.sink, now_ms);
                    }
                }
            }
            (Some(plotter), None) => {
                let chars = plotter.receive();
                pin_mut!(chars);
                match select(tick, chars).await {
                    Either::Left(((), _)) => {}
                    Either::Right((c, _)) => {
                        self.bridge
                            .push_nmea_char(c, LinkId::Plotter, &mut self.nav, &mut self.sink, now_ms);
                    }
                }
            }
            (None, Some(gnss)) => {
                let chars = gnss.receive();
                pin_mut!(chars);
                match select(tick, chars).await {
                    Either::Left(((), _)) => {}
                    Either::Right((c, _)) => {
                        self.bridge
                            .push_nmea_char(c, LinkId::Gnss, &mut self.nav, &mut self.sink, now_ms);
                    }
                }
            }
            (None, None) => tick.await,
        }
    }
}
