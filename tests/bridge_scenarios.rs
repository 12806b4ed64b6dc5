//! End-to-end DataBridge scenarios: GNSS sentences in, Micronet-backed
//! sentences out, smoothing and validity expiry in between.
use micronet_bridge::bridge::nmea::verify_checksum;
use micronet_bridge::bridge::{DataBridge, NmeaSink};
use micronet_bridge::core::{DeviceConfig, LinkId, NavigationData};

#[derive(Default)]
struct SinkLog {
    sentences: Vec<String>,
}

impl NmeaSink for SinkLog {
    fn send_sentence(&mut self, sentence: &str) {
        self.sentences.push(sentence.to_string());
    }
}

fn push_line(
    bridge: &mut DataBridge,
    line: &str,
    link: LinkId,
    nav: &mut NavigationData,
    out: &mut SinkLog,
    now_ms: u32,
) {
    for c in line.bytes() {
        bridge.push_nmea_char(c, link, nav, out, now_ms);
    }
}

#[test]
fn rmc_round_trip_through_the_bridge() {
    let mut bridge = DataBridge::new(&DeviceConfig::default());
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n",
        LinkId::Gnss,
        &mut nav,
        &mut out,
        8000,
    );

    assert_eq!((nav.time.hour, nav.time.minute), (12, 35));
    assert_eq!((nav.date.day, nav.date.month, nav.date.year), (23, 3, 94));
    assert!((nav.latitude_deg.value - 48.1173).abs() < 1e-3);
    assert!((nav.longitude_deg.value - 11.5166).abs() < 1e-3);
    assert!((nav.sog_kt.value - 22.4).abs() < 1e-3);
    assert!((nav.cog_deg.value - 84.4).abs() < 1e-3);
    for value in [
        &nav.latitude_deg,
        &nav.longitude_deg,
        &nav.sog_kt,
        &nav.cog_deg,
    ] {
        assert!(value.valid);
        assert_eq!(value.timestamp_ms, 8000);
    }

    // The GNSS sentence is passed through to the plotter.
    assert_eq!(out.sentences.len(), 1);
    assert!(verify_checksum(out.sentences[0].as_bytes()).is_ok());
}

#[test]
fn cog_filter_averages_across_north() {
    let mut config = DeviceConfig::default();
    config.sog_cog_filter_enable = true;
    config.sog_cog_filter_length = 4;
    let mut bridge = DataBridge::new(&config);
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    for line in [
        "$GPRMC,123519,A,4807.038,N,01131.000,E,006.0,355.0,230394,003.1,W*63\r\n",
        "$GPRMC,123519,A,4807.038,N,01131.000,E,006.0,002.0,230394,003.1,W*62\r\n",
        "$GPRMC,123519,A,4807.038,N,01131.000,E,006.0,358.0,230394,003.1,W*6E\r\n",
        "$GPRMC,123519,A,4807.038,N,01131.000,E,006.0,005.0,230394,003.1,W*65\r\n",
    ] {
        push_line(&mut bridge, line, LinkId::Gnss, &mut nav, &mut out, 8000);
    }

    // Samples {355, 2, 358, 5} straddle north: the circular mean is about
    // 0 degrees, not 180.
    let filtered = nav.cog_deg.value;
    assert!(
        filtered >= 359.5 || filtered <= 0.5,
        "filtered COG collapsed to {filtered}"
    );
}

#[test]
fn navigation_values_expire_after_three_seconds() {
    let mut nav = NavigationData::new();
    nav.dpt_m.set(7.5, 10_000);
    nav.sog_kt.set(6.0, 10_000);

    nav.update_validity(13_000);
    assert!(nav.dpt_m.valid);

    nav.update_validity(13_001);
    assert!(!nav.dpt_m.valid);
    assert!(!nav.sog_kt.valid);
}

#[test]
fn expiry_survives_millisecond_counter_wrap() {
    let mut nav = NavigationData::new();

    // Stamped just before the u32 millisecond counter wraps.
    nav.dpt_m.set(7.5, u32::MAX - 1000);

    nav.update_validity(500); // 1501 ms later, wrapped
    assert!(nav.dpt_m.valid);

    nav.update_validity(2001); // 3002 ms later, wrapped
    assert!(!nav.dpt_m.valid);
}
