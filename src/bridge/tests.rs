//! DataBridge decode/route/emit tests.
use super::*;

#[derive(Default)]
struct SinkLog {
    sentences: heapless::Vec<heapless::String<NMEA_SENTENCE_MAX_LENGTH>, 16>,
}

impl NmeaSink for SinkLog {
    fn send_sentence(&mut self, sentence: &str) {
        let mut owned = heapless::String::new();
        owned.push_str(sentence).ok();
        self.sentences.push(owned).ok();
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

fn default_bridge() -> DataBridge {
    DataBridge::new(&DeviceConfig::default())
}

#[test]
fn rmc_updates_time_date_position_and_ground_vector() {
    let mut bridge = default_bridge();
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n",
        LinkId::Gnss,
        &mut nav,
        &mut out,
        5000,
    );

    assert!(nav.time.valid);
    assert_eq!((nav.time.hour, nav.time.minute), (12, 35));
    assert!(nav.date.valid);
    assert_eq!((nav.date.day, nav.date.month, nav.date.year), (23, 3, 94));
    assert!((nav.latitude_deg.value - 48.1173).abs() < 1e-3);
    assert!((nav.longitude_deg.value - 11.5166).abs() < 1e-3);
    assert!((nav.sog_kt.value - 22.4).abs() < 1e-3);
    assert!((nav.cog_deg.value - 84.4).abs() < 1e-3);
    assert_eq!(nav.sog_kt.timestamp_ms, 5000);

    // GNSS traffic is forwarded to the plotter.
    assert_eq!(out.sentences.len(), 1);
    assert!(out.sentences[0].starts_with("$GPRMC"));
}

#[test]
fn sentences_from_an_unrouted_link_are_ignored() {
    let mut bridge = default_bridge();
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    // GNSS data arriving on the plotter port must not update anything:
    // the position is routed to the GNSS link.
    push_line(
        &mut bridge,
        "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n",
        LinkId::Plotter,
        &mut nav,
        &mut out,
        5000,
    );

    assert!(!nav.latitude_deg.valid);
    assert!(out.sentences.is_empty());
}

#[test]
fn bad_checksum_is_dropped() {
    let mut bridge = default_bridge();
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6B\r\n",
        LinkId::Gnss,
        &mut nav,
        &mut out,
        5000,
    );

    assert!(!nav.time.valid);
    assert!(out.sentences.is_empty());
}

#[test]
fn gll_south_west_signs() {
    let mut bridge = default_bridge();
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "$GPGLL,4916.45,S,12311.12,W,225444,A,*00\r\n",
        LinkId::Gnss,
        &mut nav,
        &mut out,
        5000,
    );

    assert!(nav.latitude_deg.value < 0.0);
    assert!(nav.longitude_deg.value < 0.0);
    assert!((nav.latitude_deg.value + 49.274_17).abs() < 1e-3);
}

#[test]
fn mwv_relative_wind_in_meters_per_second() {
    let mut bridge = default_bridge();
    let mut config = DeviceConfig::default();
    config.wind_source = LinkId::Plotter;
    let mut bridge_wind = DataBridge::new(&config);
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    // Default routing reads wind from Micronet: the sentence is ignored.
    push_line(
        &mut bridge,
        "$WIMWV,214.8,R,5.1,M,A*2B\r\n",
        LinkId::Plotter,
        &mut nav,
        &mut out,
        5000,
    );
    assert!(!nav.aws_kt.valid);

    // Routed to the plotter link, it lands.
    push_line(
        &mut bridge_wind,
        "$WIMWV,214.8,R,5.1,M,A*2B\r\n",
        LinkId::Plotter,
        &mut nav,
        &mut out,
        5000,
    );
    assert!(nav.aws_kt.valid);
    assert!((nav.aws_kt.value - 5.1 * 1.943_844).abs() < 1e-3);
    // 214.8 wraps into (-180, 180].
    assert!((nav.awa_deg.value + 145.2).abs() < 1e-3);
}

#[test]
fn true_wind_mwv_is_ignored() {
    let mut config = DeviceConfig::default();
    config.wind_source = LinkId::Plotter;
    let mut bridge = DataBridge::new(&config);
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "$WIMWV,214.8,T,5.1,M,A*2D\r\n",
        LinkId::Plotter,
        &mut nav,
        &mut out,
        5000,
    );

    assert!(!nav.aws_kt.valid);
}

#[test]
fn dpt_sums_transducer_depth_and_offset() {
    let mut config = DeviceConfig::default();
    config.depth_source = LinkId::Plotter;
    let mut bridge = DataBridge::new(&config);
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "$SDDPT,12.3,0.4*63\r\n",
        LinkId::Plotter,
        &mut nav,
        &mut out,
        5000,
    );

    assert!(nav.dpt_m.valid);
    assert!((nav.dpt_m.value - 12.7).abs() < 1e-3);
}

#[test]
fn vtg_modern_layout() {
    let mut bridge = default_bridge();
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "$GPVTG,084.4,T,077.8,M,022.4,N,041.5,K*4A\r\n",
        LinkId::Gnss,
        &mut nav,
        &mut out,
        5000,
    );

    assert!((nav.cog_deg.value - 84.4).abs() < 1e-3);
    assert!((nav.sog_kt.value - 22.4).abs() < 1e-3);
}

#[test]
fn vtg_legacy_layout_without_unit_letters() {
    let mut bridge = default_bridge();
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "$GPVTG,084.4,077.8,022.4,041.5*56\r\n",
        LinkId::Gnss,
        &mut nav,
        &mut out,
        5000,
    );

    assert!((nav.cog_deg.value - 84.4).abs() < 1e-3);
    assert!((nav.sog_kt.value - 22.4).abs() < 1e-3);
}

#[test]
fn gga_updates_position_only() {
    let mut bridge = default_bridge();
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n",
        LinkId::Gnss,
        &mut nav,
        &mut out,
        5000,
    );

    assert!((nav.latitude_deg.value - 48.1173).abs() < 1e-3);
    assert!((nav.longitude_deg.value - 11.5166).abs() < 1e-3);
    assert!(!nav.sog_kt.valid);
    assert!(!nav.time.valid);
}

#[test]
fn vhw_magnetic_heading_and_water_speed() {
    let mut config = DeviceConfig::default();
    config.speed_source = LinkId::Plotter;
    let mut bridge = DataBridge::new(&config);
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "$IIVHW,85.1,T,84.0,M,6.1,N,11.3,K*61\r\n",
        LinkId::Plotter,
        &mut nav,
        &mut out,
        5000,
    );

    assert!((nav.mag_hdg_deg.value - 84.0).abs() < 1e-3);
    assert!((nav.stw_kt.value - 6.1).abs() < 1e-3);
}

#[test]
fn hdg_heading_is_normalized() {
    let mut config = DeviceConfig::default();
    config.compass_source = LinkId::Plotter;
    let mut bridge = DataBridge::new(&config);
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "$HCHDG,271.1,,,10.7,W*08\r\n",
        LinkId::Plotter,
        &mut nav,
        &mut out,
        5000,
    );

    assert!((nav.mag_hdg_deg.value - 271.1).abs() < 1e-3);
}

#[test]
fn rmb_decodes_waypoint_steering() {
    let mut config = DeviceConfig::default();
    config.nav_source = LinkId::Plotter;
    let mut bridge = DataBridge::new(&config);
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "$GPRMB,A,0.66,L,003,004,4917.24,N,12309.57,W,001.3,052.5,000.5,V*20\r\n",
        LinkId::Plotter,
        &mut nav,
        &mut out,
        5000,
    );

    assert!(nav.xte_nm.valid);
    // Steer left: cross-track error keeps its positive sign.
    assert!((nav.xte_nm.value - 0.66).abs() < 1e-3);
    assert!(nav.waypoint.valid);
    assert_eq!(&nav.waypoint.name[..3], b"004");
    assert_eq!(nav.waypoint.name_length, 3);
    assert!((nav.dtw_nm.value - 1.3).abs() < 1e-3);
    assert!((nav.btw_deg.value - 52.5).abs() < 1e-3);
    assert!((nav.vmgwp_kt.value - 0.5).abs() < 1e-3);
}

#[test]
fn inverted_rmb_workaround_reads_the_from_waypoint() {
    let mut config = DeviceConfig::default();
    config.nav_source = LinkId::Plotter;
    config.inverted_rmb = true;
    let mut bridge = DataBridge::new(&config);
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "$GPRMB,A,0.66,L,003,004,4917.24,N,12309.57,W,001.3,052.5,000.5,V*20\r\n",
        LinkId::Plotter,
        &mut nav,
        &mut out,
        5000,
    );

    assert_eq!(&nav.waypoint.name[..3], b"003");
}

#[test]
fn ais_traffic_is_forwarded_verbatim() {
    let mut bridge = default_bridge();
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "!AIVDM,1,1,,A,14eG;o@034o8sd<L9i:a;WF>062D,0*7D\r\n",
        LinkId::Ais,
        &mut nav,
        &mut out,
        5000,
    );

    assert_eq!(out.sentences.len(), 1);
    assert!(out.sentences[0].starts_with("!AIVDM"));
}

#[test]
fn spd_emulation_copies_filtered_sog_into_stw() {
    let mut config = DeviceConfig::default();
    config.spd_emulation = true;
    let mut bridge = DataBridge::new(&config);
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    push_line(
        &mut bridge,
        "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n",
        LinkId::Gnss,
        &mut nav,
        &mut out,
        5000,
    );

    assert!(nav.stw_kt.valid);
    assert_eq!(nav.stw_kt.value, nav.sog_kt.value);
}

#[test]
fn emitters_fire_once_per_period() {
    let mut bridge = default_bridge();
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    nav.dpt_m.set(12.3, 5000);
    bridge.send_updated_sentences(&nav, &mut out, 5000);
    assert_eq!(out.sentences.len(), 1);
    assert!(out.sentences[0].starts_with("$INDPT,12.3,"));

    // Fresh data 200 ms later: still inside the rate limit window.
    nav.dpt_m.set(12.5, 5200);
    bridge.send_updated_sentences(&nav, &mut out, 5200);
    assert_eq!(out.sentences.len(), 1);

    // Past the window, the emitter fires again.
    nav.dpt_m.set(12.5, 6200);
    bridge.send_updated_sentences(&nav, &mut out, 6200);
    assert_eq!(out.sentences.len(), 2);
}

#[test]
fn stale_data_is_not_emitted() {
    let mut bridge = default_bridge();
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    nav.stp_degc.set(18.5, 2000);
    bridge.send_updated_sentences(&nav, &mut out, 2000);
    assert_eq!(out.sentences.len(), 1);

    // No refresh: nothing further to say.
    bridge.send_updated_sentences(&nav, &mut out, 9000);
    assert_eq!(out.sentences.len(), 1);
}

#[test]
fn emitted_sentences_carry_valid_checksums() {
    let mut bridge = default_bridge();
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    nav.awa_deg.set(-35.0, 5000);
    nav.aws_kt.set(14.2, 5000);
    nav.twa_deg.set(-42.0, 5000);
    nav.tws_kt.set(16.0, 5000);
    nav.dpt_m.set(8.0, 5000);
    nav.stp_degc.set(18.5, 5000);
    nav.log_nm.set(1234.5, 5000);
    nav.trip_nm.set(12.3, 5000);
    nav.stw_kt.set(6.1, 5000);
    nav.mag_hdg_deg.set(123.0, 5000);
    nav.vcc_v.set(12.6, 5000);
    bridge.send_updated_sentences(&nav, &mut out, 5000);

    assert!(out.sentences.len() >= 7);
    for sentence in &out.sentences {
        assert!(
            nmea::verify_checksum(sentence.as_bytes()).is_ok(),
            "bad checksum on {sentence}"
        );
    }
}

#[test]
fn compass_updates_emit_heading_and_roll() {
    let mut config = DeviceConfig::default();
    config.compass_source = LinkId::Compass;
    let mut bridge = DataBridge::new(&config);
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    bridge.update_compass(-10.0, 3.0, &mut nav, &mut out, 5000);

    assert!(nav.mag_hdg_deg.valid);
    assert!((nav.mag_hdg_deg.value - 350.0).abs() < 1e-3);
    assert!(nav.roll_deg.valid);
    assert_eq!(out.sentences.len(), 2);
    assert!(out.sentences[0].starts_with("$INHDG,350.0"));
    assert!(out.sentences[1].starts_with("$INXDR,A,3,D,ROLL"));
}

#[test]
fn compass_samples_are_ignored_when_not_routed_to_the_sensor() {
    let mut bridge = default_bridge();
    let mut nav = NavigationData::new();
    let mut out = SinkLog::default();

    bridge.update_compass(100.0, 0.0, &mut nav, &mut out, 5000);

    assert!(!nav.mag_hdg_deg.valid);
    assert!(out.sentences.is_empty());
}
