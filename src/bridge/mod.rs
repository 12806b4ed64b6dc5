//! NMEA0183 side of the bridge: routing of decoded sentences into the
//! navigation data set, and rate-limited sentence emission toward the
//! chart plotter.
use core::fmt::Write as _;

use heapless::String;

use crate::core::{DeviceConfig, LinkId, NavigationData, WAYPOINT_NAME_LENGTH};
use crate::protocol::codec;

pub mod filter;
pub mod nmea;
pub mod runner;

use filter::SogCogFilter;
use nmea::{
    append_checksum, fields, parse_2digits, parse_coordinate, parse_f32, sanitize_waypoint_char,
    sentence_id, verify_checksum, Sentence, SentenceBuffer, SentenceId, NMEA_SENTENCE_MAX_LENGTH,
};

/// Minimum spacing between two emissions of the same sentence type.
pub const NMEA_SENTENCE_MIN_PERIOD_MS: u32 = 1000;

/// Output port toward the chart plotter. The implementation appends the
/// line terminator.
pub trait NmeaSink {
    fn send_sentence(&mut self, sentence: &str);
}

/// Last emission time of each generated sentence type.
#[derive(Debug, Default, Clone, Copy)]
struct EmissionTimestamps {
    mwv_r: u32,
    mwv_t: u32,
    dpt: u32,
    mtw: u32,
    vlw: u32,
    vhw: u32,
    hdg: u32,
    vcc: u32,
    roll: u32,
}

/// The data bridge: owns the per-input sentence reassemblers, the SOG/COG
/// filter, and the emission rate limits. Navigation data and the plotter
/// output are passed in explicitly.
pub struct DataBridge {
    plotter_buffer: SentenceBuffer,
    gnss_buffer: SentenceBuffer,
    ais_buffer: SentenceBuffer,
    timestamps: EmissionTimestamps,
    filter: SogCogFilter,
    config: DeviceConfig,
}

impl DataBridge {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            plotter_buffer: SentenceBuffer::new(),
            gnss_buffer: SentenceBuffer::new(),
            ais_buffer: SentenceBuffer::new(),
            timestamps: EmissionTimestamps::default(),
            filter: SogCogFilter::new(config.sog_cog_filter_enable, config.sog_cog_filter_length),
            config: config.clone(),
        }
    }

    //==================================================================================Input

    /// Feed one character received on `source_link`. Complete, valid
    /// sentences are decoded when their datum class is routed to that
    /// link; GNSS traffic and unknown AIS sentences are forwarded to the
    /// plotter output.
    pub fn push_nmea_char<W: NmeaSink>(
        &mut self,
        c: u8,
        source_link: LinkId,
        nav: &mut NavigationData,
        out: &mut W,
        now_ms: u32,
    ) {
        let buffer = match source_link {
            LinkId::Plotter => &mut self.plotter_buffer,
            LinkId::Gnss => &mut self.gnss_buffer,
            LinkId::Ais => &mut self.ais_buffer,
            _ => return,
        };

        let Some(sentence) = buffer.push_char(c) else {
            return;
        };
        if verify_checksum(&sentence).is_err() {
            log::debug!("dropped NMEA sentence with bad checksum");
            return;
        }

        match sentence_id(&sentence) {
            SentenceId::Rmb => {
                if source_link == self.config.nav_source {
                    self.decode_rmb(&sentence, nav, now_ms);
                }
            }
            SentenceId::Rmc => {
                if source_link == self.config.gnss_source {
                    self.decode_rmc(&sentence, nav, now_ms);
                    Self::forward(&sentence, source_link, out);
                }
            }
            SentenceId::Gga => {
                if source_link == self.config.gnss_source {
                    self.decode_gga(&sentence, nav, now_ms);
                    Self::forward(&sentence, source_link, out);
                }
            }
            SentenceId::Gll => {
                if source_link == self.config.gnss_source {
                    self.decode_gll(&sentence, nav, now_ms);
                    Self::forward(&sentence, source_link, out);
                }
            }
            SentenceId::Vtg => {
                if source_link == self.config.gnss_source {
                    self.decode_vtg(&sentence, nav, now_ms);
                    Self::forward(&sentence, source_link, out);
                }
            }
            SentenceId::Mwv => {
                if source_link == self.config.wind_source {
                    self.decode_mwv(&sentence, nav, now_ms);
                }
            }
            SentenceId::Dpt => {
                if source_link == self.config.depth_source {
                    self.decode_dpt(&sentence, nav, now_ms);
                }
            }
            SentenceId::Vhw => {
                if source_link == self.config.speed_source {
                    self.decode_vhw(&sentence, nav, now_ms);
                }
            }
            SentenceId::Hdg => {
                if source_link == self.config.compass_source {
                    self.decode_hdg(&sentence, nav, now_ms);
                }
            }
            SentenceId::Unknown => {
                // AIS traffic (AIVDM/AIVDO, alerts) goes to the plotter
                // verbatim.
                if source_link == LinkId::Ais {
                    Self::forward(&sentence, source_link, out);
                }
            }
        }
    }

    fn forward<W: NmeaSink>(sentence: &Sentence, source_link: LinkId, out: &mut W) {
        if source_link == LinkId::Plotter {
            return;
        }
        if let Ok(text) = core::str::from_utf8(sentence) {
            out.send_sentence(text);
        }
    }

    /// Feed a heading/roll sample from the internal compass. Ignored
    /// unless the compass source is routed to the internal sensor.
    pub fn update_compass<W: NmeaSink>(
        &mut self,
        heading_deg: f32,
        roll_deg: f32,
        nav: &mut NavigationData,
        out: &mut W,
        now_ms: u32,
    ) {
        if self.config.compass_source != LinkId::Compass {
            return;
        }

        let mut heading = heading_deg;
        while heading < 0.0 {
            heading += 360.0;
        }
        while heading >= 360.0 {
            heading -= 360.0;
        }
        let mut roll = roll_deg;
        while roll < 0.0 {
            roll += 360.0;
        }
        while roll >= 360.0 {
            roll -= 360.0;
        }

        nav.mag_hdg_deg.set(heading, now_ms);
        nav.roll_deg.set(roll, now_ms);
        self.emit_hdg(nav, out, now_ms);
        self.emit_roll_xdr(nav, out, now_ms);
    }

    //==================================================================================Decoders

    fn decode_rmb(&mut self, sentence: &Sentence, nav: &mut NavigationData, now_ms: u32) {
        let body = fields(&sentence[7..]);
        if body.first() != Some(&&b"A"[..]) {
            return;
        }

        if let Some(value) = body.get(1).and_then(|f| parse_f32(f)) {
            let signed = if body.get(2) == Some(&&b"R"[..]) {
                -value
            } else {
                value
            };
            nav.xte_nm.set(signed, now_ms);
        }

        // Target waypoint is the TO field; some chartplotters swap FROM
        // and TO, hence the opt-in workaround.
        let waypoint_field = if self.config.inverted_rmb { 3 } else { 4 };
        if let Some(name) = body.get(waypoint_field) {
            if !name.is_empty() {
                nav.waypoint.name = [b' '; WAYPOINT_NAME_LENGTH];
                let length = name.len().min(WAYPOINT_NAME_LENGTH);
                for (index, c) in name[..length].iter().enumerate() {
                    nav.waypoint.name[index] = sanitize_waypoint_char(*c);
                }
                nav.waypoint.name_length = length as u8;
                nav.waypoint.valid = true;
                nav.waypoint.timestamp_ms = now_ms;
            }
        }

        if let Some(value) = body.get(9).and_then(|f| parse_f32(f)) {
            nav.dtw_nm.set(value, now_ms);
        }
        if let Some(value) = body.get(10).and_then(|f| parse_f32(f)) {
            nav.btw_deg.set(value, now_ms);
        }
        if let Some(value) = body.get(11).and_then(|f| parse_f32(f)) {
            nav.vmgwp_kt.set(value, now_ms);
        }
    }

    fn decode_rmc(&mut self, sentence: &Sentence, nav: &mut NavigationData, now_ms: u32) {
        let body = fields(&sentence[7..]);

        if let Some(time) = body.first() {
            if let (Some(hour), Some(minute)) = (parse_2digits(time, 0), parse_2digits(time, 2)) {
                nav.time.set(hour, minute, now_ms);
            }
        }

        self.decode_position(&body, 2, nav, now_ms);

        if let Some(value) = body.get(6).and_then(|f| parse_f32(f)) {
            self.apply_sog(value, nav, now_ms);
        }
        if let Some(mut value) = body.get(7).and_then(|f| parse_f32(f)) {
            if value < 0.0 {
                value += 360.0;
            }
            nav.cog_deg.set(self.filter.filtered_cog(value), now_ms);
        }

        if let Some(date) = body.get(8) {
            if let (Some(day), Some(month), Some(year)) = (
                parse_2digits(date, 0),
                parse_2digits(date, 2),
                parse_2digits(date, 4),
            ) {
                nav.date.set(day, month, year, now_ms);
            }
        }
    }

    fn decode_gga(&mut self, sentence: &Sentence, nav: &mut NavigationData, now_ms: u32) {
        let body = fields(&sentence[7..]);
        self.decode_position(&body, 1, nav, now_ms);
    }

    fn decode_gll(&mut self, sentence: &Sentence, nav: &mut NavigationData, now_ms: u32) {
        let body = fields(&sentence[7..]);
        self.decode_position(&body, 0, nav, now_ms);
    }

    /// Decode `lat,N/S,lon,E/W` starting at `first_field`.
    fn decode_position(
        &mut self,
        body: &[&[u8]],
        first_field: usize,
        nav: &mut NavigationData,
        now_ms: u32,
    ) {
        if let Some(mut latitude) = body.get(first_field).and_then(|f| parse_coordinate(f, 2)) {
            if body.get(first_field + 1) == Some(&&b"S"[..]) {
                latitude = -latitude;
            }
            nav.latitude_deg.set(latitude, now_ms);
        }
        if let Some(mut longitude) = body.get(first_field + 2).and_then(|f| parse_coordinate(f, 3))
        {
            if body.get(first_field + 3) == Some(&&b"W"[..]) {
                longitude = -longitude;
            }
            nav.longitude_deg.set(longitude, now_ms);
        }
    }

    fn decode_vtg(&mut self, sentence: &Sentence, nav: &mut NavigationData, now_ms: u32) {
        let body = fields(&sentence[7..]);

        // Old devices emit VTG without the T/M/N unit letters; the comma
        // count tells the two layouts apart.
        let sog_field = if body.len() <= 5 { 2 } else { 4 };

        if let Some(mut value) = body.first().and_then(|f| parse_f32(f)) {
            if value < 0.0 {
                value += 360.0;
            }
            nav.cog_deg.set(self.filter.filtered_cog(value), now_ms);
        }
        if let Some(value) = body.get(sog_field).and_then(|f| parse_f32(f)) {
            self.apply_sog(value, nav, now_ms);
        }
    }

    fn apply_sog(&mut self, raw_sog_kt: f32, nav: &mut NavigationData, now_ms: u32) {
        let filtered = self.filter.filtered_sog(raw_sog_kt);
        nav.sog_kt.set(filtered, now_ms);
        if self.config.spd_emulation {
            // No paddle wheel on board: ground speed stands in for speed
            // through water.
            nav.stw_kt.set(filtered, now_ms);
        }
    }

    fn decode_mwv(&mut self, sentence: &Sentence, nav: &mut NavigationData, now_ms: u32) {
        let body = fields(&sentence[7..]);

        // Only relative (apparent) wind is of interest.
        if body.get(1) != Some(&&b"R"[..]) {
            return;
        }

        if let Some(mut awa) = body.first().and_then(|f| parse_f32(f)) {
            if awa > 180.0 {
                awa -= 360.0;
            }
            nav.awa_deg.set(awa, now_ms);
        }

        let Some(speed) = body.get(2).and_then(|f| parse_f32(f)) else {
            return;
        };
        let aws = match body.get(3).and_then(|f| f.first().copied()) {
            Some(b'M') => speed * 1.943_844,
            Some(b'K') => speed * 0.539_956_8,
            Some(b'N') => speed,
            _ => return,
        };

        nav.aws_kt.set(aws, now_ms);
        codec::calculate_true_wind(nav, now_ms);
    }

    fn decode_dpt(&mut self, sentence: &Sentence, nav: &mut NavigationData, now_ms: u32) {
        let body = fields(&sentence[7..]);

        let Some(depth) = body.first().and_then(|f| parse_f32(f)) else {
            return;
        };
        if let Some(offset) = body.get(1).and_then(|f| parse_f32(f)) {
            nav.dpt_m.set(depth + offset, now_ms);
        }
    }

    fn decode_vhw(&mut self, sentence: &Sentence, nav: &mut NavigationData, now_ms: u32) {
        let body = fields(&sentence[7..]);

        if let Some(mut heading) = body.get(2).and_then(|f| parse_f32(f)) {
            if body.get(3) == Some(&&b"M"[..]) {
                if heading < 0.0 {
                    heading += 360.0;
                }
                nav.mag_hdg_deg.set(heading, now_ms);
            }
        }
        if let Some(speed) = body.get(4).and_then(|f| parse_f32(f)) {
            if body.get(5).map(|f| f.first()) == Some(Some(&b'N')) {
                nav.stw_kt.set(speed, now_ms);
            }
        }
    }

    fn decode_hdg(&mut self, sentence: &Sentence, nav: &mut NavigationData, now_ms: u32) {
        let body = fields(&sentence[7..]);

        let Some(mut heading) = body.first().and_then(|f| parse_f32(f)) else {
            return;
        };
        while heading < 0.0 {
            heading += 360.0;
        }
        while heading >= 360.0 {
            heading -= 360.0;
        }
        nav.mag_hdg_deg.set(heading, now_ms);
    }

    //==================================================================================Emitters

    /// Emit every due sentence generated from Micronet-sourced data.
    pub fn send_updated_sentences<W: NmeaSink>(
        &mut self,
        nav: &NavigationData,
        out: &mut W,
        now_ms: u32,
    ) {
        self.emit_mwv_r(nav, out, now_ms);
        self.emit_mwv_t(nav, out, now_ms);
        self.emit_dpt(nav, out, now_ms);
        self.emit_mtw(nav, out, now_ms);
        self.emit_vlw(nav, out, now_ms);
        self.emit_vhw(nav, out, now_ms);
        self.emit_hdg(nav, out, now_ms);
        self.emit_battery_xdr(nav, out, now_ms);
    }

    fn due(last_emission_ms: u32, timestamp_ms: u32) -> bool {
        timestamp_ms > last_emission_ms.wrapping_add(NMEA_SENTENCE_MIN_PERIOD_MS)
    }

    fn emit_mwv_r<W: NmeaSink>(&mut self, nav: &NavigationData, out: &mut W, now_ms: u32) {
        if self.config.wind_source != LinkId::Micronet {
            return;
        }
        let update = Self::due(self.timestamps.mwv_r, nav.awa_deg.timestamp_ms)
            && Self::due(self.timestamps.mwv_r, nav.aws_kt.timestamp_ms)
            && nav.awa_deg.valid
            && nav.aws_kt.valid;
        if !update {
            return;
        }

        let mut awa = nav.awa_deg.value;
        if awa < 0.0 {
            awa += 360.0;
        }
        let mut sentence: String<NMEA_SENTENCE_MAX_LENGTH> = String::new();
        let _ = write!(sentence, "$INMWV,{:.1},R,{:.1},N,A", awa, nav.aws_kt.value);
        append_checksum(&mut sentence);
        self.timestamps.mwv_r = now_ms;
        out.send_sentence(&sentence);
    }

    fn emit_mwv_t<W: NmeaSink>(&mut self, nav: &NavigationData, out: &mut W, now_ms: u32) {
        if self.config.wind_source != LinkId::Micronet {
            return;
        }
        let update = Self::due(self.timestamps.mwv_t, nav.twa_deg.timestamp_ms)
            && Self::due(self.timestamps.mwv_t, nav.tws_kt.timestamp_ms)
            && nav.twa_deg.valid
            && nav.tws_kt.valid;
        if !update {
            return;
        }

        let mut twa = nav.twa_deg.value;
        if twa < 0.0 {
            twa += 360.0;
        }
        let mut sentence: String<NMEA_SENTENCE_MAX_LENGTH> = String::new();
        let _ = write!(sentence, "$INMWV,{:.1},T,{:.1},N,A", twa, nav.tws_kt.value);
        append_checksum(&mut sentence);
        self.timestamps.mwv_t = now_ms;
        out.send_sentence(&sentence);
    }

    fn emit_dpt<W: NmeaSink>(&mut self, nav: &NavigationData, out: &mut W, now_ms: u32) {
        if self.config.depth_source != LinkId::Micronet {
            return;
        }
        if !(Self::due(self.timestamps.dpt, nav.dpt_m.timestamp_ms) && nav.dpt_m.valid) {
            return;
        }

        let mut sentence: String<NMEA_SENTENCE_MAX_LENGTH> = String::new();
        let _ = write!(
            sentence,
            "$INDPT,{:.1},{:.1},",
            nav.dpt_m.value, nav.depth_offset_m
        );
        append_checksum(&mut sentence);
        self.timestamps.dpt = now_ms;
        out.send_sentence(&sentence);
    }

    fn emit_mtw<W: NmeaSink>(&mut self, nav: &NavigationData, out: &mut W, now_ms: u32) {
        if self.config.sea_temp_source != LinkId::Micronet {
            return;
        }
        if !(Self::due(self.timestamps.mtw, nav.stp_degc.timestamp_ms) && nav.stp_degc.valid) {
            return;
        }

        let mut sentence: String<NMEA_SENTENCE_MAX_LENGTH> = String::new();
        let _ = write!(sentence, "$INMTW,{:.1},C", nav.stp_degc.value);
        append_checksum(&mut sentence);
        self.timestamps.mtw = now_ms;
        out.send_sentence(&sentence);
    }

    fn emit_vlw<W: NmeaSink>(&mut self, nav: &NavigationData, out: &mut W, now_ms: u32) {
        if self.config.speed_source != LinkId::Micronet {
            return;
        }
        let update = Self::due(self.timestamps.vlw, nav.log_nm.timestamp_ms)
            && Self::due(self.timestamps.vlw, nav.trip_nm.timestamp_ms)
            && nav.log_nm.valid
            && nav.trip_nm.valid;
        if !update {
            return;
        }

        let mut sentence: String<NMEA_SENTENCE_MAX_LENGTH> = String::new();
        let _ = write!(
            sentence,
            "$INVLW,{:.1},N,{:.1},N,,N,,N",
            nav.log_nm.value, nav.trip_nm.value
        );
        append_checksum(&mut sentence);
        self.timestamps.vlw = now_ms;
        out.send_sentence(&sentence);
    }

    fn emit_vhw<W: NmeaSink>(&mut self, nav: &NavigationData, out: &mut W, now_ms: u32) {
        if self.config.speed_source != LinkId::Micronet {
            return;
        }
        if !(Self::due(self.timestamps.vhw, nav.stw_kt.timestamp_ms) && nav.stw_kt.valid) {
            return;
        }

        let mut sentence: String<NMEA_SENTENCE_MAX_LENGTH> = String::new();
        if nav.mag_hdg_deg.valid {
            let mut true_heading = nav.mag_hdg_deg.value + nav.magnetic_variation_deg;
            if true_heading < 0.0 {
                true_heading += 360.0;
            }
            if true_heading >= 360.0 {
                true_heading -= 360.0;
            }
            let _ = write!(
                sentence,
                "$INVHW,{:.1},T,{:.1},M,{:.1},N,,K",
                true_heading, nav.mag_hdg_deg.value, nav.stw_kt.value
            );
        } else {
            let _ = write!(sentence, "$INVHW,,T,,M,{:.1},N,,K", nav.stw_kt.value);
        }
        append_checksum(&mut sentence);
        self.timestamps.vhw = now_ms;
        out.send_sentence(&sentence);
    }

    fn emit_hdg<W: NmeaSink>(&mut self, nav: &NavigationData, out: &mut W, now_ms: u32) {
        if self.config.compass_source != LinkId::Micronet
            && self.config.compass_source != LinkId::Compass
        {
            return;
        }
        if !(Self::due(self.timestamps.hdg, nav.mag_hdg_deg.timestamp_ms) && nav.mag_hdg_deg.valid)
        {
            return;
        }

        let variation = nav.magnetic_variation_deg;
        let mut sentence: String<NMEA_SENTENCE_MAX_LENGTH> = String::new();
        let _ = write!(
            sentence,
            "$INHDG,{:.1},0,E,{:.1},{}",
            nav.mag_hdg_deg.value,
            if variation < 0.0 { -variation } else { variation },
            if variation < 0.0 { 'W' } else { 'E' }
        );
        append_checksum(&mut sentence);
        self.timestamps.hdg = now_ms;
        out.send_sentence(&sentence);
    }

    fn emit_battery_xdr<W: NmeaSink>(&mut self, nav: &NavigationData, out: &mut W, now_ms: u32) {
        if self.config.voltage_source != LinkId::Micronet {
            return;
        }
        if !(Self::due(self.timestamps.vcc, nav.vcc_v.timestamp_ms) && nav.vcc_v.valid) {
            return;
        }

        let mut sentence: String<NMEA_SENTENCE_MAX_LENGTH> = String::new();
        let _ = write!(sentence, "$INXDR,U,{:.1},V,TACKTICK#0", nav.vcc_v.value);
        append_checksum(&mut sentence);
        self.timestamps.vcc = now_ms;
        out.send_sentence(&sentence);
    }

    fn emit_roll_xdr<W: NmeaSink>(&mut self, nav: &NavigationData, out: &mut W, now_ms: u32) {
        if !(Self::due(self.timestamps.roll, nav.roll_deg.timestamp_ms) && nav.roll_deg.valid) {
            return;
        }

        let mut sentence: String<NMEA_SENTENCE_MAX_LENGTH> = String::new();
        let _ = write!(sentence, "$INXDR,A,{:.0},D,ROLL", nav.roll_deg.value);
        append_checksum(&mut sentence);
        self.timestamps.roll = now_ms;
        out.send_sentence(&sentence);
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
