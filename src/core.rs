//! Shared data model of the bridge: the navigation data set written by the
//! decoders and read by the encoders, and the persisted device
//! configuration consumed at startup.
//!
//! All values carry their acquisition timestamp and expire after
//! [`VALIDITY_TIME_MS`]; consumers must call
//! [`NavigationData::update_validity`] on every cycle.

/// Lifetime of a navigation value without refresh, in milliseconds.
pub const VALIDITY_TIME_MS: u32 = 3000;

/// Maximum length of a Micronet waypoint name.
pub const WAYPOINT_NAME_LENGTH: usize = 16;

//==================================================================================Value types

/// A floating point measurement with validity flag and timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FloatValue {
    pub valid: bool,
    pub value: f32,
    pub timestamp_ms: u32,
}

impl FloatValue {
    pub const fn new() -> Self {
        Self {
            valid: false,
            value: 0.0,
            timestamp_ms: 0,
        }
    }

    /// Store a new value and stamp it.
    #[inline]
    pub fn set(&mut self, value: f32, now_ms: u32) {
        self.value = value;
        self.valid = true;
        self.timestamp_ms = now_ms;
    }

    #[inline]
    fn expire(&mut self, now_ms: u32) {
        // Wrap-safe: the age is computed as now - stamp, never the reverse.
        if now_ms.wrapping_sub(self.timestamp_ms) > VALIDITY_TIME_MS {
            self.valid = false;
        }
    }
}

/// Time of day (UTC), hour and minute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeValue {
    pub valid: bool,
    pub hour: u8,
    pub minute: u8,
    pub timestamp_ms: u32,
}

impl TimeValue {
    pub const fn new() -> Self {
        Self {
            valid: false,
            hour: 0,
            minute: 0,
            timestamp_ms: 0,
        }
    }

    #[inline]
    pub fn set(&mut self, hour: u8, minute: u8, now_ms: u32) {
        self.hour = hour;
        self.minute = minute;
        self.valid = true;
        self.timestamp_ms = now_ms;
    }

    #[inline]
    fn expire(&mut self, now_ms: u32) {
        if now_ms.wrapping_sub(self.timestamp_ms) > VALIDITY_TIME_MS {
            self.valid = false;
        }
    }
}

/// Calendar date, two-digit year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateValue {
    pub valid: bool,
    pub day: u8,
    pub month: u8,
    pub year: u8,
    pub timestamp_ms: u32,
}

impl DateValue {
    pub const fn new() -> Self {
        Self {
            valid: false,
            day: 0,
            month: 0,
            year: 0,
            timestamp_ms: 0,
        }
    }

    #[inline]
    pub fn set(&mut self, day: u8, month: u8, year: u8, now_ms: u32) {
        self.day = day;
        self.month = month;
        self.year = year;
        self.valid = true;
        self.timestamp_ms = now_ms;
    }

    #[inline]
    fn expire(&mut self, now_ms: u32) {
        if now_ms.wrapping_sub(self.timestamp_ms) > VALIDITY_TIME_MS {
            self.valid = false;
        }
    }
}

/// Target waypoint name, already mapped to the Micronet-safe ASCII subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WaypointName {
    pub valid: bool,
    pub name: [u8; WAYPOINT_NAME_LENGTH],
    pub name_length: u8,
    pub timestamp_ms: u32,
}

impl Default for WaypointName {
    fn default() -> Self {
        Self::new()
    }
}

impl WaypointName {
    pub const fn new() -> Self {
        Self {
            valid: false,
            name: [b' '; WAYPOINT_NAME_LENGTH],
            name_length: 0,
            timestamp_ms: 0,
        }
    }

    #[inline]
    fn expire(&mut self, now_ms: u32) {
        if now_ms.wrapping_sub(self.timestamp_ms) > VALIDITY_TIME_MS {
            self.valid = false;
        }
    }
}

//==================================================================================Navigation data

/// Process-global navigation state. Written by the Micronet and NMEA
/// decoders, read by the encoders and the slave device. Mutated from the
/// foreground task only; ISR contexts never touch it.
#[derive(Debug, Clone, Default)]
pub struct NavigationData {
    pub stw_kt: FloatValue,
    pub awa_deg: FloatValue,
    pub aws_kt: FloatValue,
    pub twa_deg: FloatValue,
    pub tws_kt: FloatValue,
    pub dpt_m: FloatValue,
    pub vcc_v: FloatValue,
    pub log_nm: FloatValue,
    pub trip_nm: FloatValue,
    pub stp_degc: FloatValue,

    pub time: TimeValue,
    pub date: DateValue,
    pub latitude_deg: FloatValue,
    pub longitude_deg: FloatValue,
    pub cog_deg: FloatValue,
    pub sog_kt: FloatValue,
    pub xte_nm: FloatValue,
    pub dtw_nm: FloatValue,
    pub btw_deg: FloatValue,
    pub waypoint: WaypointName,
    pub vmgwp_kt: FloatValue,

    pub mag_hdg_deg: FloatValue,
    pub roll_deg: FloatValue,

    /// Set when the last decoded frame carried a recognized set-parameter.
    /// The enclosing cycle must persist the new calibration and ack.
    pub calibration_updated: bool,
    pub water_speed_factor_per: f32,
    pub water_temperature_offset_degc: f32,
    pub depth_offset_m: f32,
    pub wind_speed_factor_per: f32,
    pub wind_direction_offset_deg: f32,
    pub heading_offset_deg: f32,
    pub magnetic_variation_deg: f32,
    pub wind_shift_min: f32,
}

impl NavigationData {
    pub fn new() -> Self {
        Self {
            water_speed_factor_per: 1.0,
            wind_speed_factor_per: 1.0,
            ..Default::default()
        }
    }

    /// Copy the calibration block from the persisted configuration.
    pub fn load_calibration(&mut self, config: &DeviceConfig) {
        self.water_speed_factor_per = config.water_speed_factor_per;
        self.water_temperature_offset_degc = config.water_temperature_offset_degc;
        self.depth_offset_m = config.depth_offset_m;
        self.wind_speed_factor_per = config.wind_speed_factor_per;
        self.wind_direction_offset_deg = config.wind_direction_offset_deg;
        self.heading_offset_deg = config.heading_offset_deg;
        self.magnetic_variation_deg = config.magnetic_variation_deg;
        self.wind_shift_min = config.wind_shift_min;
    }

    /// Invalidate every value older than [`VALIDITY_TIME_MS`]. Must be run
    /// on every foreground cycle.
    pub fn update_validity(&mut self, now_ms: u32) {
        self.stw_kt.expire(now_ms);
        self.awa_deg.expire(now_ms);
        self.aws_kt.expire(now_ms);
        self.twa_deg.expire(now_ms);
        self.tws_kt.expire(now_ms);
        self.dpt_m.expire(now_ms);
        self.vcc_v.expire(now_ms);
        self.log_nm.expire(now_ms);
        self.trip_nm.expire(now_ms);
        self.stp_degc.expire(now_ms);
        self.time.expire(now_ms);
        self.date.expire(now_ms);
        self.latitude_deg.expire(now_ms);
        self.longitude_deg.expire(now_ms);
        self.cog_deg.expire(now_ms);
        self.sog_kt.expire(now_ms);
        self.xte_nm.expire(now_ms);
        self.dtw_nm.expire(now_ms);
        self.btw_deg.expire(now_ms);
        self.waypoint.expire(now_ms);
        self.vmgwp_kt.expire(now_ms);
        self.mag_hdg_deg.expire(now_ms);
        self.roll_deg.expire(now_ms);
    }
}

//==================================================================================Configuration

/// Identifier of a physical or logical data link. Each datum class is
/// routed from exactly one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkId {
    /// External chart plotter / autopilot port.
    Plotter,
    /// GNSS receiver port.
    Gnss,
    /// AIS receiver port.
    Ais,
    /// Micronet wireless network.
    Micronet,
    /// Internal electronic compass.
    Compass,
}

/// Regional RF frequency plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrequencySystem {
    /// European 868 MHz band.
    Mhz868,
    /// North American 915 MHz band.
    Mhz915,
}

/// Persisted configuration record, copied at startup and on reload.
/// Persistence format and atomicity are provided by an external module;
/// the core only reads this struct.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Attached Micronet network identifier.
    pub network_id: u32,
    /// Own base device identity; virtual slaves claim `device_id + i`.
    pub device_id: u32,
    /// Additive crystal trim applied to the RF center frequency.
    pub rf_frequency_offset_mhz: f32,
    pub frequency_system: FrequencySystem,

    pub water_speed_factor_per: f32,
    pub water_temperature_offset_degc: f32,
    pub depth_offset_m: f32,
    pub wind_speed_factor_per: f32,
    pub wind_direction_offset_deg: f32,
    pub heading_offset_deg: f32,
    pub magnetic_variation_deg: f32,
    pub wind_shift_min: f32,

    /// Magnetometer hard-iron offsets, passed through to the external
    /// compass module.
    pub mag_offset_x: f32,
    pub mag_offset_y: f32,
    pub mag_offset_z: f32,

    /// Per-datum source routing.
    pub nav_source: LinkId,
    pub gnss_source: LinkId,
    pub wind_source: LinkId,
    pub depth_source: LinkId,
    pub speed_source: LinkId,
    pub voltage_source: LinkId,
    pub sea_temp_source: LinkId,
    pub compass_source: LinkId,

    pub sog_cog_filter_enable: bool,
    pub sog_cog_filter_length: u8,
    /// When set, the filtered GNSS SOG also populates speed through water.
    pub spd_emulation: bool,
    /// Work around chartplotters that swap the FROM/TO waypoint names in RMB.
    pub inverted_rmb: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            network_id: 0,
            device_id: 0,
            rf_frequency_offset_mhz: 0.0,
            frequency_system: FrequencySystem::Mhz868,
            water_speed_factor_per: 1.0,
            water_temperature_offset_degc: 0.0,
            depth_offset_m: 0.0,
            wind_speed_factor_per: 1.0,
            wind_direction_offset_deg: 0.0,
            heading_offset_deg: 0.0,
            magnetic_variation_deg: 0.0,
            wind_shift_min: 0.0,
            mag_offset_x: 0.0,
            mag_offset_y: 0.0,
            mag_offset_z: 0.0,
            nav_source: LinkId::Plotter,
            gnss_source: LinkId::Gnss,
            wind_source: LinkId::Micronet,
            depth_source: LinkId::Micronet,
            speed_source: LinkId::Micronet,
            voltage_source: LinkId::Micronet,
            sea_temp_source: LinkId::Micronet,
            compass_source: LinkId::Micronet,
            sog_cog_filter_enable: false,
            sog_cog_filter_length: 8,
            spd_emulation: false,
            inverted_rmb: false,
        }
    }
}
