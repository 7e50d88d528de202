//! Turns a decoded payload into canonical fields and channel readings.

use std::collections::BTreeMap;

use crate::i18n::{self, Translator};

use super::channels::{Channel, Reading};
use super::schema::{InstallationV2, MeasurementPayload, SensorInfoV1, StationPayload};

/// WHO daily limits the norm percentages are measured against (µg/m³).
pub const PM25_NORM: f64 = 25.0;
pub const PM10_NORM: f64 = 50.0;

/// Canonical measurement fields, independent of upstream naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Pm1,
    Pm25,
    Pm10,
    Temperature,
    Humidity,
    Pressure,
}

impl Field {
    /// Map an upstream value name (v2 upper case, v1 lower case).
    pub fn from_source_name(name: &str) -> Option<Field> {
        match name {
            "PM1" | "pm1" => Some(Field::Pm1),
            "PM25" | "pm25" => Some(Field::Pm25),
            "PM10" | "pm10" => Some(Field::Pm10),
            "TEMPERATURE" | "temperature" => Some(Field::Temperature),
            "HUMIDITY" | "humidity" => Some(Field::Humidity),
            "PRESSURE" | "pressure" => Some(Field::Pressure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollutionLevel {
    VeryLow,
    Low,
    Medium,
    High,
    Extreme,
    Airmageddon,
    Unknown,
}

impl PollutionLevel {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "VERY_LOW" => PollutionLevel::VeryLow,
            "LOW" => PollutionLevel::Low,
            "MEDIUM" => PollutionLevel::Medium,
            "HIGH" => PollutionLevel::High,
            "EXTREME" => PollutionLevel::Extreme,
            "AIRMAGEDDON" => PollutionLevel::Airmageddon,
            _ => PollutionLevel::Unknown,
        }
    }

    /// Legacy sensor API reports levels as 1 (very low) .. 6 (airmageddon).
    pub fn from_code(code: f64) -> Self {
        match code.round() as i64 {
            1 => PollutionLevel::VeryLow,
            2 => PollutionLevel::Low,
            3 => PollutionLevel::Medium,
            4 => PollutionLevel::High,
            5 => PollutionLevel::Extreme,
            6 => PollutionLevel::Airmageddon,
            _ => PollutionLevel::Unknown,
        }
    }

    /// Alert severity: 1 green, 2 yellow, 3 orange, 4 red, 0 unknown.
    pub fn severity(self) -> i64 {
        match self {
            PollutionLevel::VeryLow | PollutionLevel::Low => 1,
            PollutionLevel::Medium => 2,
            PollutionLevel::High => 3,
            PollutionLevel::Extreme | PollutionLevel::Airmageddon => 4,
            PollutionLevel::Unknown => 0,
        }
    }

    pub fn label(self) -> Option<&'static str> {
        match self {
            PollutionLevel::VeryLow => Some("Very low"),
            PollutionLevel::Low => Some("Low"),
            PollutionLevel::Medium => Some("Medium"),
            PollutionLevel::High => Some("High"),
            PollutionLevel::Extreme => Some("Extreme"),
            PollutionLevel::Airmageddon => Some("Airmageddon"),
            PollutionLevel::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HumidityStatus {
    Normal = 0,
    Comfortable = 1,
    Dry = 2,
    Wet = 3,
}

impl HumidityStatus {
    /// Bands are checked in order and the first match wins, so 40..=60 is
    /// normal and 61..=70 comfortable.
    pub fn from_percent(h: i64) -> Self {
        if h < 40 {
            HumidityStatus::Dry
        } else if h <= 60 {
            HumidityStatus::Normal
        } else if h <= 70 {
            HumidityStatus::Comfortable
        } else {
            HumidityStatus::Wet
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AirIndex {
    pub value: Option<f64>,
    pub level: PollutionLevel,
    pub description: Option<String>,
    pub advice: Option<String>,
}

/// Canonical view of one measurement payload. Absent upstream fields are
/// absent here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurements {
    pub values: BTreeMap<Field, f64>,
    pub index: Option<AirIndex>,
}

pub fn normalize(payload: &MeasurementPayload, tr: &Translator) -> Measurements {
    match payload {
        MeasurementPayload::V2(m) => {
            let values = m
                .current
                .values
                .iter()
                .filter_map(|v| Some((Field::from_source_name(&v.name)?, v.value?)))
                .collect();

            let index = m.current.indexes.first().map(|idx| AirIndex {
                value: idx.value,
                level: idx
                    .level
                    .as_deref()
                    .map(PollutionLevel::from_tag)
                    .unwrap_or(PollutionLevel::Unknown),
                description: idx.description.clone(),
                advice: idx.advice.clone(),
            });

            Measurements { values, index }
        }
        MeasurementPayload::V1(m) => {
            let Some(entry) = m.latest() else {
                return Measurements::default();
            };

            let values = entry
                .measurements
                .iter()
                .filter_map(|(name, value)| Some((Field::from_source_name(name)?, (*value)?)))
                .collect();

            let aqi = entry.measurements.get("airQualityIndex").copied().flatten();
            let level = entry
                .measurements
                .get("pollutionLevel")
                .copied()
                .flatten()
                .map(PollutionLevel::from_code);

            let index = (aqi.is_some() || level.is_some()).then(|| {
                let level = level.unwrap_or(PollutionLevel::Unknown);
                AirIndex {
                    value: aqi,
                    level,
                    description: level.label().map(|l| tr.tr(l).to_string()),
                    advice: None,
                }
            });

            Measurements { values, index }
        }
    }
}

pub fn norm_percentage(value: f64, norm: f64) -> f64 {
    value / norm * 100.0
}

/// Render a float with no fractional digits and a `,0` suffix, the format
/// the dashboard has always shown (`12.5` becomes `12,0`). Values that
/// round to zero from below keep their sign (`-0.4` becomes `-0,0`).
pub fn format_float(value: f64) -> String {
    format!("{:.0},0", value.round_ties_even())
}

/// Readings for every channel that has a value in `m`.
pub fn readings(m: &Measurements) -> BTreeMap<Channel, Reading> {
    let mut out = BTreeMap::new();
    let value = |field: Field| m.values.get(&field).copied();

    if let Some(pm10) = value(Field::Pm10) {
        out.insert(Channel::Pm10, Reading::new(0, format_float(pm10)));
        out.insert(
            Channel::Pm10Norm,
            Reading::new(0, format_float(norm_percentage(pm10, PM10_NORM))),
        );
    }
    if let Some(pm25) = value(Field::Pm25) {
        out.insert(Channel::Pm25, Reading::new(0, format_float(pm25)));
        out.insert(
            Channel::Pm25Norm,
            Reading::new(0, format_float(norm_percentage(pm25, PM25_NORM))),
        );
    }
    if let Some(pm1) = value(Field::Pm1) {
        out.insert(Channel::Pm1, Reading::new(0, format_float(pm1)));
    }

    if let Some(index) = &m.index {
        if let Some(caqi) = index.value {
            out.insert(Channel::AirQualityIndex, Reading::new(0, format_float(caqi)));
        }
        let severity = index.level.severity();
        if let Some(description) = index.description.as_deref().filter(|s| !s.is_empty()) {
            out.insert(Channel::PollutionLevel, Reading::new(severity, description));
        }
        if let Some(advice) = index.advice.as_deref().filter(|s| !s.is_empty()) {
            out.insert(Channel::PollutionAdvice, Reading::new(severity, advice));
        }
    }

    if let Some(humidity) = value(Field::Humidity) {
        let h = humidity.round_ties_even() as i64;
        let status = HumidityStatus::from_percent(h);
        out.insert(Channel::Humidity, Reading::new(h, status.code().to_string()));
    }
    if let Some(temperature) = value(Field::Temperature) {
        out.insert(Channel::Temperature, Reading::new(0, format_float(temperature)));
    }
    if let Some(pressure) = value(Field::Pressure) {
        // trailing 0 = barometer forecast "no forecast"
        let hpa = pressure.round_ties_even() as i64;
        out.insert(Channel::Pressure, Reading::new(0, format!("{};0", hpa)));
    }

    out
}

/// Human-readable station address, or `None` when the payload has no
/// city/locality to show.
pub fn station_text(payload: &StationPayload, tr: &Translator) -> Option<String> {
    match payload {
        StationPayload::V2(info) => station_text_v2(info, tr),
        StationPayload::V1(info) => station_text_v1(info, tr),
    }
}

fn station_text_v2(info: &InstallationV2, tr: &Translator) -> Option<String> {
    let city = non_empty(&info.address.city)?;
    let founder = info
        .sponsor
        .as_ref()
        .and_then(|s| non_empty(&s.name))
        .unwrap_or("-");

    let street = non_empty(&info.address.street).map(|street| {
        match non_empty(&info.address.number) {
            Some(number) => format!("{} {}", street, number),
            None => street.to_string(),
        }
    });

    Some(match street {
        Some(address) => i18n::fill(
            tr.tr(i18n::STATION_V2_STREET),
            &[("address", address.as_str()), ("city", city), ("founder", founder)],
        ),
        None => i18n::fill(
            tr.tr(i18n::STATION_V2_CITY),
            &[("city", city), ("founder", founder)],
        ),
    })
}

fn station_text_v1(info: &SensorInfoV1, tr: &Translator) -> Option<String> {
    let locality = non_empty(&info.address.locality)?;
    let vendor = non_empty(&info.vendor).unwrap_or("Airly");
    let founder = non_empty(&info.founder).unwrap_or("-");

    let street = non_empty(&info.address.route).map(|route| {
        match non_empty(&info.address.street_number) {
            Some(number) => format!("{} {}", route, number),
            None => route.to_string(),
        }
    });

    Some(match street {
        Some(address) => i18n::fill(
            tr.tr(i18n::STATION_V1_STREET),
            &[
                ("vendor", vendor),
                ("address", address.as_str()),
                ("locality", locality),
                ("founder", founder),
            ],
        ),
        None => i18n::fill(
            tr.tr(i18n::STATION_V1_LOCALITY),
            &[("vendor", vendor), ("locality", locality), ("founder", founder)],
        ),
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
