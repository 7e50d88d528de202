//! Output channels published to the sink.
//!
//! Channel ids are persistent keys in the host registry. Never renumber.

use serde::Serialize;

use crate::i18n::Translator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(u8)]
pub enum Channel {
    AirQualityIndex = 1,
    PollutionLevel = 2,
    Pm1 = 3,
    Pm25 = 4,
    Pm10 = 5,
    Temperature = 6,
    Pressure = 7,
    Humidity = 8,
    StationLocation = 9,
    PollutionAdvice = 10,
    Pm25Norm = 11,
    Pm10Norm = 12,
}

impl Channel {
    pub const ALL: [Channel; 12] = [
        Channel::AirQualityIndex,
        Channel::PollutionLevel,
        Channel::Pm1,
        Channel::Pm25,
        Channel::Pm10,
        Channel::Temperature,
        Channel::Pressure,
        Channel::Humidity,
        Channel::StationLocation,
        Channel::PollutionAdvice,
        Channel::Pm25Norm,
        Channel::Pm10Norm,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Untranslated display name, also the translation key.
    pub fn name_key(self) -> &'static str {
        match self {
            Channel::AirQualityIndex => "Air Quality Index",
            Channel::PollutionLevel => "Air pollution Level",
            Channel::Pm1 => "PM1",
            Channel::Pm25 => "PM2,5",
            Channel::Pm10 => "PM10",
            Channel::Temperature => "Temperature",
            Channel::Pressure => "Air pressure",
            Channel::Humidity => "Humidity",
            Channel::StationLocation => "Sensor information",
            Channel::PollutionAdvice => "Advice",
            Channel::Pm25Norm => "PM2,5 Norm",
            Channel::Pm10Norm => "PM10 Norm",
        }
    }

    /// Stable slug used for entity ids (`sensor.airly_<slug>`).
    pub fn slug(self) -> &'static str {
        match self {
            Channel::AirQualityIndex => "air_quality_index",
            Channel::PollutionLevel => "pollution_level",
            Channel::Pm1 => "pm1",
            Channel::Pm25 => "pm25",
            Channel::Pm10 => "pm10",
            Channel::Temperature => "temperature",
            Channel::Pressure => "pressure",
            Channel::Humidity => "humidity",
            Channel::StationLocation => "station_location",
            Channel::PollutionAdvice => "pollution_advice",
            Channel::Pm25Norm => "pm25_norm",
            Channel::Pm10Norm => "pm10_norm",
        }
    }

    pub fn kind(self) -> DisplayKind {
        match self {
            Channel::AirQualityIndex => DisplayKind::Custom { unit: "CAQI" },
            Channel::Pm1 | Channel::Pm25 | Channel::Pm10 => DisplayKind::Custom { unit: "µg/m³" },
            Channel::PollutionLevel | Channel::PollutionAdvice => DisplayKind::Alert,
            Channel::Pm25Norm | Channel::Pm10Norm => DisplayKind::Percentage,
            Channel::Temperature => DisplayKind::Temperature,
            Channel::Pressure => DisplayKind::Barometer,
            Channel::Humidity => DisplayKind::Humidity,
            Channel::StationLocation => DisplayKind::Text,
        }
    }

    pub fn icon(self) -> Icon {
        match self {
            Channel::AirQualityIndex | Channel::Pm1 | Channel::Pm25 | Channel::Pm10 => Icon::Airly,
            Channel::PollutionLevel | Channel::PollutionAdvice | Channel::StationLocation => {
                Icon::Builtin(7)
            }
            _ => Icon::Default,
        }
    }

    /// Whether the channel is shown on the dashboard when first created.
    pub fn used_by_default(self) -> bool {
        !matches!(self, Channel::Pm1 | Channel::StationLocation)
    }

    pub fn descriptor(self, tr: &Translator) -> ChannelDescriptor {
        ChannelDescriptor {
            channel: self,
            id: self.id(),
            name: tr.tr(self.name_key()).to_string(),
            kind: self.kind(),
            icon: self.icon(),
            used: self.used_by_default(),
        }
    }
}

/// How the sink should render a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayKind {
    Custom { unit: &'static str },
    Alert,
    Percentage,
    Temperature,
    Barometer,
    Humidity,
    Text,
}

impl DisplayKind {
    pub fn unit(&self) -> Option<&'static str> {
        match self {
            DisplayKind::Custom { unit } => Some(*unit),
            DisplayKind::Percentage | DisplayKind::Humidity => Some("%"),
            DisplayKind::Temperature => Some("\u{00b0}C"),
            DisplayKind::Barometer => Some("hPa"),
            DisplayKind::Alert | DisplayKind::Text => None,
        }
    }

    pub fn device_class(&self) -> Option<&'static str> {
        match self {
            DisplayKind::Temperature => Some("temperature"),
            DisplayKind::Barometer => Some("pressure"),
            DisplayKind::Humidity => Some("humidity"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    Default,
    Airly,
    Builtin(u8),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelDescriptor {
    pub channel: Channel,
    pub id: u8,
    pub name: String,
    pub kind: DisplayKind,
    pub icon: Icon,
    pub used: bool,
}

/// Current value of a channel: numeric code plus display string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reading {
    pub n_value: i64,
    pub s_value: String,
}

impl Reading {
    pub fn new(n_value: i64, s_value: impl Into<String>) -> Self {
        Self {
            n_value,
            s_value: s_value.into(),
        }
    }
}
