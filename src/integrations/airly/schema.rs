//! Airly JSON payloads for both API generations.
//!
//! v2 ("installation" API) reports a flat `current` block; v1 ("sensor" API)
//! only has a chronological `history` list whose newest non-empty entry is
//! the current reading. The variant is chosen by configuration, never by
//! sniffing keys at runtime.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::error::AirlyError;

/// Index type requested from the measurement endpoint.
pub const INDEX_TYPE: &str = "AIRLY_CAQI";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// Legacy sensor API (`/v1/sensor/measurements?sensorId=`).
    V1,
    /// Installation API (`/v2/measurements/installation?installationId=`).
    #[default]
    V2,
}

impl SchemaVersion {
    pub fn measurements_url(&self, base: &str) -> String {
        match self {
            SchemaVersion::V1 => format!("{}/v1/sensor/measurements", base),
            SchemaVersion::V2 => format!("{}/v2/measurements/installation", base),
        }
    }

    pub fn measurements_query(&self, id: u32) -> Vec<(String, String)> {
        let id_param = match self {
            SchemaVersion::V1 => "sensorId",
            SchemaVersion::V2 => "installationId",
        };
        vec![
            (id_param.to_string(), id.to_string()),
            ("indexType".to_string(), INDEX_TYPE.to_string()),
        ]
    }

    pub fn station_url(&self, base: &str, id: u32) -> String {
        match self {
            SchemaVersion::V1 => format!("{}/v1/sensors/{}", base, id),
            SchemaVersion::V2 => format!("{}/v2/installations/{}", base, id),
        }
    }
}

// ── v2 measurement payload ──────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementsV2 {
    pub current: CurrentV2,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentV2 {
    #[serde(default)]
    pub from_date_time: Option<String>,
    #[serde(default)]
    pub values: Vec<NamedValue>,
    #[serde(default)]
    pub indexes: Vec<IndexV2>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedValue {
    pub name: String,
    #[serde(default)]
    pub value: Option<f64>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct IndexV2 {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub advice: Option<String>,
}

// ── v1 measurement payload ──────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementsV1 {
    #[serde(default)]
    pub history: Vec<HistoryEntryV1>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryV1 {
    #[serde(default)]
    pub from_date_time: Option<String>,
    #[serde(default)]
    pub till_date_time: Option<String>,
    #[serde(default)]
    pub measurements: BTreeMap<String, Option<f64>>,
}

impl HistoryEntryV1 {
    pub fn has_measurements(&self) -> bool {
        self.measurements.values().any(Option::is_some)
    }
}

impl MeasurementsV1 {
    /// Newest history entry that carries at least one value.
    pub fn latest(&self) -> Option<&HistoryEntryV1> {
        self.history.iter().rev().find(|entry| entry.has_measurements())
    }
}

// ── station info payloads ───────────────────────────────────

#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct InstallationV2 {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub address: AddressV2,
    #[serde(default)]
    pub sponsor: Option<SponsorV2>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressV2 {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SponsorV2 {
    #[serde(default)]
    pub name: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct SensorInfoV1 {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub address: AddressV1,
    /// Older sensors name the person or company that funded them.
    #[serde(default)]
    pub founder: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressV1 {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub street_number: Option<String>,
}

// ── tagged unions ───────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum MeasurementPayload {
    V1(MeasurementsV1),
    V2(MeasurementsV2),
}

#[derive(Debug, Clone)]
pub enum StationPayload {
    V1(SensorInfoV1),
    V2(InstallationV2),
}

impl MeasurementPayload {
    pub fn from_value(schema: SchemaVersion, value: Value) -> Result<Self, AirlyError> {
        Ok(match schema {
            SchemaVersion::V1 => MeasurementPayload::V1(typed(value)?),
            SchemaVersion::V2 => MeasurementPayload::V2(typed(value)?),
        })
    }
}

impl StationPayload {
    pub fn from_value(schema: SchemaVersion, value: Value) -> Result<Self, AirlyError> {
        Ok(match schema {
            SchemaVersion::V1 => StationPayload::V1(typed(value)?),
            SchemaVersion::V2 => StationPayload::V2(typed(value)?),
        })
    }
}

/// A 200 body that is JSON but not the shape we expect.
fn typed<T: DeserializeOwned>(value: Value) -> Result<T, AirlyError> {
    serde_json::from_value(value).map_err(|e| AirlyError::Unrecognized {
        status: 200,
        message: format!("unexpected payload shape: {}", e),
    })
}
