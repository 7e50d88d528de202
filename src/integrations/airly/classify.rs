//! Maps a raw HTTP response to a JSON payload or a typed [`AirlyError`].

use serde_json::Value;

use super::error::AirlyError;
use super::fetcher::RawResponse;
use super::schema::SchemaVersion;

/// Classify a response from either endpoint.
///
/// The body is decoded before the status is inspected. A 200 with an
/// undecodable body is a [`AirlyError::Decode`]; for any other status the
/// body only supplies the message, so a broken body still classifies by
/// status.
pub fn classify(resp: &RawResponse) -> Result<Value, AirlyError> {
    let decoded = decode_body(&resp.body);

    if resp.status == 200 {
        return decoded;
    }

    let body = decoded.unwrap_or(Value::Null);
    match resp.status {
        401 | 403 | 404 => Err(AirlyError::Unauthorized(message_or(&body, "Unauthorized"))),
        429 => Err(AirlyError::RateLimited(message_or(&body, "Too many requests"))),
        status => Err(AirlyError::Unrecognized {
            status,
            message: message_or(&body, "Unknown error"),
        }),
    }
}

/// Classify a measurement response. A 200 without current measurements
/// means the installation id has no data upstream.
pub fn classify_measurements(
    resp: &RawResponse,
    schema: SchemaVersion,
    installation_id: u32,
) -> Result<Value, AirlyError> {
    let payload = classify(resp)?;
    if !has_current_measurements(&payload, schema) {
        return Err(AirlyError::NotFound(installation_id));
    }
    Ok(payload)
}

fn decode_body(body: &[u8]) -> Result<Value, AirlyError> {
    let text = std::str::from_utf8(body).map_err(|e| AirlyError::Decode(e.to_string()))?;
    serde_json::from_str(text).map_err(|e| AirlyError::Decode(e.to_string()))
}

fn message_or(body: &Value, default: &str) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}

fn has_current_measurements(payload: &Value, schema: SchemaVersion) -> bool {
    match schema {
        SchemaVersion::V2 => {
            let Some(current) = payload.get("current").and_then(Value::as_object) else {
                return false;
            };
            let non_empty = |key: &str| {
                current
                    .get(key)
                    .and_then(Value::as_array)
                    .is_some_and(|list| !list.is_empty())
            };
            non_empty("values") || non_empty("indexes")
        }
        SchemaVersion::V1 => payload
            .get("history")
            .and_then(Value::as_array)
            .is_some_and(|entries| {
                entries.iter().any(|entry| {
                    entry
                        .get("measurements")
                        .and_then(Value::as_object)
                        .is_some_and(|m| m.values().any(|v| !v.is_null()))
                })
            }),
    }
}
