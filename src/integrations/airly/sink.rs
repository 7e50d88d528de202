//! Where readings end up: the host's entity registry.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::api::AppState;

use super::channels::ChannelDescriptor;

/// Host device registry, keyed by the stable channel id.
pub trait ChannelSink: Send + Sync {
    /// Create the channel unless it already exists. Returns `true` when it
    /// was created by this call; repeated calls are a no-op.
    fn ensure_channel(&self, descriptor: &ChannelDescriptor) -> bool;

    fn update_channel(&self, id: u8, n_value: i64, s_value: &str);
}

/// Publishes each channel as a `sensor.airly_<slug>` entity in the state
/// machine.
pub struct EntitySink {
    app: Arc<AppState>,
    channels: DashMap<u8, ChannelDescriptor>,
}

impl EntitySink {
    pub fn new(app: Arc<AppState>) -> Self {
        Self {
            app,
            channels: DashMap::new(),
        }
    }

    pub fn entity_id(descriptor: &ChannelDescriptor) -> String {
        format!("sensor.airly_{}", descriptor.channel.slug())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl ChannelSink for EntitySink {
    fn ensure_channel(&self, descriptor: &ChannelDescriptor) -> bool {
        if self.channels.contains_key(&descriptor.id) {
            tracing::debug!(
                unit = descriptor.id,
                name = %descriptor.name,
                "Device already exists"
            );
            return false;
        }

        tracing::debug!(
            unit = descriptor.id,
            name = %descriptor.name,
            kind = ?descriptor.kind,
            used = descriptor.used,
            "Creating device"
        );
        self.channels.insert(descriptor.id, descriptor.clone());
        true
    }

    fn update_channel(&self, id: u8, n_value: i64, s_value: &str) {
        let Some(descriptor) = self.channels.get(&id).map(|d| d.value().clone()) else {
            tracing::warn!(unit = id, "Update for unknown device ignored");
            return;
        };

        let mut attrs = serde_json::Map::new();
        attrs.insert("friendly_name".into(), Value::String(descriptor.name.clone()));
        attrs.insert("integration".into(), Value::String("airly".into()));
        attrs.insert("unit".into(), serde_json::json!(descriptor.id));
        attrs.insert("n_value".into(), serde_json::json!(n_value));
        attrs.insert("display".into(), serde_json::json!(descriptor.kind));
        attrs.insert("icon".into(), serde_json::json!(descriptor.icon));
        attrs.insert("used".into(), Value::Bool(descriptor.used));
        if let Some(unit) = descriptor.kind.unit() {
            attrs.insert("unit_of_measurement".into(), Value::String(unit.into()));
        }
        if let Some(class) = descriptor.kind.device_class() {
            attrs.insert("device_class".into(), Value::String(class.into()));
        }

        tracing::info!(unit = id, n_value, s_value, "Update");
        self.app
            .state_machine
            .set(Self::entity_id(&descriptor), s_value.to_string(), attrs);
    }
}
