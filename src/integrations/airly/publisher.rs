//! Reading store and the push to the sink.

use std::collections::BTreeMap;

use crate::i18n::Translator;

use super::channels::{Channel, Reading};
use super::sink::ChannelSink;

/// Last known reading per channel. A poll only overwrites the channels it
/// produced; the rest keep their previous value.
#[derive(Debug, Default)]
pub struct ReadingStore {
    readings: BTreeMap<Channel, Reading>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, fresh: &BTreeMap<Channel, Reading>) {
        for (channel, reading) in fresh {
            self.readings.insert(*channel, reading.clone());
        }
    }

    pub fn get(&self, channel: Channel) -> Option<&Reading> {
        self.readings.get(&channel)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Push `readings` to the sink, creating channels on first use.
///
/// Only channels present in `readings` with a non-empty display string are
/// touched. Returns the number of channels updated.
pub fn publish(readings: &BTreeMap<Channel, Reading>, sink: &dyn ChannelSink, tr: &Translator) -> usize {
    tracing::info!("{}", tr.tr("Starting device update"));
    let mut updated = 0;
    for (channel, reading) in readings {
        if reading.s_value.is_empty() {
            continue;
        }
        sink.ensure_channel(&channel.descriptor(tr));
        sink.update_channel(channel.id(), reading.n_value, &reading.s_value);
        updated += 1;
    }
    updated
}
