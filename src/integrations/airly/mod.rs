//! Airly air quality integration
//!
//! Polls the Airly API for one installation and republishes CAQI,
//! particulates, temperature, pressure and humidity as sensor entities.
//! The host drives [`AirlyIntegration::heartbeat`] every few seconds; the
//! scheduler decides whether a heartbeat actually hits the network.
//!
//! Airly limits free API keys to 100 requests per day, so the poll interval
//! (default 15 minutes) is deliberately far longer than the heartbeat.
//! Developer portal: https://developer.airly.eu

pub mod channels;
pub mod classify;
pub mod error;
pub mod fetcher;
pub mod normalize;
pub mod publisher;
pub mod scheduler;
pub mod schema;
pub mod sink;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::AirlyConfig;
use crate::i18n::{self, Translator};

use channels::{Channel, Reading};
use error::AirlyError;
use fetcher::{ApiRequest, Fetcher};
use publisher::ReadingStore;
use scheduler::{Clock, PollScheduler, PollState};
use schema::{MeasurementPayload, SchemaVersion, StationPayload};
use sink::ChannelSink;

/// What a single heartbeat did.
#[derive(Debug, Clone, PartialEq)]
pub enum Heartbeat {
    /// Not eligible yet, or a poll is already in flight. No HTTP calls.
    Skipped,
    /// Poll succeeded; number of channels written to the sink.
    Published(usize),
    /// Poll failed; already logged and reflected in the schedule.
    Failed(AirlyError),
}

/// Station identity and endpoint selection, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct Station {
    pub installation_id: u32,
    pub schema: SchemaVersion,
    pub api_base: String,
}

impl Station {
    pub fn from_config(config: &AirlyConfig) -> Self {
        Self {
            installation_id: config.installation_id,
            schema: config.schema,
            api_base: config.api_base.clone(),
        }
    }

    fn info_request(&self) -> ApiRequest {
        ApiRequest::new(self.schema.station_url(&self.api_base, self.installation_id))
    }

    fn measurements_request(&self) -> ApiRequest {
        ApiRequest::new(self.schema.measurements_url(&self.api_base))
            .with_query(self.schema.measurements_query(self.installation_id))
    }
}

/// Everything one Airly installation needs between heartbeats.
pub struct AirlyIntegration<F, S, C> {
    station: Station,
    fetcher: F,
    sink: S,
    clock: C,
    tr: Translator,
    scheduler: PollScheduler,
    store: Mutex<ReadingStore>,
    /// Resolved address text, cached once fetched.
    station_text: Mutex<Option<String>>,
    /// Station info is requested on the first admitted cycle only.
    station_attempted: AtomicBool,
}

impl<F: Fetcher, S: ChannelSink, C: Clock> AirlyIntegration<F, S, C> {
    pub fn new(
        station: Station,
        poll_interval: Duration,
        fetcher: F,
        sink: S,
        clock: C,
        tr: Translator,
    ) -> Self {
        let scheduler = PollScheduler::new(poll_interval, clock.now());
        Self {
            station,
            fetcher,
            sink,
            clock,
            tr,
            scheduler,
            store: Mutex::new(ReadingStore::new()),
            station_text: Mutex::new(None),
            station_attempted: AtomicBool::new(false),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn poll_state(&self) -> PollState {
        self.scheduler.snapshot()
    }

    pub fn station_text(&self) -> Option<String> {
        lock(&self.station_text).clone()
    }

    pub fn reading(&self, channel: Channel) -> Option<Reading> {
        lock(&self.store).get(channel).cloned()
    }

    /// Host heartbeat. Runs at most one poll cycle and never fails: errors
    /// are logged and folded into the schedule.
    pub async fn heartbeat(&self) -> Heartbeat {
        let Some(_guard) = self.scheduler.try_begin(self.clock.now()) else {
            return Heartbeat::Skipped;
        };

        match self.poll().await {
            Ok(updated) => {
                tracing::debug!(
                    updated,
                    next_poll = %self.scheduler.next_eligible(),
                    "Airly poll complete"
                );
                Heartbeat::Published(updated)
            }
            Err(e) => {
                self.handle_failure(&e);
                Heartbeat::Failed(e)
            }
        }
    }

    async fn poll(&self) -> Result<usize, AirlyError> {
        let mut updated = 0;

        // a failure here aborts the first cycle only; later cycles go
        // straight to measurements
        if !self.station_attempted.swap(true, Ordering::SeqCst) {
            let installation = self.station.installation_id;
            match self.fetch_station_text().await? {
                Some(text) => {
                    tracing::info!(installation, "Station: {}", text);
                    *lock(&self.station_text) = Some(text.clone());

                    let mut readings = BTreeMap::new();
                    readings.insert(Channel::StationLocation, Reading::new(0, text));
                    updated += self.publish(&readings);
                }
                None => tracing::warn!(installation, "Station address missing, location not published"),
            }
        }

        let req = self.station.measurements_request();
        let resp = self.fetcher.fetch(&req).await?;
        let value = classify::classify_measurements(
            &resp,
            self.station.schema,
            self.station.installation_id,
        )?;
        let payload = MeasurementPayload::from_value(self.station.schema, value)?;

        let measurements = normalize::normalize(&payload, &self.tr);
        let readings = normalize::readings(&measurements);
        updated += self.publish(&readings);
        Ok(updated)
    }

    async fn fetch_station_text(&self) -> Result<Option<String>, AirlyError> {
        let resp = self.fetcher.fetch(&self.station.info_request()).await?;
        let value = classify::classify(&resp)?;
        let payload = StationPayload::from_value(self.station.schema, value)?;
        Ok(normalize::station_text(&payload, &self.tr))
    }

    fn publish(&self, readings: &BTreeMap<Channel, Reading>) -> usize {
        lock(&self.store).merge(readings);
        publisher::publish(readings, &self.sink, &self.tr)
    }

    fn handle_failure(&self, err: &AirlyError) {
        let installation = self.station.installation_id;
        let kind = err.kind();
        match err {
            AirlyError::Transport(cause) => {
                tracing::error!(installation, kind, "{}: {}", self.tr.tr("Connection to airly api failed"), cause);
            }
            AirlyError::Decode(cause) => {
                let now = self.clock.now();
                self.scheduler.retry_now(now);
                tracing::error!(installation, kind, "Response decode failed, retrying on next heartbeat: {}", cause);
            }
            AirlyError::Unauthorized(message) => {
                tracing::error!(installation, kind, "{}: {}", self.tr.tr("Not authorized"), message);
                tracing::error!("{}", self.tr.tr(i18n::API_KEY_HINT));
            }
            AirlyError::NotFound(id) => {
                let text = i18n::fill(self.tr.tr(i18n::SENSOR_NOT_FOUND), &[("id", id.to_string().as_str())]);
                tracing::error!(installation, kind, "{}", text);
            }
            AirlyError::RateLimited(message) => {
                let next = self.scheduler.postpone(scheduler::rate_limit_cooldown());
                tracing::error!(installation, kind, "{}", message);
                tracing::error!(installation, "{}: {}", self.tr.tr("Next poll attempt at"), next);
            }
            AirlyError::Unrecognized { status, message } => {
                tracing::error!(installation, kind, status, "{}: {}: {}", self.tr.tr("Unrecognized error"), status, message);
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Drive the heartbeat from a background task. Heartbeats run strictly one
/// after another; the first one fires immediately.
pub fn start_airly_poller<F, S, C>(integration: Arc<AirlyIntegration<F, S, C>>, every: Duration)
where
    F: Fetcher + 'static,
    S: ChannelSink + 'static,
    C: Clock + 'static,
{
    tokio::spawn(async move {
        tracing::info!(
            installation = integration.station.installation_id,
            schema = ?integration.station.schema,
            heartbeat_secs = every.as_secs(),
            "Airly integration active"
        );

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            integration.heartbeat().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;
    use tokio::sync::Notify;

    use super::fetcher::RawResponse;
    use super::publisher::tests::RecordingSink;

    const INTERVAL: Duration = Duration::from_secs(900);

    #[derive(Clone)]
    struct TestClock(Arc<Mutex<DateTime<Utc>>>);

    impl TestClock {
        fn at(t: DateTime<Utc>) -> Self {
            Self(Arc::new(Mutex::new(t)))
        }

        fn advance(&self, by: chrono::Duration) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    /// Replays scripted responses in order and records every request.
    #[derive(Clone, Default)]
    struct MockFetcher {
        responses: Arc<Mutex<VecDeque<Result<RawResponse, AirlyError>>>>,
        calls: Arc<Mutex<Vec<ApiRequest>>>,
        /// Each fetch moves this clock forward by two seconds.
        clock: Option<TestClock>,
        /// The first fetch blocks until notified.
        gate: Arc<Mutex<Option<Arc<Notify>>>>,
    }

    impl MockFetcher {
        fn push(&self, status: u16, body: serde_json::Value) {
            self.push_raw(status, body.to_string().as_bytes());
        }

        fn push_raw(&self, status: u16, body: &[u8]) {
            self.responses.lock().unwrap().push_back(Ok(RawResponse {
                status,
                body: body.to_vec(),
            }));
        }

        fn push_err(&self, err: AirlyError) {
            self.responses.lock().unwrap().push_back(Err(err));
        }

        fn urls(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|r| r.url.clone()).collect()
        }
    }

    impl Fetcher for MockFetcher {
        async fn fetch(&self, req: &ApiRequest) -> Result<RawResponse, AirlyError> {
            self.calls.lock().unwrap().push(req.clone());
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if let Some(clock) = &self.clock {
                clock.advance(chrono::Duration::seconds(2));
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AirlyError::Transport("no scripted response".into())))
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    fn station() -> Station {
        Station {
            installation_id: 204,
            schema: SchemaVersion::V2,
            api_base: "https://airapi.airly.eu".to_string(),
        }
    }

    fn make(
        fetcher: MockFetcher,
        clock: TestClock,
    ) -> AirlyIntegration<MockFetcher, RecordingSink, TestClock> {
        AirlyIntegration::new(
            station(),
            INTERVAL,
            fetcher,
            RecordingSink::default(),
            clock,
            Translator::new("en"),
        )
    }

    fn installation_body() -> serde_json::Value {
        json!({
            "id": 204,
            "address": {"country": "Poland", "city": "Kraków", "street": "Mikołajska", "number": "4"},
            "sponsor": {"name": "Airly"}
        })
    }

    fn full_measurements() -> serde_json::Value {
        json!({
            "current": {
                "values": [
                    {"name": "PM1", "value": 8.0},
                    {"name": "PM25", "value": 12.5},
                    {"name": "PM10", "value": 120.0},
                    {"name": "PRESSURE", "value": 1013.2},
                    {"name": "HUMIDITY", "value": 39.0},
                    {"name": "TEMPERATURE", "value": 3.0}
                ],
                "indexes": [{
                    "name": "AIRLY_CAQI", "value": 75.0, "level": "HIGH",
                    "description": "Air is bad.", "advice": "Stay at home."
                }]
            }
        })
    }

    #[tokio::test]
    async fn test_first_heartbeat_fetches_station_then_measurements() {
        let fetcher = MockFetcher::default();
        fetcher.push(200, installation_body());
        fetcher.push(200, full_measurements());
        let integ = make(fetcher.clone(), TestClock::at(t0()));

        let outcome = integ.heartbeat().await;
        assert_eq!(outcome, Heartbeat::Published(12));

        assert_eq!(
            fetcher.urls(),
            vec![
                "https://airapi.airly.eu/v2/installations/204".to_string(),
                "https://airapi.airly.eu/v2/measurements/installation".to_string(),
            ]
        );
        let query = fetcher.calls.lock().unwrap()[1].query.clone();
        assert!(query.contains(&("installationId".to_string(), "204".to_string())));

        assert_eq!(
            integ.station_text().as_deref(),
            Some("Mikołajska 4, Kraków<br/>Station founder: Airly")
        );
        assert_eq!(integ.reading(Channel::Pm10Norm), Some(Reading::new(0, "240,0")));
        assert_eq!(integ.reading(Channel::Pm25Norm), Some(Reading::new(0, "50,0")));
        assert_eq!(integ.reading(Channel::PollutionLevel), Some(Reading::new(3, "Air is bad.")));
        assert_eq!(integ.reading(Channel::Humidity), Some(Reading::new(39, "2")));

        let state = integ.poll_state();
        assert!(!state.in_progress);
        assert_eq!(state.next_eligible, t0() + chrono::Duration::seconds(900));
    }

    #[tokio::test]
    async fn test_heartbeat_before_interval_makes_no_calls() {
        let fetcher = MockFetcher::default();
        fetcher.push(200, installation_body());
        fetcher.push(200, full_measurements());
        let clock = TestClock::at(t0());
        let integ = make(fetcher.clone(), clock.clone());

        integ.heartbeat().await;
        clock.advance(chrono::Duration::seconds(20));
        assert_eq!(integ.heartbeat().await, Heartbeat::Skipped);
        assert_eq!(fetcher.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_station_cached_after_first_cycle() {
        let fetcher = MockFetcher::default();
        fetcher.push(200, installation_body());
        fetcher.push(200, full_measurements());
        fetcher.push(200, full_measurements());
        let clock = TestClock::at(t0());
        let integ = make(fetcher.clone(), clock.clone());

        integ.heartbeat().await;
        clock.advance(chrono::Duration::seconds(900));
        assert_eq!(integ.heartbeat().await, Heartbeat::Published(11));

        let urls = fetcher.urls();
        assert_eq!(urls.len(), 3);
        assert!(urls[2].ends_with("/v2/measurements/installation"));
    }

    #[tokio::test]
    async fn test_absent_fields_are_not_written() {
        let fetcher = MockFetcher::default();
        fetcher.push(200, installation_body());
        fetcher.push(200, full_measurements());
        fetcher.push(200, json!({"current": {"values": [{"name": "PM10", "value": 60.0}]}}));
        let clock = TestClock::at(t0());
        let integ = make(fetcher.clone(), clock.clone());

        integ.heartbeat().await;
        integ.sink().updates.lock().unwrap().clear();

        clock.advance(chrono::Duration::seconds(900));
        assert_eq!(integ.heartbeat().await, Heartbeat::Published(2));
        assert_eq!(
            integ.sink().updated_ids(),
            vec![Channel::Pm10.id(), Channel::Pm10Norm.id()]
        );

        // the store still remembers the stale values
        assert_eq!(integ.reading(Channel::Temperature), Some(Reading::new(0, "3,0")));
        assert_eq!(integ.reading(Channel::Pm10Norm), Some(Reading::new(0, "120,0")));
    }

    #[tokio::test]
    async fn test_station_failure_aborts_cycle() {
        let fetcher = MockFetcher::default();
        fetcher.push(401, json!({"message": "Invalid authentication credentials"}));
        let integ = make(fetcher.clone(), TestClock::at(t0()));

        let outcome = integ.heartbeat().await;
        assert_eq!(
            outcome,
            Heartbeat::Failed(AirlyError::Unauthorized(
                "Invalid authentication credentials".to_string()
            ))
        );
        assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
        assert!(integ.sink().updates.lock().unwrap().is_empty());

        let state = integ.poll_state();
        assert!(!state.in_progress);
        assert!(state.next_eligible > t0());
    }

    #[tokio::test]
    async fn test_station_failure_does_not_block_later_cycles() {
        let fetcher = MockFetcher::default();
        fetcher.push_err(AirlyError::Transport("dns error".into()));
        fetcher.push(200, full_measurements());
        fetcher.push(200, full_measurements());
        let clock = TestClock::at(t0());
        let integ = make(fetcher.clone(), clock.clone());

        assert!(matches!(integ.heartbeat().await, Heartbeat::Failed(AirlyError::Transport(_))));
        assert_eq!(integ.poll_state().next_eligible, t0() + chrono::Duration::seconds(900));

        clock.advance(chrono::Duration::seconds(900));
        assert_eq!(integ.heartbeat().await, Heartbeat::Published(11));
        clock.advance(chrono::Duration::seconds(900));
        assert_eq!(integ.heartbeat().await, Heartbeat::Published(11));

        assert_eq!(
            fetcher.urls(),
            vec![
                "https://airapi.airly.eu/v2/installations/204".to_string(),
                "https://airapi.airly.eu/v2/measurements/installation".to_string(),
                "https://airapi.airly.eu/v2/measurements/installation".to_string(),
            ]
        );
        assert!(integ.station_text().is_none());
        assert!(!integ.sink().updated_ids().contains(&Channel::StationLocation.id()));
    }

    #[tokio::test]
    async fn test_station_without_city_still_polls_measurements() {
        let fetcher = MockFetcher::default();
        fetcher.push(200, json!({"address": {}, "sponsor": {"name": "Airly"}}));
        fetcher.push(200, full_measurements());
        fetcher.push(200, full_measurements());
        let clock = TestClock::at(t0());
        let integ = make(fetcher.clone(), clock.clone());

        assert_eq!(integ.heartbeat().await, Heartbeat::Published(11));
        clock.advance(chrono::Duration::seconds(900));
        assert_eq!(integ.heartbeat().await, Heartbeat::Published(11));

        let urls = fetcher.urls();
        assert_eq!(urls.len(), 3);
        assert!(urls[0].ends_with("/v2/installations/204"));
        assert!(urls[1].ends_with("/v2/measurements/installation"));
        assert!(urls[2].ends_with("/v2/measurements/installation"));
        assert!(integ.station_text().is_none());
        assert_eq!(integ.reading(Channel::StationLocation), None);
    }

    #[tokio::test]
    async fn test_rate_limit_adds_cooldown() {
        let fetcher = MockFetcher::default();
        fetcher.push(200, installation_body());
        fetcher.push(429, json!({"message": "Rate limit exceeded"}));
        let integ = make(fetcher.clone(), TestClock::at(t0()));

        let outcome = integ.heartbeat().await;
        assert_eq!(
            outcome,
            Heartbeat::Failed(AirlyError::RateLimited("Rate limit exceeded".to_string()))
        );
        assert_eq!(
            integ.poll_state().next_eligible,
            t0() + chrono::Duration::seconds(900) + chrono::Duration::hours(1)
        );
    }

    #[tokio::test]
    async fn test_decode_failure_forces_immediate_retry() {
        let clock = TestClock::at(t0());
        let fetcher = MockFetcher {
            clock: Some(clock.clone()),
            ..Default::default()
        };
        fetcher.push(200, installation_body());
        fetcher.push_raw(200, b"<html>502 bad gateway</html>");
        fetcher.push(200, full_measurements());
        let integ = make(fetcher.clone(), clock.clone());

        assert!(matches!(integ.heartbeat().await, Heartbeat::Failed(AirlyError::Decode(_))));
        // two fetches at two seconds each: failure detected at t0 + 4s
        let detected = t0() + chrono::Duration::seconds(4);
        assert_eq!(integ.poll_state().next_eligible, detected);
        assert_eq!(clock.now(), detected);

        assert_eq!(integ.heartbeat().await, Heartbeat::Published(11));
    }

    #[tokio::test]
    async fn test_empty_current_is_not_found() {
        let fetcher = MockFetcher::default();
        fetcher.push(200, installation_body());
        fetcher.push(200, json!({"current": {"values": [], "indexes": []}}));
        let integ = make(fetcher.clone(), TestClock::at(t0()));

        assert_eq!(integ.heartbeat().await, Heartbeat::Failed(AirlyError::NotFound(204)));
        assert!(integ.poll_state().next_eligible > t0());
        // station text was still published before the measurement failed
        assert_eq!(integ.sink().updated_ids(), vec![Channel::StationLocation.id()]);
    }

    #[tokio::test]
    async fn test_unrecognized_status_keeps_spacing() {
        let fetcher = MockFetcher::default();
        fetcher.push(200, installation_body());
        fetcher.push(500, json!({"message": "Internal error"}));
        let integ = make(fetcher.clone(), TestClock::at(t0()));

        assert_eq!(
            integ.heartbeat().await,
            Heartbeat::Failed(AirlyError::Unrecognized {
                status: 500,
                message: "Internal error".to_string()
            })
        );
        assert_eq!(integ.poll_state().next_eligible, t0() + chrono::Duration::seconds(900));
    }

    #[tokio::test]
    async fn test_overlapping_heartbeat_is_single_flight() {
        let gate = Arc::new(Notify::new());
        let fetcher = MockFetcher {
            gate: Arc::new(Mutex::new(Some(gate.clone()))),
            ..Default::default()
        };
        fetcher.push(200, installation_body());
        fetcher.push(200, full_measurements());
        let clock = TestClock::at(t0());
        let integ = make(fetcher.clone(), clock.clone());

        let (first, second, _) = tokio::join!(
            integ.heartbeat(),
            async {
                // well past the interval, so only the in-flight flag can stop it
                clock.advance(chrono::Duration::hours(2));
                let calls_before = fetcher.calls.lock().unwrap().len();
                let outcome = integ.heartbeat().await;
                assert_eq!(fetcher.calls.lock().unwrap().len(), calls_before);
                outcome
            },
            async {
                gate.notify_one();
            },
        );

        assert_eq!(first, Heartbeat::Published(12));
        assert_eq!(second, Heartbeat::Skipped);
        assert_eq!(fetcher.calls.lock().unwrap().len(), 2);
        assert!(!integ.poll_state().in_progress);
    }

    #[tokio::test]
    async fn test_v1_schema_cycle() {
        let fetcher = MockFetcher::default();
        fetcher.push(
            200,
            json!({"vendor": "Airly", "founder": "Gmina", "address": {"locality": "Wieliczka"}}),
        );
        fetcher.push(
            200,
            json!({"history": [
                {"measurements": {"pm25": 30.0, "pm10": 45.0, "pollutionLevel": 3.0, "airQualityIndex": 48.0}},
                {"measurements": {}}
            ]}),
        );
        let integ = AirlyIntegration::new(
            Station {
                installation_id: 77,
                schema: SchemaVersion::V1,
                api_base: "https://airapi.airly.eu".to_string(),
            },
            INTERVAL,
            fetcher.clone(),
            RecordingSink::default(),
            TestClock::at(t0()),
            Translator::new("en"),
        );

        // station, pm25, pm25 norm, pm10, pm10 norm, index, level
        assert_eq!(integ.heartbeat().await, Heartbeat::Published(7));
        let calls = fetcher.calls.lock().unwrap().clone();
        assert_eq!(calls[0].url, "https://airapi.airly.eu/v1/sensors/77");
        assert!(calls[1].query.contains(&("sensorId".to_string(), "77".to_string())));
        assert_eq!(integ.reading(Channel::PollutionLevel), Some(Reading::new(2, "Medium")));
        assert_eq!(integ.station_text().as_deref(), Some("Airly - Wieliczka<br/>Station founder: Gmina"));
    }
}
