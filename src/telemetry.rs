//! Turns cached sensor data into stored reading lines and published messages.

use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::{
    clock::TimeSource,
    logger::Logger,
    manager::{Measurement, SensorManager},
    storage::Storage,
};

pub const DEFAULT_DATA_FILE: &str = "/sensor_data.txt";

/// Delivers a payload to a broker topic. Delivery is attempted once; there are no retries.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &str) -> Result<()>;
}

/// Joins topic segments: `temperature/greenhouse/reading`.
pub fn build_topic(topic_type: &str, location: &str, attribute: &str) -> String {
    format!("{topic_type}/{location}/{attribute}")
}

pub fn format_reading_line(timestamp: &str, temperature_celsius: f32, humidity_percent: f32) -> String {
    format!("[{timestamp}] Temp: {temperature_celsius:.2}C, Humidity: {humidity_percent:.2}%")
}

pub fn format_battery_payload(percent: f32) -> String {
    format!("{percent:.1}%")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub reading: String,
    pub battery: String,
    pub error: String,
}

impl Topics {
    pub fn new(location: &str) -> Self {
        Self {
            reading: build_topic("temperature", location, "reading"),
            battery: build_topic("temperature", location, "battery"),
            error: build_topic("temperature", location, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub published: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Stores and publishes the latest valid reading of every registered sensor.
pub struct Reporter {
    storage: Arc<dyn Storage>,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn TimeSource>,
    logger: Logger,
    topics: Topics,
    device_id: String,
    data_file: String,
}

impl Reporter {
    pub fn new(
        storage: Arc<dyn Storage>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn TimeSource>,
        logger: Logger,
        topics: Topics,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            publisher,
            clock,
            logger,
            topics,
            device_id: device_id.into(),
            data_file: DEFAULT_DATA_FILE.to_string(),
        }
    }

    pub fn with_data_file(mut self, data_file: impl Into<String>) -> Self {
        self.data_file = data_file.into();
        self
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Creates the data file on first boot.
    pub fn prepare(&self) -> Result<()> {
        if self.storage.exists(&self.data_file) {
            self.logger.setup("Data file already exists");
            return Ok(());
        }

        self.logger
            .setup("Data file does not exist. Creating a new file...");
        self.storage
            .write(&self.data_file, "")
            .with_context(|| format!("failed to create data file: {}", self.data_file))
    }

    pub fn report(&self, manager: &SensorManager) -> ReportSummary {
        let timestamp = self.clock.timestamp();
        let mut summary = ReportSummary::default();

        for index in 0..manager.sensor_count() {
            let Ok(measurement) = manager.sensor_data(index) else {
                summary.skipped += 1;
                continue;
            };

            let (topic, payload) = match measurement {
                Measurement::TemperatureHumidity {
                    temperature_celsius,
                    humidity_percent,
                } => {
                    let line =
                        format_reading_line(&timestamp, temperature_celsius, humidity_percent);
                    self.save(&line, &timestamp);
                    (&self.topics.reading, line)
                }
                Measurement::BatteryLevel { percent } => {
                    (&self.topics.battery, format_battery_payload(percent))
                }
            };

            match self.publisher.publish(topic, &payload) {
                Ok(()) => summary.published += 1,
                Err(err) => {
                    summary.failed += 1;
                    self.logger
                        .error(&format!("Failed to publish to {topic}: {err:#}"));
                }
            }
        }

        summary
    }

    fn save(&self, line: &str, timestamp: &str) {
        if !self.storage.exists(&self.data_file) {
            // Created by `prepare()`; losing it points at failing flash.
            self.logger.critical(&format!(
                "Data file {} is missing and will be recreated; stored readings are lost",
                self.data_file
            ));
            let message = format!("Filesystem Error on device {} at {}", self.device_id, timestamp);
            if let Err(err) = self.publisher.publish(&self.topics.error, &message) {
                self.logger
                    .error(&format!("Failed to publish filesystem error: {err:#}"));
            }
        }

        if let Err(err) = self.storage.append(&self.data_file, &format!("{line}\n")) {
            self.logger
                .error(&format!("Failed to save reading: {err:#}"));
        }
    }
}

#[cfg(test)]
pub(crate) use recording::RecordingPublisher;

#[cfg(test)]
mod recording {
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    };

    use anyhow::{Result, bail};

    use super::Publisher;

    #[derive(Debug, Default)]
    pub(crate) struct RecordingPublisher {
        messages: Mutex<Vec<(String, String)>>,
        fail: AtomicBool,
    }

    impl RecordingPublisher {
        pub(crate) fn fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub(crate) fn messages(&self) -> Vec<(String, String)> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl Publisher for RecordingPublisher {
        fn publish(&self, topic: &str, payload: &str) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                bail!("broker unreachable");
            }
            self.messages
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }
}
