//! Sensor registry and the background refresh cycle that keeps its cached readings current.

mod data;
mod poller;

pub use data::*;
pub use poller::Poller;

use std::{
    mem,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use anyhow::{Context as _, Result, bail};
use tokio::{runtime::Handle, time::Instant};

use crate::{
    logger::Logger,
    manager::poller::{CycleContext, refresh_cycle},
    sensor::{
        BatteryConfig, BatteryZenerSensor, DEFAULT_HUMIDITY_TEMPERATURE_NAME, Hardware,
        HumidityTemperatureSensor, Sensor, SensorKind,
    },
};

pub const DEFAULT_SCAN_PINS: [u8; 2] = [26, 27];

#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Pause between two refresh cycles.
    pub tick: Duration,
    /// Minimum age of a humidity/temperature reading before it is re-read.
    pub refresh_interval: Duration,
    pub scan_pins: Vec<u8>,
    /// Bounds given to batteries found by [`SensorManager::scan_for_sensors`].
    pub scan_battery_high: f32,
    pub scan_battery_low: f32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(500),
            refresh_interval: Duration::from_millis(2000),
            scan_pins: DEFAULT_SCAN_PINS.to_vec(),
            scan_battery_high: 4.2,
            scan_battery_low: 2.5,
        }
    }
}

/// A sensor the refresh cycle knows how to poll.
pub enum RegisteredSensor {
    HumidityTemperature(HumidityTemperatureSensor),
    BatteryZener(BatteryZenerSensor),
}

impl RegisteredSensor {
    pub fn as_sensor(&self) -> &dyn Sensor {
        match self {
            RegisteredSensor::HumidityTemperature(sensor) => sensor,
            RegisteredSensor::BatteryZener(sensor) => sensor,
        }
    }

    fn info(&self) -> SensorInfo {
        let sensor = self.as_sensor();
        SensorInfo {
            name: sensor.name().to_string(),
            pin: sensor.pin(),
            kind: sensor.kind(),
        }
    }
}

/// Owns the registered sensors and their cached readings.
///
/// Sensors are registered first; [`SensorManager::start_concurrent_reading`] then hands them to a
/// single background task. Registration is refused while that task runs.
pub struct SensorManager {
    hardware: Arc<dyn Hardware>,
    logger: Logger,
    config: PollerConfig,
    sensors: Vec<RegisteredSensor>,
    infos: Vec<SensorInfo>,
    readings: Arc<RwLock<Vec<SensorData>>>,
    poller: Option<Poller>,
}

impl SensorManager {
    pub fn new(hardware: Arc<dyn Hardware>, logger: Logger, config: PollerConfig) -> Self {
        Self {
            hardware,
            logger,
            config,
            sensors: Vec::new(),
            infos: Vec::new(),
            readings: Arc::new(RwLock::new(Vec::new())),
            poller: None,
        }
    }

    /// Registers a sensor of `kind` on `pin` after a successful `begin()`.
    ///
    /// Only humidity/temperature sensors can be created this way; batteries need bounds and go
    /// through [`SensorManager::register_battery_sensor`].
    pub fn register_sensor(&mut self, pin: u8, kind: SensorKind, name: &str) -> bool {
        if !self.accepts_registration() {
            return false;
        }

        match kind {
            SensorKind::HumidityTemperature => {
                let probe = self.hardware.humidity_temperature_probe(pin);
                let mut sensor = HumidityTemperatureSensor::new(pin, name, probe);
                if !sensor.begin() {
                    self.logger.error(&format!(
                        "Failed to initialize {name} on pin {pin}: {}",
                        sensor.last_error()
                    ));
                    return false;
                }
                self.push(RegisteredSensor::HumidityTemperature(sensor));
                true
            }
            SensorKind::BatteryZener | SensorKind::BatteryVoltage | SensorKind::Undefined => {
                self.logger.error(&format!(
                    "Unsupported sensor type for this method: {kind} (pin {pin})"
                ));
                false
            }
        }
    }

    /// Registers a battery sensor, validated by taking one full reading.
    pub fn register_battery_sensor(&mut self, pin: u8, high_voltage: f32, low_voltage: f32) -> bool {
        self.register_battery_sensor_with(pin, BatteryConfig::with_bounds(high_voltage, low_voltage))
    }

    pub fn register_battery_sensor_with(&mut self, pin: u8, config: BatteryConfig) -> bool {
        if !self.accepts_registration() {
            return false;
        }

        match self.probe_battery(pin, config) {
            Ok(sensor) => {
                self.push(RegisteredSensor::BatteryZener(sensor));
                true
            }
            Err(err) => {
                self.logger.error(&format!(
                    "Failed to initialize battery sensor on pin {pin}: {err:#}"
                ));
                false
            }
        }
    }

    /// Probes every configured scan pin and registers what it finds.
    ///
    /// Humidity/temperature detection runs first: it succeeds only if the protocol answers,
    /// while a floating ADC pin can still produce a plausible battery voltage.
    pub fn scan_for_sensors(&mut self) -> usize {
        if !self.accepts_registration() {
            return 0;
        }

        let mut found = 0;
        for pin in self.config.scan_pins.clone() {
            self.logger.setup(&format!("Scanning pin {pin}"));

            let probe = self.hardware.humidity_temperature_probe(pin);
            let mut dht = HumidityTemperatureSensor::new(pin, DEFAULT_HUMIDITY_TEMPERATURE_NAME, probe);
            if dht.begin() {
                self.push(RegisteredSensor::HumidityTemperature(dht));
                found += 1;
                continue;
            }

            let config =
                BatteryConfig::with_bounds(self.config.scan_battery_high, self.config.scan_battery_low);
            if let Ok(battery) = self.probe_battery(pin, config) {
                self.push(RegisteredSensor::BatteryZener(battery));
                found += 1;
                continue;
            }

            self.logger.warning(&format!("No sensor detected on pin {pin}"));
        }

        found
    }

    /// Starts the single background task that runs the refresh cycle every tick.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_concurrent_reading(&mut self) -> Result<()> {
        if self.poller.is_some() {
            bail!("sensor poller is already running");
        }

        let runtime = Handle::try_current().context("sensor polling requires a tokio runtime")?;
        let sensors = mem::take(&mut self.sensors);
        let count = sensors.len();
        self.poller = Some(Poller::spawn(
            &runtime,
            sensors,
            self.cycle_context(),
            self.config.tick,
        ));

        self.logger.info(&format!(
            "Sensor poller started for {count} sensors every {:?}",
            self.config.tick
        ));
        Ok(())
    }

    /// Stops the background task and takes the sensors back, allowing registration again.
    ///
    /// If the task died, the sensors are gone: the registry is emptied and the error returned.
    pub async fn stop_concurrent_reading(&mut self) -> Result<()> {
        let Some(poller) = self.poller.take() else {
            return Ok(());
        };

        match poller.stop().await {
            Ok(sensors) => {
                self.sensors = sensors;
                self.logger.info("Sensor poller stopped");
                Ok(())
            }
            Err(err) => {
                // The sensors died with the task; their slots go too so indices stay aligned.
                self.infos.clear();
                self.readings
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clear();
                self.logger.critical(&format!(
                    "{err:#}; sensor registry cleared, sensors must be registered again"
                ));
                Err(err)
            }
        }
    }

    /// Runs one refresh cycle on the caller's context. Not available while the poller runs.
    pub fn refresh(&mut self) -> Result<()> {
        if self.poller.is_some() {
            bail!("refresh cycle is owned by the running sensor poller");
        }

        let ctx = self.cycle_context();
        refresh_cycle(&mut self.sensors, &ctx);
        Ok(())
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(Poller::is_running)
    }

    /// Completion time of the poller's latest cycle, for liveness checks.
    pub fn last_sweep(&self) -> Option<Instant> {
        self.poller.as_ref().and_then(Poller::last_sweep)
    }

    /// Latest valid measurement of the sensor at `index`.
    pub fn sensor_data(&self, index: usize) -> Result<Measurement> {
        let Some(data) = self.snapshot(index) else {
            self.logger.warning(&format!("Invalid sensor index: {index}"));
            bail!("invalid sensor index: {index}");
        };

        match data.measurement {
            Some(measurement) if data.is_valid => Ok(measurement),
            _ => {
                self.logger
                    .warning(&format!("Sensor data is not valid: {index}"));
                bail!("sensor data is not valid: {index}")
            }
        }
    }

    /// Full cached state of the sensor at `index`, valid or not.
    pub fn snapshot(&self, index: usize) -> Option<SensorData> {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    pub fn sensor_count(&self) -> usize {
        self.infos.len()
    }

    pub fn sensor_info(&self, index: usize) -> Option<&SensorInfo> {
        self.infos.get(index)
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    fn probe_battery(&self, pin: u8, config: BatteryConfig) -> Result<BatteryZenerSensor> {
        let mut sensor = BatteryZenerSensor::new(pin, config, self.hardware.analog_input(pin));
        if !sensor.begin() {
            bail!("{}", sensor.last_error());
        }

        let reading = sensor.reading()?;
        if reading < 0.0 {
            bail!("negative battery reading: {reading}");
        }

        Ok(sensor)
    }

    fn accepts_registration(&self) -> bool {
        if self.poller.is_some() {
            self.logger
                .error("Sensors cannot be registered while the poller is running");
            return false;
        }
        true
    }

    fn push(&mut self, sensor: RegisteredSensor) {
        let info = sensor.info();
        self.logger.info(&format!(
            "Registered {} ({}) on pin {}",
            info.name, info.kind, info.pin
        ));

        self.readings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SensorData::default());
        self.infos.push(info);
        self.sensors.push(sensor);
    }

    fn cycle_context(&self) -> CycleContext {
        CycleContext {
            readings: Arc::clone(&self.readings),
            refresh_interval: self.config.refresh_interval,
            logger: self.logger.clone(),
        }
    }
}
