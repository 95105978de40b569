use std::time::Duration;

use anyhow::{Result, bail};
use tokio::time::Instant;

use crate::sensor::{AnalogInput, AveragedReading, DigitalOutput, Sensor, SensorKind};

pub const DEFAULT_BATTERY_NAME: &str = "Battery Zener Sensor";

/// Electrical parameters of a zener-protected battery divider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryConfig {
    /// Voltage reported as 100 %. About 4.2 V for a charged 18650 cell.
    pub high_voltage: f32,
    /// Voltage reported as 0 %.
    pub low_voltage: f32,
    /// Samples averaged by one synchronous [`Sensor::reading`].
    pub samples_per_reading: u32,
    /// Minimum spacing between samples in averaged mode.
    pub sample_interval: Duration,
    /// Divider resistor between the battery and the ADC pin, in ohms.
    pub r1_ohms: f32,
    /// Divider resistor between the ADC pin and ground, in ohms.
    pub r2_ohms: f32,
    pub reference_voltage: f32,
    pub adc_full_scale: u16,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            high_voltage: 4.2,
            low_voltage: 2.7,
            samples_per_reading: 10_000,
            sample_interval: Duration::from_millis(5),
            r1_ohms: 36_000.0,
            r2_ohms: 10_000.0,
            reference_voltage: 3.3,
            adc_full_scale: 4095,
        }
    }
}

impl BatteryConfig {
    pub fn with_bounds(high_voltage: f32, low_voltage: f32) -> Self {
        Self {
            high_voltage,
            low_voltage,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.high_voltage > self.low_voltage) {
            bail!(
                "battery high voltage {} must be above low voltage {}",
                self.high_voltage,
                self.low_voltage
            );
        }
        if self.r1_ohms < 0.0 || self.r2_ohms <= 0.0 {
            bail!("invalid divider resistors: R1={} R2={}", self.r1_ohms, self.r2_ohms);
        }
        if self.adc_full_scale == 0 {
            bail!("ADC full scale must not be zero");
        }
        Ok(())
    }

    /// Fraction of the battery voltage that reaches the ADC: `R2 / (R1 + R2)`.
    pub fn divider_ratio(&self) -> f32 {
        self.r2_ohms / (self.r1_ohms + self.r2_ohms)
    }

    pub fn adc_voltage(&self, raw: u16) -> f32 {
        f32::from(raw) / f32::from(self.adc_full_scale) * self.reference_voltage
    }

    /// Recovers the battery voltage from the divided voltage seen by the ADC.
    pub fn battery_voltage(&self, adc_voltage: f32) -> f32 {
        adc_voltage / self.divider_ratio()
    }

    /// Maps a battery voltage linearly onto 0-100 %, clamped to the configured bounds.
    pub fn percentage(&self, battery_voltage: f32) -> f32 {
        let clamped = battery_voltage.clamp(self.low_voltage, self.high_voltage);
        let percentage =
            (clamped - self.low_voltage) / (self.high_voltage - self.low_voltage) * 100.0;
        percentage.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Default)]
struct AveragingCycle {
    sum: f64,
    samples: u32,
    last_sample: Option<Instant>,
}

pub struct BatteryZenerSensor {
    name: String,
    pin: u8,
    config: BatteryConfig,
    adc: Box<dyn AnalogInput>,
    control: Option<Box<dyn DigitalOutput>>,
    last_error: String,
    cycle: AveragingCycle,
}

impl BatteryZenerSensor {
    pub fn new(pin: u8, config: BatteryConfig, adc: Box<dyn AnalogInput>) -> Self {
        Self {
            name: DEFAULT_BATTERY_NAME.to_string(),
            pin,
            config,
            adc,
            control: None,
            last_error: String::new(),
            cycle: AveragingCycle::default(),
        }
    }

    /// Adds an output that powers the divider; it is driven high by `begin()`.
    pub fn with_control(mut self, control: Box<dyn DigitalOutput>) -> Self {
        self.control = Some(control);
        self
    }

    pub fn config(&self) -> &BatteryConfig {
        &self.config
    }

    /// Samples accumulated in the current averaging cycle.
    pub fn pending_samples(&self) -> u32 {
        self.cycle.samples
    }

    fn read_pin(&mut self) -> Option<f32> {
        self.adc.read_raw().map(|raw| self.config.adc_voltage(raw))
    }

    fn convert(&self, adc_voltage: f32) -> f32 {
        self.config
            .percentage(self.config.battery_voltage(adc_voltage))
    }

    fn fail<T>(&mut self, message: &str) -> Result<T> {
        self.last_error = message.to_string();
        bail!("{} ({} on pin {})", message, self.name, self.pin)
    }

    fn check_config(&mut self) -> Result<()> {
        if let Err(err) = self.config.validate() {
            self.last_error = err.to_string();
            return Err(err);
        }
        Ok(())
    }
}

impl Sensor for BatteryZenerSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn pin(&self) -> u8 {
        self.pin
    }

    fn kind(&self) -> SensorKind {
        SensorKind::BatteryZener
    }

    fn begin(&mut self) -> bool {
        if self.check_config().is_err() {
            return false;
        }

        if let Some(control) = self.control.as_mut() {
            control.set_high(true);
        }

        if self.read_pin().is_none() {
            self.last_error = "Failed to initialize battery sensor!".to_string();
            return false;
        }

        self.last_error.clear();
        true
    }

    /// Averages `samples_per_reading` back-to-back samples and returns the charge percentage.
    fn reading(&mut self) -> Result<f32> {
        self.check_config()?;

        let count = self.config.samples_per_reading;
        if count == 0 {
            return self.fail("Battery sample count must not be zero!");
        }

        let mut sum = 0f64;
        for _ in 0..count {
            let Some(voltage) = self.read_pin() else {
                return self.fail("Failed to read battery voltage!");
            };
            sum += f64::from(voltage);
        }

        self.last_error.clear();
        Ok(self.convert((sum / f64::from(count)) as f32))
    }

    /// Accumulates at most one sample per `sample_interval` while `ready_to_report` is false,
    /// then returns the percentage of the averaged samples and starts a new cycle.
    fn averaged_reading(&mut self, ready_to_report: bool) -> Result<AveragedReading> {
        self.check_config()?;

        if !ready_to_report {
            let now = Instant::now();
            let due = self
                .cycle
                .last_sample
                .is_none_or(|last| now.duration_since(last) >= self.config.sample_interval);

            if due {
                self.cycle.last_sample = Some(now);
                let Some(voltage) = self.read_pin() else {
                    return self.fail("Failed to read battery voltage!");
                };
                self.cycle.sum += f64::from(voltage);
                self.cycle.samples += 1;
            }

            return Ok(AveragedReading::Sampling);
        }

        if self.cycle.samples == 0 {
            return self.fail("Battery averaged reading completed before any sample was taken!");
        }

        let average = (self.cycle.sum / f64::from(self.cycle.samples)) as f32;
        self.cycle.sum = 0.0;
        self.cycle.samples = 0;

        self.last_error.clear();
        Ok(AveragedReading::Complete(self.convert(average)))
    }

    fn last_error(&self) -> &str {
        &self.last_error
    }
}

impl Drop for BatteryZenerSensor {
    fn drop(&mut self) {
        // The divider drains the battery while powered.
        if let Some(control) = self.control.as_mut() {
            control.set_high(false);
        }
    }
}
