use tokio::time::Instant;

use crate::sensor::SensorKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    TemperatureHumidity {
        temperature_celsius: f32,
        humidity_percent: f32,
    },
    BatteryLevel {
        percent: f32,
    },
}

impl Measurement {
    /// Main value: temperature, or charge percentage for batteries.
    pub fn primary(&self) -> f32 {
        match self {
            Measurement::TemperatureHumidity {
                temperature_celsius,
                ..
            } => *temperature_celsius,
            Measurement::BatteryLevel { percent } => *percent,
        }
    }

    /// Humidity for humidity/temperature sensors; single-value sensors have none.
    pub fn secondary(&self) -> Option<f32> {
        match self {
            Measurement::TemperatureHumidity {
                humidity_percent, ..
            } => Some(*humidity_percent),
            Measurement::BatteryLevel { .. } => None,
        }
    }
}

/// Cached state of one registered sensor, written only by the refresh cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorData {
    /// Last successful measurement. Kept when a later read fails.
    pub measurement: Option<Measurement>,

    pub is_valid: bool,

    pub last_read_at: Option<Instant>,

    /// Failed reads since the last success.
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorInfo {
    pub name: String,

    pub pin: u8,

    pub kind: SensorKind,
}
