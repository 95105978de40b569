use std::{fmt, str::FromStr};

use anyhow::{Error, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Single-wire digital temperature and humidity sensor (DHT22 family).
    HumidityTemperature,
    /// Battery level measured through a zener-protected voltage divider.
    BatteryZener,
    /// Raw battery voltage. No driver exists yet.
    BatteryVoltage,
    Undefined,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::HumidityTemperature => "humidity-temperature",
            SensorKind::BatteryZener => "battery-zener",
            SensorKind::BatteryVoltage => "battery-voltage",
            SensorKind::Undefined => "undefined",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "humidity-temperature" | "dht" => Ok(SensorKind::HumidityTemperature),
            "battery-zener" => Ok(SensorKind::BatteryZener),
            "battery-voltage" => Ok(SensorKind::BatteryVoltage),
            "undefined" => Ok(SensorKind::Undefined),
            _ => bail!("unknown sensor kind: {}", s),
        }
    }
}
