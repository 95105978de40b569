use anyhow::{Result, bail};

use crate::sensor::{HumidityTemperatureProbe, Sensor, SensorKind};

pub const DEFAULT_HUMIDITY_TEMPERATURE_NAME: &str = "DHT Sensor";

pub struct HumidityTemperatureSensor {
    name: String,
    pin: u8,
    probe: Box<dyn HumidityTemperatureProbe>,
    last_error: String,
}

impl HumidityTemperatureSensor {
    pub fn new(pin: u8, name: impl Into<String>, probe: Box<dyn HumidityTemperatureProbe>) -> Self {
        Self {
            name: name.into(),
            pin,
            probe,
            last_error: String::new(),
        }
    }

    /// Reads both values in one go, as `(temperature_celsius, humidity_percent)`.
    pub fn read_temperature_and_humidity(&mut self) -> Result<(f32, f32)> {
        let temperature = valid(self.probe.read_temperature());
        let humidity = valid(self.probe.read_humidity());

        match (temperature, humidity) {
            (Some(temperature), Some(humidity)) => {
                self.last_error.clear();
                Ok((temperature, humidity))
            }
            _ => self.fail("Failed to read temperature and humidity!"),
        }
    }

    fn fail<T>(&mut self, message: &str) -> Result<T> {
        self.last_error = message.to_string();
        bail!("{} ({} on pin {})", message, self.name, self.pin)
    }
}

impl Sensor for HumidityTemperatureSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn pin(&self) -> u8 {
        self.pin
    }

    fn kind(&self) -> SensorKind {
        SensorKind::HumidityTemperature
    }

    fn begin(&mut self) -> bool {
        self.probe.begin();

        if valid(self.probe.read_temperature()).is_none() {
            self.last_error = "Failed to initialize DHT sensor!".to_string();
            return false;
        }

        self.last_error.clear();
        true
    }

    /// Temperature only; use [`HumidityTemperatureSensor::read_temperature_and_humidity`] for
    /// both values.
    fn reading(&mut self) -> Result<f32> {
        match valid(self.probe.read_temperature()) {
            Some(temperature) => {
                self.last_error.clear();
                Ok(temperature)
            }
            None => self.fail("Failed to read temperature!"),
        }
    }

    fn last_error(&self) -> &str {
        &self.last_error
    }
}

fn valid(value: Option<f32>) -> Option<f32> {
    value.filter(|v| !v.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::testing::ScriptedProbe;

    fn sensor(probe: &ScriptedProbe) -> HumidityTemperatureSensor {
        HumidityTemperatureSensor::new(26, DEFAULT_HUMIDITY_TEMPERATURE_NAME, Box::new(probe.clone()))
    }

    #[test]
    fn begin_validates_with_one_read() {
        let probe = ScriptedProbe::new(Some((21.5, 40.0)));
        let mut dht = sensor(&probe);

        assert!(dht.begin());
        assert_eq!(dht.last_error(), "");
        assert_eq!(probe.begin_calls(), 1);
    }

    #[test]
    fn begin_fails_on_missing_probe() {
        let probe = ScriptedProbe::new(None);
        let mut dht = sensor(&probe);

        assert!(!dht.begin());
        assert_eq!(dht.last_error(), "Failed to initialize DHT sensor!");
    }

    #[test]
    fn nan_counts_as_failure() {
        let probe = ScriptedProbe::new(Some((f32::NAN, 40.0)));
        let mut dht = sensor(&probe);

        assert!(dht.reading().is_err());
        assert_eq!(dht.last_error(), "Failed to read temperature!");
        assert!(dht.read_temperature_and_humidity().is_err());
        assert_eq!(dht.last_error(), "Failed to read temperature and humidity!");
    }

    #[test]
    fn reading_returns_temperature_and_clears_error() {
        let probe = ScriptedProbe::new(None);
        let mut dht = sensor(&probe);
        assert!(dht.reading().is_err());

        probe.set(Some((19.25, 55.0)));

        assert_eq!(dht.reading().unwrap(), 19.25);
        assert_eq!(dht.read_temperature_and_humidity().unwrap(), (19.25, 55.0));
        assert_eq!(dht.last_error(), "");
    }

    #[test]
    fn averaged_reading_is_refused() {
        let probe = ScriptedProbe::new(Some((20.0, 50.0)));
        let mut dht = sensor(&probe);

        for ready in [false, true] {
            let err = dht.averaged_reading(ready).unwrap_err();
            assert_eq!(
                err.to_string(),
                "averaged reads are not supported by DHT Sensor"
            );
        }
    }
}
