use std::sync::{Arc, Mutex, PoisonError};

use environment_node::sensor::{AnalogInput, DigitalOutput, Hardware, HumidityTemperatureProbe};

use crate::trace::TraceSample;

/// Board that replays a recorded trace on the DHT pin and a fixed ADC value on the battery pin.
/// Every other pin is unconnected.
pub struct ReplayBoard {
    samples: Arc<[TraceSample]>,
    cursor: Arc<Mutex<usize>>,
    dht_pin: u8,
    battery_pin: u8,
    battery_raw: u16,
}

impl ReplayBoard {
    pub fn new(samples: Vec<TraceSample>, dht_pin: u8, battery_pin: u8, battery_raw: u16) -> Self {
        Self {
            samples: samples.into(),
            cursor: Arc::new(Mutex::new(0)),
            dht_pin,
            battery_pin,
            battery_raw,
        }
    }
}

impl Hardware for ReplayBoard {
    fn humidity_temperature_probe(&self, pin: u8) -> Box<dyn HumidityTemperatureProbe> {
        if pin != self.dht_pin || self.samples.is_empty() {
            return Box::new(Unconnected);
        }

        Box::new(ReplayProbe {
            samples: Arc::clone(&self.samples),
            cursor: Arc::clone(&self.cursor),
            current: None,
        })
    }

    fn analog_input(&self, pin: u8) -> Box<dyn AnalogInput> {
        if pin != self.battery_pin {
            return Box::new(Unconnected);
        }

        Box::new(ConstantAdc(self.battery_raw))
    }

    fn digital_output(&self, _pin: u8) -> Box<dyn DigitalOutput> {
        Box::new(Unconnected)
    }
}

/// Each temperature read starts the next measurement of the trace, wrapping at the end.
struct ReplayProbe {
    samples: Arc<[TraceSample]>,
    cursor: Arc<Mutex<usize>>,
    current: Option<TraceSample>,
}

impl HumidityTemperatureProbe for ReplayProbe {
    fn begin(&mut self) {}

    fn read_temperature(&mut self) -> Option<f32> {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let sample = self.samples[*cursor % self.samples.len()];
        *cursor = (*cursor + 1) % self.samples.len();

        self.current = Some(sample);
        sample.temperature_celsius
    }

    fn read_humidity(&mut self) -> Option<f32> {
        self.current.and_then(|s| s.humidity_percent)
    }
}

struct ConstantAdc(u16);

impl AnalogInput for ConstantAdc {
    fn read_raw(&mut self) -> Option<u16> {
        Some(self.0)
    }
}

struct Unconnected;

impl HumidityTemperatureProbe for Unconnected {
    fn begin(&mut self) {}

    fn read_temperature(&mut self) -> Option<f32> {
        None
    }

    fn read_humidity(&mut self) -> Option<f32> {
        None
    }
}

impl AnalogInput for Unconnected {
    fn read_raw(&mut self) -> Option<u16> {
        None
    }
}

impl DigitalOutput for Unconnected {
    fn set_high(&mut self, _high: bool) {}
}
