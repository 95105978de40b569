//! Scripted hardware used by unit tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::sensor::{AnalogInput, DigitalOutput, Hardware, HumidityTemperatureProbe};

#[derive(Debug, Default)]
struct ProbeState {
    sample: Option<(f32, f32)>,
    begin_calls: usize,
    reads: usize,
    panic_on_read: bool,
}

/// Probe answering with whatever sample is currently scripted. Clones share state.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl ScriptedProbe {
    pub(crate) fn new(sample: Option<(f32, f32)>) -> Self {
        let probe = Self::default();
        probe.set(sample);
        probe
    }

    pub(crate) fn set(&self, sample: Option<(f32, f32)>) {
        self.state.lock().unwrap().sample = sample;
    }

    pub(crate) fn begin_calls(&self) -> usize {
        self.state.lock().unwrap().begin_calls
    }

    /// Makes every following read panic, as a wedged driver would.
    pub(crate) fn panic_on_read(&self) {
        self.state.lock().unwrap().panic_on_read = true;
    }

    /// Number of temperature reads, i.e. measurements started.
    pub(crate) fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }
}

impl HumidityTemperatureProbe for ScriptedProbe {
    fn begin(&mut self) {
        self.state.lock().unwrap().begin_calls += 1;
    }

    fn read_temperature(&mut self) -> Option<f32> {
        let (sample, wedged) = {
            let mut state = self.state.lock().unwrap();
            state.reads += 1;
            (state.sample, state.panic_on_read)
        };
        if wedged {
            panic!("probe stopped responding");
        }
        sample.map(|s| s.0)
    }

    fn read_humidity(&mut self) -> Option<f32> {
        self.state.lock().unwrap().sample.map(|s| s.1)
    }
}

#[derive(Debug, Default)]
struct AdcState {
    raw: Option<u16>,
    reads: usize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FixedAdc {
    state: Arc<Mutex<AdcState>>,
}

impl FixedAdc {
    pub(crate) fn new(raw: Option<u16>) -> Self {
        let adc = Self::default();
        adc.set(raw);
        adc
    }

    pub(crate) fn set(&self, raw: Option<u16>) {
        self.state.lock().unwrap().raw = raw;
    }

    pub(crate) fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }
}

impl AnalogInput for FixedAdc {
    fn read_raw(&mut self) -> Option<u16> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        state.raw
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingOutput {
    levels: Arc<Mutex<Vec<bool>>>,
}

impl RecordingOutput {
    pub(crate) fn levels(&self) -> Vec<bool> {
        self.levels.lock().unwrap().clone()
    }
}

impl DigitalOutput for RecordingOutput {
    fn set_high(&mut self, high: bool) {
        self.levels.lock().unwrap().push(high);
    }
}

/// Board whose pins are wired to scripted probes and ADCs.
///
/// Pins without a probe never answer the humidity/temperature protocol; pins without an ADC
/// fail every conversion.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeBoard {
    probes: HashMap<u8, ScriptedProbe>,
    adcs: HashMap<u8, FixedAdc>,
}

impl FakeBoard {
    pub(crate) fn with_probe(mut self, pin: u8, probe: &ScriptedProbe) -> Self {
        self.probes.insert(pin, probe.clone());
        self
    }

    pub(crate) fn with_adc(mut self, pin: u8, adc: &FixedAdc) -> Self {
        self.adcs.insert(pin, adc.clone());
        self
    }
}

impl Hardware for FakeBoard {
    fn humidity_temperature_probe(&self, pin: u8) -> Box<dyn HumidityTemperatureProbe> {
        Box::new(self.probes.get(&pin).cloned().unwrap_or_default())
    }

    fn analog_input(&self, pin: u8) -> Box<dyn AnalogInput> {
        Box::new(self.adcs.get(&pin).cloned().unwrap_or_default())
    }

    fn digital_output(&self, _pin: u8) -> Box<dyn DigitalOutput> {
        Box::new(RecordingOutput::default())
    }
}
