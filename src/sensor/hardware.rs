/// Digital single-shot temperature/humidity probe on one pin.
///
/// `None` means the probe answered with "not a number" or did not answer at all.
pub trait HumidityTemperatureProbe: Send {
    fn begin(&mut self);

    fn read_temperature(&mut self) -> Option<f32>;

    fn read_humidity(&mut self) -> Option<f32>;
}

/// One ADC channel. Returns the raw conversion, or `None` if the conversion failed.
pub trait AnalogInput: Send {
    fn read_raw(&mut self) -> Option<u16>;
}

pub trait DigitalOutput: Send {
    fn set_high(&mut self, high: bool);
}

/// Hands out pin-level handles so sensors can be created from a pin number alone.
pub trait Hardware: Send + Sync {
    fn humidity_temperature_probe(&self, pin: u8) -> Box<dyn HumidityTemperatureProbe>;

    fn analog_input(&self, pin: u8) -> Box<dyn AnalogInput>;

    fn digital_output(&self, pin: u8) -> Box<dyn DigitalOutput>;
}
