//! Measurement sources and the hardware primitives they are built on.

mod battery;
mod hardware;
mod humidity_temperature;
mod kind;
#[cfg(test)]
pub(crate) mod testing;

pub use battery::*;
pub use hardware::*;
pub use humidity_temperature::*;
pub use kind::*;

use anyhow::{Result, bail};

/// Outcome of one call to [`Sensor::averaged_reading`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AveragedReading {
    /// Samples are still being accumulated for the current cycle.
    Sampling,
    /// The cycle finished; holds the converted value of the averaged samples.
    Complete(f32),
}

pub trait Sensor: Send {
    fn name(&self) -> &str;

    fn pin(&self) -> u8;

    fn kind(&self) -> SensorKind;

    /// Initializes the hardware and validates it with one read.
    ///
    /// On failure the reason is available from [`Sensor::last_error`].
    fn begin(&mut self) -> bool;

    /// Takes a fresh measurement.
    fn reading(&mut self) -> Result<f32>;

    /// Spreads a measurement over many calls, finishing once `ready_to_report` is set.
    ///
    /// Sensors that cannot average return an error on every call.
    fn averaged_reading(&mut self, _ready_to_report: bool) -> Result<AveragedReading> {
        bail!("averaged reads are not supported by {}", self.name())
    }

    /// Reason for the most recent failure, empty after a success.
    fn last_error(&self) -> &str;
}
