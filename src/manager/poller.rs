use std::{
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};

use anyhow::{Context as _, Result};
use tokio::{
    runtime::Handle,
    sync::watch,
    task::{JoinError, JoinHandle},
    time::{Instant, sleep},
};

use crate::{
    logger::{LogLevel, Logger},
    manager::{Measurement, RegisteredSensor, SensorData},
    sensor::Sensor,
};

/// Everything one refresh cycle needs besides the sensors themselves.
#[derive(Clone)]
pub(crate) struct CycleContext {
    pub(crate) readings: Arc<RwLock<Vec<SensorData>>>,
    pub(crate) refresh_interval: Duration,
    pub(crate) logger: Logger,
}

/// Runs one pass over all sensors in registration order.
///
/// Humidity/temperature sensors are re-read only once `refresh_interval` has passed since their
/// last successful read. Battery sensors are read on every pass. A failed read marks the slot
/// invalid but keeps the previous measurement.
pub(crate) fn refresh_cycle(sensors: &mut [RegisteredSensor], ctx: &CycleContext) {
    for (index, sensor) in sensors.iter_mut().enumerate() {
        let result = match sensor {
            RegisteredSensor::HumidityTemperature(dht) => {
                let last_read_at = read_slot(ctx, index).and_then(|d| d.last_read_at);
                if let Some(last) = last_read_at
                    && last.elapsed() < ctx.refresh_interval
                {
                    continue;
                }

                dht.read_temperature_and_humidity()
                    .map(|(temperature_celsius, humidity_percent)| {
                        Measurement::TemperatureHumidity {
                            temperature_celsius,
                            humidity_percent,
                        }
                    })
            }
            RegisteredSensor::BatteryZener(battery) => battery
                .reading()
                .map(|percent| Measurement::BatteryLevel { percent }),
        };

        // Logged after the guard is released; handlers may read the cache or block on I/O.
        let event = {
            let mut readings = ctx.readings.write().unwrap_or_else(PoisonError::into_inner);
            let Some(data) = readings.get_mut(index) else {
                continue;
            };
            record(data, result, sensor.as_sensor())
        };

        if let Some((level, message)) = event {
            ctx.logger.log(level, &message);
        }
    }
}

/// Applies one read outcome to its slot and returns the event worth logging, if any.
fn record(
    data: &mut SensorData,
    result: Result<Measurement>,
    sensor: &dyn Sensor,
) -> Option<(LogLevel, String)> {
    match result {
        Ok(measurement) => {
            let recovered = (data.consecutive_failures > 0).then(|| {
                (
                    LogLevel::Info,
                    format!(
                        "{} on pin {} recovered after {} failed reads",
                        sensor.name(),
                        sensor.pin(),
                        data.consecutive_failures
                    ),
                )
            });
            data.measurement = Some(measurement);
            data.is_valid = true;
            data.last_read_at = Some(Instant::now());
            data.consecutive_failures = 0;
            recovered
        }
        Err(err) => {
            data.is_valid = false;
            data.consecutive_failures += 1;
            (data.consecutive_failures == 1).then(|| (LogLevel::Warning, format!("{err:#}")))
        }
    }
}

fn read_slot(ctx: &CycleContext, index: usize) -> Option<SensorData> {
    ctx.readings
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(index)
        .cloned()
}

/// Handle to the background task that keeps the cached sensor data fresh.
///
/// Each sweep runs on tokio's blocking pool, since driver calls block; the task itself only
/// sleeps `tick` between sweeps. It exits when [`Poller::stop`] is called or the handle is dropped.
/// A sensor driver that panics ends the task; [`Poller::is_running`] then turns false, the
/// heartbeat stops advancing and `stop()` reports the panic.
pub struct Poller {
    handle: JoinHandle<Result<Vec<RegisteredSensor>, JoinError>>,
    cancel: watch::Sender<bool>,
    heartbeat: Arc<Mutex<Option<Instant>>>,
}

impl Poller {
    pub(crate) fn spawn(
        runtime: &Handle,
        mut sensors: Vec<RegisteredSensor>,
        ctx: CycleContext,
        tick: Duration,
    ) -> Self {
        let (cancel, mut cancelled) = watch::channel(false);
        let heartbeat = Arc::new(Mutex::new(None));

        let beat = Arc::clone(&heartbeat);
        let blocking = runtime.clone();
        let handle = runtime.spawn(async move {
            loop {
                let cycle_ctx = ctx.clone();
                sensors = blocking
                    .spawn_blocking(move || {
                        refresh_cycle(&mut sensors, &cycle_ctx);
                        sensors
                    })
                    .await?;
                *beat.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());

                tokio::select! {
                    _ = sleep(tick) => {}
                    _ = cancelled.changed() => break,
                }
            }

            Ok::<_, JoinError>(sensors)
        });

        Self {
            handle,
            cancel,
            heartbeat,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Completion time of the most recent refresh cycle.
    pub fn last_sweep(&self) -> Option<Instant> {
        *self.heartbeat.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancels the task, waits for it and hands the sensors back.
    pub async fn stop(self) -> Result<Vec<RegisteredSensor>> {
        // Fails only if the task already exited, which the join below reports.
        let _ = self.cancel.send(true);

        self.handle
            .await
            .context("sensor poller task failed")?
            .context("sensor refresh cycle panicked")
    }
}
