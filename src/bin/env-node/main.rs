mod args;
mod board;
mod trace;

use std::{fs::File, process::ExitCode, sync::Arc};

use anyhow::{Context as _, Result, bail};
use args::Args;
use clap::Parser as _;
use environment_node::{
    clock::SystemClock,
    logger::{ConsoleSink, LogHandler, LogLevel, Logger, PublishSink, StorageSink},
    manager::{PollerConfig, SensorManager},
    storage::{FileStorage, Storage},
    telemetry::{Publisher, Reporter, Topics},
};
use tokio::time::{Duration, Instant, interval_at};
use tokio_stream::{StreamExt as _, wrappers::IntervalStream};

use crate::{board::ReplayBoard, trace::CsvTraceIter};

const LOG_FILE: &str = "/node.log";
const LOG_LINES_BUFFERED: usize = 32;

/// Prints messages instead of sending them to a broker.
struct StdoutPublisher;

impl Publisher for StdoutPublisher {
    fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        println!("{topic} {payload}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = run().await {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let storage: Arc<dyn Storage> = Arc::new(
        FileStorage::new(&args.data_dir)
            .with_context(|| format!("failed to mount storage: {:?}", args.data_dir))?,
    );
    let publisher: Arc<dyn Publisher> = Arc::new(StdoutPublisher);
    let topics = Topics::new(&args.location);

    let logger = Logger::new();
    logger.set_global_log_level(args.log_level);
    logger.add_handler_with_id("console", LogHandler::new(ConsoleSink, LogLevel::Setup), 2);
    logger.add_handler_with_id(
        "file",
        LogHandler::with_default_level(StorageSink::new(
            Arc::clone(&storage),
            LOG_FILE,
            LOG_LINES_BUFFERED,
        )),
        1,
    );
    logger.add_handler_with_id(
        "network",
        LogHandler::new(
            PublishSink::new(Arc::clone(&publisher), topics.error.clone()),
            LogLevel::Error,
        ),
        0,
    );

    let file = File::open(&args.trace)
        .with_context(|| format!("failed to open trace: {:?}", args.trace))?;
    let samples = CsvTraceIter::new(file)
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("failed to read trace: {:?}", args.trace))?;
    if samples.is_empty() {
        bail!("trace contains no samples: {:?}", args.trace);
    }
    logger.setup(&format!(
        "Replaying {} samples from {:?}",
        samples.len(),
        args.trace
    ));

    let config = PollerConfig {
        scan_pins: vec![args.dht_pin, args.battery_pin],
        ..PollerConfig::default()
    };
    let board = ReplayBoard::new(samples, args.dht_pin, args.battery_pin, args.battery_raw);
    let mut manager = SensorManager::new(Arc::new(board), logger.clone(), config.clone());
    if manager.scan_for_sensors() == 0 {
        bail!("no sensors detected on pins {:?}", config.scan_pins);
    }

    let reporter = Reporter::new(
        storage,
        publisher,
        Arc::new(SystemClock::new(args.timezone)),
        logger.clone(),
        topics,
        args.device_id.to_string(),
    );
    reporter.prepare().context("failed to prepare data file")?;

    manager
        .start_concurrent_reading()
        .context("failed to start sensor poller")?;

    // The first report waits one tick so the poller has completed a cycle.
    let period = Duration::from_secs(args.report_interval_secs.max(1));
    let mut reports = IntervalStream::new(interval_at(Instant::now() + config.tick, period))
        .take(args.cycles);

    loop {
        tokio::select! {
            tick = reports.next() => {
                if tick.is_none() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                logger.warning("Interrupted, shutting down");
                break;
            }
        }

        if !manager.is_polling() {
            logger.critical("Sensor poller is no longer running");
            break;
        }

        let summary = reporter.report(&manager);
        logger.info(&format!(
            "Report finished: {} published, {} failed, {} skipped",
            summary.published, summary.failed, summary.skipped
        ));
    }

    let stopped = manager.stop_concurrent_reading().await;
    logger.flush();
    stopped
}
