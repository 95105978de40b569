use std::path::PathBuf;

use chrono_tz::Tz;
use clap::Parser;
use environment_node::logger::LogLevel;
use macaddr::MacAddr6;

#[derive(Debug, Parser)]
pub struct Args {
    #[arg(long, env = "TZ")]
    pub timezone: Tz,

    #[arg(long, env = "DEVICE_ID")]
    pub device_id: MacAddr6,

    #[arg(long, env = "NODE_LOCATION", default_value = "greenhouse")]
    pub location: String,

    #[arg(long, env = "DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// CSV export of a temperature/humidity meter, replayed as the node's DHT probe.
    #[arg(long)]
    pub trace: PathBuf,

    #[arg(long, default_value_t = 26)]
    pub dht_pin: u8,

    #[arg(long, default_value_t = 27)]
    pub battery_pin: u8,

    /// Raw 12-bit ADC value seen on the battery pin.
    #[arg(long, default_value_t = 900)]
    pub battery_raw: u16,

    #[arg(long, default_value_t = 300)]
    pub report_interval_secs: u64,

    #[arg(long, default_value_t = 1)]
    pub cycles: usize,

    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: LogLevel,
}
