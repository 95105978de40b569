pub mod clock;
pub mod logger;
pub mod manager;
pub mod sensor;
pub mod storage;
pub mod telemetry;
