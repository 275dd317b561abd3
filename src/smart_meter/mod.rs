pub mod config;
pub mod current;
pub mod energy;
pub mod error;
pub mod generate_signal;
pub mod hal;
pub mod print;
pub mod processing;
pub mod statistics;
pub mod theft;
pub mod types;

pub use config::{AcquisitionConfig, ChannelConfig, ChannelsConfig, EnergyConfig, MeterConfig, TheftConfig};
pub use current::SignalAcquirer;
pub use energy::EnergyAccumulator;
pub use error::{MeterError, Result};
pub use generate_signal::{rms_mv_for_current, SignalLevel, SimulatedSampler};
pub use hal::{
    DigitalOutput, DurableStore, JsonFileStore, LogOutput, ManualClock, MemoryStore, MonotonicClock, RawSampler,
    RecordingOutput, ScriptedSampler, TimeSource,
};
pub use processing::SmartMeter;
pub use statistics::RunningStatistics;
pub use theft::TheftMonitor;
pub use types::*;
