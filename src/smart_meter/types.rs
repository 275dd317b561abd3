use serde::Serialize;

pub const FREQ_NOMINAL_50: f64 = 50.0;
pub const FREQ_NOMINAL_60: f64 = 60.0;

pub const ADC_REFERENCE_MV: f64 = 3300.0; // ESP32 class ADC full scale (3.3V)
pub const ADC_RESOLUTION: u16 = 4095; // 12-bit ADC
pub const SAMPLE_RATE_HZ: f64 = 2000.0;
pub const WINDOW_CYCLES: f64 = 2.0; // 40 ms at 50 Hz
pub const CALIBRATION_SAMPLES: usize = 1500;

pub const NOISE_FLOOR_AMPS: f64 = 0.002;
pub const REGRESSION_SLOPE: f64 = 0.05; // A per mV of RMS deviation
pub const REGRESSION_INTERCEPT: f64 = 0.0;

pub const NOMINAL_VOLTAGE: f64 = 230.0;
pub const DEFAULT_PRICE_PER_UNIT: f64 = 5.0;
pub const PERSIST_INTERVAL_SECS: u64 = 60;

pub const THEFT_THRESHOLD_AMPS: f64 = 0.004;
pub const THEFT_CONFIRMATION_SECS: u64 = 15;
pub const BUZZER_HALF_PERIOD_MS: u64 = 500; // 2 Hz toggle

/// Milliseconds in one hour, used to turn W x ms into kWh.
pub const MS_PER_HOUR: f64 = 3_600_000.0;

/// Theft detection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TheftState {
    #[default]
    Normal,
    /// Difference above threshold since `since_ms`, waiting for confirmation.
    Suspected { since_ms: u64 },
    /// Alert active until manually cleared.
    Confirmed,
}

impl TheftState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TheftState::Normal => "Normal",
            TheftState::Suspected { .. } => "Suspected",
            TheftState::Confirmed => "Confirmed",
        }
    }
}

/// Per load values of one processing cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReading {
    pub name: String,
    pub current: f64, // A
    pub power: f64,   // W
    pub energy: f64,  // kWh
    pub cost: f64,
}

/// Everything the network/display layer needs from one processing cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeterReading {
    pub timestamp_ms: u64,
    pub voltage: f64,
    pub main_current: f64,
    pub loads: Vec<LoadReading>,
    pub total_current: f64,
    pub total_power: f64,
    pub total_energy: f64,
    pub total_cost: f64,
    pub price_per_unit: f64,
    pub theft_state: TheftState,
    pub theft_confirmed: bool,
    pub theft_newly_confirmed: bool,
    pub theft_remaining_secs: u64,
}
