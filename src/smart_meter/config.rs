use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::error::{MeterError, Result};
use super::types::*;

/// Sampling and RMS window settings shared by every channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub sample_rate_hz: f64,
    pub mains_frequency_hz: f64,
    pub window_cycles: f64,
    pub calibration_samples: usize,
    pub adc_reference_mv: f64,
    pub adc_resolution: u16,
    pub noise_floor_amps: f64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: SAMPLE_RATE_HZ,
            mains_frequency_hz: FREQ_NOMINAL_50,
            window_cycles: WINDOW_CYCLES,
            calibration_samples: CALIBRATION_SAMPLES,
            adc_reference_mv: ADC_REFERENCE_MV,
            adc_resolution: ADC_RESOLUTION,
            noise_floor_amps: NOISE_FLOOR_AMPS,
        }
    }
}

impl AcquisitionConfig {
    /// Millivolts represented by one ADC count.
    pub fn mv_per_count(&self) -> f64 {
        self.adc_reference_mv / self.adc_resolution as f64
    }
}

/// Identity and transducer regression of one current channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub name: String,
    pub slope: f64,
    pub intercept: f64,
}

impl ChannelConfig {
    pub fn new(name: impl Into<String>, slope: f64, intercept: f64) -> Self {
        Self {
            name: name.into(),
            slope,
            intercept,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new("channel", REGRESSION_SLOPE, REGRESSION_INTERCEPT)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub main: ChannelConfig,
    pub loads: Vec<ChannelConfig>,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            main: ChannelConfig::new("main", REGRESSION_SLOPE, REGRESSION_INTERCEPT),
            loads: vec![
                ChannelConfig::new("load1", REGRESSION_SLOPE, REGRESSION_INTERCEPT),
                ChannelConfig::new("load2", REGRESSION_SLOPE, REGRESSION_INTERCEPT),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    pub default_price: f64,
    pub persist_interval_secs: u64,
    pub nominal_voltage: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            default_price: DEFAULT_PRICE_PER_UNIT,
            persist_interval_secs: PERSIST_INTERVAL_SECS,
            nominal_voltage: NOMINAL_VOLTAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TheftConfig {
    pub threshold_amps: f64,
    pub confirmation_secs: u64,
    pub buzzer_half_period_ms: u64,
}

impl Default for TheftConfig {
    fn default() -> Self {
        Self {
            threshold_amps: THEFT_THRESHOLD_AMPS,
            confirmation_secs: THEFT_CONFIRMATION_SECS,
            buzzer_half_period_ms: BUZZER_HALF_PERIOD_MS,
        }
    }
}

impl TheftConfig {
    pub fn confirmation_window(&self) -> Duration {
        Duration::from_secs(self.confirmation_secs)
    }
}

/// Complete meter configuration, every field optional in the TOML file.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    pub acquisition: AcquisitionConfig,
    pub channels: ChannelsConfig,
    pub energy: EnergyConfig,
    pub theft: TheftConfig,
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MeterError::InvalidConfig(format!("{} must be finite and positive, got {}", name, value)))
    }
}

fn finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(MeterError::InvalidConfig(format!("{} must be finite, got {}", name, value)))
    }
}

impl MeterConfig {
    /*
    * @brief Parse and validate a configuration from TOML text.
    * @param text TOML document; missing sections and fields take their defaults
    */
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: MeterConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /*
    * @brief Load the configuration file, or the defaults when no path is given.
    * @param path Optional path to a TOML file
    */
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = fs::read_to_string(path)?;
                log::info!("Loaded configuration from {}", path.display());
                Self::from_toml_str(&text)
            }
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let acq = &self.acquisition;
        positive("acquisition.sample_rate_hz", acq.sample_rate_hz)?;
        positive("acquisition.mains_frequency_hz", acq.mains_frequency_hz)?;
        positive("acquisition.window_cycles", acq.window_cycles)?;
        positive("acquisition.adc_reference_mv", acq.adc_reference_mv)?;
        finite("acquisition.noise_floor_amps", acq.noise_floor_amps)?;

        if acq.calibration_samples == 0 {
            return Err(MeterError::InvalidConfig("acquisition.calibration_samples must be at least 1".into()));
        }
        if acq.adc_resolution == 0 {
            return Err(MeterError::InvalidConfig("acquisition.adc_resolution must be at least 1".into()));
        }

        if self.channels.loads.is_empty() {
            return Err(MeterError::InvalidConfig("channels.loads must name at least one load".into()));
        }
        for channel in std::iter::once(&self.channels.main).chain(self.channels.loads.iter()) {
            finite(&format!("channels.{}.slope", channel.name), channel.slope)?;
            finite(&format!("channels.{}.intercept", channel.name), channel.intercept)?;
        }

        positive("energy.default_price", self.energy.default_price)?;
        positive("energy.nominal_voltage", self.energy.nominal_voltage)?;

        positive("theft.threshold_amps", self.theft.threshold_amps)?;
        if self.theft.buzzer_half_period_ms == 0 {
            return Err(MeterError::InvalidConfig("theft.buzzer_half_period_ms must be at least 1".into()));
        }

        Ok(())
    }
}
