use std::time::Duration;

use super::config::{AcquisitionConfig, ChannelConfig};
use super::hal::RawSampler;
use super::statistics::RunningStatistics;
use super::types::WINDOW_CYCLES;

/*
* @brief Number of samples that cover `window_cycles` AC cycles at the given rates.
* @param sample_rate_hz Sampling cadence of update()
* @param window_cycles Cycles the RMS window must span
* @param mains_hz Mains frequency
* @return Window length in samples, at least 1
*/
fn window_samples(sample_rate_hz: f64, window_cycles: f64, mains_hz: f64) -> usize {
    let samples = (sample_rate_hz * window_cycles / mains_hz).round();
    if samples.is_finite() && samples >= 1.0 {
        samples as usize
    } else {
        1
    }
}

/// Current channel: offset removal, windowed RMS and a linear regression to amps.
#[derive(Debug)]
pub struct SignalAcquirer<S> {
    sampler: S,
    channel: ChannelConfig,
    calibration_offset: Option<f64>, // mV, None until calibrate()
    mv_per_count: f64,
    sample_rate_hz: f64,
    window_cycles: f64,
    window: Duration,
    noise_floor: f64,
    stats: RunningStatistics,
}

impl<S: RawSampler> SignalAcquirer<S> {
    pub fn new(sampler: S, channel: ChannelConfig, acquisition: &AcquisitionConfig) -> Self {
        let window_cycles = if acquisition.window_cycles.is_finite() && acquisition.window_cycles > 0.0 {
            acquisition.window_cycles
        } else {
            log::warn!(
                "{}: window of {} cycles is invalid, using {}",
                channel.name,
                acquisition.window_cycles,
                WINDOW_CYCLES
            );
            WINDOW_CYCLES
        };

        let mut acquirer = Self {
            sampler,
            channel,
            calibration_offset: None,
            mv_per_count: acquisition.mv_per_count(),
            sample_rate_hz: acquisition.sample_rate_hz,
            window_cycles,
            window: Duration::ZERO,
            noise_floor: acquisition.noise_floor_amps,
            stats: RunningStatistics::new(1),
        };
        acquirer.set_window_duration(acquisition.mains_frequency_hz);
        acquirer
    }

    fn read_mv(&mut self) -> f64 {
        self.sampler.read_raw() as f64 * self.mv_per_count
    }

    /*
    * @brief Zero offset calibration.
    * @param sample_count Number of back to back readings to average
    * @note Must run while the circuit carries no load. The window is cleared so
    *       samples taken against a previous offset are not mixed in.
    */
    pub fn calibrate(&mut self, sample_count: usize) {
        if sample_count == 0 {
            log::warn!("Calibration of {} skipped: no samples requested", self.channel.name);
            return;
        }

        log::info!("Calibrating sensor {} with {} samples...", self.channel.name, sample_count);

        let mut sum = 0.0;
        for _ in 0..sample_count {
            sum += self.read_mv();
        }

        let offset = sum / sample_count as f64;
        self.calibration_offset = Some(offset);
        self.stats.clear();

        log::info!("Zero offset of {} calibrated to {:.2} mV", self.channel.name, offset);
    }

    /// Feeds one offset-corrected sample into the window. No-op until calibrated.
    pub fn update(&mut self) {
        let Some(offset) = self.calibration_offset else {
            return;
        };

        let corrected = self.read_mv() - offset;
        self.stats.input(corrected);
    }

    /*
    * @brief Current estimate in amps.
    * @return intercept + slope * RMS deviation, 0 below the noise floor or when uncalibrated
    */
    pub fn current_estimate(&self) -> f64 {
        if !self.is_calibrated() {
            return 0.0;
        }

        let current = self.channel.intercept + self.channel.slope * self.stats.standard_deviation();

        if current < self.noise_floor || !current.is_finite() {
            0.0
        } else {
            current
        }
    }

    /*
    * @brief Rescale the RMS window so it keeps spanning the same number of cycles.
    * @param mains_hz Mains frequency in Hz; values that give no representable window are ignored
    */
    pub fn set_window_duration(&mut self, mains_hz: f64) {
        if !(mains_hz.is_finite() && mains_hz > 0.0) {
            log::warn!("Ignoring mains frequency {} for {}", mains_hz, self.channel.name);
            return;
        }

        self.window = match Duration::try_from_secs_f64(self.window_cycles / mains_hz) {
            Ok(window) => window,
            Err(e) => {
                log::warn!("Ignoring mains frequency {} for {}: {}", mains_hz, self.channel.name, e);
                return;
            }
        };
        self.stats
            .set_capacity(window_samples(self.sample_rate_hz, self.window_cycles, mains_hz));

        log::debug!(
            "{}: RMS window {:?} ({} samples)",
            self.channel.name,
            self.window,
            self.stats.capacity()
        );
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration_offset.is_some()
    }

    pub fn calibration_offset(&self) -> Option<f64> {
        self.calibration_offset
    }

    /// RMS deviation of the window in mV.
    pub fn rms_deviation(&self) -> f64 {
        self.stats.standard_deviation()
    }

    pub fn window_duration(&self) -> Duration {
        self.window
    }

    pub fn window_len(&self) -> usize {
        self.stats.capacity()
    }

    pub fn name(&self) -> &str {
        &self.channel.name
    }

    pub fn sampler_mut(&mut self) -> &mut S {
        &mut self.sampler
    }
}
