use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::{PI, SQRT_2};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::config::{AcquisitionConfig, ChannelConfig};
use super::hal::RawSampler;

const NOISE_MV: f64 = 0.5;

/// Shared RMS level (mV) of a simulated transducer, adjustable while it runs.
#[derive(Debug, Clone, Default)]
pub struct SignalLevel {
    rms_mv_bits: Arc<AtomicU64>,
}

impl SignalLevel {
    pub fn new(rms_mv: f64) -> Self {
        let level = Self::default();
        level.set_rms_mv(rms_mv);
        level
    }

    pub fn set_rms_mv(&self, rms_mv: f64) {
        self.rms_mv_bits.store(rms_mv.max(0.0).to_bits(), Ordering::Relaxed);
    }

    pub fn rms_mv(&self) -> f64 {
        f64::from_bits(self.rms_mv_bits.load(Ordering::Relaxed))
    }
}

/*
* @brief Transducer RMS voltage that a channel's regression maps to the given current.
* @param amps Desired current in A
* @param channel Channel regression
* @return RMS deviation in mV, never negative
*/
pub fn rms_mv_for_current(amps: f64, channel: &ChannelConfig) -> f64 {
    if channel.slope == 0.0 {
        return 0.0;
    }
    ((amps - channel.intercept) / channel.slope).max(0.0)
}

/// Sine transducer centred on ADC mid-scale, with optional uniform noise.
#[derive(Debug)]
pub struct SimulatedSampler {
    wave: Array1<f64>, // unit RMS, integer number of cycles
    index: usize,
    level: SignalLevel,
    zero_offset_mv: f64,
    noise_mv: f64,
    counts_per_mv: f64,
    max_count: u16,
    rng: StdRng,
}

impl SimulatedSampler {
    /*
    * @brief Build a simulated channel for the given acquisition settings.
    * @param acquisition Sampling rate, mains frequency and ADC scale
    * @param level Shared RMS level handle
    * @note One second of samples is precomputed, which holds a whole number of
    *       cycles for integer mains frequencies.
    */
    pub fn new(acquisition: &AcquisitionConfig, level: SignalLevel) -> Self {
        let n_samples = acquisition.sample_rate_hz.round().max(1.0);
        let step = 2.0 * PI * acquisition.mains_frequency_hz / acquisition.sample_rate_hz;

        let wave = Array1::range(0.0, n_samples, 1.0).mapv(|s| SQRT_2 * (step * s).sin());

        Self {
            wave,
            index: 0,
            level,
            zero_offset_mv: acquisition.adc_reference_mv / 2.0,
            noise_mv: NOISE_MV,
            counts_per_mv: 1.0 / acquisition.mv_per_count(),
            max_count: acquisition.adc_resolution,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_noise(mut self, noise_mv: f64) -> Self {
        self.noise_mv = noise_mv.max(0.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn level(&self) -> &SignalLevel {
        &self.level
    }
}

impl RawSampler for SimulatedSampler {
    fn read_raw(&mut self) -> u16 {
        let unit = self.wave[self.index];
        self.index = (self.index + 1) % self.wave.len();

        let noise = if self.noise_mv > 0.0 {
            self.rng.gen_range(-self.noise_mv..=self.noise_mv)
        } else {
            0.0
        };

        let mv = self.zero_offset_mv + self.level.rms_mv() * unit + noise;
        (mv * self.counts_per_mv).round().clamp(0.0, self.max_count as f64) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smart_meter::current::SignalAcquirer;

    fn acquisition() -> AcquisitionConfig {
        AcquisitionConfig::default()
    }

    #[test]
    fn idle_channel_sits_at_mid_scale() {
        let mut sampler = SimulatedSampler::new(&acquisition(), SignalLevel::new(0.0)).with_noise(0.0);
        let first = sampler.read_raw();
        assert!((first as i32 - 2048).abs() <= 1);
        for _ in 0..100 {
            assert_eq!(sampler.read_raw(), first);
        }
    }

    #[test]
    fn samples_stay_inside_adc_range() {
        let level = SignalLevel::new(10_000.0);
        let mut sampler = SimulatedSampler::new(&acquisition(), level).with_seed(7);
        let (mut lo, mut hi) = (u16::MAX, 0);
        for _ in 0..4000 {
            let raw = sampler.read_raw();
            lo = lo.min(raw);
            hi = hi.max(raw);
        }
        assert_eq!(lo, 0);
        assert_eq!(hi, 4095);
    }

    #[test]
    fn acquirer_recovers_the_simulated_current() {
        let config = acquisition();
        let channel = ChannelConfig::new("sim", 0.05, 0.0);
        let level = SignalLevel::new(0.0);
        let sampler = SimulatedSampler::new(&config, level.clone()).with_noise(0.0);

        let mut acq = SignalAcquirer::new(sampler, channel.clone(), &config);
        acq.calibrate(config.calibration_samples);

        level.set_rms_mv(rms_mv_for_current(2.0, &channel));
        for _ in 0..(4 * acq.window_len()) {
            acq.update();
        }

        assert!((acq.current_estimate() - 2.0).abs() < 0.05);
    }

    #[test]
    fn inverse_regression() {
        let channel = ChannelConfig::new("sim", 0.05, 0.1);
        assert!((rms_mv_for_current(1.1, &channel) - 20.0).abs() < 1e-9);
        assert_eq!(rms_mv_for_current(0.0, &channel), 0.0);
        assert_eq!(rms_mv_for_current(1.0, &ChannelConfig::new("flat", 0.0, 0.0)), 0.0);
    }
}
