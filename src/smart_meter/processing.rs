use crate::smart_meter::{
    config::MeterConfig,
    current::SignalAcquirer,
    energy::EnergyAccumulator,
    error::{MeterError, Result},
    hal::{DigitalOutput, DurableStore, RawSampler, TimeSource},
    theft::TheftMonitor,
    types::*,
};

/// One meter: main feed channel, monitored load channels, billing and theft detection.
///
/// The components never talk to each other; this type reads the currents,
/// derives the powers and hands them to accumulation and theft checking.
#[derive(Debug)]
pub struct SmartMeter<S, D, C, O> {
    main: SignalAcquirer<S>,
    loads: Vec<SignalAcquirer<S>>,
    energy: EnergyAccumulator<D>,
    theft: TheftMonitor<C, O>,
    clock: C,
    voltage: f64,
    calibration_samples: usize,
    persist_interval_ms: u64,
    last_persist_ms: u64,
}

impl<S, D, C, O> SmartMeter<S, D, C, O>
where
    S: RawSampler,
    D: DurableStore,
    C: TimeSource + Clone,
    O: DigitalOutput,
{
    /*
    * @brief Assemble a meter from its configuration and platform capabilities.
    * @param main_sampler Transducer on the main feed
    * @param load_samplers One transducer per configured load, in configuration order
    * @param store Durable store for energy and price
    * @param clock Monotonic clock shared by accumulation and theft detection
    * @param alert Buzzer output
    */
    pub fn new(
        config: &MeterConfig,
        main_sampler: S,
        load_samplers: Vec<S>,
        store: D,
        clock: C,
        alert: O,
    ) -> Result<Self> {
        config.validate()?;

        if load_samplers.len() != config.channels.loads.len() {
            return Err(MeterError::InvalidConfig(format!(
                "{} load channels configured but {} samplers given",
                config.channels.loads.len(),
                load_samplers.len()
            )));
        }

        let acquisition = &config.acquisition;
        let main = SignalAcquirer::new(main_sampler, config.channels.main.clone(), acquisition);
        let loads = load_samplers
            .into_iter()
            .zip(config.channels.loads.iter().cloned())
            .map(|(sampler, channel)| SignalAcquirer::new(sampler, channel, acquisition))
            .collect();

        let now = clock.now_ms();
        let energy = EnergyAccumulator::restore(store, config.channels.loads.len(), config.energy.default_price, now);
        let theft = TheftMonitor::new(clock.clone(), alert, &config.theft);

        Ok(Self {
            main,
            loads,
            energy,
            theft,
            clock,
            voltage: config.energy.nominal_voltage,
            calibration_samples: acquisition.calibration_samples,
            persist_interval_ms: config.energy.persist_interval_secs.saturating_mul(1000),
            last_persist_ms: now,
        })
    }

    /// Zero offset calibration of every channel. Run with all loads off.
    pub fn calibrate(&mut self) {
        let samples = self.calibration_samples;
        self.main.calibrate(samples);
        for load in self.loads.iter_mut() {
            load.calibrate(samples);
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.main.is_calibrated() && self.loads.iter().all(SignalAcquirer::is_calibrated)
    }

    /// One sampling tick on every channel.
    pub fn sample(&mut self) {
        self.main.update();
        for load in self.loads.iter_mut() {
            load.update();
        }
    }

    pub fn set_mains_frequency(&mut self, mains_hz: f64) {
        self.main.set_window_duration(mains_hz);
        for load in self.loads.iter_mut() {
            load.set_window_duration(mains_hz);
        }
    }

    /*
    * @brief Run accumulation and theft detection on the latest current estimates.
    * @return Snapshot of every value the display and network layers report
    * @note Energy is persisted once the persist interval has elapsed. A failed
    *       write is logged and retried on the next cycle.
    */
    pub fn process_cycle(&mut self) -> MeterReading {
        let now = self.clock.now_ms();

        let main_current = self.main.current_estimate();
        let currents: Vec<f64> = self.loads.iter().map(SignalAcquirer::current_estimate).collect();
        let powers: Vec<f64> = currents.iter().map(|current| current * self.voltage).collect();

        self.energy.update_energy(&powers, now);

        let total_current: f64 = currents.iter().sum();
        let newly_confirmed = self.theft.check_theft(main_current, total_current);
        self.theft.update_buzzer();

        if now.saturating_sub(self.last_persist_ms) >= self.persist_interval_ms {
            match self.energy.persist() {
                Ok(()) => self.last_persist_ms = now,
                Err(e) => log::error!("Failed to save energy: {}", e),
            }
        }

        let loads = self
            .loads
            .iter()
            .zip(currents.iter().zip(powers.iter()))
            .enumerate()
            .map(|(i, (acq, (&current, &power)))| LoadReading {
                name: acq.name().to_string(),
                current,
                power,
                energy: self.energy.energy(i),
                cost: self.energy.cost(i),
            })
            .collect();

        MeterReading {
            timestamp_ms: now,
            voltage: self.voltage,
            main_current,
            loads,
            total_current,
            total_power: powers.iter().sum(),
            total_energy: self.energy.total_energy(),
            total_cost: self.energy.total_cost(),
            price_per_unit: self.energy.price(),
            theft_state: self.theft.state(),
            theft_confirmed: self.theft.is_confirmed(),
            theft_newly_confirmed: newly_confirmed,
            theft_remaining_secs: self.theft.remaining_confirmation_time(),
        }
    }

    /// Keeps the buzzer toggling between processing cycles; call at least every few hundred ms.
    pub fn update_buzzer(&mut self) {
        self.theft.update_buzzer();
    }

    pub fn clear_alert(&mut self) {
        self.theft.clear_alert();
    }

    pub fn set_price(&mut self, price: f64) -> Result<()> {
        self.energy.set_price(price)
    }

    pub fn reset_energy(&mut self) -> Result<()> {
        self.energy.reset_energy()?;
        self.last_persist_ms = self.clock.now_ms();
        Ok(())
    }

    /// Final save before power down or process exit.
    pub fn shutdown(&mut self) -> Result<()> {
        log::info!("Saving energy counters before shutdown");
        self.energy.persist()?;
        self.last_persist_ms = self.clock.now_ms();
        Ok(())
    }

    pub fn main(&self) -> &SignalAcquirer<S> {
        &self.main
    }

    pub fn loads(&self) -> &[SignalAcquirer<S>] {
        &self.loads
    }

    pub fn energy(&self) -> &EnergyAccumulator<D> {
        &self.energy
    }

    pub fn theft(&self) -> &TheftMonitor<C, O> {
        &self.theft
    }
}
