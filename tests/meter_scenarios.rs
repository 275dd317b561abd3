use smart_meter::{
    rms_mv_for_current, ManualClock, MemoryStore, MeterConfig, MeterError, MeterReading, RecordingOutput,
    SignalLevel, SimulatedSampler, SmartMeter, TheftState,
};

type Meter<'a> = SmartMeter<SimulatedSampler, &'a mut MemoryStore, ManualClock, RecordingOutput>;

// Samples per simulated second; several full RMS windows.
const SAMPLES_PER_CYCLE: usize = 400;

struct Levels {
    main: SignalLevel,
    loads: Vec<SignalLevel>,
}

impl Levels {
    fn set(&self, config: &MeterConfig, main_amps: f64, load_amps: &[f64]) {
        self.main.set_rms_mv(rms_mv_for_current(main_amps, &config.channels.main));
        for ((level, channel), amps) in self.loads.iter().zip(config.channels.loads.iter()).zip(load_amps) {
            level.set_rms_mv(rms_mv_for_current(*amps, channel));
        }
    }
}

fn build<'a>(config: &MeterConfig, store: &'a mut MemoryStore, clock: &ManualClock) -> (Meter<'a>, Levels) {
    let acquisition = &config.acquisition;
    let levels = Levels {
        main: SignalLevel::new(0.0),
        loads: config.channels.loads.iter().map(|_| SignalLevel::new(0.0)).collect(),
    };

    let main = SimulatedSampler::new(acquisition, levels.main.clone()).with_noise(0.0);
    let loads = levels
        .loads
        .iter()
        .map(|level| SimulatedSampler::new(acquisition, level.clone()).with_noise(0.0))
        .collect();

    let meter = SmartMeter::new(config, main, loads, store, clock.clone(), RecordingOutput::new()).unwrap();
    (meter, levels)
}

/// One simulated second: sample, advance the clock, process.
fn run_second(meter: &mut Meter<'_>, clock: &ManualClock) -> MeterReading {
    for _ in 0..SAMPLES_PER_CYCLE {
        meter.sample();
    }
    clock.advance(1_000);
    meter.process_cycle()
}

#[test]
fn unmetered_draw_is_confirmed_after_fifteen_seconds() {
    let config = MeterConfig::default();
    let mut store = MemoryStore::new();
    let clock = ManualClock::new(0);
    let (mut meter, levels) = build(&config, &mut store, &clock);

    meter.calibrate();
    levels.set(&config, 0.5, &[0.0, 0.0]);

    let first = run_second(&mut meter, &clock);
    assert!((first.main_current - 0.5).abs() < 0.02);
    assert_eq!(first.total_current, 0.0);
    assert_eq!(first.theft_state, TheftState::Suspected { since_ms: 1_000 });
    assert_eq!(first.theft_remaining_secs, 15);

    let mut confirmed_at = Vec::new();
    for second in 2..=20 {
        let reading = run_second(&mut meter, &clock);
        if reading.theft_newly_confirmed {
            confirmed_at.push(second);
        }
    }

    assert_eq!(confirmed_at, [16]);
    assert!(meter.theft().is_confirmed());
    assert!(meter.theft().output().edges() > 0);
}

#[test]
fn balanced_loads_never_raise_suspicion() {
    let config = MeterConfig::default();
    let mut store = MemoryStore::new();
    let clock = ManualClock::new(0);
    let (mut meter, levels) = build(&config, &mut store, &clock);

    meter.calibrate();
    // Main and load1 share a regression, so identical signals give identical estimates.
    levels.set(&config, 1.5, &[1.5, 0.0]);

    for _ in 0..30 {
        let reading = run_second(&mut meter, &clock);
        assert_eq!(reading.theft_state, TheftState::Normal);
        assert_eq!(reading.main_current, reading.total_current);
        assert!(reading.main_current > 1.4);
    }
    assert_eq!(meter.theft().output().edges(), 0);
}

#[test]
fn manual_clear_silences_alert() {
    let config = MeterConfig::default();
    let mut store = MemoryStore::new();
    let clock = ManualClock::new(0);
    let (mut meter, levels) = build(&config, &mut store, &clock);

    meter.calibrate();
    levels.set(&config, 2.0, &[0.0, 0.0]);
    for _ in 0..16 {
        run_second(&mut meter, &clock);
    }
    assert!(meter.theft().is_confirmed());
    assert!(meter.theft().output().is_high());

    // Still confirmed after the unmetered draw stops.
    levels.set(&config, 0.0, &[0.0, 0.0]);
    let reading = run_second(&mut meter, &clock);
    assert!(reading.theft_confirmed);

    meter.clear_alert();
    assert!(!meter.theft().output().is_high());

    let reading = run_second(&mut meter, &clock);
    assert_eq!(reading.theft_state, TheftState::Normal);
    assert!(!reading.theft_confirmed);
    assert!(!meter.theft().output().is_high());
}

#[test]
fn energy_is_saved_on_interval_and_restored() {
    let config = MeterConfig::default();
    let mut store = MemoryStore::new();
    let clock = ManualClock::new(0);

    let saved_load1;
    {
        let (mut meter, levels) = build(&config, &mut store, &clock);
        meter.calibrate();
        levels.set(&config, 1.5, &[1.0, 0.5]);

        for _ in 0..59 {
            run_second(&mut meter, &clock);
        }
        assert_eq!(meter.energy().store().get("energy_l1"), None);

        let reading = run_second(&mut meter, &clock);
        saved_load1 = meter.energy().store().get("energy_l1").unwrap();
        assert_eq!(saved_load1, reading.loads[0].energy);

        // 230 W for one minute
        let expected = 230.0 * 60.0 / 3_600_000.0;
        assert!((saved_load1 - expected).abs() / expected < 0.05);
        assert!((reading.total_energy - reading.loads.iter().map(|l| l.energy).sum::<f64>()).abs() < 1e-12);
    }

    let (meter, _levels) = build(&config, &mut store, &clock);
    assert_eq!(meter.energy().energy(0), saved_load1);
    assert_eq!(meter.energy().price(), 5.0);
}

#[test]
fn shutdown_persists_energy_and_price_survives() {
    let config = MeterConfig::default();
    let mut store = MemoryStore::new();
    let clock = ManualClock::new(0);

    {
        let (mut meter, levels) = build(&config, &mut store, &clock);
        meter.calibrate();
        meter.set_price(8.0).unwrap();
        levels.set(&config, 1.0, &[1.0, 0.0]);
        for _ in 0..5 {
            run_second(&mut meter, &clock);
        }
        meter.shutdown().unwrap();
    }

    assert_eq!(store.get("price"), Some(8.0));
    let energy = store.get("energy_l1").unwrap();
    assert!(energy > 0.0);

    let (mut meter, _levels) = build(&config, &mut store, &clock);
    meter.calibrate();
    let reading = run_second(&mut meter, &clock);
    assert_eq!(reading.price_per_unit, 8.0);
    assert!((reading.total_cost - reading.total_energy * 8.0).abs() < 1e-12);
    assert_eq!(reading.loads[0].energy, energy);
}

#[test]
fn uncalibrated_meter_reads_zero() {
    let config = MeterConfig::default();
    let mut store = MemoryStore::new();
    let clock = ManualClock::new(0);
    let (mut meter, levels) = build(&config, &mut store, &clock);

    levels.set(&config, 3.0, &[1.0, 1.0]);
    let reading = run_second(&mut meter, &clock);

    assert!(!meter.is_calibrated());
    assert_eq!(reading.main_current, 0.0);
    assert_eq!(reading.total_power, 0.0);
    assert_eq!(reading.total_energy, 0.0);
    assert_eq!(reading.theft_state, TheftState::Normal);
}

#[test]
fn failed_periodic_save_is_retried() {
    let config = MeterConfig::default();
    let mut store = MemoryStore::new();
    store.set_unavailable(true);
    let clock = ManualClock::new(0);

    let (mut meter, levels) = build(&config, &mut store, &clock);
    meter.calibrate();
    levels.set(&config, 1.0, &[1.0, 0.0]);
    for _ in 0..61 {
        run_second(&mut meter, &clock);
    }
    assert!(meter.energy().energy(0) > 0.0);
    assert_eq!(meter.energy().store().writes(), 0);
    assert!(meter.shutdown().is_err());
}

#[test]
fn mains_frequency_change_resizes_windows() {
    let config = MeterConfig::default();
    let mut store = MemoryStore::new();
    let clock = ManualClock::new(0);
    let (mut meter, _levels) = build(&config, &mut store, &clock);

    assert_eq!(meter.main().window_len(), 80);
    meter.set_mains_frequency(60.0);
    assert_eq!(meter.main().window_len(), 67);
    assert!(meter.loads().iter().all(|load| load.window_len() == 67));
}

#[test]
fn sampler_count_must_match_loads() {
    let config = MeterConfig::default();
    let acquisition = &config.acquisition;
    let mut store = MemoryStore::new();

    let result = SmartMeter::new(
        &config,
        SimulatedSampler::new(acquisition, SignalLevel::new(0.0)),
        vec![SimulatedSampler::new(acquisition, SignalLevel::new(0.0))],
        &mut store,
        ManualClock::new(0),
        RecordingOutput::new(),
    );

    assert!(matches!(result, Err(MeterError::InvalidConfig(_))));
}
