use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use signal_hook::consts::signal::{SIGINT, SIGTERM};

use smart_meter::{
    print::print_all, rms_mv_for_current, JsonFileStore, LogOutput, MeterConfig, MonotonicClock, SignalLevel,
    SimulatedSampler, SmartMeter,
};

/// Smart energy meter running on simulated current transducers
#[derive(Parser, Debug)]
#[command(author, version, about = "Two-circuit energy meter with theft detection", long_about = None)]
struct Args {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File holding the persisted energy counters and price
    #[arg(short, long, default_value = "energy.json")]
    store: PathBuf,

    /// Current drawn by each monitored load, in amps
    #[arg(long = "load-amps", value_delimiter = ',', default_values_t = [1.0, 0.5])]
    load_amps: Vec<f64>,

    /// Start drawing unmetered current from the main feed after this many seconds
    #[arg(long)]
    theft_after: Option<u64>,

    /// Unmetered current injected on the main feed, in amps
    #[arg(long, default_value_t = 0.5)]
    theft_amps: f64,

    /// Clear a confirmed alert (and stop the unmetered draw) after this many seconds
    #[arg(long)]
    clear_after: Option<u64>,

    /// Set the price per kWh before starting
    #[arg(long)]
    price: Option<f64>,

    /// Zero the energy counters before starting
    #[arg(long)]
    reset_energy: bool,

    /// Seconds between processing cycles and status reports
    #[arg(long, default_value_t = 1)]
    report_secs: u64,

    /// Stop after this many seconds (runs until SIGINT/SIGTERM otherwise)
    #[arg(long)]
    run_secs: Option<u64>,
}

fn main() -> smart_meter::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = MeterConfig::load(args.config.as_deref())?;

    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&term))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&term))?;

    let acquisition = &config.acquisition;
    let main_level = SignalLevel::new(0.0);
    let load_levels: Vec<SignalLevel> = config.channels.loads.iter().map(|_| SignalLevel::new(0.0)).collect();

    let main_sampler = SimulatedSampler::new(acquisition, main_level.clone());
    let load_samplers = load_levels
        .iter()
        .map(|level| SimulatedSampler::new(acquisition, level.clone()))
        .collect();

    let store = JsonFileStore::open(&args.store)?;
    log::info!("Energy store: {}", store.path().display());

    let mut meter = SmartMeter::new(
        &config,
        main_sampler,
        load_samplers,
        store,
        MonotonicClock::new(),
        LogOutput::new("buzzer"),
    )?;

    if args.reset_energy {
        meter.reset_energy()?;
    }
    if let Some(price) = args.price {
        meter.set_price(price)?;
    }

    // Loads are off while the zero offsets are measured.
    meter.calibrate();

    let mut metered_amps = 0.0;
    for (i, (level, channel)) in load_levels.iter().zip(config.channels.loads.iter()).enumerate() {
        let amps = args.load_amps.get(i).copied().unwrap_or(0.0);
        level.set_rms_mv(rms_mv_for_current(amps, channel));
        metered_amps += amps;
        log::info!("Simulating {:.3} A on {}", amps, channel.name);
    }
    main_level.set_rms_mv(rms_mv_for_current(metered_amps, &config.channels.main));

    let tick = Duration::from_secs_f64(1.0 / acquisition.sample_rate_hz);
    let report_every = Duration::from_secs(args.report_secs.max(1));
    let started = Instant::now();
    let mut last_report = Instant::now();
    let mut theft_injected = false;

    while !term.load(Ordering::Relaxed) {
        meter.sample();
        meter.update_buzzer();

        let elapsed = started.elapsed().as_secs();

        if !theft_injected && args.theft_after.is_some_and(|after| elapsed >= after) {
            main_level.set_rms_mv(rms_mv_for_current(metered_amps + args.theft_amps, &config.channels.main));
            theft_injected = true;
            log::info!("Simulating {:.3} A of unmetered draw", args.theft_amps);
        }

        if meter.theft().is_confirmed() && args.clear_after.is_some_and(|after| elapsed >= after) {
            main_level.set_rms_mv(rms_mv_for_current(metered_amps, &config.channels.main));
            meter.clear_alert();
        }

        if last_report.elapsed() >= report_every {
            let reading = meter.process_cycle();
            print_all(&reading);
            if reading.theft_newly_confirmed {
                log::error!("Theft alert raised, waiting for manual clear");
            }
            last_report = Instant::now();
        }

        if args.run_secs.is_some_and(|secs| elapsed >= secs) {
            break;
        }

        spin_sleep::sleep(tick);
    }

    meter.shutdown()?;
    log::info!("Meter stopped");
    Ok(())
}
