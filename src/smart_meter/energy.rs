use super::error::{MeterError, Result};
use super::hal::DurableStore;
use super::types::MS_PER_HOUR;

const KEY_TOTAL_ENERGY: &str = "total_energy";
const KEY_PRICE: &str = "price";

fn energy_key(load: usize) -> String {
    format!("energy_l{}", load + 1)
}

/*
* @brief Energy in kWh drawn at a constant power over an interval.
* @param power Power in W
* @param elapsed_ms Interval in milliseconds
*/
fn energy_increment_kwh(power: f64, elapsed_ms: u64) -> f64 {
    (power / 1000.0) * (elapsed_ms as f64 / MS_PER_HOUR)
}

/// Cumulative energy per load, derived cost and their persistence.
///
/// Cost is never stored: it is always `energy * price`.
#[derive(Debug)]
pub struct EnergyAccumulator<D> {
    store: D,
    energy: Vec<f64>, // kWh per load
    total_energy: f64, // kWh
    price_per_unit: f64,
    last_update_ms: u64,
}

impl<D: DurableStore> EnergyAccumulator<D> {
    /*
    * @brief Restore the running totals from the store.
    * @param store Durable store holding the energy namespace
    * @param loads Number of monitored loads
    * @param default_price Price used when none has been stored yet
    * @param now_ms Current monotonic time, start of the first integration interval
    * @note The total is recomputed from the per-load values so it always matches their sum.
    */
    pub fn restore(store: D, loads: usize, default_price: f64, now_ms: u64) -> Self {
        let energy: Vec<f64> = (0..loads)
            .map(|load| store.get_or(&energy_key(load), 0.0))
            .map(|e| if e.is_finite() && e >= 0.0 { e } else { 0.0 })
            .collect();

        let stored_price = store.get_or(KEY_PRICE, default_price);
        let price_per_unit = if stored_price.is_finite() && stored_price > 0.0 {
            stored_price
        } else {
            default_price
        };

        let total_energy: f64 = energy.iter().sum();

        let stored_total = store.get_or(KEY_TOTAL_ENERGY, total_energy);
        if (stored_total - total_energy).abs() > 1e-9 {
            log::warn!(
                "Stored total energy {:.6} kWh does not match the loads, using {:.6} kWh",
                stored_total,
                total_energy
            );
        }

        let accumulator = Self {
            store,
            energy,
            total_energy,
            price_per_unit,
            last_update_ms: now_ms,
        };

        log::info!("Energy accumulator initialized");
        for (load, energy) in accumulator.energy.iter().enumerate() {
            log::info!("  Load {} energy: {:.3} kWh", load + 1, energy);
        }
        log::info!("  Total energy: {:.3} kWh", accumulator.total_energy);
        log::info!("  Price per unit: {:.2}", accumulator.price_per_unit);

        accumulator
    }

    /*
    * @brief Integrate power over the time elapsed since the previous call.
    * @param powers Power per load in W; missing entries count as 0
    * @param now_ms Current monotonic time
    * @note A non-advancing clock adds nothing and keeps the last timestamp,
    *       so repeating a call with the same `now_ms` never double counts.
    */
    pub fn update_energy(&mut self, powers: &[f64], now_ms: u64) {
        if now_ms <= self.last_update_ms {
            return;
        }

        let elapsed_ms = now_ms - self.last_update_ms;

        for (load, energy) in self.energy.iter_mut().enumerate() {
            let power = powers.get(load).copied().unwrap_or(0.0);
            if !power.is_finite() {
                log::warn!("Ignoring non-finite power {} on load {}", power, load + 1);
                continue;
            }
            *energy += energy_increment_kwh(power, elapsed_ms);
        }

        self.total_energy = self.energy.iter().sum();
        self.last_update_ms = now_ms;
    }

    /// Writes the energy totals (not the price) as one snapshot.
    pub fn persist(&mut self) -> Result<()> {
        let keys: Vec<String> = (0..self.energy.len()).map(energy_key).collect();

        let mut entries: Vec<(&str, f64)> = keys
            .iter()
            .map(String::as_str)
            .zip(self.energy.iter().copied())
            .collect();
        entries.push((KEY_TOTAL_ENERGY, self.total_energy));

        self.store.put_all(&entries)
    }

    /*
    * @brief Change the price per kWh and persist it immediately.
    * @param price New price; must be finite and positive
    * @note The in-memory price changes even when the write fails.
    */
    pub fn set_price(&mut self, price: f64) -> Result<()> {
        if !(price.is_finite() && price > 0.0) {
            return Err(MeterError::InvalidPrice(price));
        }

        self.price_per_unit = price;
        log::info!("Price updated to {:.2} per kWh", price);

        self.store.put(KEY_PRICE, price)
    }

    /// Zeroes every energy counter and persists immediately. The price is kept.
    pub fn reset_energy(&mut self) -> Result<()> {
        self.energy.iter_mut().for_each(|e| *e = 0.0);
        self.total_energy = 0.0;
        log::info!("Energy counters reset");

        self.persist()
    }

    pub fn loads(&self) -> usize {
        self.energy.len()
    }

    /// Energy of one load in kWh, 0 for an unknown load.
    pub fn energy(&self, load: usize) -> f64 {
        self.energy.get(load).copied().unwrap_or(0.0)
    }

    pub fn total_energy(&self) -> f64 {
        self.total_energy
    }

    pub fn cost(&self, load: usize) -> f64 {
        self.energy(load) * self.price_per_unit
    }

    pub fn total_cost(&self) -> f64 {
        self.total_energy * self.price_per_unit
    }

    pub fn price(&self) -> f64 {
        self.price_per_unit
    }

    pub fn last_update_ms(&self) -> u64 {
        self.last_update_ms
    }

    pub fn store(&self) -> &D {
        &self.store
    }
}
