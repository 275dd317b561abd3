use crate::smart_meter::types::{MeterReading, TheftState};

/*
* @brief Functions to report the meter data through the log.
* @param data Reading produced by SmartMeter::process_cycle
*/
pub fn print_currents(data: &MeterReading) {
    log::info!("Current:");
    log::info!("  Main feed: {:.3} A", data.main_current);
    for load in &data.loads {
        log::info!("  {}: {:.3} A", load.name, load.current);
    }
    log::info!("  Sum of loads: {:.3} A\n", data.total_current);
}

/*
* @brief Print the power data
* @param data Reading produced by SmartMeter::process_cycle
*/
pub fn print_power(data: &MeterReading) {
    log::info!("Power (at {:.1} V):", data.voltage);
    for load in &data.loads {
        log::info!("  {}: {:.2} W", load.name, load.power);
    }
    log::info!("  Total: {:.2} W\n", data.total_power);
}

/*
* @brief Print energy and cost per load and in total
* @param data Reading produced by SmartMeter::process_cycle
*/
pub fn print_energy(data: &MeterReading) {
    log::info!("Energy (price {:.2} per kWh):", data.price_per_unit);
    for load in &data.loads {
        log::info!("  {}: {:.3} kWh ({:.2})", load.name, load.energy, load.cost);
    }
    log::info!("  Total: {:.3} kWh ({:.2})\n", data.total_energy, data.total_cost);
}

pub fn print_theft(data: &MeterReading) {
    let state = data.theft_state.as_str();
    match data.theft_state {
        TheftState::Normal => log::info!("Theft: {}", state),
        TheftState::Suspected { .. } => {
            log::warn!("Theft: {}, confirmation in {} s", state, data.theft_remaining_secs)
        }
        TheftState::Confirmed => log::warn!("Theft: {}, alert active", state),
    }
}

/*
* @brief Print every section of a reading, plus its JSON form at debug level.
* @param data Reading produced by SmartMeter::process_cycle
*/
pub fn print_all(data: &MeterReading) {
    print_currents(data);
    print_power(data);
    print_energy(data);
    print_theft(data);

    match serde_json::to_string(data) {
        Ok(json) => log::debug!("{}", json),
        Err(e) => log::warn!("Reading could not be encoded: {}", e),
    }
}
