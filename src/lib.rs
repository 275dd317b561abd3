//! Measurement core of a two-circuit smart energy meter: windowed RMS current
//! acquisition, energy and cost accumulation with durable totals, and
//! debounced detection of unmetered current draw.

pub mod smart_meter;

pub use smart_meter::*;
