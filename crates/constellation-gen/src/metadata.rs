//! Satellite metadata generation.
//!
//! Descriptive data attached to each generated satellite for the selection
//! info panel: designator, bus model, launch date and a telemetry block.
//! Zombies report degraded telemetry. None of this feeds kinematics,
//! screening or risk.

use rand::Rng;
use serde::{Deserialize, Serialize};

const MODELS: [&str; 4] = ["NanoSat v4", "Bus-X", "CommsLink Mk1", "Obs-7"];

/// Default name palette for newly created constellations.
pub const DEFAULT_NAMES: [&str; 6] = [
    "Ikirere Alpha",
    "Beta Network",
    "Gamma Array",
    "Delta Mesh",
    "Epsilon Grid",
    "Zeta Cluster",
];

/// Cosmetic color palette, cycled by constellation index.
pub const PALETTE: [&str; 8] = [
    "#00F0FF", "#FF6B35", "#7B2CBF", "#2ECC71", "#E74C3C", "#F39C12", "#3498DB", "#E91E63",
];

pub fn color_for(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

pub fn name_for(index: usize) -> &'static str {
    DEFAULT_NAMES[index % DEFAULT_NAMES.len()]
}

/// Point-in-time health readings for one satellite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Telemetry {
    pub battery_pct: f64,
    pub temperature_c: f64,
    pub signal_dbm: f64,
    pub solar_output_w: f64,
    pub latency_ms: f64,
    pub cpu_load_pct: f64,
}

/// Descriptive satellite record. Generated once per satellite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatelliteMetadata {
    pub designator: String,
    pub model: String,
    pub launch_date: String,
    pub telemetry: Telemetry,
}

/// Generate metadata for the satellite at `index` within its constellation.
pub fn generate_metadata<R: Rng>(index: usize, is_zombie: bool, rng: &mut R) -> SatelliteMetadata {
    let launch_year = 2020 + rng.gen_range(0..6);
    let launch_month = rng.gen_range(1..=12);
    let launch_day = rng.gen_range(1..=28);

    let telemetry = if is_zombie {
        Telemetry {
            battery_pct: rng.gen::<f64>() * 30.0,
            // Thermal control lost: parked hot or cold.
            temperature_c: (if rng.gen::<bool>() { 80.0 } else { -40.0 }) + rng.gen::<f64>() * 20.0,
            signal_dbm: -110.0 - rng.gen::<f64>() * 20.0,
            solar_output_w: rng.gen::<f64>() * 100.0,
            latency_ms: 999.0,
            cpu_load_pct: 0.0,
        }
    } else {
        Telemetry {
            battery_pct: 85.0 + rng.gen::<f64>() * 15.0,
            temperature_c: 25.0 + rng.gen::<f64>() * 10.0,
            signal_dbm: -65.0 - rng.gen::<f64>() * 15.0,
            solar_output_w: 450.0 + rng.gen::<f64>() * 50.0,
            latency_ms: 20.0 + rng.gen::<f64>() * 40.0,
            cpu_load_pct: 30.0 + rng.gen::<f64>() * 40.0,
        }
    };

    SatelliteMetadata {
        designator: format!("IK-{}-{:03}", launch_year, index + 1),
        model: MODELS[index % MODELS.len()].to_string(),
        launch_date: format!("{}-{:02}-{:02}", launch_year, launch_month, launch_day),
        telemetry,
    }
}
