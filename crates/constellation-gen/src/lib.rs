//! Constellation Generation Library
//!
//! Turns a caller-supplied constellation configuration into a fixed-size set
//! of orbital parameters. Two generation policies:
//!
//! - **Coordinated**: live satellites are partitioned into shells of at most
//!   50, evenly phased within each shell, on discrete latitude bands, all at
//!   uniform angular rate. Disciplined station-keeping.
//! - **Uncoordinated**: randomized phase, latitude, radius and speed.
//!   Zombies (derelicts) are always uncoordinated and drift slower.
//!
//! The random source is injected so generation is reproducible under a fixed
//! seed in tests while staying random in production.

use std::f64::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use orbital_kinematics::OrbitalParameters;

pub mod metadata;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Maximum satellites per coordinated shell.
pub const MAX_SHELL_SIZE: i32 = 50;

/// Latitude-band step for coordinated shells, radians before inclination scaling.
pub const SHELL_BAND_STEP: f64 = 0.3;

/// Inclination cap applied to coordinated latitude bands.
pub const SHELL_INCLINATION_CAP: f64 = 0.5;

/// Total spread of per-shell radius offsets, centered on zero.
pub const SHELL_RADIUS_SPREAD: f64 = 0.3;

/// Radius-offset half-range for uncoordinated satellites.
pub const RANDOM_RADIUS_HALF_RANGE: f64 = 0.1;

/// Speed-offset range for uncoordinated live satellites.
pub const LIVE_SPEED_RANGE: (f64, f64) = (0.5, 1.0);

/// Speed-offset range for zombies. Derelicts drift slower.
pub const ZOMBIE_SPEED_RANGE: (f64, f64) = (0.1, 0.4);

/// One constellation's caller-supplied configuration.
///
/// `color` and `name` are cosmetic passthroughs for the rendering layer;
/// the core never reads them. Counts are signed so out-of-range input from
/// the control surface is reported as `InvalidConfig` rather than wrapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstellationConfig {
    pub id: String,
    pub name: String,
    pub color: String,
    pub satellite_count: i32,
    #[serde(default)]
    pub zombie_count: i32,
    pub altitude: f64,
    pub inclination: f64,
    pub speed: f64,
    pub coordinated: bool,
    pub visible: bool,
}

impl ConstellationConfig {
    /// Validate ranges. Violations are reported, never silently clamped.
    pub fn validate(&self) -> Result<()> {
        if self.satellite_count < 0 {
            return Err(ConfigError::InvalidConfig(format!(
                "satellite_count must be >= 0, got {}",
                self.satellite_count
            )));
        }
        if self.zombie_count < 0 {
            return Err(ConfigError::InvalidConfig(format!(
                "zombie_count must be >= 0, got {}",
                self.zombie_count
            )));
        }
        if !(0.0..=std::f64::consts::PI).contains(&self.inclination) {
            return Err(ConfigError::InvalidConfig(format!(
                "inclination must be in [0, pi], got {}",
                self.inclination
            )));
        }
        if self.speed <= 0.0 {
            return Err(ConfigError::InvalidConfig(format!(
                "speed must be > 0, got {}",
                self.speed
            )));
        }
        Ok(())
    }

    pub fn total_satellites(&self) -> usize {
        (self.satellite_count + self.zombie_count).max(0) as usize
    }
}

/// Generate orbital parameters for one constellation.
///
/// Returns `satellite_count + zombie_count` entries: indices
/// `[0, satellite_count)` are live, the rest are zombies. Satellite ids are
/// assigned sequentially from `base_id`; the caller guarantees run-wide
/// uniqueness by handing out disjoint id ranges.
pub fn generate<R: Rng>(
    config: &ConstellationConfig,
    base_id: u32,
    rng: &mut R,
) -> Result<Vec<OrbitalParameters>> {
    config.validate()?;

    let live = config.satellite_count;
    let total = config.total_satellites();
    let mut sats = Vec::with_capacity(total);

    for i in 0..total as i32 {
        let is_zombie = i >= live;
        let params = if config.coordinated && !is_zombie {
            coordinated_params(config, i, base_id)
        } else {
            randomized_params(config, i, base_id, is_zombie, rng)
        };
        sats.push(params);
    }

    Ok(sats)
}

/// Shell layout for a coordinated constellation of `live` satellites.
///
/// Returns `(shell_index, position_in_shell, shell_population, num_shells)`.
fn shell_layout(live: i32, i: i32) -> (i32, i32, i32, i32) {
    let num_shells = ((live + MAX_SHELL_SIZE - 1) / MAX_SHELL_SIZE).max(1);
    let sats_per_shell = (live + num_shells - 1) / num_shells;
    let shell_index = i / sats_per_shell;
    let pos_in_shell = i % sats_per_shell;
    // The last shell may be short.
    let shell_population = sats_per_shell.min(live - shell_index * sats_per_shell);
    (shell_index, pos_in_shell, shell_population, num_shells)
}

fn coordinated_params(config: &ConstellationConfig, i: i32, base_id: u32) -> OrbitalParameters {
    let (shell_index, pos_in_shell, shell_population, num_shells) =
        shell_layout(config.satellite_count, i);

    // Even phasing within the shell avoids angular bunching; three discrete
    // latitude bands (-1, 0, +1) scaled by the capped inclination.
    let theta = (pos_in_shell as f64 / shell_population as f64) * TAU;
    let band = (shell_index % 3 - 1) as f64;
    let phi = band * SHELL_BAND_STEP * config.inclination.min(SHELL_INCLINATION_CAP);
    let radius_offset =
        (shell_index as f64 / num_shells as f64) * SHELL_RADIUS_SPREAD - SHELL_RADIUS_SPREAD / 2.0;

    OrbitalParameters {
        theta,
        phi,
        radius_offset,
        // Uniform angular rate is the defining property of coordination.
        speed_offset: 1.0,
        is_zombie: false,
        constellation_id: config.id.clone(),
        satellite_id: base_id + i as u32,
    }
}

fn randomized_params<R: Rng>(
    config: &ConstellationConfig,
    i: i32,
    base_id: u32,
    is_zombie: bool,
    rng: &mut R,
) -> OrbitalParameters {
    let (speed_lo, speed_hi) = if is_zombie {
        ZOMBIE_SPEED_RANGE
    } else {
        LIVE_SPEED_RANGE
    };

    OrbitalParameters {
        theta: rng.gen::<f64>() * TAU,
        phi: (rng.gen::<f64>() - 0.5) * config.inclination,
        radius_offset: (rng.gen::<f64>() - 0.5) * 2.0 * RANDOM_RADIUS_HALF_RANGE,
        speed_offset: speed_lo + rng.gen::<f64>() * (speed_hi - speed_lo),
        is_zombie,
        constellation_id: config.id.clone(),
        satellite_id: base_id + i as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config(count: i32, zombies: i32, coordinated: bool) -> ConstellationConfig {
        ConstellationConfig {
            id: "alpha".to_string(),
            name: "Alpha".to_string(),
            color: "#00F0FF".to_string(),
            satellite_count: count,
            zombie_count: zombies,
            altitude: 1.5,
            inclination: 0.8,
            speed: 0.5,
            coordinated,
            visible: true,
        }
    }

    #[test]
    fn test_generated_length_and_zombie_partition() {
        let mut rng = StdRng::seed_from_u64(1);
        let sats = generate(&config(10, 3, false), 0, &mut rng).unwrap();
        assert_eq!(sats.len(), 13);
        assert!(sats[..10].iter().all(|s| !s.is_zombie));
        assert!(sats[10..].iter().all(|s| s.is_zombie));
    }

    #[test]
    fn test_coordinated_uniform_speed() {
        let mut rng = StdRng::seed_from_u64(2);
        let sats = generate(&config(500, 0, true), 0, &mut rng).unwrap();
        assert_eq!(sats.len(), 500);
        assert!(sats.iter().all(|s| s.speed_offset == 1.0));
    }

    #[test]
    fn test_coordinated_shell_phasing_is_even() {
        let mut rng = StdRng::seed_from_u64(3);
        let sats = generate(&config(120, 0, true), 0, &mut rng).unwrap();

        // 120 live satellites -> 3 shells of 40.
        for shell in 0..3 {
            let thetas: Vec<f64> = sats[shell * 40..(shell + 1) * 40]
                .iter()
                .map(|s| s.theta)
                .collect();
            let gaps: Vec<f64> = thetas.windows(2).map(|w| w[1] - w[0]).collect();
            let max_gap = gaps.iter().cloned().fold(f64::MIN, f64::max);
            let min_gap = gaps.iter().cloned().fold(f64::MAX, f64::min);
            assert!(gaps.iter().all(|g| *g > 0.0), "theta not increasing");
            assert!(max_gap - min_gap < 1e-9, "uneven phasing in shell {shell}");
        }
    }

    #[test]
    fn test_coordinated_shell_offsets_within_bounds() {
        let mut rng = StdRng::seed_from_u64(4);
        let sats = generate(&config(200, 0, true), 0, &mut rng).unwrap();
        for s in &sats {
            assert!(s.radius_offset >= -0.15 && s.radius_offset <= 0.15);
            assert!(s.phi.abs() <= SHELL_BAND_STEP * SHELL_INCLINATION_CAP + 1e-12);
        }
    }

    #[test]
    fn test_uncoordinated_ranges() {
        let mut rng = StdRng::seed_from_u64(5);
        let sats = generate(&config(200, 50, false), 0, &mut rng).unwrap();

        for s in &sats[..200] {
            assert!(s.theta >= 0.0 && s.theta < TAU);
            assert!(s.phi.abs() <= 0.8 / 2.0);
            assert!(s.radius_offset.abs() <= RANDOM_RADIUS_HALF_RANGE);
            assert!(s.speed_offset >= 0.5 && s.speed_offset <= 1.0);
        }
        for z in &sats[200..] {
            assert!(z.speed_offset >= 0.1 && z.speed_offset <= 0.4);
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let cfg = config(50, 5, false);
        let a = generate(&cfg, 0, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = generate(&cfg, 0, &mut StdRng::seed_from_u64(9)).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.theta, y.theta);
            assert_eq!(x.speed_offset, y.speed_offset);
        }
    }

    #[test]
    fn test_zero_satellites_is_legal() {
        let mut rng = StdRng::seed_from_u64(6);
        let sats = generate(&config(0, 0, true), 0, &mut rng).unwrap();
        assert!(sats.is_empty());
    }

    #[test]
    fn test_negative_counts_rejected() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(generate(&config(-1, 0, false), 0, &mut rng).is_err());
        assert!(generate(&config(10, -2, false), 0, &mut rng).is_err());
    }

    #[test]
    fn test_invalid_angles_and_speed_rejected() {
        let mut bad = config(10, 0, false);
        bad.inclination = 4.0;
        assert!(bad.validate().is_err());

        let mut bad = config(10, 0, false);
        bad.speed = 0.0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_base_id_offsets_satellite_ids() {
        let mut rng = StdRng::seed_from_u64(8);
        let sats = generate(&config(5, 0, true), 100, &mut rng).unwrap();
        let ids: Vec<u32> = sats.iter().map(|s| s.satellite_id).collect();
        assert_eq!(ids, vec![100, 101, 102, 103, 104]);
    }
}
