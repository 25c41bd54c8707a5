//! Orbital Kinematics Library
//!
//! Parametric circular-orbit model for the swarm sandbox. Maps a satellite's
//! orbital parameters and an explicit simulation time to a Cartesian position.
//! This is a visualization-grade approximation, not a Keplerian propagator:
//! orbits are circles at a fixed inclination offset around a unit-scale Earth.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Earth radius in simulation units. All altitudes are measured from this.
pub const EARTH_RADIUS: f64 = 2.0;

/// Global motion scale. Shared by every satellite so the per-constellation
/// `speed` scalar uniformly scales perceived angular rate.
pub const MOTION_SCALE: f64 = 0.1;

/// Amplitude of the zombie tumble perturbation, radians.
pub const ZOMBIE_WOBBLE_AMPLITUDE: f64 = 0.1;

/// Frequency multiplier of the zombie tumble perturbation.
pub const ZOMBIE_WOBBLE_RATE: f64 = 2.0;

/// Per-satellite orbital parameters.
///
/// Immutable once generated, except during a coordination-mode transition
/// where `phi`, `radius_offset` and `speed_offset` are interpolated by the
/// transition controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitalParameters {
    /// Orbital phase angle at reference time, radians.
    pub theta: f64,
    /// Inclination/latitude offset, radians.
    pub phi: f64,
    /// Deviation from the constellation's nominal orbital radius.
    pub radius_offset: f64,
    /// Per-satellite angular-speed multiplier, dimensionless, > 0.
    pub speed_offset: f64,
    /// Derelict flag. Zombies tumble and never respond to coordination.
    pub is_zombie: bool,
    /// Owning constellation.
    pub constellation_id: String,
    /// Run-unique satellite id. Stable across transitions; drives both
    /// selection and collision-pair deduplication.
    pub satellite_id: u32,
}

/// Derived Cartesian position for one satellite. Recomputed every tick,
/// never stored as authoritative state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatellitePosition {
    pub constellation_id: String,
    pub satellite_id: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl SatellitePosition {
    pub fn coords(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn distance_to(&self, other: &SatellitePosition) -> f64 {
        (self.coords() - other.coords()).norm()
    }
}

/// Orbital phase angle of a satellite at time `t`.
///
/// Zombies receive a bounded oscillatory perturbation keyed off their stable
/// id, so the tumble is deterministic in `t` rather than re-randomized.
pub fn angle_at(params: &OrbitalParameters, speed: f64, t: f64) -> f64 {
    let wobble = if params.is_zombie {
        (t * ZOMBIE_WOBBLE_RATE + params.satellite_id as f64).sin() * ZOMBIE_WOBBLE_AMPLITUDE
    } else {
        0.0
    };
    params.theta + t * speed * params.speed_offset * MOTION_SCALE + wobble
}

/// Spherical-to-Cartesian mapping for a circular orbit of radius `r` at
/// phase `angle` and latitude offset `phi`.
pub fn cartesian(angle: f64, phi: f64, r: f64) -> Vector3<f64> {
    Vector3::new(
        r * angle.cos() * phi.cos(),
        r * phi.sin(),
        r * angle.sin() * phi.cos(),
    )
}

/// Position of a satellite at time `t`. Pure function of its arguments:
/// no hidden clocks, same inputs always give the same output.
pub fn position(params: &OrbitalParameters, altitude: f64, speed: f64, t: f64) -> SatellitePosition {
    let angle = angle_at(params, speed, t);
    let r = EARTH_RADIUS + altitude + params.radius_offset;
    let coords = cartesian(angle, params.phi, r);
    SatellitePosition {
        constellation_id: params.constellation_id.clone(),
        satellite_id: params.satellite_id,
        x: coords.x,
        y: coords.y,
        z: coords.z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_params() -> OrbitalParameters {
        OrbitalParameters {
            theta: 1.2,
            phi: 0.3,
            radius_offset: 0.05,
            speed_offset: 0.8,
            is_zombie: false,
            constellation_id: "alpha".to_string(),
            satellite_id: 7,
        }
    }

    #[test]
    fn test_position_is_deterministic() {
        let params = live_params();
        let a = position(&params, 1.5, 0.5, 42.0);
        let b = position(&params, 1.5, 0.5, 42.0);
        assert_eq!(a.coords(), b.coords());
    }

    #[test]
    fn test_cartesian_mapping() {
        let params = live_params();
        let t = 10.0;
        let pos = position(&params, 1.5, 0.5, t);

        let angle = params.theta + t * 0.5 * params.speed_offset * MOTION_SCALE;
        let r = EARTH_RADIUS + 1.5 + params.radius_offset;
        assert!((pos.x - r * angle.cos() * params.phi.cos()).abs() < 1e-12);
        assert!((pos.y - r * params.phi.sin()).abs() < 1e-12);
        assert!((pos.z - r * angle.sin() * params.phi.cos()).abs() < 1e-12);
    }

    #[test]
    fn test_radius_matches_altitude() {
        let params = live_params();
        let pos = position(&params, 1.5, 0.5, 0.0);
        let r = EARTH_RADIUS + 1.5 + params.radius_offset;
        assert!((pos.coords().norm() - r).abs() < 1e-12);
    }

    #[test]
    fn test_zombie_wobble_is_bounded_and_deterministic() {
        let mut params = live_params();
        params.is_zombie = true;

        let base = OrbitalParameters {
            is_zombie: false,
            ..params.clone()
        };

        for step in 0..100 {
            let t = step as f64 * 0.37;
            let wobbled = angle_at(&params, 0.5, t);
            let clean = angle_at(&base, 0.5, t);
            assert!((wobbled - clean).abs() <= ZOMBIE_WOBBLE_AMPLITUDE + 1e-12);
            // Same inputs, same tumble.
            assert_eq!(wobbled, angle_at(&params, 0.5, t));
        }
    }
}
