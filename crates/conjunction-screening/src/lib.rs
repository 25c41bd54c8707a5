//! Conjunction Screening Library
//!
//! Close-approach detection between satellites of different operators, plus
//! the aggregate fleet risk score.
//!
//! The detector buckets every position into a 3D grid with cell size
//! `2 * threshold`, which guarantees that any pair closer than `threshold`
//! lies in the same or an adjacent cell. Expected near-linear in satellite
//! count for uniformly distributed fleets, degrading toward quadratic only
//! inside densely packed cells.
//!
//! The detector is stateless: identical position sets give identical output
//! at any call cadence. Callers decide how often to run it; the session
//! screens every tenth tick, about 500 ms of wall time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use orbital_kinematics::SatellitePosition;

pub mod risk;

pub use risk::{FleetComposition, RiskWeights};

#[derive(Error, Debug)]
pub enum ScreeningError {
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),
}

pub type Result<T> = std::result::Result<T, ScreeningError>;

/// Reference close-approach threshold in simulation units.
pub const DEFAULT_THRESHOLD: f64 = 0.15;

/// One reportable close approach between two satellites of different
/// constellations. Recomputed wholesale on every screening pass; never
/// merged or diffed against prior passes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollisionEvent {
    /// Lower satellite id of the unordered pair.
    pub sat1: u32,
    /// Higher satellite id of the unordered pair.
    pub sat2: u32,
    pub distance: f64,
    pub constellation1: String,
    pub constellation2: String,
}

/// Configured conjunction screen. Threshold validation happens here, at
/// configuration time, so the detection pass itself can never fail.
#[derive(Debug, Clone)]
pub struct ConjunctionScreen {
    threshold: f64,
    cell_size: f64,
}

impl ConjunctionScreen {
    pub fn new(threshold: f64) -> Result<Self> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ScreeningError::DegenerateGeometry(format!(
                "collision threshold must be > 0, got {threshold}"
            )));
        }
        Ok(Self {
            threshold,
            // Any pair within threshold shares a cell or touches a neighbor.
            cell_size: threshold * 2.0,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn cell_of(&self, pos: &SatellitePosition) -> (i64, i64, i64) {
        (
            (pos.x / self.cell_size).floor() as i64,
            (pos.y / self.cell_size).floor() as i64,
            (pos.z / self.cell_size).floor() as i64,
        )
    }

    /// Find all cross-constellation pairs closer than the threshold.
    ///
    /// Each unordered pair is reported exactly once (`sat1 < sat2`). Pairs
    /// within the same constellation are skipped: same-operator formation
    /// flying at small separation is intentional, not a risk event.
    pub fn detect(&self, positions: &[SatellitePosition]) -> Vec<CollisionEvent> {
        let mut grid: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
        for (idx, pos) in positions.iter().enumerate() {
            grid.entry(self.cell_of(pos)).or_default().push(idx);
        }

        let mut events = Vec::new();
        for (&(cx, cy, cz), cell) in &grid {
            // Candidates: this cell plus its 26 neighbors.
            let mut nearby = Vec::new();
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        if let Some(neighbors) = grid.get(&(cx + dx, cy + dy, cz + dz)) {
                            nearby.extend_from_slice(neighbors);
                        }
                    }
                }
            }

            for &i in cell {
                let a = &positions[i];
                for &j in &nearby {
                    let b = &positions[j];
                    // Ordered ids: no self pairs, no reversed duplicates, and
                    // a pair split across cells is only emitted from the cell
                    // owning its lower id.
                    if a.satellite_id >= b.satellite_id {
                        continue;
                    }
                    if a.constellation_id == b.constellation_id {
                        continue;
                    }

                    let distance = a.distance_to(b);
                    if distance < self.threshold {
                        events.push(CollisionEvent {
                            sat1: a.satellite_id,
                            sat2: b.satellite_id,
                            distance,
                            constellation1: a.constellation_id.clone(),
                            constellation2: b.constellation_id.clone(),
                        });
                    }
                }
            }
        }

        events
    }
}

impl Default for ConjunctionScreen {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            cell_size: DEFAULT_THRESHOLD * 2.0,
        }
    }
}

/// O(n^2) reference detector. Used by tests and the property harness to
/// validate the grid; not intended for production fleets.
pub fn detect_brute_force(positions: &[SatellitePosition], threshold: f64) -> Vec<CollisionEvent> {
    let mut events = Vec::new();
    for i in 0..positions.len() {
        for j in 0..positions.len() {
            let a = &positions[i];
            let b = &positions[j];
            if a.satellite_id >= b.satellite_id || a.constellation_id == b.constellation_id {
                continue;
            }
            let distance = a.distance_to(b);
            if distance < threshold {
                events.push(CollisionEvent {
                    sat1: a.satellite_id,
                    sat2: b.satellite_id,
                    distance,
                    constellation1: a.constellation_id.clone(),
                    constellation2: b.constellation_id.clone(),
                });
            }
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn pos(constellation: &str, id: u32, x: f64, y: f64, z: f64) -> SatellitePosition {
        SatellitePosition {
            constellation_id: constellation.to_string(),
            satellite_id: id,
            x,
            y,
            z,
        }
    }

    fn pair_set(events: &[CollisionEvent]) -> BTreeSet<(u32, u32)> {
        events.iter().map(|e| (e.sat1, e.sat2)).collect()
    }

    #[test]
    fn test_cross_constellation_pair_reported_once() {
        let screen = ConjunctionScreen::new(0.15).unwrap();
        let positions = vec![
            pos("alpha", 0, 1.0, 0.0, 0.0),
            pos("beta", 1, 1.05, 0.0, 0.0),
        ];
        let events = screen.detect(&positions);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sat1, 0);
        assert_eq!(events[0].sat2, 1);
        assert!((events[0].distance - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_same_constellation_pair_ignored() {
        let screen = ConjunctionScreen::new(0.15).unwrap();
        // Coincident formation-flyers of one operator: not a risk event.
        let positions = vec![
            pos("alpha", 0, 1.0, 0.0, 0.0),
            pos("alpha", 1, 1.0, 0.0, 0.0),
        ];
        assert!(screen.detect(&positions).is_empty());
    }

    #[test]
    fn test_pair_spanning_cell_boundary() {
        let screen = ConjunctionScreen::new(0.15).unwrap();
        // Cell size is 0.3; these straddle the boundary at x=0.3.
        let positions = vec![
            pos("alpha", 0, 0.29, 0.0, 0.0),
            pos("beta", 1, 0.31, 0.0, 0.0),
        ];
        assert_eq!(screen.detect(&positions).len(), 1);
    }

    #[test]
    fn test_distant_satellites_not_reported() {
        let screen = ConjunctionScreen::new(0.15).unwrap();
        let positions = vec![
            pos("alpha", 0, 0.0, 0.0, 0.0),
            pos("beta", 1, 1.0, 1.0, 1.0),
        ];
        assert!(screen.detect(&positions).is_empty());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        assert!(ConjunctionScreen::new(0.0).is_err());
        assert!(ConjunctionScreen::new(-0.1).is_err());
        assert!(ConjunctionScreen::new(f64::NAN).is_err());
    }

    #[test]
    fn test_grid_matches_brute_force_on_clustered_set() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(77);
        let positions: Vec<SatellitePosition> = (0..200)
            .map(|id| {
                let c = if id % 2 == 0 { "alpha" } else { "beta" };
                pos(
                    c,
                    id,
                    rng.gen::<f64>() * 2.0 - 1.0,
                    rng.gen::<f64>() * 2.0 - 1.0,
                    rng.gen::<f64>() * 2.0 - 1.0,
                )
            })
            .collect();

        let screen = ConjunctionScreen::new(0.15).unwrap();
        let grid = pair_set(&screen.detect(&positions));
        let reference = pair_set(&detect_brute_force(&positions, 0.15));
        assert_eq!(grid, reference);
        assert!(!reference.is_empty(), "test set should produce conjunctions");
    }

    proptest! {
        #[test]
        fn prop_grid_equals_brute_force(
            coords in proptest::collection::vec((-1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0), 0..120),
        ) {
            let positions: Vec<SatellitePosition> = coords
                .iter()
                .enumerate()
                .map(|(id, &(x, y, z))| {
                    let c = match id % 3 {
                        0 => "alpha",
                        1 => "beta",
                        _ => "gamma",
                    };
                    pos(c, id as u32, x, y, z)
                })
                .collect();

            let screen = ConjunctionScreen::new(0.15).unwrap();
            prop_assert_eq!(
                pair_set(&screen.detect(&positions)),
                pair_set(&detect_brute_force(&positions, 0.15))
            );
        }
    }
}
