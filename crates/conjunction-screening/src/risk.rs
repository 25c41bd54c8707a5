//! Aggregate risk scoring.
//!
//! Reduces the latest screening pass plus fleet composition into a single
//! bounded score in [base, 1.0]. The weights are heuristic tuning values,
//! named and overridable rather than derived from physics.

use serde::{Deserialize, Serialize};

/// Tunable weights for the additive risk model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskWeights {
    /// Irreducible residual risk; no configuration reaches exactly 0.
    pub base: f64,
    /// Contribution per detected conjunction.
    pub per_collision: f64,
    /// Fleet-density weight, applied to `total / density_reference`.
    pub density: f64,
    /// Fleet size at which the density term contributes its full weight.
    pub density_reference: f64,
    /// Weight of the uncoordinated fraction of the fleet.
    pub uncoordinated: f64,
    /// Weight of the derelict fraction of the fleet.
    pub zombie: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            base: 0.02,
            per_collision: 0.05,
            density: 0.2,
            density_reference: 2000.0,
            uncoordinated: 0.3,
            zombie: 0.4,
        }
    }
}

/// Fleet composition inputs for one scoring pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FleetComposition {
    /// All satellites that produced positions this pass.
    pub total: usize,
    /// Live satellites belonging to visible uncoordinated constellations.
    pub uncoordinated: usize,
    /// Derelict satellites across every constellation.
    pub zombies: usize,
}

impl RiskWeights {
    /// Score one pass. Saturates at 1.0: the score is a decision signal,
    /// not a probability, and large fleets must not run away while each
    /// driver stays monotone. The `max(total, 1)` guards make an empty
    /// fleet degenerate to the base risk instead of dividing by zero.
    pub fn score(&self, collision_count: usize, fleet: FleetComposition) -> f64 {
        let denom = fleet.total.max(1) as f64;

        let collision_term = collision_count as f64 * self.per_collision;
        let density_term = (fleet.total as f64 / self.density_reference) * self.density;
        let uncoordinated_term = (fleet.uncoordinated as f64 / denom) * self.uncoordinated;
        let zombie_term = (fleet.zombies as f64 / denom) * self.zombie;

        (self.base + collision_term + density_term + uncoordinated_term + zombie_term).min(1.0)
    }
}
