//! Transition Control Library
//!
//! State machine that smooths a constellation's switch between coordinated
//! and uncoordinated operation. Two states per constellation:
//!
//! - **Steady**: kinematics use the satellite's authoritative parameters.
//! - **Transitioning**: `phi`, `radius_offset` and `speed_offset` are eased
//!   from the captured "before" values toward freshly generated "after"
//!   values, staggered across the fleet so satellites peel off in a wave.
//!
//! The orbital angle is never interpolated toward a target phase - that
//! risks apparent backward motion when the phases happen to be unfavorably
//! related. Instead each satellite keeps advancing forward from its captured
//! angle at the progressively blended rate.
//!
//! Zombies never participate: a derelict cannot respond to coordination
//! commands, so the controller leaves them on steady kinematics throughout.

use serde::{Deserialize, Serialize};

use orbital_kinematics::{OrbitalParameters, MOTION_SCALE};

/// Transition duration in simulation time units.
pub const TRANSITION_DURATION: f64 = 60.0;

/// Fraction of the transition window used to stagger satellite start times.
pub const STAGGER_SPAN: f64 = 0.15;

/// Canonical quadratic ease-in-out.
pub fn ease_in_out_quad(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        let u = -2.0 * t + 2.0;
        1.0 - u * u / 2.0
    }
}

/// A satellite's kinematic state captured at the moment a transition begins,
/// or sampled mid-transition. `angle` is the current orbital phase, so the
/// interpolation starts from where the satellite visually is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapturedState {
    pub angle: f64,
    pub phi: f64,
    pub radius_offset: f64,
    pub speed_offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionPhase {
    Steady,
    Transitioning,
}

/// Per-constellation transition state machine. Single writer: the session
/// advances it exactly once per tick. Constellations transition
/// independently; controllers never interact.
#[derive(Debug)]
pub struct TransitionController {
    phase: TransitionPhase,
    start_time: f64,
    captured: Vec<CapturedState>,
    target: Vec<OrbitalParameters>,
}

impl TransitionController {
    pub fn new() -> Self {
        Self {
            phase: TransitionPhase::Steady,
            start_time: 0.0,
            captured: Vec::new(),
            target: Vec::new(),
        }
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == TransitionPhase::Transitioning
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// The pending "after" parameters, empty when steady.
    pub fn target(&self) -> &[OrbitalParameters] {
        &self.target
    }

    /// Enter (or re-enter) the Transitioning state.
    ///
    /// `captured` must hold one entry per satellite, index-aligned with
    /// `target`. Calling this mid-transition pre-empts the running one: the
    /// caller re-captures from the current blended values, so rapid toggling
    /// restarts cleanly instead of being rejected.
    pub fn begin(&mut self, now: f64, captured: Vec<CapturedState>, target: Vec<OrbitalParameters>) {
        debug_assert_eq!(captured.len(), target.len());
        self.phase = TransitionPhase::Transitioning;
        self.start_time = now;
        self.captured = captured;
        self.target = target;
    }

    /// Overall progress in [0, +inf); completion is `>= 1.0`.
    pub fn global_progress(&self, now: f64) -> f64 {
        (now - self.start_time) / TRANSITION_DURATION
    }

    fn local_progress(&self, index: usize, global: f64) -> f64 {
        let total = self.target.len().max(1);
        let stagger = (index as f64 / total as f64) * STAGGER_SPAN;
        ((global - stagger) / (1.0 - stagger)).clamp(0.0, 1.0)
    }

    /// Blended kinematic state for satellite `index` at time `now`.
    ///
    /// Only meaningful for live satellites while a transition is active;
    /// zombies bypass the controller entirely.
    pub fn sample(&self, index: usize, global_speed: f64, now: f64) -> CapturedState {
        let before = &self.captured[index];
        let after = &self.target[index];

        let eased = ease_in_out_quad(self.local_progress(index, self.global_progress(now)));
        let speed_offset = lerp(before.speed_offset, after.speed_offset, eased);

        // Forward-only: advance from the captured angle at the blended rate.
        let angle =
            before.angle + (now - self.start_time) * global_speed * speed_offset * MOTION_SCALE;

        CapturedState {
            angle,
            phi: lerp(before.phi, after.phi, eased),
            radius_offset: lerp(before.radius_offset, after.radius_offset, eased),
            speed_offset,
        }
    }

    /// Finish the transition once global progress reaches 1.0.
    ///
    /// Returns the new authoritative parameters with each live satellite's
    /// `theta` rebased so that steady-state motion picks up exactly where
    /// the transition left it, rather than snapping back to the generated
    /// phase. Returns `None` while the transition is still running.
    pub fn try_complete(&mut self, global_speed: f64, now: f64) -> Option<Vec<OrbitalParameters>> {
        if !self.is_active() || self.global_progress(now) < 1.0 {
            return None;
        }

        let committed = self
            .target
            .iter()
            .zip(&self.captured)
            .map(|(after, before)| {
                if after.is_zombie {
                    return after.clone();
                }
                // At completion the blended rate equals the target rate, so the
                // final angle is the captured angle advanced for the full
                // elapsed span. Rebasing theta keeps angle_at() continuous.
                let final_angle = before.angle
                    + (now - self.start_time) * global_speed * after.speed_offset * MOTION_SCALE;
                let theta = final_angle - now * global_speed * after.speed_offset * MOTION_SCALE;
                OrbitalParameters {
                    theta,
                    ..after.clone()
                }
            })
            .collect();

        self.phase = TransitionPhase::Steady;
        self.captured.clear();
        self.target.clear();

        Some(committed)
    }
}

impl Default for TransitionController {
    fn default() -> Self {
        Self::new()
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbital_kinematics::angle_at;

    fn target_params(speed_offset: f64) -> OrbitalParameters {
        OrbitalParameters {
            theta: 2.4,
            phi: 0.1,
            radius_offset: -0.05,
            speed_offset,
            is_zombie: false,
            constellation_id: "alpha".to_string(),
            satellite_id: 0,
        }
    }

    fn captured(angle: f64, speed_offset: f64) -> CapturedState {
        CapturedState {
            angle,
            phi: 0.0,
            radius_offset: 0.15,
            speed_offset,
        }
    }

    #[test]
    fn test_ease_endpoints() {
        assert_eq!(ease_in_out_quad(0.0), 0.0);
        assert_eq!(ease_in_out_quad(1.0), 1.0);
        assert!((ease_in_out_quad(0.5) - 0.5).abs() < 1e-12);
        assert!(ease_in_out_quad(0.25) < 0.25);
        assert!(ease_in_out_quad(0.75) > 0.75);
    }

    #[test]
    fn test_sample_starts_at_captured_state() {
        let mut ctl = TransitionController::new();
        ctl.begin(100.0, vec![captured(1.0, 1.0)], vec![target_params(0.5)]);

        let eps = 1e-6;
        let s = ctl.sample(0, 0.5, 100.0 + eps);
        assert!((s.angle - 1.0).abs() < 1e-4);
        assert!((s.phi - 0.0).abs() < 1e-6);
        assert!((s.radius_offset - 0.15).abs() < 1e-6);
        assert!((s.speed_offset - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_angle_is_forward_only() {
        // Coordinated -> uncoordinated slows the satellite down; the angle
        // must still never move backward.
        let mut ctl = TransitionController::new();
        ctl.begin(0.0, vec![captured(0.0, 1.0)], vec![target_params(0.5)]);

        let mut last = f64::MIN;
        for step in 0..=6000 {
            let t = step as f64 * 0.01;
            let s = ctl.sample(0, 0.5, t);
            assert!(s.angle >= last - 1e-12, "angle regressed at t={t}");
            last = s.angle;
        }
    }

    #[test]
    fn test_stagger_delays_later_indices() {
        let mut ctl = TransitionController::new();
        let caps: Vec<CapturedState> = (0..10).map(|_| captured(0.0, 1.0)).collect();
        let targets: Vec<OrbitalParameters> = (0..10)
            .map(|i| {
                let mut p = target_params(0.5);
                p.satellite_id = i;
                p
            })
            .collect();
        ctl.begin(0.0, caps, targets);

        // Early in the window, index 0 has begun blending; index 9 has not.
        let t = 0.05 * TRANSITION_DURATION;
        let first = ctl.sample(0, 0.5, t);
        let last = ctl.sample(9, 0.5, t);
        assert!(first.speed_offset < 1.0);
        assert_eq!(last.speed_offset, 1.0);
    }

    #[test]
    fn test_completes_at_duration_and_rebases_theta() {
        let mut ctl = TransitionController::new();
        ctl.begin(10.0, vec![captured(1.0, 1.0)], vec![target_params(0.5)]);

        assert!(ctl.try_complete(0.5, 10.0 + TRANSITION_DURATION - 1.0).is_none());
        assert!(ctl.is_active());

        let t_end = 10.0 + TRANSITION_DURATION;
        let sampled_end = ctl.sample(0, 0.5, t_end);
        let committed = ctl.try_complete(0.5, t_end).expect("transition should finish");
        assert!(!ctl.is_active());

        // Steady-state motion picks up exactly where the transition ended.
        let steady = angle_at(&committed[0], 0.5, t_end);
        assert!((steady - sampled_end.angle).abs() < 1e-9);
        assert_eq!(committed[0].speed_offset, 0.5);
    }

    #[test]
    fn test_preemption_recaptures() {
        let mut ctl = TransitionController::new();
        ctl.begin(0.0, vec![captured(0.0, 1.0)], vec![target_params(0.5)]);

        // Flip back mid-flight: caller captures the blended state and
        // restarts toward a new target.
        let mid = ctl.sample(0, 0.5, 30.0);
        ctl.begin(30.0, vec![mid], vec![target_params(1.0)]);

        assert!(ctl.is_active());
        assert_eq!(ctl.start_time(), 30.0);
        let s = ctl.sample(0, 0.5, 30.0);
        assert!((s.angle - mid.angle).abs() < 1e-12);
        assert!(ctl.try_complete(0.5, 30.0 + TRANSITION_DURATION).is_some());
    }

    #[test]
    fn test_zombie_target_passes_through_unchanged() {
        let mut zombie = target_params(0.2);
        zombie.is_zombie = true;
        let mut ctl = TransitionController::new();
        ctl.begin(0.0, vec![captured(0.0, 0.2)], vec![zombie.clone()]);

        let committed = ctl.try_complete(0.5, TRANSITION_DURATION).unwrap();
        assert_eq!(committed[0].theta, zombie.theta);
        assert!(committed[0].is_zombie);
    }
}
