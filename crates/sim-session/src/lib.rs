//! Simulation Session
//!
//! The single owner of all derived simulation state: per-constellation
//! orbital parameters, transition controllers and the latest computed
//! positions. The caller owns the configurations and the clock; both
//! simulation time and wall time arrive as explicit arguments, never read
//! from ambient state, so runs are deterministic and replayable.
//!
//! Single-writer: `tick` advances every constellation once per call, in
//! insertion order then satellite-index order. Screening and risk scoring
//! run on an explicit tick cadence over a frozen snapshot of positions and
//! never mutate session state.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use constellation_gen::metadata::{generate_metadata, SatelliteMetadata};
use constellation_gen::{generate, ConfigError, ConstellationConfig};
use conjunction_screening::{
    CollisionEvent, ConjunctionScreen, FleetComposition, RiskWeights, ScreeningError,
    DEFAULT_THRESHOLD,
};
use orbital_kinematics::{
    angle_at, cartesian, position, OrbitalParameters, SatellitePosition, EARTH_RADIUS,
};
use transition_control::{CapturedState, TransitionController};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Screening(#[from] ScreeningError),
    #[error("Unknown constellation: {0}")]
    UnknownConstellation(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Session tuning knobs. Screening cadence is an explicit tick interval
/// decided here by the driving loop, not wall-clock state hidden inside the
/// detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    pub collision_threshold: f64,
    pub detection_interval_ticks: u64,
    pub weights: RiskWeights,
    /// Fixed seed for reproducible generation; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            collision_threshold: DEFAULT_THRESHOLD,
            detection_interval_ticks: 10,
            weights: RiskWeights::default(),
            seed: None,
        }
    }
}

/// Consumer callbacks, invoked from inside `tick`. All methods default to
/// no-ops so observers implement only what they consume.
pub trait SessionObserver {
    fn on_positions_update(&mut self, _constellation_id: &str, _positions: &[SatellitePosition]) {}
    fn on_collisions_update(&mut self, _events: &[CollisionEvent]) {}
    fn on_risk_update(&mut self, _score: f64) {}
}

/// Observer that discards everything.
pub struct NullObserver;

impl SessionObserver for NullObserver {}

/// Satellite record returned for a selection forwarded by the rendering
/// layer's hit-test. The core itself performs no picking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedSatellite {
    pub constellation_id: String,
    pub constellation_name: String,
    pub satellite_id: u32,
    pub is_zombie: bool,
    pub metadata: SatelliteMetadata,
    pub position: Option<SatellitePosition>,
}

/// Read-only session snapshot for API consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub sim_time: f64,
    pub tick_count: u64,
    pub risk: f64,
    pub collisions: Vec<CollisionEvent>,
    pub constellations: Vec<ConstellationSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstellationSummary {
    pub id: String,
    pub name: String,
    pub color: String,
    pub satellite_count: i32,
    pub zombie_count: i32,
    pub coordinated: bool,
    pub visible: bool,
    pub transitioning: bool,
}

struct Swarm {
    config: ConstellationConfig,
    params: Vec<OrbitalParameters>,
    metadata: Vec<SatelliteMetadata>,
    controller: TransitionController,
    /// A transition may only begin once the constellation has at least one
    /// previously computed position.
    has_ticked: bool,
    positions: Vec<SatellitePosition>,
}

/// Owns every constellation's derived state for one simulation run.
pub struct SimulationSession {
    settings: SessionSettings,
    screen: ConjunctionScreen,
    /// Constellation insertion order; tick order determinism depends on it.
    order: Vec<String>,
    swarms: HashMap<String, Swarm>,
    next_satellite_id: u32,
    tick_count: u64,
    sim_time: f64,
    rng: StdRng,
    last_collisions: Vec<CollisionEvent>,
    last_risk: f64,
}

impl SimulationSession {
    pub fn new(settings: SessionSettings) -> Result<Self> {
        let screen = ConjunctionScreen::new(settings.collision_threshold)?;
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let last_risk = settings.weights.base;
        Ok(Self {
            settings,
            screen,
            order: Vec::new(),
            swarms: HashMap::new(),
            next_satellite_id: 0,
            tick_count: 0,
            sim_time: 0.0,
            rng,
            last_collisions: Vec::new(),
            last_risk,
        })
    }

    /// Apply a constellation configuration at simulation time `now`.
    ///
    /// Validation failures leave the previously committed configuration
    /// active. Count changes regenerate the parameter set wholesale; a bare
    /// `coordinated` flip starts a transition instead, provided the
    /// constellation has produced positions before.
    pub fn apply_config(&mut self, config: ConstellationConfig, now: f64) -> Result<()> {
        config.validate()?;

        if !self.swarms.contains_key(&config.id) {
            return self.insert_constellation(config);
        }

        let (count_changed, coordinated_changed, base_id, has_ticked) = {
            let swarm = &self.swarms[&config.id];
            (
                swarm.config.satellite_count != config.satellite_count
                    || swarm.config.zombie_count != config.zombie_count,
                swarm.config.coordinated != config.coordinated,
                swarm.params.first().map(|p| p.satellite_id),
                swarm.has_ticked,
            )
        };

        if count_changed {
            // The generation shape changed: discard and regenerate. The new
            // satellite set has no previously computed positions, so it
            // starts Steady like a brand-new constellation.
            let base_id = self.allocate_ids(config.total_satellites());
            let params = generate(&config, base_id, &mut self.rng)?;
            let metadata = self.metadata_for(&config);
            let swarm = self.swarms.get_mut(&config.id).expect("checked above");
            info!(
                constellation = %config.id,
                satellites = config.satellite_count,
                zombies = config.zombie_count,
                "regenerating constellation"
            );
            swarm.params = params;
            swarm.metadata = metadata;
            swarm.controller = TransitionController::new();
            swarm.has_ticked = false;
            swarm.positions.clear();
            swarm.config = config;
            return Ok(());
        }

        if coordinated_changed {
            let base_id = base_id.unwrap_or_else(|| self.allocate_ids(0));
            let mut target = generate(&config, base_id, &mut self.rng)?;

            let swarm = self.swarms.get_mut(&config.id).expect("checked above");
            if !has_ticked || target.is_empty() {
                // Never rendered: adopt the new policy outright, no motion
                // to preserve.
                swarm.params = target;
                swarm.config = config;
                return Ok(());
            }

            // Zombies never respond to coordination commands: carry their
            // existing parameters into the target unchanged.
            let live = config.satellite_count.max(0) as usize;
            for (i, slot) in target.iter_mut().enumerate().skip(live) {
                *slot = swarm.params[i].clone();
            }

            let speed = swarm.config.speed;
            let captured: Vec<CapturedState> = swarm
                .params
                .iter()
                .enumerate()
                .map(|(i, p)| effective_state(swarm, i, p, speed, now))
                .collect();

            info!(
                constellation = %config.id,
                coordinated = config.coordinated,
                start_time = now,
                "beginning coordination transition"
            );
            swarm.controller.begin(now, captured, target);
            swarm.config = config;
            return Ok(());
        }

        // Altitude, speed, inclination, cosmetic or visibility change:
        // take effect in place without touching generated parameters.
        let swarm = self.swarms.get_mut(&config.id).expect("checked above");
        swarm.config = config;
        Ok(())
    }

    fn insert_constellation(&mut self, config: ConstellationConfig) -> Result<()> {
        let base_id = self.allocate_ids(config.total_satellites());
        let params = generate(&config, base_id, &mut self.rng)?;
        let metadata = self.metadata_for(&config);

        info!(
            constellation = %config.id,
            satellites = config.satellite_count,
            zombies = config.zombie_count,
            coordinated = config.coordinated,
            "constellation created"
        );

        self.order.push(config.id.clone());
        self.swarms.insert(
            config.id.clone(),
            Swarm {
                config,
                params,
                metadata,
                controller: TransitionController::new(),
                has_ticked: false,
                positions: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn remove_constellation(&mut self, id: &str) -> Result<()> {
        if self.swarms.remove(id).is_none() {
            return Err(SessionError::UnknownConstellation(id.to_string()));
        }
        self.order.retain(|c| c != id);
        info!(constellation = %id, "constellation removed");
        Ok(())
    }

    /// Advance the whole simulation to time `now`.
    ///
    /// Every visible constellation's positions are recomputed and handed to
    /// the observer. Screening plus risk scoring run every
    /// `detection_interval_ticks` ticks over the union snapshot.
    pub fn tick(&mut self, now: f64, observer: &mut dyn SessionObserver) {
        self.sim_time = now;

        for id in self.order.clone() {
            let swarm = self.swarms.get_mut(&id).expect("order tracks swarms");
            if !swarm.config.visible {
                swarm.positions.clear();
                continue;
            }

            if let Some(committed) = swarm.controller.try_complete(swarm.config.speed, now) {
                debug!(constellation = %id, "transition complete");
                swarm.params = committed;
            }

            let cfg = &swarm.config;
            let mut positions = Vec::with_capacity(swarm.params.len());
            for (i, p) in swarm.params.iter().enumerate() {
                let pos = if swarm.controller.is_active() && !p.is_zombie {
                    let eff = swarm.controller.sample(i, cfg.speed, now);
                    let coords = cartesian(
                        eff.angle,
                        eff.phi,
                        EARTH_RADIUS + cfg.altitude + eff.radius_offset,
                    );
                    SatellitePosition {
                        constellation_id: p.constellation_id.clone(),
                        satellite_id: p.satellite_id,
                        x: coords.x,
                        y: coords.y,
                        z: coords.z,
                    }
                } else {
                    position(p, cfg.altitude, cfg.speed, now)
                };
                positions.push(pos);
            }

            swarm.positions = positions;
            swarm.has_ticked = true;
            observer.on_positions_update(&id, &swarm.positions);
        }

        self.tick_count += 1;
        if self.tick_count % self.settings.detection_interval_ticks.max(1) == 0 {
            self.run_screening(observer);
        }
    }

    fn run_screening(&mut self, observer: &mut dyn SessionObserver) {
        let union: Vec<SatellitePosition> = self
            .order
            .iter()
            .filter_map(|id| self.swarms.get(id))
            .filter(|s| s.config.visible)
            .flat_map(|s| s.positions.iter().cloned())
            .collect();

        let events = self.screen.detect(&union);
        let fleet = self.fleet_composition(union.len());
        let risk = self.settings.weights.score(events.len(), fleet);

        debug!(
            satellites = fleet.total,
            conjunctions = events.len(),
            risk,
            "screening pass"
        );

        observer.on_collisions_update(&events);
        observer.on_risk_update(risk);
        self.last_collisions = events;
        self.last_risk = risk;
    }

    fn fleet_composition(&self, total: usize) -> FleetComposition {
        let uncoordinated = self
            .swarms
            .values()
            .filter(|s| s.config.visible && !s.config.coordinated)
            .map(|s| s.config.satellite_count.max(0) as usize)
            .sum();
        let zombies = self
            .swarms
            .values()
            .map(|s| s.config.zombie_count.max(0) as usize)
            .sum();
        FleetComposition {
            total,
            uncoordinated,
            zombies,
        }
    }

    fn metadata_for(&mut self, config: &ConstellationConfig) -> Vec<SatelliteMetadata> {
        let live = config.satellite_count.max(0) as usize;
        (0..config.total_satellites())
            .map(|i| generate_metadata(i, i >= live, &mut self.rng))
            .collect()
    }

    fn allocate_ids(&mut self, count: usize) -> u32 {
        let base = self.next_satellite_id;
        self.next_satellite_id += count as u32;
        base
    }

    /// Look up a satellite by its run-unique id.
    pub fn select_satellite(&self, satellite_id: u32) -> Option<SelectedSatellite> {
        for swarm in self.swarms.values() {
            if let Some(i) = swarm
                .params
                .iter()
                .position(|p| p.satellite_id == satellite_id)
            {
                return Some(SelectedSatellite {
                    constellation_id: swarm.config.id.clone(),
                    constellation_name: swarm.config.name.clone(),
                    satellite_id,
                    is_zombie: swarm.params[i].is_zombie,
                    metadata: swarm.metadata[i].clone(),
                    position: swarm.positions.get(i).cloned(),
                });
            }
        }
        None
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            sim_time: self.sim_time,
            tick_count: self.tick_count,
            risk: self.last_risk,
            collisions: self.last_collisions.clone(),
            constellations: self
                .order
                .iter()
                .filter_map(|id| self.swarms.get(id))
                .map(|s| ConstellationSummary {
                    id: s.config.id.clone(),
                    name: s.config.name.clone(),
                    color: s.config.color.clone(),
                    satellite_count: s.config.satellite_count,
                    zombie_count: s.config.zombie_count,
                    coordinated: s.config.coordinated,
                    visible: s.config.visible,
                    transitioning: s.controller.is_active(),
                })
                .collect(),
        }
    }

    pub fn risk(&self) -> f64 {
        self.last_risk
    }

    pub fn collisions(&self) -> &[CollisionEvent] {
        &self.last_collisions
    }

    pub fn positions_of(&self, id: &str) -> Option<&[SatellitePosition]> {
        self.swarms.get(id).map(|s| s.positions.as_slice())
    }

    pub fn params_of(&self, id: &str) -> Option<&[OrbitalParameters]> {
        self.swarms.get(id).map(|s| s.params.as_slice())
    }

    pub fn is_transitioning(&self, id: &str) -> bool {
        self.swarms
            .get(id)
            .map(|s| s.controller.is_active())
            .unwrap_or(false)
    }

    pub fn constellation_ids(&self) -> &[String] {
        &self.order
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }
}

/// A satellite's current kinematic state, sampled from the running
/// transition when one is active, otherwise reconstructed from steady-state
/// motion. This is what a new transition captures as its "before".
fn effective_state(
    swarm: &Swarm,
    index: usize,
    params: &OrbitalParameters,
    speed: f64,
    now: f64,
) -> CapturedState {
    if swarm.controller.is_active() && !params.is_zombie {
        swarm.controller.sample(index, speed, now)
    } else {
        CapturedState {
            angle: angle_at(params, speed, now),
            phi: params.phi,
            radius_offset: params.radius_offset,
            speed_offset: params.speed_offset,
        }
    }
}
