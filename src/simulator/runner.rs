//! Simulation driver: owns the coupled state and advances it one fixed
//! time step at a time. Single-threaded and deterministic; the
//! run-scoped RNG is the sole entropy source.

use std::panic::{catch_unwind, AssertUnwindSafe};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::errors::SimError;
use crate::layout::Layout;
use crate::params::{Environment, SimulationParams};
use crate::simulator::capacity::CapacityState;
use crate::simulator::metrics::MetricsCollector;
use crate::simulator::movement::{self, SimulationState};
use crate::simulator::routing::Router;
use crate::simulator::rules;
use crate::simulator::spawning::Spawner;

/// A fully initialized simulation, ready to be stepped.
#[derive(Debug)]
pub struct Simulation {
    layout: Layout,
    params: SimulationParams,
    capacity: CapacityState,
    router: Router,
    spawner: Spawner,
    metrics: MetricsCollector,
    state: SimulationState,
    rng: StdRng,
}

impl Simulation {
    /// Validate the inputs and build every subsystem. Fails with a
    /// structured error before the loop ever starts.
    pub fn new(layout: Layout, params: SimulationParams) -> Result<Self, SimError> {
        let details = layout.validate();
        if !details.is_empty() {
            return Err(SimError::LayoutInvalid { details });
        }
        let details = params.validate();
        if !details.is_empty() {
            return Err(SimError::ParamInvalid { details });
        }

        let capacity = CapacityState::from_layout(&layout);
        let mut router = Router::new();
        router.precompute(&layout);
        let metrics = MetricsCollector::new(params.simulation.total_duration);
        let rng = StdRng::seed_from_u64(params.simulation.random_seed);

        Ok(Self {
            layout,
            params,
            capacity,
            router,
            spawner: Spawner::new(),
            metrics,
            state: SimulationState::new(),
            rng,
        })
    }

    /// One tick: environment → advance waiting → spawn → move → record.
    /// Observables are recorded against the time before the advance.
    pub fn tick(&mut self) {
        let current_time = self.state.time;
        let dt = self.params.simulation.time_step_size;

        let env = Environment::sample(&self.params, &mut self.rng);
        self.capacity
            .set_active_direction(rules::active_runway_direction(env.wind_direction));

        self.capacity.advance_waiting(dt);

        if let Some(ac) = self.spawner.spawn_departure(
            &self.layout,
            &self.params,
            &env,
            &mut self.capacity,
            &mut self.router,
            &mut self.rng,
            current_time,
            dt,
        ) {
            self.state.aircraft.push(ac);
        }
        if let Some(ac) = self.spawner.spawn_arrival(
            &self.layout,
            &self.params,
            &env,
            &mut self.capacity,
            &mut self.router,
            &mut self.rng,
            current_time,
            dt,
        ) {
            self.state.aircraft.push(ac);
        }

        let obs = movement::step(
            &mut self.state,
            &self.layout,
            &self.params,
            &env,
            &mut self.capacity,
            dt,
            &mut self.rng,
        );

        for id in &obs.newly_completed {
            if let Some(ac) = self.state.aircraft.iter().find(|a| &a.id == id) {
                self.metrics.record_flight(ac);
            }
        }
        self.metrics.record(current_time, &obs);
    }

    /// Run the full horizon and return the result document.
    pub fn run(&mut self) -> serde_json::Value {
        let dt = self.params.simulation.time_step_size;
        let steps = (self.params.simulation.total_duration / dt).floor() as u64;
        info!(
            "[RUNNER] Starting simulation: {} steps of {}s over {}s",
            steps, dt, self.params.simulation.total_duration
        );

        for _ in 0..steps {
            self.tick();
        }

        info!(
            "[RUNNER] Simulation finished: {} flights completed",
            self.metrics.completed_count()
        );
        self.metrics.results()
    }

    /// Apply a filtered mid-run parameter update. Intended for tick
    /// boundaries, between a record and the next spawn phase.
    pub fn apply_param_update(&mut self, updates: &serde_json::Value) {
        self.params.apply_midrun_update(updates);
    }

    pub fn capacity(&self) -> &CapacityState {
        &self.capacity
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn router(&self) -> &Router {
        &self.router
    }
}

/// Driver entry point: decode layout and parameters, run the
/// simulation, return the result document as JSON. All failures are
/// reported inside the returned JSON, never as a panic.
pub fn run_simulation(layout_json: &str, params_json: &str) -> String {
    let result = match run_inner(layout_json, params_json) {
        Ok(results) => results,
        Err(err) => err.to_result_json(),
    };
    serde_json::to_string_pretty(&result).unwrap_or_else(|_| "{}".to_string())
}

fn run_inner(layout_json: &str, params_json: &str) -> Result<serde_json::Value, SimError> {
    let layout = Layout::from_json(layout_json)?;
    let params = SimulationParams::from_json(params_json)?;
    let mut sim = Simulation::new(layout, params)?;

    catch_unwind(AssertUnwindSafe(|| sim.run())).map_err(panic_to_error)
}

/// Convert a caught panic payload into the Internal error kind; the
/// payload text becomes the result document's traceback.
fn panic_to_error(panic: Box<dyn std::any::Any + Send>) -> SimError {
    let msg = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic in simulation loop".to_string());
    SimError::Internal(msg)
}
