pub mod capacity;
pub mod metrics;
pub mod movement;
pub mod routing;
pub mod rules;
pub mod runner;
pub mod spawning;

pub use capacity::CapacityState;
pub use metrics::MetricsCollector;
pub use movement::{SimulationState, TickObservables};
pub use routing::{Route, Router};
pub use runner::{run_simulation, Simulation};
pub use spawning::{Aircraft, FlightStatus, Spawner};
