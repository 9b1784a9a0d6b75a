//! Simulation data types.

use serde::{Deserialize, Serialize};

/// Disease state of an agent.
///
/// The five SEIRD compartments. `Recovered` and `Deceased` are terminal:
/// once entered, an agent never changes state again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiseaseState {
    Susceptible,
    Exposed,
    Infected,
    Recovered,
    Deceased,
}

/// Agent of the simulation.
///
/// Each agent has a fixed home on the grid, a position and velocity updated
/// by the mobility model, a disease state with its duration bookkeeping, and
/// per-agent trait multipliers drawn once at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Stable identifier, assigned at creation.
    pub id: usize,

    /// Position on the grid.
    pub pos: [f64; 2],

    /// Velocity.
    pub vel: [f64; 2],

    /// Home location, immutable after creation.
    pub home: [f64; 2],

    /// Current disease state.
    pub state: DiseaseState,

    /// Step at which the current state was entered.
    pub state_entered_step: usize,

    /// Days to spend in the current state (drawn on entering `Exposed` or
    /// `Infected`).
    pub planned_duration: f64,

    /// Transmission strength multiplier.
    pub infectiousness: f64,

    /// Infection risk multiplier.
    pub susceptibility: f64,

    /// Exposures attributed to this agent while infectious.
    pub exposures_caused: u32,

    /// Agent has been detected as an infectious case.
    pub detected: bool,

    /// Agent complies with isolation and no longer transmits.
    pub isolated: bool,

    /// Agent was vaccinated (its state already reflects the transition).
    pub vaccinated: bool,
}

/// State of the simulation at a given step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Population {
    /// Current simulation step.
    pub step: usize,

    /// Vector of agents in the simulation. The order is stable and used only
    /// for deterministic iteration.
    pub agents: Vec<Agent>,
}

/// Number of agents in each disease state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub susceptible: usize,
    pub exposed: usize,
    pub infected: usize,
    pub recovered: usize,
    pub deceased: usize,
}

impl StateCounts {
    /// Count the agents in each disease state.
    pub fn of(agents: &[Agent]) -> Self {
        let mut counts = Self {
            susceptible: 0,
            exposed: 0,
            infected: 0,
            recovered: 0,
            deceased: 0,
        };
        for agt in agents {
            match agt.state {
                DiseaseState::Susceptible => counts.susceptible += 1,
                DiseaseState::Exposed => counts.exposed += 1,
                DiseaseState::Infected => counts.infected += 1,
                DiseaseState::Recovered => counts.recovered += 1,
                DiseaseState::Deceased => counts.deceased += 1,
            }
        }
        counts
    }

    /// Get the total number of agents.
    pub fn total(&self) -> usize {
        self.susceptible + self.exposed + self.infected + self.recovered + self.deceased
    }
}

/// Record of the simulation at a single step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Current simulation step.
    pub step: usize,

    /// Per-state population counts at the end of the step.
    pub counts: StateCounts,

    /// Effective reproduction number estimate: the mean number of exposures
    /// caused by the agents that completed their infectious period this step.
    /// `None` when no agent completed it.
    pub rt: Option<f64>,

    /// Number of agents newly exposed this step.
    pub new_exposures: usize,
}
