use crate::config::Config;
use crate::model::{Agent, DiseaseState, Population, StateCounts, StepRecord};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Bernoulli, Gamma, Normal, Uniform};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Shape and scale of the gamma distribution the per-agent infectiousness
/// multipliers are drawn from.
const INFECTIOUSNESS_SHAPE: f64 = 2.0;
const INFECTIOUSNESS_SCALE: f64 = 0.5;

/// Simulation engine.
///
/// Holds the configuration, current population, random number generator and
/// per-step history, and provides methods to initialize, advance, save and
/// load simulations.
///
/// A step runs the mobility, transmission, progression and intervention
/// phases in that fixed order, then appends one [`StepRecord`] to the
/// history. All randomness is drawn from the single seeded stream, so two
/// engines with equal configurations produce identical trajectories.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    state: Population,
    rng: ChaCha12Rng,
    history: Vec<StepRecord>,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and a fresh
    /// population.
    ///
    /// All agents start susceptible except the first
    /// `n_seed_infected`, which start infected with a drawn infectious
    /// period. A baseline record (step 0) is appended to the history.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(cfg: Config) -> Result<Self> {
        cfg.validate().context("failed to validate config")?;

        let mut rng = ChaCha12Rng::seed_from_u64(cfg.run.seed);
        let agents = populate(&cfg, &mut rng).context("failed to populate grid")?;

        let state = Population { step: 0, agents };
        let history = vec![StepRecord {
            step: 0,
            counts: StateCounts::of(&state.agents),
            rt: None,
            new_exposures: 0,
        }];

        Ok(Self {
            cfg,
            state,
            rng,
            history,
        })
    }

    /// Reinitialize with a new configuration, or the held one if `None`.
    ///
    /// Recreates all agents, clears the history and reseeds the random
    /// stream from the configured seed.
    pub fn reset(&mut self, cfg: Option<Config>) -> Result<()> {
        let cfg = cfg.unwrap_or_else(|| self.cfg.clone());
        *self = Self::new(cfg).context("failed to reinitialize engine")?;
        Ok(())
    }

    /// Advance the simulation by one step and return the appended record.
    pub fn step(&mut self) -> Result<StepRecord> {
        self.state.step += 1;

        self.move_agents().context("failed to move agents")?;

        let new_exposures = self
            .spread_infection()
            .context("failed to spread infection")?;

        let rt = self
            .progress_disease()
            .context("failed to progress disease states")?;

        self.apply_interventions()
            .context("failed to apply interventions")?;

        let record = StepRecord {
            step: self.state.step,
            counts: StateCounts::of(&self.state.agents),
            rt,
            new_exposures,
        };
        self.history.push(record);

        Ok(record)
    }

    /// Get the configuration.
    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    /// Get the current step index.
    pub fn current_step(&self) -> usize {
        self.state.step
    }

    /// Read-only view of all agents, for rendering.
    pub fn agents(&self) -> &[Agent] {
        &self.state.agents
    }

    /// Current per-state population counts.
    pub fn counts(&self) -> StateCounts {
        StateCounts::of(&self.state.agents)
    }

    /// Full recorded history since the last reset, one record per step plus
    /// the baseline record at step 0.
    pub fn history(&self) -> &[StepRecord] {
        &self.history
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }

    /// Update the position and velocity of every living agent.
    ///
    /// Each axis gets an acceleration made of the pull towards home and a
    /// Gaussian random kick; the velocity is damped and the position clamped
    /// to the grid, zeroing the velocity component on a clamped axis.
    fn move_agents(&mut self) -> Result<()> {
        let mob = &self.cfg.mobility;
        let dt = self.cfg.run.dt;
        let grid_size = self.cfg.population.grid_size;

        let noise_dist = Normal::new(0.0, mob.random_force)?;

        for agt in &mut self.state.agents {
            if agt.state == DiseaseState::Deceased {
                continue;
            }
            for axis in 0..2 {
                let accel = mob.home_attraction * (agt.home[axis] - agt.pos[axis])
                    + noise_dist.sample(&mut self.rng);
                agt.vel[axis] = (agt.vel[axis] + accel * dt) * (1.0 - mob.damping);
                agt.pos[axis] += agt.vel[axis] * dt;

                if agt.pos[axis] < 0.0 {
                    agt.pos[axis] = 0.0;
                    agt.vel[axis] = 0.0;
                } else if agt.pos[axis] > grid_size {
                    agt.pos[axis] = grid_size;
                    agt.vel[axis] = 0.0;
                }
            }
        }

        Ok(())
    }

    /// Expose susceptible agents near infectious ones.
    ///
    /// Infectious, non-isolated agents are indexed in a uniform bucket grid
    /// with cell edge `max(interaction_radius, 1)`, so only the 3x3 cell
    /// neighborhood of each susceptible agent is scanned. With an
    /// interaction radius comparable to the grid size this degenerates to
    /// the quadratic all-pairs scan.
    ///
    /// Each pair within the interaction radius is an independent Bernoulli
    /// trial with probability `1 - exp(-beta * inf * sus * dt)`; the first
    /// success exposes the agent and is attributed to the infector.
    fn spread_infection(&mut self) -> Result<usize> {
        let dis = &self.cfg.disease;
        let dt = self.cfg.run.dt;
        let step = self.state.step;
        let radius_2 = dis.interaction_radius.powi(2);
        let cell_size = dis.interaction_radius.max(1.0);

        let incubation_dist = Normal::new(dis.incubation_mean, dis.incubation_std)?;

        let bucket = |pos: [f64; 2]| {
            (
                (pos[0] / cell_size).floor() as i64,
                (pos[1] / cell_size).floor() as i64,
            )
        };

        let mut sources: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (i_agt, agt) in self.state.agents.iter().enumerate() {
            if agt.state == DiseaseState::Infected && !agt.isolated {
                sources.entry(bucket(agt.pos)).or_default().push(i_agt);
            }
        }

        let mut new_exposures = 0;
        for i_agt in 0..self.state.agents.len() {
            if self.state.agents[i_agt].state != DiseaseState::Susceptible {
                continue;
            }

            let pos = self.state.agents[i_agt].pos;
            let susceptibility = self.state.agents[i_agt].susceptibility;
            let (c_x, c_y) = bucket(pos);

            let mut infector = None;
            'cells: for d_x in -1..=1 {
                for d_y in -1..=1 {
                    let Some(cell) = sources.get(&(c_x + d_x, c_y + d_y)) else {
                        continue;
                    };
                    for &i_src in cell {
                        let src = &self.state.agents[i_src];
                        let dist_2 =
                            (pos[0] - src.pos[0]).powi(2) + (pos[1] - src.pos[1]).powi(2);
                        if dist_2 > radius_2 {
                            continue;
                        }
                        let hazard = dis.beta * src.infectiousness * susceptibility * dt;
                        let prob = 1.0 - (-hazard).exp();
                        if self.rng.random_bool(prob) {
                            infector = Some(i_src);
                            break 'cells;
                        }
                    }
                }
            }

            if let Some(i_src) = infector {
                let duration = incubation_dist.sample(&mut self.rng).max(dt);
                let agt = &mut self.state.agents[i_agt];
                agt.state = DiseaseState::Exposed;
                agt.state_entered_step = step;
                agt.planned_duration = duration;

                self.state.agents[i_src].exposures_caused += 1;
                new_exposures += 1;
            }
        }

        Ok(new_exposures)
    }

    /// Advance the duration-gated disease state transitions.
    ///
    /// Exposed agents whose incubation period has elapsed become infected
    /// with a drawn infectious period; infected agents whose infectious
    /// period has elapsed recover or die according to the case fatality
    /// rate. Returns the mean number of exposures caused by the agents that
    /// completed their infectious period this step, or `None` if there were
    /// none.
    fn progress_disease(&mut self) -> Result<Option<f64>> {
        let dis = &self.cfg.disease;
        let dt = self.cfg.run.dt;
        let step = self.state.step;

        let infectious_dist = Normal::new(dis.infectious_mean, dis.infectious_std)?;
        let death_dist = Bernoulli::new(dis.case_fatality_rate)?;

        let mut n_completed = 0_usize;
        let mut exposures_sum = 0_usize;

        for agt in &mut self.state.agents {
            let elapsed = (step - agt.state_entered_step) as f64 * dt;
            if elapsed < agt.planned_duration {
                continue;
            }
            match agt.state {
                DiseaseState::Exposed => {
                    agt.state = DiseaseState::Infected;
                    agt.state_entered_step = step;
                    agt.planned_duration = infectious_dist.sample(&mut self.rng).max(dt);
                }
                DiseaseState::Infected => {
                    n_completed += 1;
                    exposures_sum += agt.exposures_caused as usize;
                    agt.state = if death_dist.sample(&mut self.rng) {
                        DiseaseState::Deceased
                    } else {
                        DiseaseState::Recovered
                    };
                    agt.state_entered_step = step;
                }
                _ => {}
            }
        }

        Ok((n_completed > 0).then(|| exposures_sum as f64 / n_completed as f64))
    }

    /// Apply vaccination, detection and isolation.
    ///
    /// Susceptible agents are vaccinated (moving directly to recovered) with
    /// probability `vaccination_rate * dt` per step. Undetected infectious
    /// agents are detected with probability `detection_prob` per step;
    /// isolation compliance is drawn once, at detection.
    fn apply_interventions(&mut self) -> Result<()> {
        let itv = &self.cfg.interventions;
        let dt = self.cfg.run.dt;
        let step = self.state.step;

        let vax_dist = Bernoulli::new((itv.vaccination_rate * dt).min(1.0))?;
        let detection_dist = Bernoulli::new(itv.detection_prob)?;
        let compliance_dist = Bernoulli::new(itv.isolation_compliance)?;

        for agt in &mut self.state.agents {
            match agt.state {
                DiseaseState::Susceptible => {
                    if vax_dist.sample(&mut self.rng) {
                        agt.state = DiseaseState::Recovered;
                        agt.state_entered_step = step;
                        agt.vaccinated = true;
                    }
                }
                DiseaseState::Infected if !agt.detected => {
                    if detection_dist.sample(&mut self.rng) {
                        agt.detected = true;
                        agt.isolated = compliance_dist.sample(&mut self.rng);
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Create the initial population.
fn populate(cfg: &Config, rng: &mut ChaCha12Rng) -> Result<Vec<Agent>> {
    let pos_dist = Uniform::new(0.0, cfg.population.grid_size)?;
    let vel_dist = Uniform::new(-1.0, 1.0)?;
    let infectiousness_dist = Gamma::new(INFECTIOUSNESS_SHAPE, INFECTIOUSNESS_SCALE)?;
    let susceptibility_dist = Uniform::new(0.5, 1.5)?;
    let infectious_dist = Normal::new(cfg.disease.infectious_mean, cfg.disease.infectious_std)?;

    let mut agents = Vec::with_capacity(cfg.population.n_agents);
    for id in 0..cfg.population.n_agents {
        let pos = [pos_dist.sample(rng), pos_dist.sample(rng)];
        let vel = [vel_dist.sample(rng), vel_dist.sample(rng)];

        let seeded = id < cfg.population.n_seed_infected;

        agents.push(Agent {
            id,
            pos,
            vel,
            home: pos,
            state: if seeded {
                DiseaseState::Infected
            } else {
                DiseaseState::Susceptible
            },
            state_entered_step: 0,
            planned_duration: if seeded {
                infectious_dist.sample(rng).max(cfg.run.dt)
            } else {
                0.0
            },
            infectiousness: infectiousness_dist.sample(rng),
            susceptibility: susceptibility_dist.sample(rng),
            exposures_caused: 0,
            detected: false,
            isolated: false,
            vaccinated: false,
        });
    }

    Ok(agents)
}
