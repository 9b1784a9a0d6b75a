use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Population parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PopulationParams {
    /// Number of agents.
    pub n_agents: usize,
    /// Side length of the square grid the agents live on.
    pub grid_size: f64,
    /// Number of agents seeded as infected at initialization.
    pub n_seed_infected: usize,
}

/// Disease parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DiseaseParams {
    /// Base infection rate.
    pub beta: f64,
    /// Maximum distance at which transmission can occur.
    pub interaction_radius: f64,
    /// Mean of the incubation period (days).
    pub incubation_mean: f64,
    /// Standard deviation of the incubation period (days).
    pub incubation_std: f64,
    /// Mean of the infectious period (days).
    pub infectious_mean: f64,
    /// Standard deviation of the infectious period (days).
    pub infectious_std: f64,
    /// Probability that an infected agent dies at the end of its infectious
    /// period.
    pub case_fatality_rate: f64,
}

/// Mobility parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MobilityParams {
    /// Strength of the pull towards the home location.
    pub home_attraction: f64,
    /// Intensity of the random-walk noise.
    pub random_force: f64,
    /// Velocity damping factor per step.
    pub damping: f64,
}

/// Intervention parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InterventionParams {
    /// Vaccination rate (per day); vaccinated agents move directly from
    /// susceptible to recovered.
    pub vaccination_rate: f64,
    /// Probability per step of detecting an infectious agent.
    pub detection_prob: f64,
    /// Probability that a detected agent complies with isolation.
    pub isolation_compliance: f64,
}

/// Run parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RunParams {
    /// Timestep size (days).
    pub dt: f64,
    /// Seed of the random number generator.
    pub seed: u64,
}

/// Output parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputParams {
    /// Number of steps simulated per trajectory file.
    pub steps_per_run: usize,
}

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub population: PopulationParams,
    pub disease: DiseaseParams,
    pub mobility: MobilityParams,
    pub interventions: InterventionParams,
    pub run: RunParams,
    pub output: OutputParams,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Validate all configuration parameters.
    pub fn validate(&self) -> Result<()> {
        check_num(self.population.n_agents, 1..1_000_000).context("invalid number of agents")?;
        check_num(self.population.grid_size, 1.0..100_000.0).context("invalid grid size")?;
        check_num(self.population.n_seed_infected, 0..=self.population.n_agents)
            .context("invalid number of seeded infections")?;

        check_num(self.disease.beta, 0.0..1000.0).context("invalid infection rate")?;
        check_num(self.disease.interaction_radius, 0.0..100_000.0)
            .context("invalid interaction radius")?;
        check_num(self.disease.incubation_mean, 0.0..10_000.0)
            .context("invalid incubation period mean")?;
        check_num(self.disease.incubation_std, 0.0..10_000.0)
            .context("invalid incubation period standard deviation")?;
        check_num(self.disease.infectious_mean, 0.0..10_000.0)
            .context("invalid infectious period mean")?;
        check_num(self.disease.infectious_std, 0.0..10_000.0)
            .context("invalid infectious period standard deviation")?;
        check_num(self.disease.case_fatality_rate, 0.0..=1.0)
            .context("invalid case fatality rate")?;

        check_num(self.mobility.home_attraction, 0.0..1000.0)
            .context("invalid home attraction strength")?;
        check_num(self.mobility.random_force, 0.0..1000.0)
            .context("invalid random movement intensity")?;
        check_num(self.mobility.damping, 0.0..=1.0).context("invalid damping factor")?;

        check_num(self.interventions.vaccination_rate, 0.0..1000.0)
            .context("invalid vaccination rate")?;
        check_num(self.interventions.detection_prob, 0.0..=1.0)
            .context("invalid detection probability")?;
        check_num(self.interventions.isolation_compliance, 0.0..=1.0)
            .context("invalid isolation compliance probability")?;

        check_num(self.run.dt, 0.001..1000.0).context("invalid timestep size")?;

        check_num(self.output.steps_per_run, 1..10_000_000).context("invalid steps per run")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
