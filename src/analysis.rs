use crate::config::Config;
use crate::model::StepRecord;
use crate::stats::Accumulator;
use anyhow::{Context, Result};
use rmp_serde::decode;
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Observable computed over a recorded trajectory.
pub trait Obs {
    fn update(&mut self, record: &StepRecord) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

/// Final state counts and the fraction of the population ever infected.
pub struct FinalSize {
    n_agents: usize,
    last: Option<StepRecord>,
}

impl FinalSize {
    pub fn new(cfg: &Config) -> Self {
        Self {
            n_agents: cfg.population.n_agents,
            last: None,
        }
    }
}

impl Obs for FinalSize {
    fn update(&mut self, record: &StepRecord) -> Result<()> {
        self.last = Some(*record);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        match &self.last {
            Some(record) => {
                let attack_rate =
                    1.0 - record.counts.susceptible as f64 / self.n_agents as f64;
                serde_json::json!({ "final_size": {
                    "step": record.step,
                    "counts": record.counts,
                    "attack_rate": attack_rate,
                } })
            }
            None => serde_json::json!({ "final_size": null }),
        }
    }
}

/// Peak number of simultaneously infected agents and when it occurred.
pub struct PeakInfected {
    peak: usize,
    peak_step: usize,
}

impl PeakInfected {
    pub fn new() -> Self {
        Self {
            peak: 0,
            peak_step: 0,
        }
    }
}

impl Obs for PeakInfected {
    fn update(&mut self, record: &StepRecord) -> Result<()> {
        if record.counts.infected > self.peak {
            self.peak = record.counts.infected;
            self.peak_step = record.step;
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "peak_infected": {
            "count": self.peak,
            "step": self.peak_step,
        } })
    }
}

/// Moments of the Rt estimate over the steps where it is defined.
pub struct RtSummary {
    acc: Accumulator,
}

impl RtSummary {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for RtSummary {
    fn update(&mut self, record: &StepRecord) -> Result<()> {
        if let Some(rt) = record.rt {
            self.acc.add(rt);
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "rt": self.acc.report() })
    }
}

/// Analyzer of recorded trajectories.
pub struct Analyzer {
    cfg: Config,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(FinalSize::new(&cfg)),
            Box::new(PeakInfected::new()),
            Box::new(RtSummary::new()),
        ];
        Self { cfg, obs_ptr_vec }
    }

    /// Feed one trajectory file to all observables.
    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        for _ in 0..self.cfg.output.steps_per_run {
            let record = decode::from_read(&mut reader).context("failed to read record")?;
            for obs in &mut self.obs_ptr_vec {
                obs.update(&record).context("failed to update observable")?;
            }
        }
        Ok(())
    }

    /// Write the reports of all observables as pretty-printed JSON.
    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        let reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        serde_json::to_writer_pretty(writer, &reports)?;
        Ok(())
    }
}
