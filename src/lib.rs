//! Spatial stochastic agent-based model of epidemic spread.
//!
//! Agents move on a square grid, pulled towards a home location and kicked
//! by Gaussian noise; infection spreads between nearby agents through a
//! SEIRD state machine with randomized incubation and infectious periods,
//! modulated by vaccination, detection and isolation interventions.
//!
//! The simulation core lives in [`engine`] and is a pure in-process library:
//! a presentation layer drives it through [`engine::Engine::step`] and the
//! read-only accessors. The [`manager`] module and the `contagio` binary
//! wrap it for headless, resumable runs over a simulation directory.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod manager;
pub mod model;
pub mod stats;
