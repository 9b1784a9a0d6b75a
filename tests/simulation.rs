use contagio::config::{
    Config, DiseaseParams, InterventionParams, MobilityParams, OutputParams, PopulationParams,
    RunParams,
};
use contagio::engine::Engine;
use contagio::model::DiseaseState;

/// Reference scenario: N=100 on a 50x50 grid, one seeded infection.
fn base_config() -> Config {
    Config {
        population: PopulationParams {
            n_agents: 100,
            grid_size: 50.0,
            n_seed_infected: 1,
        },
        disease: DiseaseParams {
            beta: 1.0,
            interaction_radius: 2.0,
            incubation_mean: 5.0,
            incubation_std: 1.0,
            infectious_mean: 7.0,
            infectious_std: 1.0,
            case_fatality_rate: 0.1,
        },
        mobility: MobilityParams {
            home_attraction: 0.05,
            random_force: 1.0,
            damping: 0.05,
        },
        interventions: InterventionParams {
            vaccination_rate: 0.0,
            detection_prob: 0.0,
            isolation_compliance: 0.0,
        },
        run: RunParams { dt: 1.0, seed: 42 },
        output: OutputParams { steps_per_run: 60 },
    }
}

#[test]
fn population_is_conserved() {
    let mut engine = Engine::new(base_config()).expect("failed to construct engine");

    for _ in 0..60 {
        let record = engine.step().expect("failed to perform step");
        assert_eq!(record.counts.total(), 100);
    }
    for record in engine.history() {
        assert_eq!(record.counts.total(), 100);
    }
}

#[test]
fn terminal_states_are_monotonic() {
    let mut engine = Engine::new(base_config()).expect("failed to construct engine");

    let mut terminal = vec![None; engine.agents().len()];
    for _ in 0..60 {
        engine.step().expect("failed to perform step");
        for agt in engine.agents() {
            match terminal[agt.id] {
                Some(state) => assert_eq!(agt.state, state),
                None => {
                    if agt.state == DiseaseState::Recovered || agt.state == DiseaseState::Deceased
                    {
                        terminal[agt.id] = Some(agt.state);
                    }
                }
            }
        }
    }
}

#[test]
fn agents_stay_on_grid() {
    let mut cfg = base_config();
    cfg.population.grid_size = 10.0;
    cfg.mobility.home_attraction = 0.0;
    cfg.mobility.random_force = 50.0;
    cfg.mobility.damping = 0.0;
    let mut engine = Engine::new(cfg).expect("failed to construct engine");

    for _ in 0..100 {
        engine.step().expect("failed to perform step");
        for agt in engine.agents() {
            for axis in 0..2 {
                assert!(agt.pos[axis] >= 0.0 && agt.pos[axis] <= 10.0);
            }
        }
    }
}

#[test]
fn identical_seeds_give_identical_runs() {
    let mut engine_a = Engine::new(base_config()).expect("failed to construct engine");
    let mut engine_b = Engine::new(base_config()).expect("failed to construct engine");

    for _ in 0..60 {
        let record_a = engine_a.step().expect("failed to perform step");
        let record_b = engine_b.step().expect("failed to perform step");
        assert_eq!(record_a, record_b);
    }
    assert_eq!(engine_a.history(), engine_b.history());
    assert_eq!(engine_a.agents(), engine_b.agents());
}

#[test]
fn reset_replays_the_same_trajectory() {
    let mut engine = Engine::new(base_config()).expect("failed to construct engine");

    for _ in 0..20 {
        engine.step().expect("failed to perform step");
    }
    let first = engine.history().to_vec();

    engine.reset(None).expect("failed to reset engine");
    assert_eq!(engine.current_step(), 0);
    assert_eq!(engine.history().len(), 1);

    for _ in 0..20 {
        engine.step().expect("failed to perform step");
    }
    assert_eq!(engine.history(), first.as_slice());
}

#[test]
fn no_transmission_without_beta() {
    let mut cfg = base_config();
    cfg.disease.beta = 0.0;
    let mut engine = Engine::new(cfg).expect("failed to construct engine");

    for _ in 0..60 {
        let record = engine.step().expect("failed to perform step");
        assert_eq!(record.new_exposures, 0);
        assert_eq!(record.counts.exposed, 0);
    }

    // Only the seeded agent left the susceptible state.
    let counts = engine.counts();
    assert_eq!(counts.susceptible, 99);
    assert_eq!(counts.recovered + counts.deceased, 1);

    // The seeded agent completed its infectious period exactly once, having
    // caused no exposures.
    let rt_values: Vec<_> = engine.history().iter().filter_map(|r| r.rt).collect();
    assert_eq!(rt_values, vec![0.0]);
}

#[test]
fn saturating_vaccination_empties_susceptible() {
    let mut cfg = base_config();
    cfg.population.n_seed_infected = 0;
    cfg.disease.beta = 0.0;
    cfg.interventions.vaccination_rate = 1.0;
    let mut engine = Engine::new(cfg).expect("failed to construct engine");

    let record = engine.step().expect("failed to perform step");
    assert_eq!(record.counts.susceptible, 0);
    assert_eq!(record.counts.recovered, 100);
    assert!(engine.agents().iter().all(|agt| agt.vaccinated));
}

#[test]
fn epidemic_scenario_propagates() {
    let mut engine = Engine::new(base_config()).expect("failed to construct engine");

    for _ in 0..60 {
        engine.step().expect("failed to perform step");
    }
    assert_eq!(engine.history().len(), 61);

    let counts = engine.counts();
    assert!(counts.recovered + counts.deceased > 0);
    assert!(counts.susceptible < 100);
}

#[test]
fn seeded_agent_completes_on_schedule() {
    let mut cfg = base_config();
    cfg.disease.beta = 0.0;
    cfg.disease.infectious_std = 0.0;
    cfg.disease.case_fatality_rate = 0.0;
    let mut engine = Engine::new(cfg).expect("failed to construct engine");

    // Deterministic infectious period of 7 days at dt = 1.
    for step in 1..=6 {
        engine.step().expect("failed to perform step");
        assert_eq!(engine.agents()[0].state, DiseaseState::Infected, "step {step}");
    }
    let record = engine.step().expect("failed to perform step");
    assert_eq!(engine.agents()[0].state, DiseaseState::Recovered);
    assert_eq!(record.rt, Some(0.0));

    // With certain fatality the same schedule ends in death.
    let mut cfg = base_config();
    cfg.disease.beta = 0.0;
    cfg.disease.infectious_std = 0.0;
    cfg.disease.case_fatality_rate = 1.0;
    let mut engine = Engine::new(cfg).expect("failed to construct engine");
    for _ in 0..7 {
        engine.step().expect("failed to perform step");
    }
    assert_eq!(engine.agents()[0].state, DiseaseState::Deceased);
}

#[test]
fn detected_agents_isolate_and_stop_transmitting() {
    let mut cfg = base_config();
    cfg.population.grid_size = 15.0;
    cfg.disease.beta = 10.0;
    cfg.disease.interaction_radius = 5.0;
    cfg.disease.incubation_mean = 3.0;
    cfg.interventions.detection_prob = 1.0;
    cfg.interventions.isolation_compliance = 1.0;

    let mut control = cfg.clone();
    control.interventions.detection_prob = 0.0;

    let mut engine = Engine::new(cfg).expect("failed to construct engine");
    let mut late_exposures = 0;
    for step in 1..=60 {
        let record = engine.step().expect("failed to perform step");
        if step >= 2 {
            late_exposures += record.new_exposures;
        }
        // Every infectious agent is detected and isolated the step it
        // becomes infectious, before it can ever transmit.
        for agt in engine.agents() {
            if agt.state == DiseaseState::Infected {
                assert!(agt.detected && agt.isolated);
            }
        }
    }
    assert_eq!(late_exposures, 0);

    let mut engine = Engine::new(control).expect("failed to construct engine");
    let mut late_exposures = 0;
    for step in 1..=60 {
        let record = engine.step().expect("failed to perform step");
        if step >= 2 {
            late_exposures += record.new_exposures;
        }
    }
    assert!(late_exposures > 0);
}

#[test]
fn invalid_configs_are_rejected() {
    let cases: Vec<(&str, Box<dyn Fn(&mut Config)>)> = vec![
        ("zero agents", Box::new(|cfg| cfg.population.n_agents = 0)),
        ("zero grid", Box::new(|cfg| cfg.population.grid_size = 0.0)),
        (
            "too many seeds",
            Box::new(|cfg| cfg.population.n_seed_infected = 101),
        ),
        ("negative beta", Box::new(|cfg| cfg.disease.beta = -1.0)),
        (
            "negative std dev",
            Box::new(|cfg| cfg.disease.incubation_std = -0.1),
        ),
        (
            "fatality rate above one",
            Box::new(|cfg| cfg.disease.case_fatality_rate = 1.5),
        ),
        (
            "detection probability above one",
            Box::new(|cfg| cfg.interventions.detection_prob = 2.0),
        ),
        ("zero timestep", Box::new(|cfg| cfg.run.dt = 0.0)),
    ];

    for (name, mutate) in cases {
        let mut cfg = base_config();
        mutate(&mut cfg);
        assert!(Engine::new(cfg).is_err(), "{name} should be rejected");
    }
}
